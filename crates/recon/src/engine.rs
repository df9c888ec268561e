use crate::config::{ReconConfig, ViewConfig};
use crate::error::ReconError;
use crate::evidence::{compute_summary, compute_view_summary};
use crate::matcher::{reconcile, MatchOptions};
use crate::model::{ReconInput, ReconMeta, ReconResult, Table, ViewResult, ViewSummary};
use crate::normalize::QualityLog;
use crate::report::{self, GroupedReport, ReportLayout};
use crate::unify::{fields, ledger_fields as lf, unify, UnifiedRow, UnifyOptions};
use crate::view::ViewFilter;

/// Unified rows of one view plus the counts behind them.
#[derive(Debug, Clone)]
pub struct ViewOutcome {
    pub rows: Vec<UnifiedRow>,
    pub summary: ViewSummary,
}

/// Run every configured view over the two exports and build their reports.
///
/// Views are independent partitions, so each runs on its own scoped
/// thread. Results come back in configuration order; the first failing
/// view fails the whole run.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let layout = config.report.layout();
    check_report_fields(&layout, input)?;

    let views: Vec<ViewResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = config
            .views
            .iter()
            .map(|view| {
                let layout = &layout;
                scope.spawn(move || run_view(config, view, input, layout))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let summary = compute_summary(&views, &input.ingestion);
    log::info!(
        "{}: {} views, {} matched, {} tax only, {} ledger only, {} data-quality warnings",
        config.name,
        summary.views,
        summary.matched,
        summary.left_only,
        summary.right_only,
        summary.data_quality_warnings,
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        views,
    })
}

fn run_view(
    config: &ReconConfig,
    view: &ViewConfig,
    input: &ReconInput,
    layout: &ReportLayout,
) -> Result<ViewResult, ReconError> {
    let outcome = reconcile_and_unify(config, view, &input.tax, &input.ledger)?;
    let report = build_report(&outcome.rows, layout);
    Ok(ViewResult {
        name: view.name.clone(),
        sheet: view.sheet.clone(),
        summary: outcome.summary,
        rows: outcome.rows,
        report,
    })
}

/// Filter both exports down to `view`, match them and fold the outcomes
/// into unified rows.
///
/// Fails before touching any record when a bound field is missing from
/// the input columns. An export without records is not checked.
pub fn reconcile_and_unify(
    config: &ReconConfig,
    view: &ViewConfig,
    tax: &Table,
    ledger: &Table,
) -> Result<ViewOutcome, ReconError> {
    check_tax_bindings(config, view, tax)?;
    check_ledger_fields(view, ledger)?;

    let filter = ViewFilter::new(view, &config.tax)?;
    let mut log = QualityLog::new(view.name.as_str());

    let set_a = filter.select_tax(&tax.records);
    let set_b = filter.select_ledger(&ledger.records, &mut log);
    log::debug!(
        "view {}: {} of {} tax records, {} of {} ledger lines selected",
        view.name,
        set_a.len(),
        tax.len(),
        set_b.len(),
        ledger.len(),
    );

    let match_options = MatchOptions {
        left_key: config.tax.key_fields(),
        right_key: vec![lf::REFERENCE.to_string()],
        right_sum_fields: vec![lf::NET_BALANCE.to_string()],
        empty_keys: config.matching.empty_keys,
    };
    let output = reconcile(&set_a, &set_b, &match_options, &mut log);

    let unify_options = UnifyOptions {
        counterpart: view.counterpart.clone(),
        noise_threshold: config.matching.noise_threshold,
    };
    let unified = unify(&output, &config.tax, &unify_options, &mut log);

    let summary = compute_view_summary(set_a.len(), set_b.len(), &output, &unified, &log);
    Ok(ViewOutcome {
        rows: unified.rows,
        summary,
    })
}

/// Group unified rows into the two-level subtotal report.
pub fn build_report(rows: &[UnifiedRow], layout: &ReportLayout) -> GroupedReport {
    let records: Vec<_> = rows.iter().map(UnifiedRow::to_record).collect();
    report::build(&records, layout)
}

fn check_tax_bindings(config: &ReconConfig, view: &ViewConfig, tax: &Table) -> Result<(), ReconError> {
    if tax.is_empty() {
        return Ok(());
    }
    let bindings = &config.tax;
    let required = [
        ("tax.prefix", Some(&bindings.prefix)),
        ("tax.folio", Some(&bindings.folio)),
        ("tax.total", Some(&bindings.total)),
        ("tax.tax", bindings.tax.as_ref()),
        ("tax.identifier", bindings.identifier.as_ref()),
        ("tax.direction", bindings.direction.as_ref()),
        ("views.counterpart", Some(&view.counterpart)),
    ];
    for (binding, field) in required {
        if let Some(field) = field {
            if !tax.has_column(field) {
                return Err(ReconError::missing_field("tax", binding, field));
            }
        }
    }
    Ok(())
}

/// Every report column must be a unified field or a column one of the
/// exports carries through. Not checked when both exports are empty.
fn check_report_fields(layout: &ReportLayout, input: &ReconInput) -> Result<(), ReconError> {
    if input.tax.is_empty() && input.ledger.is_empty() {
        return Ok(());
    }
    let known = |name: &str| {
        fields::ALL.contains(&name) || input.tax.has_column(name) || input.ledger.has_column(name)
    };
    let named = [("report.level1", &layout.level1), ("report.level2", &layout.level2)]
        .into_iter()
        .chain(layout.text_fields.iter().map(|f| ("report.text_fields", f)))
        .chain(layout.sum_fields.iter().map(|f| ("report.sum_fields", f)));
    for (binding, field) in named {
        if !known(field.as_str()) {
            return Err(ReconError::missing_field("report", binding, field));
        }
    }
    Ok(())
}

fn check_ledger_fields(view: &ViewConfig, ledger: &Table) -> Result<(), ReconError> {
    if ledger.is_empty() {
        return Ok(());
    }
    let mut required = vec![lf::REFERENCE, lf::NET_BALANCE];
    if view.account_prefix.is_some() {
        required.push(lf::ACCOUNT_CODE);
    }
    if view.exclude_accounts.is_some() {
        required.push(lf::ACCOUNT_LABEL);
    }
    for field in required {
        if !ledger.has_column(field) {
            return Err(ReconError::missing_field("ledger", field, field));
        }
    }
    Ok(())
}
