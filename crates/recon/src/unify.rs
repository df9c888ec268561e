//! Unification: folds matched / tax-only / ledger-only outcomes into one
//! row shape with both values and their difference.

use serde::Serialize;

use crate::config::TaxBindings;
use crate::model::{MatchOutput, Outcome, Record};
use crate::normalize::{normalize_company_name, normalize_identifier, parse_amount, QualityLog};

/// Rows whose two values are both within this magnitude are dropped.
pub const DEFAULT_NOISE_THRESHOLD: f64 = 1.0;

/// Field names of a unified row when flattened to a [`Record`].
pub mod fields {
    pub const IDENTIFIER: &str = "identifier";
    pub const COUNTERPART_NAME: &str = "counterpart_name";
    pub const COUNTERPART_GROUP: &str = "counterpart_group";
    pub const VALUE_A: &str = "value_a";
    pub const VALUE_B: &str = "value_b";
    pub const DIFFERENCE: &str = "difference";
    pub const OUTCOME: &str = "outcome";
    pub const MATCH_KEY: &str = "match_key";
    pub const ACCOUNT_LABEL: &str = "account_label";

    pub const ALL: [&str; 9] = [
        IDENTIFIER,
        COUNTERPART_NAME,
        COUNTERPART_GROUP,
        VALUE_A,
        VALUE_B,
        DIFFERENCE,
        OUTCOME,
        MATCH_KEY,
        ACCOUNT_LABEL,
    ];
}

/// Logical field names the ledger ingestion must produce.
pub mod ledger_fields {
    pub const REFERENCE: &str = "reference";
    pub const IDENTIFIER: &str = "identifier";
    pub const COUNTERPART_NAME: &str = "counterpart_name";
    pub const ACCOUNT_LABEL: &str = "account_label";
    pub const ACCOUNT_CODE: &str = "account_code";
    pub const NET_BALANCE: &str = "net_balance";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRow {
    pub identifier: String,
    pub counterpart_name: String,
    pub counterpart_group: String,
    pub value_a: f64,
    pub value_b: f64,
    pub difference: f64,
    pub outcome: Outcome,
    pub match_key: String,
    pub account_label: String,
    /// Source fields carried through for the report.
    pub passthrough: Record,
}

impl UnifiedRow {
    #[allow(clippy::too_many_arguments)]
    fn new(
        outcome: Outcome,
        identifier: String,
        counterpart_name: String,
        value_a: f64,
        value_b: f64,
        match_key: String,
        account_label: String,
        passthrough: Record,
    ) -> Self {
        let counterpart_group = normalize_company_name(Some(counterpart_name.as_str()));
        Self {
            identifier,
            counterpart_name,
            counterpart_group,
            value_a,
            value_b,
            difference: value_a - value_b,
            outcome,
            match_key,
            account_label,
            passthrough,
        }
    }

    /// Flatten to a record: the named fields first, then passthrough fields
    /// that don't collide with them.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(fields::IDENTIFIER, self.identifier.as_str());
        record.insert(fields::COUNTERPART_NAME, self.counterpart_name.as_str());
        record.insert(fields::COUNTERPART_GROUP, self.counterpart_group.as_str());
        record.insert(fields::VALUE_A, self.value_a);
        record.insert(fields::VALUE_B, self.value_b);
        record.insert(fields::DIFFERENCE, self.difference);
        record.insert(fields::OUTCOME, self.outcome.to_string());
        record.insert(fields::MATCH_KEY, self.match_key.as_str());
        record.insert(fields::ACCOUNT_LABEL, self.account_label.as_str());
        for (name, value) in self.passthrough.fields() {
            if !fields::ALL.contains(&name.as_str()) {
                record.insert(name.clone(), value.clone());
            }
        }
        record
    }
}

#[derive(Debug, Clone)]
pub struct UnifyOptions {
    /// Tax-side field naming the counterpart for this view.
    pub counterpart: String,
    pub noise_threshold: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Unified {
    pub rows: Vec<UnifiedRow>,
    pub dropped_as_noise: usize,
}

/// Build unified rows in outcome order: matched, tax-only, ledger-only.
pub fn unify(
    output: &MatchOutput,
    tax: &TaxBindings,
    options: &UnifyOptions,
    log: &mut QualityLog,
) -> Unified {
    use ledger_fields as lf;

    let mut rows = Vec::with_capacity(
        output.matched.len() + output.left_only.len() + output.right_only.len(),
    );

    for pair in &output.matched {
        let ledger = &pair.right.record;
        let counterpart_name = non_blank(&pair.left, &options.counterpart)
            .or_else(|| non_blank(ledger, lf::COUNTERPART_NAME))
            .unwrap_or_default();
        rows.push(UnifiedRow::new(
            Outcome::Matched,
            normalize_identifier(ledger.text(lf::IDENTIFIER).as_deref()),
            counterpart_name,
            tax_value(&pair.left, tax, log),
            parse_amount(ledger.get(lf::NET_BALANCE), lf::NET_BALANCE, log),
            pair.key.to_string(),
            ledger.text(lf::ACCOUNT_LABEL).unwrap_or_default(),
            merge_passthrough(&pair.left, ledger),
        ));
    }

    for keyed in &output.left_only {
        let identifier = tax
            .identifier
            .as_deref()
            .and_then(|field| keyed.record.text(field));
        rows.push(UnifiedRow::new(
            Outcome::LeftOnly,
            normalize_identifier(identifier.as_deref()),
            non_blank(&keyed.record, &options.counterpart).unwrap_or_default(),
            tax_value(&keyed.record, tax, log),
            0.0,
            keyed.key.as_ref().map(ToString::to_string).unwrap_or_default(),
            String::new(),
            keyed.record.clone(),
        ));
    }

    for keyed in &output.right_only {
        let ledger = &keyed.record;
        rows.push(UnifiedRow::new(
            Outcome::RightOnly,
            normalize_identifier(ledger.text(lf::IDENTIFIER).as_deref()),
            ledger.text(lf::COUNTERPART_NAME).unwrap_or_default(),
            0.0,
            parse_amount(ledger.get(lf::NET_BALANCE), lf::NET_BALANCE, log),
            keyed.key.as_ref().map(ToString::to_string).unwrap_or_default(),
            ledger.text(lf::ACCOUNT_LABEL).unwrap_or_default(),
            ledger.clone(),
        ));
    }

    let before = rows.len();
    let threshold = options.noise_threshold;
    rows.retain(|row| row.value_a.abs() > threshold || row.value_b.abs() > threshold);
    let dropped_as_noise = before - rows.len();
    if dropped_as_noise > 0 {
        log::debug!("unify: dropped {dropped_as_noise} rows at or below {threshold}");
    }

    Unified {
        rows,
        dropped_as_noise,
    }
}

/// Gross total minus tax, when a tax field is bound.
fn tax_value(record: &Record, tax: &TaxBindings, log: &mut QualityLog) -> f64 {
    let gross = parse_amount(record.get(&tax.total), &tax.total, log);
    match &tax.tax {
        Some(field) => gross - parse_amount(record.get(field), field, log),
        None => gross,
    }
}

fn non_blank(record: &Record, field: &str) -> Option<String> {
    record.text(field).filter(|s| !s.trim().is_empty())
}

/// Tax fields then ledger fields; a name present on both sides is kept
/// twice with `_a` / `_b` suffixes.
fn merge_passthrough(left: &Record, right: &Record) -> Record {
    let mut merged = Record::new();
    for (name, value) in left.fields() {
        merged.insert(suffixed(name, right.contains(name), "_a"), value.clone());
    }
    for (name, value) in right.fields() {
        merged.insert(suffixed(name, left.contains(name), "_b"), value.clone());
    }
    merged
}

fn suffixed(name: &str, collides: bool, suffix: &str) -> String {
    if collides {
        format!("{name}{suffix}")
    } else {
        name.to_string()
    }
}
