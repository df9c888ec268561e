use std::path::PathBuf;

use proptest::prelude::*;
use serde_json::json;

use fiscalrec_recon::config::{EmptyKeyPolicy, ReconConfig};
use fiscalrec_recon::engine::{build_report, reconcile_and_unify, run};
use fiscalrec_recon::matcher::{reconcile, MatchOptions};
use fiscalrec_recon::model::{Outcome, ReconInput, Record, Table};
use fiscalrec_recon::normalize::QualityLog;
use fiscalrec_recon::report::{self, ReportLayout, RowKind};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn monthly_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("monthly.recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn tax_doc(group: &str, prefix: &str, folio: &str, total: f64, iva: f64, issuer: &str) -> Record {
    let mut r = Record::new();
    r.insert("grupo", group);
    r.insert("prefijo", prefix);
    r.insert("folio", folio);
    r.insert("total", total);
    r.insert("iva", iva);
    r.insert("nit_emisor", "900.123.456");
    r.insert("nombre_emisor", issuer);
    r.insert("nombre_receptor", "Our Company SAS");
    r
}

fn ledger_line(code: &str, label: &str, reference: &str, name: &str, balance: f64) -> Record {
    let mut r = Record::new();
    r.insert("account_code", code);
    r.insert("account_label", label);
    r.insert("reference", reference);
    r.insert("identifier", "900123456");
    r.insert("counterpart_name", name);
    r.insert("net_balance", balance);
    r
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn single_document_matches_net_of_tax() {
    let config = monthly_config();
    let tax = Table::from_records(vec![tax_doc("Recibido", "F1", "100", 119.0, 19.0, "Acme SAS")]);
    let ledger = Table::from_records(vec![ledger_line("513505", "SERVICIOS", "f1100", "ACME", 100.0)]);

    let outcome = reconcile_and_unify(&config, config.view("expense").unwrap(), &tax, &ledger).unwrap();
    assert_eq!(outcome.rows.len(), 1);
    let row = &outcome.rows[0];
    assert_eq!(row.outcome, Outcome::Matched);
    assert_eq!((row.value_a, row.value_b, row.difference), (100.0, 100.0, 0.0));
    assert_eq!(row.counterpart_group, "ACME");
}

#[test]
fn document_without_ledger_is_tax_only() {
    let config = monthly_config();
    let tax = Table::from_records(vec![tax_doc("Recibido", "X", "1", 80.0, 0.0, "Beta Ltda")]);

    let outcome =
        reconcile_and_unify(&config, config.view("expense").unwrap(), &tax, &Table::default()).unwrap();
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].outcome, Outcome::LeftOnly);
    assert_eq!(outcome.rows[0].match_key, "X1");
    assert_eq!(outcome.rows[0].difference, 80.0);
}

#[test]
fn default_views_split_expense_and_income() {
    let config = monthly_config();
    let input = ReconInput {
        tax: Table::from_records(vec![
            tax_doc("Documento Recibido", "F1", "100", 119.0, 19.0, "Acme SAS"),
            tax_doc("Documento Emitido", "FV", "9", 595.0, 95.0, "Our Company SAS"),
            tax_doc("Documento Recibido", "F2", "1", 0.5, 0.0, "Tiny SAS"),
        ]),
        ledger: Table::from_records(vec![
            ledger_line("513505", "SERVICIOS", "F1-100", "ACME", 100.0),
            ledger_line("516005", "DEPRECIACION", "DEP-1", "", 30.0),
            ledger_line("413505", "VENTAS", "FV9", "CLIENT", -500.0),
            ledger_line("413505", "VENTAS", "FV10", "OTHER CLIENT", -70.0),
        ]),
        ..ReconInput::default()
    };
    let result = run(&config, &input).unwrap();
    assert_eq!(result.views.len(), 2);

    let expense = &result.views[0];
    assert_eq!(expense.sheet, "1. Expenses");
    // the 0.5 document is below the noise threshold, depreciation is excluded
    assert_eq!(expense.rows.len(), 1);
    assert_eq!(expense.summary.dropped_as_noise, 1);
    assert_eq!(expense.summary.matched, 1);

    let income = &result.views[1];
    assert_eq!(income.sheet, "2. Income");
    let outcomes: Vec<Outcome> = income.rows.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, [Outcome::Matched, Outcome::RightOnly]);
    assert_eq!(income.rows[0].value_b, 500.0);
    assert_eq!(income.rows[1].value_b, 70.0);
    assert_eq!(income.rows[1].difference, -70.0);

    let grand = income.report.grand_total().unwrap();
    assert_eq!(grand.amount("value_a"), 500.0);
    assert_eq!(grand.amount("value_b"), 570.0);
    assert_eq!(grand.record.get("counterpart_group"), Some(&json!("GRAND TOTAL")));
}

#[test]
fn grouped_report_scenario() {
    let layout = ReportLayout {
        level1: "group".into(),
        level2: "kind".into(),
        text_fields: vec![],
        sum_fields: vec!["amount".into()],
        collapse_details: true,
    };
    let rows: Vec<Record> = [("G1", 10.0), ("G1", 20.0), ("G2", 5.0)]
        .into_iter()
        .map(|(group, amount)| {
            let mut r = Record::new();
            r.insert("group", group);
            r.insert("kind", "A");
            r.insert("amount", amount);
            r
        })
        .collect();
    let report = report::build(&rows, &layout);
    let totals: Vec<f64> = report
        .rows_of_kind(RowKind::SubtotalLevel1)
        .map(|r| r.amount("amount"))
        .collect();
    assert_eq!(totals, [30.0, 5.0]);
    assert_eq!(report.grand_total().unwrap().amount("amount"), 35.0);
}

#[test]
fn report_json_shape() {
    let config = monthly_config();
    let input = ReconInput {
        tax: Table::from_records(vec![tax_doc("Recibido", "F1", "100", 119.0, 19.0, "Acme SAS")]),
        ledger: Table::default(),
        ..ReconInput::default()
    };
    let result = run(&config, &input).unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["meta"]["config_name"], "Monthly close");
    assert_eq!(value["views"][0]["rows"][0]["outcome"], "LEFT_ONLY");
    assert_eq!(value["views"][0]["report"]["rows"][0]["kind"], "DETAIL");
    assert_eq!(value["views"][0]["report"]["rows"][0]["hidden"], true);
}

// -------------------------------------------------------------------------
// Laws
// -------------------------------------------------------------------------

fn keyed(field: &str, key: &str, amount: i32) -> Record {
    let mut r = Record::new();
    r.insert(field, key);
    r.insert("net_balance", amount);
    r
}

fn match_options() -> MatchOptions {
    MatchOptions {
        left_key: vec!["doc".into()],
        right_key: vec!["reference".into()],
        right_sum_fields: vec!["net_balance".into()],
        empty_keys: EmptyKeyPolicy::Unmatched,
    }
}

proptest! {
    #[test]
    fn partition_covers_every_record(
        left in prop::collection::vec(0u8..12, 0..20),
        right in prop::collection::vec(6u8..18, 0..20),
    ) {
        let set_a: Vec<Record> = left.iter().map(|k| keyed("doc", &format!("K{k}"), 1)).collect();
        let set_b: Vec<Record> = right.iter().map(|k| keyed("reference", &format!("k-{k}"), 1)).collect();
        let mut log = QualityLog::new("prop");
        let out = reconcile(&set_a, &set_b, &match_options(), &mut log);

        prop_assert_eq!(out.matched.len() + out.left_only.len(), set_a.len());
        let expected_matched = left.iter().filter(|k| right.contains(k)).count();
        prop_assert_eq!(out.matched.len(), expected_matched);
        let expected_right_only = right.iter().filter(|k| !left.contains(k)).count();
        prop_assert_eq!(out.right_only.len(), expected_right_only);
        for pair in &out.matched {
            let lines = right.iter().filter(|k| format!("K{k}") == pair.key.as_str()).count();
            prop_assert_eq!(pair.right.line_count, lines);
        }
    }

    #[test]
    fn grouping_totals_add_up(
        rows in prop::collection::vec((0u8..4, 0u8..3, -1000i32..1000), 1..40),
    ) {
        let layout = ReportLayout {
            level1: "g1".into(),
            level2: "g2".into(),
            text_fields: vec![],
            sum_fields: vec!["amount".into()],
            collapse_details: false,
        };
        let records: Vec<Record> = rows
            .iter()
            .map(|(a, b, amount)| {
                let mut r = Record::new();
                r.insert("g1", format!("G{a}"));
                r.insert("g2", format!("S{b}"));
                r.insert("amount", *amount);
                r
            })
            .collect();
        let report = report::build(&records, &layout);
        let expected: f64 = rows.iter().map(|(_, _, a)| f64::from(*a)).sum();

        prop_assert_eq!(report.grand_total().unwrap().amount("amount"), expected);
        let level1: f64 = report.rows_of_kind(RowKind::SubtotalLevel1).map(|r| r.amount("amount")).sum();
        prop_assert_eq!(level1, expected);
        let level2: f64 = report.rows_of_kind(RowKind::SubtotalLevel2).map(|r| r.amount("amount")).sum();
        prop_assert_eq!(level2, expected);
        prop_assert_eq!(report.rows_of_kind(RowKind::Detail).count(), rows.len());
    }

    #[test]
    fn difference_is_always_a_minus_b(
        docs in prop::collection::vec((0u8..8, 0i32..5000), 0..12),
        lines in prop::collection::vec((0u8..8, -5000i32..5000), 0..12),
    ) {
        let config = monthly_config();
        let tax = Table::from_records(
            docs.iter()
                .map(|(k, total)| tax_doc("Recibido", "F", &k.to_string(), f64::from(*total), 0.0, "Acme"))
                .collect(),
        );
        let ledger = Table::from_records(
            lines.iter()
                .map(|(k, amount)| ledger_line("5105", "GASTOS", &format!("F{k}"), "ACME", f64::from(*amount)))
                .collect(),
        );
        let outcome = reconcile_and_unify(&config, config.view("expense").unwrap(), &tax, &ledger).unwrap();
        for row in &outcome.rows {
            prop_assert!((row.value_a - row.value_b - row.difference).abs() < 1e-6);
        }
        let report = build_report(&outcome.rows, &config.report.layout());
        if let Some(grand) = report.grand_total() {
            let a: f64 = outcome.rows.iter().map(|r| r.value_a).sum();
            prop_assert!((grand.amount("value_a") - a).abs() < 1e-6);
        }
    }
}
