//! Accounting-ledger export (general-ledger detail report).
//!
//! The report starts with a title block, so the header row is located by
//! its marker columns. Account names appear on their own header rows and
//! are carried down to the movement lines below them; per-account "Total"
//! rows and lines without a date are dropped. Output columns use the
//! logical ledger names the engine binds against. Debit/credit cells that
//! do not parse count as zero and are recorded in the caller's
//! [`QualityLog`].

use std::path::Path;

use fiscalrec_recon::config::LedgerColumns;
use fiscalrec_recon::normalize::{parse_amount, QualityLog};
use fiscalrec_recon::unify::ledger_fields as lf;
use fiscalrec_recon::{ReconError, Record, Table};
use serde_json::Value;

use crate::error::IoError;
use crate::table::{cell_text, header_names, is_blank, read_rows, Row};

pub fn read_ledger_table(
    path: &Path,
    columns: &LedgerColumns,
    quality: &mut QualityLog,
) -> Result<Table, IoError> {
    let rows = read_rows(path)?;
    let table = ledger_table_from_rows(&rows, columns, quality)?;
    log::info!(
        "{}: {} ledger lines, {} columns",
        path.display(),
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

pub fn ledger_table_from_rows(
    rows: &[Row],
    columns: &LedgerColumns,
    quality: &mut QualityLog,
) -> Result<Table, IoError> {
    if rows.is_empty() {
        return Ok(Table::default());
    }
    let header_at = find_header_row(rows, columns);
    let header = header_names(&rows[header_at], str::to_string);
    let layout = ColumnIndex::resolve(&header, columns)?;

    let mut output_columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, name)| layout.logical_name(i).unwrap_or(name.as_str()).to_string())
        .collect();
    for logical in [lf::REFERENCE, lf::IDENTIFIER, lf::COUNTERPART_NAME, lf::ACCOUNT_LABEL] {
        if !output_columns.iter().any(|c| c == logical) {
            output_columns.push(logical.to_string());
        }
    }
    output_columns.push(lf::ACCOUNT_CODE.to_string());
    output_columns.push(lf::NET_BALANCE.to_string());

    let mut current_account: Option<String> = None;
    let mut records = Vec::new();
    let mut skipped_totals = 0usize;
    let mut skipped_undated = 0usize;

    for row in &rows[header_at + 1..] {
        if row.iter().all(is_blank) {
            continue;
        }
        let account = cell_text(row, layout.account).filter(|a| !matches!(a.as_str(), "nan" | "None"));
        if let Some(account) = account.as_deref() {
            if account.starts_with(|c: char| c.is_ascii_digit()) {
                current_account = Some(account.to_string());
            }
            if account.starts_with("Total") {
                skipped_totals += 1;
                continue;
            }
        }
        if row.get(layout.date).map_or(true, is_blank) {
            skipped_undated += 1;
            continue;
        }

        records.push(layout.line(row, &header, current_account.as_deref(), quality));
    }

    log::debug!(
        "ledger: header at row {}, {} lines kept, {} total rows and {} undated rows dropped",
        header_at + 1,
        records.len(),
        skipped_totals,
        skipped_undated,
    );
    Ok(Table::new(output_columns, records))
}

/// First row (within the scan window) holding every header marker; row 0
/// when none does.
fn find_header_row(rows: &[Row], columns: &LedgerColumns) -> usize {
    rows.iter()
        .take(columns.header_scan_rows)
        .position(|row| {
            let cells: Vec<String> = (0..row.len()).filter_map(|i| cell_text(row, i)).collect();
            columns
                .header_markers
                .iter()
                .all(|marker| cells.iter().any(|c| c == marker.trim()))
        })
        .unwrap_or(0)
}

/// Positions of the configured ledger columns in the header.
struct ColumnIndex {
    account: usize,
    date: usize,
    reference: usize,
    identifier: Option<usize>,
    counterpart_name: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
}

impl ColumnIndex {
    fn resolve(header: &[String], columns: &LedgerColumns) -> Result<Self, ReconError> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name.trim());
        let require = |binding: &str, name: &str| {
            find(name).ok_or_else(|| ReconError::missing_field("ledger", binding, name))
        };
        Ok(Self {
            account: require("ledger.account", &columns.account)?,
            date: require("ledger.date", &columns.date)?,
            reference: require("ledger.reference", &columns.reference)?,
            identifier: find(&columns.identifier),
            counterpart_name: find(&columns.counterpart_name),
            debit: find(&columns.debit),
            credit: find(&columns.credit),
        })
    }

    fn logical_name(&self, index: usize) -> Option<&'static str> {
        if index == self.account {
            Some(lf::ACCOUNT_LABEL)
        } else if index == self.reference {
            Some(lf::REFERENCE)
        } else if Some(index) == self.identifier {
            Some(lf::IDENTIFIER)
        } else if Some(index) == self.counterpart_name {
            Some(lf::COUNTERPART_NAME)
        } else {
            None
        }
    }

    fn line(&self, row: &Row, header: &[String], account: Option<&str>, log: &mut QualityLog) -> Record {
        let mut record = Record::new();
        for (i, name) in header.iter().enumerate() {
            let cell = row.get(i).cloned().unwrap_or(Value::Null);
            match self.logical_name(i) {
                Some(lf::ACCOUNT_LABEL) => {
                    record.insert(lf::ACCOUNT_LABEL, account.map_or(Value::Null, Value::from));
                }
                Some(lf::IDENTIFIER) => {
                    let id = cell_text(row, i).map(|s| s.strip_suffix(".0").map(str::to_string).unwrap_or(s));
                    record.insert(lf::IDENTIFIER, id.map_or(Value::Null, Value::from));
                }
                Some(logical) => record.insert(logical, cell),
                None => record.insert(name.clone(), cell),
            }
        }
        for logical in [lf::REFERENCE, lf::IDENTIFIER, lf::COUNTERPART_NAME, lf::ACCOUNT_LABEL] {
            if !record.contains(logical) {
                record.insert(logical, Value::Null);
            }
        }

        let code: String = account
            .unwrap_or_default()
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        record.insert(
            lf::ACCOUNT_CODE,
            if code.is_empty() { Value::Null } else { Value::from(code) },
        );

        let debit = self.amount(row, self.debit, "debit", log);
        let credit = self.amount(row, self.credit, "credit", log);
        record.insert(lf::NET_BALANCE, debit - credit);
        record
    }

    fn amount(&self, row: &Row, index: Option<usize>, context: &str, log: &mut QualityLog) -> f64 {
        index.map_or(0.0, |i| parse_amount(row.get(i), context, log))
    }
}
