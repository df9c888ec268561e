//! View selection: which tax documents and which ledger lines take part in
//! one reconciliation partition (expenses, income, ...).

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::config::{TaxBindings, ViewConfig};
use crate::error::ReconError;
use crate::model::Record;
use crate::normalize::{parse_amount, QualityLog};
use crate::unify::ledger_fields as lf;

/// Compile a view's account exclusion pattern (case-insensitive).
pub fn exclusion_pattern(view: &ViewConfig) -> Result<Option<Regex>, ReconError> {
    let Some(pattern) = view.exclude_accounts.as_deref() else {
        return Ok(None);
    };
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| {
            ReconError::ConfigValidation(format!(
                "view '{}': exclude_accounts is not a valid pattern: {e}",
                view.name
            ))
        })
}

/// Compiled record filters for one view.
#[derive(Debug)]
pub struct ViewFilter<'a> {
    view: &'a ViewConfig,
    direction_field: Option<&'a str>,
    direction_marker: Option<String>,
    exclude: Option<Regex>,
}

impl<'a> ViewFilter<'a> {
    pub fn new(view: &'a ViewConfig, tax: &'a TaxBindings) -> Result<Self, ReconError> {
        Ok(Self {
            view,
            direction_field: tax.direction.as_deref(),
            direction_marker: view.direction_contains.as_ref().map(|m| m.to_lowercase()),
            exclude: exclusion_pattern(view)?,
        })
    }

    /// Tax rows whose direction contains the view's marker. Without a bound
    /// direction column or without a marker every row passes.
    pub fn accepts_tax(&self, record: &Record) -> bool {
        let (Some(field), Some(marker)) = (self.direction_field, &self.direction_marker) else {
            return true;
        };
        record
            .text(field)
            .is_some_and(|direction| direction.to_lowercase().contains(marker.as_str()))
    }

    /// Ledger lines under the account prefix and not excluded by label.
    pub fn accepts_ledger(&self, record: &Record) -> bool {
        if let Some(prefix) = self.view.account_prefix.as_deref() {
            let code = record.text(lf::ACCOUNT_CODE).unwrap_or_default();
            if !code.trim().starts_with(prefix) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            let label = record.text(lf::ACCOUNT_LABEL).unwrap_or_default();
            if exclude.is_match(&label) {
                return false;
            }
        }
        true
    }

    pub fn select_tax(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.accepts_tax(r)).cloned().collect()
    }

    /// Accepted ledger lines, with `net_balance` negated for credit-nature views.
    pub fn select_ledger(&self, records: &[Record], log: &mut QualityLog) -> Vec<Record> {
        records
            .iter()
            .filter(|r| self.accepts_ledger(r))
            .map(|r| {
                let mut record = r.clone();
                if self.view.invert_sign {
                    let balance = parse_amount(r.get(lf::NET_BALANCE), lf::NET_BALANCE, log);
                    record.insert(lf::NET_BALANCE, Value::from(-balance));
                }
                record
            })
            .collect()
    }
}
