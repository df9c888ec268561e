use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::normalize::normalize_field_name;
use crate::report::ReportLayout;
use crate::unify::{fields, DEFAULT_NOISE_THRESHOLD};

/// Excel refuses sheet names longer than this.
const MAX_SHEET_NAME: usize = 31;
const SHEET_NAME_FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub tax: TaxBindings,
    #[serde(default)]
    pub ledger: LedgerColumns,
    #[serde(default = "default_views")]
    pub views: Vec<ViewConfig>,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

// ---------------------------------------------------------------------------
// Tax-side bindings
// ---------------------------------------------------------------------------

/// Logical fields of the tax-authority export. Names are matched against the
/// normalized headers, so `"Nombre Emisor"` and `"nombre_emisor"` are the same.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxBindings {
    /// Document prefix (series), first key component.
    pub prefix: String,
    /// Document number, second key component.
    pub folio: String,
    /// Gross document total.
    pub total: String,
    /// Tax amount subtracted from `total` for a net comparison.
    #[serde(default)]
    pub tax: Option<String>,
    /// Counterpart tax id, used for one-sided tax rows.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Column telling issued from received documents.
    #[serde(default)]
    pub direction: Option<String>,
}

impl TaxBindings {
    pub fn key_fields(&self) -> Vec<String> {
        vec![self.prefix.clone(), self.folio.clone()]
    }
}

// ---------------------------------------------------------------------------
// Ledger ingestion columns
// ---------------------------------------------------------------------------

/// Header names of the accounting-ledger export, as printed in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerColumns {
    /// Every marker must appear in a row for it to be taken as the header row.
    pub header_markers: Vec<String>,
    /// How many leading rows are searched for the header.
    pub header_scan_rows: usize,
    pub account: String,
    pub date: String,
    pub reference: String,
    pub identifier: String,
    pub counterpart_name: String,
    pub debit: String,
    pub credit: String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            header_markers: vec!["Cuenta".into(), "Fecha".into()],
            header_scan_rows: 20,
            account: "Cuenta".into(),
            date: "Fecha".into(),
            reference: "Número de documento".into(),
            identifier: "Número Identificación".into(),
            counterpart_name: "Nombre".into(),
            debit: "Débito".into(),
            credit: "Crédito".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One reconciliation partition over the two exports.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    pub name: String,
    /// Output sheet name.
    pub sheet: String,
    /// Tax-side field holding the counterpart name for this view
    /// (issuer for purchases, receiver for sales).
    pub counterpart: String,
    /// Keep tax rows whose direction column contains this (case-insensitive).
    #[serde(default)]
    pub direction_contains: Option<String>,
    /// Keep ledger lines whose account code starts with this.
    #[serde(default)]
    pub account_prefix: Option<String>,
    /// Drop ledger lines whose account label matches this regex (case-insensitive).
    #[serde(default)]
    pub exclude_accounts: Option<String>,
    /// Flip the ledger balance sign (credit-nature accounts).
    #[serde(default)]
    pub invert_sign: bool,
}

fn default_views() -> Vec<ViewConfig> {
    vec![
        ViewConfig {
            name: "expense".into(),
            sheet: "1. Expenses".into(),
            counterpart: "nombre_emisor".into(),
            direction_contains: Some("recibido".into()),
            account_prefix: Some("5".into()),
            exclude_accounts: Some("DIFERENCIA EN CAMBIO|DEPRECIACI".into()),
            invert_sign: false,
        },
        ViewConfig {
            name: "income".into(),
            sheet: "2. Income".into(),
            counterpart: "nombre_receptor".into(),
            direction_contains: Some("emitido".into()),
            account_prefix: Some("4".into()),
            exclude_accounts: Some("DIFERENCIA EN CAMBIO".into()),
            invert_sign: true,
        },
    ]
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// What an empty (all-punctuation or blank) key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyKeyPolicy {
    /// Empty keys never match; such records are always one-sided.
    #[default]
    Unmatched,
    /// Empty keys match each other like any other key.
    Match,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Rows with both values at or below this magnitude are dropped.
    pub noise_threshold: f64,
    pub empty_keys: EmptyKeyPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            empty_keys: EmptyKeyPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub level1: String,
    pub level2: String,
    pub text_fields: Vec<String>,
    pub sum_fields: Vec<String>,
    /// Start with detail rows collapsed under their subtotals.
    pub collapse_details: bool,
    /// Append the raw exports as extra sheets.
    pub base_sheets: bool,
    pub tax_base_sheet: String,
    pub ledger_base_sheet: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            level1: fields::COUNTERPART_GROUP.into(),
            level2: fields::OUTCOME.into(),
            text_fields: vec![
                fields::IDENTIFIER.into(),
                fields::COUNTERPART_NAME.into(),
                fields::MATCH_KEY.into(),
                fields::ACCOUNT_LABEL.into(),
            ],
            sum_fields: vec![
                fields::VALUE_A.into(),
                fields::VALUE_B.into(),
                fields::DIFFERENCE.into(),
            ],
            collapse_details: true,
            base_sheets: true,
            tax_base_sheet: "Tax Base".into(),
            ledger_base_sheet: "Ledger Base".into(),
        }
    }
}

impl ReportConfig {
    pub fn layout(&self) -> ReportLayout {
        ReportLayout {
            level1: self.level1.clone(),
            level2: self.level2.clone(),
            text_fields: self.text_fields.clone(),
            sum_fields: self.sum_fields.clone(),
            collapse_details: self.collapse_details,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let mut config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.normalize_bindings();
        config.validate()?;
        Ok(config)
    }

    /// Bring every tax-side binding to the normalized header form.
    fn normalize_bindings(&mut self) {
        let norm = |s: &mut String| *s = normalize_field_name(s.as_str());
        norm(&mut self.tax.prefix);
        norm(&mut self.tax.folio);
        norm(&mut self.tax.total);
        for opt in [&mut self.tax.tax, &mut self.tax.identifier, &mut self.tax.direction] {
            if let Some(s) = opt.as_mut() {
                norm(s);
            }
        }
        for view in &mut self.views {
            norm(&mut view.counterpart);
        }
    }

    pub fn view(&self, name: &str) -> Result<&ViewConfig, ReconError> {
        self.views
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ReconError::UnknownView(name.into()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        for (binding, value) in [
            ("tax.prefix", &self.tax.prefix),
            ("tax.folio", &self.tax.folio),
            ("tax.total", &self.tax.total),
        ] {
            if value.is_empty() {
                return Err(ReconError::ConfigValidation(format!("{binding} must not be empty")));
            }
        }

        if self.views.is_empty() {
            return Err(ReconError::ConfigValidation("at least one view is required".into()));
        }

        let mut names = HashSet::new();
        let mut sheets = HashSet::new();
        for view in &self.views {
            if !names.insert(view.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate view name '{}'",
                    view.name
                )));
            }
            if let Err(problem) = check_sheet_name(&view.sheet) {
                return Err(ReconError::ConfigValidation(format!(
                    "view '{}': sheet name {problem}",
                    view.name
                )));
            }
            if !sheets.insert(view.sheet.to_lowercase()) {
                return Err(ReconError::ConfigValidation(format!(
                    "view '{}': sheet '{}' is used twice",
                    view.name, view.sheet
                )));
            }
            if view.counterpart.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "view '{}': counterpart must not be empty",
                    view.name
                )));
            }
            crate::view::exclusion_pattern(view)?;
        }

        if self.report.sum_fields.is_empty() {
            return Err(ReconError::ConfigValidation("report.sum_fields must not be empty".into()));
        }
        if self.report.level1 == self.report.level2 {
            return Err(ReconError::ConfigValidation(
                "report.level1 and report.level2 must differ".into(),
            ));
        }
        if self.report.base_sheets {
            for sheet in [&self.report.tax_base_sheet, &self.report.ledger_base_sheet] {
                if let Err(problem) = check_sheet_name(sheet) {
                    return Err(ReconError::ConfigValidation(format!(
                        "base sheet name '{sheet}' {problem}"
                    )));
                }
                if !sheets.insert(sheet.to_lowercase()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "sheet '{sheet}' is used twice"
                    )));
                }
            }
        }

        let threshold = self.matching.noise_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "matching.noise_threshold must be a non-negative number, got {threshold}"
            )));
        }

        Ok(())
    }
}

/// Excel worksheet naming rules.
fn check_sheet_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.chars().count() > MAX_SHEET_NAME {
        return Err(format!("must be 1-{MAX_SHEET_NAME} characters"));
    }
    if let Some(c) = name.chars().find(|c| SHEET_NAME_FORBIDDEN.contains(c)) {
        return Err(format!("must not contain '{c}'"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err("must not start or end with an apostrophe".into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "Monthly close"

[tax]
prefix = "Prefijo"
folio  = "Folio"
total  = "Total"
tax    = "IVA"
direction = "Grupo"
"#;

    #[test]
    fn parse_minimal_uses_defaults() {
        let config = ReconConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "Monthly close");
        assert_eq!(config.tax.prefix, "prefijo");
        assert_eq!(config.tax.tax.as_deref(), Some("iva"));
        assert_eq!(config.tax.direction.as_deref(), Some("grupo"));
        assert_eq!(config.views.len(), 2);
        assert_eq!(config.views[1].name, "income");
        assert!(config.views[1].invert_sign);
        assert_eq!(config.matching.noise_threshold, DEFAULT_NOISE_THRESHOLD);
        assert_eq!(config.matching.empty_keys, EmptyKeyPolicy::Unmatched);
        assert_eq!(config.report.level1, fields::COUNTERPART_GROUP);
        assert_eq!(config.ledger.account, "Cuenta");
    }

    #[test]
    fn parse_custom_views_and_matching() {
        let input = format!(
            r#"{MINIMAL}
[[views]]
name = "purchases"
sheet = "Purchases"
counterpart = "Nombre Emisor"
account_prefix = "5"

[matching]
noise_threshold = 0.0
empty_keys = "match"

[report]
collapse_details = false
base_sheets = false
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(config.views.len(), 1);
        assert_eq!(config.views[0].counterpart, "nombre_emisor");
        assert!(!config.views[0].invert_sign);
        assert_eq!(config.matching.empty_keys, EmptyKeyPolicy::Match);
        assert_eq!(config.matching.noise_threshold, 0.0);
        assert!(!config.report.collapse_details);
        assert_eq!(config.report.sum_fields.len(), 3);
        assert!(config.view("purchases").is_ok());
        assert!(matches!(config.view("sales"), Err(ReconError::UnknownView(_))));
    }

    #[test]
    fn reject_missing_tax_section() {
        let err = ReconConfig::from_toml("name = \"x\"").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_duplicate_views() {
        let input = format!(
            r#"{MINIMAL}
[[views]]
name = "a"
sheet = "A"
counterpart = "x"

[[views]]
name = "a"
sheet = "B"
counterpart = "y"
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("duplicate view name 'a'"));
    }

    #[test]
    fn reject_long_sheet_name() {
        let input = format!(
            r#"{MINIMAL}
[[views]]
name = "a"
sheet = "This sheet name is far too long for Excel"
counterpart = "x"
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("sheet name"));
    }

    #[test]
    fn reject_sheet_name_excel_cannot_hold() {
        for sheet in ["Gastos/Ingresos", "Q1: close", "[draft]", "'quoted'"] {
            let input = format!(
                r#"{MINIMAL}
[[views]]
name = "a"
sheet = "{sheet}"
counterpart = "x"
"#
            );
            let err = ReconConfig::from_toml(&input).unwrap_err();
            assert!(err.to_string().contains("sheet name"), "{sheet}: {err}");
        }

        let input = format!("{MINIMAL}\n[report]\nledger_base_sheet = \"Ledger*Base\"\n");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("must not contain '*'"));
    }

    #[test]
    fn reject_bad_exclusion_pattern() {
        let input = format!(
            r#"{MINIMAL}
[[views]]
name = "a"
sheet = "A"
counterpart = "x"
exclude_accounts = "(unclosed"
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("exclude_accounts"));
    }

    #[test]
    fn reject_negative_threshold() {
        let input = format!("{MINIMAL}\n[matching]\nnoise_threshold = -1.0\n");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("noise_threshold"));
    }

    #[test]
    fn reject_same_grouping_levels() {
        let input = format!("{MINIMAL}\n[report]\nlevel1 = \"outcome\"\nlevel2 = \"outcome\"\n");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }
}
