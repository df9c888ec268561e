//! Field normalization: turns loosely typed export values into comparable forms.
//!
//! Nothing in here returns an error. Values that cannot be cleaned fall back
//! to a safe default (`0.0`, `""`, a sentinel name) and, where a
//! [`QualityLog`] is passed in, the fallback is counted and logged.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Grouping name for a counterpart with no usable name.
pub const NO_NAME: &str = "SIN NOMBRE";

/// Legal-entity suffixes removed from company names, as word sequences.
/// Checked in order at each position, first match wins.
const LEGAL_SUFFIXES: &[&[&str]] = &[
    &["S", "A", "S"],
    &["SAS"],
    &["S", "A"],
    &["SA"],
    &["LTDA"],
    &["BIC"],
    &["B", "I", "C"],
];

/// Warning samples kept per log; counts are always exact.
const MAX_SAMPLES: usize = 20;

fn non_word_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]+").expect("static pattern"))
}

/// Lowercase a header and collapse every run of non-word characters to `_`.
///
/// `"Número de Documento "` -> `"número_de_documento"`. Idempotent.
pub fn normalize_field_name(raw: &str) -> String {
    non_word_run()
        .replace_all(raw, "_")
        .to_lowercase()
        .trim_matches('_')
        .to_string()
}

/// Digits only. Blank or missing input gives an empty string.
pub fn normalize_identifier(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

/// Canonical company name for grouping (never for identity matching).
///
/// Uppercases, keeps `[A-Z0-9]` and whitespace, collapses whitespace and
/// drops corporate-form tokens: `"Acme S.A.S."` -> `"ACME"`.
pub fn normalize_company_name(value: Option<&str>) -> String {
    let upper = value.unwrap_or_default().to_uppercase();
    let cleaned: String = upper
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'scan: while i < tokens.len() {
        for suffix in LEGAL_SUFFIXES {
            if tokens[i..].starts_with(suffix) {
                i += suffix.len();
                continue 'scan;
            }
        }
        kept.push(tokens[i]);
        i += 1;
    }

    if kept.is_empty() {
        NO_NAME.to_string()
    } else {
        kept.join(" ")
    }
}

/// Parse an amount written with either separator convention. Never fails:
/// anything unparseable is `0.0`.
pub fn parse_currency(value: &str) -> f64 {
    parse_currency_checked(value).unwrap_or(0.0)
}

/// Like [`parse_currency`], but `None` for a non-blank value that is not a
/// number. Blank input is `Some(0.0)`.
///
/// When both `.` and `,` appear, whichever comes last is the decimal point.
/// A lone `,` is a decimal point only when exactly two digits follow it.
pub fn parse_currency_checked(value: &str) -> Option<f64> {
    let mut s: String = value.chars().filter(|c| *c != '$' && *c != ' ').collect();
    s = s.trim().to_string();
    if s.is_empty() {
        return Some(0.0);
    }

    match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                s = s.replace('.', "").replace(',', ".");
            } else {
                s = s.replace(',', "");
            }
        }
        (None, Some(comma)) => {
            if s[comma + 1..].chars().count() == 2 {
                s = s.replace(',', ".");
            } else {
                s = s.replace(',', "");
            }
        }
        _ => {}
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric value of a record field. Numbers pass through, text goes
/// through [`parse_currency_checked`], null/absent is zero.
pub fn parse_amount(value: Option<&Value>, context: &str, log: &mut QualityLog) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => match parse_currency_checked(s) {
            Some(v) => v,
            None => {
                log.record(QualityIssue::UnparseableAmount, context, s);
                0.0
            }
        },
        Some(other) => {
            log.record(QualityIssue::UnparseableAmount, context, &other.to_string());
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Data-quality log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    /// A non-blank amount that is not a number; counted as zero.
    UnparseableAmount,
    /// A record lacking one of the key fields; left out of matching.
    MissingKeyComponent,
    /// A record whose key normalized to the empty string.
    EmptyKey,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableAmount => write!(f, "unparseable_amount"),
            Self::MissingKeyComponent => write!(f, "missing_key_component"),
            Self::EmptyKey => write!(f, "empty_key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityWarning {
    pub issue: QualityIssue,
    pub context: String,
    pub value: String,
}

/// Collector for non-fatal data-quality fallbacks within one run scope.
#[derive(Debug, Default)]
pub struct QualityLog {
    scope: String,
    counts: BTreeMap<QualityIssue, usize>,
    samples: Vec<QualityWarning>,
}

impl QualityLog {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, issue: QualityIssue, context: &str, value: &str) {
        let count = self.counts.entry(issue).or_insert(0);
        *count += 1;
        if *count == 1 {
            log::warn!("[{}] {issue}: {context} = {value:?}", self.scope);
        } else {
            log::debug!("[{}] {issue}: {context} = {value:?}", self.scope);
        }
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(QualityWarning {
                issue,
                context: context.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn count(&self, issue: QualityIssue) -> usize {
        self.counts.get(&issue).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn summary(&self) -> QualitySummary {
        QualitySummary {
            total: self.total(),
            counts: self
                .counts
                .iter()
                .map(|(issue, n)| (issue.to_string(), *n))
                .collect(),
            samples: self.samples.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualitySummary {
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
    pub samples: Vec<QualityWarning>,
}
