use serde::Serialize;
use serde_json::{Map, Value};

use crate::key::MatchKey;
use crate::normalize::QualitySummary;
use crate::report::GroupedReport;
use crate::unify::UnifiedRow;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One row from either export: field name -> string, number, or null.
///
/// Field order is insertion order, so passthrough columns keep the order
/// they had in the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Display text of a field. `None` when the field is absent or null.
    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).and_then(value_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Text form of a cell value. Integral floats print without a fraction so a
/// spreadsheet number `100.0` and the string `"100"` build the same key.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            (None, Some(f)) => f.to_string(),
            (None, None) => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// A loaded export: header order plus rows.
///
/// `columns` is kept separately from the rows so an empty export still
/// carries its header for binding validation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Build a table whose columns are the union of the records' fields,
    /// in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for (name, _) in record.fields() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
        }
        Self { columns, records }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pre-loaded exports for one run.
#[derive(Debug, Default)]
pub struct ReconInput {
    /// Source A: tax-authority document ledger.
    pub tax: Table,
    /// Source B: accounting ledger, already mapped to the logical ledger fields.
    pub ledger: Table,
    /// Fallbacks taken while loading the exports (unparseable debit/credit).
    pub ingestion: QualitySummary,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Matched,
    LeftOnly,
    RightOnly,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matched => write!(f, "MATCHED"),
            Self::LeftOnly => write!(f, "LEFT_ONLY"),
            Self::RightOnly => write!(f, "RIGHT_ONLY"),
        }
    }
}

/// A record with the key it was assigned. `None` = unkeyable.
#[derive(Debug, Clone)]
pub struct KeyedRecord {
    pub key: Option<MatchKey>,
    pub record: Record,
}

/// Ledger lines sharing one key, collapsed: summed numeric fields,
/// first-occurrence values for everything else.
#[derive(Debug, Clone)]
pub struct AggregatedB {
    pub key: MatchKey,
    pub record: Record,
    pub line_count: usize,
}

#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub key: MatchKey,
    pub left: Record,
    pub right: AggregatedB,
}

#[derive(Debug, Default)]
pub struct MatchOutput {
    pub matched: Vec<MatchedPair>,
    pub left_only: Vec<KeyedRecord>,
    /// Original, unaggregated ledger lines whose key never appeared on side A.
    pub right_only: Vec<KeyedRecord>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewSummary {
    pub tax_records: usize,
    pub ledger_records: usize,
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub unified_rows: usize,
    pub dropped_as_noise: usize,
    pub total_value_a: f64,
    pub total_value_b: f64,
    pub total_difference: f64,
    pub quality: QualitySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewResult {
    pub name: String,
    pub sheet: String,
    pub summary: ViewSummary,
    /// Unified rows in outcome order, before grouping.
    pub rows: Vec<UnifiedRow>,
    pub report: GroupedReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub views: usize,
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub unified_rows: usize,
    /// Ingestion warnings plus every view's warnings.
    pub data_quality_warnings: usize,
    pub ingestion: QualitySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub views: Vec<ViewResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}
