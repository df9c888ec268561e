//! Hierarchical grouped report: two grouping levels, running subtotals and
//! a grand total, with outline metadata per row.
//!
//! The builder only computes the row stream. Styling and outline rendering
//! belong to whoever writes the spreadsheet; they key off [`RowKind`] and
//! [`GroupedRow::depth`].

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::model::{value_text, Record};
use crate::normalize::parse_currency;

pub const GRAND_TOTAL_LABEL: &str = "GRAND TOTAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowKind {
    Detail,
    SubtotalLevel2,
    SubtotalLevel1,
    GrandTotal,
}

impl RowKind {
    /// 2 = detail, 1 = level-2 subtotal, 0 = level-1 subtotal and grand total.
    pub fn outline_depth(self) -> u8 {
        match self {
            Self::Detail => 2,
            Self::SubtotalLevel2 => 1,
            Self::SubtotalLevel1 | Self::GrandTotal => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub kind: RowKind,
    pub depth: u8,
    /// Start hidden under the outline (presentation hint only).
    pub hidden: bool,
    pub record: Record,
}

impl GroupedRow {
    fn new(kind: RowKind, hidden: bool, record: Record) -> Self {
        Self {
            kind,
            depth: kind.outline_depth(),
            hidden,
            record,
        }
    }

    /// Numeric value of a sum column on this row (0 when blank).
    pub fn amount(&self, field: &str) -> f64 {
        numeric(self.record.get(field))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub level1: String,
    pub level2: String,
    pub text_fields: Vec<String>,
    pub sum_fields: Vec<String>,
    pub collapse_details: bool,
}

impl ReportLayout {
    /// Column order: `[level1, level2, text..., sums...]`, first occurrence kept.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let all = [&self.level1, &self.level2]
            .into_iter()
            .chain(&self.text_fields)
            .chain(&self.sum_fields);
        for name in all {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        columns
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedReport {
    pub columns: Vec<String>,
    pub sum_fields: Vec<String>,
    pub rows: Vec<GroupedRow>,
}

impl GroupedReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_of_kind(&self, kind: RowKind) -> impl Iterator<Item = &GroupedRow> {
        self.rows.iter().filter(move |r| r.kind == kind)
    }

    pub fn grand_total(&self) -> Option<&GroupedRow> {
        self.rows.last().filter(|r| r.kind == RowKind::GrandTotal)
    }

    /// True when `column` is one of the summed fields.
    pub fn is_sum_column(&self, column: &str) -> bool {
        self.sum_fields.iter().any(|f| f == column)
    }
}

/// Group `rows` by `level1` then `level2` and interleave subtotal rows.
///
/// Rows are stably sorted by the two grouping fields first, so detail rows
/// keep their input order within a group. An empty input gives an empty
/// report without a grand total.
pub fn build(rows: &[Record], layout: &ReportLayout) -> GroupedReport {
    let columns = layout.columns();
    let mut out: Vec<GroupedRow> = Vec::new();

    if rows.is_empty() {
        return GroupedReport {
            columns,
            sum_fields: layout.sum_fields.clone(),
            rows: out,
        };
    }

    let (l1, l2) = (layout.level1.as_str(), layout.level2.as_str());
    let mut sorted: Vec<&Record> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        compare_values(a.get(l1), b.get(l1)).then_with(|| compare_values(a.get(l2), b.get(l2)))
    });

    for level1_group in sorted.chunk_by(|a, b| same_group(a, b, l1)) {
        for level2_group in level1_group.chunk_by(|a, b| same_group(a, b, l2)) {
            for record in level2_group {
                out.push(GroupedRow::new(
                    RowKind::Detail,
                    layout.collapse_details,
                    (*record).clone(),
                ));
            }

            let mut subtotal = blank_row(&columns);
            subtotal.insert(l1, level2_group[0].get(l1).cloned().unwrap_or(Value::Null));
            subtotal.insert(l2, format!("TOTAL {}", group_label(level2_group[0], l2).to_uppercase()));
            fill_sums(&mut subtotal, level2_group, &layout.sum_fields);
            out.push(GroupedRow::new(RowKind::SubtotalLevel2, false, subtotal));
        }

        let mut total = blank_row(&columns);
        total.insert(l1, format!("TOTAL {}", group_label(level1_group[0], l1).to_uppercase()));
        fill_sums(&mut total, level1_group, &layout.sum_fields);
        out.push(GroupedRow::new(RowKind::SubtotalLevel1, false, total));
    }

    let mut grand = blank_row(&columns);
    grand.insert(l1, GRAND_TOTAL_LABEL);
    fill_sums(&mut grand, &sorted, &layout.sum_fields);
    out.push(GroupedRow::new(RowKind::GrandTotal, false, grand));

    GroupedReport {
        columns,
        sum_fields: layout.sum_fields.clone(),
        rows: out,
    }
}

fn blank_row(columns: &[String]) -> Record {
    columns.iter().map(|c| (c.clone(), Value::Null)).collect()
}

fn fill_sums(target: &mut Record, members: &[&Record], sum_fields: &[String]) {
    for field in sum_fields {
        let total: f64 = members.iter().map(|r| numeric(r.get(field))).sum();
        target.insert(field.clone(), total);
    }
}

fn group_label(record: &Record, field: &str) -> String {
    record.get(field).and_then(value_text).unwrap_or_default()
}

fn same_group(a: &Record, b: &Record, field: &str) -> bool {
    compare_values(a.get(field), b.get(field)) == Ordering::Equal
}

fn numeric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_currency(s),
        _ => 0.0,
    }
}

/// Numbers first (numerically), then text, then missing values.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (present(a), present(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        (Some(x), Some(y)) => value_text(x).cmp(&value_text(y)),
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}
