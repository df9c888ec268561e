//! Excel rendering of the grouped reports.
//!
//! One sheet per view. Summary rows are styled from a [`RowKind`] lookup
//! table and the row outline is derived from each row's outline depth, so
//! details fold under their level-2 subtotal and those fold under the
//! level-1 total.

use std::path::Path;

use fiscalrec_recon::report::{GroupedReport, GroupedRow, RowKind};
use fiscalrec_recon::{ReconResult, Table};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::error::IoError;

pub const PURPLE: u32 = 0x7145D6;
pub const LIGHT: u32 = 0xF3F0FA;
pub const ACCENT: u32 = 0xB89EF7;
pub const WHITE: u32 = 0xFFFFFF;
const BASE_HEADER: u32 = 0xDDDDDD;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub column_width: f64,
    /// Excel number format for the summed columns.
    pub number_format: String,
    pub tab_color: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            column_width: 18.0,
            number_format: "#,##0.00".into(),
            tab_color: PURPLE,
        }
    }
}

/// A raw input table appended as its own sheet.
#[derive(Debug, Clone, Copy)]
pub struct BaseSheet<'a> {
    pub name: &'a str,
    pub table: &'a Table,
}

/// Fill, font colour and weight of one kind of report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStyle {
    pub fill: Option<u32>,
    pub font: Option<u32>,
    pub bold: bool,
}

pub fn row_style(kind: RowKind) -> RowStyle {
    match kind {
        RowKind::Detail => RowStyle {
            fill: None,
            font: None,
            bold: false,
        },
        RowKind::SubtotalLevel2 => RowStyle {
            fill: Some(LIGHT),
            font: None,
            bold: true,
        },
        RowKind::SubtotalLevel1 => RowStyle {
            fill: Some(ACCENT),
            font: Some(WHITE),
            bold: true,
        },
        RowKind::GrandTotal => RowStyle {
            fill: Some(PURPLE),
            font: Some(WHITE),
            bold: true,
        },
    }
}

impl RowStyle {
    fn format(&self, number_format: Option<&str>) -> Format {
        let mut format = Format::new();
        if self.bold {
            format = format.set_bold();
        }
        if let Some(fill) = self.fill {
            format = format.set_background_color(Color::RGB(fill));
        }
        if let Some(font) = self.font {
            format = format.set_font_color(Color::RGB(font));
        }
        if let Some(pattern) = number_format {
            format = format.set_num_format(pattern);
        }
        format
    }
}

/// Rows `first..=last` (sheet coordinates) grouped at `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineGroup {
    pub first: u32,
    pub last: u32,
    pub level: u8,
    pub collapsed: bool,
}

/// Outline groups for report rows written below a one-row header: each
/// maximal run of rows at depth >= level forms a group. Level-2 runs are
/// collapsed when their rows carry the hidden hint.
pub fn outline_groups(rows: &[GroupedRow]) -> Vec<OutlineGroup> {
    let mut groups = Vec::new();
    for level in 1..=2u8 {
        let mut start: Option<usize> = None;
        for i in 0..=rows.len() {
            let inside = rows.get(i).is_some_and(|r| r.depth >= level);
            match (inside, start) {
                (true, None) => start = Some(i),
                (false, Some(first)) => {
                    groups.push(OutlineGroup {
                        first: first as u32 + 1,
                        last: i as u32,
                        level,
                        collapsed: level == 2 && rows[first..i].iter().all(|r| r.hidden),
                    });
                    start = None;
                }
                _ => {}
            }
        }
    }
    groups
}

/// Write every view report (plus optional base sheets) to an `.xlsx` file.
pub fn write_report(
    path: &Path,
    result: &ReconResult,
    options: &RenderOptions,
    bases: &[BaseSheet<'_>],
) -> Result<(), IoError> {
    let mut workbook = Workbook::new();

    for view in &result.views {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&view.sheet)?;
        write_grouped_sheet(worksheet, &view.report, options)?;
        log::debug!("sheet '{}': {} rows", view.sheet, view.report.rows.len());
    }

    for base in bases {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(base.name)?;
        write_base_sheet(worksheet, base.table, options)?;
    }

    workbook.save(path).map_err(|source| IoError::Save {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "wrote {} ({} report sheets, {} base sheets)",
        path.display(),
        result.views.len(),
        bases.len()
    );
    Ok(())
}

fn write_grouped_sheet(
    worksheet: &mut Worksheet,
    report: &GroupedReport,
    options: &RenderOptions,
) -> Result<(), XlsxError> {
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(PURPLE))
        .set_font_color(Color::RGB(WHITE))
        .set_border(FormatBorder::Thin);
    for (col, name) in report.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
        worksheet.set_column_width(col as u16, options.column_width)?;
    }

    let kinds = [
        RowKind::Detail,
        RowKind::SubtotalLevel2,
        RowKind::SubtotalLevel1,
        RowKind::GrandTotal,
    ];
    let formats: Vec<(RowKind, Format, Format)> = kinds
        .into_iter()
        .map(|kind| {
            let style = row_style(kind);
            (kind, style.format(None), style.format(Some(&options.number_format)))
        })
        .collect();

    for (i, row) in report.rows.iter().enumerate() {
        let sheet_row = i as u32 + 1;
        let Some((_, text_format, number_format)) = formats.iter().find(|(k, _, _)| *k == row.kind) else {
            continue;
        };
        for (col, name) in report.columns.iter().enumerate() {
            let value = row.record.get(name).unwrap_or(&Value::Null);
            let format = if report.is_sum_column(name) {
                number_format
            } else {
                text_format
            };
            write_value(worksheet, sheet_row, col as u16, value, format)?;
        }
    }

    for group in outline_groups(&report.rows) {
        if group.collapsed {
            worksheet.group_rows_collapsed(group.first, group.last)?;
        } else {
            worksheet.group_rows(group.first, group.last)?;
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.set_tab_color(Color::RGB(options.tab_color));
    Ok(())
}

fn write_base_sheet(worksheet: &mut Worksheet, table: &Table, options: &RenderOptions) -> Result<(), XlsxError> {
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(BASE_HEADER))
        .set_border(FormatBorder::Thin);
    let plain = Format::new();
    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
        worksheet.set_column_width(col as u16, options.column_width)?;
    }
    for (i, record) in table.records.iter().enumerate() {
        for (col, name) in table.columns.iter().enumerate() {
            if let Some(value) = record.get(name) {
                write_value(worksheet, i as u32 + 1, col as u16, value, &plain)?;
            }
        }
    }
    worksheet.set_tab_color(Color::Gray);
    Ok(())
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: &Format,
) -> Result<(), XlsxError> {
    match value {
        Value::Null => worksheet.write_blank(row, col, format),
        Value::Number(n) => worksheet.write_number_with_format(row, col, n.as_f64().unwrap_or(0.0), format),
        Value::String(s) => worksheet.write_string_with_format(row, col, s, format),
        Value::Bool(b) => worksheet.write_boolean_with_format(row, col, *b, format),
        other => worksheet.write_string_with_format(row, col, other.to_string(), format),
    }?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use fiscalrec_recon::model::{ReconMeta, ReconSummary, ViewResult, ViewSummary};
    use fiscalrec_recon::report::{build, ReportLayout};
    use fiscalrec_recon::Record;

    fn layout(collapse: bool) -> ReportLayout {
        ReportLayout {
            level1: "counterpart_group".into(),
            level2: "outcome".into(),
            text_fields: vec!["match_key".into()],
            sum_fields: vec!["value_a".into(), "value_b".into()],
            collapse_details: collapse,
        }
    }

    fn row(group: &str, outcome: &str, key: &str, a: f64, b: f64) -> Record {
        let mut r = Record::new();
        r.insert("counterpart_group", group);
        r.insert("outcome", outcome);
        r.insert("match_key", key);
        r.insert("value_a", a);
        r.insert("value_b", b);
        r
    }

    fn sample_report(collapse: bool) -> GroupedReport {
        build(
            &[
                row("ACME", "MATCHED", "F1100", 100.0, 100.0),
                row("ACME", "LEFT_ONLY", "F1101", 50.0, 0.0),
                row("BETA", "MATCHED", "F2", 10.0, 10.0),
            ],
            &layout(collapse),
        )
    }

    fn result(report: GroupedReport) -> ReconResult {
        ReconResult {
            meta: ReconMeta {
                config_name: "test".into(),
                engine_version: "0".into(),
                run_at: "now".into(),
            },
            summary: ReconSummary::default(),
            views: vec![ViewResult {
                name: "expense".into(),
                sheet: "1. Expenses".into(),
                summary: ViewSummary::default(),
                rows: Vec::new(),
                report,
            }],
        }
    }

    #[test]
    fn style_table() {
        assert_eq!(row_style(RowKind::Detail).fill, None);
        assert!(row_style(RowKind::SubtotalLevel2).bold);
        assert_eq!(row_style(RowKind::SubtotalLevel1).font, Some(WHITE));
        assert_eq!(row_style(RowKind::GrandTotal).fill, Some(PURPLE));
    }

    #[test]
    fn outline_follows_depth() {
        let report = sample_report(true);
        // D S2 D S2 S1 | D S2 S1 | GT, LEFT_ONLY sorts before MATCHED
        let groups = outline_groups(&report.rows);
        let level1: Vec<(u32, u32)> = groups.iter().filter(|g| g.level == 1).map(|g| (g.first, g.last)).collect();
        let level2: Vec<(u32, u32)> = groups.iter().filter(|g| g.level == 2).map(|g| (g.first, g.last)).collect();
        assert_eq!(level1, [(1, 4), (6, 7)]);
        assert_eq!(level2, [(1, 1), (3, 3), (6, 6)]);
        assert!(groups.iter().filter(|g| g.level == 2).all(|g| g.collapsed));
        assert!(groups.iter().filter(|g| g.level == 1).all(|g| !g.collapsed));

        let open = outline_groups(&sample_report(false).rows);
        assert!(open.iter().all(|g| !g.collapsed));
    }

    #[test]
    fn outline_of_empty_report() {
        assert!(outline_groups(&[]).is_empty());
    }

    #[test]
    fn written_workbook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        let mut tax_row = Record::new();
        tax_row.insert("prefijo", "F1");
        tax_row.insert("total", 119.0);
        let tax = Table::from_records(vec![tax_row]);
        let bases = [BaseSheet {
            name: "Tax Base",
            table: &tax,
        }];

        write_report(&path, &result(sample_report(true)), &RenderOptions::default(), &bases).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), ["1. Expenses", "Tax Base"]);

        let range = workbook.worksheet_range("1. Expenses").unwrap();
        assert_eq!(range.get((0, 0)), Some(&Data::String("counterpart_group".into())));
        assert_eq!(range.get((1, 2)), Some(&Data::String("F1101".into())));
        assert_eq!(range.get((2, 1)), Some(&Data::String("TOTAL LEFT_ONLY".into())));
        assert_eq!(range.get((3, 2)), Some(&Data::String("F1100".into())));
        assert_eq!(range.get((4, 1)), Some(&Data::String("TOTAL MATCHED".into())));
        assert_eq!(range.get((5, 0)), Some(&Data::String("TOTAL ACME".into())));
        assert_eq!(range.get((5, 3)), Some(&Data::Float(150.0)));
        assert_eq!(range.get((9, 0)), Some(&Data::String("GRAND TOTAL".into())));
        assert_eq!(range.get((9, 4)), Some(&Data::Float(110.0)));

        let base = workbook.worksheet_range("Tax Base").unwrap();
        assert_eq!(base.get((0, 1)), Some(&Data::String("total".into())));
        assert_eq!(base.get((1, 1)), Some(&Data::Float(119.0)));

        // Detail rows sit collapsed at outline level 2; subtotals stay visible.
        let xml = sheet_xml(&path, 1);
        for detail in [2, 4, 7] {
            let tag = row_tag(&xml, detail);
            assert!(tag.contains(r#"outlineLevel="2""#), "{tag}");
            assert!(tag.contains(r#"hidden="1""#), "{tag}");
        }
        for subtotal in [3, 5, 8] {
            let tag = row_tag(&xml, subtotal);
            assert!(tag.contains(r#"outlineLevel="1""#), "{tag}");
            assert!(!tag.contains("hidden"), "{tag}");
        }
        for total in [6, 9, 10] {
            assert!(!row_tag(&xml, total).contains("outlineLevel"));
        }
    }

    #[test]
    fn expanded_report_keeps_details_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.xlsx");
        write_report(&path, &result(sample_report(false)), &RenderOptions::default(), &[]).unwrap();

        let xml = sheet_xml(&path, 1);
        let tag = row_tag(&xml, 2);
        assert!(tag.contains(r#"outlineLevel="2""#), "{tag}");
        assert!(!tag.contains("hidden"), "{tag}");
    }

    fn sheet_xml(path: &Path, sheet: usize) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(&format!("xl/worksheets/sheet{sheet}.xml")).unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut entry, &mut xml).unwrap();
        xml
    }

    /// Opening `<row>` tag of 1-based sheet row `r`.
    fn row_tag(xml: &str, r: u32) -> String {
        let start = xml.find(&format!(r#"<row r="{r}""#)).unwrap();
        let end = start + xml[start..].find('>').unwrap();
        xml[start..=end].to_string()
    }

    #[test]
    fn empty_report_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let report = build(&[], &layout(true));
        write_report(&path, &result(report), &RenderOptions::default(), &[]).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range("1. Expenses").unwrap();
        assert_eq!(range.height(), 1);
        assert_eq!(range.get((0, 4)), Some(&Data::String("value_b".into())));
    }
}
