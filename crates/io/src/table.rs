//! Raw grid reading shared by the tax and ledger readers.
//!
//! Spreadsheets (xlsx, xlsm, xlsb, xls, ods) go through calamine and only
//! the first worksheet is read. Delimited text goes through the csv crate
//! with delimiter sniffing and a Windows-1252 fallback.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, TimeDelta};
use fiscalrec_recon::model::value_text;
use fiscalrec_recon::Record;
use serde_json::{Number, Value};

use crate::error::IoError;

/// One grid row, cells as text, number or null.
pub type Row = Vec<Value>;

/// Read every row of the first worksheet (or of a delimited text file).
pub fn read_rows(path: &Path) -> Result<Vec<Row>, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path),
        "csv" | "tsv" | "txt" => read_csv_rows(path),
        _ => Err(IoError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Row>, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IoError::NoSheets {
            path: path.to_path_buf(),
        })?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| IoError::Workbook {
            path: path.to_path_buf(),
            message: format!("sheet '{first}': {e}"),
        })?;

    let rows: Vec<Row> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    log::debug!("{}: {} rows from sheet '{first}'", path.display(), rows.len());
    Ok(rows)
}

fn read_csv_rows(path: &Path) -> Result<Vec<Row>, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| IoError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(text_cell).collect());
    }
    log::debug!("{}: {} rows (delimiter {:?})", path.display(), rows.len(), delimiter as char);
    Ok(rows)
}

/// Read a text file, falling back to Windows-1252 when it is not UTF-8
/// (common for spreadsheet-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

/// Pick the delimiter giving the most consistent multi-field split of the
/// first lines.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();
    let mut best = b',';
    let mut best_score = 0usize;

    for delim in [b'\t', b';', b',', b'|'] {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(1, |r| r.len())
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

fn text_cell(field: &str) -> Value {
    if field.trim().is_empty() {
        Value::Null
    } else {
        Value::String(field.to_string())
    }
}

/// Convert a calamine cell. Dates become ISO text.
pub(crate) fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => text_cell(s),
        Data::Float(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Data::Int(n) => Value::from(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(e) => Value::String(format!("#{e:?}")),
        Data::DateTime(dt) => excel_serial_text(dt.as_f64()).map_or(Value::Null, Value::String),
        Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
    }
}

/// Excel 1900-system serial to `YYYY-MM-DD` (with time when fractional).
fn excel_serial_text(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor();
    let date = epoch.checked_add_signed(TimeDelta::try_days(days as i64)?)?;
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    if seconds == 0 {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    let datetime = date
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)?;
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Trimmed display text of a cell, `None` when blank.
pub(crate) fn cell_text(row: &[Value], index: usize) -> Option<String> {
    row.get(index)
        .and_then(value_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Header names from a header row. Blank headers become `column_<n>`,
/// repeated names get a `_<n>` suffix.
pub(crate) fn header_names<F>(row: &[Value], mut rename: F) -> Vec<String>
where
    F: FnMut(&str) -> String,
{
    let mut names: Vec<String> = Vec::with_capacity(row.len());
    for (i, cell) in row.iter().enumerate() {
        let base = value_text(cell)
            .map(|s| rename(s.trim()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("column_{}", i + 1));
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Zip data rows with the header. Rows with no content are skipped; cells
/// past the header width are ignored.
pub(crate) fn records(header: &[String], rows: &[Row]) -> Vec<Record> {
    rows.iter()
        .filter(|row| !row.iter().all(is_blank))
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}
