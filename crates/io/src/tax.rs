//! Tax-authority document export (one row per electronic document).

use std::path::Path;

use fiscalrec_recon::normalize::normalize_field_name;
use fiscalrec_recon::Table;

use crate::error::IoError;
use crate::table::{header_names, read_rows, records, Row};

/// Read the export; the first row is the header and every header name is
/// normalized (`"Nombre Emisor"` -> `"nombre_emisor"`).
pub fn read_tax_table(path: &Path) -> Result<Table, IoError> {
    let rows = read_rows(path)?;
    let table = tax_table_from_rows(&rows);
    log::info!(
        "{}: {} tax documents, {} columns",
        path.display(),
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

pub fn tax_table_from_rows(rows: &[Row]) -> Table {
    let Some((header, data)) = rows.split_first() else {
        return Table::default();
    };
    let columns = header_names(header, normalize_field_name);
    let records = records(&columns, data);
    Table::new(columns, records)
}
