use std::path::PathBuf;

use fiscalrec_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open workbook {}: {message}", .path.display())]
    Workbook { path: PathBuf, message: String },
    #[error("{}: workbook has no worksheets", .path.display())]
    NoSheets { path: PathBuf },
    #[error("{}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unsupported file type: {} (expected .xlsx, .xls, .ods or .csv)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("cannot write report: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),
    #[error("cannot save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
    #[error(transparent)]
    Recon(#[from] ReconError),
}
