//! `fiscalrec-io`: reading the tax and ledger exports, writing the
//! grouped Excel report.

pub mod error;
pub mod ledger;
pub mod table;
pub mod tax;
pub mod xlsx;

pub use error::IoError;
pub use ledger::read_ledger_table;
pub use tax::read_tax_table;
pub use xlsx::{write_report, BaseSheet, RenderOptions};
