//! `fiscalrec-recon`: tax-authority ledger vs accounting ledger reconciliation.
//!
//! Pure engine crate: receives pre-loaded tables, returns unified rows and
//! grouped reports per view. No CLI or IO dependencies.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod key;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;
pub mod unify;
pub mod view;

pub use config::ReconConfig;
pub use engine::{build_report, reconcile_and_unify, run};
pub use error::ReconError;
pub use model::{Outcome, ReconInput, ReconResult, Record, Table};
pub use report::{GroupedReport, GroupedRow, RowKind};
pub use unify::UnifiedRow;
