//! `fiscalrec run` / `fiscalrec validate`: config-driven reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use fiscalrec_io::{read_ledger_table, read_tax_table, write_report, BaseSheet, IoError, RenderOptions};
use fiscalrec_recon::normalize::QualityLog;
use fiscalrec_recon::unify::fields;
use fiscalrec_recon::{ReconConfig, ReconError, ReconInput, ReconResult};
use serde_json::json;

use crate::exit_codes::{
    io_exit_code, recon_exit_code, EXIT_ERROR, EXIT_RECON_QUALITY, EXIT_RECON_RUNTIME, EXIT_USAGE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile a tax-authority export against a ledger export and write the report
    #[command(after_help = "\
Examples:
  fiscalrec run monthly.recon.toml --tax dian.xlsx --ledger auxiliar.xlsx
  fiscalrec run monthly.recon.toml --tax dian.csv --ledger auxiliar.csv --output close.xlsx
  fiscalrec run monthly.recon.toml --tax dian.xlsx --ledger auxiliar.xlsx --json
  fiscalrec run monthly.recon.toml --tax dian.xlsx --ledger auxiliar.xlsx --summary summary.json --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Tax-authority document export (xlsx, xls, ods or csv)
        #[arg(long)]
        tax: PathBuf,

        /// Accounting ledger detail export (xlsx, xls, ods or csv)
        #[arg(long)]
        ledger: PathBuf,

        /// Report workbook to write
        #[arg(long, short = 'o', default_value = "reconciliation.xlsx")]
        output: PathBuf,

        /// Print the full result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the run summary as JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Exit with code 62 when data-quality warnings were recorded
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  fiscalrec validate monthly.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, tax, ledger, output, json, summary, strict } => {
            cmd_recon_run(&config, &tax, &ledger, &output, json, summary.as_deref(), strict)
        }
        ReconCommands::Validate { config } => cmd_recon_validate(&config),
    }
}

fn recon_err(err: ReconError) -> CliError {
    let hint = match &err {
        ReconError::MissingField { side, binding, .. } if side == "report" => Some(format!(
            "'{binding}' must name a unified field ({}) or a column of the input files",
            fields::ALL.join(", ")
        )),
        ReconError::MissingField { binding, .. } => {
            Some(format!("check the '{binding}' binding in the config against the file's header row"))
        }
        _ => None,
    };
    let cli = CliError::new(recon_exit_code(&err), err.to_string());
    match hint {
        Some(hint) => cli.with_hint(hint),
        None => cli,
    }
}

fn io_err(err: IoError) -> CliError {
    match err {
        IoError::Recon(inner) => recon_err(inner),
        IoError::UnsupportedFormat(_) => CliError::new(io_exit_code(&err), err.to_string())
            .with_hint("supported inputs: .xlsx .xlsm .xlsb .xls .ods .csv .tsv .txt"),
        other => CliError::new(io_exit_code(&other), other.to_string()),
    }
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_USAGE, format!("cannot read config {}: {e}", path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(recon_err)
}

fn require_file(path: &Path, what: &str) -> Result<(), CliError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::new(EXIT_USAGE, format!("{what} file not found: {}", path.display())))
    }
}

fn cmd_recon_run(
    config_path: &Path,
    tax_path: &Path,
    ledger_path: &Path,
    output: &Path,
    json_output: bool,
    summary_file: Option<&Path>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    require_file(tax_path, "tax")?;
    require_file(ledger_path, "ledger")?;

    let tax = read_tax_table(tax_path).map_err(io_err)?;
    let mut ingestion = QualityLog::new("ledger");
    let ledger = read_ledger_table(ledger_path, &config.ledger, &mut ingestion).map_err(io_err)?;
    let input = ReconInput {
        tax,
        ledger,
        ingestion: ingestion.summary(),
    };
    log::info!(
        "config '{}': {} view(s), {} tax rows, {} ledger lines",
        config.name,
        config.views.len(),
        input.tax.len(),
        input.ledger.len(),
    );

    let result = fiscalrec_recon::run(&config, &input).map_err(recon_err)?;

    let bases = if config.report.base_sheets {
        vec![
            BaseSheet { name: &config.report.tax_base_sheet, table: &input.tax },
            BaseSheet { name: &config.report.ledger_base_sheet, table: &input.ledger },
        ]
    } else {
        Vec::new()
    };
    write_report(output, &result, &RenderOptions::default(), &bases).map_err(io_err)?;
    eprintln!("wrote {}", output.display());

    if let Some(path) = summary_file {
        let summary_str = serde_json::to_string_pretty(&summary_json(&result))
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        std::fs::write(path, summary_str).map_err(|e| {
            CliError::new(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display()))
        })?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    for view in &result.views {
        let s = &view.summary;
        eprintln!(
            "{}: {} matched, {} tax only, {} ledger only, {} dropped as noise, difference {:.2}",
            view.name, s.matched, s.left_only, s.right_only, s.dropped_as_noise, s.total_difference,
        );
    }
    let warnings = result.summary.data_quality_warnings;
    if warnings > 0 {
        eprintln!("{warnings} data-quality warning(s); rerun with --log debug to list all of them");
    }

    if strict && warnings > 0 {
        return Err(CliError::new(
            EXIT_RECON_QUALITY,
            format!("{warnings} data-quality warning(s) recorded (--strict)"),
        ));
    }
    Ok(())
}

/// Run metadata plus per-view counts and totals, without the row data.
fn summary_json(result: &ReconResult) -> serde_json::Value {
    json!({
        "meta": result.meta,
        "summary": result.summary,
        "views": result
            .views
            .iter()
            .map(|v| json!({ "name": v.name, "sheet": v.sheet, "summary": v.summary }))
            .collect::<Vec<_>>(),
    })
}

fn cmd_recon_validate(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let views: Vec<&str> = config.views.iter().map(|v| v.name.as_str()).collect();
    eprintln!(
        "valid: recon '{}' with {} view(s): {}",
        config.name,
        views.len(),
        views.join(", "),
    );
    Ok(())
}
