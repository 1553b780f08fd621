use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use roseingrave_core::aggregate::piece_data;
use roseingrave_core::document::read_summary;
use roseingrave_core::sheet::render_master_workbook;
use roseingrave_core::store;
use tracing::{info, warn};

use super::{Context, MASTER_KEY, Report, read_index, write_index, write_workbook};

/// Arguments for `roseingrave import-master`.
#[derive(Args, Debug, Default)]
pub struct ImportMasterArgs {
    /// Write the master workbook to the configured path even if the index
    /// already names one.
    #[arg(short, long)]
    pub create: bool,

    /// Template definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Piece definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub pieces: Option<PathBuf>,

    /// Summary file to read instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Spreadsheets index file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,
}

/// Render the master workbook from the summary file.
///
/// # Errors
///
/// Fails on invalid inputs, on a summary file with missing data, on a
/// failed write, or on any warning in strict mode.
pub fn run_import_master(args: &ImportMasterArgs, ctx: &mut Context) -> Result<Report> {
    warn!("for the most accurate summary, run `compile-pieces` or `export-master` first");

    let template = ctx.template(args.template.as_deref())?;
    let pieces = ctx.pieces(args.pieces.as_deref())?;
    let data = piece_data(&pieces, &template);

    let summary_path = args
        .summary
        .clone()
        .unwrap_or_else(|| ctx.settings.piece_summary.clone());
    let raw = store::read_json(&summary_path).context("reading summary file")?;
    let summary = read_summary(&data, &raw)
        .with_context(|| format!("validating {}", summary_path.display()))?;
    let summary = ctx.settle(summary)?;

    let index_path = ctx.index_path(args.index.as_deref());
    let mut index = read_index(&index_path)?;
    let existing = if args.create {
        None
    } else {
        index.get(MASTER_KEY).map(PathBuf::from)
    };
    let (master_path, created) = match existing {
        Some(path) => (path, false),
        None => (ctx.settings.master_sheet.clone(), true),
    };

    let workbook = render_master_workbook(&summary, &pieces, &template);
    write_workbook(&master_path, &workbook)?;
    info!(path = %master_path.display(), sheets = workbook.sheets.len(), "wrote master workbook");

    let mut report = ctx.report("import-master");
    report.count("pieces", workbook.sheets.len());
    report.wrote(&master_path);
    if created {
        index.insert(MASTER_KEY.to_string(), master_path.display().to_string());
        write_index(&index_path, &index)?;
        report.wrote(&index_path);
    }
    Ok(report)
}
