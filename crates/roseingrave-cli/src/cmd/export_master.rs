use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use roseingrave_core::sheet::export_master_workbook;
use roseingrave_core::store;
use roseingrave_core::{Location, WarningKind};
use serde_json::Value;
use tracing::info;

use super::{Context, MASTER_KEY, Report, read_index, read_workbook};

/// Arguments for `roseingrave export-master`.
#[derive(Args, Debug, Default)]
pub struct ExportMasterArgs {
    /// Drop sheets of unknown pieces and contributors not assigned to the
    /// piece.
    #[arg(long)]
    pub known_only: bool,

    /// Template definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Piece definitions file (used with `--known-only`).
    #[arg(long, value_name = "PATH")]
    pub pieces: Option<PathBuf>,

    /// Volunteer definitions file (used with `--known-only`).
    #[arg(long, value_name = "PATH")]
    pub volunteers: Option<PathBuf>,

    /// Summary file to write instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Spreadsheets index file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,
}

/// Read the master workbook back into the summary file.
///
/// # Errors
///
/// Fails when the index has no master workbook, on invalid inputs, on a
/// failed write, or on any warning in strict mode. An export with no
/// pieces leaves the summary file as it was.
pub fn run_export_master(args: &ExportMasterArgs, ctx: &mut Context) -> Result<Report> {
    let index = read_index(&ctx.index_path(args.index.as_deref()))?;
    let Some(master) = index.get(MASTER_KEY) else {
        bail!("master workbook (key \"{MASTER_KEY}\") not found in spreadsheets index file");
    };
    let template = ctx.template(args.template.as_deref())?;
    let assignments = if args.known_only {
        let pieces = ctx.pieces(args.pieces.as_deref())?;
        let volunteers = ctx.volunteers(args.volunteers.as_deref(), &pieces)?;
        Some(volunteers.assignments(&pieces))
    } else {
        None
    };

    let workbook = read_workbook(&PathBuf::from(master))?;
    let exported = export_master_workbook(&workbook, &template, assignments.as_ref());
    let exported = ctx.settle(exported)?;
    let summary: Vec<Value> = exported.iter().map(|master| master.to_json()).collect();

    let path = args
        .summary
        .clone()
        .unwrap_or_else(|| ctx.settings.piece_summary.clone());
    if summary.is_empty() {
        ctx.warn(Location::root(), WarningKind::NoData);
        ctx.escalate()?;
        info!(path = %path.display(), "summary file left unchanged");
        let mut report = ctx.report("export-master");
        report.count("pieces", 0);
        report.skipped.push(path.display().to_string());
        return Ok(report);
    }
    store::write_json(&path, &summary)?;
    info!(path = %path.display(), pieces = summary.len(), "wrote summary");

    let mut report = ctx.report("export-master");
    report.count("pieces", summary.len());
    report.wrote(&path);
    Ok(report)
}
