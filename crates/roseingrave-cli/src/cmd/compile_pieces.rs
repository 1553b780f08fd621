use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use roseingrave_core::aggregate::{compile_summary, piece_data};
use roseingrave_core::document::read_piece_files;
use roseingrave_core::store::{self, Placeholder};
use tracing::info;

use super::{Context, Report};

/// Arguments for `roseingrave compile-pieces`.
#[derive(Args, Debug, Default)]
pub struct CompilePiecesArgs {
    /// Template definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Piece definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub pieces: Option<PathBuf>,

    /// Piece data files to read; must contain `{piece}` once.
    #[arg(long, value_name = "PATH")]
    pub piece_data: Option<String>,

    /// Summary file to write instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,
}

/// Validate every piece data file and compile them into the summary file.
///
/// # Errors
///
/// Fails on invalid overrides or inputs, on a structural problem in a
/// piece data file, or on any warning in strict mode.
pub fn run_compile_pieces(args: &CompilePiecesArgs, ctx: &mut Context) -> Result<Report> {
    let input = Context::path_template(
        args.piece_data.as_deref(),
        &ctx.settings.piece_data,
        Placeholder::Piece,
    )?;
    let template = ctx.template(args.template.as_deref())?;
    let pieces = ctx.pieces(args.pieces.as_deref())?;
    let data = piece_data(&pieces, &template);

    let files = input.read_all()?;
    let validated = read_piece_files(&data, &files).context("validating piece data files")?;
    let validated = ctx.settle(validated)?;
    let summary = compile_summary(&data, validated);

    let path = args
        .summary
        .clone()
        .unwrap_or_else(|| ctx.settings.piece_summary.clone());
    store::write_json(&path, &summary)?;
    info!(path = %path.display(), pieces = summary.len(), "wrote summary");

    let mut report = ctx.report("compile-pieces");
    report.count("pieces", summary.len());
    report.wrote(&path);
    Ok(report)
}
