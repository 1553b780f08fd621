use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use roseingrave_core::aggregate::{extract_piece_summaries, piece_data, restrict_pieces};
use roseingrave_core::store::Placeholder;
use serde_json::Value;
use tracing::info;

use super::{Context, Report};

/// Arguments for `roseingrave piece-summary`.
#[derive(Args, Debug, Default)]
pub struct PieceSummaryArgs {
    /// Pieces to write (default: every piece with data).
    #[arg(value_name = "PIECE")]
    pub pieces: Vec<String>,

    /// Template definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Piece definitions file to use instead of the configured one.
    #[arg(long = "pieces", value_name = "PATH")]
    pub definitions: Option<PathBuf>,

    /// Volunteer data files to read; must contain `{email}` once.
    #[arg(long, value_name = "PATH")]
    pub volunteer_data: Option<String>,

    /// Output path for each piece; must contain `{piece}` once.
    #[arg(long, value_name = "PATH")]
    pub piece_data: Option<String>,
}

/// Fold every volunteer data file into one data file per piece.
///
/// # Errors
///
/// Fails on invalid overrides or inputs, on a structural problem in a
/// volunteer data file, or on any warning in strict mode.
pub fn run_piece_summary(args: &PieceSummaryArgs, ctx: &mut Context) -> Result<Report> {
    let input = Context::path_template(
        args.volunteer_data.as_deref(),
        &ctx.settings.volunteer_data,
        Placeholder::Email,
    )?;
    let output = Context::path_template(
        args.piece_data.as_deref(),
        &ctx.settings.piece_data,
        Placeholder::Piece,
    )?;
    let template = ctx.template(args.template.as_deref())?;
    let definitions = ctx.pieces(args.definitions.as_deref())?;
    let data = piece_data(&definitions, &template);

    let docs = input.read_all()?;
    let summaries = extract_piece_summaries(&data, &docs, ctx.strict)
        .context("aggregating volunteer data")?;
    let summaries = ctx.settle(summaries)?;
    let summaries = ctx.settle(restrict_pieces(summaries, &args.pieces, &definitions))?;

    let mut report = ctx.report("piece-summary");
    report.count("volunteers", docs.len());
    report.count("pieces", summaries.len());
    if summaries.is_empty() {
        info!("no piece data to write");
        return Ok(report);
    }
    let files: Vec<(&str, Value)> = summaries
        .iter()
        .map(|(title, piece)| (title.as_str(), piece.to_json()))
        .collect();
    for path in output.write_all(files.iter().map(|(title, doc)| (*title, doc)))? {
        report.wrote(&path);
    }
    Ok(report)
}
