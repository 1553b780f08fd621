use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use roseingrave_core::Location;
use roseingrave_core::WarningKind;
use tracing::info;

use super::{Context, MASTER_KEY, Report, read_index};

/// Arguments for `roseingrave check`.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Template definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Piece definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub pieces: Option<PathBuf>,

    /// Volunteer definitions file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub volunteers: Option<PathBuf>,

    /// Spreadsheets index file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,
}

/// Validate the settings, template and definitions files without writing
/// anything.
///
/// # Errors
///
/// Fails on any fatal problem, or on any warning in strict mode.
pub fn run_check(args: &CheckArgs, ctx: &mut Context) -> Result<Report> {
    let template = ctx.template(args.template.as_deref())?;
    let pieces = ctx.pieces(args.pieces.as_deref())?;
    let volunteers = ctx.volunteers(args.volunteers.as_deref(), &pieces)?;

    let index = read_index(&ctx.index_path(args.index.as_deref()))?;
    for email in index.keys().filter(|key| key.as_str() != MASTER_KEY) {
        if !volunteers.contains(email) {
            ctx.warn(
                Location::root(),
                WarningKind::UnknownVolunteer {
                    email: email.clone(),
                },
            );
        }
    }
    ctx.escalate()?;

    info!(
        pieces = pieces.len(),
        volunteers = volunteers.len(),
        "definitions are valid"
    );
    let mut report = ctx.report("check");
    report.count("fields", template.fields().len());
    report.count("pieces", pieces.len());
    report.count("only_supplemental", pieces.only_supplemental().count());
    report.count("volunteers", volunteers.len());
    report.count("spreadsheets", index.len());
    Ok(report)
}
