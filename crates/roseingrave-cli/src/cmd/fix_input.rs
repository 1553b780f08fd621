use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use roseingrave_core::store;
use roseingrave_core::{PieceDefinitions, VolunteerDefinitions};
use tracing::info;

use super::{Context, Report};

/// Arguments for `roseingrave fix-input`.
#[derive(Args, Debug, Default)]
pub struct FixInputArgs {
    /// Piece definitions file to fix instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub pieces: Option<PathBuf>,

    /// Volunteer definitions file to fix instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub volunteers: Option<PathBuf>,

    /// Leave the volunteer definitions file alone.
    #[arg(long)]
    pub skip_volunteers: bool,

    /// Also rewrite the settings file with only recognized keys.
    #[arg(long)]
    pub settings: bool,

    /// Report what would be rewritten without writing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Rewrite the definitions files in place: repeats combined, supplemental
/// sources listed last, unknown pieces removed from volunteers.
///
/// # Errors
///
/// Fails when a definitions file is unreadable or has no valid entries,
/// or on any warning in strict mode (nothing is written then).
pub fn run_fix_input(args: &FixInputArgs, ctx: &mut Context) -> Result<Report> {
    let pieces_path = args
        .pieces
        .clone()
        .unwrap_or_else(|| ctx.settings.pieces.clone());
    let raw = store::read_json(&pieces_path).context("reading piece definitions file")?;
    let fixed_pieces = PieceDefinitions::fix(&raw)
        .with_context(|| format!("fixing {}", pieces_path.display()))?;
    let fixed_pieces = ctx.settle(fixed_pieces)?;

    let mut rewrites = vec![(pieces_path, fixed_pieces.clone())];

    if !args.skip_volunteers {
        let pieces = PieceDefinitions::from_json(&fixed_pieces)?.value;
        let volunteers_path = args
            .volunteers
            .clone()
            .unwrap_or_else(|| ctx.settings.volunteers.clone());
        let raw = store::read_json(&volunteers_path).context("reading volunteer definitions file")?;
        let fixed = VolunteerDefinitions::fix(&raw, &pieces)
            .with_context(|| format!("fixing {}", volunteers_path.display()))?;
        rewrites.push((volunteers_path, ctx.settle(fixed)?));
    }

    let settings = if args.settings {
        match &ctx.settings_file.location {
            Some((path, _)) => Some((path.clone(), ctx.settings_file.normalized()?)),
            None => {
                info!("no settings file to fix");
                None
            }
        }
    } else {
        None
    };

    let mut report = ctx.report("fix-input");
    if args.dry_run {
        report
            .skipped
            .extend(rewrites.iter().map(|(path, _)| path.display().to_string()));
        if let Some((path, _)) = &settings {
            report.skipped.push(path.display().to_string());
        }
        return Ok(report);
    }

    for (path, fixed) in &rewrites {
        store::write_json(path, fixed)?;
        info!(path = %path.display(), "fixed definitions");
        report.wrote(path);
    }
    if let Some((path, content)) = settings {
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "fixed settings");
        report.wrote(&path);
    }
    Ok(report)
}
