use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use roseingrave_core::sheet::render_volunteer_workbook;
use roseingrave_core::store::Placeholder;
use roseingrave_core::{Location, Volunteer, WarningKind};
use tracing::{debug, info};

use super::{Context, Report, read_index, write_index, write_workbook};

/// Arguments for `roseingrave create-sheets`.
#[derive(Args, Debug, Default)]
pub struct CreateSheetsArgs {
    /// Volunteers to create workbooks for (default: every volunteer).
    #[arg(value_name = "EMAIL")]
    pub emails: Vec<String>,

    /// Re-render workbooks of volunteers already in the spreadsheets index.
    #[arg(short, long)]
    pub replace: bool,

    /// Create workbooks at the configured path for every volunteer, even
    /// those already in the spreadsheets index.
    #[arg(short, long)]
    pub new: bool,

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

    /// Workbook path for each volunteer; must contain `{email}` once.
    #[arg(long, value_name = "PATH")]
    pub volunteer_sheets: Option<String>,
}

/// Render one workbook per volunteer and record it in the spreadsheets
/// index.
///
/// # Errors
///
/// Fails on invalid overrides or definitions, on a failed write, or on any
/// warning in strict mode.
pub fn run_create_sheets(args: &CreateSheetsArgs, ctx: &mut Context) -> Result<Report> {
    let sheets = Context::path_template(
        args.volunteer_sheets.as_deref(),
        &ctx.settings.volunteer_sheets,
        Placeholder::Email,
    )?;
    let template = ctx.template(args.template.as_deref())?;
    let pieces = ctx.pieces(args.pieces.as_deref())?;
    let volunteers = ctx.volunteers(args.volunteers.as_deref(), &pieces)?;
    let index_path = ctx.index_path(args.index.as_deref());
    let mut index = read_index(&index_path)?;

    let selected: Vec<&Volunteer> = if args.emails.is_empty() {
        volunteers.iter().collect()
    } else {
        let mut selected = Vec::new();
        for email in &args.emails {
            match volunteers.get(email) {
                Some(volunteer) => selected.push(volunteer),
                None => ctx.warn(
                    Location::root(),
                    WarningKind::UnknownVolunteer {
                        email: email.clone(),
                    },
                ),
            }
        }
        selected
    };
    ctx.escalate()?;

    let mut targets: Vec<(&Volunteer, PathBuf)> = Vec::new();
    let mut skipped = Vec::new();
    let mut index_changed = false;
    for volunteer in selected {
        let email = volunteer.email();
        match index.get(email) {
            Some(existing) if !args.new => {
                if args.replace {
                    targets.push((volunteer, PathBuf::from(existing)));
                } else {
                    debug!(volunteer = email, "already has a workbook; skipping");
                    skipped.push(email.to_string());
                }
            }
            _ => {
                let path = sheets.resolve(email);
                index.insert(email.to_string(), path.display().to_string());
                index_changed = true;
                targets.push((volunteer, path));
            }
        }
    }

    let mut report = ctx.report("create-sheets");
    report.skipped = skipped;
    if targets.is_empty() {
        info!("no volunteers to create workbooks for");
        return Ok(report);
    }

    info!(count = targets.len(), "rendering volunteer workbooks");
    for (volunteer, path) in &targets {
        let workbook = render_volunteer_workbook(volunteer, &pieces, &template);
        write_workbook(path, &workbook)?;
        report.wrote(path);
    }
    if index_changed {
        write_index(&index_path, &index)?;
        report.wrote(&index_path);
    }
    Ok(report)
}
