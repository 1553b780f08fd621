use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use indexmap::IndexMap;
use roseingrave_core::sheet::export_volunteer_workbook;
use roseingrave_core::store::Placeholder;
use roseingrave_core::{Location, VolunteerDefinitions, WarningKind};
use serde_json::Value;
use tracing::info;

use super::{Context, MASTER_KEY, Report, read_index, read_workbook};

/// Arguments for `roseingrave volunteer-summary`.
#[derive(Args, Debug, Default)]
pub struct VolunteerSummaryArgs {
    /// Volunteers to export (default: every volunteer in the index).
    #[arg(value_name = "EMAIL")]
    pub emails: Vec<String>,

    /// Skip sheets of pieces not assigned to the volunteer, and volunteers
    /// missing from the volunteer definitions.
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

    /// Spreadsheets index file to use instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,

    /// Output path for each volunteer; must contain `{email}` once.
    #[arg(long, value_name = "PATH")]
    pub volunteer_data: Option<String>,
}

/// Export every indexed volunteer workbook into a volunteer data file.
///
/// A workbook that cannot be read is skipped with a warning.
///
/// # Errors
///
/// Fails on invalid overrides or inputs, on a failed write, or on any
/// warning in strict mode (nothing is written then).
pub fn run_volunteer_summary(args: &VolunteerSummaryArgs, ctx: &mut Context) -> Result<Report> {
    let output = Context::path_template(
        args.volunteer_data.as_deref(),
        &ctx.settings.volunteer_data,
        Placeholder::Email,
    )?;
    let mut index = read_index(&ctx.index_path(args.index.as_deref()))?;
    index.swap_remove(MASTER_KEY);
    let template = ctx.template(args.template.as_deref())?;
    let known: Option<VolunteerDefinitions> = if args.known_only {
        let pieces = ctx.pieces(args.pieces.as_deref())?;
        Some(ctx.volunteers(args.volunteers.as_deref(), &pieces)?)
    } else {
        None
    };

    if !args.emails.is_empty() {
        let mut filtered = IndexMap::new();
        for email in &args.emails {
            match index.swap_remove(email) {
                Some(path) => {
                    filtered.insert(email.clone(), path);
                }
                None => ctx.warn(
                    Location::root(),
                    WarningKind::NotIndexed {
                        email: email.clone(),
                    },
                ),
            }
        }
        index = filtered;
    }

    info!(count = index.len(), "exporting volunteer workbooks");
    let mut data: IndexMap<String, Value> = IndexMap::new();
    for (email, path) in &index {
        let at = Location::volunteer(email);
        let assigned = match &known {
            None => None,
            Some(volunteers) => {
                let Some(volunteer) = volunteers.get(email) else {
                    ctx.warn(
                        Location::root(),
                        WarningKind::UnknownVolunteer {
                            email: email.clone(),
                        },
                    );
                    continue;
                };
                Some(volunteer)
            }
        };
        let workbook = match read_workbook(&PathBuf::from(path)) {
            Ok(workbook) => workbook,
            Err(err) => {
                ctx.warn(
                    at,
                    WarningKind::SheetExportFailed {
                        reason: format!("{err:#}"),
                    },
                );
                continue;
            }
        };
        let exported = export_volunteer_workbook(email, &workbook, &template, assigned);
        data.insert(email.clone(), Value::Array(ctx.settle(exported)?));
    }
    ctx.escalate()?;

    let mut report = ctx.report("volunteer-summary");
    if data.is_empty() {
        info!("no volunteer data to write");
        return Ok(report);
    }
    for path in output.write_all(data.iter().map(|(email, doc)| (email.as_str(), doc)))? {
        report.wrote(&path);
    }
    Ok(report)
}
