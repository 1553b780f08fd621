//! Tabular sheet abstraction.
//!
//! A [`Workbook`] is a titled, ordered set of sheets; each sheet is a
//! [`Grid`] of cell values plus, for rendered sheets, the [`SheetAnchors`]
//! a formatting collaborator needs (where the header rows, blank rows,
//! comments row and special columns are). One sheet lays out one piece.
//!
//! Workbooks are the hand-off format with the spreadsheet collaborator:
//! rendered workbooks are written for it to upload, and exported workbooks
//! are read back from it.

pub mod grid;
pub mod hyperlink;
pub mod layout;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::definitions::PieceDefinitions;
use crate::diagnostics::{Checked, Location, WarningKind, Warnings};
use crate::document::{PieceDocument, SummaryFile};
use crate::error::ErrorCode;
use crate::model::Volunteer;
use crate::template::{Template, ValidationRule};

pub use grid::{Grid, col_letter};
pub use layout::{
    ExportedMaster, export_master_sheet, export_volunteer_sheet, render_master_sheet,
    render_volunteer_sheet,
};

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("sheet \"{sheet}\": column {column} doesn't have a valid hyperlink")]
    InvalidHyperlinkColumn { sheet: String, column: String },
    #[error("sheet \"{sheet}\": {reason}")]
    Malformed { sheet: String, reason: String },
}

impl SheetError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidHyperlinkColumn { .. } => ErrorCode::InvalidHyperlinkColumn,
            Self::Malformed { .. } => ErrorCode::MalformedSheet,
        }
    }
}

/// A metadata row that carries a cell validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRule {
    pub row: usize,
    pub rule: ValidationRule,
}

/// Row and column positions of a rendered sheet (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetAnchors {
    pub first_header_row: usize,
    pub blank_row1: usize,
    pub blank_row2: usize,
    pub comments_row: usize,
    pub notes_col: usize,
    /// First column of each source (of each source group on master sheets).
    pub source_cols: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_col: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<RowRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub values: Grid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<SheetAnchors>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub title: String,
    pub sheets: IndexMap<String, Sheet>,
}

impl Workbook {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sheets: IndexMap::new(),
        }
    }
}

/// Render a volunteer's workbook: one sheet per assigned piece.
#[must_use]
pub fn render_volunteer_workbook(
    volunteer: &Volunteer,
    pieces: &PieceDefinitions,
    template: &Template,
) -> Workbook {
    let title = template.volunteer_spreadsheet.title_for(volunteer.email());
    info!(volunteer = volunteer.email(), "rendering volunteer workbook");
    let mut workbook = Workbook::new(title);
    for piece in volunteer.pieces().filter_map(|title| pieces.get(title)) {
        workbook
            .sheets
            .insert(piece.name().to_string(), render_volunteer_sheet(piece, template));
    }
    workbook
}

/// Render the master workbook from the summary: one sheet per piece.
#[must_use]
pub fn render_master_workbook(
    summary: &IndexMap<String, PieceDocument<SummaryFile>>,
    pieces: &PieceDefinitions,
    template: &Template,
) -> Workbook {
    info!(count = summary.len(), "rendering master workbook");
    let mut workbook = Workbook::new(template.master_spreadsheet.title.clone());
    for (title, document) in summary {
        let Some(piece) = pieces.get(title) else {
            continue;
        };
        workbook
            .sheets
            .insert(title.clone(), render_master_sheet(piece, document, template));
    }
    workbook
}

/// Export every sheet of a volunteer's workbook into piece submissions.
///
/// With `assigned`, sheets for pieces not assigned to the volunteer are
/// skipped with a warning. Sheets that fail to export are skipped with a
/// warning.
#[must_use]
pub fn export_volunteer_workbook(
    email: &str,
    workbook: &Workbook,
    template: &Template,
    assigned: Option<&Volunteer>,
) -> Checked<Vec<Value>> {
    debug!(volunteer = email, "exporting volunteer workbook");
    let at = Location::volunteer(email);
    let mut warnings = Warnings::new();
    let mut pieces = Vec::new();
    for (title, sheet) in &workbook.sheets {
        if let Some(volunteer) = assigned {
            if !volunteer.has_piece(title) {
                warnings.push(
                    at.clone(),
                    WarningKind::UnassignedPiece {
                        title: title.clone(),
                    },
                );
                continue;
            }
        }
        match export_volunteer_sheet(title, &sheet.values, template) {
            Ok(piece) => pieces.push(piece),
            Err(err) => warnings.push(
                at.clone(),
                WarningKind::SheetExportFailed {
                    reason: err.to_string(),
                },
            ),
        }
    }
    Checked::new(pieces, warnings)
}

/// Export the master workbook into summary documents.
///
/// With `assignments` (piece title to assigned emails), sheets for unknown
/// pieces are skipped and contributors not assigned to a piece are dropped,
/// each with one warning.
#[must_use]
pub fn export_master_workbook(
    workbook: &Workbook,
    template: &Template,
    assignments: Option<&IndexMap<String, IndexSet<String>>>,
) -> Checked<Vec<ExportedMaster>> {
    info!(sheets = workbook.sheets.len(), "exporting master workbook");
    let mut warnings = Warnings::new();
    let mut exported = Vec::new();
    for (title, sheet) in &workbook.sheets {
        let at = Location::sheet(title);
        let assigned = match assignments {
            None => None,
            Some(assignments) => {
                let Some(emails) = assignments.get(title) else {
                    warnings.push(
                        at,
                        WarningKind::UnknownPiece {
                            title: title.clone(),
                        },
                    );
                    continue;
                };
                Some(emails)
            }
        };
        match export_master_sheet(title, &sheet.values, template) {
            Ok(checked) => {
                let mut master = checked.absorb(&mut warnings);
                if let Some(emails) = assigned {
                    filter_known_volunteers(&mut master.document, emails, &mut warnings);
                }
                exported.push(master);
            }
            Err(err) => warnings.push(
                at,
                WarningKind::SheetExportFailed {
                    reason: err.to_string(),
                },
            ),
        }
    }
    Checked::new(exported, warnings)
}

/// Drop contributors not in `assigned` from every source and from the
/// notes, warning once per dropped contributor. The summary slot is kept.
pub fn filter_known_volunteers(
    document: &mut PieceDocument<SummaryFile>,
    assigned: &IndexSet<String>,
    warnings: &mut Warnings,
) {
    let mut removed: IndexSet<String> = IndexSet::new();
    for source in document.sources.values_mut() {
        source.data.volunteers_mut().retain(|email, _| {
            let keep = assigned.contains(email);
            if !keep {
                removed.insert(email.clone());
            }
            keep
        });
    }
    for (key, value) in &mut document.notes {
        let Value::Object(annotations) = value else {
            continue;
        };
        if key == crate::shape::BARS {
            for bar in annotations.values_mut() {
                if let Value::Object(bar) = bar {
                    drop_unassigned(bar, assigned, &mut removed);
                }
            }
        } else {
            drop_unassigned(annotations, assigned, &mut removed);
        }
    }
    let at = Location::piece(&document.title);
    for email in removed {
        warnings.push(at.clone(), WarningKind::UnknownVolunteer { email });
    }
}

fn drop_unassigned(
    annotations: &mut serde_json::Map<String, Value>,
    assigned: &IndexSet<String>,
    removed: &mut IndexSet<String>,
) {
    annotations.retain(|email, _| {
        let keep = assigned.contains(email);
        if !keep {
            removed.insert(email.clone());
        }
        keep
    });
}
