//! Volunteer → piece aggregation and summary compilation.
//!
//! Volunteer submissions are validated against the known pieces, then
//! folded per piece: contributor rows under each source keyed by email, and
//! piece notes grouped by email. Only pieces somebody contributed to are
//! kept.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::info;

use crate::definitions::PieceDefinitions;
use crate::diagnostics::{Checked, Location, WarningKind, Warnings};
use crate::document::{
    DocumentError, PieceDocument, PieceFile, SourceEntry, SummaryFile, read_volunteer_submissions,
};
use crate::piece_data::PieceData;
use crate::summary::{SourceSummary, SummarySlot};
use crate::template::Template;

/// Aggregation scaffolding for every known piece, in definition order.
#[must_use]
pub fn piece_data(pieces: &PieceDefinitions, template: &Template) -> IndexMap<String, PieceData> {
    pieces
        .iter()
        .map(|piece| (piece.name().to_string(), PieceData::new(piece, template)))
        .collect()
}

/// Fold every volunteer's submissions into per-piece aggregates.
///
/// Unknown pieces and sources are reported once each and skipped. The
/// result holds only pieces with at least one submission, in definition
/// order.
///
/// # Errors
///
/// Fails on any structural problem in a submission, or, with `strict`,
/// when any warning was recorded.
pub fn extract_piece_summaries(
    pieces: &IndexMap<String, PieceData>,
    volunteer_docs: &IndexMap<String, Value>,
    strict: bool,
) -> Result<Checked<IndexMap<String, PieceData>>, DocumentError> {
    let Checked {
        value: submissions,
        warnings,
    } = read_volunteer_submissions(pieces, volunteer_docs)?;

    let mut seen: IndexMap<&str, PieceData> = IndexMap::new();
    for (email, documents) in &submissions {
        for (title, document) in documents {
            let Some(data) = pieces.get(title) else {
                continue;
            };
            seen.entry(data.name())
                .or_insert_with(|| data.clone())
                .add_volunteer(email, document);
        }
    }

    let summaries: IndexMap<String, PieceData> = pieces
        .keys()
        .filter_map(|title| seen.swap_remove(title.as_str()).map(|data| (title.clone(), data)))
        .collect();
    info!(pieces = summaries.len(), "extracted piece summaries");
    Ok(Checked::new(summaries, warnings).escalate(strict)?)
}

/// Keep only the named pieces, warning for names that are unknown or that
/// nobody contributed to.
#[must_use]
pub fn restrict_pieces(
    summaries: IndexMap<String, PieceData>,
    names: &[String],
    known: &PieceDefinitions,
) -> Checked<IndexMap<String, PieceData>> {
    if names.is_empty() {
        return Checked::clean(summaries);
    }
    let mut warnings = Warnings::new();
    let mut summaries = summaries;
    let mut kept = IndexMap::new();
    for name in names {
        if !known.contains(name) {
            warnings.push(Location::root(), WarningKind::UnknownPiece {
                title: name.clone(),
            });
        } else if let Some(data) = summaries.swap_remove(name) {
            kept.insert(name.clone(), data);
        } else {
            warnings.push(Location::piece(name), WarningKind::NoData);
        }
    }
    Checked::new(kept, warnings)
}

/// Promote a piece file to a summary document: every source keeps its
/// contributor rows and starts with an empty summary slot.
#[must_use]
pub fn into_summary(document: PieceDocument<PieceFile>) -> PieceDocument<SummaryFile> {
    let sources = document
        .sources
        .into_iter()
        .map(|(name, entry)| {
            let entry = SourceEntry {
                name: entry.name,
                link: entry.link,
                data: SourceSummary::new(entry.data, SummarySlot::Empty),
            };
            (name, entry)
        })
        .collect();
    PieceDocument {
        title: document.title,
        link: document.link,
        sources,
        notes: document.notes,
    }
}

/// Serialize validated piece files as the summary file.
#[must_use]
pub fn compile_summary(
    pieces: &IndexMap<String, PieceData>,
    piece_files: IndexMap<String, PieceDocument<PieceFile>>,
) -> Vec<Value> {
    info!(pieces = piece_files.len(), "compiling summary");
    piece_files
        .into_values()
        .filter_map(|document| {
            let empty_row = pieces.get(&document.title)?.make_default();
            Some(into_summary(document).to_json(&empty_row))
        })
        .collect()
}
