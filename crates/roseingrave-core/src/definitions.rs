//! Piece and volunteer definitions files.
//!
//! Repeated entries are combined by identity (piece title, volunteer email).
//! After combining, pieces are partitioned into normal pieces (at least one
//! primary source), supplemental-only pieces (set aside with a warning) and
//! empty pieces (fatal, reported together for the whole file).

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::info;

use crate::diagnostics::{Checked, Location, WarningKind, Warnings};
use crate::error::ErrorCode;
use crate::model::{Combine, EntityError, Piece, Volunteer};

#[derive(Debug, thiserror::Error)]
pub enum DefinitionsError {
    #[error("{kind} definitions must be a JSON list")]
    NotAList { kind: &'static str },
    #[error("no {kind} found")]
    Empty { kind: &'static str },
    #[error("piece {index}: {cause}")]
    Piece {
        index: usize,
        #[source]
        cause: EntityError,
    },
    #[error("volunteer {index}: {cause}")]
    Volunteer {
        index: usize,
        #[source]
        cause: EntityError,
    },
    #[error("no sources found for pieces {}", quote_all(.0))]
    PiecesWithoutSources(Vec<String>),
    #[error("no known pieces found for volunteers {}", quote_all(.0))]
    VolunteersWithoutPieces(Vec<String>),
    #[error("no valid {kind} to write back")]
    NothingToWrite { kind: &'static str },
}

fn quote_all(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

impl DefinitionsError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotAList { .. } => ErrorCode::InvalidFieldValue,
            Self::Empty { .. } | Self::NothingToWrite { .. } => ErrorCode::NoDefinitions,
            Self::Piece { cause, .. } | Self::Volunteer { cause, .. } => cause.code(),
            Self::PiecesWithoutSources(_) => ErrorCode::EmptyPiece,
            Self::VolunteersWithoutPieces(_) => ErrorCode::EmptyVolunteer,
        }
    }
}

fn entries<'a>(raw: &'a Value, kind: &'static str) -> Result<&'a Vec<Value>, DefinitionsError> {
    let list = raw.as_array().ok_or(DefinitionsError::NotAList { kind })?;
    if list.is_empty() {
        return Err(DefinitionsError::Empty { kind });
    }
    Ok(list)
}

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

/// The known pieces, keyed by title in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceDefinitions {
    pieces: IndexMap<String, Piece>,
    only_supplemental: IndexMap<String, Piece>,
}

/// Pieces after combining, before the empty-piece check.
struct Collected {
    definitions: PieceDefinitions,
    without_sources: Vec<String>,
}

impl PieceDefinitions {
    fn collect(raw: &Value, warnings: &mut Warnings) -> Result<Collected, DefinitionsError> {
        let mut combined: IndexMap<String, Piece> = IndexMap::new();
        for (index, entry) in entries(raw, "pieces")?.iter().enumerate() {
            let piece = Piece::from_json(entry, warnings)
                .map_err(|cause| DefinitionsError::Piece { index, cause })?;
            match combined.get_mut(piece.name()) {
                Some(existing) => {
                    let at = Location::piece(existing.name());
                    existing.combine(piece, &at, warnings);
                }
                None => {
                    combined.insert(piece.name().to_string(), piece);
                }
            }
        }

        let mut definitions = Self::default();
        let mut without_sources = Vec::new();
        for (title, piece) in combined {
            if piece.only_supplemental() {
                warnings.push(Location::piece(&title), WarningKind::OnlySupplemental);
                definitions.only_supplemental.insert(title, piece);
            } else if piece.has_no_sources() {
                without_sources.push(title);
            } else {
                definitions.pieces.insert(title, piece);
            }
        }
        Ok(Collected {
            definitions,
            without_sources,
        })
    }

    /// Read the piece-definitions file.
    ///
    /// # Errors
    ///
    /// Fails on a malformed entry (reported by index), an empty file, or
    /// any piece without sources (all such pieces reported at once).
    pub fn from_json(raw: &Value) -> Result<Checked<Self>, DefinitionsError> {
        info!("reading piece definitions");
        let mut warnings = Warnings::new();
        let collected = Self::collect(raw, &mut warnings)?;
        if !collected.without_sources.is_empty() {
            for title in &collected.without_sources {
                tracing::error!(piece = %title, "no sources found");
            }
            return Err(DefinitionsError::PiecesWithoutSources(
                collected.without_sources,
            ));
        }
        Ok(Checked::new(collected.definitions, warnings))
    }

    /// Rewrite the piece-definitions file: repeats combined, supplemental
    /// sources after primary ones, supplemental-only pieces at the end.
    /// Pieces without sources are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Fails on a malformed entry or when no piece survives.
    pub fn fix(raw: &Value) -> Result<Checked<Value>, DefinitionsError> {
        info!("fixing piece definitions");
        let mut warnings = Warnings::new();
        let collected = Self::collect(raw, &mut warnings)?;
        for title in &collected.without_sources {
            warnings.push(Location::piece(title), WarningKind::NoSources);
        }
        let definitions = collected.definitions;
        let fixed: Vec<Value> = definitions
            .pieces
            .values()
            .chain(definitions.only_supplemental.values())
            .map(|piece| piece.to_json(true))
            .collect();
        if fixed.is_empty() {
            return Err(DefinitionsError::NothingToWrite { kind: "pieces" });
        }
        Ok(Checked::new(Value::Array(fixed), warnings))
    }

    #[must_use]
    pub fn get(&self, title: &str) -> Option<&Piece> {
        self.pieces.get(title)
    }

    #[must_use]
    pub fn contains(&self, title: &str) -> bool {
        self.pieces.contains_key(title)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.values()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.pieces.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Pieces set aside because every source is supplemental.
    pub fn only_supplemental(&self) -> impl Iterator<Item = &Piece> {
        self.only_supplemental.values()
    }
}

impl FromIterator<Piece> for PieceDefinitions {
    /// Combine-free construction for callers that already hold valid pieces.
    fn from_iter<I: IntoIterator<Item = Piece>>(iter: I) -> Self {
        let mut definitions = Self::default();
        for piece in iter {
            let title = piece.name().to_string();
            if piece.only_supplemental() {
                definitions.only_supplemental.insert(title, piece);
            } else {
                definitions.pieces.insert(title, piece);
            }
        }
        definitions
    }
}

// ---------------------------------------------------------------------------
// Volunteers
// ---------------------------------------------------------------------------

/// The known volunteers, keyed by email in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolunteerDefinitions {
    volunteers: IndexMap<String, Volunteer>,
}

impl VolunteerDefinitions {
    fn collect(
        raw: &Value,
        pieces: &PieceDefinitions,
        warnings: &mut Warnings,
    ) -> Result<(Self, Vec<String>), DefinitionsError> {
        let mut combined: IndexMap<String, Volunteer> = IndexMap::new();
        for (index, entry) in entries(raw, "volunteers")?.iter().enumerate() {
            let volunteer = Volunteer::from_json(entry, |title| pieces.contains(title))
                .map_err(|cause| DefinitionsError::Volunteer { index, cause })?;
            let at = Location::volunteer(volunteer.email());
            for title in volunteer.unknown_pieces() {
                warnings.push(at.clone(), WarningKind::UnknownPiece {
                    title: title.clone(),
                });
            }
            match combined.get_mut(volunteer.email()) {
                Some(existing) => existing.combine(volunteer, &at, warnings),
                None => {
                    combined.insert(volunteer.email().to_string(), volunteer);
                }
            }
        }

        let mut definitions = Self::default();
        let mut without_pieces = Vec::new();
        for (email, volunteer) in combined {
            if volunteer.piece_count() == 0 {
                without_pieces.push(email);
            } else {
                definitions.volunteers.insert(email, volunteer);
            }
        }
        Ok((definitions, without_pieces))
    }

    /// Read the volunteer-definitions file against the known pieces.
    ///
    /// Unknown piece names are warnings; a volunteer left with no known
    /// piece is fatal.
    ///
    /// # Errors
    ///
    /// Fails on a malformed entry, an empty file, or volunteers without
    /// known pieces (all reported at once).
    pub fn from_json(
        raw: &Value,
        pieces: &PieceDefinitions,
    ) -> Result<Checked<Self>, DefinitionsError> {
        info!("reading volunteer definitions");
        let mut warnings = Warnings::new();
        let (definitions, without_pieces) = Self::collect(raw, pieces, &mut warnings)?;
        if !without_pieces.is_empty() {
            for email in &without_pieces {
                tracing::error!(volunteer = %email, "no pieces found");
            }
            return Err(DefinitionsError::VolunteersWithoutPieces(without_pieces));
        }
        Ok(Checked::new(definitions, warnings))
    }

    /// Rewrite the volunteer-definitions file with repeats combined and
    /// unknown pieces removed. Volunteers without pieces are dropped.
    ///
    /// # Errors
    ///
    /// Fails on a malformed entry or when no volunteer survives.
    pub fn fix(raw: &Value, pieces: &PieceDefinitions) -> Result<Checked<Value>, DefinitionsError> {
        info!("fixing volunteer definitions");
        let mut warnings = Warnings::new();
        let (definitions, without_pieces) = Self::collect(raw, pieces, &mut warnings)?;
        for email in &without_pieces {
            warnings.push(Location::volunteer(email), WarningKind::NoData);
        }
        if definitions.volunteers.is_empty() {
            return Err(DefinitionsError::NothingToWrite { kind: "volunteers" });
        }
        let fixed = definitions
            .volunteers
            .values()
            .map(Volunteer::to_json)
            .collect();
        Ok(Checked::new(Value::Array(fixed), warnings))
    }

    #[must_use]
    pub fn get(&self, email: &str) -> Option<&Volunteer> {
        self.volunteers.get(email)
    }

    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.volunteers.contains_key(email)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Volunteer> {
        self.volunteers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.volunteers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volunteers.is_empty()
    }

    /// Emails assigned to each known piece.
    #[must_use]
    pub fn assignments(&self, pieces: &PieceDefinitions) -> IndexMap<String, IndexSet<String>> {
        let mut assigned: IndexMap<String, IndexSet<String>> = pieces
            .titles()
            .map(|title| (title.to_string(), IndexSet::new()))
            .collect();
        for volunteer in self.volunteers.values() {
            for title in volunteer.pieces() {
                if let Some(emails) = assigned.get_mut(title) {
                    emails.insert(volunteer.email().to_string());
                }
            }
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pieces_json() -> Value {
        json!([
            {"title": "A", "sources": [{"name": "s1", "link": "l1"}]},
            {"title": "B", "sources": [{"name": "s2", "link": "l2", "supplemental": true}]},
            {"title": "A", "link": "pa", "sources": [{"name": "s3", "link": "l3", "barCount": 9}]}
        ])
    }

    #[test]
    fn repeats_are_combined_and_supplemental_only_set_aside() {
        let checked = PieceDefinitions::from_json(&pieces_json()).unwrap();
        let defs = checked.value;
        assert_eq!(defs.titles().collect::<Vec<_>>(), ["A"]);
        let a = defs.get("A").unwrap();
        assert_eq!(a.source_count(), 2);
        assert_eq!(a.link(), Some("pa"));
        assert_eq!(a.bar_count(), Some(9));
        assert_eq!(defs.only_supplemental().count(), 1);
        assert_eq!(checked.warnings.len(), 1);
    }

    #[test]
    fn pieces_without_sources_fail_together() {
        let raw = json!([
            {"title": "A", "sources": []},
            {"title": "B", "sources": [{"name": "s", "link": "l"}]},
            {"title": "C", "sources": []}
        ]);
        match PieceDefinitions::from_json(&raw) {
            Err(DefinitionsError::PiecesWithoutSources(titles)) => assert_eq!(titles, ["A", "C"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_entry_reports_index() {
        let raw = json!([{"title": "A", "sources": [{"name": "s", "link": "l", "barCount": 0}]}]);
        let err = PieceDefinitions::from_json(&raw).unwrap_err();
        assert_eq!(err.to_string(), "piece 0: source 0: bar count must be positive (got 0)");
        assert_eq!(err.code(), ErrorCode::InvalidBarCount);
    }

    #[test]
    fn empty_file_is_fatal() {
        assert!(matches!(
            PieceDefinitions::from_json(&json!([])),
            Err(DefinitionsError::Empty { .. })
        ));
    }

    #[test]
    fn fix_moves_supplemental_only_pieces_to_end() {
        let raw = json!([
            {"title": "B", "sources": [{"name": "s2", "link": "l2", "supplemental": true}]},
            {"title": "Empty", "sources": []},
            {"title": "A", "sources": [{"name": "s1", "link": "l1"}]}
        ]);
        let fixed = PieceDefinitions::fix(&raw).unwrap();
        let titles: Vec<&str> = fixed
            .value
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(fixed.warnings.len(), 2);
    }

    #[test]
    fn volunteers_combine_and_report_unknown_pieces() {
        let pieces = PieceDefinitions::from_json(&pieces_json()).unwrap().value;
        let raw = json!([
            {"email": "v@x", "pieces": ["A", "Ghost"]},
            {"email": "v@x", "pieces": ["B"]}
        ]);
        let checked = VolunteerDefinitions::from_json(&raw, &pieces).unwrap();
        // "B" is supplemental-only, so unknown as well
        assert_eq!(checked.warnings.len(), 2);
        let v = checked.value.get("v@x").unwrap();
        assert_eq!(v.pieces().collect::<Vec<_>>(), ["A"]);
    }

    #[test]
    fn volunteer_without_known_pieces_is_fatal() {
        let pieces = PieceDefinitions::from_json(&pieces_json()).unwrap().value;
        let raw = json!([{"email": "v@x", "pieces": ["Ghost"]}]);
        let err = VolunteerDefinitions::from_json(&raw, &pieces).unwrap_err();
        assert!(matches!(err, DefinitionsError::VolunteersWithoutPieces(ref e) if e == &["v@x"]));
        assert_eq!(err.code(), ErrorCode::EmptyVolunteer);
    }

    #[test]
    fn volunteer_fix_drops_unknown_pieces() {
        let pieces = PieceDefinitions::from_json(&pieces_json()).unwrap().value;
        let raw = json!([
            {"email": "v@x", "pieces": ["Ghost", "A"]},
            {"email": "w@x", "pieces": ["Ghost"]}
        ]);
        let fixed = VolunteerDefinitions::fix(&raw, &pieces).unwrap();
        assert_eq!(fixed.value, json!([{"email": "v@x", "pieces": ["A"]}]));
    }

    #[test]
    fn assignments_group_emails_by_piece() {
        let pieces = PieceDefinitions::from_json(&json!([
            {"title": "A", "sources": [{"name": "s", "link": "l"}]},
            {"title": "B", "sources": [{"name": "s", "link": "l"}]}
        ]))
        .unwrap()
        .value;
        let volunteers = VolunteerDefinitions::from_json(
            &json!([
                {"email": "v", "pieces": ["A", "B"]},
                {"email": "w", "pieces": ["B"]}
            ]),
            &pieces,
        )
        .unwrap()
        .value;
        let assigned = volunteers.assignments(&pieces);
        assert_eq!(assigned["A"].iter().collect::<Vec<_>>(), ["v"]);
        assert_eq!(assigned["B"].iter().collect::<Vec<_>>(), ["v", "w"]);
    }
}
