//! Per-piece aggregation scaffolding.
//!
//! A [`PieceData`] fixes the shapes every document about one piece must
//! fit: contributor rows (metadata, bars and comments as text), piece notes
//! (metadata and bars, no comments) and the email-keyed annotation form of
//! the notes. Volunteer submissions are folded into it one at a time.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::document::{PieceDocument, VolunteerSubmission};
use crate::model::Piece;
use crate::shape::{Assign, Leaf, Shape, reconcile_into};
use crate::template::Template;

/// One contributor's row: metadata fields, bars and comments.
pub type Row = Map<String, Value>;

/// Contributor rows collected for one primary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceData {
    name: String,
    link: String,
    volunteers: IndexMap<String, Row>,
}

impl SourceData {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn link(&self) -> &str {
        &self.link
    }

    #[must_use]
    pub const fn volunteers(&self) -> &IndexMap<String, Row> {
        &self.volunteers
    }

    /// Store a contributor's row, replacing any earlier one from them.
    pub fn add_volunteer(&mut self, email: &str, row: Row) {
        self.volunteers.insert(email.to_string(), row);
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "link": self.link,
            "volunteers": self.volunteers,
        })
    }
}

/// Aggregate record of one piece: every source's contributor rows and the
/// piece notes grouped by contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceData {
    name: String,
    link: Option<String>,
    summary_label: String,
    row_shape: Shape,
    notes_shape: Shape,
    sources: IndexMap<String, SourceData>,
    notes: Map<String, Value>,
}

impl PieceData {
    #[must_use]
    pub fn new(piece: &Piece, template: &Template) -> Self {
        let bar_count = piece.final_bar_count(template);
        let row_shape = Shape::for_template(template, bar_count, Leaf::Text, true);
        let notes_shape = Shape::for_template(template, bar_count, Leaf::Text, false);
        let sources = piece
            .sources()
            .map(|source| {
                let data = SourceData {
                    name: source.name().to_string(),
                    link: source.link().to_string(),
                    volunteers: IndexMap::new(),
                };
                (source.name().to_string(), data)
            })
            .collect();
        let notes = notes_shape.with_leaf(Leaf::Annotations).default_value();
        Self {
            name: piece.name().to_string(),
            link: piece.link().map(str::to_string),
            summary_label: template.comment_fields.summary.clone(),
            row_shape,
            notes_shape,
            sources,
            notes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    #[must_use]
    pub const fn bar_count(&self) -> u32 {
        self.row_shape.bar_count()
    }

    /// Label of the summary column; also the contributor name of a summary
    /// nobody claimed.
    #[must_use]
    pub fn summary_label(&self) -> &str {
        &self.summary_label
    }

    /// Shape of a single contributor's row.
    #[must_use]
    pub const fn row_shape(&self) -> &Shape {
        &self.row_shape
    }

    /// Shape of piece notes with the given leaf kind.
    #[must_use]
    pub fn notes_shape(&self, leaf: Leaf) -> Shape {
        self.notes_shape.with_leaf(leaf)
    }

    #[must_use]
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    #[must_use]
    pub fn get_source(&self, name: &str) -> Option<&SourceData> {
        self.sources.get(name)
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceData> {
        self.sources.values()
    }

    /// Email-keyed piece notes.
    #[must_use]
    pub const fn notes(&self) -> &Map<String, Value> {
        &self.notes
    }

    /// An empty contributor row.
    #[must_use]
    pub fn make_default(&self) -> Row {
        self.row_shape.default_value()
    }

    /// Fold one volunteer's validated submission into this piece.
    ///
    /// Source rows are stored under the volunteer's email; non-empty notes
    /// are added to the annotation maps under the same email.
    pub fn add_volunteer(&mut self, email: &str, submission: &PieceDocument<VolunteerSubmission>) {
        debug!(piece = %self.name, volunteer = email, "adding volunteer data");
        for source in submission.sources.values() {
            if let Some(target) = self.sources.get_mut(&source.name) {
                target.add_volunteer(email, source.data.clone());
            }
        }
        let notes = Value::Object(submission.notes.clone());
        let assign = Assign::Aggregate { contributor: email };
        let diagnostics = reconcile_into(&notes, &self.notes_shape, assign, &mut self.notes);
        debug_assert!(
            diagnostics.is_clean(),
            "submission notes must already fit the piece: {diagnostics:?}"
        );
    }

    /// Piece file document: `{title, link, sources: [...], notes}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "title": self.name,
            "link": self.link,
            "sources": self.sources.values().map(SourceData::to_json).collect::<Vec<_>>(),
            "notes": self.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn template() -> Template {
        crate::template::load_template(&json!({
            "metaDataFields": {"tempo": "Tempo"},
            "values": {"defaultBarCount": 2}
        }))
        .unwrap()
        .value
    }

    #[test]
    fn default_row_follows_template_and_bar_count() {
        let piece = Piece::new("P", None, [Source::new("A", "a").with_bar_count(3)]);
        let data = PieceData::new(&piece, &template());
        assert_eq!(data.bar_count(), 3);
        assert_eq!(
            Value::Object(data.make_default()),
            json!({"tempo": "", "bars": {"1": "", "2": "", "3": ""}, "comments": ""})
        );
        assert_eq!(
            Value::Object(data.notes().clone()),
            json!({"tempo": {}, "bars": {"1": {}, "2": {}, "3": {}}})
        );
    }

    #[test]
    fn only_primary_sources_are_tracked() {
        let piece = Piece::new(
            "P",
            Some("l".into()),
            [Source::new("A", "a"), Source::new("S", "s").supplemental()],
        );
        let data = PieceData::new(&piece, &template());
        assert!(data.has_source("A"));
        assert!(!data.has_source("S"));
        assert_eq!(data.to_json()["sources"], json!([{"name": "A", "link": "a", "volunteers": {}}]));
        assert_eq!(data.to_json()["link"], "l");
    }

    #[test]
    fn partial_notes_fold_in_by_email() {
        let piece = Piece::new("P", None, [Source::new("A", "a")]);
        let pieces: IndexMap<String, PieceData> =
            [("P".to_string(), PieceData::new(&piece, &template()))].into_iter().collect();
        let doc = |notes: Value| {
            json!([{"title": "P", "link": null, "sources": [{"name": "A", "link": "a"}], "notes": notes}])
        };
        let docs: IndexMap<String, Value> = [
            ("a@x".to_string(), doc(json!({"tempo": "quick"}))),
            ("b@x".to_string(), doc(json!({"bars": {"2": "smudge"}}))),
        ]
        .into_iter()
        .collect();
        let submissions = crate::document::read_volunteer_submissions(&pieces, &docs)
            .unwrap()
            .value;

        let mut data = pieces["P"].clone();
        for (email, by_piece) in &submissions {
            data.add_volunteer(email, &by_piece["P"]);
        }
        assert_eq!(
            Value::Object(data.notes().clone()),
            json!({"tempo": {"a@x": "quick"}, "bars": {"1": {}, "2": {"b@x": "smudge"}}})
        );
    }
}
