//! Validation of the documents the pipeline reads back.
//!
//! Three kinds of document describe pieces: a volunteer's submission (one
//! row per source), a piece file (every contributor's row per source) and
//! the summary file (contributor rows plus a summary slot per source). They
//! share one validation path, [`validate_piece`], parameterized by a
//! [`DocumentKind`] that supplies the per-kind source keys, source
//! validation and notes shape.
//!
//! Every reader returns `Result<Checked<_>, DocumentError>`. Structural
//! problems fail the read; everything reconcilable is a warning.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::{error, info};

use crate::diagnostics::{Checked, Location, Segment, StrictError, WarningKind, Warnings};
use crate::error::ErrorCode;
use crate::piece_data::{PieceData, Row};
use crate::shape::{Assign, Leaf, Shape, is_blank_document, reconcile};
use crate::summary::{SourceSummary, SummarySlot};

const PIECE_KEYS: &[&str] = &["title", "link", "sources", "notes"];

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{location}: expected {expected}")]
    WrongType {
        location: Location,
        expected: &'static str,
    },
    #[error("missing fields {} for {location}", quote_all(.fields))]
    MissingFields {
        location: Location,
        fields: Vec<String>,
    },
    #[error("missing sources {} for {location}", quote_all(.names))]
    MissingSources { location: Location, names: Vec<String> },
    #[error("{location}: {details}")]
    MissingData { location: Location, details: String },
    #[error(transparent)]
    Strict(#[from] StrictError),
}

fn quote_all(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(",")
}

impl DocumentError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::WrongType { .. } => ErrorCode::InvalidFieldValue,
            Self::MissingFields { .. } => ErrorCode::MissingField,
            Self::MissingSources { .. } => ErrorCode::MissingSources,
            Self::MissingData { .. } => ErrorCode::MissingData,
            Self::Strict(_) => ErrorCode::StrictWarnings,
        }
    }
}

/// Fit `raw` to `shape`, recording diagnostics at `at`.
///
/// With `missing_fatal`, absent data fails instead of warning; the other
/// diagnostics are still recorded as warnings.
fn fit(
    raw: &Value,
    shape: &Shape,
    at: &Location,
    missing_fatal: bool,
    warnings: &mut Warnings,
) -> Result<Row, DocumentError> {
    let (diagnostics, fixed) = reconcile(raw, shape, Assign::Overwrite);
    if diagnostics.is_clean() {
        return Ok(fixed);
    }
    let fatal = missing_fatal && diagnostics.has_missing_data();
    let mut missing = Vec::new();
    for kind in diagnostics.into_kinds(shape.bar_count()) {
        if fatal && kind.is_missing_data() {
            missing.push(kind.to_string());
        } else {
            warnings.push(at.clone(), kind);
        }
    }
    if fatal {
        let details = missing.join("; ");
        error!(location = %at, "{details}");
        return Err(DocumentError::MissingData {
            location: at.clone(),
            details,
        });
    }
    Ok(fixed)
}

fn wrong_type(location: Location, expected: &'static str) -> DocumentError {
    DocumentError::WrongType { location, expected }
}

fn require_keys(
    map: &Map<String, Value>,
    keys: &[&str],
    at: &Location,
) -> Result<(), DocumentError> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|key| !map.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DocumentError::MissingFields {
            location: at.clone(),
            fields: missing,
        })
    }
}

// ---------------------------------------------------------------------------
// Document kinds
// ---------------------------------------------------------------------------

/// Per-kind rules for validating and serializing a piece document.
pub trait DocumentKind: fmt::Debug + Clone + PartialEq {
    /// Validated contents of one source.
    type Source: fmt::Debug + Clone + PartialEq;

    const LABEL: &'static str;
    /// Keys every source object must carry.
    const SOURCE_KEYS: &'static [&'static str];
    /// Leaf kind of the piece notes.
    const NOTES_LEAF: Leaf;
    /// Whether absent data fails the read instead of warning.
    const MISSING_DATA_FATAL: bool;

    /// Validate a source object whose required keys are present.
    ///
    /// # Errors
    ///
    /// Fails on wrongly typed values, or on missing data when
    /// [`DocumentKind::MISSING_DATA_FATAL`] is set.
    fn validate_source(
        raw: &Map<String, Value>,
        piece: &PieceData,
        at: &Location,
        warnings: &mut Warnings,
    ) -> Result<Self::Source, DocumentError>;

    /// Write the kind-specific keys of a source object.
    fn write_source(source: &Self::Source, empty_row: &Row, out: &mut Map<String, Value>);
}

/// A volunteer's own data: one row per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolunteerSubmission;

/// Every contributor's rows for one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceFile;

/// Contributor rows plus a summary slot per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryFile;

fn contributor_rows(
    raw: &Map<String, Value>,
    piece: &PieceData,
    at: &Location,
    missing_fatal: bool,
    warnings: &mut Warnings,
) -> Result<IndexMap<String, Row>, DocumentError> {
    let volunteers = raw
        .get("volunteers")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            wrong_type(
                at.with(Segment::Field("volunteers".into())),
                "an object keyed by email",
            )
        })?;
    let mut rows = IndexMap::new();
    for (email, row) in volunteers {
        let v_at = at.with(Segment::Volunteer(email.clone()));
        let fixed = fit(row, piece.row_shape(), &v_at, missing_fatal, warnings)?;
        rows.insert(email.clone(), fixed);
    }
    Ok(rows)
}

fn write_rows(rows: &IndexMap<String, Row>, out: &mut Map<String, Value>) {
    out.insert("volunteers".into(), json!(rows));
}

impl DocumentKind for VolunteerSubmission {
    type Source = Row;

    const LABEL: &'static str = "volunteer data";
    const SOURCE_KEYS: &'static [&'static str] = &["name", "link"];
    const NOTES_LEAF: Leaf = Leaf::Text;
    const MISSING_DATA_FATAL: bool = false;

    fn validate_source(
        raw: &Map<String, Value>,
        piece: &PieceData,
        at: &Location,
        warnings: &mut Warnings,
    ) -> Result<Row, DocumentError> {
        let raw = Value::Object(raw.clone());
        fit(&raw, piece.row_shape(), at, Self::MISSING_DATA_FATAL, warnings)
    }

    fn write_source(source: &Row, _empty_row: &Row, out: &mut Map<String, Value>) {
        out.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl DocumentKind for PieceFile {
    type Source = IndexMap<String, Row>;

    const LABEL: &'static str = "piece data";
    const SOURCE_KEYS: &'static [&'static str] = &["name", "link", "volunteers"];
    const NOTES_LEAF: Leaf = Leaf::Annotations;
    const MISSING_DATA_FATAL: bool = false;

    fn validate_source(
        raw: &Map<String, Value>,
        piece: &PieceData,
        at: &Location,
        warnings: &mut Warnings,
    ) -> Result<Self::Source, DocumentError> {
        contributor_rows(raw, piece, at, Self::MISSING_DATA_FATAL, warnings)
    }

    fn write_source(source: &Self::Source, _empty_row: &Row, out: &mut Map<String, Value>) {
        write_rows(source, out);
    }
}

impl DocumentKind for SummaryFile {
    type Source = SourceSummary;

    const LABEL: &'static str = "summary";
    const SOURCE_KEYS: &'static [&'static str] = &["name", "link", "volunteers", "summary"];
    const NOTES_LEAF: Leaf = Leaf::Annotations;
    const MISSING_DATA_FATAL: bool = true;

    fn validate_source(
        raw: &Map<String, Value>,
        piece: &PieceData,
        at: &Location,
        warnings: &mut Warnings,
    ) -> Result<SourceSummary, DocumentError> {
        let volunteers = contributor_rows(raw, piece, at, Self::MISSING_DATA_FATAL, warnings)?;
        let summary_at = at.with(Segment::Field("summary".into()));
        let summary = fit(
            raw.get("summary").unwrap_or(&Value::Null),
            piece.row_shape(),
            &summary_at,
            Self::MISSING_DATA_FATAL,
            warnings,
        )?;
        let slot = match raw.get("summaryBy") {
            None | Some(Value::Null) if is_blank_document(&summary) => SummarySlot::Empty,
            None | Some(Value::Null) => SummarySlot::Occupied {
                email: piece.summary_label().to_string(),
                data: summary,
            },
            Some(Value::String(email)) => SummarySlot::Occupied {
                email: email.clone(),
                data: summary,
            },
            Some(_) => {
                return Err(wrong_type(
                    at.with(Segment::Field("summaryBy".into())),
                    "a contributor email",
                ));
            }
        };
        Ok(SourceSummary::new(volunteers, slot))
    }

    fn write_source(source: &SourceSummary, empty_row: &Row, out: &mut Map<String, Value>) {
        source.write_json(|| empty_row.clone(), out);
    }
}

// ---------------------------------------------------------------------------
// Validated documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry<S> {
    pub name: String,
    pub link: String,
    pub data: S,
}

/// A piece document of kind `K`, fitted to its piece's shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceDocument<K: DocumentKind> {
    pub title: String,
    pub link: Option<String>,
    pub sources: IndexMap<String, SourceEntry<K::Source>>,
    pub notes: Row,
}

impl<K: DocumentKind> PieceDocument<K> {
    /// `{title, link, sources: [...], notes}`. `empty_row` stands in for
    /// an empty summary slot.
    #[must_use]
    pub fn to_json(&self, empty_row: &Row) -> Value {
        let sources: Vec<Value> = self
            .sources
            .values()
            .map(|source| {
                let mut out = Map::new();
                out.insert("name".into(), json!(source.name));
                out.insert("link".into(), json!(source.link));
                K::write_source(&source.data, empty_row, &mut out);
                Value::Object(out)
            })
            .collect();
        json!({
            "title": self.title,
            "link": self.link,
            "sources": sources,
            "notes": self.notes,
        })
    }
}

/// Where a raw piece document came from.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'a> {
    /// Entry `index` of a list, owned by `parent` (a volunteer, or the root).
    Entry { parent: &'a Location, index: usize },
    /// A piece file whose path placeholder matched `file`.
    File(&'a str),
}

impl Origin<'_> {
    fn location(&self) -> Location {
        match self {
            Self::Entry { parent, index } => parent.with(Segment::PieceIndex(*index)),
            Self::File(file) => Location::root().with(Segment::PieceFile((*file).to_string())),
        }
    }

    fn parent(&self) -> Location {
        match self {
            Self::Entry { parent, .. } => (*parent).clone(),
            Self::File(_) => Location::root(),
        }
    }
}

fn check_piece_link(expected: Option<&str>, found: Option<&str>, at: &Location, warnings: &mut Warnings) {
    match (expected, found) {
        (None, Some(link)) => warnings.push(
            at.clone(),
            WarningKind::ExtraPieceLink {
                link: link.to_string(),
            },
        ),
        (Some(_), None) => warnings.push(at.clone(), WarningKind::MissingPieceLink),
        (Some(expected), Some(link)) if expected != link => warnings.push(
            at.clone(),
            WarningKind::IncorrectPieceLink {
                link: link.to_string(),
            },
        ),
        _ => {}
    }
}

/// Validate one raw piece document against the known pieces.
///
/// Returns `Ok(None)` when the piece is skipped: unknown pieces and pieces
/// already in `seen` are reported once and left out.
///
/// # Errors
///
/// Fails when a required key is missing or wrongly typed, when a declared
/// source is absent, or on any failure from [`DocumentKind::validate_source`].
pub fn validate_piece<K: DocumentKind>(
    pieces: &IndexMap<String, PieceData>,
    seen: &IndexMap<String, PieceDocument<K>>,
    raw: &Value,
    origin: Origin<'_>,
    warnings: &mut Warnings,
) -> Result<Option<PieceDocument<K>>, DocumentError> {
    let origin_at = origin.location();
    let map = raw
        .as_object()
        .ok_or_else(|| wrong_type(origin_at.clone(), "a piece object"))?;
    require_keys(map, PIECE_KEYS, &origin_at)?;

    let title = map
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| wrong_type(origin_at.with(Segment::Field("title".into())), "a string"))?;
    let link = match map.get("link") {
        None | Some(Value::Null) => None,
        Some(Value::String(link)) => Some(link.as_str()),
        Some(_) => {
            return Err(wrong_type(
                origin_at.with(Segment::Field("link".into())),
                "null or a string",
            ));
        }
    };

    if let Origin::File(file) = origin {
        if file != title {
            warnings.push(
                origin_at.clone(),
                WarningKind::PieceNameMismatch {
                    title: title.to_string(),
                    file: file.to_string(),
                },
            );
        }
    }

    let parent = origin.parent();
    let Some(piece) = pieces.get(title) else {
        warnings.push(
            parent,
            WarningKind::UnknownPiece {
                title: title.to_string(),
            },
        );
        return Ok(None);
    };
    if seen.contains_key(title) {
        warnings.push(
            parent,
            WarningKind::RepeatedPiece {
                title: title.to_string(),
            },
        );
        return Ok(None);
    }

    let p_at = parent.with(Segment::Piece(title.to_string()));
    check_piece_link(piece.link(), link, &p_at, warnings);

    let raw_sources = map
        .get("sources")
        .and_then(Value::as_array)
        .ok_or_else(|| wrong_type(p_at.with(Segment::Field("sources".into())), "a list"))?;
    let mut sources = IndexMap::new();
    for (index, raw_source) in raw_sources.iter().enumerate() {
        let i_at = p_at.with(Segment::SourceIndex(index));
        let source = raw_source
            .as_object()
            .ok_or_else(|| wrong_type(i_at.clone(), "a source object"))?;
        require_keys(source, K::SOURCE_KEYS, &i_at)?;
        let (Some(name), Some(s_link)) = (
            source.get("name").and_then(Value::as_str),
            source.get("link").and_then(Value::as_str),
        ) else {
            return Err(wrong_type(i_at, "string \"name\" and \"link\""));
        };

        let Some(known) = piece.get_source(name) else {
            warnings.push(
                p_at.clone(),
                WarningKind::UnknownSource {
                    name: name.to_string(),
                },
            );
            continue;
        };
        if sources.contains_key(name) {
            warnings.push(
                p_at.clone(),
                WarningKind::RepeatedSource {
                    name: name.to_string(),
                },
            );
            continue;
        }
        let s_at = p_at.with(Segment::Source(name.to_string()));
        if s_link != known.link() {
            warnings.push(
                s_at.clone(),
                WarningKind::IncorrectSourceLink {
                    link: s_link.to_string(),
                },
            );
        }
        let data = K::validate_source(source, piece, &s_at, warnings)?;
        sources.insert(
            name.to_string(),
            SourceEntry {
                name: name.to_string(),
                link: s_link.to_string(),
                data,
            },
        );
    }

    let missing: Vec<String> = piece
        .source_names()
        .filter(|name| !sources.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        error!(location = %p_at, "missing sources");
        return Err(DocumentError::MissingSources {
            location: p_at,
            names: missing,
        });
    }

    let notes = fit(
        map.get("notes").unwrap_or(&Value::Null),
        &piece.notes_shape(K::NOTES_LEAF),
        &p_at.with(Segment::Field("notes".into())),
        K::MISSING_DATA_FATAL,
        warnings,
    )?;

    Ok(Some(PieceDocument {
        title: title.to_string(),
        link: link.map(str::to_string),
        sources,
        notes,
    }))
}

fn validate_list<K: DocumentKind>(
    pieces: &IndexMap<String, PieceData>,
    raw: &Value,
    parent: &Location,
    into: &mut IndexMap<String, PieceDocument<K>>,
    warnings: &mut Warnings,
) -> Result<(), DocumentError> {
    let list = raw
        .as_array()
        .ok_or_else(|| wrong_type(parent.clone(), "a list of pieces"))?;
    for (index, raw_piece) in list.iter().enumerate() {
        let origin = Origin::Entry { parent, index };
        if let Some(doc) = validate_piece(pieces, into, raw_piece, origin, warnings)? {
            into.insert(doc.title.clone(), doc);
        }
    }
    Ok(())
}

/// Validated submissions keyed by volunteer email, then piece title.
pub type Submissions = IndexMap<String, IndexMap<String, PieceDocument<VolunteerSubmission>>>;

/// Validate volunteer data documents (one list of pieces per volunteer).
///
/// # Errors
///
/// Fails on the first structural problem; see [`validate_piece`].
pub fn read_volunteer_submissions(
    pieces: &IndexMap<String, PieceData>,
    docs: &IndexMap<String, Value>,
) -> Result<Checked<Submissions>, DocumentError> {
    info!(count = docs.len(), "validating {}", VolunteerSubmission::LABEL);
    let mut warnings = Warnings::new();
    let mut volunteers = IndexMap::new();
    for (email, doc) in docs {
        let mut fixed = IndexMap::new();
        validate_list(pieces, doc, &Location::volunteer(email), &mut fixed, &mut warnings)?;
        volunteers.insert(email.clone(), fixed);
    }
    Ok(Checked::new(volunteers, warnings))
}

/// Validate piece data files keyed by the file's `{piece}` match.
///
/// # Errors
///
/// Fails on the first structural problem; see [`validate_piece`].
pub fn read_piece_files(
    pieces: &IndexMap<String, PieceData>,
    files: &IndexMap<String, Value>,
) -> Result<Checked<IndexMap<String, PieceDocument<PieceFile>>>, DocumentError> {
    info!(count = files.len(), "validating {}", PieceFile::LABEL);
    let mut warnings = Warnings::new();
    let mut fixed = IndexMap::new();
    for (file, raw) in files {
        if let Some(doc) = validate_piece(pieces, &fixed, raw, Origin::File(file), &mut warnings)? {
            fixed.insert(doc.title.clone(), doc);
        }
    }
    Ok(Checked::new(fixed, warnings))
}

/// Validate the summary file (a list of pieces).
///
/// # Errors
///
/// Fails on the first structural problem or on any absent data.
pub fn read_summary(
    pieces: &IndexMap<String, PieceData>,
    raw: &Value,
) -> Result<Checked<IndexMap<String, PieceDocument<SummaryFile>>>, DocumentError> {
    info!("validating {}", SummaryFile::LABEL);
    let mut warnings = Warnings::new();
    let mut fixed = IndexMap::new();
    validate_list(pieces, raw, &Location::root(), &mut fixed, &mut warnings)?;
    Ok(Checked::new(fixed, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Piece, Source};
    use crate::template::{Template, load_template};

    fn template() -> Template {
        load_template(&json!({
            "metaDataFields": {"tempo": "Tempo"},
            "values": {"defaultBarCount": 2}
        }))
        .unwrap()
        .value
    }

    fn pieces() -> IndexMap<String, PieceData> {
        let t = template();
        let piece = Piece::new("P", Some("pl".into()), [Source::new("A", "a"), Source::new("B", "b")]);
        [("P".to_string(), PieceData::new(&piece, &t))].into_iter().collect()
    }

    fn row(tempo: &str, bar1: &str) -> Value {
        json!({"tempo": tempo, "bars": {"1": bar1, "2": ""}, "comments": ""})
    }

    fn submission(sources: Value) -> Value {
        json!({
            "title": "P",
            "link": "pl",
            "sources": sources,
            "notes": {"tempo": "", "bars": {"1": "", "2": ""}}
        })
    }

    fn source(name: &str, link: &str, data: &Value) -> Value {
        let mut map = data.as_object().unwrap().clone();
        map.insert("name".into(), json!(name));
        map.insert("link".into(), json!(link));
        Value::Object(map)
    }

    #[test]
    fn clean_submission_validates() {
        let doc = json!([submission(json!([
            source("A", "a", &row("fast", "x")),
            source("B", "b", &row("", ""))
        ]))]);
        let docs = [("v@x".to_string(), doc)].into_iter().collect();
        let checked = read_volunteer_submissions(&pieces(), &docs).unwrap();
        assert!(checked.is_clean(), "{:?}", checked.warnings);
        let piece = &checked.value["v@x"]["P"];
        assert_eq!(piece.sources["A"].data["tempo"], "fast");
        assert_eq!(piece.sources["A"].data["bars"]["1"], "x");
    }

    #[test]
    fn unknown_piece_is_skipped_with_one_warning() {
        let mut ghost = submission(json!([]));
        ghost["title"] = json!("Ghost");
        let docs = [("v@x".to_string(), json!([ghost]))].into_iter().collect();
        let checked = read_volunteer_submissions(&pieces(), &docs).unwrap();
        assert!(checked.value["v@x"].is_empty());
        assert_eq!(checked.warnings.len(), 1);
        assert_eq!(
            checked.warnings.iter().next().unwrap().to_string(),
            r#"volunteer "v@x": unknown piece "Ghost" (not in piece definitions file)"#
        );
    }

    #[test]
    fn missing_declared_source_is_fatal() {
        let doc = json!([submission(json!([source("A", "a", &row("", ""))]))]);
        let docs = [("v@x".to_string(), doc)].into_iter().collect();
        let err = read_volunteer_submissions(&pieces(), &docs).unwrap_err();
        assert!(matches!(err, DocumentError::MissingSources { ref names, .. } if names == &["B"]));
        assert_eq!(err.code(), ErrorCode::MissingSources);
        assert_eq!(err.to_string(), r#"missing sources "B" for volunteer "v@x", piece "P""#);
    }

    #[test]
    fn missing_piece_keys_are_located_by_index() {
        let docs = [("v@x".to_string(), json!([{"title": "P"}]))].into_iter().collect();
        let err = read_volunteer_submissions(&pieces(), &docs).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"missing fields "link","sources","notes" for volunteer "v@x", piece 0"#
        );
    }

    #[test]
    fn link_and_source_problems_warn() {
        let mut doc = submission(json!([
            source("A", "wrong", &row("", "")),
            source("A", "a", &row("", "")),
            source("Z", "z", &row("", "")),
            source("B", "b", &row("", ""))
        ]));
        doc["link"] = Value::Null;
        let docs = [("v@x".to_string(), json!([doc]))].into_iter().collect();
        let checked = read_volunteer_submissions(&pieces(), &docs).unwrap();
        let messages: Vec<String> = checked.warnings.iter().map(|w| w.kind.to_string()).collect();
        assert_eq!(
            messages,
            [
                "missing piece link",
                "incorrect source link \"wrong\"",
                "repeated source \"A\"",
                "unknown source \"Z\" (not in piece definitions file)",
            ]
        );
        assert_eq!(checked.value["v@x"]["P"].sources["A"].link, "wrong");
    }

    #[test]
    fn piece_file_name_mismatch_warns_and_title_wins() {
        let raw = json!({
            "title": "P",
            "link": "pl",
            "sources": [
                {"name": "A", "link": "a", "volunteers": {"v@x": row("t", "")}},
                {"name": "B", "link": "b", "volunteers": {}}
            ],
            "notes": {"tempo": {"v@x": "n"}, "bars": {"1": {}, "2": {}}}
        });
        let files = [("p".to_string(), raw)].into_iter().collect();
        let checked = read_piece_files(&pieces(), &files).unwrap();
        assert_eq!(checked.warnings.len(), 1);
        let doc = &checked.value["P"];
        assert_eq!(doc.sources["A"].data["v@x"]["tempo"], "t");
        assert_eq!(doc.notes["tempo"], json!({"v@x": "n"}));
    }

    #[test]
    fn summary_missing_data_is_fatal() {
        let raw = json!([{
            "title": "P",
            "link": "pl",
            "sources": [
                {"name": "A", "link": "a", "volunteers": {}, "summary": {"tempo": ""}},
                {"name": "B", "link": "b", "volunteers": {}, "summary": row("", "")}
            ],
            "notes": {"tempo": {}, "bars": {"1": {}, "2": {}}}
        }]);
        let err = read_summary(&pieces(), &raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingData);
        assert!(err.to_string().starts_with(r#"piece "P", source "A", field "summary": missing fields"#));
    }

    #[test]
    fn summary_slot_round_trips() {
        let raw = json!([{
            "title": "P",
            "link": "pl",
            "sources": [
                {"name": "A", "link": "a", "volunteers": {"a@x": row("1", "x")}, "summary": row("2", "y"), "summaryBy": "b@x"},
                {"name": "B", "link": "b", "volunteers": {}, "summary": row("", "")}
            ],
            "notes": {"tempo": {}, "bars": {"1": {}, "2": {}}}
        }]);
        let ps = pieces();
        let checked = read_summary(&ps, &raw).unwrap();
        assert!(checked.is_clean());
        let doc = &checked.value["P"];
        assert_eq!(doc.sources["A"].data.summary_by(), Some("b@x"));
        assert_eq!(doc.sources["B"].data.slot(), &SummarySlot::Empty);
        assert_eq!(doc.to_json(&ps["P"].make_default()), raw[0]);
    }
}
