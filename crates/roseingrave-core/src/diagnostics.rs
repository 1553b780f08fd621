//! Warning collection and strict-mode escalation.
//!
//! Every reconcilable problem is recorded as a [`Warning`] carrying the
//! precise [`Location`] it was found at (volunteer, piece, source, bar, ...).
//! Warnings are logged through `tracing` the moment they are recorded, so a
//! strict run still reports every problem before it aborts.
//!
//! Operations that can produce warnings return [`Checked<T>`]; the caller
//! decides whether warnings are fatal with [`Checked::escalate`] or
//! [`Checked::into_strict`].

use std::fmt;

use serde::Serialize;

use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// One step of an entity path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Volunteer(String),
    Piece(String),
    PieceIndex(usize),
    PieceFile(String),
    Source(String),
    SourceIndex(usize),
    Field(String),
    Bar(String),
    Sheet(String),
    Setting(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volunteer(email) => write!(f, "volunteer \"{email}\""),
            Self::Piece(title) => write!(f, "piece \"{title}\""),
            Self::PieceIndex(i) => write!(f, "piece {i}"),
            Self::PieceFile(file) => write!(f, "piece file \"{file}\""),
            Self::Source(name) => write!(f, "source \"{name}\""),
            Self::SourceIndex(i) => write!(f, "source {i}"),
            Self::Field(key) => write!(f, "field \"{key}\""),
            Self::Bar(bar) => write!(f, "bar {bar}"),
            Self::Sheet(title) => write!(f, "sheet \"{title}\""),
            Self::Setting(path) => write!(f, "{path}"),
        }
    }
}

/// Entity path identifying where a warning or error was found.
///
/// Displays as its segments joined by `", "`, e.g.
/// `volunteer "a@x.org", piece "Sonata", source "Ms. A"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location(Vec<Segment>);

impl Location {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn volunteer(email: &str) -> Self {
        Self(vec![Segment::Volunteer(email.to_string())])
    }

    #[must_use]
    pub fn piece(title: &str) -> Self {
        Self(vec![Segment::Piece(title.to_string())])
    }

    #[must_use]
    pub fn sheet(title: &str) -> Self {
        Self(vec![Segment::Sheet(title.to_string())])
    }

    #[must_use]
    pub fn setting(path: &str) -> Self {
        Self(vec![Segment::Setting(path.to_string())])
    }

    /// Return a new location with `segment` appended.
    #[must_use]
    pub fn with(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(location unknown)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// Category of a reconcilable problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    UnknownKey { key: String },
    /// A setting held an unusable value and was reset to its default.
    InvalidValue { value: String, expected: &'static str },
    InvalidValidationRule { reason: String },
    UnknownPiece { title: String },
    UnknownSource { name: String },
    UnknownVolunteer { email: String },
    UnassignedPiece { title: String },
    /// The spreadsheets index has no entry for the volunteer.
    NotIndexed { email: String },
    RepeatedPiece { title: String },
    RepeatedSource { name: String },
    OnlySupplemental,
    NoSources,
    DifferingLink { link: String },
    /// A repeated definition omits the link the first one gave.
    MissingLink,
    ExtraPieceLink { link: String },
    MissingPieceLink,
    IncorrectPieceLink { link: String },
    IncorrectSourceLink { link: String },
    PieceNameMismatch { title: String, file: String },
    MissingFields { fields: Vec<String> },
    MissingBars { bars: Vec<String> },
    ExtraBars { bars: Vec<String>, bar_count: u32 },
    UnknownFields { fields: Vec<String> },
    MalformedValue { fields: Vec<String> },
    MalformedNote { line: String },
    SheetExportFailed { reason: String },
    NoData,
}

impl WarningKind {
    /// Whether the warning reports required data that was absent.
    #[must_use]
    pub const fn is_missing_data(&self) -> bool {
        matches!(
            self,
            Self::MissingFields { .. } | Self::MissingBars { .. } | Self::MalformedValue { .. }
        )
    }
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey { key } => write!(f, "unknown key \"{key}\""),
            Self::InvalidValue { value, expected } => {
                write!(f, "invalid value {value} (must be {expected}); reset to default")
            }
            Self::InvalidValidationRule { reason } => write!(f, "validation rule dropped: {reason}"),
            Self::UnknownPiece { title } => {
                write!(f, "unknown piece \"{title}\" (not in piece definitions file)")
            }
            Self::UnknownSource { name } => {
                write!(f, "unknown source \"{name}\" (not in piece definitions file)")
            }
            Self::UnknownVolunteer { email } => {
                write!(f, "unknown volunteer \"{email}\" (not in volunteer definitions file)")
            }
            Self::UnassignedPiece { title } => write!(
                f,
                "piece \"{title}\" not assigned in volunteer definitions file; sheet skipped"
            ),
            Self::NotIndexed { email } => {
                write!(f, "volunteer \"{email}\" not found in spreadsheets index file")
            }
            Self::RepeatedPiece { title } => write!(f, "repeated piece \"{title}\""),
            Self::RepeatedSource { name } => write!(f, "repeated source \"{name}\""),
            Self::OnlySupplemental => write!(f, "only supplemental sources found"),
            Self::NoSources => write!(f, "no sources found"),
            Self::DifferingLink { link } => write!(f, "differing link \"{link}\""),
            Self::MissingLink => write!(f, "missing link"),
            Self::ExtraPieceLink { link } => write!(f, "extra piece link \"{link}\""),
            Self::MissingPieceLink => write!(f, "missing piece link"),
            Self::IncorrectPieceLink { link } => write!(f, "incorrect piece link \"{link}\""),
            Self::IncorrectSourceLink { link } => write!(f, "incorrect source link \"{link}\""),
            Self::PieceNameMismatch { title, file } => write!(
                f,
                "piece name \"{title}\" doesn't match file name \"{file}\"; using \"{title}\""
            ),
            Self::MissingFields { fields } => write!(f, "missing fields {}", quoted(fields)),
            Self::MissingBars { bars } => write!(f, "missing bar numbers {}", bars.join(",")),
            Self::ExtraBars { bars, bar_count } => write!(
                f,
                "extra bars {} (not in range of 1-{bar_count})",
                bars.join(",")
            ),
            Self::UnknownFields { fields } => write!(
                f,
                "unknown fields {} (not in template definitions file)",
                quoted(fields)
            ),
            Self::MalformedValue { fields } => {
                write!(f, "malformed values for {}", quoted(fields))
            }
            Self::MalformedNote { line } => write!(f, "malformed note line \"{line}\""),
            Self::SheetExportFailed { reason } => write!(f, "sheet skipped: {reason}"),
            Self::NoData => write!(f, "no data found"),
        }
    }
}

/// A reconcilable problem and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub location: Location,
    pub kind: WarningKind,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_root() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.location, self.kind)
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Record {
            location: String,
            message: String,
        }
        Record {
            location: self.location.to_string(),
            message: self.kind.to_string(),
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Warnings collector
// ---------------------------------------------------------------------------

/// Ordered collection of warnings. Each push is logged at `warn` level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, location: Location, kind: WarningKind) {
        let warning = Warning { location, kind };
        tracing::warn!("{warning}");
        self.items.push(warning);
    }

    /// Move warnings recorded elsewhere into this collector without re-logging.
    pub fn append(&mut self, other: Self) {
        self.items.extend(other.items);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Checked
// ---------------------------------------------------------------------------

/// Raised when strict mode converts recorded warnings into a failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", strict_message(.warnings))]
pub struct StrictError {
    pub warnings: Vec<Warning>,
}

fn strict_message(warnings: &[Warning]) -> String {
    match warnings.first() {
        Some(first) => format!(
            "{} warning(s) with strict mode enabled; first: {first}",
            warnings.len()
        ),
        None => "strict mode enabled".to_string(),
    }
}

impl StrictError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::StrictWarnings
    }
}

/// A successful result together with the warnings produced on the way.
///
/// `Ok(Checked)` with no warnings is a clean success; with warnings it is a
/// success-with-warnings. Failures are carried by the surrounding `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checked<T> {
    pub value: T,
    pub warnings: Warnings,
}

impl<T> Checked<T> {
    #[must_use]
    pub const fn new(value: T, warnings: Warnings) -> Self {
        Self { value, warnings }
    }

    #[must_use]
    pub const fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Warnings::new(),
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Checked<U> {
        Checked {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Fail if `strict` is set and any warning was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StrictError`] holding every recorded warning.
    pub fn escalate(self, strict: bool) -> Result<Self, StrictError> {
        if strict && !self.warnings.is_empty() {
            tracing::error!(
                count = self.warnings.len(),
                "failing on warnings (strict mode)"
            );
            return Err(StrictError {
                warnings: self.warnings.into_vec(),
            });
        }
        Ok(self)
    }

    /// Like [`Checked::escalate`], discarding the (already logged) warnings.
    ///
    /// # Errors
    ///
    /// Returns [`StrictError`] holding every recorded warning.
    pub fn into_strict(self, strict: bool) -> Result<T, StrictError> {
        self.escalate(strict).map(|checked| checked.value)
    }

    /// Move the value out, appending the warnings to `sink`.
    pub fn absorb(self, sink: &mut Warnings) -> T {
        sink.append(self.warnings);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_joins_segments() {
        let loc = Location::volunteer("a@x.org")
            .with(Segment::Piece("Sonata".into()))
            .with(Segment::Source("Ms. A".into()));
        assert_eq!(
            loc.to_string(),
            r#"volunteer "a@x.org", piece "Sonata", source "Ms. A""#
        );
    }

    #[test]
    fn root_location_is_explicit() {
        assert_eq!(Location::root().to_string(), "(location unknown)");
    }

    #[test]
    fn warning_display_includes_location() {
        let w = Warning {
            location: Location::piece("Sonata"),
            kind: WarningKind::MissingBars {
                bars: vec!["3".into(), "4".into()],
            },
        };
        assert_eq!(w.to_string(), r#"piece "Sonata": missing bar numbers 3,4"#);
    }

    #[test]
    fn escalate_passes_clean_results_in_strict_mode() {
        let checked = Checked::clean(5);
        assert_eq!(checked.into_strict(true).unwrap(), 5);
    }

    #[test]
    fn escalate_fails_with_all_warnings_in_strict_mode() {
        let mut warnings = Warnings::new();
        warnings.push(Location::root(), WarningKind::OnlySupplemental);
        warnings.push(Location::root(), WarningKind::NoData);
        let err = Checked::new((), warnings).escalate(true).unwrap_err();
        assert_eq!(err.warnings.len(), 2);
        assert_eq!(err.code(), ErrorCode::StrictWarnings);
        assert!(err.to_string().starts_with("2 warning(s)"));
    }

    #[test]
    fn escalate_keeps_warnings_when_lenient() {
        let mut warnings = Warnings::new();
        warnings.push(Location::root(), WarningKind::NoData);
        let checked = Checked::new("v", warnings).escalate(false).unwrap();
        assert_eq!(checked.warnings.len(), 1);
    }

    #[test]
    fn missing_data_classification() {
        assert!(WarningKind::MissingFields { fields: vec![] }.is_missing_data());
        assert!(!WarningKind::UnknownFields { fields: vec![] }.is_missing_data());
    }

    #[test]
    fn warning_serializes_location_and_message() {
        let w = Warning {
            location: Location::piece("P"),
            kind: WarningKind::NoData,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["location"], "piece \"P\"");
        assert_eq!(json["message"], "no data found");
    }
}
