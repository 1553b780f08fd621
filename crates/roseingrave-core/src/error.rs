use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TemplateInvalid,
    SettingsInvalid,
    PlaceholderInvalid,
    MissingField,
    InvalidFieldValue,
    InvalidBarCount,
    EmptyPiece,
    EmptyVolunteer,
    NoDefinitions,
    MissingSources,
    MissingData,
    StrictWarnings,
    MalformedSheet,
    InvalidHyperlinkColumn,
    FileNotFound,
    FileReadFailed,
    FileWriteFailed,
    JsonParseFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TemplateInvalid => "E1001",
            Self::SettingsInvalid => "E1002",
            Self::PlaceholderInvalid => "E1003",
            Self::MissingField => "E2001",
            Self::InvalidFieldValue => "E2002",
            Self::InvalidBarCount => "E2003",
            Self::EmptyPiece => "E2004",
            Self::EmptyVolunteer => "E2005",
            Self::NoDefinitions => "E2006",
            Self::MissingSources => "E3001",
            Self::MissingData => "E3002",
            Self::StrictWarnings => "E3003",
            Self::MalformedSheet => "E4001",
            Self::InvalidHyperlinkColumn => "E4002",
            Self::FileNotFound => "E5001",
            Self::FileReadFailed => "E5002",
            Self::FileWriteFailed => "E5003",
            Self::JsonParseFailed => "E5004",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TemplateInvalid => "Template definitions invalid",
            Self::SettingsInvalid => "Settings file invalid",
            Self::PlaceholderInvalid => "Path placeholder invalid",
            Self::MissingField => "Required field missing",
            Self::InvalidFieldValue => "Field has the wrong type",
            Self::InvalidBarCount => "Bar count is not positive",
            Self::EmptyPiece => "Piece has no sources",
            Self::EmptyVolunteer => "Volunteer has no known pieces",
            Self::NoDefinitions => "Definitions file is empty",
            Self::MissingSources => "Declared source missing from document",
            Self::MissingData => "Document is missing required data",
            Self::StrictWarnings => "Warnings escalated by strict mode",
            Self::MalformedSheet => "Sheet layout not recognized",
            Self::InvalidHyperlinkColumn => "Source column has no valid hyperlink",
            Self::FileNotFound => "File not found",
            Self::FileReadFailed => "File read failed",
            Self::FileWriteFailed => "File write failed",
            Self::JsonParseFailed => "JSON parse error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::TemplateInvalid => Some("Fix the reported template values and retry."),
            Self::SettingsInvalid => {
                Some("Fix roseingrave.toml (or roseingrave.json) and retry.")
            }
            Self::PlaceholderInvalid => {
                Some("Data paths must contain `{email}` or `{piece}` exactly once.")
            }
            Self::MissingField | Self::InvalidFieldValue | Self::InvalidBarCount => {
                Some("Fix the reported entry in the definitions file.")
            }
            Self::EmptyPiece => Some("Give every piece at least one source."),
            Self::EmptyVolunteer => {
                Some("Assign every volunteer at least one piece from the piece definitions.")
            }
            Self::NoDefinitions => Some("Add at least one entry to the definitions file."),
            Self::MissingSources => {
                Some("Re-run the previous pipeline stage to regenerate the document.")
            }
            Self::MissingData => Some("Regenerate the summary file with `roseingrave export-master`."),
            Self::StrictWarnings => Some("Fix the warnings above or re-run without --strict."),
            Self::MalformedSheet | Self::InvalidHyperlinkColumn => {
                Some("Restore the sheet layout produced by `roseingrave create-sheets`.")
            }
            Self::FileNotFound => Some("Check the path in the settings file or the command flags."),
            Self::FileReadFailed | Self::FileWriteFailed => {
                Some("Check file permissions and disk space.")
            }
            Self::JsonParseFailed => Some("Fix the JSON syntax and retry."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
