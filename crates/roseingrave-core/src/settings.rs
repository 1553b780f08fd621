//! Settings file: where every input and output file lives.
//!
//! `roseingrave.toml` is read when present, otherwise `roseingrave.json`;
//! with neither, every role takes its default. Each path is either a string
//! or a list of path components.
//!
//! ```toml
//! [definitionFiles]
//! pieces = ["defs", "pieces.json"]
//!
//! [outputs]
//! volunteerDataPath = "data/{email}.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ErrorCode;
use crate::store::{PathTemplate, Placeholder, require_json};

pub const TOML_FILE: &str = "roseingrave.toml";
pub const JSON_FILE: &str = "roseingrave.json";

const DEFAULT_CREDENTIALS: &str = "credentials.json";
const DEFAULT_TEMPLATE: &str = "template_definitions.json";
const DEFAULT_PIECES: &str = "piece_definitions.json";
const DEFAULT_VOLUNTEERS: &str = "volunteer_definitions.json";
const DEFAULT_SPREADSHEETS_INDEX: &str = "spreadsheets.json";
const DEFAULT_PIECE_SUMMARY: &str = "summary.json";
const DEFAULT_PIECE_DATA: &str = "pieces/{piece}.json";
const DEFAULT_VOLUNTEER_DATA: &str = "volunteers/{email}.json";
const DEFAULT_VOLUNTEER_SHEETS: &str = "sheets/volunteers/{email}.json";
const DEFAULT_MASTER_SHEET: &str = "sheets/master.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("invalid settings: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl SettingsError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::FileReadFailed,
            Self::Parse { .. } | Self::Invalid(_) => ErrorCode::SettingsInvalid,
        }
    }
}

/// A path given as one string or as a list of components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    Path(String),
    Components(Vec<String>),
}

impl PathSpec {
    fn to_path(&self) -> PathBuf {
        match self {
            Self::Path(path) => PathBuf::from(path),
            Self::Components(parts) => parts.iter().collect(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.is_empty(),
            Self::Components(parts) => parts.iter().all(String::is_empty),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDefinitionFiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pieces: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteers: Option<PathSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheets_index: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_summary: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_data_path: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_data_path: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_sheet_path: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_sheet: Option<PathSpec>,
}

/// The settings document as written. Unrecognized keys are dropped;
/// serializing it back gives the normalized file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathSpec>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub definition_files: RawDefinitionFiles,
    #[serde(default, skip_serializing_if = "is_default")]
    pub outputs: RawOutputs,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Format of a settings file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Toml,
    Json,
}

/// A settings file found in a directory, or its absence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFile {
    pub location: Option<(PathBuf, SettingsFormat)>,
    pub raw: RawSettings,
}

impl SettingsFile {
    /// Find and parse the settings file in `dir`.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn discover(dir: &Path) -> Result<Self, SettingsError> {
        for (name, format) in [(TOML_FILE, SettingsFormat::Toml), (JSON_FILE, SettingsFormat::Json)] {
            let path = dir.join(name);
            if path.is_file() {
                info!(path = %path.display(), "reading settings file");
                let content = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let raw = parse(&content, format).map_err(|reason| SettingsError::Parse {
                    path: path.display().to_string(),
                    reason,
                })?;
                return Ok(Self {
                    location: Some((path, format)),
                    raw,
                });
            }
        }
        info!("no settings file; using defaults");
        Ok(Self::default())
    }

    /// Validate every role, reporting all problems together.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] listing every bad role.
    pub fn resolve(&self) -> Result<Settings, SettingsError> {
        let raw = &self.raw;
        let defs = &raw.definition_files;
        let outs = &raw.outputs;
        let mut problems = Vec::new();

        let mut file = |key: &str, spec: Option<&PathSpec>, default: &str| {
            check_file(key, spec, default, &mut problems)
        };
        let credentials = file("credentials", raw.credentials.as_ref(), DEFAULT_CREDENTIALS);
        let template = file("template", defs.template.as_ref(), DEFAULT_TEMPLATE);
        let pieces = file("pieces", defs.pieces.as_ref(), DEFAULT_PIECES);
        let volunteers = file("volunteers", defs.volunteers.as_ref(), DEFAULT_VOLUNTEERS);
        let spreadsheets_index = file(
            "spreadsheetsIndex",
            outs.spreadsheets_index.as_ref(),
            DEFAULT_SPREADSHEETS_INDEX,
        );
        let piece_summary = file("pieceSummary", outs.piece_summary.as_ref(), DEFAULT_PIECE_SUMMARY);
        let master_sheet = file("masterSheet", outs.master_sheet.as_ref(), DEFAULT_MASTER_SHEET);

        let mut path_template = |key: &str, spec: Option<&PathSpec>, default: &str, placeholder| {
            let path = spec.map_or_else(|| PathBuf::from(default), PathSpec::to_path);
            PathTemplate::new(path.display().to_string(), placeholder)
                .map_err(|err| problems.push(format!("\"{key}\": {err}")))
                .ok()
        };
        let piece_data = path_template(
            "pieceDataPath",
            outs.piece_data_path.as_ref(),
            DEFAULT_PIECE_DATA,
            Placeholder::Piece,
        );
        let volunteer_data = path_template(
            "volunteerDataPath",
            outs.volunteer_data_path.as_ref(),
            DEFAULT_VOLUNTEER_DATA,
            Placeholder::Email,
        );
        let volunteer_sheets = path_template(
            "volunteerSheetPath",
            outs.volunteer_sheet_path.as_ref(),
            DEFAULT_VOLUNTEER_SHEETS,
            Placeholder::Email,
        );

        let (Some(piece_data), Some(volunteer_data), Some(volunteer_sheets)) =
            (piece_data, volunteer_data, volunteer_sheets)
        else {
            return Err(invalid(problems));
        };
        if !problems.is_empty() {
            return Err(invalid(problems));
        }
        Ok(Settings {
            credentials,
            template,
            pieces,
            volunteers,
            spreadsheets_index,
            piece_summary,
            piece_data,
            volunteer_data,
            volunteer_sheets,
            master_sheet,
        })
    }

    /// The settings document with only recognized, explicitly given keys,
    /// in the file's own format.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn normalized(&self) -> Result<String, SettingsError> {
        let format = self
            .location
            .as_ref()
            .map_or(SettingsFormat::Json, |(_, format)| *format);
        let path = self
            .location
            .as_ref()
            .map_or_else(|| JSON_FILE.to_string(), |(path, _)| path.display().to_string());
        let rendered = match format {
            SettingsFormat::Toml => toml::to_string_pretty(&self.raw).map_err(|e| e.to_string()),
            SettingsFormat::Json => serde_json::to_string_pretty(&self.raw)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
        };
        rendered.map_err(|reason| SettingsError::Parse { path, reason })
    }
}

fn parse(content: &str, format: SettingsFormat) -> Result<RawSettings, String> {
    match format {
        SettingsFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        SettingsFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
}

fn check_file(key: &str, spec: Option<&PathSpec>, default: &str, problems: &mut Vec<String>) -> PathBuf {
    let Some(spec) = spec else {
        return PathBuf::from(default);
    };
    if spec.is_empty() {
        problems.push(format!("\"{key}\": path must not be empty"));
        return PathBuf::from(default);
    }
    let path = spec.to_path();
    if let Err(err) = require_json(&path.display().to_string()) {
        problems.push(format!("\"{key}\": {err}"));
    }
    path
}

fn invalid(problems: Vec<String>) -> SettingsError {
    for problem in &problems {
        error!("{problem}");
    }
    SettingsError::Invalid(problems)
}

/// Resolved file locations for every role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Spreadsheet service credentials; passed through for the uploading
    /// collaborator.
    pub credentials: PathBuf,
    pub template: PathBuf,
    pub pieces: PathBuf,
    pub volunteers: PathBuf,
    pub spreadsheets_index: PathBuf,
    pub piece_summary: PathBuf,
    pub piece_data: PathTemplate,
    pub volunteer_data: PathTemplate,
    pub volunteer_sheets: PathTemplate,
    pub master_sheet: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_file_means_defaults() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::discover(dir.path()).unwrap();
        assert!(file.location.is_none());
        let settings = file.resolve().unwrap();
        assert_eq!(settings.pieces, PathBuf::from("piece_definitions.json"));
        assert_eq!(settings.volunteer_data.as_str(), "volunteers/{email}.json");
        assert_eq!(settings.piece_data.placeholder(), Placeholder::Piece);
    }

    #[test]
    fn toml_is_preferred_and_components_are_joined() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(TOML_FILE),
            "[definitionFiles]\npieces = [\"defs\", \"p.json\"]\n",
        )
        .unwrap();
        fs::write(dir.path().join(JSON_FILE), "{\"credentials\": \"x.txt\"}").unwrap();
        let file = SettingsFile::discover(dir.path()).unwrap();
        assert_eq!(file.location.as_ref().unwrap().1, SettingsFormat::Toml);
        let settings = file.resolve().unwrap();
        assert_eq!(settings.pieces, Path::new("defs").join("p.json"));
    }

    #[test]
    fn every_problem_is_reported() {
        let raw: RawSettings = serde_json::from_value(serde_json::json!({
            "credentials": "creds.txt",
            "outputs": {
                "pieceDataPath": "pieces/all.json",
                "volunteerDataPath": ["{email}", "{email}.json"]
            }
        }))
        .unwrap();
        let file = SettingsFile {
            location: None,
            raw,
        };
        match file.resolve() {
            Err(SettingsError::Invalid(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("expected invalid settings, got {other:?}"),
        }
    }

    #[test]
    fn normalized_keeps_only_given_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(JSON_FILE),
            r#"{"bogus": 1, "outputs": {"pieceSummary": "s.json"}}"#,
        )
        .unwrap();
        let file = SettingsFile::discover(dir.path()).unwrap();
        let normalized: serde_json::Value =
            serde_json::from_str(&file.normalized().unwrap()).unwrap();
        assert_eq!(
            normalized,
            serde_json::json!({"outputs": {"pieceSummary": "s.json"}})
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TOML_FILE), "outputs = [").unwrap();
        let err = SettingsFile::discover(dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SettingsInvalid);
    }
}
