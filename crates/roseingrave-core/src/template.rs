//! Template definitions: the runtime schema vocabulary.
//!
//! The template names the metadata fields every piece and source carries,
//! the labels of the comment/notes/summary rows, numeric layout defaults,
//! spreadsheet sharing options, and per-field validation rules. It is loaded
//! once per invocation with [`load_template`] and passed by reference to
//! everything that builds or validates documents.
//!
//! Every level has built-in defaults; the raw document only overrides them.
//! `metaDataFields`, when given, replaces the default vocabulary wholesale.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::diagnostics::{Checked, Location, WarningKind, Warnings};
use crate::error::ErrorCode;

/// Keys with structural meaning in row documents; never valid metadata fields.
pub const RESERVED_KEYS: &[&str] = &["name", "link", "bars", "comments", "notes"];

/// Minimum pixel height of the comments and notes rows.
pub const MIN_ROW_HEIGHT: u32 = 21;

const DEFAULT_META_DATA_FIELDS: &[(&str, &str)] = &[
    ("title", "Title"),
    ("tempo", "Tempo"),
    ("key", "Key"),
    ("keySig", "Key signature"),
    ("timeSig", "Time signature"),
    ("barCount", "Bar count"),
    ("compass", "Compass"),
    ("clefs", "Clefs"),
    ("endOrRepeat", "End / repeat"),
    ("articulation", "Articulation"),
    ("dynamic", "Dynamics"),
    ("hand", "Hand indications"),
    ("otherIndications", "Other indications"),
];

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template definitions must be a JSON object")]
    NotAnObject,
    #[error("invalid template definitions: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl TemplateError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::TemplateInvalid
    }
}

// ---------------------------------------------------------------------------
// Template model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicAccess {
    View,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentFields {
    pub comments: String,
    pub notes: String,
    pub summary: String,
    pub supplemental_sources: String,
}

impl Default for CommentFields {
    fn default() -> Self {
        Self {
            comments: "Comments".to_string(),
            notes: "Notes".to_string(),
            summary: "SUMMARY".to_string(),
            supplemental_sources: "Supplemental sources".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValues {
    pub default_bar_count: u32,
    pub comments_row_height: u32,
    pub notes_row_height: u32,
}

impl Default for TemplateValues {
    fn default() -> Self {
        Self {
            default_bar_count: 100,
            comments_row_height: 75,
            notes_row_height: 75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerSpreadsheet {
    /// Workbook title; may contain `{email}` at most once.
    pub title: String,
    pub folder: Option<String>,
    pub public_access: Option<PublicAccess>,
    pub share_with_volunteer: bool,
    pub resize: bool,
}

impl Default for VolunteerSpreadsheet {
    fn default() -> Self {
        Self {
            title: "Transcriptions: {email}".to_string(),
            folder: None,
            public_access: None,
            share_with_volunteer: true,
            resize: false,
        }
    }
}

impl VolunteerSpreadsheet {
    #[must_use]
    pub fn title_for(&self, email: &str) -> String {
        self.title.replace("{email}", email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterSpreadsheet {
    pub title: String,
    pub folder: Option<String>,
    pub public_access: Option<PublicAccess>,
    pub share_with: Vec<String>,
    pub resize: bool,
}

impl Default for MasterSpreadsheet {
    fn default() -> Self {
        Self {
            title: "Transcriptions: MASTER".to_string(),
            folder: None,
            public_access: None,
            share_with: Vec::new(),
            resize: false,
        }
    }
}

/// Cell validation applied to one metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidationRule {
    Checkbox,
    Dropdown { values: Vec<String> },
}

/// Validated, immutable template definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub meta_data_fields: IndexMap<String, String>,
    #[serde(skip)]
    fields: Arc<[String]>,
    pub comment_fields: CommentFields,
    pub values: TemplateValues,
    pub volunteer_spreadsheet: VolunteerSpreadsheet,
    pub master_spreadsheet: MasterSpreadsheet,
    pub validation: IndexMap<String, ValidationRule>,
}

impl Default for Template {
    fn default() -> Self {
        let meta_data_fields: IndexMap<String, String> = DEFAULT_META_DATA_FIELDS
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self::assemble(
            meta_data_fields,
            CommentFields::default(),
            TemplateValues::default(),
            VolunteerSpreadsheet::default(),
            MasterSpreadsheet::default(),
            IndexMap::new(),
        )
    }
}

impl Template {
    fn assemble(
        meta_data_fields: IndexMap<String, String>,
        comment_fields: CommentFields,
        values: TemplateValues,
        volunteer_spreadsheet: VolunteerSpreadsheet,
        master_spreadsheet: MasterSpreadsheet,
        validation: IndexMap<String, ValidationRule>,
    ) -> Self {
        let fields: Arc<[String]> = meta_data_fields.keys().cloned().collect();
        Self {
            meta_data_fields,
            fields,
            comment_fields,
            values,
            volunteer_spreadsheet,
            master_spreadsheet,
            validation,
        }
    }

    /// Ordered metadata field keys, shared by every shape built from this template.
    #[must_use]
    pub fn fields(&self) -> &Arc<[String]> {
        &self.fields
    }

    /// Ordered metadata row labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.meta_data_fields.values().map(String::as_str)
    }

    #[must_use]
    pub fn is_field(&self, key: &str) -> bool {
        self.meta_data_fields.contains_key(key)
    }

    #[must_use]
    pub const fn default_bar_count(&self) -> u32 {
        self.values.default_bar_count
    }

    /// Return a copy with a different default bar count (test helper).
    #[must_use]
    pub fn with_default_bar_count(mut self, bar_count: u32) -> Self {
        self.values.default_bar_count = bar_count.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

const LEVELS: &[&str] = &[
    "metaDataFields",
    "commentFields",
    "values",
    "volunteerSpreadsheet",
    "masterSpreadsheet",
    "validation",
];

fn setting_location(level: &str, key: &str) -> Location {
    Location::setting(&format!("\"{level}\".\"{key}\""))
}

/// Collects problems while overlaying one raw level on its defaults.
struct Overlay<'a> {
    level: &'static str,
    raw: Option<&'a Map<String, Value>>,
    warnings: &'a mut Warnings,
    problems: &'a mut Vec<String>,
}

impl<'a> Overlay<'a> {
    fn new(
        root: &'a Map<String, Value>,
        level: &'static str,
        known: &[&str],
        warnings: &'a mut Warnings,
        problems: &'a mut Vec<String>,
    ) -> Self {
        let raw = match root.get(level) {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                warnings.push(
                    Location::setting(&format!("\"{level}\"")),
                    WarningKind::InvalidValue {
                        value: other.to_string(),
                        expected: "an object",
                    },
                );
                None
            }
        };
        if let Some(map) = raw {
            for key in map.keys() {
                if !known.contains(&key.as_str()) {
                    warnings.push(
                        Location::setting(&format!("\"{level}\"")),
                        WarningKind::UnknownKey { key: key.clone() },
                    );
                }
            }
        }
        Self {
            level,
            raw,
            warnings,
            problems,
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.raw.and_then(|map| map.get(key))
    }

    fn reset(&mut self, key: &str, value: &Value, expected: &'static str) {
        self.warnings.push(
            setting_location(self.level, key),
            WarningKind::InvalidValue {
                value: value.to_string(),
                expected,
            },
        );
    }

    fn string(&mut self, key: &str, default: String) -> String {
        match self.get(key) {
            None => default,
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                self.reset(key, other, "a string");
                default
            }
        }
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.reset(key, other, "true or false");
                default
            }
        }
    }

    fn folder(&mut self, key: &str) -> Option<String> {
        match self.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.reset(key, other, "null or a string");
                None
            }
        }
    }

    fn public_access(&mut self, key: &str) -> Option<PublicAccess> {
        match self.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s == "view" => Some(PublicAccess::View),
            Some(Value::String(s)) if s == "edit" => Some(PublicAccess::Edit),
            Some(other) => {
                self.reset(key, other, "null, \"view\", or \"edit\"");
                None
            }
        }
    }

    fn string_list(&mut self, key: &str) -> Vec<String> {
        match self.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(other) => {
                self.reset(key, other, "a list of emails");
                Vec::new()
            }
        }
    }

    /// Integer setting with a lower bound; violations are fatal.
    fn bounded(&mut self, key: &str, default: u32, min: u32, rule: &str) -> u32 {
        let Some(value) = self.get(key) else {
            return default;
        };
        match value.as_i64() {
            Some(n) if n >= i64::from(min) => u32::try_from(n).unwrap_or(u32::MAX),
            _ => {
                self.problems
                    .push(format!("\"{}\".\"{key}\": {rule}", self.level));
                default
            }
        }
    }
}

fn load_meta_data_fields(
    root: &Map<String, Value>,
    warnings: &mut Warnings,
) -> IndexMap<String, String> {
    let defaults = Template::default().meta_data_fields;
    let Some(raw) = root.get("metaDataFields") else {
        return defaults;
    };
    let Some(map) = raw.as_object() else {
        warnings.push(
            Location::setting("\"metaDataFields\""),
            WarningKind::InvalidValue {
                value: raw.to_string(),
                expected: "an object",
            },
        );
        return defaults;
    };
    let mut fields = IndexMap::new();
    for (key, label) in map {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warnings.push(
                setting_location("metaDataFields", key),
                WarningKind::InvalidValue {
                    value: format!("\"{key}\""),
                    expected: "a key not reserved for document structure",
                },
            );
            continue;
        }
        match label {
            Value::String(label) => {
                fields.insert(key.clone(), label.clone());
            }
            other => warnings.push(
                setting_location("metaDataFields", key),
                WarningKind::InvalidValue {
                    value: other.to_string(),
                    expected: "a string label",
                },
            ),
        }
    }
    fields
}

fn load_validation(
    root: &Map<String, Value>,
    fields: &IndexMap<String, String>,
    warnings: &mut Warnings,
) -> IndexMap<String, ValidationRule> {
    let mut rules = IndexMap::new();
    let Some(raw) = root.get("validation") else {
        return rules;
    };
    let Some(map) = raw.as_object() else {
        warnings.push(
            Location::setting("\"validation\""),
            WarningKind::InvalidValue {
                value: raw.to_string(),
                expected: "an object",
            },
        );
        return rules;
    };
    for (key, rule) in map {
        let at = setting_location("validation", key);
        if !fields.contains_key(key) {
            warnings.push(at, WarningKind::UnknownKey { key: key.clone() });
            continue;
        }
        let reason = match rule.get("type").and_then(Value::as_str) {
            None => "no type".to_string(),
            Some("checkbox") => {
                rules.insert(key.clone(), ValidationRule::Checkbox);
                continue;
            }
            Some("dropdown") => {
                let values: Vec<String> = rule
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                if values.is_empty() {
                    "no values for dropdown".to_string()
                } else {
                    rules.insert(key.clone(), ValidationRule::Dropdown { values });
                    continue;
                }
            }
            Some(other) => format!("unknown type \"{other}\""),
        };
        warnings.push(at, WarningKind::InvalidValidationRule { reason });
    }
    rules
}

/// Validate raw template definitions and overlay them on the built-in defaults.
///
/// Reconcilable problems (unknown keys, wrongly typed booleans, invalid
/// `publicAccess`, bad validation rules) are returned as warnings and the
/// affected value falls back to its default. Strict escalation is left to
/// the caller.
///
/// # Errors
///
/// Returns [`TemplateError::Invalid`] listing every fatal problem: a
/// non-positive `defaultBarCount`, a row height below 21, or a volunteer
/// spreadsheet title with more than one `{email}`.
pub fn load_template(raw: &Value) -> Result<Checked<Template>, TemplateError> {
    let root = raw.as_object().ok_or(TemplateError::NotAnObject)?;
    info!("reading template definitions");

    let mut warnings = Warnings::new();
    let mut problems = Vec::new();

    for key in root.keys() {
        if !LEVELS.contains(&key.as_str()) {
            warnings.push(Location::root(), WarningKind::UnknownKey { key: key.clone() });
        }
    }

    let meta_data_fields = load_meta_data_fields(root, &mut warnings);

    let defaults = CommentFields::default();
    let mut level = Overlay::new(
        root,
        "commentFields",
        &["comments", "notes", "summary", "supplementalSources"],
        &mut warnings,
        &mut problems,
    );
    let comment_fields = CommentFields {
        comments: level.string("comments", defaults.comments),
        notes: level.string("notes", defaults.notes),
        summary: level.string("summary", defaults.summary),
        supplemental_sources: level.string("supplementalSources", defaults.supplemental_sources),
    };

    let defaults = TemplateValues::default();
    let mut level = Overlay::new(
        root,
        "values",
        &["defaultBarCount", "commentsRowHeight", "notesRowHeight"],
        &mut warnings,
        &mut problems,
    );
    let values = TemplateValues {
        default_bar_count: level.bounded(
            "defaultBarCount",
            defaults.default_bar_count,
            1,
            "must be positive",
        ),
        comments_row_height: level.bounded(
            "commentsRowHeight",
            defaults.comments_row_height,
            MIN_ROW_HEIGHT,
            "must be at least 21",
        ),
        notes_row_height: level.bounded(
            "notesRowHeight",
            defaults.notes_row_height,
            MIN_ROW_HEIGHT,
            "must be at least 21",
        ),
    };

    let defaults = VolunteerSpreadsheet::default();
    let mut level = Overlay::new(
        root,
        "volunteerSpreadsheet",
        &["title", "folder", "publicAccess", "shareWithVolunteer", "resize"],
        &mut warnings,
        &mut problems,
    );
    let volunteer_spreadsheet = VolunteerSpreadsheet {
        title: level.string("title", defaults.title),
        folder: level.folder("folder"),
        public_access: level.public_access("publicAccess"),
        share_with_volunteer: level.boolean("shareWithVolunteer", defaults.share_with_volunteer),
        resize: level.boolean("resize", defaults.resize),
    };
    if volunteer_spreadsheet.title.matches("{email}").count() > 1 {
        problems.push(
            "\"volunteerSpreadsheet\".\"title\": can only contain \"{email}\" at most once"
                .to_string(),
        );
    }

    let defaults = MasterSpreadsheet::default();
    let mut level = Overlay::new(
        root,
        "masterSpreadsheet",
        &["title", "folder", "publicAccess", "shareWith", "resize"],
        &mut warnings,
        &mut problems,
    );
    let master_spreadsheet = MasterSpreadsheet {
        title: level.string("title", defaults.title),
        folder: level.folder("folder"),
        public_access: level.public_access("publicAccess"),
        share_with: level.string_list("shareWith"),
        resize: level.boolean("resize", defaults.resize),
    };

    let validation = load_validation(root, &meta_data_fields, &mut warnings);

    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("{problem}");
        }
        return Err(TemplateError::Invalid(problems));
    }

    let template = Template::assemble(
        meta_data_fields,
        comment_fields,
        values,
        volunteer_spreadsheet,
        master_spreadsheet,
        validation,
    );
    Ok(Checked::new(template, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let checked = load_template(&json!({})).unwrap();
        assert!(checked.is_clean());
        assert_eq!(checked.value, Template::default());
        assert_eq!(checked.value.default_bar_count(), 100);
        assert_eq!(checked.value.fields().len(), DEFAULT_META_DATA_FIELDS.len());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            load_template(&json!([1, 2])),
            Err(TemplateError::NotAnObject)
        ));
    }

    #[test]
    fn meta_data_fields_replace_vocabulary_in_order() {
        let raw = json!({"metaDataFields": {"tempo": "Tempo", "mood": "Mood"}});
        let template = load_template(&raw).unwrap().value;
        let keys: Vec<&str> = template.fields().iter().map(String::as_str).collect();
        assert_eq!(keys, ["tempo", "mood"]);
        assert!(template.is_field("mood"));
        assert!(!template.is_field("key"));
    }

    #[test]
    fn reserved_field_keys_are_dropped_with_warning() {
        let raw = json!({"metaDataFields": {"bars": "Bars", "tempo": "Tempo"}});
        let checked = load_template(&raw).unwrap();
        assert_eq!(checked.warnings.len(), 1);
        assert!(!checked.value.is_field("bars"));
    }

    #[test]
    fn unknown_keys_warn() {
        let raw = json!({"extra": 1, "values": {"defaultBarCount": 12, "bogus": 3}});
        let checked = load_template(&raw).unwrap();
        assert_eq!(checked.warnings.len(), 2);
        assert_eq!(checked.value.default_bar_count(), 12);
    }

    #[test]
    fn non_positive_bar_count_is_fatal() {
        let err = load_template(&json!({"values": {"defaultBarCount": 0}})).unwrap_err();
        assert!(err.to_string().contains("defaultBarCount"));
    }

    #[test]
    fn short_rows_are_fatal_and_all_problems_reported() {
        let raw = json!({
            "values": {"commentsRowHeight": 20, "notesRowHeight": 5},
            "volunteerSpreadsheet": {"title": "{email} {email}"}
        });
        match load_template(&raw) {
            Err(TemplateError::Invalid(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("expected invalid template, got {other:?}"),
        }
    }

    #[test]
    fn bad_booleans_and_access_reset_with_warning() {
        let raw = json!({
            "volunteerSpreadsheet": {"resize": "yes", "publicAccess": "comment"},
            "masterSpreadsheet": {"publicAccess": "edit"}
        });
        let checked = load_template(&raw).unwrap();
        assert_eq!(checked.warnings.len(), 2);
        let template = checked.value;
        assert!(!template.volunteer_spreadsheet.resize);
        assert_eq!(template.volunteer_spreadsheet.public_access, None);
        assert_eq!(
            template.master_spreadsheet.public_access,
            Some(PublicAccess::Edit)
        );
    }

    #[test]
    fn validation_rules_are_filtered() {
        let raw = json!({
            "validation": {
                "hand": {"type": "checkbox"},
                "key": {"type": "dropdown", "values": ["C", "G"]},
                "tempo": {"type": "dropdown", "values": []},
                "clefs": {},
                "compass": {"type": "slider"},
                "nope": {"type": "checkbox"}
            }
        });
        let checked = load_template(&raw).unwrap();
        assert_eq!(checked.warnings.len(), 4);
        let rules = &checked.value.validation;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules["hand"], ValidationRule::Checkbox);
        assert_eq!(
            rules["key"],
            ValidationRule::Dropdown {
                values: vec!["C".into(), "G".into()]
            }
        );
    }

    #[test]
    fn volunteer_title_substitutes_email() {
        let template = Template::default();
        assert_eq!(
            template.volunteer_spreadsheet.title_for("a@x.org"),
            "Transcriptions: a@x.org"
        );
    }

    #[test]
    fn strict_escalation_is_left_to_caller() {
        let checked = load_template(&json!({"extra": true})).unwrap();
        assert!(checked.clone().escalate(false).is_ok());
        assert!(checked.escalate(true).is_err());
    }
}
