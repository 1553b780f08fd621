//! Expected document shapes and the reconcile algorithm.
//!
//! A [`Shape`] describes the fixed field set of one row document: the
//! template's metadata fields, a contiguous bar range `"1".."N"`, and
//! optionally a `comments` field. Leaves are either plain text (one
//! contributor per row) or annotation maps keyed by contributor email.
//!
//! [`reconcile`] fits an arbitrary raw JSON value to a shape. It never fails:
//! every problem is reported in [`Diagnostics`] and the output always has
//! exactly the shape's field set.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::diagnostics::{Location, WarningKind, Warnings};
use crate::template::Template;

pub const BARS: &str = "bars";
pub const COMMENTS: &str = "comments";

/// Keys that identify a row rather than hold data; never reported as unknown.
const IDENTITY_KEYS: &[&str] = &["name", "link"];

/// Zero value of every leaf in a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    /// `""`: a single contributor's row.
    Text,
    /// `{}`: remarks from many contributors keyed by email.
    Annotations,
}

impl Leaf {
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Text => Value::String(String::new()),
            Self::Annotations => Value::Object(Map::new()),
        }
    }
}

/// Expected field set of a row document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    fields: Arc<[String]>,
    bar_count: u32,
    leaf: Leaf,
    comments: bool,
}

impl Shape {
    #[must_use]
    pub const fn new(fields: Arc<[String]>, bar_count: u32, leaf: Leaf, comments: bool) -> Self {
        Self {
            fields,
            bar_count,
            leaf,
            comments,
        }
    }

    /// Shape over the template's metadata fields.
    #[must_use]
    pub fn for_template(template: &Template, bar_count: u32, leaf: Leaf, comments: bool) -> Self {
        Self::new(Arc::clone(template.fields()), bar_count, leaf, comments)
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub const fn bar_count(&self) -> u32 {
        self.bar_count
    }

    #[must_use]
    pub const fn leaf(&self) -> Leaf {
        self.leaf
    }

    #[must_use]
    pub const fn has_comments(&self) -> bool {
        self.comments
    }

    /// Same shape with a different leaf kind.
    #[must_use]
    pub fn with_leaf(&self, leaf: Leaf) -> Self {
        Self {
            leaf,
            ..self.clone()
        }
    }

    /// Canonical bar keys `"1".."N"`.
    pub fn bar_keys(&self) -> impl Iterator<Item = String> {
        (1..=self.bar_count).map(|n| n.to_string())
    }

    #[must_use]
    pub fn is_bar_key(&self, key: &str) -> bool {
        // canonical form only: no sign, no leading zeros
        !key.starts_with(['+', '0'])
            && key
                .parse::<u32>()
                .is_ok_and(|n| (1..=self.bar_count).contains(&n))
    }

    fn is_field(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f == key) || (self.comments && key == COMMENTS)
    }

    /// Top-level keys in output order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(BARS))
            .chain(self.comments.then_some(COMMENTS))
    }

    /// Document with every field at its zero value.
    #[must_use]
    pub fn default_value(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        for field in self.fields.iter() {
            doc.insert(field.clone(), self.leaf.zero());
        }
        let bars: Map<String, Value> = self.bar_keys().map(|k| (k, self.leaf.zero())).collect();
        doc.insert(BARS.to_string(), Value::Object(bars));
        if self.comments {
            doc.insert(COMMENTS.to_string(), self.leaf.zero());
        }
        doc
    }
}

/// How raw values are written into the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign<'a> {
    /// Replace the slot with the raw value.
    Overwrite,
    /// Insert non-empty values into the slot's annotation map under `contributor`.
    Aggregate { contributor: &'a str },
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Whether every leaf of a document is empty.
#[must_use]
pub fn is_blank_document(doc: &Map<String, Value>) -> bool {
    doc.values().all(|value| match value {
        Value::Object(inner) => is_blank_document(inner),
        other => is_blank(other),
    })
}

impl Assign<'_> {
    fn write(self, slot: &mut Value, value: &Value) {
        match self {
            Self::Overwrite => *slot = value.clone(),
            Self::Aggregate { contributor } => {
                if is_blank(value) {
                    return;
                }
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(annotations) = slot {
                    annotations.insert(contributor.to_string(), value.clone());
                }
            }
        }
    }
}

/// Problems found while reconciling one raw document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub missing_fields: Vec<String>,
    pub missing_bars: Vec<String>,
    pub extra_bars: Vec<String>,
    pub unknown_fields: Vec<String>,
    /// Keys whose value had the wrong JSON type (`bars` not an object, or
    /// the whole document not an object).
    pub malformed: Vec<String>,
}

impl Diagnostics {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty()
            && self.missing_bars.is_empty()
            && self.extra_bars.is_empty()
            && self.unknown_fields.is_empty()
            && self.malformed.is_empty()
    }

    /// Whether any required data was absent.
    #[must_use]
    pub fn has_missing_data(&self) -> bool {
        !(self.missing_fields.is_empty() && self.missing_bars.is_empty() && self.malformed.is_empty())
    }

    /// One warning per non-empty category, in a fixed order.
    #[must_use]
    pub fn into_kinds(self, bar_count: u32) -> Vec<WarningKind> {
        let mut kinds = Vec::new();
        if !self.malformed.is_empty() {
            kinds.push(WarningKind::MalformedValue {
                fields: self.malformed,
            });
        }
        if !self.missing_fields.is_empty() {
            kinds.push(WarningKind::MissingFields {
                fields: self.missing_fields,
            });
        }
        if !self.missing_bars.is_empty() {
            kinds.push(WarningKind::MissingBars {
                bars: self.missing_bars,
            });
        }
        if !self.extra_bars.is_empty() {
            kinds.push(WarningKind::ExtraBars {
                bars: self.extra_bars,
                bar_count,
            });
        }
        if !self.unknown_fields.is_empty() {
            kinds.push(WarningKind::UnknownFields {
                fields: self.unknown_fields,
            });
        }
        kinds
    }

    /// Record every category as a warning at `at`.
    pub fn report(self, at: &Location, bar_count: u32, warnings: &mut Warnings) {
        for kind in self.into_kinds(bar_count) {
            warnings.push(at.clone(), kind);
        }
    }
}

/// Fit `raw` to `shape`, starting from the shape's zero document.
#[must_use]
pub fn reconcile(raw: &Value, shape: &Shape, assign: Assign<'_>) -> (Diagnostics, Map<String, Value>) {
    let mut fixed = match assign {
        Assign::Overwrite => shape.default_value(),
        Assign::Aggregate { .. } => shape.with_leaf(Leaf::Annotations).default_value(),
    };
    let diagnostics = reconcile_into(raw, shape, assign, &mut fixed);
    (diagnostics, fixed)
}

/// Fit `raw` to `shape`, writing into an existing document.
///
/// `target` must already have the shape's field set (as produced by
/// [`Shape::default_value`]); aggregating several contributors into one
/// document is done by calling this repeatedly on the same target.
pub fn reconcile_into(
    raw: &Value,
    shape: &Shape,
    assign: Assign<'_>,
    target: &mut Map<String, Value>,
) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let Some(raw) = raw.as_object() else {
        diagnostics.malformed.push("(document)".to_string());
        diagnostics.missing_fields = shape.keys().map(str::to_string).collect();
        return diagnostics;
    };

    let mut missing_fields: Vec<&str> = shape.keys().collect();

    match raw.get(BARS) {
        None => {}
        Some(Value::Object(bars)) => {
            missing_fields.retain(|k| *k != BARS);
            let mut missing_bars: Vec<String> = shape.bar_keys().collect();
            let target_bars = bars_slot(target);
            for (bar, value) in bars {
                if !shape.is_bar_key(bar) {
                    diagnostics.extra_bars.push(bar.clone());
                    continue;
                }
                missing_bars.retain(|b| b != bar);
                let slot = target_bars
                    .entry(bar.clone())
                    .or_insert_with(|| shape.leaf.zero());
                assign.write(slot, value);
            }
            diagnostics.missing_bars = missing_bars;
        }
        Some(_) => {
            missing_fields.retain(|k| *k != BARS);
            diagnostics.malformed.push(BARS.to_string());
            diagnostics.missing_bars = shape.bar_keys().collect();
        }
    }

    for (key, value) in raw {
        if key == BARS || IDENTITY_KEYS.contains(&key.as_str()) {
            continue;
        }
        if !shape.is_field(key) {
            diagnostics.unknown_fields.push(key.clone());
            continue;
        }
        missing_fields.retain(|k| k != key);
        let slot = target
            .entry(key.clone())
            .or_insert_with(|| shape.leaf.zero());
        assign.write(slot, value);
    }

    diagnostics.missing_fields = missing_fields.into_iter().map(str::to_string).collect();
    diagnostics
}

fn bars_slot(target: &mut Map<String, Value>) -> &mut Map<String, Value> {
    let slot = target
        .entry(BARS.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("bars slot was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape(bars: u32, leaf: Leaf, comments: bool) -> Shape {
        let fields: Arc<[String]> = vec!["tempo".to_string(), "key".to_string()].into();
        Shape::new(fields, bars, leaf, comments)
    }

    #[test]
    fn default_value_has_contiguous_bars() {
        let doc = shape(3, Leaf::Text, true).default_value();
        assert_eq!(
            Value::Object(doc),
            json!({
                "tempo": "", "key": "",
                "bars": {"1": "", "2": "", "3": ""},
                "comments": ""
            })
        );
    }

    #[test]
    fn annotation_default_uses_maps() {
        let doc = shape(1, Leaf::Annotations, false).default_value();
        assert_eq!(
            Value::Object(doc),
            json!({"tempo": {}, "key": {}, "bars": {"1": {}}})
        );
    }

    #[test]
    fn complete_document_is_clean() {
        let raw = json!({
            "name": "S", "link": "l",
            "tempo": "fast", "key": "C",
            "bars": {"1": "a", "2": ""},
            "comments": "ok"
        });
        let (diag, fixed) = reconcile(&raw, &shape(2, Leaf::Text, true), Assign::Overwrite);
        assert!(diag.is_clean(), "{diag:?}");
        assert_eq!(fixed["tempo"], "fast");
        assert_eq!(fixed["bars"]["1"], "a");
        assert!(!fixed.contains_key("name"));
    }

    #[test]
    fn reports_each_category() {
        let raw = json!({
            "tempo": "x",
            "mood": "y",
            "bars": {"1": "a", "4": "b", "01": "c"}
        });
        let (diag, fixed) = reconcile(&raw, &shape(3, Leaf::Text, true), Assign::Overwrite);
        assert_eq!(diag.missing_fields, ["key", "comments"]);
        assert_eq!(diag.missing_bars, ["2", "3"]);
        assert_eq!(diag.extra_bars, ["4", "01"]);
        assert_eq!(diag.unknown_fields, ["mood"]);
        assert!(diag.has_missing_data());
        let bars = fixed["bars"].as_object().unwrap();
        assert_eq!(bars.len(), 3);
        assert!(!bars.contains_key("4"));
        assert!(!fixed.contains_key("mood"));
    }

    #[test]
    fn comments_unknown_when_shape_excludes_them() {
        let raw = json!({"tempo": "", "key": "", "bars": {"1": ""}, "comments": "x"});
        let (diag, fixed) = reconcile(&raw, &shape(1, Leaf::Text, false), Assign::Overwrite);
        assert_eq!(diag.unknown_fields, ["comments"]);
        assert!(!fixed.contains_key("comments"));
    }

    #[test]
    fn malformed_input_never_panics() {
        let s = shape(2, Leaf::Text, true);
        let (diag, fixed) = reconcile(&json!("nope"), &s, Assign::Overwrite);
        assert_eq!(diag.malformed, ["(document)"]);
        assert_eq!(diag.missing_fields.len(), 4);
        assert_eq!(fixed, s.default_value());

        let (diag, fixed) = reconcile(&json!({"bars": [1, 2]}), &s, Assign::Overwrite);
        assert_eq!(diag.malformed, ["bars"]);
        assert_eq!(diag.missing_bars, ["1", "2"]);
        assert_eq!(fixed["bars"], json!({"1": "", "2": ""}));
    }

    #[test]
    fn aggregate_mode_groups_by_contributor_and_skips_blanks() {
        let s = shape(2, Leaf::Text, false);
        let mut target = s.with_leaf(Leaf::Annotations).default_value();
        let a = json!({"tempo": "fast", "key": "", "bars": {"1": "x", "2": ""}});
        let b = json!({"tempo": "slow", "key": "G", "bars": {"1": "y", "2": ""}});
        assert!(reconcile_into(&a, &s, Assign::Aggregate { contributor: "a@x" }, &mut target).is_clean());
        assert!(reconcile_into(&b, &s, Assign::Aggregate { contributor: "b@x" }, &mut target).is_clean());
        assert_eq!(
            Value::Object(target),
            json!({
                "tempo": {"a@x": "fast", "b@x": "slow"},
                "key": {"b@x": "G"},
                "bars": {"1": {"a@x": "x", "b@x": "y"}, "2": {}}
            })
        );
    }

    #[test]
    fn defaulted_output_reconciles_cleanly() {
        let s = shape(4, Leaf::Text, true);
        let (_, fixed) = reconcile(&json!({"tempo": "x", "bars": {"2": "y"}}), &s, Assign::Overwrite);
        let (diag, again) = reconcile(&Value::Object(fixed.clone()), &s, Assign::Overwrite);
        assert!(diag.is_clean());
        assert_eq!(again, fixed);
    }

    #[test]
    fn diagnostics_become_located_warnings() {
        let (diag, _) = reconcile(&json!({"bars": {"9": ""}}), &shape(1, Leaf::Text, false), Assign::Overwrite);
        let mut warnings = Warnings::new();
        diag.report(&Location::piece("P"), 1, &mut warnings);
        let messages: Vec<String> = warnings.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                r#"piece "P": missing fields "tempo","key""#,
                r#"piece "P": missing bar numbers 1"#,
                r#"piece "P": extra bars 9 (not in range of 1-1)"#,
            ]
        );
    }

    #[test]
    fn blank_documents() {
        let s = shape(2, Leaf::Text, true);
        assert!(is_blank_document(&s.default_value()));
        let (_, filled) = reconcile(&json!({"bars": {"2": "x"}}), &s, Assign::Overwrite);
        assert!(!is_blank_document(&filled));
    }

    #[test]
    fn bar_key_canonical_form() {
        let s = shape(12, Leaf::Text, false);
        assert!(s.is_bar_key("1"));
        assert!(s.is_bar_key("12"));
        assert!(!s.is_bar_key("0"));
        assert!(!s.is_bar_key("13"));
        assert!(!s.is_bar_key("+3"));
        assert!(!s.is_bar_key("03"));
        assert!(!s.is_bar_key("x"));
    }
}
