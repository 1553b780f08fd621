use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Combine, EntityError, max_opt, object, optional_bar_count, required_str};
use crate::diagnostics::{Location, Segment, WarningKind, Warnings};
use crate::sheet::hyperlink::hyperlink;

/// One edition or manuscript of a piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: String,
    link: String,
    bar_count: Option<u32>,
    supplemental: bool,
}

impl Source {
    #[must_use]
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            bar_count: None,
            supplemental: false,
        }
    }

    #[must_use]
    pub const fn with_bar_count(mut self, bar_count: u32) -> Self {
        self.bar_count = Some(bar_count);
        self
    }

    #[must_use]
    pub const fn supplemental(mut self) -> Self {
        self.supplemental = true;
        self
    }

    /// Build a source from its definitions-file entry.
    ///
    /// # Errors
    ///
    /// Fails when `name` or `link` is missing, a value has the wrong type,
    /// or `barCount` is not positive.
    pub fn from_json(raw: &Value) -> Result<Self, EntityError> {
        let map = object(raw)?;
        let name = required_str(map, "name")?;
        let link = required_str(map, "link")?;
        let bar_count = optional_bar_count(map)?;
        let supplemental = match map.get("supplemental") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(EntityError::InvalidField {
                    field: "supplemental",
                    expected: "true or false",
                });
            }
        };
        Ok(Self {
            name,
            link,
            bar_count,
            supplemental,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn link(&self) -> &str {
        &self.link
    }

    #[must_use]
    pub const fn bar_count(&self) -> Option<u32> {
        self.bar_count
    }

    #[must_use]
    pub const fn is_supplemental(&self) -> bool {
        self.supplemental
    }

    /// Sheet cell linking to this source.
    #[must_use]
    pub fn hyperlink(&self) -> String {
        hyperlink(&self.name, Some(&self.link))
    }

    #[must_use]
    pub fn to_json(&self, include_supplemental: bool) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), json!(self.name));
        map.insert("link".into(), json!(self.link));
        if let Some(bar_count) = self.bar_count {
            map.insert("barCount".into(), json!(bar_count));
        }
        if include_supplemental && self.supplemental {
            map.insert("supplemental".into(), json!(true));
        }
        Value::Object(map)
    }
}

impl Combine for Source {
    /// Keeps the larger bar count; supplemental status is sticky.
    fn combine(&mut self, other: Self, at: &Location, warnings: &mut Warnings) {
        debug!(source = %self.name, "combining source");
        if self.link != other.link {
            warnings.push(
                at.with(Segment::Source(self.name.clone())),
                WarningKind::DifferingLink { link: other.link },
            );
        }
        self.bar_count = max_opt(self.bar_count, other.bar_count);
        self.supplemental |= other.supplemental;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_optional_fields() {
        let raw = json!({"name": "A", "link": "https://a", "barCount": 12, "supplemental": true});
        let source = Source::from_json(&raw).unwrap();
        assert_eq!(source.name(), "A");
        assert_eq!(source.link(), "https://a");
        assert_eq!(source.bar_count(), Some(12));
        assert!(source.is_supplemental());
    }

    #[test]
    fn missing_link_is_rejected() {
        let err = Source::from_json(&json!({"name": "A"})).unwrap_err();
        assert!(matches!(err, EntityError::MissingField("link")));
    }

    #[test]
    fn non_positive_bar_count_is_rejected() {
        let err = Source::from_json(&json!({"name": "A", "link": "l", "barCount": -3})).unwrap_err();
        assert!(matches!(err, EntityError::InvalidBarCount(-3)));
    }

    #[test]
    fn combine_takes_max_and_promotes_supplemental() {
        let mut warnings = Warnings::new();
        let mut a = Source::new("A", "l").with_bar_count(10);
        a.combine(
            Source::new("A", "l").with_bar_count(12).supplemental(),
            &Location::piece("P"),
            &mut warnings,
        );
        assert_eq!(a.bar_count(), Some(12));
        assert!(a.is_supplemental());
        assert!(warnings.is_empty());

        // never demoted back
        a.combine(Source::new("A", "l"), &Location::piece("P"), &mut warnings);
        assert!(a.is_supplemental());
    }

    #[test]
    fn combine_warns_on_differing_link_and_keeps_own() {
        let mut warnings = Warnings::new();
        let mut a = Source::new("A", "l1");
        a.combine(Source::new("A", "l2"), &Location::piece("P"), &mut warnings);
        assert_eq!(a.link(), "l1");
        assert_eq!(warnings.len(), 1);
        let w = warnings.iter().next().unwrap();
        assert_eq!(w.to_string(), r#"piece "P", source "A": differing link "l2""#);
    }

    #[test]
    fn to_json_omits_absent_values() {
        let source = Source::new("A", "l").supplemental();
        assert_eq!(source.to_json(false), json!({"name": "A", "link": "l"}));
        assert_eq!(
            source.to_json(true),
            json!({"name": "A", "link": "l", "supplemental": true})
        );
    }

    #[test]
    fn hyperlink_uses_name_and_link() {
        assert_eq!(
            Source::new("Ms \"A\"", "https://x").hyperlink(),
            r#"=HYPERLINK("https://x", "Ms \"A\"")"#
        );
    }
}
