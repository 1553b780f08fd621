use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{
    Combine, EntityError, Source, max_opt, object, optional_bar_count, optional_str, required,
    required_str,
};
use crate::diagnostics::{Location, WarningKind, Warnings};
use crate::sheet::hyperlink::hyperlink;
use crate::template::Template;

/// A musical work, identified across the whole system by its title.
///
/// Primary and supplemental sources live in separate ordered maps. A source
/// that becomes supplemental through [`Combine`] migrates from the primary
/// map to the supplemental one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    name: String,
    link: Option<String>,
    initial_bar_count: Option<u32>,
    sources: IndexMap<String, Source>,
    supplemental_sources: IndexMap<String, Source>,
    only_supplemental: bool,
    bar_count: Option<u32>,
}

impl Piece {
    /// Build a piece directly from sources (definitions files use [`Piece::from_json`]).
    pub fn new(
        name: impl Into<String>,
        link: Option<String>,
        sources: impl IntoIterator<Item = Source>,
    ) -> Self {
        let mut piece = Self {
            name: name.into(),
            link,
            initial_bar_count: None,
            sources: IndexMap::new(),
            supplemental_sources: IndexMap::new(),
            only_supplemental: false,
            bar_count: None,
        };
        let at = Location::piece(&piece.name);
        piece.add_sources(sources, &at, &mut Warnings::new());
        piece
    }

    /// Build a piece from its definitions-file entry.
    ///
    /// Sources repeated within the entry are combined on the spot.
    ///
    /// # Errors
    ///
    /// Fails when `title` or `sources` is missing, or when any source fails
    /// to parse (reported as `source <i>: <reason>`).
    pub fn from_json(raw: &Value, warnings: &mut Warnings) -> Result<Self, EntityError> {
        let map = object(raw)?;
        let name = required_str(map, "title")?;
        let raw_sources = required(map, "sources")?
            .as_array()
            .ok_or(EntityError::InvalidField {
                field: "sources",
                expected: "a list",
            })?;
        let link = optional_str(map, "link")?;
        let initial_bar_count = optional_bar_count(map)?;

        let sources = raw_sources
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Source::from_json(raw).map_err(|cause| EntityError::Source {
                    index,
                    cause: Box::new(cause),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut piece = Self {
            name,
            link,
            initial_bar_count,
            sources: IndexMap::new(),
            supplemental_sources: IndexMap::new(),
            only_supplemental: false,
            bar_count: None,
        };
        let at = Location::piece(&piece.name);
        piece.add_sources(sources, &at, warnings);
        Ok(piece)
    }

    #[must_use]
    pub fn with_bar_count(mut self, bar_count: u32) -> Self {
        self.initial_bar_count = Some(bar_count);
        self.recount();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Primary sources in definition order.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn supplemental_sources(&self) -> impl Iterator<Item = &Source> {
        self.supplemental_sources.values()
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    #[must_use]
    pub fn get_source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    /// True iff there are no primary sources but at least one supplemental one.
    #[must_use]
    pub const fn only_supplemental(&self) -> bool {
        self.only_supplemental
    }

    /// True iff the piece has no sources of either kind.
    #[must_use]
    pub fn has_no_sources(&self) -> bool {
        self.sources.is_empty() && self.supplemental_sources.is_empty()
    }

    /// Derived bar count, if any source or the piece itself declares one.
    #[must_use]
    pub const fn bar_count(&self) -> Option<u32> {
        self.bar_count
    }

    /// Bar count used for layouts: the largest primary-source count, else
    /// the piece's own `barCount`, else the template default.
    #[must_use]
    pub fn final_bar_count(&self, template: &Template) -> u32 {
        self.bar_count.unwrap_or_else(|| template.default_bar_count())
    }

    #[must_use]
    pub fn hyperlink(&self) -> String {
        hyperlink(&self.name, self.link.as_deref())
    }

    fn add_sources(
        &mut self,
        sources: impl IntoIterator<Item = Source>,
        at: &Location,
        warnings: &mut Warnings,
    ) {
        for source in sources {
            let name = source.name().to_string();
            if let Some(existing) = self.sources.get_mut(&name) {
                existing.combine(source, at, warnings);
                if existing.is_supplemental() {
                    if let Some(migrated) = self.sources.shift_remove(&name) {
                        self.supplemental_sources.insert(name, migrated);
                    }
                }
                continue;
            }
            if let Some(existing) = self.supplemental_sources.get_mut(&name) {
                existing.combine(source, at, warnings);
                continue;
            }
            if source.is_supplemental() {
                self.supplemental_sources.insert(name, source);
            } else {
                self.sources.insert(name, source);
            }
        }
        self.only_supplemental = self.sources.is_empty() && !self.supplemental_sources.is_empty();
        self.recount();
    }

    fn recount(&mut self) {
        let from_sources = self
            .sources
            .values()
            .fold(None, |acc, source| max_opt(acc, source.bar_count()));
        self.bar_count = from_sources.or(self.initial_bar_count);
    }

    /// JSON for the piece-definitions file. With `include_supplemental`,
    /// supplemental sources follow the primary ones, flagged as such.
    #[must_use]
    pub fn to_json(&self, include_supplemental: bool) -> Value {
        let mut map = Map::new();
        map.insert("title".into(), json!(self.name));
        if let Some(link) = &self.link {
            map.insert("link".into(), json!(link));
        }
        if let Some(bar_count) = self.initial_bar_count {
            map.insert("barCount".into(), json!(bar_count));
        }
        let mut sources: Vec<Value> = self.sources.values().map(|s| s.to_json(false)).collect();
        if include_supplemental {
            sources.extend(self.supplemental_sources.values().map(|s| s.to_json(true)));
        }
        map.insert("sources".into(), Value::Array(sources));
        Value::Object(map)
    }
}

impl Combine for Piece {
    fn combine(&mut self, other: Self, at: &Location, warnings: &mut Warnings) {
        debug!(piece = %self.name, "combining piece");
        match other.link {
            link if self.link.is_none() => self.link = link,
            None => warnings.push(at.clone(), WarningKind::MissingLink),
            Some(link) if self.link.as_deref() != Some(link.as_str()) => {
                warnings.push(at.clone(), WarningKind::DifferingLink { link });
            }
            Some(_) => {}
        }
        if self.initial_bar_count.is_none() {
            self.initial_bar_count = other.initial_bar_count;
        }
        let sources = other
            .sources
            .into_values()
            .chain(other.supplemental_sources.into_values());
        self.add_sources(sources, at, warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(raw: Value) -> Piece {
        Piece::from_json(&raw, &mut Warnings::new()).unwrap()
    }

    fn names<'a>(sources: impl Iterator<Item = &'a Source>) -> Vec<&'a str> {
        sources.map(Source::name).collect()
    }

    #[test]
    fn parses_and_partitions_sources() {
        let p = piece(json!({
            "title": "Sonata",
            "link": "https://p",
            "sources": [
                {"name": "A", "link": "a", "barCount": 40},
                {"name": "B", "link": "b", "supplemental": true},
                {"name": "C", "link": "c", "barCount": 42}
            ]
        }));
        assert_eq!(p.name(), "Sonata");
        assert_eq!(p.link(), Some("https://p"));
        assert_eq!(names(p.sources()), ["A", "C"]);
        assert_eq!(names(p.supplemental_sources()), ["B"]);
        assert_eq!(p.bar_count(), Some(42));
        assert!(!p.only_supplemental());
    }

    #[test]
    fn source_errors_are_index_qualified() {
        let err = Piece::from_json(
            &json!({"title": "S", "sources": [{"name": "A", "link": "a"}, {"name": "B"}]}),
            &mut Warnings::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "source 1: key \"link\" not found");
    }

    #[test]
    fn missing_title_is_rejected() {
        let err = Piece::from_json(&json!({"sources": []}), &mut Warnings::new()).unwrap_err();
        assert!(matches!(err, EntityError::MissingField("title")));
    }

    #[test]
    fn final_bar_count_falls_back_to_override_then_default() {
        let template = Template::default().with_default_bar_count(16);
        let plain = Piece::new("P", None, [Source::new("A", "a")]);
        assert_eq!(plain.final_bar_count(&template), 16);
        let overridden = plain.clone().with_bar_count(20);
        assert_eq!(overridden.final_bar_count(&template), 20);
        let counted = Piece::new("P", None, [Source::new("A", "a").with_bar_count(8)]).with_bar_count(20);
        assert_eq!(counted.final_bar_count(&template), 8);
    }

    #[test]
    fn supplemental_sources_do_not_count_bars() {
        let p = Piece::new(
            "P",
            None,
            [
                Source::new("A", "a").with_bar_count(8),
                Source::new("B", "b").with_bar_count(99).supplemental(),
            ],
        );
        assert_eq!(p.bar_count(), Some(8));
    }

    #[test]
    fn combine_migrates_newly_supplemental_source() {
        let mut p = Piece::new("P", None, [Source::new("Foo", "f").with_bar_count(30)]);
        let other = Piece::new("P", None, [Source::new("Foo", "f").supplemental()]);
        p.combine(other, &Location::piece("P"), &mut Warnings::new());
        assert_eq!(p.source_count(), 0);
        assert_eq!(names(p.supplemental_sources()), ["Foo"]);
        assert!(p.only_supplemental());
        assert_eq!(p.bar_count(), None);
    }

    #[test]
    fn combine_links() {
        let mut warnings = Warnings::new();
        let mut p = Piece::new("P", None, [Source::new("A", "a")]);
        p.combine(
            Piece::new("P", Some("l1".into()), [Source::new("A", "a")]),
            &Location::piece("P"),
            &mut warnings,
        );
        assert_eq!(p.link(), Some("l1"));
        p.combine(
            Piece::new("P", None, [Source::new("A", "a")]),
            &Location::piece("P"),
            &mut warnings,
        );
        assert_eq!(p.link(), Some("l1"));
        let kinds: Vec<_> = warnings.iter().map(|w| w.kind.clone()).collect();
        assert_eq!(kinds, [WarningKind::MissingLink]);
        p.combine(
            Piece::new("P", Some("l2".into()), [Source::new("A", "a")]),
            &Location::piece("P"),
            &mut warnings,
        );
        assert_eq!(p.link(), Some("l1"));
        let kinds: Vec<_> = warnings.iter().map(|w| w.kind.clone()).collect();
        assert_eq!(kinds, [
            WarningKind::MissingLink,
            WarningKind::DifferingLink { link: "l2".into() }
        ]);
    }

    #[test]
    fn combine_appends_new_sources_in_order() {
        let mut p = Piece::new("P", None, [Source::new("A", "a")]);
        p.combine(
            Piece::new("P", None, [Source::new("C", "c"), Source::new("B", "b")]),
            &Location::piece("P"),
            &mut Warnings::new(),
        );
        assert_eq!(names(p.sources()), ["A", "C", "B"]);
    }

    #[test]
    fn to_json_lists_supplemental_last() {
        let p = Piece::new(
            "P",
            Some("l".into()),
            [Source::new("S", "s").supplemental(), Source::new("A", "a")],
        );
        assert_eq!(
            p.to_json(true),
            json!({
                "title": "P",
                "link": "l",
                "sources": [
                    {"name": "A", "link": "a"},
                    {"name": "S", "link": "s", "supplemental": true}
                ]
            })
        );
        assert_eq!(p.to_json(false)["sources"].as_array().unwrap().len(), 1);
    }
}
