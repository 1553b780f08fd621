//! Per-source summary slot with rotation.
//!
//! Every source in the summary file carries one summary row next to the
//! named contributor rows. Setting a new summary demotes the previous
//! occupant into the named rows, so reading a master sheet column by column
//! leaves the last column of each source group in the slot.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::piece_data::Row;

/// State of a source's summary row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SummarySlot {
    #[default]
    Empty,
    Occupied { email: String, data: Row },
}

/// Named contributor rows plus the summary slot of one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSummary {
    volunteers: IndexMap<String, Row>,
    slot: SummarySlot,
}

impl SourceSummary {
    #[must_use]
    pub const fn new(volunteers: IndexMap<String, Row>, slot: SummarySlot) -> Self {
        Self { volunteers, slot }
    }

    #[must_use]
    pub const fn volunteers(&self) -> &IndexMap<String, Row> {
        &self.volunteers
    }

    pub fn volunteers_mut(&mut self) -> &mut IndexMap<String, Row> {
        &mut self.volunteers
    }

    #[must_use]
    pub const fn slot(&self) -> &SummarySlot {
        &self.slot
    }

    /// Contributor currently holding the summary slot.
    #[must_use]
    pub fn summary_by(&self) -> Option<&str> {
        match &self.slot {
            SummarySlot::Empty => None,
            SummarySlot::Occupied { email, .. } => Some(email),
        }
    }

    #[must_use]
    pub const fn summary(&self) -> Option<&Row> {
        match &self.slot {
            SummarySlot::Empty => None,
            SummarySlot::Occupied { data, .. } => Some(data),
        }
    }

    /// Put `data` in the summary slot, demoting the previous occupant to a
    /// named row.
    pub fn set_summary(&mut self, email: impl Into<String>, data: Row) {
        self.demote();
        self.slot = SummarySlot::Occupied {
            email: email.into(),
            data,
        };
    }

    /// Demote the current occupant and leave the slot empty.
    pub fn close(&mut self) {
        self.demote();
    }

    fn demote(&mut self) {
        if let SummarySlot::Occupied { email, data } = std::mem::take(&mut self.slot) {
            debug!(volunteer = %email, "demoting summary to volunteer row");
            self.volunteers.insert(email, data);
        }
    }

    /// Write `volunteers`, `summary` and (when occupied) `summaryBy` into a
    /// source object. An empty slot serializes as `empty_row`.
    pub fn write_json(&self, empty_row: impl FnOnce() -> Row, out: &mut Map<String, Value>) {
        out.insert(
            "volunteers".to_string(),
            Value::Object(
                self.volunteers
                    .iter()
                    .map(|(email, row)| (email.clone(), Value::Object(row.clone())))
                    .collect(),
            ),
        );
        match &self.slot {
            SummarySlot::Empty => {
                out.insert("summary".to_string(), Value::Object(empty_row()));
            }
            SummarySlot::Occupied { email, data } => {
                out.insert("summary".to_string(), Value::Object(data.clone()));
                out.insert("summaryBy".to_string(), Value::String(email.clone()));
            }
        }
    }
}

/// Header cell of a master sheet column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnHeader<'a> {
    /// The bare summary label.
    Summary,
    /// `"<label>: <email>"` or a plain email.
    Contributor(&'a str),
}

/// Row-2 cell of the summary column.
#[must_use]
pub fn summary_header(label: &str, slot: &SummarySlot) -> String {
    match slot {
        SummarySlot::Occupied { email, .. } if email != label => format!("{label}: {email}"),
        _ => label.to_string(),
    }
}

/// Interpret a master sheet row-2 cell.
#[must_use]
pub fn parse_column_header<'a>(label: &str, cell: &'a str) -> ColumnHeader<'a> {
    if cell == label {
        return ColumnHeader::Summary;
    }
    match cell.strip_prefix(label).and_then(|rest| rest.strip_prefix(": ")) {
        Some(email) if !email.is_empty() => ColumnHeader::Contributor(email),
        _ => ColumnHeader::Contributor(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(bar: &str) -> Row {
        match json!({"bars": {"1": bar}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn newest_summary_demotes_previous() {
        let mut s = SourceSummary::default();
        s.set_summary("a@x", row("x"));
        assert_eq!(s.summary_by(), Some("a@x"));
        assert!(s.volunteers().is_empty());

        s.set_summary("b@x", row("y"));
        assert_eq!(s.summary_by(), Some("b@x"));
        assert_eq!(s.volunteers().get("a@x"), Some(&row("x")));
        assert_eq!(s.summary(), Some(&row("y")));
    }

    #[test]
    fn close_empties_slot() {
        let mut s = SourceSummary::default();
        s.set_summary("a@x", row("x"));
        s.close();
        assert_eq!(s.slot(), &SummarySlot::Empty);
        assert_eq!(s.volunteers().len(), 1);
        // closing an empty slot is a no-op
        s.close();
        assert_eq!(s.volunteers().len(), 1);
    }

    #[test]
    fn json_records_occupant() {
        let mut s = SourceSummary::default();
        let mut out = Map::new();
        s.write_json(|| row(""), &mut out);
        assert_eq!(Value::Object(out), json!({"volunteers": {}, "summary": {"bars": {"1": ""}}}));

        s.set_summary("a@x", row("x"));
        let mut out = Map::new();
        s.write_json(|| row(""), &mut out);
        assert_eq!(
            Value::Object(out),
            json!({"volunteers": {}, "summary": {"bars": {"1": "x"}}, "summaryBy": "a@x"})
        );
    }

    #[test]
    fn header_round_trip() {
        let occupied = SummarySlot::Occupied {
            email: "a@x".into(),
            data: Row::new(),
        };
        let cell = summary_header("SUMMARY", &occupied);
        assert_eq!(cell, "SUMMARY: a@x");
        assert_eq!(parse_column_header("SUMMARY", &cell), ColumnHeader::Contributor("a@x"));
        assert_eq!(summary_header("SUMMARY", &SummarySlot::Empty), "SUMMARY");
        assert_eq!(parse_column_header("SUMMARY", "SUMMARY"), ColumnHeader::Summary);
        assert_eq!(parse_column_header("SUMMARY", "b@x"), ColumnHeader::Contributor("b@x"));
    }
}
