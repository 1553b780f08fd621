use indexmap::IndexSet;
use serde_json::{Value, json};
use tracing::debug;

use super::{Combine, EntityError, object, required, required_str};
use crate::diagnostics::{Location, Warnings};

/// A contributor and the pieces assigned to them, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volunteer {
    email: String,
    pieces: IndexSet<String>,
    unknown_pieces: Vec<String>,
}

impl Volunteer {
    /// Build a volunteer from its definitions-file entry.
    ///
    /// Piece names rejected by `is_known` are kept in
    /// [`Volunteer::unknown_pieces`] for the caller to report.
    ///
    /// # Errors
    ///
    /// Fails when `email` or `pieces` is missing or has the wrong type.
    pub fn from_json(raw: &Value, is_known: impl Fn(&str) -> bool) -> Result<Self, EntityError> {
        let map = object(raw)?;
        let email = required_str(map, "email")?;
        let names = required(map, "pieces")?
            .as_array()
            .ok_or(EntityError::InvalidField {
                field: "pieces",
                expected: "a list of piece titles",
            })?;

        let mut pieces = IndexSet::new();
        let mut unknown_pieces = Vec::new();
        for name in names {
            let name = name.as_str().ok_or(EntityError::InvalidField {
                field: "pieces",
                expected: "a list of piece titles",
            })?;
            if is_known(name) {
                pieces.insert(name.to_string());
            } else if !unknown_pieces.iter().any(|n| n == name) {
                unknown_pieces.push(name.to_string());
            }
        }
        Ok(Self {
            email,
            pieces,
            unknown_pieces,
        })
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn pieces(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_piece(&self, title: &str) -> bool {
        self.pieces.contains(title)
    }

    #[must_use]
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Assigned names that were not found among the known pieces.
    #[must_use]
    pub fn unknown_pieces(&self) -> &[String] {
        &self.unknown_pieces
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "email": self.email,
            "pieces": self.pieces.iter().collect::<Vec<_>>(),
        })
    }
}

impl Combine for Volunteer {
    /// Union of assigned pieces, keeping first-seen order.
    fn combine(&mut self, other: Self, _at: &Location, _warnings: &mut Warnings) {
        debug!(volunteer = %self.email, "combining volunteer");
        self.pieces.extend(other.pieces);
        for name in other.unknown_pieces {
            if !self.unknown_pieces.contains(&name) {
                self.unknown_pieces.push(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "A" | "B" | "C")
    }

    #[test]
    fn splits_known_and_unknown_pieces() {
        let v = Volunteer::from_json(
            &json!({"email": "v@x.org", "pieces": ["B", "Ghost", "A", "B"]}),
            known,
        )
        .unwrap();
        assert_eq!(v.email(), "v@x.org");
        assert_eq!(v.pieces().collect::<Vec<_>>(), ["B", "A"]);
        assert_eq!(v.unknown_pieces(), ["Ghost"]);
    }

    #[test]
    fn missing_pieces_is_rejected() {
        let err = Volunteer::from_json(&json!({"email": "v@x.org"}), known).unwrap_err();
        assert!(matches!(err, EntityError::MissingField("pieces")));
    }

    #[test]
    fn non_string_piece_is_rejected() {
        let err =
            Volunteer::from_json(&json!({"email": "v", "pieces": ["A", 3]}), known).unwrap_err();
        assert!(matches!(err, EntityError::InvalidField { field: "pieces", .. }));
    }

    #[test]
    fn combine_is_ordered_union() {
        let mut a = Volunteer::from_json(&json!({"email": "v", "pieces": ["C", "A"]}), known).unwrap();
        let b = Volunteer::from_json(&json!({"email": "v", "pieces": ["A", "B"]}), known).unwrap();
        a.combine(b, &Location::volunteer("v"), &mut Warnings::new());
        assert_eq!(a.pieces().collect::<Vec<_>>(), ["C", "A", "B"]);
        assert_eq!(a.to_json(), json!({"email": "v", "pieces": ["C", "A", "B"]}));
    }
}
