use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rectangular-ish block of cell values, addressed 1-indexed by row and column.
///
/// Rows may have different lengths; reading past the end of a row or the
/// grid yields an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<Value>>", into = "Vec<Vec<String>>")]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl From<Vec<Vec<Value>>> for Grid {
    /// Cells exported by a spreadsheet collaborator may be numbers or booleans.
    fn from(rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Self { rows }
    }
}

impl From<Grid> for Vec<Vec<String>> {
    fn from(grid: Grid) -> Self {
        grid.rows
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Grid {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    #[must_use]
    pub const fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    #[must_use]
    pub fn row_len(&self, row: usize) -> usize {
        row.checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .map_or(0, Vec::len)
    }

    /// Cell at `row`, `col` (both 1-indexed); empty when out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> &str {
        let (Some(r), Some(c)) = (row.checked_sub(1), col.checked_sub(1)) else {
            return "";
        };
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .map_or("", String::as_str)
    }

    /// Set a cell (1-indexed), growing the grid as needed.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is zero.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        assert!(row > 0 && col > 0, "grid coordinates are 1-indexed");
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < col {
            cells.resize(col, String::new());
        }
        cells[col - 1] = value.into();
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Spreadsheet column name of a 1-indexed column: `1 -> "A"`, `27 -> "AA"`.
#[must_use]
pub fn col_letter(col: usize) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        // rem < 26
        #[allow(clippy::cast_possible_truncation)]
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
