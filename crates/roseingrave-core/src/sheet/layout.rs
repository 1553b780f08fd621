//! Per-piece sheet layouts.
//!
//! Volunteer sheet (row numbers 1-indexed, `F` metadata fields, `N` bars):
//!
//! ```text
//! row 1         piece | source... | Notes | [Supplemental sources]
//! rows 2..F+1   metadata labels
//! row F+2       blank
//! next N rows   bar numbers 1..N
//! blank
//! last row      Comments
//! ```
//!
//! The master sheet inserts a `Volunteer` row (contributor emails) as row 2
//! and gives every source a group of columns: one per contributor, then the
//! summary column.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use super::grid::{Grid, col_letter};
use super::hyperlink::parse_hyperlink;
use super::{RowRule, Sheet, SheetAnchors, SheetError};
use crate::diagnostics::{Checked, Location, Segment, WarningKind, Warnings};
use crate::document::{PieceDocument, SourceEntry, SummaryFile};
use crate::model::Piece;
use crate::piece_data::Row;
use crate::shape::{BARS, COMMENTS, Leaf, Shape, is_blank_document};
use crate::summary::{ColumnHeader, SourceSummary, SummarySlot, parse_column_header, summary_header};
use crate::template::Template;

const VOLUNTEER_HEADER_ROW: usize = 2;
const MASTER_HEADER_ROW: usize = 3;
const VOLUNTEER_ROW_LABEL: &str = "Volunteer";

/// Row positions shared by both layouts.
#[derive(Debug, Clone, Copy)]
struct Frame {
    first_header_row: usize,
    field_count: usize,
    bar_count: usize,
}

impl Frame {
    const fn new(first_header_row: usize, field_count: usize, bar_count: usize) -> Self {
        Self {
            first_header_row,
            field_count,
            bar_count,
        }
    }

    /// Frame of an exported grid, or `None` if it has too few rows.
    fn from_height(first_header_row: usize, field_count: usize, height: usize) -> Option<Self> {
        let bar_count = height.checked_sub(first_header_row + field_count + 2)?;
        Some(Self::new(first_header_row, field_count, bar_count))
    }

    fn header_rows(self) -> impl Iterator<Item = usize> {
        self.first_header_row..self.first_header_row + self.field_count
    }

    const fn blank_row1(self) -> usize {
        self.first_header_row + self.field_count
    }

    fn bar_rows(self) -> impl Iterator<Item = usize> {
        let start = self.blank_row1() + 1;
        start..start + self.bar_count
    }

    const fn blank_row2(self) -> usize {
        self.blank_row1() + self.bar_count + 1
    }

    const fn comments_row(self) -> usize {
        self.blank_row2() + 1
    }

    fn write_labels(self, grid: &mut Grid, template: &Template) {
        for (row, label) in self.header_rows().zip(template.labels()) {
            grid.set(row, 1, label);
        }
        for (n, row) in self.bar_rows().enumerate() {
            grid.set(row, 1, (n + 1).to_string());
        }
        grid.set(self.comments_row(), 1, &template.comment_fields.comments);
    }

    fn anchors(self, template: &Template, notes_col: usize, source_cols: Vec<usize>) -> SheetAnchors {
        let validation = self
            .header_rows()
            .zip(template.fields().iter())
            .filter_map(|(row, field)| {
                template.validation.get(field).map(|rule| RowRule {
                    row,
                    rule: rule.clone(),
                })
            })
            .collect();
        SheetAnchors {
            first_header_row: self.first_header_row,
            blank_row1: self.blank_row1(),
            blank_row2: self.blank_row2(),
            comments_row: self.comments_row(),
            notes_col,
            source_cols,
            supplemental_col: None,
            validation,
        }
    }
}

fn bar_count(piece: &Piece, template: &Template) -> usize {
    usize::try_from(piece.final_bar_count(template)).unwrap_or(usize::MAX)
}

/// Fill the supplemental-sources column(s) starting at `col`, wrapping
/// back to `start_row` before the comments row.
fn write_supplemental(
    grid: &mut Grid,
    piece: &Piece,
    template: &Template,
    col: usize,
    start_row: usize,
    wrap_row: usize,
) -> Option<usize> {
    piece.supplemental_sources().next()?;
    grid.set(1, col, &template.comment_fields.supplemental_sources);
    let (mut row, mut current) = (start_row, col);
    for source in piece.supplemental_sources() {
        grid.set(row, current, source.hyperlink());
        row += 1;
        if row >= wrap_row {
            row = start_row;
            current += 1;
        }
    }
    Some(col)
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render the sheet a volunteer fills in for one piece.
#[must_use]
pub fn render_volunteer_sheet(piece: &Piece, template: &Template) -> Sheet {
    let frame = Frame::new(
        VOLUNTEER_HEADER_ROW,
        template.fields().len(),
        bar_count(piece, template),
    );
    let mut grid = Grid::new();
    grid.set(1, 1, piece.hyperlink());
    let mut source_cols = Vec::new();
    for (i, source) in piece.sources().enumerate() {
        let col = 2 + i;
        grid.set(1, col, source.hyperlink());
        source_cols.push(col);
    }
    let notes_col = 2 + piece.source_count();
    grid.set(1, notes_col, &template.comment_fields.notes);
    frame.write_labels(&mut grid, template);

    let mut anchors = frame.anchors(template, notes_col, source_cols);
    anchors.supplemental_col = write_supplemental(
        &mut grid,
        piece,
        template,
        notes_col + 1,
        VOLUNTEER_HEADER_ROW,
        frame.comments_row(),
    );
    Sheet {
        values: grid,
        layout: Some(anchors),
    }
}

fn write_column(grid: &mut Grid, frame: Frame, template: &Template, col: usize, header: &str, row: &Row) {
    grid.set(2, col, header);
    for (r, field) in frame.header_rows().zip(template.fields().iter()) {
        grid.set(r, col, cell_text(row.get(field)));
    }
    let bars = row.get(BARS).and_then(Value::as_object);
    for (n, r) in frame.bar_rows().enumerate() {
        let key = (n + 1).to_string();
        grid.set(r, col, cell_text(bars.and_then(|b| b.get(&key))));
    }
    grid.set(frame.comments_row(), col, cell_text(row.get(COMMENTS)));
}

fn note_text(annotations: Option<&Value>) -> String {
    annotations
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(email, note)| format!("{email}: {}", escape_note(&cell_text(Some(note)))))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Line breaks inside a note are written as `\n`, backslashes as `\\`.
fn escape_note(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape_note(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Render one piece of the master workbook from its summary document.
///
/// Each source gets a column per named contributor followed by the summary
/// column; the notes column lists `email: note` lines.
#[must_use]
pub fn render_master_sheet(
    piece: &Piece,
    document: &PieceDocument<SummaryFile>,
    template: &Template,
) -> Sheet {
    let bars = bar_count(piece, template);
    let frame = Frame::new(MASTER_HEADER_ROW, template.fields().len(), bars);
    let empty_row = Shape::for_template(template, piece.final_bar_count(template), Leaf::Text, true)
        .default_value();
    let empty_slot = SummarySlot::Empty;
    let label = &template.comment_fields.summary;

    let mut grid = Grid::new();
    grid.set(1, 1, piece.hyperlink());
    grid.set(2, 1, VOLUNTEER_ROW_LABEL);
    frame.write_labels(&mut grid, template);

    let mut col = 2;
    let mut source_cols = Vec::new();
    for source in piece.sources() {
        source_cols.push(col);
        grid.set(1, col, source.hyperlink());
        let summary = document.sources.get(source.name()).map(|entry| &entry.data);
        if let Some(summary) = summary {
            for (email, row) in summary.volunteers() {
                write_column(&mut grid, frame, template, col, email, row);
                col += 1;
            }
        }
        let slot = summary.map_or(&empty_slot, SourceSummary::slot);
        let data = summary.and_then(SourceSummary::summary).unwrap_or(&empty_row);
        write_column(&mut grid, frame, template, col, &summary_header(label, slot), data);
        col += 1;
    }

    let notes_col = col;
    grid.set(1, notes_col, &template.comment_fields.notes);
    for (row, field) in frame.header_rows().zip(template.fields().iter()) {
        grid.set(row, notes_col, note_text(document.notes.get(field)));
    }
    let bar_notes = document.notes.get(BARS).and_then(Value::as_object);
    for (n, row) in frame.bar_rows().enumerate() {
        let key = (n + 1).to_string();
        grid.set(row, notes_col, note_text(bar_notes.and_then(|b| b.get(&key))));
    }

    let mut anchors = frame.anchors(template, notes_col, source_cols);
    anchors.supplemental_col = write_supplemental(
        &mut grid,
        piece,
        template,
        notes_col + 1,
        MASTER_HEADER_ROW,
        frame.comments_row(),
    );
    Sheet {
        values: grid,
        layout: Some(anchors),
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// A grid read back with the positions of its rows and columns.
struct SheetView<'a> {
    title: &'a str,
    grid: &'a Grid,
    template: &'a Template,
    frame: Frame,
    notes_col: usize,
}

impl<'a> SheetView<'a> {
    fn new(
        title: &'a str,
        grid: &'a Grid,
        template: &'a Template,
        first_header_row: usize,
    ) -> Result<Self, SheetError> {
        let field_count = template.fields().len();
        let frame = Frame::from_height(first_header_row, field_count, grid.height()).ok_or_else(|| {
            SheetError::Malformed {
                sheet: title.to_string(),
                reason: format!(
                    "expected at least {} rows, found {}",
                    first_header_row + field_count + 2,
                    grid.height()
                ),
            }
        })?;
        let width = grid.row_len(1);
        if width == 0 {
            return Err(SheetError::Malformed {
                sheet: title.to_string(),
                reason: "row 1 is empty".to_string(),
            });
        }
        // the supplemental-sources column may follow the notes column
        let notes_label = &template.comment_fields.notes;
        let notes_col = (1..=width)
            .rev()
            .find(|&col| grid.get(1, col) == notes_label)
            .unwrap_or(width);
        Ok(Self {
            title,
            grid,
            template,
            frame,
            notes_col,
        })
    }

    fn piece(&self) -> (Option<String>, String) {
        let cell = self.grid.get(1, 1);
        parse_hyperlink(cell).map_or_else(
            || (None, cell.to_string()),
            |(link, name)| (Some(link), name),
        )
    }

    fn source_link(&self, col: usize) -> Result<(String, String), SheetError> {
        parse_hyperlink(self.grid.get(1, col)).ok_or_else(|| SheetError::InvalidHyperlinkColumn {
            sheet: self.title.to_string(),
            column: col_letter(col),
        })
    }

    fn bar_key(&self, row: usize) -> String {
        self.grid.get(row, 1).to_string()
    }

    fn column(&self, col: usize, with_comments: bool) -> Row {
        let mut row = Map::new();
        for (r, field) in self.frame.header_rows().zip(self.template.fields().iter()) {
            row.insert(field.clone(), json!(self.grid.get(r, col)));
        }
        let bars: Map<String, Value> = self
            .frame
            .bar_rows()
            .map(|r| (self.bar_key(r), json!(self.grid.get(r, col))))
            .collect();
        row.insert(BARS.to_string(), Value::Object(bars));
        if with_comments {
            row.insert(
                COMMENTS.to_string(),
                json!(self.grid.get(self.frame.comments_row(), col)),
            );
        }
        row
    }

    fn blank_row(&self) -> Row {
        let mut row = self.column(0, true);
        for value in row.values_mut() {
            if let Value::Object(bars) = value {
                bars.values_mut().for_each(|v| *v = json!(""));
            }
        }
        row
    }
}

/// Read a volunteer sheet back into a piece submission document.
///
/// # Errors
///
/// Fails when the grid is too short for the template, row 1 is empty, or a
/// source column's row-1 cell is not a hyperlink.
pub fn export_volunteer_sheet(
    title: &str,
    grid: &Grid,
    template: &Template,
) -> Result<Value, SheetError> {
    let view = SheetView::new(title, grid, template, VOLUNTEER_HEADER_ROW)?;
    let (link, name) = view.piece();
    let mut sources = Vec::new();
    for col in 2..view.notes_col {
        let (s_link, s_name) = view.source_link(col)?;
        let mut source = Map::new();
        source.insert("name".into(), json!(s_name));
        source.insert("link".into(), json!(s_link));
        source.extend(view.column(col, true));
        sources.push(Value::Object(source));
    }
    Ok(json!({
        "title": name,
        "link": link,
        "sources": sources,
        "notes": view.column(view.notes_col, false),
    }))
}

/// A master sheet read back, with the blank row that stands in for empty
/// summary slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMaster {
    pub document: PieceDocument<SummaryFile>,
    pub blank_row: Row,
}

impl ExportedMaster {
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.document.to_json(&self.blank_row)
    }
}

fn parse_notes(cell: &str, at: &Location, warnings: &mut Warnings) -> Value {
    let mut notes = Map::new();
    for line in cell.split('\n').filter(|line| !line.is_empty()) {
        match line.split_once(": ") {
            Some((email, text)) => {
                notes.insert(email.to_string(), json!(unescape_note(text)));
            }
            None => warnings.push(
                at.clone(),
                WarningKind::MalformedNote {
                    line: line.to_string(),
                },
            ),
        }
    }
    Value::Object(notes)
}

/// Read a master sheet back into a summary document.
///
/// Columns of each source group are fed through the summary slot in order,
/// so the last column becomes the summary and every earlier one a named
/// contributor row. A bare, blank summary column leaves the slot empty.
///
/// # Errors
///
/// Fails when the grid is too short for the template, a source column's
/// row-1 cell is not a hyperlink, or a column precedes the first source.
pub fn export_master_sheet(
    title: &str,
    grid: &Grid,
    template: &Template,
) -> Result<Checked<ExportedMaster>, SheetError> {
    let view = SheetView::new(title, grid, template, MASTER_HEADER_ROW)?;
    let label = &template.comment_fields.summary;
    let (link, name) = view.piece();

    let mut sources: IndexMap<String, SourceEntry<SourceSummary>> = IndexMap::new();
    let mut current: Option<String> = None;
    for col in 2..view.notes_col {
        if !grid.get(1, col).is_empty() {
            let (s_link, s_name) = view.source_link(col)?;
            sources
                .entry(s_name.clone())
                .or_insert_with(|| SourceEntry {
                    name: s_name.clone(),
                    link: s_link,
                    data: SourceSummary::default(),
                });
            current = Some(s_name);
        }
        let Some(entry) = current.as_ref().and_then(|name| sources.get_mut(name)) else {
            return Err(SheetError::Malformed {
                sheet: title.to_string(),
                reason: format!("column {} does not belong to a source", col_letter(col)),
            });
        };
        let data = view.column(col, true);
        match parse_column_header(label, grid.get(2, col)) {
            ColumnHeader::Summary if is_blank_document(&data) => entry.data.close(),
            ColumnHeader::Summary => entry.data.set_summary(label.clone(), data),
            ColumnHeader::Contributor(email) => entry.data.set_summary(email, data),
        }
    }

    let mut warnings = Warnings::new();
    let at = Location::sheet(title);
    let mut notes = Map::new();
    for (row, field) in view.frame.header_rows().zip(template.fields().iter()) {
        let field_at = at.with(Segment::Field(field.clone()));
        notes.insert(
            field.clone(),
            parse_notes(grid.get(row, view.notes_col), &field_at, &mut warnings),
        );
    }
    let mut bar_notes = Map::new();
    for row in view.frame.bar_rows() {
        let bar = view.bar_key(row);
        let bar_at = at.with(Segment::Bar(bar.clone()));
        bar_notes.insert(
            bar,
            parse_notes(grid.get(row, view.notes_col), &bar_at, &mut warnings),
        );
    }
    notes.insert(BARS.to_string(), Value::Object(bar_notes));

    let exported = ExportedMaster {
        document: PieceDocument {
            title: name,
            link,
            sources,
            notes,
        },
        blank_row: view.blank_row(),
    };
    Ok(Checked::new(exported, warnings))
}
