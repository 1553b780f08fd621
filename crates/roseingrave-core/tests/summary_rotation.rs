//! The summary slot across master sheet export/import cycles.

use indexmap::IndexMap;
use roseingrave_core::aggregate::piece_data;
use roseingrave_core::document::{PieceDocument, SummaryFile, read_summary};
use roseingrave_core::piece_data::PieceData;
use roseingrave_core::sheet::{export_master_sheet, render_master_sheet};
use roseingrave_core::{Piece, PieceDefinitions, Source, Template, load_template};
use serde_json::{Value, json};

fn template() -> Template {
    load_template(&json!({
        "metaDataFields": {"tempo": "Tempo"},
        "values": {"defaultBarCount": 2}
    }))
    .unwrap()
    .value
}

fn setup() -> (Template, PieceDefinitions, IndexMap<String, PieceData>) {
    let template = template();
    let defs: PieceDefinitions =
        std::iter::once(Piece::new("P", None, [Source::new("S", "https://s")])).collect();
    let data = piece_data(&defs, &template);
    (template, defs, data)
}

fn row(bar1: &str) -> Value {
    json!({"tempo": "", "bars": {"1": bar1, "2": ""}, "comments": ""})
}

fn summary_json(volunteers: &Value, summary: &Value, summary_by: Option<&str>) -> Value {
    let mut source = json!({
        "name": "S", "link": "https://s",
        "volunteers": volunteers, "summary": summary
    });
    if let Some(email) = summary_by {
        source["summaryBy"] = json!(email);
    }
    json!([{
        "title": "P", "link": null, "sources": [source],
        "notes": {"tempo": {}, "bars": {"1": {}, "2": {}}}
    }])
}

fn read(data: &IndexMap<String, PieceData>, raw: &Value) -> PieceDocument<SummaryFile> {
    let mut docs = read_summary(data, raw).unwrap().value;
    docs.swap_remove("P").unwrap()
}

/// Render the master sheet and read it straight back.
fn cycle(
    document: &PieceDocument<SummaryFile>,
    defs: &PieceDefinitions,
    template: &Template,
) -> Value {
    let piece = defs.get("P").unwrap();
    let sheet = render_master_sheet(piece, document, template);
    let exported = export_master_sheet("P", &sheet.values, template).unwrap();
    assert!(exported.is_clean());
    exported.value.to_json()
}

#[test]
fn new_contributor_takes_slot_and_previous_is_demoted() {
    let (template, defs, data) = setup();
    let mut document = read(&data, &summary_json(&json!({}), &row("x"), Some("a@x")));
    let source = &mut document.sources["S"].data;
    assert_eq!(source.summary_by(), Some("a@x"));

    let Value::Object(b_row) = row("y") else {
        unreachable!()
    };
    source.set_summary("b@x", b_row);
    assert_eq!(source.summary_by(), Some("b@x"));
    assert_eq!(source.volunteers()["a@x"], *row("x").as_object().unwrap());

    let once = cycle(&document, &defs, &template);
    let source = &once[0]["sources"][0];
    assert_eq!(source["summaryBy"], "b@x");
    assert_eq!(source["summary"]["bars"]["1"], "y");
    assert_eq!(source["volunteers"], json!({"a@x": row("x")}));
}

#[test]
fn export_import_cycles_are_stable() {
    let (template, defs, data) = setup();
    let start = summary_json(&json!({"a@x": row("x")}), &row("y"), Some("b@x"));

    let first = cycle(&read(&data, &start), &defs, &template);
    let second = cycle(&read(&data, &Value::Array(vec![first.clone()])), &defs, &template);
    let third = cycle(&read(&data, &Value::Array(vec![second.clone()])), &defs, &template);
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(Value::Array(vec![first]), start);
}

#[test]
fn blank_summary_column_leaves_slot_empty() {
    let (template, defs, data) = setup();
    let start = summary_json(&json!({"a@x": row("x"), "b@x": row("y")}), &row(""), None);
    let document = read(&data, &start);
    assert_eq!(document.sources["S"].data.summary_by(), None);

    let exported = cycle(&document, &defs, &template);
    let source = &exported[0]["sources"][0];
    assert!(source.get("summaryBy").is_none());
    let emails: Vec<&String> = source["volunteers"].as_object().unwrap().keys().collect();
    assert_eq!(emails, ["a@x", "b@x"]);
    assert_eq!(Value::Array(vec![exported]), start);
}

#[test]
fn unclaimed_summary_is_kept_under_the_label() {
    let (template, defs, data) = setup();
    let start = summary_json(&json!({}), &row("z"), None);
    let document = read(&data, &start);
    assert_eq!(document.sources["S"].data.summary_by(), Some("SUMMARY"));

    let exported = cycle(&document, &defs, &template);
    let source = &exported[0]["sources"][0];
    assert_eq!(source["summary"]["bars"]["1"], "z");
    assert_eq!(source["volunteers"], json!({}));
}
