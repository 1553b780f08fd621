use std::sync::Arc;

use indexmap::IndexMap;
use proptest::prelude::*;
use roseingrave_core::aggregate::{extract_piece_summaries, piece_data};
use roseingrave_core::document::DocumentError;
use roseingrave_core::{
    Assign, Combine, Leaf, Location, Piece, PieceDefinitions, Shape, Source, Template, Warnings,
    load_template, reconcile,
};
use serde_json::{Value, json};

use generators::*;

fn shape(bar_count: u32, leaf: Leaf) -> Shape {
    let fields: Arc<[String]> = FIELDS.iter().map(|f| (*f).to_string()).collect();
    Shape::new(fields, bar_count, leaf, true)
}

fn template() -> Template {
    load_template(&json!({
        "metaDataFields": {"tempo": "Tempo", "key": "Key"},
        "values": {"defaultBarCount": 3}
    }))
    .unwrap()
    .value
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn self_combine_is_identity(piece in arb_piece()) {
        let mut combined = piece.clone();
        let mut warnings = Warnings::new();
        combined.combine(piece.clone(), &Location::piece("P"), &mut warnings);
        prop_assert!(warnings.is_empty());
        prop_assert_eq!(combined.final_bar_count(&template()), piece.final_bar_count(&template()));
        prop_assert_eq!(combined, piece);
    }

    #[test]
    fn only_supplemental_iff_no_primary_sources(piece in arb_piece()) {
        let primary = piece.sources().count();
        let supplemental = piece.supplemental_sources().count();
        prop_assert_eq!(piece.only_supplemental(), primary == 0 && supplemental > 0);
    }

    #[test]
    fn bars_are_contiguous(bar_count in 1u32..60, raw in arb_row()) {
        let shape = shape(bar_count, Leaf::Text);
        let (_, fixed) = reconcile(&raw, &shape, Assign::Overwrite);
        let bars = fixed["bars"].as_object().unwrap();
        let keys: Vec<&str> = bars.keys().map(String::as_str).collect();
        let expected: Vec<String> = (1..=bar_count).map(|n| n.to_string()).collect();
        prop_assert_eq!(keys, expected.iter().map(String::as_str).collect::<Vec<_>>());
        let top: Vec<&str> = fixed.keys().map(String::as_str).collect();
        prop_assert_eq!(top, shape.keys().collect::<Vec<_>>());
    }

    #[test]
    fn reconciled_output_reconciles_clean(bar_count in 1u32..20, raw in arb_row()) {
        let shape = shape(bar_count, Leaf::Text);
        let (_, fixed) = reconcile(&raw, &shape, Assign::Overwrite);
        let again = Value::Object(fixed.clone());
        let (diagnostics, refixed) = reconcile(&again, &shape, Assign::Overwrite);
        prop_assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        prop_assert_eq!(refixed, fixed);
    }

    #[test]
    fn reconcile_never_panics(raw in arb_json(), bar_count in 1u32..8) {
        let shape = shape(bar_count, Leaf::Annotations);
        let _ = reconcile(&raw, &shape, Assign::Aggregate { contributor: "a@x" });
        let _ = reconcile(&raw, &shape, Assign::Overwrite);
    }

    #[test]
    fn unknown_pieces_warn_once_each_and_escalate(
        ghosts in prop::collection::btree_set("[a-z]{1,5}", 1..4),
        bars in 1u32..4,
    ) {
        let defs: PieceDefinitions =
            std::iter::once(Piece::new("P", None, [Source::new("A", "a")])).collect();
        let pieces = piece_data(&defs, &template());
        let submissions: Vec<Value> = ghosts
            .iter()
            .map(|ghost| {
                let bar_map: serde_json::Map<String, Value> =
                    (1..=bars).map(|n| (n.to_string(), json!("x"))).collect();
                json!({
                    "title": format!("Ghost {ghost}"),
                    "link": null,
                    "sources": [{"name": "Z", "link": "z", "bars": bar_map, "tempo": "t"}],
                    "notes": {"tempo": "boo"}
                })
            })
            .collect();
        let docs: IndexMap<String, Value> =
            std::iter::once(("v@x".to_string(), Value::Array(submissions))).collect();

        let lenient = extract_piece_summaries(&pieces, &docs, false).unwrap();
        prop_assert!(lenient.value.is_empty());
        prop_assert_eq!(lenient.warnings.len(), ghosts.len());
        let strict = extract_piece_summaries(&pieces, &docs, true);
        prop_assert!(matches!(strict, Err(DocumentError::Strict(_))));
    }
}

#[test]
fn supplemental_migration_empties_primary_sources() {
    let mut piece = Piece::new("P", None, [Source::new("Foo", "f")]);
    assert!(!piece.only_supplemental());
    let other = Piece::new("P", None, [Source::new("Foo", "f").supplemental()]);
    piece.combine(other, &Location::piece("P"), &mut Warnings::new());
    assert_eq!(piece.sources().count(), 0);
    let supplemental: Vec<&str> = piece.supplemental_sources().map(Source::name).collect();
    assert_eq!(supplemental, ["Foo"]);
    assert!(piece.only_supplemental());
}
