//! Property tests for the annotation parser.

use merino_bind::{parse_annotation, BoundKind, TypeDesc, TypeNames};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = TypeDesc> {
    prop_oneof![
        Just(TypeDesc::Str),
        Just(TypeDesc::Int),
        Just(TypeDesc::Float),
        Just(TypeDesc::Bool),
        Just(TypeDesc::Uuid),
        Just(TypeDesc::Bytes),
    ]
}

fn collection() -> impl Strategy<Value = TypeDesc> {
    scalar().prop_recursive(2, 4, 1, |inner| {
        prop_oneof![inner.clone().prop_map(TypeDesc::list), inner.prop_map(TypeDesc::set)]
    })
}

fn wrapped() -> impl Strategy<Value = TypeDesc> {
    let kind = prop_oneof![Just(BoundKind::Query), Just(BoundKind::Header), Just(BoundKind::Cookie)];
    prop_oneof![
        collection(),
        collection().prop_map(TypeDesc::optional),
        (kind, collection()).prop_map(|(kind, inner)| TypeDesc::bound(kind, inner)),
    ]
}

proptest! {
    #[test]
    fn displayed_annotation_parses_back(desc in wrapped()) {
        let text = desc.to_string();
        let parsed = parse_annotation(&text, &TypeNames::new()).unwrap();
        prop_assert_eq!(parsed, desc);
    }

    #[test]
    fn pipe_none_is_optional(desc in collection()) {
        let text = format!("{desc} | None");
        let parsed = parse_annotation(&text, &TypeNames::new()).unwrap();
        prop_assert!(parsed.is_optional());
    }

    #[test]
    fn garbage_never_panics(text in "[A-Za-z\\[\\]|, .]{0,24}") {
        let _ = parse_annotation(&text, &TypeNames::new());
    }
}
