/// Round-trip tests: parse(compose(forest)) reproduces the forest
use crate::ast::*;
use crate::*;

fn sample_forest() -> Vec<Prim> {
    let lid = Prim::new("/", "Lid", Specifier::Def)
        .with_property("hinged", PropertyValue::Bool(true));
    let cube = Prim::new("/", "Box", Specifier::Def)
        .with_type("Cube")
        .with_property("status", PropertyValue::string("Published"))
        .with_property("size", PropertyValue::Double(2.0))
        .with_property("segments", PropertyValue::Int(12))
        .with_property("kind", PropertyValue::token("component"))
        .with_child(lid);

    let mut referenced = Prim::new("/", "Site", Specifier::Def).with_type("Xform");
    referenced.arc = Some(CompositionArc::reference(
        "./site.usda",
        Some("/Site".to_string()),
    ));

    let world = Prim::new("/", "World", Specifier::Def)
        .with_type("Xform")
        .with_property("displayName", PropertyValue::string("Main \"hall\""))
        .with_child(cube)
        .with_child(referenced);

    let patch = Prim::new("/", "Patch", Specifier::Over)
        .with_property("ratio", PropertyValue::Float(0.75));

    vec![world, patch]
}

#[test]
fn test_roundtrip_forest() {
    let forest = sample_forest();
    let text = compose(&forest, "World");
    let doc = parse(&text).unwrap_or_else(|e| panic!("Failed to reparse: {}\n{}", e, text));

    assert_eq!(doc.prims, forest);
    assert_eq!(doc.default_prim.as_deref(), Some("World"));
}

#[test]
fn test_roundtrip_document_with_opaque_statements() {
    let source = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 0.01
)

def Xform "World" (
    kind = "assembly"
)
{
    custom string status = "WIP"
    double3 xformOp:translate = (0, 1, 0)
    rel material:binding = </Materials/Steel>

    def Mesh "Slab"
    {
        int[] faceVertexCounts = [4, 4,
            4, 4]
    }
}
"#;

    let doc = parse(source).unwrap();
    let reparsed = parse(&serialize(&doc)).unwrap();
    assert_eq!(doc, reparsed);
    assert_eq!(reparsed.prims[0].opaque.len(), 2);
    assert_eq!(reparsed.prims[0].children[0].opaque.len(), 1);
}

#[test]
fn test_serialize_is_stable() {
    let text = compose(&sample_forest(), "World");
    let again = serialize(&parse(&text).unwrap());
    assert_eq!(text, again);
}

#[test]
fn test_json_snapshot_survives_string_escaping() {
    let forest = sample_forest();
    let snapshot = serde_json::to_string(&forest[0]).unwrap();

    let holder = Prim::new("/", "Log_1", Specifier::Def)
        .with_property("snapshot", PropertyValue::string(snapshot.clone()));
    let doc = parse(&compose(&[holder], "Log_1")).unwrap();

    let stored = doc.prims[0].text_property("snapshot").unwrap();
    assert_eq!(stored, snapshot);
    let restored: Prim = serde_json::from_str(stored).unwrap();
    assert_eq!(restored, forest[0]);
}

#[test]
fn test_multiline_string_value() {
    let prim = Prim::new("/", "Note", Specifier::Def)
        .with_property("text", PropertyValue::string("line one\nline two\ttabbed"));
    let doc = parse(&compose(&[prim.clone()], "Note")).unwrap();
    assert_eq!(doc.prims[0], prim);
}
