use stagehand_parser::ast::CHANGE_LOG_BLOCK;
use stagehand_parser::*;

const LAYER: &str = r#"#usda 1.0
(
    defaultPrim = "World"
)

def Xform "World"
{
    custom string status = "Shared"

    def "Walls"
    {
        def Mesh "Wall_01"
        {
            custom string entityType = "IfcWall"
            custom string Pset_WallCommon:FireRating = "EI60"
            custom bool Pset_WallCommon:IsExternal = 1
        }

        def "Wall_02" (
            prepend references = @./library.usda@</Walls/Standard>
        )
        {
            custom string entityType = "placeholder"
        }
    }
}

def "ChangeLog"
{
    def "Log_1"
    {
        custom int entry = 1
        custom string type = "add"
    }
}
"#;

#[test]
fn parses_layer_document() {
    let doc = parse(LAYER).expect("layer parses");

    assert_eq!(doc.scene_prims().count(), 1);
    assert_eq!(doc.default_root().map(|p| p.name.as_str()), Some("World"));

    let wall = doc.find_prim("/World/Walls/Wall_01").expect("wall exists");
    assert_eq!(wall.psets()["Pset_WallCommon"].len(), 2);
    assert_eq!(
        wall.property("Pset_WallCommon:IsExternal").map(|p| &p.value),
        Some(&PropertyValue::Bool(true))
    );

    let placeholder = doc.find_prim("/World/Walls/Wall_02").expect("placeholder exists");
    assert!(placeholder.is_placeholder());
    assert_eq!(
        placeholder.arc.as_ref().map(|a| a.to_string()),
        Some("@./library.usda@</Walls/Standard>".to_string())
    );
}

#[test]
fn outline_matches_parse_tree() {
    let doc = parse(LAYER).unwrap();
    let outline = scan_outline(LAYER).unwrap();

    let mut parsed: Vec<String> = Vec::new();
    for prim in &doc.prims {
        parsed.extend(prim.descendants().into_iter().map(|p| p.path.clone()));
    }
    let outlined: Vec<String> = outline.blocks.iter().map(|b| b.path.clone()).collect();
    assert_eq!(parsed, outlined);
}

#[test]
fn appended_log_entries_parse_in_order() {
    let fragment = compose_log_entry(
        &LogFields::new(2).with("type", PropertyValue::string("setProperty")),
    );
    let updated = append_to_document(LAYER, &fragment, CHANGE_LOG_BLOCK).unwrap();

    let doc = parse(&updated).unwrap();
    let entries: Vec<i64> = doc
        .change_log()
        .unwrap()
        .children
        .iter()
        .filter_map(|c| c.property("entry").and_then(|p| p.value.as_int()))
        .collect();
    assert_eq!(entries, vec![1, 2]);

    // Everything before the log block is untouched
    let log_start = LAYER.find("def \"ChangeLog\"").unwrap();
    assert_eq!(&updated[..log_start], &LAYER[..log_start]);
}

#[test]
fn malformed_nesting_has_no_partial_result() {
    let truncated = &LAYER[..LAYER.find("def \"ChangeLog\"").unwrap() - 3];
    let error = parse(truncated).unwrap_err();
    assert!(matches!(error, ParseError::UnbalancedBraces { .. }));
}

#[cfg(feature = "pretty-errors")]
#[test]
fn pretty_error_mentions_problem() {
    let source = "def \"A\" {\n";
    let error = parse(source).unwrap_err();
    let report = format_error(source, "broken.usda", &error);
    assert!(report.contains("never closed"));
}
