use stagehand_parser::ast::PropertyValue;
use stagehand_stage::{compose_layers, Composer, Layer, LayerSource, LayerStatus};

const STRUCTURE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
)

def Xform "World"
{
    def Cube "Box"
    {
        custom double size = 1.0
        custom string entityType = "IfcColumn"
    }

    def Xform "Level_1"
    {
        def "Slab" (
            prepend references = @../lib/slab.usda@</Slab>
        )
        {
            custom double thickness = 0.3
        }
    }
}
"#;

const PLANNING: &str = r##"#usda 1.0

def Xform "World"
{
    def Cube "Box"
    {
        custom double size = 2.0
    }

    def "Pump"
    {
        custom string entityType = "placeholder"
        custom string placeholderColor = "#ff00ff"
    }
}
"##;

const FIELD: &str = r#"#usda 1.0

def Xform "World"
{
    over "Level_1"
    {
        def Mesh "Pump"
        {
            custom string entityType = "IfcPump"
        }
    }
}
"#;

const SLAB_LIBRARY: &str = r#"#usda 1.0

def Mesh "Slab"
{
    custom double thickness = 0.2
    custom string material = "concrete"
}
"#;

fn stack() -> Vec<LayerSource> {
    vec![
        LayerSource::new(
            Layer::new("structure", "layers/structure.usda")
                .with_status(LayerStatus::Published)
                .with_owner("pm"),
            STRUCTURE,
        ),
        LayerSource::new(
            Layer::new("planning", "layers/planning.usda")
                .with_status(LayerStatus::Shared)
                .with_owner("engineer"),
            PLANNING,
        ),
        LayerSource::new(
            Layer::new("field", "layers/field.usda").with_owner("field"),
            FIELD,
        ),
    ]
}

fn composer() -> Composer {
    let mut composer = Composer::new();
    composer.add_document(
        "lib/slab.usda",
        stagehand_parser::parse(SLAB_LIBRARY).unwrap(),
    );
    composer
}

#[test]
fn test_full_stack_composition() {
    let composed = composer().compose(&stack());

    assert_eq!(composed.roots.len(), 1);
    assert_eq!(
        composed.paths(),
        vec![
            "/World",
            "/World/Box",
            "/World/Level_1",
            "/World/Level_1/Slab",
            "/World/Level_1/Pump",
            "/World/Box_1",
            "/World/Pump",
        ]
    );
    assert!(composed.warnings.is_empty(), "{:?}", composed.warnings);
}

#[test]
fn test_collision_keeps_both_definitions() {
    let composed = composer().compose(&stack());

    let original = composed.find("/World/Box").unwrap();
    let renamed = composed.find("/World/Box_1").unwrap();
    assert_eq!(original.property("size").unwrap().value, PropertyValue::Double(1.0));
    assert_eq!(renamed.property("size").unwrap().value, PropertyValue::Double(2.0));

    assert_eq!(composed.effective_status("/World/Box"), Some(LayerStatus::Published));
    assert_eq!(composed.effective_status("/World/Box_1"), Some(LayerStatus::Shared));
    assert_eq!(composed.collisions.len(), 1);
    assert_eq!(composed.collisions[0].layer, "layers/planning.usda");
}

#[test]
fn test_reference_keeps_local_opinions() {
    let composed = composer().compose(&stack());

    let slab = composed.find("/World/Level_1/Slab").unwrap();
    assert_eq!(slab.type_name.as_deref(), Some("Mesh"));
    assert_eq!(slab.property("thickness").unwrap().value, PropertyValue::Double(0.3));
    assert_eq!(slab.text_property("material"), Some("concrete"));
}

#[test]
fn test_weaker_layer_contributes_through_over() {
    let composed = composer().compose(&stack());

    let pump = composed.find("/World/Level_1/Pump").unwrap();
    assert_eq!(pump.source.as_ref().unwrap().document, "layers/field.usda");
    assert_eq!(composed.effective_status("/World/Level_1/Pump"), Some(LayerStatus::Wip));
    assert_eq!(
        composed.paths_from("layers/field.usda"),
        vec!["/World/Level_1/Pump".to_string()]
    );
    assert!(composed.find("/World/Pump").unwrap().is_placeholder());
}

#[test]
fn test_hiding_a_layer_removes_its_prims() {
    let mut layers = stack();
    layers[1].layer.visible = false;

    let composed = composer().compose(&layers);
    assert!(composed.find("/World/Box_1").is_none());
    assert!(composed.find("/World/Pump").is_none());
    assert!(composed.collisions.is_empty());
}

#[test]
fn test_missing_library_degrades_to_placeholder() {
    let composed = compose_layers(&stack());

    let slab = composed.find("/World/Level_1/Slab").unwrap();
    assert!(slab.is_placeholder());
    assert_eq!(composed.warnings.len(), 1);
    let warning = composed.warnings.iter().next().unwrap();
    assert_eq!(warning.subject.as_deref(), Some("/World/Level_1/Slab"));
}

#[test]
fn test_hierarchy_serializes() {
    let composed = composer().compose(&stack());
    let json = serde_json::to_value(&composed).unwrap();
    assert_eq!(json["collisions"][0]["renamedPath"], "/World/Box_1");
}
