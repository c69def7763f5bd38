use stagehand_governance::{
    detect_conflict, plan_objects, request_write, Direction, GuardError, Resolution, Role, User,
    WriteIntent, WriteRequest,
};
use stagehand_parser::ast::PropertyType;
use stagehand_stage::{compose_layers, Layer, LayerSource, LayerStatus};

fn stack() -> Vec<LayerSource> {
    vec![
        LayerSource::new(
            Layer::new("l1", "l1.usda")
                .with_status(LayerStatus::Published)
                .with_owner("u1"),
            "def Xform \"World\"\n{\n    def Cube \"Box\"\n    {\n        custom double size = 1.0\n    }\n}\n",
        ),
        LayerSource::new(
            Layer::new("l2", "l2.usda").with_owner("u2"),
            "def Xform \"World\"\n{\n    over \"Box\"\n    {\n        custom string color = \"red\"\n    }\n}\n",
        ),
    ]
}

fn layers() -> Vec<Layer> {
    stack().into_iter().map(|s| s.layer).collect()
}

#[test]
fn test_cross_owner_write_needs_project_manager() {
    let hierarchy = compose_layers(&stack());
    let layers = layers();
    let box_prim = hierarchy.find("/World/Box").unwrap();

    let u2 = User::new("u2", Role::Contributor);
    let conflict = detect_conflict(&u2, box_prim, "size", "2.0", &hierarchy, &layers).unwrap();
    assert_eq!(conflict.conflicting_layers[0].layer_id, "l1");

    // u2 does not own the Box's source layer
    let intent = WriteIntent::new("/World/Box", "size", "2.0", PropertyType::Double);
    assert!(matches!(
        request_write(&u2, intent.clone(), &hierarchy, &layers).unwrap(),
        WriteRequest::Denied(_)
    ));

    let fe = User::new("fe", Role::FieldEngineer);
    match request_write(&fe, intent.clone(), &hierarchy, &layers).unwrap() {
        WriteRequest::NeedsResolution(pending) => {
            assert!(matches!(
                pending.resolve(Resolution::UseNew),
                Err(GuardError::OverrideNotPermitted { .. })
            ));
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    let pm = User::new("pm", Role::ProjectManager);
    match request_write(&pm, intent, &hierarchy, &layers).unwrap() {
        WriteRequest::NeedsResolution(pending) => {
            assert_eq!(pending.clone().resolve(Resolution::Cancel), Ok(None));
            let approved = pending.resolve(Resolution::UseNew).unwrap().unwrap();
            assert!(approved.overridden);
            assert_eq!(approved.user.name, "pm");
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn test_object_promotion_over_composed_stack() {
    let hierarchy = compose_layers(&stack());
    let plan = plan_objects(&hierarchy, &["/World/Box".to_string()], Direction::Demote).unwrap();
    assert_eq!(plan.from, LayerStatus::Published);
    assert_eq!(plan.to, LayerStatus::Shared);
    assert_eq!(plan.affected, vec!["/World", "/World/Box"]);
}
