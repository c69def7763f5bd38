use stagehand_editor::ChangeKind;
use stagehand_history::{append_to_log, reconstruct_at, History, NewEntry};
use stagehand_parser::ast::{Prim, PropertyValue, Specifier};

fn prim_a(status: &str) -> Prim {
    Prim::new("/", "A", Specifier::Def).with_property("status", PropertyValue::string(status))
}

#[test]
fn test_branching_history_survives_the_change_log() -> anyhow::Result<()> {
    let mut history = History::new();
    let c1 = history.append_entry(
        NewEntry::new(ChangeKind::AddPrim, "ana")
            .with_path("/A")
            .with_snapshot(prim_a("WIP")),
    );
    let c2 = history.append_entry(
        NewEntry::new(ChangeKind::Promote, "ana")
            .with_path("/A")
            .with_statuses(Some("WIP".into()), Some("Shared".into()))
            .with_snapshot(prim_a("Shared")),
    );
    history.checkout(&c1.id)?;
    let c3 = history.append_entry(
        NewEntry::new(ChangeKind::SetProperty, "bo")
            .with_path("/A")
            .with_snapshot(prim_a("WIP").with_property("note", PropertyValue::string("alt"))),
    );

    let mut log = String::from("#usda 1.0\n\ndef \"ChangeLog\"\n{\n}\n");
    for entry in history.entries() {
        log = append_to_log(&log, entry)?;
    }

    // Head is the last block in the document; branch from c2 again
    let mut loaded = History::from_text(&log)?;
    assert_eq!(loaded.roots(), [c1.id.clone()]);
    assert_eq!(loaded.children_of(&c1.id).len(), 2);

    let none: Vec<Prim> = Vec::new();
    let at_c2 = reconstruct_at(&loaded, &c2.id, &none)?;
    assert_eq!(at_c2.find("/A").unwrap().status(), Some("Shared"));
    let at_c3 = reconstruct_at(&loaded, &c3.id, &none)?;
    assert_eq!(at_c3.find("/A").unwrap().status(), Some("WIP"));
    assert_eq!(at_c3.find("/A").unwrap().text_property("note"), Some("alt"));

    loaded.checkout(&c2.id)?;
    let c4 = loaded.append_entry(NewEntry::new(ChangeKind::Demote, "ana").with_path("/A"));
    assert_eq!(c4.entry, 4);
    assert_eq!(c4.parent.as_deref(), Some(c2.id.as_str()));
    Ok(())
}
