use std::sync::Arc;

use lineal::{LinealError, Object, Root, Value};

fn setup() -> Root {
    let mut root = Root::new();
    let mut knight = Object::new("class");
    knight.set("armor", 5);
    root.keep(knight).unwrap();
    for (name, armor) in [("paladin", 7), ("rogue", 2), ("cleric", 4)] {
        let mut object = Object::named("class", name);
        object.set("armor", armor);
        root.keep(object).unwrap();
    }
    root.keep(Object::named("weapon", "axe")).unwrap();
    root
}

#[test]
fn keeping_replaces_by_type_and_identity() {
    let mut root = setup();
    assert_eq!(root.len(), 5);
    let mut replacement = Object::named("class", "rogue");
    replacement.set("armor", 3);
    let (kept, replaced) = root.keep(replacement).unwrap();
    assert!(replaced);
    assert_eq!(root.len(), 5);
    let all = root.all_by_type("class");
    assert_eq!(all.len(), 4);
    let rogue = root.get("class", Some("rogue")).unwrap();
    assert!(Arc::ptr_eq(&rogue, &kept));
    assert_eq!(rogue.get_field("armor").unwrap(), Some(Value::Integer(3)));

    let (_, replaced) = root.keep(Object::named("class", "bard")).unwrap();
    assert!(!replaced);
}

#[test]
fn one_default_per_type() {
    let mut root = setup();
    let default = root.get_default("class").unwrap();
    assert!(default.is_default());
    let (_, replaced) = root.keep(Object::new("class")).unwrap();
    assert!(replaced);
    assert_eq!(root.get_default("class").unwrap().get_field("armor").unwrap(), None);
    assert!(root.get_default("weapon").is_none());
}

#[test]
fn anonymous_objects_are_refused() {
    let mut root = setup();
    assert!(matches!(root.keep(Object::anonymous()), Err(LinealError::Registry(_))));
}

#[test]
fn queries_are_ordered() {
    let root = setup();
    assert_eq!(root.types(), ["class", "weapon"]);
    let identities: Vec<Option<String>> = root
        .all_by_type("class")
        .iter()
        .map(|object| object.identity().map(str::to_owned))
        .collect();
    assert_eq!(
        identities,
        [None, Some("cleric".to_owned()), Some("paladin".to_owned()), Some("rogue".to_owned())]
    );
    assert_eq!(root.objects().len(), 5);
    assert!(root.all_by_type("missing").is_empty());
}

#[test]
fn removal_drops_empty_types() {
    let mut root = setup();
    assert!(root.remove("weapon", Some("axe")).is_some());
    assert!(root.remove("weapon", Some("axe")).is_none());
    assert_eq!(root.types(), ["class"]);
    assert!(root.remove("class", None).is_some());
    assert_eq!(root.len(), 3);
    assert!(!root.is_empty());
    assert!(Root::new().is_empty());
}

#[test]
fn mutation_copies_on_write() {
    let mut root = setup();
    let before = root.get("class", Some("paladin")).unwrap();
    let mut child = Object::named("class", "templar");
    child.add_parent(Arc::clone(&before));
    let child = root.keep(child).unwrap().0;

    let paladin = root.get_mut("class", Some("paladin")).unwrap();
    paladin.set("armor", 9);

    assert_eq!(root.get("class", Some("paladin")).unwrap().get_field("armor").unwrap(), Some(Value::Integer(9)));
    // earlier holders still see the state they were built against
    assert_eq!(before.get_field("armor").unwrap(), Some(Value::Integer(7)));
    assert_eq!(child.get_field("armor").unwrap(), Some(Value::Integer(7)));
    assert!(root.get_mut("class", Some("nobody")).is_none());
}
