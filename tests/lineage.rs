use std::sync::Arc;

use lineal::{Combinator, Object, ObjectRef, Value};

fn parent(field: &str, combinator: Combinator, value: i64) -> ObjectRef {
    let mut object = Object::new("base");
    object.set_field(field, combinator, value);
    Arc::new(object)
}

fn setup() -> (ObjectRef, ObjectRef) {
    let mut grandparent = Object::named("unit", "grandparent");
    grandparent.set("hp", 100);
    grandparent.set("tags", Value::set([Value::from("old")]));
    let grandparent = Arc::new(grandparent);

    let mut child = Object::named("unit", "child");
    child.add_parent(Arc::clone(&grandparent));
    child.set_field("hp", Combinator::Add, 5);
    child.set_field("tags", Combinator::Add, Value::set([Value::from("young")]));
    child.set("name", "kid");
    (grandparent, Arc::new(child))
}

#[test]
fn local_assignment_overrides_lineage() {
    let mut child = Object::new("child");
    child.add_parent(parent("x", Combinator::Set, 1));
    child.set("x", 2);
    assert_eq!(child.get_field("x").unwrap(), Some(Value::Integer(2)));
}

#[test]
fn local_addition_merges_with_lineage() {
    let mut child = Object::new("child");
    child.add_parent(parent("x", Combinator::Set, 1));
    child.set_field("x", Combinator::Add, 1);
    assert_eq!(child.get_field("x").unwrap(), Some(Value::Integer(2)));
}

#[test]
fn undefined_fields_resolve_to_none() {
    let (_, child) = setup();
    assert_eq!(child.get_field("missing").unwrap(), None);
}

#[test]
fn fields_fold_through_generations() {
    let (grandparent, child) = setup();
    let mut grandchild = Object::named("unit", "grandchild");
    grandchild.add_parent(Arc::clone(&child));
    grandchild.set_field("hp", Combinator::Multiply, 2);

    assert_eq!(grandchild.get_field("hp").unwrap(), Some(Value::Integer(210)));
    assert_eq!(
        grandchild.get_field("tags").unwrap(),
        Some(Value::set([Value::from("old"), Value::from("young")]))
    );
    assert_eq!(grandchild.get_field("name").unwrap(), Some(Value::from("kid")));
    // the ancestors are untouched by resolution
    assert_eq!(grandparent.get_field("hp").unwrap(), Some(Value::Integer(100)));
    assert_eq!(child.get_field("hp").unwrap(), Some(Value::Integer(105)));
}

// Sibling parents: lineage order is [self, first, second]. The fold starts from
// the second parent's value and applies the first parent's definition onto it,
// so an earlier `=` wins over a later `+=`, and an earlier `+=` merges onto a
// later `=`.
#[test]
fn sibling_parents_fold_from_the_last_declared() {
    let mut child = Object::new("child");
    child.add_parent(parent("x", Combinator::Set, 1));
    child.add_parent(parent("x", Combinator::Add, 10));
    assert_eq!(child.get_field("x").unwrap(), Some(Value::Integer(1)));

    let mut swapped = Object::new("child");
    swapped.add_parent(parent("x", Combinator::Add, 10));
    swapped.add_parent(parent("x", Combinator::Set, 1));
    assert_eq!(swapped.get_field("x").unwrap(), Some(Value::Integer(11)));

    let mut merged = Object::new("child");
    merged.add_parent(parent("x", Combinator::Add, 10));
    merged.add_parent(parent("x", Combinator::Add, 100));
    merged.set_field("x", Combinator::Subtract, 1);
    assert_eq!(merged.get_field("x").unwrap(), Some(Value::Integer(109)));
}

#[test]
fn lineage_is_depth_first_in_declared_order() {
    let mut a = Object::named("node", "a");
    a.add_parent(Arc::new(Object::named("node", "a1")));
    let b = Object::named("node", "b");
    let mut root = Object::named("node", "root");
    root.add_parent(Arc::new(a));
    root.add_parent(Arc::new(b));
    let order: Vec<&str> = root
        .lineage()
        .into_iter()
        .map(|object| object.identity().unwrap_or_default())
        .collect();
    assert_eq!(order, ["root", "a", "a1", "b"]);
}

#[test]
fn shared_ancestors_count_once_per_path() {
    let diamond_top = parent("x", Combinator::Add, 1);
    let mut left = Object::new("left");
    left.add_parent(Arc::clone(&diamond_top));
    let mut right = Object::new("right");
    right.add_parent(Arc::clone(&diamond_top));
    let mut bottom = Object::new("bottom");
    bottom.add_parent(Arc::new(left));
    bottom.add_parent(Arc::new(right));
    assert_eq!(bottom.get_field("x").unwrap(), Some(Value::Integer(2)));
}

#[test]
fn resolution_errors_surface() {
    let mut child = Object::new("child");
    child.add_parent(parent("x", Combinator::Set, 1));
    child.set_field("x", Combinator::Division, 0);
    assert!(child.get_field("x").is_err());
}

#[test]
fn flatten_severs_parents_and_is_idempotent() {
    let (_, child) = setup();
    let mut flat = (*child).clone();
    flat.flatten().unwrap();
    assert!(flat.parents().is_empty());
    assert_eq!(flat.local("hp").unwrap().combinator, Combinator::Set);
    let names: Vec<&str> = flat.local_field_names().into_iter().collect();
    assert_eq!(names, ["hp", "name", "tags"]);

    let before: Vec<Option<Value>> = ["hp", "name", "tags"]
        .iter()
        .map(|name| flat.get_field(name).unwrap())
        .collect();
    flat.flatten().unwrap();
    let after: Vec<Option<Value>> = ["hp", "name", "tags"]
        .iter()
        .map(|name| flat.get_field(name).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(after[0], Some(Value::Integer(105)));
}

#[test]
fn cascade_merges_fields_and_parents() {
    let (grandparent, child) = setup();
    let mut target = Object::new("target");
    target.set("hp", 1);
    target.cascade(&child).unwrap();
    assert_eq!(target.parents().len(), 1);
    assert!(Arc::ptr_eq(&target.parents()[0], &grandparent));
    // the addend's `+=` merged onto the local 1 and is kept as `+=`
    let hp = target.local("hp").unwrap();
    assert_eq!(hp.combinator, Combinator::Add);
    assert_eq!(hp.value, Value::Integer(6));
    assert_eq!(target.get_field("hp").unwrap(), Some(Value::Integer(106)));
}

#[test]
fn introspection() {
    let (grandparent, child) = setup();
    assert!(child.contains_local("name"));
    assert!(!grandparent.contains_local("name"));
    let available: Vec<String> = child.available_field_names().into_iter().collect();
    assert_eq!(available, ["hp", "name", "tags"]);
    assert!(!child.is_default());
    assert!(Object::new("unit").is_default());
    assert!(Object::anonymous().is_anonymous());
    assert!(Object::with(None, Some("orphan")).is_err());
    assert!(Object::with(Some("unit"), Some("")).is_err());
    assert!(Object::with(Some("unit"), None).unwrap().is_default());

    let mut editable = (*child).clone();
    assert!(editable.remove_parent(&grandparent));
    assert!(!editable.remove_parent(&grandparent));
    assert_eq!(editable.clear("name").map(|field| field.value), Some(Value::from("kid")));
    assert_eq!(editable.get_field("hp").unwrap(), Some(Value::Integer(5)));
}

#[test]
fn display_shows_declaration() {
    let (_, child) = setup();
    assert_eq!(
        child.to_string(),
        r#"unit "child" : unit "grandparent" { hp += 5; name = "kid"; tags += <"young">; }"#
    );
}
