#![allow(missing_docs)]

use linkstore::admin::{verify, VerifyLevel};
use linkstore::storage::{Group, Link, LinkKind, LinkSpec, Value, ValueKind};
use linkstore::{ColumnRef, ObjRef};

fn assert_verified(group: &Group) {
    let report = verify(group, VerifyLevel::Full);
    assert!(report.success, "findings: {:?}", report.findings);
}

struct Scenario {
    group: Group,
    links: ColumnRef,
    a0: ObjRef,
    b0: ObjRef,
    b1: ObjRef,
}

/// Table A (`name`, `links -> B` list), table B (`name`), `a0.links = [b0, b1, b0]`.
fn scenario() -> Scenario {
    let mut group = Group::new();
    let a = group.add_table("A").expect("A");
    let b = group.add_table("B").expect("B");
    let a_name = group.add_column(a, "name", ValueKind::String, true).expect("name");
    let links = group
        .add_link_column(a, LinkSpec::strong("links", LinkKind::List, b))
        .expect("links");
    let b_name = group.add_column(b, "name", ValueKind::String, true).expect("name");

    let b0 = group.create_row(b).expect("b0");
    group.set_value(b0, b_name, Value::from("x")).expect("b0 name");
    let b1 = group.create_row(b).expect("b1");
    group.set_value(b1, b_name, Value::from("y")).expect("b1 name");
    let a0 = group.create_row(a).expect("a0");
    group.set_value(a0, a_name, Value::from("a")).expect("a0 name");
    for target in [b0, b1, b0] {
        group.list_push(a0, links, target.into()).expect("push");
    }
    Scenario {
        group,
        links: ColumnRef::new(a, links),
        a0,
        b0,
        b1,
    }
}

#[test]
fn backlink_counts_follow_list_occurrences() {
    let s = scenario();
    assert_eq!(s.group.backlink_count(s.b0, s.links).expect("count"), 2);
    assert_eq!(s.group.backlink_count(s.b1, s.links).expect("count"), 1);
    let origins: Vec<ObjRef> = s
        .group
        .backlinks(s.b0)
        .expect("backlinks")
        .iter()
        .map(|backlink| backlink.origin_obj())
        .collect();
    assert_eq!(origins, vec![s.a0, s.a0]);
    assert_verified(&s.group);
}

#[test]
fn removing_origin_row_drops_every_backlink() {
    let mut s = scenario();
    s.group.remove_row(s.a0).expect("remove a0");
    assert_eq!(s.group.backlink_count(s.b0, s.links).expect("count"), 0);
    assert_eq!(s.group.backlink_count(s.b1, s.links).expect("count"), 0);
    assert!(s.group.table(s.a0.table).expect("A").is_empty());
    assert_eq!(s.group.table(s.b0.table).expect("B").len(), 2);
    assert_verified(&s.group);
}

#[test]
fn removing_target_row_nullifies_every_occurrence() {
    let mut s = scenario();
    s.group.remove_row(s.b0).expect("remove b0");
    assert_eq!(
        s.group.list(s.a0, s.links.col).expect("list"),
        vec![Link::Row(s.b1.row)]
    );
    assert_eq!(s.group.backlink_count(s.b1, s.links).expect("count"), 1);
    assert!(!s.group.contains(s.b0));
    assert_verified(&s.group);
}

#[test]
fn cascade_reaches_every_origin_column() {
    let mut group = Group::new();
    let person = group.add_table("person").expect("person");
    let dog = group.add_table("dog").expect("dog");
    let owner = group
        .add_link_column(dog, LinkSpec::strong("owner", LinkKind::Single, person))
        .expect("owner");
    let walkers = group
        .add_link_column(dog, LinkSpec::weak("walkers", LinkKind::Set, person))
        .expect("walkers");
    let contacts = group
        .add_link_column(person, LinkSpec::strong("contacts", LinkKind::Dictionary, person))
        .expect("contacts");

    let alice = group.create_row(person).expect("alice");
    let bob = group.create_row(person).expect("bob");
    let rex = group.create_row(dog).expect("rex");
    group.set_link(rex, owner, Some(alice.into())).expect("owner");
    group.set_insert(rex, walkers, alice.into()).expect("walker");
    group.set_insert(rex, walkers, bob.into()).expect("walker");
    group
        .dict_insert(bob, contacts, "best", Some(alice.into()))
        .expect("contact");
    group
        .dict_insert(alice, contacts, "self", Some(alice.into()))
        .expect("self contact");
    assert_eq!(group.backlinks(alice).expect("backlinks").len(), 4);

    group.remove_row(alice).expect("remove alice");
    assert_eq!(group.get_link(rex, owner).expect("owner"), None);
    assert_eq!(
        group.set_members(rex, walkers).expect("walkers"),
        vec![Link::Row(bob.row)]
    );
    assert_eq!(group.dict_get(bob, contacts, "best").expect("contact"), None);
    assert_eq!(group.backlinks(bob).expect("backlinks").len(), 1);
    assert_verified(&group);
}

#[test]
fn removing_a_referencing_row_updates_targets() {
    let mut s = scenario();
    let a = s.a0.table;
    let a1 = s.group.create_row(a).expect("a1");
    s.group.list_push(a1, s.links.col, s.b1.into()).expect("push");
    assert_eq!(s.group.backlink_count(s.b1, s.links).expect("count"), 2);

    s.group.remove_row(s.a0).expect("remove a0");
    assert_eq!(s.group.backlinks(s.b1).expect("backlinks")[0].origin_obj(), a1);
    assert_eq!(s.group.backlink_count(s.b0, s.links).expect("count"), 0);
    assert_verified(&s.group);
}

#[test]
fn clear_table_empties_targets_and_links() {
    let mut s = scenario();
    s.group.clear_table(s.b0.table).expect("clear B");
    assert!(s.group.table(s.b0.table).expect("B").is_empty());
    assert!(s.group.list(s.a0, s.links.col).expect("list").is_empty());
    assert_verified(&s.group);
}

#[test]
fn removed_row_handle_is_rejected() {
    let mut s = scenario();
    s.group.remove_row(s.b1).expect("remove b1");
    assert!(s.group.remove_row(s.b1).is_err());
    assert!(s.group.backlinks(s.b1).is_err());
}
