#![allow(missing_docs)]

use linkstore::admin::{verify, VerifyLevel};
use linkstore::storage::{Backlink, ColumnType, Group, Link, LinkKind, LinkSpec, PrimaryKey, ValueKind};
use linkstore::{ColKey, ColumnRef, LinkError, ObjRef, TableKey};

struct Fixture {
    group: Group,
    a: TableKey,
    b: TableKey,
    a0: ObjRef,
    b0: ObjRef,
    b1: ObjRef,
}

fn fixture() -> Fixture {
    let mut group = Group::new();
    let a = group.add_table("A").expect("table A");
    let b = group.add_table("B").expect("table B");
    let a0 = group.create_row(a).expect("a0");
    let b0 = group.create_row(b).expect("b0");
    let b1 = group.create_row(b).expect("b1");
    Fixture {
        group,
        a,
        b,
        a0,
        b0,
        b1,
    }
}

fn add(f: &mut Fixture, name: &str, kind: LinkKind) -> ColKey {
    f.group
        .add_link_column(f.a, LinkSpec::strong(name, kind, f.b))
        .expect("link column")
}

fn assert_verified(group: &Group) {
    let report = verify(group, VerifyLevel::Full);
    assert!(report.success, "findings: {:?}", report.findings);
}

#[test]
fn single_link_round_trip() {
    let mut f = fixture();
    let col = add(&mut f, "best", LinkKind::Single);
    f.group
        .set_link(f.a0, col, Some(Link::Row(f.b0.row)))
        .expect("set");
    assert_eq!(f.group.get_link(f.a0, col).expect("get"), Some(Link::Row(f.b0.row)));
    assert_eq!(
        f.group.backlinks(f.b0).expect("backlinks"),
        vec![Backlink {
            origin: ColumnRef::new(f.a, col),
            row: f.a0.row,
        }]
    );
    assert_eq!(
        f.group.backlinks(f.b0).expect("backlinks")[0].origin_obj(),
        f.a0
    );
    assert_verified(&f.group);
}

#[test]
fn list_keeps_duplicates_in_order() {
    let mut f = fixture();
    let col = add(&mut f, "links", LinkKind::List);
    for target in [f.b0, f.b1, f.b0] {
        f.group.list_push(f.a0, col, target.into()).expect("push");
    }
    assert_eq!(
        f.group.list(f.a0, col).expect("list"),
        vec![Link::Row(f.b0.row), Link::Row(f.b1.row), Link::Row(f.b0.row)]
    );
    let origin = ColumnRef::new(f.a, col);
    assert_eq!(f.group.backlink_count(f.b0, origin).expect("count"), 2);
    assert_eq!(f.group.backlink_count(f.b1, origin).expect("count"), 1);
    assert_eq!(f.group.links(f.a0, col).expect("links").len(), 3);
    assert_verified(&f.group);
}

#[test]
fn set_ignores_repeated_inserts() {
    let mut f = fixture();
    let col = add(&mut f, "tags", LinkKind::Set);
    assert!(f.group.set_insert(f.a0, col, f.b1.into()).expect("insert"));
    assert!(f.group.set_insert(f.a0, col, f.b0.into()).expect("insert"));
    assert!(!f.group.set_insert(f.a0, col, f.b1.into()).expect("insert"));
    assert_eq!(f.group.set_members(f.a0, col).expect("members").len(), 2);
    assert_eq!(f.group.backlinks(f.b1).expect("backlinks").len(), 1);
    assert_verified(&f.group);
}

#[test]
fn dictionary_distinguishes_null_from_absent() {
    let mut f = fixture();
    let col = add(&mut f, "named", LinkKind::Dictionary);
    f.group
        .dict_insert(f.a0, col, "first", Some(f.b0.into()))
        .expect("insert");
    f.group.dict_insert(f.a0, col, "empty", None).expect("insert");
    assert_eq!(f.group.dict_get(f.a0, col, "empty").expect("get"), Some(None));
    assert_eq!(f.group.dict_get(f.a0, col, "missing").expect("get"), None);
    assert_eq!(
        f.group.dict_entries(f.a0, col).expect("entries"),
        vec![
            ("empty".to_string(), None),
            ("first".to_string(), Some(Link::Row(f.b0.row))),
        ]
    );
    assert_verified(&f.group);
}

#[test]
fn shape_mismatch_is_an_argument_error() {
    let mut f = fixture();
    let col = add(&mut f, "tags", LinkKind::Set);
    assert!(matches!(
        f.group.list_push(f.a0, col, f.b0.into()),
        Err(LinkError::InvalidArgument(_))
    ));
    assert!(matches!(
        f.group.get_link(f.a0, col),
        Err(LinkError::InvalidArgument(_))
    ));
    assert!(f.group.backlinks(f.b0).expect("backlinks").is_empty());
}

#[test]
fn column_metadata_is_public() {
    let mut f = fixture();
    let col = add(&mut f, "links", LinkKind::List);
    let name = f
        .group
        .add_column(f.a, "name", ValueKind::String, false)
        .expect("value column");
    let columns = f.group.table(f.a).expect("table").columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].key, col);
    assert_eq!(
        columns[0].ty,
        ColumnType::Link {
            kind: LinkKind::List,
            target: f.b,
            weak: false
        }
    );
    assert_eq!(columns[1].key, name);
    let link = f.group.link_column(ColumnRef::new(f.a, col)).expect("link");
    assert_eq!(link.kind(), LinkKind::List);
    assert!(!link.is_weak());
    assert!(!link.is_nullable());
}

#[test]
fn unresolved_reference_becomes_live() {
    let mut group = Group::new();
    let person = group
        .add_table_with_primary_key("person", "_id", ValueKind::Int)
        .expect("table");
    let friends = group
        .add_link_column(person, LinkSpec::strong("friends", LinkKind::List, person))
        .expect("column");
    let one = group
        .create_row_with_primary_key(person, PrimaryKey::Int(1))
        .expect("row");
    let pending = group
        .link_to_primary_key(person, PrimaryKey::Int(2))
        .expect("link");
    group.list_push(one, friends, pending.clone()).expect("push");
    assert_eq!(group.list(one, friends).expect("list"), vec![pending]);
    assert!(group.backlinks(one).expect("backlinks").is_empty());

    let two = group
        .create_row_with_primary_key(person, PrimaryKey::Int(2))
        .expect("row");
    assert_eq!(group.list(one, friends).expect("list"), vec![Link::Row(two.row)]);
    assert_eq!(group.backlinks(two).expect("backlinks").len(), 1);
    assert_eq!(
        group.find_by_primary_key(person, &PrimaryKey::Int(2)).expect("find"),
        Some(two)
    );
    assert_verified(&group);
}
