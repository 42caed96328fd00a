#![allow(missing_docs)]

use linkstore::admin::{verify, VerifyLevel};
use linkstore::db::{Database, TxState};
use linkstore::export::{render_table, LinkDepth, RenderOptions};
use linkstore::storage::{GroupOptions, LinkKind, LinkSpec, RemovalStrategy};
use linkstore::{ColumnRef, ObjRef, TableKey};

struct Seeded {
    db: Database,
    person: TableKey,
    dog: TableKey,
    owner: ColumnRef,
}

fn seeded(options: GroupOptions) -> Seeded {
    let db = Database::new(options);
    let (person, dog, owner) = db
        .update(|group| {
            let person = group.add_table("person")?;
            let dog = group.add_table("dog")?;
            let owner =
                group.add_link_column(dog, LinkSpec::strong("owner", LinkKind::Single, person))?;
            for _ in 0..3 {
                let p = group.create_row(person)?;
                let d = group.create_row(dog)?;
                group.set_link(d, owner, Some(p.into()))?;
            }
            Ok((person, dog, ColumnRef::new(dog, owner)))
        })
        .expect("seed");
    Seeded {
        db,
        person,
        dog,
        owner,
    }
}

fn person(s: &Seeded, ordinal: usize) -> ObjRef {
    let snapshot = s.db.snapshot();
    let row = snapshot.table(s.person).expect("person").row_keys()[ordinal];
    ObjRef::new(s.person, row)
}

#[test]
fn cascade_is_invisible_until_commit() {
    let s = seeded(GroupOptions::default());
    let target = person(&s, 0);

    let mut txn = s.db.begin_write();
    assert_eq!(txn.state(), TxState::Active);
    txn.remove_row(target).expect("remove");
    let dog_row = txn.table(s.dog).expect("dog").row_keys()[0];
    assert_eq!(
        txn.get_link(ObjRef::new(s.dog, dog_row), s.owner.col)
            .expect("owner"),
        None
    );
    let before = s.db.begin_read();
    assert!(before.contains(target));
    txn.commit().expect("commit");

    assert!(before.contains(target));
    assert!(!s.db.snapshot().contains(target));
    assert!(verify(&before, VerifyLevel::Full).success);
    assert!(verify(&s.db.snapshot(), VerifyLevel::Full).success);
}

#[test]
fn rollback_restores_links_and_backlinks() {
    let s = seeded(GroupOptions::default());
    let target = person(&s, 1);
    let mut txn = s.db.begin_write();
    txn.remove_row(target).expect("remove");
    txn.rollback();

    let snapshot = s.db.snapshot();
    assert!(snapshot.contains(target));
    assert_eq!(snapshot.backlink_count(target, s.owner).expect("count"), 1);
    assert!(verify(&snapshot, VerifyLevel::Full).success);
}

#[test]
fn transaction_ids_increase() {
    let s = seeded(GroupOptions::default());
    let first = s.db.begin_write();
    let id = first.id();
    first.rollback();
    let second = s.db.begin_write();
    assert!(second.id() > id);
}

#[test]
fn snapshots_render_independently() {
    let s = seeded(GroupOptions::new().removal(RemovalStrategy::OrderedErase));
    let opts = RenderOptions::new().depth(LinkDepth::Unlimited);
    let before = s.db.begin_read();
    let target = person(&s, 0);
    s.db.update(|group| group.remove_row(target)).expect("remove");

    let old = render_table(&before, s.dog, &opts).expect("old");
    let new = render_table(&s.db.snapshot(), s.dog, &opts).expect("new");
    assert!(old.starts_with(r#"[{"_key":0,"owner":{"_key":0}}"#));
    assert!(new.starts_with(r#"[{"_key":0,"owner":null}"#));
}

#[test]
fn verify_on_commit_accepts_consistent_changes() {
    let s = seeded(GroupOptions::new().verify_on_commit(true));
    let target = person(&s, 2);
    s.db.update(|group| group.remove_row(target)).expect("commit");
    assert_eq!(s.db.snapshot().table(s.person).expect("person").len(), 2);
}
