#![allow(missing_docs)]

use linkstore::admin::{verify, VerifyLevel};
use linkstore::storage::{Group, GroupOptions, Link, LinkKind, LinkSpec, RemovalStrategy};
use linkstore::{ColKey, ObjRef, RowKey, TableKey};

fn assert_verified(group: &Group) {
    let report = verify(group, VerifyLevel::Full);
    assert!(report.success, "findings: {:?}", report.findings);
}

struct Ring {
    group: Group,
    table: TableKey,
    next: ColKey,
    holder: ObjRef,
    refs: ColKey,
    rows: Vec<ObjRef>,
}

/// Five rows where `row[i].next = row[(i + 1) % 5]`, plus one row elsewhere listing all five.
fn ring(strategy: RemovalStrategy) -> Ring {
    let mut group = Group::with_options(GroupOptions::new().removal(strategy));
    let table = group.add_table("T").expect("T");
    let other = group.add_table("O").expect("O");
    let next = group
        .add_link_column(table, LinkSpec::strong("next", LinkKind::Single, table))
        .expect("next");
    let refs = group
        .add_link_column(other, LinkSpec::strong("refs", LinkKind::List, table))
        .expect("refs");
    let rows: Vec<ObjRef> = (0..5).map(|_| group.create_row(table).expect("row")).collect();
    let holder = group.create_row(other).expect("holder");
    for (i, row) in rows.iter().enumerate() {
        let target = rows[(i + 1) % rows.len()];
        group.set_link(*row, next, Some(target.into())).expect("next");
        group.list_push(holder, refs, (*row).into()).expect("refs");
    }
    Ring {
        group,
        table,
        next,
        holder,
        refs,
        rows,
    }
}

fn check_after_removing_second(ring: &Ring) {
    let r = &ring.rows;
    let g = &ring.group;
    assert_eq!(g.get_link(r[0], ring.next).expect("r0"), None);
    assert_eq!(g.get_link(r[2], ring.next).expect("r2"), Some(Link::Row(r[3].row)));
    assert_eq!(g.get_link(r[3], ring.next).expect("r3"), Some(Link::Row(r[4].row)));
    assert_eq!(g.get_link(r[4], ring.next).expect("r4"), Some(Link::Row(r[0].row)));
    assert_eq!(
        g.list(ring.holder, ring.refs).expect("refs"),
        vec![
            Link::Row(r[0].row),
            Link::Row(r[2].row),
            Link::Row(r[3].row),
            Link::Row(r[4].row),
        ]
    );
    for (row, expected) in [(r[0], 2), (r[2], 1), (r[3], 2), (r[4], 2)] {
        assert_eq!(g.backlinks(row).expect("backlinks").len(), expected);
    }
    assert_verified(g);
}

#[test]
fn swap_with_last_moves_last_row_into_gap() {
    let mut ring = ring(RemovalStrategy::SwapWithLast);
    let r = ring.rows.clone();
    ring.group.remove_row(r[1]).expect("remove r1");
    let keys: Vec<RowKey> = ring.group.table(ring.table).expect("T").row_keys().to_vec();
    assert_eq!(keys, vec![r[0].row, r[4].row, r[2].row, r[3].row]);
    check_after_removing_second(&ring);
}

#[test]
fn ordered_erase_shifts_following_rows() {
    let mut ring = ring(RemovalStrategy::OrderedErase);
    let r = ring.rows.clone();
    ring.group.remove_row(r[1]).expect("remove r1");
    let keys: Vec<RowKey> = ring.group.table(ring.table).expect("T").row_keys().to_vec();
    assert_eq!(keys, vec![r[0].row, r[2].row, r[3].row, r[4].row]);
    check_after_removing_second(&ring);
}

#[test]
fn removing_every_row_in_turn_stays_consistent() {
    for strategy in [RemovalStrategy::SwapWithLast, RemovalStrategy::OrderedErase] {
        let mut ring = ring(strategy);
        for row in [2usize, 0, 4, 1, 3] {
            ring.group.remove_row(ring.rows[row]).expect("remove");
            assert_verified(&ring.group);
        }
        assert!(ring.group.table(ring.table).expect("T").is_empty());
        assert!(ring.group.list(ring.holder, ring.refs).expect("refs").is_empty());
    }
}

#[test]
fn relocated_self_link_follows_its_row() {
    let mut ring = ring(RemovalStrategy::SwapWithLast);
    let r = ring.rows.clone();
    ring.group
        .set_link(r[4], ring.next, Some(r[4].into()))
        .expect("self link");
    ring.group.remove_row(r[0]).expect("remove r0");
    assert_eq!(
        ring.group.table(ring.table).expect("T").slot_of(r[4].row),
        Some(0)
    );
    assert_eq!(
        ring.group.get_link(r[4], ring.next).expect("r4"),
        Some(Link::Row(r[4].row))
    );
    assert_verified(&ring.group);
}

#[test]
fn swap_rows_preserves_logical_links() {
    let mut ring = ring(RemovalStrategy::SwapWithLast);
    let r = ring.rows.clone();
    ring.group
        .swap_rows(ring.table, r[1].row, r[3].row)
        .expect("swap");
    let table = ring.group.table(ring.table).expect("T");
    assert_eq!(table.slot_of(r[1].row), Some(3));
    assert_eq!(table.slot_of(r[3].row), Some(1));
    for (i, row) in r.iter().enumerate() {
        assert_eq!(
            ring.group.get_link(*row, ring.next).expect("next"),
            Some(Link::Row(r[(i + 1) % 5].row))
        );
    }
    assert_eq!(ring.group.list(ring.holder, ring.refs).expect("refs").len(), 5);
    assert_verified(&ring.group);

    ring.group
        .swap_rows(ring.table, r[2].row, r[2].row)
        .expect("no-op swap");
    assert_verified(&ring.group);
}
