#![allow(missing_docs)]

use linkstore::export::{
    render, render_table, render_with_stats, LinkDepth, OutputMode, RenderOptions, UnresolvedMode,
};
use linkstore::storage::{Group, LinkKind, LinkSpec, PrimaryKey, Value, ValueKind};
use linkstore::ObjRef;
use serde_json::{json, Value as JsonValue};

fn parse(text: &str) -> JsonValue {
    serde_json::from_str(text).expect("valid json")
}

fn depth(raw: i64) -> RenderOptions {
    RenderOptions::new().depth(LinkDepth::from_raw(raw).expect("depth"))
}

/// `x.next = y`, `y.back = x` across two tables.
fn two_cycle() -> (Group, ObjRef, ObjRef) {
    let mut group = Group::new();
    let t1 = group.add_table("T1").expect("T1");
    let t2 = group.add_table("T2").expect("T2");
    let n1 = group.add_column(t1, "name", ValueKind::String, true).expect("name");
    let n2 = group.add_column(t2, "name", ValueKind::String, true).expect("name");
    let next = group
        .add_link_column(t1, LinkSpec::strong("next", LinkKind::Single, t2))
        .expect("next");
    let back = group
        .add_link_column(t2, LinkSpec::strong("back", LinkKind::Single, t1))
        .expect("back");
    let x = group.create_row(t1).expect("x");
    let y = group.create_row(t2).expect("y");
    group.set_value(x, n1, Value::from("x")).expect("x name");
    group.set_value(y, n2, Value::from("y")).expect("y name");
    group.set_link(x, next, Some(y.into())).expect("x.next");
    group.set_link(y, back, Some(x.into())).expect("y.back");
    (group, x, y)
}

/// `a.kids = [b, c]`, `b.kids = [d]`, `c.kids = [d]` in one table.
fn diamond() -> (Group, [ObjRef; 4]) {
    let mut group = Group::new();
    let n = group.add_table("N").expect("N");
    let kids = group
        .add_link_column(n, LinkSpec::strong("kids", LinkKind::List, n))
        .expect("kids");
    let rows = [(); 4].map(|_| group.create_row(n).expect("row"));
    let [a, b, c, d] = rows;
    group.list_push(a, kids, b.into()).expect("a->b");
    group.list_push(a, kids, c.into()).expect("a->c");
    group.list_push(b, kids, d.into()).expect("b->d");
    group.list_push(c, kids, d.into()).expect("c->d");
    (group, rows)
}

#[test]
fn unlimited_depth_terminates_on_cycles() {
    let (group, x, _) = two_cycle();
    let text = render(&group, &[x], &depth(-1)).expect("render");
    assert_eq!(
        text,
        r#"[{"_key":0,"name":"x","next":{"_key":0,"name":"y","back":0}}]"#
    );
}

#[test]
fn limited_depth_repeats_rows_along_a_cycle() {
    let (group, x, y) = two_cycle();
    let rendered = render_with_stats(&group, &[x], &depth(3)).expect("render");
    assert_eq!(
        parse(&rendered.text),
        json!([{
            "_key": 0, "name": "x",
            "next": {
                "_key": 0, "name": "y",
                "back": {
                    "_key": 0, "name": "x",
                    "next": { "_key": 0, "name": "y", "back": 0 }
                }
            }
        }])
    );
    assert_eq!(rendered.stats.roots, 1);
    assert_eq!(rendered.stats.expansions, 3);
    assert_eq!(rendered.stats.visits.get(&x), Some(&2));
    assert_eq!(rendered.stats.visits.get(&y), Some(&2));
    assert!(!rendered.stats.truncated);
}

#[test]
fn depth_zero_prints_identifiers_only() {
    let (group, x, _) = two_cycle();
    let text = render(&group, &[x], &RenderOptions::new()).expect("render");
    assert_eq!(parse(&text), json!([{ "_key": 0, "name": "x", "next": 0 }]));
}

#[test]
fn diamond_collapses_under_unlimited_depth() {
    let (group, [a, _, _, d]) = diamond();
    let rendered = render_with_stats(&group, &[a], &depth(-1)).expect("render");
    assert_eq!(
        parse(&rendered.text),
        json!([{
            "_key": 0,
            "kids": [
                { "_key": 1, "kids": [{ "_key": 3, "kids": [] }] },
                { "_key": 2, "kids": [3] }
            ]
        }])
    );
    assert_eq!(rendered.stats.visits.get(&d), Some(&1));
}

#[test]
fn diamond_repeats_under_limited_depth() {
    let (group, [a, _, _, d]) = diamond();
    let rendered = render_with_stats(&group, &[a], &depth(2)).expect("render");
    assert_eq!(
        parse(&rendered.text),
        json!([{
            "_key": 0,
            "kids": [
                { "_key": 1, "kids": [{ "_key": 3, "kids": [] }] },
                { "_key": 2, "kids": [{ "_key": 3, "kids": [] }] }
            ]
        }])
    );
    assert_eq!(rendered.stats.visits.get(&d), Some(&2));
}

#[test]
fn roots_count_as_visited() {
    let (group, [_, b, _, d]) = diamond();
    let text = render(&group, &[b, d], &depth(-1)).expect("render");
    assert_eq!(
        parse(&text),
        json!([{ "_key": 1, "kids": [3] }, { "_key": 3, "kids": [] }])
    );
}

fn people() -> (Group, ObjRef) {
    let mut group = Group::new();
    let person = group
        .add_table_with_primary_key("person", "_id", ValueKind::Int)
        .expect("person");
    let best = group
        .add_link_column(person, LinkSpec::strong("best", LinkKind::Single, person))
        .expect("best");
    let friends = group
        .add_link_column(person, LinkSpec::strong("friends", LinkKind::List, person))
        .expect("friends");
    let one = group
        .create_row_with_primary_key(person, PrimaryKey::Int(1))
        .expect("one");
    let two = group
        .create_row_with_primary_key(person, PrimaryKey::Int(2))
        .expect("two");
    group.set_link(one, best, Some(two.into())).expect("best");
    let pending = group
        .link_to_primary_key(person, PrimaryKey::Int(3))
        .expect("pending");
    group.list_push(one, friends, pending).expect("friends");
    (group, one)
}

#[test]
fn output_modes_print_unexpanded_links_differently() {
    let (group, one) = people();

    let plain = render(&group, &[one], &RenderOptions::new()).expect("json");
    assert_eq!(
        parse(&plain),
        json!([{ "_key": 0, "_id": 1, "best": 1, "friends": [{ "$unresolved": 3 }] }])
    );

    let xjson = render(&group, &[one], &RenderOptions::new().mode(OutputMode::XJson))
        .expect("xjson");
    assert_eq!(
        parse(&xjson),
        json!([{
            "_id": { "$numberLong": "1" },
            "best": { "$numberLong": "2" },
            "friends": [{ "$unresolved": { "$numberLong": "3" } }]
        }])
    );

    let plus = render(&group, &[one], &RenderOptions::new().mode(OutputMode::XJsonPlus))
        .expect("xjson plus");
    assert_eq!(
        parse(&plus),
        json!([{
            "_id": { "$numberLong": "1" },
            "best": { "$link": { "table": "person", "key": { "$numberLong": "2" } } },
            "friends": [{
                "$link": {
                    "table": "person",
                    "key": { "$numberLong": "3" },
                    "unresolved": true
                }
            }]
        }])
    );
}

#[test]
fn unresolved_links_can_print_as_null() {
    let (group, one) = people();
    let opts = RenderOptions::new().unresolved(UnresolvedMode::Null);
    let text = render(&group, &[one], &opts).expect("render");
    assert_eq!(parse(&text)[0]["friends"], json!([null]));
}

#[test]
fn renames_apply_to_columns_and_tables() {
    let (group, one) = people();
    let opts = RenderOptions::new()
        .mode(OutputMode::XJsonPlus)
        .rename("best", "favourite")
        .rename("person", "Person");
    let text = render(&group, &[one], &opts).expect("render");
    let row = &parse(&text)[0];
    assert!(row.get("best").is_none());
    assert_eq!(row["favourite"]["$link"]["table"], json!("Person"));
}

#[test]
fn row_limit_truncates_table_output() {
    let (group, [a, ..]) = diamond();
    let opts = RenderOptions::new().row_limit(2);
    let text = render_table(&group, a.table, &opts).expect("render");
    assert_eq!(parse(&text).as_array().map(Vec::len), Some(2));

    let roots: Vec<ObjRef> = group
        .table(a.table)
        .expect("N")
        .row_keys()
        .iter()
        .map(|&row| ObjRef::new(a.table, row))
        .collect();
    let rendered = render_with_stats(&group, &roots, &opts).expect("render");
    assert_eq!(rendered.stats.roots, 2);
    assert!(rendered.stats.truncated);
}

#[test]
fn expansion_limit_falls_back_to_identifiers() {
    let (group, [a, ..]) = diamond();
    let opts = depth(-1).expansion_limit(1);
    let rendered = render_with_stats(&group, &[a], &opts).expect("render");
    assert_eq!(
        parse(&rendered.text),
        json!([{ "_key": 0, "kids": [{ "_key": 1, "kids": [3] }, 2] }])
    );
    assert_eq!(rendered.stats.expansions, 1);
    assert!(rendered.stats.truncated);
}

#[test]
fn pretty_output_is_the_same_document() {
    let (group, x, _) = two_cycle();
    let compact = render(&group, &[x], &depth(-1)).expect("compact");
    let pretty = render(&group, &[x], &depth(-1).pretty(true)).expect("pretty");
    assert!(pretty.contains('\n'));
    assert_eq!(parse(&compact), parse(&pretty));
}

#[test]
fn removed_root_is_rejected() {
    let (mut group, x, _) = two_cycle();
    group.remove_row(x).expect("remove");
    assert!(render(&group, &[x], &RenderOptions::new()).is_err());
}
