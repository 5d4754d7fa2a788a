//! Logical property derivation over constructed expressions.
//!
//! ## What These Tests Verify
//! - Candidate keys flow from scans through joins, projections and filters
//! - Single-row `Values` have the empty key
//! - Filters mark only the columns they actually null-reject as not null

use normx_core::expr::{ColumnId, DataType, Op, ScalarValue, TableId};
use normx_core::factory::{Factory, FactoryConfig};
use normx_core::intern::ColSet;
use normx_core::memo::GroupId;
use normx_core::properties::RelationalProps;
use normx_core::rule::RuleRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn factory() -> Factory {
    Factory::new(
        Arc::new(RuleRegistry::new()),
        FactoryConfig {
            check_consistency: true,
        },
    )
}

fn cols(ids: &[u32]) -> ColSet {
    ids.iter().map(|id| ColumnId(*id)).collect()
}

fn keys(sets: &[&[u32]]) -> BTreeSet<ColSet> {
    sets.iter().map(|ids| cols(ids)).collect()
}

fn props(f: &Factory, group: GroupId) -> &RelationalProps {
    f.memo().relational(group).expect("relational")
}

/// `t(a INT NOT NULL, b INT)` keyed by `a` (columns 0, 1) and `u(c INT NOT
/// NULL, d INT)` keyed by `c` (columns 2, 3).
fn keyed_tables(f: &mut Factory) -> (TableId, TableId) {
    let md = f.metadata_mut();
    let t = md.add_table("t", &[("a", DataType::Int64, false), ("b", DataType::Int64, true)]);
    let u = md.add_table("u", &[("c", DataType::Int64, false), ("d", DataType::Int64, true)]);
    md.set_primary_key(t, &[ColumnId(0)]);
    md.set_primary_key(u, &[ColumnId(2)]);
    (t, u)
}

fn int(f: &mut Factory, v: i64) -> GroupId {
    f.construct_const_val(ScalarValue::Int64(v))
}

// ---------------------------------------------------------------------------
// Candidate keys
// ---------------------------------------------------------------------------

#[test]
fn test_scan_key_requires_covered_primary_key() {
    let mut f = factory();
    let (t, _) = keyed_tables(&mut f);
    let full = f.construct_table_scan(t);
    assert_eq!(props(&f, full).keys, keys(&[&[0]]));

    let partial = f.construct_scan(t, cols(&[1]));
    assert!(props(&f, partial).keys.is_empty());
}

#[test]
fn test_join_keys_are_pairwise_unions() {
    let mut f = factory();
    let (t, u) = keyed_tables(&mut f);
    let left = f.construct_table_scan(t);
    let right = f.construct_table_scan(u);
    let b = f.construct_variable(ColumnId(1));
    let d = f.construct_variable(ColumnId(3));
    let on = f.construct_binary(Op::Eq, b, d);
    let join = f.construct_inner_join(left, right, on);
    assert_eq!(props(&f, join).keys, keys(&[&[0, 2]]));

    let unkeyed = f.construct_scan(u, cols(&[3]));
    let join = f.construct_inner_join(left, unkeyed, on);
    assert!(props(&f, join).keys.is_empty());
}

#[test]
fn test_project_keeps_keys_within_passthrough() {
    let mut f = factory();
    let (t, _) = keyed_tables(&mut f);
    let scan = f.construct_table_scan(t);

    let with_key = f.construct_simple_project(scan, cols(&[0]));
    assert_eq!(props(&f, with_key).keys, keys(&[&[0]]));

    let without_key = f.construct_simple_project(scan, cols(&[1]));
    assert!(props(&f, without_key).keys.is_empty());
}

#[test]
fn test_filter_and_limit_keep_keys() {
    let mut f = factory();
    let (t, _) = keyed_tables(&mut f);
    let scan = f.construct_table_scan(t);
    let b = f.construct_variable(ColumnId(1));
    let five = int(&mut f, 5);
    let pred = f.construct_binary(Op::Lt, b, five);
    let select = f.construct_select(scan, pred);
    assert_eq!(props(&f, select).keys, keys(&[&[0]]));

    let limit = f.construct_limit(select, five);
    assert_eq!(props(&f, limit).keys, keys(&[&[0]]));
}

#[test]
fn test_single_row_values_has_empty_key() {
    let mut f = factory();
    let v = f.metadata_mut().add_column("v", DataType::Int64);
    let one = int(&mut f, 1);
    let two = int(&mut f, 2);
    let r1 = f.construct_tuple(&[one]);
    let r2 = f.construct_tuple(&[two]);

    let single = f.construct_values(&[r1], vec![v]);
    assert_eq!(props(&f, single).keys, keys(&[&[]]));

    let empty = f.construct_values(&[], vec![v]);
    assert_eq!(props(&f, empty).keys, keys(&[&[]]));

    let pair = f.construct_values(&[r1, r2], vec![v]);
    assert!(props(&f, pair).keys.is_empty());
}

// ---------------------------------------------------------------------------
// Null rejection
// ---------------------------------------------------------------------------

/// `t(a INT, b INT)`, both nullable, with a filter built by `filter`.
fn filtered(build: impl FnOnce(&mut Factory, GroupId, GroupId) -> GroupId) -> ColSet {
    let mut f = factory();
    let t = f
        .metadata_mut()
        .add_table("t", &[("a", DataType::Int64, true), ("b", DataType::Int64, true)]);
    let scan = f.construct_table_scan(t);
    assert!(props(&f, scan).not_null_cols.is_empty());
    let a = f.construct_variable(ColumnId(0));
    let b = f.construct_variable(ColumnId(1));
    let pred = build(&mut f, a, b);
    let select = f.construct_select(scan, pred);
    props(&f, select).not_null_cols.clone()
}

fn tuples(f: &mut Factory, a: GroupId, b: GroupId) -> (GroupId, GroupId) {
    let one = int(f, 1);
    let two = int(f, 2);
    (f.construct_tuple(&[a, b]), f.construct_tuple(&[one, two]))
}

#[test]
fn test_scalar_comparison_rejects_nulls() {
    let not_null = filtered(|f, a, _| {
        let one = int(f, 1);
        f.construct_binary(Op::Ne, a, one)
    });
    assert_eq!(not_null, cols(&[0]));
}

#[test]
fn test_tuple_inequality_rejects_nothing() {
    // (a, NULL) <> (1, 2) is true whenever a <> 1.
    for op in [Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge] {
        let not_null = filtered(|f, a, b| {
            let (left, right) = tuples(f, a, b);
            f.construct_binary(op, left, right)
        });
        assert!(not_null.is_empty(), "{:?} rejected {}", op, not_null);
    }
}

#[test]
fn test_tuple_equality_rejects_every_element() {
    let not_null = filtered(|f, a, b| {
        let (left, right) = tuples(f, a, b);
        f.construct_binary(Op::Eq, left, right)
    });
    assert_eq!(not_null, cols(&[0, 1]));
}

#[test]
fn test_conjunction_rejects_union() {
    let not_null = filtered(|f, a, b| {
        let (left, right) = tuples(f, a, b);
        let ne = f.construct_binary(Op::Ne, left, right);
        let one = int(f, 1);
        let lt = f.construct_binary(Op::Lt, b, one);
        f.construct_and(ne, lt)
    });
    assert_eq!(not_null, cols(&[1]));
}
