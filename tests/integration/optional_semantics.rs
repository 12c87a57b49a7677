#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use triejoin::{
    query::{CacheOverflow, Executor, FilterExpr, JoinOptions, PlanOp, Term, TriplePattern},
    storage::{StoreOptions, TripleStore, TripleStoreBuilder},
    types::{NodeId, Result, TrieJoinError},
};

type Row = BTreeMap<String, u64>;

fn build(triples: &[(u64, u64, u64)]) -> Result<Arc<TripleStore>> {
    let mut builder = TripleStoreBuilder::new(StoreOptions::default().leaf_capacity(4).internal_fanout(3));
    builder.extend(
        triples
            .iter()
            .map(|&(s, p, o)| [NodeId(s), NodeId(p), NodeId(o)]),
    );
    Ok(Arc::new(builder.build()?))
}

fn v(name: &str) -> Term {
    Term::var(name)
}

fn c(id: u64) -> Term {
    Term::node(id)
}

fn bgp(patterns: &[(Term, Term, Term)]) -> PlanOp {
    PlanOp::bgp(
        patterns
            .iter()
            .cloned()
            .map(|(s, p, o)| TriplePattern::new(s, p, o))
            .collect(),
    )
}

fn run(store: &Arc<TripleStore>, plan: &PlanOp, options: JoinOptions) -> Result<Vec<Row>> {
    let executor = Executor::new(Arc::clone(store), options);
    let mut rows: Vec<Row> = executor
        .execute(plan, None)?
        .iter()
        .map(|binding| {
            binding
                .iter()
                .map(|(var, id)| (var.name().to_owned(), id.0))
                .collect()
        })
        .collect();
    rows.sort();
    Ok(rows)
}

fn row(pairs: &[(&str, u64)]) -> Row {
    pairs
        .iter()
        .map(|&(name, value)| (name.to_owned(), value))
        .collect()
}

#[test]
fn unmatched_parents_are_kept() -> Result<()> {
    let store = build(&[(1, 10, 100), (2, 10, 200), (1, 20, 7), (1, 20, 8)])?;
    let plan = bgp(&[(v("s"), c(10), v("o"))]).optional(bgp(&[(v("s"), c(20), v("x"))]));
    assert_eq!(
        run(&store, &plan, JoinOptions::default())?,
        vec![
            row(&[("o", 100), ("s", 1), ("x", 7)]),
            row(&[("o", 100), ("s", 1), ("x", 8)]),
            row(&[("o", 200), ("s", 2)]),
        ]
    );
    Ok(())
}

#[test]
fn left_outer_join_matches_reference() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let triples: Vec<(u64, u64, u64)> = (0..300)
        .map(|_| (rng.gen_range(0..20), rng.gen_range(0..2), rng.gen_range(0..20)))
        .collect();
    let store = build(&triples)?;
    let plan = bgp(&[(v("a"), c(0), v("b"))]).optional(bgp(&[(v("b"), c(1), v("c"))]));

    let mut distinct = triples.clone();
    distinct.sort_unstable();
    distinct.dedup();
    let mut expected = Vec::new();
    for &(a, _, b) in distinct.iter().filter(|t| t.1 == 0) {
        let parent = row(&[("a", a), ("b", b)]);
        let mut matched = false;
        for &(_, _, cv) in distinct.iter().filter(|t| t.1 == 1 && t.0 == b) {
            let mut extended = parent.clone();
            extended.insert("c".to_owned(), cv);
            expected.push(extended);
            matched = true;
        }
        if !matched {
            expected.push(parent);
        }
    }
    expected.sort();

    assert_eq!(run(&store, &plan, JoinOptions::default())?, expected);
    assert_eq!(
        run(&store, &plan, JoinOptions::default().buffer_block(1))?,
        expected
    );
    Ok(())
}

#[test]
fn independent_optionals_form_a_cross_product() -> Result<()> {
    let store = build(&[
        (1, 0, 0),
        (2, 0, 0),
        (3, 0, 0),
        (1, 1, 10),
        (1, 1, 11),
        (1, 2, 20),
        (1, 2, 21),
        (1, 2, 22),
        (2, 2, 23),
        (2, 2, 24),
    ])?;
    let plan = bgp(&[(v("s"), c(0), c(0))])
        .optional(bgp(&[(v("s"), c(1), v("x"))]))
        .optional(bgp(&[(v("s"), c(2), v("y"))]));
    let rows = run(&store, &plan, JoinOptions::default())?;
    let per_subject = |s: u64| rows.iter().filter(|r| r["s"] == s).count();
    assert_eq!(per_subject(1), 6);
    assert_eq!(per_subject(2), 2);
    assert_eq!(per_subject(3), 1);
    assert!(rows
        .iter()
        .filter(|r| r["s"] == 2)
        .all(|r| !r.contains_key("x") && r.contains_key("y")));
    assert_eq!(rows.iter().filter(|r| r["s"] == 3).next(), Some(&row(&[("s", 3)])));
    Ok(())
}

#[test]
fn nested_optionals_see_every_enclosing_variable() -> Result<()> {
    let store = build(&[
        (1, 0, 5),
        (2, 0, 5),
        (5, 1, 9),
        (1, 2, 100),
        (2, 2, 200),
    ])?;
    let plan = bgp(&[(v("g"), c(0), v("a"))]).optional(
        bgp(&[(v("a"), c(1), v("b"))]).optional(bgp(&[(v("g"), c(2), v("c"))])),
    );
    assert_eq!(
        run(&store, &plan, JoinOptions::default())?,
        vec![
            row(&[("a", 5), ("b", 9), ("c", 100), ("g", 1)]),
            row(&[("a", 5), ("b", 9), ("c", 200), ("g", 2)]),
        ]
    );
    Ok(())
}

#[test]
fn optional_with_absent_constant_changes_nothing() -> Result<()> {
    let store = build(&[(1, 10, 100), (2, 10, 200)])?;
    let parent = bgp(&[(v("s"), c(10), v("o"))]);
    let plan = parent
        .clone()
        .optional(bgp(&[(v("s"), c(99), v("x"))]));
    assert_eq!(
        run(&store, &plan, JoinOptions::default())?,
        run(&store, &parent, JoinOptions::default())?
    );
    Ok(())
}

#[test]
fn filter_inside_optional_restricts_extensions_only() -> Result<()> {
    let store = build(&[(1, 10, 100), (2, 10, 200), (1, 20, 7), (1, 20, 8), (2, 20, 3)])?;
    let child = bgp(&[(v("s"), c(20), v("x"))]).filter(vec![FilterExpr::Gt {
        lhs: v("x"),
        rhs: c(7),
    }]);
    let plan = bgp(&[(v("s"), c(10), v("o"))]).optional(child);
    assert_eq!(
        run(&store, &plan, JoinOptions::default())?,
        vec![
            row(&[("o", 100), ("s", 1), ("x", 8)]),
            row(&[("o", 200), ("s", 2)]),
        ]
    );
    Ok(())
}

#[test]
fn strict_cache_reports_overflow() -> Result<()> {
    let triples: Vec<(u64, u64, u64)> = std::iter::once((1, 0, 0))
        .chain((0..10).map(|x| (1, 1, x)))
        .collect();
    let store = build(&triples)?;
    let plan = bgp(&[(v("s"), c(0), c(0))]).optional(bgp(&[(v("s"), c(1), v("x"))]));
    let strict = JoinOptions::default()
        .optional_cache_capacity(3)
        .cache_overflow(CacheOverflow::Error);
    assert!(matches!(
        run(&store, &plan, strict),
        Err(TrieJoinError::CacheOverflow { capacity: 3 })
    ));
    assert_eq!(store.pinned_pages(), 0);
    let growing = JoinOptions::default().optional_cache_capacity(3);
    assert_eq!(run(&store, &plan, growing)?.len(), 10);
    Ok(())
}
