#![allow(missing_docs)]

use std::sync::Arc;

use triejoin::{
    query::{Executor, FilterExpr, JoinOptions, PlanOp, Term, TriplePattern},
    storage::{StoreOptions, TripleStore, TripleStoreBuilder},
    types::{NodeId, Result},
};

fn store(triples: &[(u64, u64, u64)]) -> Result<Arc<TripleStore>> {
    let mut builder = TripleStoreBuilder::new(StoreOptions::default().leaf_capacity(2).internal_fanout(2));
    builder.extend(
        triples
            .iter()
            .map(|&(s, p, o)| [NodeId(s), NodeId(p), NodeId(o)]),
    );
    Ok(Arc::new(builder.build()?))
}

fn tp(s: Term, p: Term, o: Term) -> TriplePattern {
    TriplePattern::new(s, p, o)
}

fn rows(
    store: &Arc<TripleStore>,
    plan: &PlanOp,
    vars: &[&str],
) -> Result<Vec<Vec<Option<u64>>>> {
    let executor = Executor::new(Arc::clone(store), JoinOptions::default());
    let bindings = executor.execute(plan, None)?;
    Ok(bindings
        .iter()
        .map(|row| vars.iter().map(|var| row.get(var).map(|id| id.0)).collect())
        .collect())
}

#[test]
fn single_pattern_streams_in_index_order() -> Result<()> {
    let store = store(&[(1, 10, 100), (1, 10, 200), (2, 10, 100)])?;
    let plan = PlanOp::bgp(vec![tp(Term::var("s"), Term::node(10), Term::var("o"))]);
    assert_eq!(
        rows(&store, &plan, &["s", "o"])?,
        vec![
            vec![Some(1), Some(100)],
            vec![Some(1), Some(200)],
            vec![Some(2), Some(100)],
        ]
    );
    Ok(())
}

#[test]
fn shared_subject_restricts_both_patterns() -> Result<()> {
    let store = store(&[
        (1, 10, 100),
        (1, 10, 200),
        (2, 10, 100),
        (1, 20, 7),
        (1, 20, 8),
        (3, 20, 9),
    ])?;
    let plan = PlanOp::bgp(vec![
        tp(Term::var("s"), Term::node(10), Term::var("o")),
        tp(Term::var("s"), Term::node(20), Term::var("o2")),
    ]);
    let mut got = rows(&store, &plan, &["s", "o", "o2"])?;
    got.sort();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(100), Some(7)],
            vec![Some(1), Some(100), Some(8)],
            vec![Some(1), Some(200), Some(7)],
            vec![Some(1), Some(200), Some(8)],
        ]
    );
    Ok(())
}

#[test]
fn absent_constant_yields_nothing() -> Result<()> {
    let store = store(&[(1, 10, 100)])?;
    let plan = PlanOp::bgp(vec![
        tp(Term::var("s"), Term::node(10), Term::var("o")),
        tp(Term::var("s"), Term::node(99), Term::var("x")),
    ]);
    assert!(rows(&store, &plan, &["s"])?.is_empty());
    let unknown = PlanOp::bgp(vec![tp(
        Term::var("s"),
        Term::Node(NodeId::MISSING),
        Term::var("o"),
    )]);
    assert!(rows(&store, &unknown, &["s"])?.is_empty());
    Ok(())
}

#[test]
fn empty_store_yields_nothing() -> Result<()> {
    let store = store(&[])?;
    let plan = PlanOp::bgp(vec![tp(Term::var("s"), Term::var("p"), Term::var("o"))]);
    assert!(rows(&store, &plan, &["s"])?.is_empty());
    Ok(())
}

#[test]
fn path_join_on_object_to_subject() -> Result<()> {
    let store = store(&[(1, 5, 2), (2, 5, 3), (3, 5, 4), (9, 6, 2)])?;
    let plan = PlanOp::bgp(vec![
        tp(Term::var("a"), Term::node(5), Term::var("b")),
        tp(Term::var("b"), Term::node(5), Term::var("c")),
    ]);
    let mut got = rows(&store, &plan, &["a", "b", "c"])?;
    got.sort();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(2), Some(3)],
            vec![Some(2), Some(3), Some(4)],
        ]
    );
    Ok(())
}

#[test]
fn filters_drop_rows_and_keep_going() -> Result<()> {
    let store = store(&[(1, 10, 100), (2, 10, 200), (3, 10, 300), (4, 10, 400)])?;
    let plan = PlanOp::bgp(vec![tp(Term::var("s"), Term::node(10), Term::var("o"))]).filter(vec![
        FilterExpr::Or {
            exprs: vec![
                FilterExpr::Lt {
                    lhs: Term::var("s"),
                    rhs: Term::node(2),
                },
                FilterExpr::In {
                    term: Term::var("o"),
                    values: vec![Term::node(300), Term::node(400)],
                },
            ],
        },
        FilterExpr::Ne {
            lhs: Term::var("s"),
            rhs: Term::node(4),
        },
    ]);
    assert_eq!(
        rows(&store, &plan, &["s"])?,
        vec![vec![Some(1)], vec![Some(3)]]
    );
    Ok(())
}

#[test]
fn fully_bound_pattern_acts_as_existence_check() -> Result<()> {
    let store = store(&[(1, 10, 100), (2, 10, 200)])?;
    let present = PlanOp::bgp(vec![
        tp(Term::node(1), Term::node(10), Term::node(100)),
        tp(Term::var("s"), Term::node(10), Term::node(200)),
    ]);
    assert_eq!(rows(&store, &present, &["s"])?, vec![vec![Some(2)]]);
    let absent = PlanOp::bgp(vec![
        tp(Term::node(1), Term::node(10), Term::node(200)),
        tp(Term::var("s"), Term::node(10), Term::node(200)),
    ]);
    assert!(rows(&store, &absent, &["s"])?.is_empty());
    Ok(())
}
