#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use triejoin::{
    query::{Executor, JoinEngine, JoinOptions, JoinStats, PlanOp, Term, TriplePattern, Var},
    storage::{StoreOptions, TripleStore, TripleStoreBuilder},
    types::{NodeId, Result, TrieJoinError},
};

fn build(triples: impl IntoIterator<Item = (u64, u64, u64)>, leaf_capacity: usize) -> Result<Arc<TripleStore>> {
    let mut builder = TripleStoreBuilder::new(
        StoreOptions::default()
            .leaf_capacity(leaf_capacity)
            .internal_fanout(4),
    );
    builder.extend(
        triples
            .into_iter()
            .map(|(s, p, o)| [NodeId(s), NodeId(p), NodeId(o)]),
    );
    Ok(Arc::new(builder.build()?))
}

fn v(name: &str) -> Term {
    Term::var(name)
}

fn c(id: u64) -> Term {
    Term::node(id)
}

fn engine(
    store: &Arc<TripleStore>,
    patterns: Vec<TriplePattern>,
    upper: &[Var],
    options: &JoinOptions,
    stats: &Arc<JoinStats>,
) -> Result<JoinEngine> {
    let mut engine = JoinEngine::new(patterns, Arc::clone(store), options, Arc::clone(stats));
    engine.init(upper)?;
    engine.open_terms()?;
    Ok(engine)
}

fn drain(engine: &mut JoinEngine) -> Result<Vec<Vec<NodeId>>> {
    let mut rows = Vec::new();
    while engine.has_next()? {
        rows.push(engine.current_binding().to_vec());
    }
    Ok(rows)
}

fn random_store(seed: u64) -> Result<Arc<TripleStore>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let triples: Vec<_> = (0..500)
        .map(|_| (rng.gen_range(0..25), rng.gen_range(0..3), rng.gen_range(0..25)))
        .collect();
    build(triples, 6)
}

#[test]
fn ordered_enumeration_is_lexicographic() -> Result<()> {
    let store = random_store(5)?;
    let stats = Arc::new(JoinStats::default());
    let options = JoinOptions::default().ordered_enumeration(true).buffer_block(4);
    let mut engine = engine(
        &store,
        vec![
            TriplePattern::new(v("a"), c(0), v("b")),
            TriplePattern::new(v("a"), c(1), v("c")),
            TriplePattern::new(v("d"), c(2), v("e")),
        ],
        &[],
        &options,
        &stats,
    )?;
    assert!(engine.seek_binding(&[], 0)?);
    let rows = drain(&mut engine)?;
    assert!(!rows.is_empty());
    for pair in rows.windows(2) {
        assert!(pair[0] < pair[1], "{:?} before {:?}", pair[0], pair[1]);
    }
    Ok(())
}

#[test]
fn intersected_prefix_never_decreases() -> Result<()> {
    let store = random_store(9)?;
    let stats = Arc::new(JoinStats::default());
    let mut engine = engine(
        &store,
        vec![
            TriplePattern::new(v("a"), c(0), v("b")),
            TriplePattern::new(v("b"), c(1), v("c")),
            TriplePattern::new(v("c"), c(2), v("x")),
        ],
        &[],
        &JoinOptions::default(),
        &stats,
    )?;
    engine.seek_binding(&[], 0)?;
    let prefix = engine.enumeration_level();
    let rows = drain(&mut engine)?;
    for pair in rows.windows(2) {
        assert!(pair[0][..prefix] <= pair[1][..prefix]);
    }
    Ok(())
}

#[test]
fn reseek_with_same_context_repeats_rows() -> Result<()> {
    let store = build(
        (0..20).flat_map(|s| (0..(s % 4)).map(move |o| (s, 7, o + 100))),
        3,
    )?;
    let stats = Arc::new(JoinStats::default());
    let mut engine = engine(
        &store,
        vec![TriplePattern::new(v("u"), c(7), v("x"))],
        &[Var::new("u")],
        &JoinOptions::default().buffer_block(1),
        &stats,
    )?;
    assert_eq!(engine.base_level(), 1);

    engine.seek_binding(&[NodeId(7)], 0)?;
    let first = drain(&mut engine)?;
    assert_eq!(first.len(), 3);

    engine.seek_binding(&[NodeId(7)], 0)?;
    assert_eq!(drain(&mut engine)?, first);

    engine.seek_binding(&[NodeId(5)], 0)?;
    assert_eq!(drain(&mut engine)?.len(), 1);

    assert!(!engine.seek_binding(&[NodeId(4)], 0)?, "subject 4 has no objects");
    assert!(!engine.has_next()?);

    engine.seek_binding(&[NodeId(7)], 0)?;
    assert_eq!(drain(&mut engine)?, first);
    drop(engine);
    assert_eq!(store.pinned_pages(), 0);
    Ok(())
}

#[test]
fn intersection_work_tracks_the_smallest_side() -> Result<()> {
    let store = build(
        (0..5_000).map(|x| (x, 1, 1)).chain([(2_500, 2, 1)]),
        32,
    )?;
    let executor = Executor::new(Arc::clone(&store), JoinOptions::default());
    let plan = PlanOp::bgp(vec![
        TriplePattern::new(v("x"), c(1), c(1)),
        TriplePattern::new(v("x"), c(2), c(1)),
    ]);
    let mut stream = executor.stream(&plan)?;
    let row = stream.next().expect("one row")?;
    assert_eq!(row.get("x"), Some(NodeId(2_500)));
    assert!(stream.next().is_none());
    let moves = stream.stats().moves();
    assert!(moves < 32, "leapfrog made {moves} moves");
    Ok(())
}

#[test]
fn dropping_a_stream_early_releases_pages() -> Result<()> {
    let store = random_store(13)?;
    let executor = Executor::new(Arc::clone(&store), JoinOptions::default().buffer_block(2));
    let plan = PlanOp::bgp(vec![
        TriplePattern::new(v("a"), c(0), v("b")),
        TriplePattern::new(v("b"), c(1), v("c")),
    ])
    .optional(PlanOp::bgp(vec![TriplePattern::new(v("c"), c(2), v("d"))]));
    let mut stream = executor.stream(&plan)?;
    assert!(stream.next().is_some());
    assert!(store.pinned_pages() > 0, "cursors hold their paths");
    drop(stream);
    assert_eq!(store.pinned_pages(), 0);
    Ok(())
}

#[test]
fn cancellation_stops_the_stream() -> Result<()> {
    let store = build((0..50).map(|x| (x, 1, x)), 4)?;
    let executor = Executor::new(Arc::clone(&store), JoinOptions::default());
    let plan = PlanOp::bgp(vec![TriplePattern::new(v("s"), c(1), v("o"))]);
    let token = Arc::new(AtomicBool::new(false));
    let mut stream = executor.stream_with_token(&plan, Some(Arc::clone(&token)))?;
    assert!(stream.next().transpose()?.is_some());
    assert!(stream.next().transpose()?.is_some());
    token.store(true, Ordering::SeqCst);
    assert!(matches!(stream.next(), Some(Err(TrieJoinError::Cancelled))));
    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn invalid_options_are_rejected_at_init() -> Result<()> {
    let store = build([(1, 1, 1)], 4)?;
    let executor = Executor::new(store, JoinOptions::default().buffer_block(0));
    let plan = PlanOp::bgp(vec![TriplePattern::new(v("s"), c(1), v("o"))]);
    assert!(matches!(
        executor.execute(&plan, None),
        Err(TrieJoinError::Config(_))
    ));
    Ok(())
}
