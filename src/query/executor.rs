use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ast::PlanOp;
use super::binding::Binding;
use super::options::JoinOptions;
use super::plan::PlanNode;
use super::stats::{JoinStats, JoinStatsSnapshot};
use crate::storage::{NodeTable, TripleStore};
use crate::types::{Result, TrieJoinError};

/// Runs plans against a shared [`TripleStore`].
pub struct Executor {
    store: Arc<TripleStore>,
    options: JoinOptions,
}

impl Executor {
    /// Creates an executor with the given join options.
    pub fn new(store: Arc<TripleStore>, options: JoinOptions) -> Self {
        Self { store, options }
    }

    /// Store the executor reads from.
    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }

    /// Builds and initializes the node tree of `plan` and returns a
    /// streaming iterator over its bindings.
    pub fn stream(&self, plan: &PlanOp) -> Result<ResultStream> {
        self.stream_with_token(plan, None)
    }

    /// Same as [`Executor::stream`], checking `cancel` before every row.
    pub fn stream_with_token(
        &self,
        plan: &PlanOp,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<ResultStream> {
        let stats = Arc::new(JoinStats::default());
        let mut root = PlanNode::build(plan, &self.store, &self.options, &stats)?;
        let vars = root.init(&[])?;
        root.seek_binding(&[], 0)?;
        tracing::debug!(vars = vars.len(), "query.stream.start");
        Ok(ResultStream {
            root,
            stats,
            cancel_token: cancel,
            rows: 0,
            finished: false,
        })
    }

    /// Executes `plan` and materializes every binding.
    pub fn execute(&self, plan: &PlanOp, cancel: Option<Arc<AtomicBool>>) -> Result<Vec<Binding>> {
        self.stream_with_token(plan, cancel)?.collect()
    }
}

/// Lazy, finite, non-restartable stream of bindings.
pub struct ResultStream {
    root: PlanNode,
    stats: Arc<JoinStats>,
    cancel_token: Option<Arc<AtomicBool>>,
    rows: u64,
    finished: bool,
}

impl ResultStream {
    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel_token {
            if flag.load(Ordering::SeqCst) {
                return Err(TrieJoinError::Cancelled);
            }
        }
        Ok(())
    }

    /// Join counters accumulated so far.
    pub fn stats(&self) -> JoinStatsSnapshot {
        self.stats.snapshot()
    }

    /// Maps every binding to term strings through `table`.
    pub fn with_terms<'t, T>(
        self,
        table: &'t T,
    ) -> impl Iterator<Item = Result<BTreeMap<String, String>>> + 't
    where
        T: NodeTable + ?Sized,
    {
        self.map(move |binding| {
            let binding = binding?;
            binding
                .iter()
                .map(|(var, id)| {
                    let term = table
                        .term(*id)
                        .ok_or_else(|| TrieJoinError::Invalid(format!("unknown node id {id}")))?;
                    Ok((var.name().to_owned(), term.to_owned()))
                })
                .collect()
        })
    }
}

impl Iterator for ResultStream {
    type Item = Result<Binding>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Err(err) = self.check_cancel() {
            self.finished = true;
            return Some(Err(err));
        }
        match self.root.next() {
            Ok(Some(binding)) => {
                self.rows += 1;
                Some(Ok(binding))
            }
            Ok(None) => {
                self.finished = true;
                tracing::debug!(rows = self.rows, "query.stream.done");
                self.stats.emit_tracing();
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
