//! OPTIONAL and FILTER composition of join engines.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::ast::{PlanOp, Var};
use super::binding::Binding;
use super::filter::FilterPredicate;
use super::leapfrog::JoinEngine;
use super::options::{CacheOverflow, JoinOptions};
use super::stats::JoinStats;
use crate::storage::TripleStore;
use crate::types::{NodeId, Result, TrieJoinError};

/// Evaluation stage of a [`PlanNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Looking for the node's next own binding.
    Find,
    /// Enumerating combinations of cached child extensions.
    Extend,
}

/// Rows produced by one OPTIONAL child for the current parent binding.
struct ExtensionCache {
    rows: Vec<Binding>,
    pos: usize,
    capacity: usize,
    policy: CacheOverflow,
    warned: bool,
}

impl ExtensionCache {
    fn new(capacity: usize, policy: CacheOverflow) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            pos: 0,
            capacity,
            policy,
            warned: false,
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.pos = 0;
    }

    fn push(&mut self, row: Binding) -> Result<()> {
        if self.rows.len() >= self.capacity {
            match self.policy {
                CacheOverflow::Error => {
                    return Err(TrieJoinError::CacheOverflow {
                        capacity: self.capacity,
                    })
                }
                CacheOverflow::Grow if !self.warned => {
                    self.warned = true;
                    tracing::warn!(capacity = self.capacity, "plan.optional.cache_grow");
                }
                CacheOverflow::Grow => {}
            }
        }
        self.rows.push(row);
        Ok(())
    }

    fn current(&self) -> Option<&Binding> {
        self.rows.get(self.pos)
    }
}

struct OptionalSlot {
    node: PlanNode,
    cache: ExtensionCache,
}

/// A basic graph pattern with its filters and OPTIONAL children.
///
/// Each own binding that passes the filters is combined with every
/// element of the cross product of the children's extensions. A child
/// without extensions for that binding simply contributes nothing, so the
/// own binding is always emitted at least once.
pub struct PlanNode {
    engine: JoinEngine,
    filters: Vec<Box<dyn FilterPredicate>>,
    children: Vec<OptionalSlot>,
    options: JoinOptions,
    stage: Stage,
    upper_len: usize,
    global: Vec<Var>,
    context: Vec<NodeId>,
    own: Binding,
    previous_own: Option<Vec<NodeId>>,
    pending_change: usize,
    extended: Binding,
    active: SmallVec<[usize; 4]>,
    next_found: bool,
    at_end: bool,
}

impl PlanNode {
    /// Wraps `engine` in a node without filters or children.
    pub fn new(engine: JoinEngine, options: &JoinOptions) -> Self {
        Self {
            engine,
            filters: Vec::new(),
            children: Vec::new(),
            options: options.clone(),
            stage: Stage::Find,
            upper_len: 0,
            global: Vec::new(),
            context: Vec::new(),
            own: Binding::new(),
            previous_own: None,
            pending_change: usize::MAX,
            extended: Binding::new(),
            active: SmallVec::new(),
            next_found: false,
            at_end: true,
        }
    }

    /// Builds the node tree of `op`.
    ///
    /// An OPTIONAL becomes a child of its left side's node and a FILTER is
    /// attached to its input's node. Filters may only mention variables of
    /// that node's own patterns.
    pub fn build(
        op: &PlanOp,
        store: &Arc<TripleStore>,
        options: &JoinOptions,
        stats: &Arc<JoinStats>,
    ) -> Result<PlanNode> {
        match op {
            PlanOp::Bgp { patterns } => {
                let engine = JoinEngine::new(
                    patterns.clone(),
                    Arc::clone(store),
                    options,
                    Arc::clone(stats),
                );
                Ok(PlanNode::new(engine, options))
            }
            PlanOp::Filter { input, exprs } => {
                let mut node = PlanNode::build(input, store, options, stats)?;
                let own_vars: FxHashSet<&Var> = node.engine.pattern_vars().into_iter().collect();
                if exprs
                    .iter()
                    .flat_map(|expr| expr.vars())
                    .any(|var| !own_vars.contains(var))
                {
                    return Err(TrieJoinError::UnsupportedFeature(
                        "filter on variables outside its basic graph pattern",
                    ));
                }
                for expr in exprs {
                    node.filters.push(Box::new(expr.clone()));
                }
                Ok(node)
            }
            PlanOp::Optional { left, right } => {
                let mut node = PlanNode::build(left, store, options, stats)?;
                let child = PlanNode::build(right, store, options, stats)?;
                node.add_optional(child);
                Ok(node)
            }
        }
    }

    /// Attaches a filter evaluated against the node's own bindings.
    pub fn add_filter(&mut self, filter: Box<dyn FilterPredicate>) {
        self.filters.push(filter);
    }

    /// Attaches an OPTIONAL child.
    pub fn add_optional(&mut self, child: PlanNode) {
        let cache = ExtensionCache::new(
            self.options.optional_cache_capacity,
            self.options.cache_overflow,
        );
        self.children.push(OptionalSlot { node: child, cache });
    }

    /// Initializes the engine and then every child, threading the
    /// attribute order through them. Returns the extended order.
    pub fn init(&mut self, upper: &[Var]) -> Result<Vec<Var>> {
        let bound: FxHashSet<Var> = upper.iter().cloned().collect();
        self.init_with_bound(upper, &bound)
    }

    fn init_with_bound(&mut self, upper: &[Var], bound: &FxHashSet<Var>) -> Result<Vec<Var>> {
        let mut order = self.engine.init(upper)?;
        self.upper_len = upper.len();
        self.global = order.clone();
        self.engine.open_terms()?;

        let mut child_bound = bound.clone();
        child_bound.extend(self.engine.local_vars().iter().cloned());
        for slot in &mut self.children {
            let shares_sibling_var = {
                let upper_set: FxHashSet<&Var> = order.iter().collect();
                slot.node
                    .engine
                    .pattern_vars()
                    .into_iter()
                    .any(|var| upper_set.contains(var) && !child_bound.contains(var))
            };
            if shares_sibling_var {
                return Err(TrieJoinError::UnsupportedFeature(
                    "optional shares variables with a sibling optional",
                ));
            }
            order = slot.node.init_with_bound(&order, &child_bound)?;
            slot.cache.clear();
        }
        tracing::debug!(
            upper = upper.len(),
            vars = order.len(),
            children = self.children.len(),
            filters = self.filters.len(),
            "plan.node.init"
        );
        self.stage = Stage::Find;
        self.previous_own = None;
        self.pending_change = usize::MAX;
        self.next_found = false;
        self.at_end = true;
        Ok(order)
    }

    /// Re-targets this node at a new context binding; see
    /// [`JoinEngine::seek_binding`].
    pub fn seek_binding(&mut self, base: &[NodeId], first_changed: usize) -> Result<bool> {
        self.context.clear();
        self.context
            .extend_from_slice(&base[..self.upper_len.min(base.len())]);
        self.pending_change = self.pending_change.min(first_changed);
        self.stage = Stage::Find;
        self.next_found = false;
        let found = self.engine.seek_binding(base, first_changed)?;
        self.at_end = !found;
        Ok(found)
    }

    /// Returns `true` when a binding is ready for [`PlanNode::next`].
    pub fn has_next(&mut self) -> Result<bool> {
        if self.next_found {
            return Ok(true);
        }
        if self.at_end {
            return Ok(false);
        }
        loop {
            match self.stage {
                Stage::Find => {
                    if !self.engine.has_next()? {
                        self.at_end = true;
                        return Ok(false);
                    }
                    self.own = self.engine.binding();
                    if !self
                        .filters
                        .iter()
                        .all(|filter| filter.is_satisfied(&self.own))
                    {
                        continue;
                    }
                    self.extend_children()?;
                    if self.active.is_empty() {
                        self.extended = self.own.clone();
                    } else {
                        self.stage = Stage::Extend;
                        self.compose();
                    }
                    self.next_found = true;
                    return Ok(true);
                }
                Stage::Extend => {
                    if self.advance_odometer() {
                        self.compose();
                        self.next_found = true;
                        return Ok(true);
                    }
                    self.stage = Stage::Find;
                }
            }
        }
    }

    /// Takes the ready binding, if any.
    pub fn next(&mut self) -> Result<Option<Binding>> {
        if !self.has_next()? {
            return Ok(None);
        }
        self.next_found = false;
        Ok(Some(std::mem::take(&mut self.extended)))
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The node's join engine.
    pub fn engine(&self) -> &JoinEngine {
        &self.engine
    }

    /// Attribute order after this node's own variables.
    pub fn global_vars(&self) -> &[Var] {
        &self.global
    }

    /// Re-seeks every child against the new own binding and drains it.
    fn extend_children(&mut self) -> Result<()> {
        let dense = self.engine.current_binding().to_vec();
        let first_changed = self
            .engine
            .first_changed_var(self.previous_own.as_deref())
            .min(self.pending_change);
        self.pending_change = usize::MAX;
        self.active.clear();
        if !self.children.is_empty() {
            let mut base = self.context.clone();
            base.resize(self.global.len(), NodeId::MISSING);
            for (level, &global) in self.engine.local_to_global().iter().enumerate() {
                base[global] = dense[level];
            }
            for (idx, slot) in self.children.iter_mut().enumerate() {
                slot.cache.clear();
                let mut child_base = base.clone();
                child_base.resize(slot.node.upper_len, NodeId::MISSING);
                if slot.node.seek_binding(&child_base, first_changed)? {
                    while let Some(row) = slot.node.next()? {
                        slot.cache.push(row)?;
                    }
                }
                if !slot.cache.rows.is_empty() {
                    self.active.push(idx);
                }
            }
        }
        self.previous_own = Some(dense);
        Ok(())
    }

    /// Advances the first active child; on overflow rewinds it and carries
    /// into the next one. Returns `false` once every child overflowed.
    fn advance_odometer(&mut self) -> bool {
        for &idx in &self.active {
            let cache = &mut self.children[idx].cache;
            cache.pos += 1;
            if cache.pos < cache.rows.len() {
                return true;
            }
            cache.pos = 0;
        }
        false
    }

    fn compose(&mut self) {
        let mut row = self.own.clone();
        for &idx in &self.active {
            if let Some(extension) = self.children[idx].cache.current() {
                row.extend_missing(extension);
            }
        }
        self.extended = row;
    }
}
