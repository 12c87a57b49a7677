//! Multiway leapfrog join over the cursors of one basic graph pattern.

use std::sync::Arc;

use smallvec::SmallVec;

use super::ast::{TriplePattern, Var};
use super::binding::Binding;
use super::options::JoinOptions;
use super::order::{AttributeOrder, PatternLayout};
use super::stats::JoinStats;
use super::trie::TrieCursor;
use crate::storage::TripleStore;
use crate::types::{NodeId, Result, TrieJoinError};

type CursorGroup = SmallVec<[usize; 4]>;

/// Leapfrog triejoin over the triple patterns of a basic graph pattern.
///
/// Levels below `enumeration_level` bind variables shared by several
/// patterns (or fixed by the context) through leapfrog intersection. The
/// remaining levels belong to exactly one pattern each and are enumerated
/// as a cross product of the buffered suffixes.
pub struct JoinEngine {
    patterns: Vec<TriplePattern>,
    store: Arc<TripleStore>,
    options: JoinOptions,
    stats: Arc<JoinStats>,
    order: AttributeOrder,
    cursors: Vec<TrieCursor>,
    constants: Vec<SmallVec<[NodeId; 3]>>,
    level_groups: Vec<CursorGroup>,
    cyclic: Vec<usize>,
    enumerating: CursorGroup,
    binding: Vec<NodeId>,
    level: isize,
    before_first: bool,
    before_first_enumeration: bool,
    done: bool,
    terms_missing: bool,
}

impl JoinEngine {
    /// Creates an engine over `patterns`; call [`JoinEngine::init`] next.
    pub fn new(
        patterns: Vec<TriplePattern>,
        store: Arc<TripleStore>,
        options: &JoinOptions,
        stats: Arc<JoinStats>,
    ) -> Self {
        Self {
            patterns,
            store,
            options: options.clone(),
            stats,
            order: AttributeOrder::default(),
            cursors: Vec::new(),
            constants: Vec::new(),
            level_groups: Vec::new(),
            cyclic: Vec::new(),
            enumerating: CursorGroup::new(),
            binding: Vec::new(),
            level: -1,
            before_first: false,
            before_first_enumeration: false,
            done: true,
            terms_missing: false,
        }
    }

    /// Numbers the variables, picks one index per pattern and builds the
    /// cursors. Returns `upper` extended with this pattern's own variables.
    pub fn init(&mut self, upper: &[Var]) -> Result<Vec<Var>> {
        self.options.validate()?;
        let order = AttributeOrder::compute(&self.patterns, upper)?;
        let mut cursors = Vec::with_capacity(self.patterns.len());
        let mut constants = Vec::with_capacity(self.patterns.len());
        let mut level_groups = vec![CursorGroup::new(); order.enumeration_level];
        let mut enumerating = CursorGroup::new();
        for (idx, pattern) in self.patterns.iter().enumerate() {
            let layout = PatternLayout::choose(pattern, &order)?;
            for &level in &layout.levels {
                if level < order.enumeration_level {
                    level_groups[level].push(idx);
                }
            }
            if layout.no_intersection_level < 3 {
                enumerating.push(idx);
            }
            tracing::trace!(
                target: "triejoin::join::layout",
                pattern = idx,
                permutation = %layout.permutation,
                no_intersection_level = layout.no_intersection_level,
                "chose index for pattern"
            );
            cursors.push(TrieCursor::new(
                self.store.index(layout.permutation).clone(),
                layout.permutation,
                layout.no_intersection_level,
                layout.suffix_levels(),
                self.options.buffer_block,
                Arc::clone(&self.stats),
            ));
            constants.push(layout.constants);
        }
        if level_groups.iter().any(|group| group.is_empty()) {
            return Err(TrieJoinError::Corruption("intersected level without cursors"));
        }
        tracing::debug!(
            patterns = self.patterns.len(),
            locals = order.local.len(),
            base_level = order.base_level,
            enumeration_level = order.enumeration_level,
            "join.engine.init"
        );
        self.binding = vec![NodeId::MIN; order.local.len()];
        self.cyclic = vec![0; order.enumeration_level];
        self.cursors = cursors;
        self.constants = constants;
        self.level_groups = level_groups;
        self.enumerating = enumerating;
        self.level = -1;
        self.done = true;
        self.terms_missing = false;
        let global = order.global.clone();
        self.order = order;
        Ok(global)
    }

    /// Positions every cursor on its constant columns. Returns `false` as
    /// soon as one constant does not occur, which makes the whole pattern
    /// empty.
    pub fn open_terms(&mut self) -> Result<bool> {
        for (idx, cursor) in self.cursors.iter_mut().enumerate() {
            for &constant in &self.constants[idx] {
                cursor.open()?;
                if !cursor.at_end() && cursor.key() < constant {
                    cursor.seek(constant)?;
                }
                if cursor.at_end() || cursor.key() != constant {
                    tracing::debug!(pattern = idx, constant = constant.0, "join.engine.constant_absent");
                    self.terms_missing = true;
                    self.done = true;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Returns `true` once [`JoinEngine::open_terms`] found an absent
    /// constant.
    pub fn terms_missing(&self) -> bool {
        self.terms_missing
    }

    /// Enters the next level.
    ///
    /// Below the enumeration level the level's cursors are opened and
    /// sorted ascending by key. At the enumeration level buffered scans are
    /// started on every cursor with a non-empty suffix.
    pub fn open(&mut self) -> Result<()> {
        let next = self.level + 1;
        if next < 0 || next as usize > self.order.enumeration_level {
            return Err(TrieJoinError::Invalid(format!(
                "open past enumeration level {}",
                self.order.enumeration_level
            )));
        }
        self.level = next;
        let level = next as usize;
        if level < self.order.enumeration_level {
            for &idx in &self.level_groups[level] {
                self.cursors[idx].open()?;
            }
            let cursors = &self.cursors;
            insertion_sort_by_key(&mut self.level_groups[level], |idx| cursors[idx].key());
            self.cyclic[level] = 0;
            self.before_first = true;
        } else {
            for &idx in &self.enumerating {
                self.cursors[idx].start_no_intersection()?;
            }
            let cursors = &self.cursors;
            if self.options.ordered_enumeration {
                self.enumerating
                    .sort_by_key(|&idx| std::cmp::Reverse(cursors[idx].first_suffix_level()));
            } else {
                self.enumerating.sort_by_key(|&idx| cursors[idx].buffer_size());
            }
            self.before_first_enumeration = true;
        }
        Ok(())
    }

    /// Leaves the current level.
    pub fn up(&mut self) -> Result<()> {
        if self.level < 0 {
            return Err(TrieJoinError::Invalid("up above the first level".into()));
        }
        let level = self.level as usize;
        if level < self.order.enumeration_level {
            for &idx in &self.level_groups[level] {
                self.cursors[idx].up()?;
            }
        } else {
            for &idx in &self.enumerating {
                self.cursors[idx].end_no_intersection();
            }
        }
        self.level -= 1;
        Ok(())
    }

    /// Leapfrog search for the next key shared by every cursor of `level`.
    fn find_intersection(&mut self, level: usize) -> Result<bool> {
        let group = &self.level_groups[level];
        let width = group.len();
        if width == 0 {
            return Err(TrieJoinError::Corruption("intersected level without cursors"));
        }
        if self.before_first {
            self.before_first = false;
            if group.iter().any(|&idx| self.cursors[idx].at_end()) {
                return Ok(false);
            }
            self.cyclic[level] = 0;
        } else {
            let p = self.cyclic[level];
            let cursor = &mut self.cursors[group[p]];
            cursor.next()?;
            if cursor.at_end() {
                return Ok(false);
            }
            self.cyclic[level] = (p + 1) % width;
        }

        let mut p = self.cyclic[level];
        let mut max = self.cursors[group[(p + width - 1) % width]].key();
        loop {
            let cursor = &mut self.cursors[group[p]];
            let key = cursor.key();
            if key == max {
                self.cyclic[level] = p;
                self.binding[level] = key;
                self.stats.inc_intersections();
                return Ok(true);
            }
            cursor.seek(max)?;
            if cursor.at_end() {
                self.cyclic[level] = p;
                return Ok(false);
            }
            max = cursor.key();
            p = (p + 1) % width;
        }
    }

    /// Steps the buffered cross product like an odometer. The first
    /// enumerating cursor is the fastest digit.
    fn enumerate(&mut self) -> Result<bool> {
        if self.before_first_enumeration {
            self.before_first_enumeration = false;
            if self
                .enumerating
                .iter()
                .any(|&idx| self.cursors[idx].buffer_size() == 0)
            {
                return Ok(false);
            }
            for &idx in &self.enumerating {
                self.cursors[idx].reset_buffer(&mut self.binding);
            }
            return Ok(true);
        }
        for digit in 0..self.enumerating.len() {
            let idx = self.enumerating[digit];
            let cursor = &mut self.cursors[idx];
            let advanced = if cursor.has_next_in_buffer() {
                cursor.next_in_buffer(&mut self.binding);
                true
            } else if cursor.has_next_buffer()? {
                cursor.next_buffer(&mut self.binding)?;
                true
            } else {
                false
            };
            if advanced {
                for &lower in &self.enumerating[..digit] {
                    self.cursors[lower].reset_all(&mut self.binding)?;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Advances to the next full binding. Once this returns `false` it
    /// keeps doing so until the next [`JoinEngine::seek_binding`].
    pub fn has_next(&mut self) -> Result<bool> {
        if self.done || self.level < 0 {
            return Ok(false);
        }
        loop {
            let level = self.level as usize;
            if level >= self.order.enumeration_level {
                if self.enumerate()? {
                    return Ok(true);
                }
            } else if self.find_intersection(level)? {
                self.open()?;
                continue;
            }
            if level <= self.order.base_level {
                self.done = true;
                return Ok(false);
            }
            self.stats.inc_backtracks();
            self.up()?;
        }
    }

    /// Re-targets the engine at a new context binding.
    ///
    /// `base` holds the context by global position and `first_changed` is
    /// the first global position whose value differs from the previous
    /// context. Levels below it are kept; the remaining context levels are
    /// re-established by point lookups. Returns `false` when a lookup
    /// fails, in which case [`JoinEngine::has_next`] reports nothing.
    pub fn seek_binding(&mut self, base: &[NodeId], first_changed: usize) -> Result<bool> {
        if self.terms_missing {
            self.done = true;
            return Ok(false);
        }
        let reset = self
            .order
            .global_to_local(first_changed)
            .min(self.order.base_level) as isize;
        while self.level >= reset {
            self.up()?;
        }
        self.done = false;
        while ((self.level + 1) as usize) < self.order.base_level {
            let level = (self.level + 1) as usize;
            let value = *base
                .get(self.order.local_to_global[level])
                .ok_or_else(|| TrieJoinError::Invalid("context binding too short".into()))?;
            if !self.try_open_and_seek(level, value)? {
                self.up()?;
                self.done = true;
                return Ok(false);
            }
        }
        self.open()?;
        Ok(true)
    }

    /// Opens `level` and positions all of its cursors on `value`.
    fn try_open_and_seek(&mut self, level: usize, value: NodeId) -> Result<bool> {
        self.level = level as isize;
        for &idx in &self.level_groups[level] {
            self.cursors[idx].open()?;
        }
        let mut found = true;
        for &idx in &self.level_groups[level] {
            let cursor = &mut self.cursors[idx];
            if !cursor.at_end() && cursor.key() < value {
                cursor.seek(value)?;
            }
            if cursor.at_end() || cursor.key() != value {
                found = false;
                break;
            }
        }
        if found {
            self.binding[level] = value;
        }
        Ok(found)
    }

    /// Global position of the first local variable whose value differs
    /// from `previous` (a dense binding from [`JoinEngine::current_binding`]).
    pub fn first_changed_var(&self, previous: Option<&[NodeId]>) -> usize {
        let Some(previous) = previous else {
            return self.order.local_to_global.first().copied().unwrap_or(0);
        };
        self.binding
            .iter()
            .zip(previous)
            .position(|(current, prev)| current != prev)
            .map_or(self.order.global.len(), |level| {
                self.order.local_to_global[level]
            })
    }

    /// Current binding, indexed by local level.
    pub fn current_binding(&self) -> &[NodeId] {
        &self.binding
    }

    /// Current binding keyed by variable.
    pub fn binding(&self) -> Binding {
        self.order
            .local
            .iter()
            .cloned()
            .zip(self.binding.iter().copied())
            .collect()
    }

    /// Local variables in level order.
    pub fn local_vars(&self) -> &[Var] {
        &self.order.local
    }

    /// Global position of each local variable.
    pub fn local_to_global(&self) -> &[usize] {
        &self.order.local_to_global
    }

    /// Number of local levels fixed by the context.
    pub fn base_level(&self) -> usize {
        self.order.base_level
    }

    /// First level enumerated from buffered suffixes.
    pub fn enumeration_level(&self) -> usize {
        self.order.enumeration_level
    }

    /// Current level, `-1` when nothing is open.
    pub fn level(&self) -> isize {
        self.level
    }

    /// Variables of every pattern, in first-appearance order.
    pub fn pattern_vars(&self) -> Vec<&Var> {
        let mut vars: Vec<&Var> = Vec::new();
        for var in self.patterns.iter().flat_map(|pattern| pattern.vars()) {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        vars
    }
}

fn insertion_sort_by_key<K: Ord>(group: &mut [usize], key: impl Fn(usize) -> K) {
    for i in 1..group.len() {
        let mut j = i;
        while j > 0 && key(group[j - 1]) > key(group[j]) {
            group.swap(j - 1, j);
            j -= 1;
        }
    }
}
