//! Attribute order and index selection for one basic graph pattern.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::ast::{Term, TriplePattern, Var};
use crate::storage::Permutation;
use crate::types::{NodeId, Result, TrieJoinError, RECORD_COLUMNS};

/// Variable numbering of a basic graph pattern.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttributeOrder {
    /// Local variables: used upper variables, then shared own variables,
    /// then variables occurring in a single pattern.
    pub(crate) local: Vec<Var>,
    /// Global position of each local variable, strictly increasing.
    pub(crate) local_to_global: Vec<usize>,
    /// Upper variables followed by the new variables of this pattern.
    pub(crate) global: Vec<Var>,
    /// Number of local variables fixed by the enclosing context.
    pub(crate) base_level: usize,
    /// First local level that is not intersected.
    pub(crate) enumeration_level: usize,
    index: FxHashMap<Var, usize>,
}

impl AttributeOrder {
    pub(crate) fn compute(patterns: &[TriplePattern], upper: &[Var]) -> Result<Self> {
        let mut occurrences: FxHashMap<&Var, usize> = FxHashMap::default();
        let mut first_seen: Vec<&Var> = Vec::new();
        for pattern in patterns {
            let mut seen_here: FxHashSet<&Var> = FxHashSet::default();
            for var in pattern.vars() {
                if !seen_here.insert(var) {
                    return Err(TrieJoinError::UnsupportedFeature(
                        "variable repeated inside one triple pattern",
                    ));
                }
                let count = occurrences.entry(var).or_insert(0);
                if *count == 0 {
                    first_seen.push(var);
                }
                *count += 1;
            }
        }

        let upper_set: FxHashSet<&Var> = upper.iter().collect();
        let used_upper: Vec<&Var> = upper
            .iter()
            .filter(|var| occurrences.contains_key(var))
            .collect();
        let own_shared = shared_by_prefix(patterns, &first_seen, &upper_set);
        let own_single: Vec<&Var> = first_seen
            .iter()
            .copied()
            .filter(|var| !upper_set.contains(var) && occurrences[var] == 1)
            .collect();

        let mut order = AttributeOrder {
            global: upper.to_vec(),
            base_level: used_upper.len(),
            enumeration_level: used_upper.len() + own_shared.len(),
            ..AttributeOrder::default()
        };
        for var in used_upper {
            let global = upper
                .iter()
                .position(|candidate| candidate == var)
                .ok_or(TrieJoinError::Corruption("upper variable lost its position"))?;
            order.push_local(var, global);
        }
        for var in own_shared.into_iter().chain(own_single) {
            order.global.push(var.clone());
            let global = order.global.len() - 1;
            order.push_local(var, global);
        }
        Ok(order)
    }

    fn push_local(&mut self, var: &Var, global: usize) {
        self.index.insert(var.clone(), self.local.len());
        self.local.push(var.clone());
        self.local_to_global.push(global);
    }

    /// Local level of `var`.
    pub(crate) fn level_of(&self, var: &Var) -> Option<usize> {
        self.index.get(var).copied()
    }

    /// Number of local variables whose global position is below `pos`,
    /// i.e. the first local level at or after global position `pos`.
    pub(crate) fn global_to_local(&self, pos: usize) -> usize {
        self.local_to_global.partition_point(|&global| global < pos)
    }
}

/// Own variables shared by several patterns, ordered by the shortest
/// pattern prefix in which they occur twice. Ties keep first-seen order.
fn shared_by_prefix<'a>(
    patterns: &'a [TriplePattern],
    first_seen: &[&'a Var],
    upper: &FxHashSet<&Var>,
) -> Vec<&'a Var> {
    let mut shared: Vec<&Var> = Vec::new();
    let mut counts: FxHashMap<&Var, usize> = FxHashMap::default();
    for (i, pattern) in patterns.iter().enumerate() {
        for var in pattern.vars() {
            *counts.entry(var).or_insert(0) += 1;
        }
        if i == 0 {
            continue;
        }
        for &var in first_seen {
            if counts.get(var).is_some_and(|&count| count > 1)
                && !upper.contains(var)
                && !shared.contains(&var)
            {
                shared.push(var);
            }
        }
    }
    shared
}

/// Index choice for one triple pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PatternLayout {
    pub(crate) permutation: Permutation,
    /// Constants, stored in the leading key columns.
    pub(crate) constants: SmallVec<[NodeId; RECORD_COLUMNS]>,
    /// Local level of each variable key column, in column order.
    pub(crate) levels: SmallVec<[usize; RECORD_COLUMNS]>,
    /// Leading key columns that are constants or intersected variables.
    pub(crate) no_intersection_level: usize,
}

impl PatternLayout {
    /// Puts constants first (in subject, predicate, object order), then
    /// variables by local level.
    pub(crate) fn choose(pattern: &TriplePattern, order: &AttributeOrder) -> Result<Self> {
        let mut ranked: SmallVec<[(usize, usize, usize); RECORD_COLUMNS]> = SmallVec::new();
        for (position, term) in pattern.terms.iter().enumerate() {
            let rank = match term {
                Term::Node(_) => (0, position, position),
                Term::Var(var) => {
                    let level = order.level_of(var).ok_or(TrieJoinError::Corruption(
                        "pattern variable missing from attribute order",
                    ))?;
                    (1, level, position)
                }
            };
            ranked.push(rank);
        }
        ranked.sort_unstable();
        let columns = [ranked[0].2, ranked[1].2, ranked[2].2];
        let permutation = Permutation::from_columns(columns)
            .ok_or(TrieJoinError::Corruption("column order is not a permutation"))?;

        let mut constants = SmallVec::new();
        let mut levels = SmallVec::new();
        for &(kind, rank, position) in &ranked {
            match (&pattern.terms[position], kind) {
                (Term::Node(id), 0) => constants.push(*id),
                (Term::Var(_), 1) => levels.push(rank),
                _ => return Err(TrieJoinError::Corruption("inconsistent pattern ranking")),
            }
        }
        let intersected = levels
            .iter()
            .filter(|&&level| level < order.enumeration_level)
            .count();
        Ok(PatternLayout {
            permutation,
            no_intersection_level: constants.len() + intersected,
            constants,
            levels,
        })
    }

    /// Local levels enumerated from the buffered suffix.
    pub(crate) fn suffix_levels(&self) -> SmallVec<[usize; RECORD_COLUMNS]> {
        let intersected = self.no_intersection_level - self.constants.len();
        self.levels[intersected..].iter().copied().collect()
    }
}
