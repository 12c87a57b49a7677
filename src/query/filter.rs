use std::cmp::Ordering;

use super::ast::{FilterExpr, Term};
use super::binding::Binding;
use crate::types::NodeId;

/// Boolean test applied to the bindings of a plan node.
pub trait FilterPredicate: Send {
    /// Returns `true` when `binding` passes the filter.
    fn is_satisfied(&self, binding: &Binding) -> bool;
}

impl<F> FilterPredicate for F
where
    F: Fn(&Binding) -> bool + Send,
{
    fn is_satisfied(&self, binding: &Binding) -> bool {
        self(binding)
    }
}

impl FilterPredicate for FilterExpr<Term> {
    fn is_satisfied(&self, binding: &Binding) -> bool {
        match self {
            FilterExpr::Eq { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_eq),
            FilterExpr::Ne { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_ne),
            FilterExpr::Lt { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_lt),
            FilterExpr::Le { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_le),
            FilterExpr::Gt { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_gt),
            FilterExpr::Ge { lhs, rhs } => compare(binding, lhs, rhs, Ordering::is_ge),
            FilterExpr::Bound { term } => value(binding, term).is_some(),
            FilterExpr::Not { expr } => !expr.is_satisfied(binding),
            FilterExpr::And { exprs } => exprs.iter().all(|expr| expr.is_satisfied(binding)),
            FilterExpr::Or { exprs } => exprs.iter().any(|expr| expr.is_satisfied(binding)),
            FilterExpr::In { term, values } => match value(binding, term) {
                Some(needle) => values
                    .iter()
                    .any(|candidate| value(binding, candidate) == Some(needle)),
                None => false,
            },
        }
    }
}

fn value(binding: &Binding, term: &Term) -> Option<NodeId> {
    match term {
        Term::Var(var) => binding.get(var.name()),
        Term::Node(id) => Some(*id),
    }
}

fn compare(binding: &Binding, lhs: &Term, rhs: &Term, accept: fn(Ordering) -> bool) -> bool {
    match (value(binding, lhs), value(binding, rhs)) {
        (Some(l), Some(r)) => accept(l.cmp(&r)),
        _ => false,
    }
}
