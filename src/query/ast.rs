//! Operator tree handed to the join core.
//!
//! Plans are generic over the term representation: `PlanOp<String>` is the
//! textual form read from plan files, where `?name` denotes a variable and
//! every other string is a term for the node table. [`PlanOp::resolve`]
//! lowers it into `PlanOp<Term>` over node identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::NodeTable;
use crate::types::{NodeId, Result, TrieJoinError};

/// Identifier of a query variable.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(pub String);

impl Var {
    /// Creates a variable from its name (without the leading `?`).
    pub fn new(name: impl Into<String>) -> Self {
        Var(name.into())
    }

    /// Name of the variable.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Var {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// One slot of a triple pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Unbound slot.
    Var(Var),
    /// Constant resolved to a node identifier.
    Node(NodeId),
}

impl Term {
    /// Shorthand for a variable slot.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(Var::new(name))
    }

    /// Shorthand for a constant slot.
    pub fn node(id: u64) -> Self {
        Term::Node(NodeId(id))
    }

    /// Returns the variable if this slot is one.
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(var) => Some(var),
            Term::Node(_) => None,
        }
    }
}

/// Subject, predicate and object slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriplePattern<T = Term> {
    /// Slots in `(s, p, o)` order.
    pub terms: [T; 3],
}

impl<T> TriplePattern<T> {
    /// Creates a pattern from its three slots.
    pub fn new(subject: T, predicate: T, object: T) -> Self {
        Self {
            terms: [subject, predicate, object],
        }
    }

    fn try_map<U>(self, f: &mut impl FnMut(T) -> Result<U>) -> Result<TriplePattern<U>> {
        let [s, p, o] = self.terms;
        Ok(TriplePattern::new(f(s)?, f(p)?, f(o)?))
    }
}

impl TriplePattern<Term> {
    /// Variables of the pattern in `(s, p, o)` order.
    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.terms.iter().filter_map(Term::as_var)
    }
}

/// Filter expression over identifier bindings.
///
/// Comparisons order terms by node identifier. A comparison involving a
/// variable that is not bound is not satisfied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpr<T = Term> {
    /// `lhs = rhs`
    Eq {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// `lhs != rhs`
    Ne {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// `lhs < rhs`
    Lt {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// `lhs <= rhs`
    Le {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// `lhs > rhs`
    Gt {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// `lhs >= rhs`
    Ge {
        /// Left operand.
        lhs: T,
        /// Right operand.
        rhs: T,
    },
    /// Operand has a value.
    Bound {
        /// Tested operand.
        term: T,
    },
    /// Negation.
    Not {
        /// Negated expression.
        expr: Box<FilterExpr<T>>,
    },
    /// Conjunction; empty is true.
    And {
        /// Operands.
        exprs: Vec<FilterExpr<T>>,
    },
    /// Disjunction; empty is false.
    Or {
        /// Operands.
        exprs: Vec<FilterExpr<T>>,
    },
    /// Membership in a list of terms.
    In {
        /// Tested operand.
        term: T,
        /// Candidate values.
        values: Vec<T>,
    },
}

impl<T> FilterExpr<T> {
    fn try_map<U>(self, f: &mut impl FnMut(T) -> Result<U>) -> Result<FilterExpr<U>> {
        let mapped = match self {
            FilterExpr::Eq { lhs, rhs } => FilterExpr::Eq {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Ne { lhs, rhs } => FilterExpr::Ne {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Lt { lhs, rhs } => FilterExpr::Lt {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Le { lhs, rhs } => FilterExpr::Le {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Gt { lhs, rhs } => FilterExpr::Gt {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Ge { lhs, rhs } => FilterExpr::Ge {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            FilterExpr::Bound { term } => FilterExpr::Bound { term: f(term)? },
            FilterExpr::Not { expr } => FilterExpr::Not {
                expr: Box::new(expr.try_map(f)?),
            },
            FilterExpr::And { exprs } => FilterExpr::And {
                exprs: exprs
                    .into_iter()
                    .map(|expr| expr.try_map(f))
                    .collect::<Result<_>>()?,
            },
            FilterExpr::Or { exprs } => FilterExpr::Or {
                exprs: exprs
                    .into_iter()
                    .map(|expr| expr.try_map(f))
                    .collect::<Result<_>>()?,
            },
            FilterExpr::In { term, values } => FilterExpr::In {
                term: f(term)?,
                values: values.into_iter().map(&mut *f).collect::<Result<_>>()?,
            },
        };
        Ok(mapped)
    }
}

impl FilterExpr<Term> {
    /// Every variable the expression mentions.
    pub fn vars(&self) -> Vec<&Var> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a Var>) {
        match self {
            FilterExpr::Eq { lhs, rhs }
            | FilterExpr::Ne { lhs, rhs }
            | FilterExpr::Lt { lhs, rhs }
            | FilterExpr::Le { lhs, rhs }
            | FilterExpr::Gt { lhs, rhs }
            | FilterExpr::Ge { lhs, rhs } => {
                out.extend(lhs.as_var());
                out.extend(rhs.as_var());
            }
            FilterExpr::Bound { term } => out.extend(term.as_var()),
            FilterExpr::Not { expr } => expr.collect_vars(out),
            FilterExpr::And { exprs } | FilterExpr::Or { exprs } => {
                for expr in exprs {
                    expr.collect_vars(out);
                }
            }
            FilterExpr::In { term, values } => {
                out.extend(term.as_var());
                out.extend(values.iter().filter_map(Term::as_var));
            }
        }
    }
}

/// Operator tree evaluated by the join core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp<T = Term> {
    /// Basic graph pattern: a conjunction of triple patterns.
    Bgp {
        /// Triple patterns, joined in the given order.
        patterns: Vec<TriplePattern<T>>,
    },
    /// Keeps the rows of `input` that satisfy every expression.
    Filter {
        /// Filtered operator.
        input: Box<PlanOp<T>>,
        /// Conjunctive filter expressions.
        exprs: Vec<FilterExpr<T>>,
    },
    /// Left outer extension of `left` by `right`.
    Optional {
        /// Mandatory side.
        left: Box<PlanOp<T>>,
        /// Optional extension.
        right: Box<PlanOp<T>>,
    },
}

impl PlanOp<Term> {
    /// Basic graph pattern over `patterns`.
    pub fn bgp(patterns: Vec<TriplePattern>) -> Self {
        PlanOp::Bgp { patterns }
    }

    /// Wraps `self` in a filter.
    pub fn filter(self, exprs: Vec<FilterExpr>) -> Self {
        PlanOp::Filter {
            input: Box::new(self),
            exprs,
        }
    }

    /// Extends `self` with an OPTIONAL `right` side.
    pub fn optional(self, right: PlanOp) -> Self {
        PlanOp::Optional {
            left: Box::new(self),
            right: Box::new(right),
        }
    }
}

impl<T> PlanOp<T> {
    fn try_map<U>(self, f: &mut impl FnMut(T) -> Result<U>) -> Result<PlanOp<U>> {
        let mapped = match self {
            PlanOp::Bgp { patterns } => PlanOp::Bgp {
                patterns: patterns
                    .into_iter()
                    .map(|pattern| pattern.try_map(f))
                    .collect::<Result<_>>()?,
            },
            PlanOp::Filter { input, exprs } => PlanOp::Filter {
                input: Box::new(input.try_map(f)?),
                exprs: exprs
                    .into_iter()
                    .map(|expr| expr.try_map(f))
                    .collect::<Result<_>>()?,
            },
            PlanOp::Optional { left, right } => PlanOp::Optional {
                left: Box::new(left.try_map(f)?),
                right: Box::new(right.try_map(f)?),
            },
        };
        Ok(mapped)
    }
}

impl<S: AsRef<str>> PlanOp<S> {
    /// Resolves textual terms through `table`.
    ///
    /// Terms unknown to the table become [`NodeId::MISSING`], which makes
    /// the owning pattern empty instead of failing the query.
    pub fn resolve(self, table: &dyn NodeTable) -> Result<PlanOp<Term>> {
        self.try_map(&mut |term: S| parse_term(term.as_ref(), table))
    }
}

fn parse_term(text: &str, table: &dyn NodeTable) -> Result<Term> {
    match text.strip_prefix('?') {
        Some("") => Err(TrieJoinError::Invalid("empty variable name".into())),
        Some(name) => Ok(Term::var(name)),
        None => Ok(Term::Node(table.resolve(text))),
    }
}
