//! # Declarative Pattern Matching for Normalization Rules
//!
//! Each normalization rule declares a `Pattern` describing the shape of
//! expressions it can rewrite. The factory checks the pattern before asking the
//! rule for its custom match, so rules never see expressions of the wrong shape.
//! The root of a rule's pattern also decides which operators the rule is
//! registered for.
//!
//! ## Pattern Language
//!
//! - `Pattern::Operator(matcher, children)`: matches an expression whose
//!   operator satisfies `matcher` and whose children match the child patterns
//!   position by position.
//! - `Pattern::Any`: matches any child group.
//! - `Pattern::Leaf`: matches only expressions without children.
//!
//! ## Group-Level Matching
//!
//! Child patterns are matched against the *canonical* member of the child
//! group. Normalization runs bottom-up, so children are already normalized and
//! their canonical member is the shape a rule should reason about.

use crate::expr::Op;
use crate::memo::{GroupId, Memo, MemoExpr};

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Match an operator with child patterns.
    Operator(OpMatcher, Vec<Pattern>),
    /// Match any child group.
    Any,
    /// Match an expression with no children.
    Leaf,
}

/// Matcher for operator tags.
#[derive(Debug, Clone)]
pub enum OpMatcher {
    Op(Op),
    OneOf(Vec<Op>),
    /// `Const`, `Null`, `True`, or `False`.
    Constant,
    Comparison,
    Arithmetic,
}

impl OpMatcher {
    pub fn matches(&self, op: Op) -> bool {
        match self {
            OpMatcher::Op(o) => *o == op,
            OpMatcher::OneOf(ops) => ops.contains(&op),
            OpMatcher::Constant => op.is_constant(),
            OpMatcher::Comparison => op.is_comparison(),
            OpMatcher::Arithmetic => op.is_arithmetic(),
        }
    }

    /// All operators this matcher accepts, in `Op::ALL` order.
    pub fn ops(&self) -> Vec<Op> {
        Op::ALL.iter().copied().filter(|op| self.matches(*op)).collect()
    }
}

impl Pattern {
    /// Match `op` with any children of the operator's arity.
    pub fn op(op: Op) -> Self {
        let arity = op.arity().unwrap_or(0);
        Pattern::Operator(OpMatcher::Op(op), vec![Pattern::Any; arity])
    }

    /// Match a binary operator selected by `matcher` over the given operands.
    pub fn binary(matcher: OpMatcher, left: Pattern, right: Pattern) -> Self {
        Pattern::Operator(matcher, vec![left, right])
    }

    /// Match any literal constant.
    pub fn constant() -> Self {
        Pattern::Operator(OpMatcher::Constant, vec![])
    }

    /// Match a specific leaf operator such as `True`.
    pub fn leaf(op: Op) -> Self {
        Pattern::Operator(OpMatcher::Op(op), vec![])
    }

    /// Match a `Select` whose input is a `Select`.
    pub fn select_select() -> Self {
        Pattern::Operator(
            OpMatcher::Op(Op::Select),
            vec![Pattern::op(Op::Select), Pattern::Any],
        )
    }

    /// Match a `Select` on top of an inner join.
    pub fn select_join() -> Self {
        Pattern::Operator(
            OpMatcher::Op(Op::Select),
            vec![Pattern::op(Op::InnerJoin), Pattern::Any],
        )
    }

    /// Operators a pattern can match at its root.
    pub fn root_ops(&self) -> Vec<Op> {
        match self {
            Pattern::Operator(matcher, _) => matcher.ops(),
            Pattern::Any => Op::ALL.to_vec(),
            Pattern::Leaf => Op::ALL
                .iter()
                .copied()
                .filter(|op| op.arity() == Some(0))
                .collect(),
        }
    }
}

/// Check whether an expression (memoized or not) matches a pattern.
pub fn matches(memo: &Memo, expr: &MemoExpr, pattern: &Pattern) -> bool {
    let children = memo.children(expr);
    match pattern {
        Pattern::Any => true,
        Pattern::Leaf => children.is_empty(),
        Pattern::Operator(matcher, child_patterns) => {
            if !matcher.matches(expr.op) {
                return false;
            }
            if children.len() != child_patterns.len() {
                return false;
            }
            children
                .iter()
                .zip(child_patterns.iter())
                .all(|(child, child_pattern)| matches_group(memo, *child, child_pattern))
        }
    }
}

/// Check a child pattern against the canonical member of a group.
pub fn matches_group(memo: &Memo, group: GroupId, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Any => true,
        _ => matches(memo, memo.normalized(group), pattern),
    }
}
