//! # Boolean Simplification
//!
//! Removes boolean literals and redundant operators from predicates:
//!
//! ```text
//! Not(True) -> False        And(True, x) -> x       Or(False, x) -> x
//! Not(Not(x)) -> x          And(False, x) -> False  Or(True, x) -> True
//! Not(a < b) -> a >= b      And(x, x) -> x          Or(x, x) -> x
//! ```
//!
//! Negating a comparison is exact under three-valued logic: both sides are
//! NULL when an operand is NULL. `And`/`Or` with a NULL operand are left
//! alone, because their result depends on the other operand.

use normx_core::expr::{DataType, Op};
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, Memo, MemoExpr};
use normx_core::pattern::Pattern;
use normx_core::rule::NormRule;

/// The comparison that is true exactly when `op` is false.
fn negated(op: Op) -> Option<Op> {
    match op {
        Op::Eq => Some(Op::Ne),
        Op::Ne => Some(Op::Eq),
        Op::Lt => Some(Op::Ge),
        Op::Le => Some(Op::Gt),
        Op::Gt => Some(Op::Le),
        Op::Ge => Some(Op::Lt),
        _ => None,
    }
}

pub struct SimplifyNotRule;

impl NormRule for SimplifyNotRule {
    fn name(&self) -> &'static str {
        "SimplifyNot"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Op::Not)
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let input = memo.normalized(memo.children(expr)[0]).op;
        matches!(input, Op::True | Op::False | Op::Null | Op::Not) || negated(input).is_some()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let input = f.memo().children(expr)[0];
        let inner = *f.memo().normalized(input);
        match inner.op {
            Op::True => f.construct_false(),
            Op::False => f.construct_true(),
            Op::Null => f.construct_null(DataType::Bool),
            Op::Not => f.memo().children(&inner)[0],
            op => {
                let operands = f.memo().children(&inner).to_vec();
                match negated(op) {
                    Some(negated) => f.construct_binary(negated, operands[0], operands[1]),
                    None => unreachable!("SimplifyNot replaced Not({:?})", op),
                }
            }
        }
    }
}

/// Shared simplification of `And` and `Or`.
///
/// `identity` is the literal that can be dropped (`True` for `And`),
/// `absorbing` the literal that decides the result (`False` for `And`).
fn simplify_binary(memo: &Memo, expr: &MemoExpr, identity: Op, absorbing: Op) -> Option<GroupId> {
    let children = memo.children(expr);
    let (left, right) = (children[0], children[1]);
    let (l, r) = (memo.normalized(left).op, memo.normalized(right).op);
    if l == absorbing {
        Some(left)
    } else if r == absorbing {
        Some(right)
    } else if l == identity {
        Some(right)
    } else if r == identity || left == right {
        Some(left)
    } else {
        None
    }
}

pub struct SimplifyAndRule;

impl NormRule for SimplifyAndRule {
    fn name(&self) -> &'static str {
        "SimplifyAnd"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Op::And)
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        simplify_binary(memo, expr, Op::True, Op::False).is_some()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        match simplify_binary(f.memo(), expr, Op::True, Op::False) {
            Some(group) => group,
            None => unreachable!("SimplifyAnd replaced an expression it did not match"),
        }
    }
}

pub struct SimplifyOrRule;

impl NormRule for SimplifyOrRule {
    fn name(&self) -> &'static str {
        "SimplifyOr"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Op::Or)
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        simplify_binary(memo, expr, Op::False, Op::True).is_some()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        match simplify_binary(f.memo(), expr, Op::False, Op::True) {
            Some(group) => group,
            None => unreachable!("SimplifyOr replaced an expression it did not match"),
        }
    }
}
