//! # Limit Elimination
//!
//! A `Limit` whose input can never produce more rows than the limit is the
//! identity. The input's upper cardinality bound comes from its logical
//! properties, e.g. a `Values` list or a filter that folded to `False`.

use normx_core::expr::{Op, ScalarValue};
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, Memo, MemoExpr};
use normx_core::pattern::{OpMatcher, Pattern};
use normx_core::rule::NormRule;

/// `Limit(x, n)` -> `x` when `x` has at most `n` rows.
pub struct EliminateLimitRule;

impl NormRule for EliminateLimitRule {
    fn name(&self) -> &'static str {
        "EliminateLimit"
    }

    fn pattern(&self) -> Pattern {
        Pattern::Operator(
            OpMatcher::Op(Op::Limit),
            vec![Pattern::Any, Pattern::leaf(Op::Const)],
        )
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let children = memo.children(expr);
        let Some(ScalarValue::Int64(limit)) = memo.const_value(children[1]) else {
            return false;
        };
        let max_rows = memo.relational(children[0]).and_then(|p| p.cardinality.max);
        matches!(max_rows, Some(max) if limit >= 0 && max <= limit as u64)
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        f.memo().children(expr)[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_metadata() {
        let rule = EliminateLimitRule;
        assert_eq!(rule.name(), "EliminateLimit");
        assert_eq!(rule.pattern().root_ops(), vec![Op::Limit]);
    }
}
