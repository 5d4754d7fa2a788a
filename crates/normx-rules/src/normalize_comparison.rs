//! # Comparison Normalization
//!
//! Comparisons between a literal and a non-literal are normalized so the
//! literal is on the right: `5 < x` becomes `x > 5`. Rules further up only
//! need to look for `op(expr, const)`, and both spellings of the same predicate
//! share one group.

use normx_core::factory::Factory;
use normx_core::memo::{GroupId, Memo, MemoExpr};
use normx_core::pattern::{OpMatcher, Pattern};
use normx_core::rule::NormRule;

/// `op(const, x)` -> `commuted(op)(x, const)`.
pub struct CommuteConstComparisonRule;

impl NormRule for CommuteConstComparisonRule {
    fn name(&self) -> &'static str {
        "CommuteConstComparison"
    }

    fn pattern(&self) -> Pattern {
        Pattern::binary(OpMatcher::Comparison, Pattern::constant(), Pattern::Any)
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let right = memo.children(expr)[1];
        !memo.normalized(right).op.is_constant()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let children = f.memo().children(expr).to_vec();
        match expr.op.commuted() {
            Some(op) => f.construct_binary(op, children[1], children[0]),
            None => unreachable!("{:?} is not a comparison", expr.op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_metadata() {
        let rule = CommuteConstComparisonRule;
        assert_eq!(rule.name(), "CommuteConstComparison");
        assert!(!rule.detect_cycles());
    }
}
