//! # Projection Elimination
//!
//! A `Project` that computes nothing and forwards every input column is the
//! identity and is replaced by its input.

use normx_core::expr::{Op, OpDef, Private};
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, Memo, MemoExpr};
use normx_core::pattern::{OpMatcher, Pattern};
use normx_core::rule::NormRule;

/// `Project(x, Projections[] passthrough=cols(x))` -> `x`.
pub struct EliminateProjectRule;

impl NormRule for EliminateProjectRule {
    fn name(&self) -> &'static str {
        "EliminateProject"
    }

    fn pattern(&self) -> Pattern {
        // An empty projection list is a leaf.
        Pattern::Operator(
            OpMatcher::Op(Op::Project),
            vec![Pattern::Any, Pattern::leaf(Op::Projections)],
        )
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let children = memo.children(expr);
        let Some(input) = memo.relational(children[0]) else {
            return false;
        };
        match memo.normalized(children[1]).private {
            Private::Def(d) => match memo.def(d) {
                OpDef::Projections(def) => *memo.col_set(def.passthrough) == input.output_cols,
                _ => false,
            },
            _ => false,
        }
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
        let rule = EliminateProjectRule;
        assert_eq!(rule.name(), "EliminateProject");
        assert_eq!(rule.pattern().root_ops(), vec![Op::Project]);
    }
}
