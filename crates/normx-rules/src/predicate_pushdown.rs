//! # Predicate Pushdown Rule
//!
//! When a filter sits on top of an inner join, this rule merges the filter
//! predicate into the join condition, so the join evaluates it while matching
//! rows instead of in a separate pass afterward.
//!
//! ```text
//! Before: Select(InnerJoin(A, B, cond), pred)
//! After:  InnerJoin(A, B, And(cond, pred))
//! ```
//!
//! The merged condition is built through the factory, so `And(True, pred)`
//! collapses to `pred` and a condition that folds to `False` is visible to the
//! join's cardinality bounds.
//!
//! ## Cycle Detection
//!
//! The rule is tagged for cycle detection: a rule that pulls join conditions
//! back up into a filter may be registered alongside it, and the pair must not
//! rewrite each other's output forever.

use normx_core::expr::Op;
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, MemoExpr};
use normx_core::pattern::Pattern;
use normx_core::rule::NormRule;
use tracing::trace;

/// Push filter predicates into inner join conditions.
pub struct PushSelectIntoJoinRule;

impl NormRule for PushSelectIntoJoinRule {
    fn name(&self) -> &'static str {
        "PushSelectIntoJoin"
    }

    fn pattern(&self) -> Pattern {
        // Match: Select(InnerJoin(A, B, cond), pred)
        Pattern::select_join()
    }

    fn detect_cycles(&self) -> bool {
        true
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let children = f.memo().children(expr).to_vec();
        let (join, predicate) = (children[0], children[1]);
        let join_expr = *f.memo().normalized(join);
        debug_assert_eq!(join_expr.op, Op::InnerJoin);
        let join_children = f.memo().children(&join_expr).to_vec();

        trace!("Pushing filter {} into join {}", predicate, join);
        let on = f.construct_and(join_children[2], predicate);
        f.construct_inner_join(join_children[0], join_children[1], on)
    }
}
