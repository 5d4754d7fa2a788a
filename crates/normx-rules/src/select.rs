//! # Filter Simplification
//!
//! Rules over `Select` whose filter is already normalized:
//!
//! - **`EliminateSelectRule`**: a filter that is always true is dropped.
//! - **`SelectFalseToEmptyRule`**: a filter that is always false or NULL keeps
//!   no row; the whole subtree becomes an empty `Values` with the same columns.
//! - **`MergeSelectsRule`**: adjacent filters are combined into one conjunction,
//!   so the boolean rules can simplify across both predicates.

use normx_core::expr::{ColumnId, Op};
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, MemoExpr};
use normx_core::pattern::{OpMatcher, Pattern};
use normx_core::rule::NormRule;
use tracing::trace;

/// `Select(x, True)` -> `x`.
pub struct EliminateSelectRule;

impl NormRule for EliminateSelectRule {
    fn name(&self) -> &'static str {
        "EliminateSelect"
    }

    fn pattern(&self) -> Pattern {
        Pattern::Operator(
            OpMatcher::Op(Op::Select),
            vec![Pattern::Any, Pattern::leaf(Op::True)],
        )
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        f.memo().children(expr)[0]
    }
}

/// `Select(x, False | Null)` -> `Values()` over the columns of `x`.
pub struct SelectFalseToEmptyRule;

impl NormRule for SelectFalseToEmptyRule {
    fn name(&self) -> &'static str {
        "SelectFalseToEmpty"
    }

    fn pattern(&self) -> Pattern {
        Pattern::Operator(
            OpMatcher::Op(Op::Select),
            vec![
                Pattern::Any,
                Pattern::Operator(OpMatcher::OneOf(vec![Op::False, Op::Null]), vec![]),
            ],
        )
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let input = f.memo().children(expr)[0];
        let cols: Vec<ColumnId> = f
            .memo()
            .relational(input)
            .map(|p| p.output_cols.iter().collect())
            .unwrap_or_default();
        trace!("Filter on {} rejects every row, {} columns", input, cols.len());
        f.construct_values(&[], cols)
    }
}

/// `Select(Select(x, a), b)` -> `Select(x, And(a, b))`.
pub struct MergeSelectsRule;

impl NormRule for MergeSelectsRule {
    fn name(&self) -> &'static str {
        "MergeSelects"
    }

    fn pattern(&self) -> Pattern {
        Pattern::select_select()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let children = f.memo().children(expr).to_vec();
        let inner = *f.memo().normalized(children[0]);
        let inner_children = f.memo().children(&inner).to_vec();
        let filter = f.construct_and(inner_children[1], children[1]);
        f.construct_select(inner_children[0], filter)
    }
}
