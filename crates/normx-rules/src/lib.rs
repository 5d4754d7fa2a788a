//! # Built-in Normalization Rules
//!
//! This crate provides the default normalization rule catalog for the
//! normalizing factory. Normalization rules run on every construction, before
//! the expression is memoized, and replace it with a simpler equivalent.
//!
//! ## Scalar Rules
//!
//! - **`FoldArithmeticRule`**: Evaluates arithmetic over two literals.
//! - **`FoldComparisonRule`**: Evaluates comparisons of two literals.
//! - **`CommuteConstComparisonRule`**: Moves literals to the right of comparisons.
//! - **`SimplifyNotRule`**, **`SimplifyAndRule`**, **`SimplifyOrRule`**: Remove
//!   boolean literals, double negation, and duplicate operands.
//!
//! ## Relational Rules
//!
//! - **`EliminateSelectRule`**: Drops filters that are always true.
//! - **`SelectFalseToEmptyRule`**: Replaces filters that are never true by an
//!   empty `Values`.
//! - **`MergeSelectsRule`**: Combines adjacent filters.
//! - **`PushSelectIntoJoinRule`**: Merges a filter into the condition of the
//!   inner join below it.
//! - **`EliminateProjectRule`**: Drops identity projections.
//! - **`EliminateLimitRule`**: Drops limits the input can never reach.

pub mod fold_constants;
pub mod limit;
pub mod normalize_comparison;
pub mod predicate_pushdown;
pub mod project;
pub mod select;
pub mod simplify_bool;

use normx_core::rule::RuleRegistry;

/// Create a rule registry with all built-in rules.
///
/// Registration order is rule priority: for each operator the first
/// applicable rule wins.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    // Scalar rules.
    registry.add_rule(Box::new(fold_constants::FoldArithmeticRule));
    registry.add_rule(Box::new(fold_constants::FoldComparisonRule));
    registry.add_rule(Box::new(normalize_comparison::CommuteConstComparisonRule));
    registry.add_rule(Box::new(simplify_bool::SimplifyNotRule));
    registry.add_rule(Box::new(simplify_bool::SimplifyAndRule));
    registry.add_rule(Box::new(simplify_bool::SimplifyOrRule));

    // Relational rules.
    registry.add_rule(Box::new(select::EliminateSelectRule));
    registry.add_rule(Box::new(select::SelectFalseToEmptyRule));
    registry.add_rule(Box::new(select::MergeSelectsRule));
    registry.add_rule(Box::new(predicate_pushdown::PushSelectIntoJoinRule));
    registry.add_rule(Box::new(project::EliminateProjectRule));
    registry.add_rule(Box::new(limit::EliminateLimitRule));

    registry
}
