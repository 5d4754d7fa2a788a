//! # Normalization Rules
//!
//! A normalization rule is a pattern-triggered rewrite that the factory
//! applies transparently while constructing an expression, before the
//! expression reaches the memo. The rule bodies are domain logic; this module
//! only defines how the factory talks to them.
//!
//! ## Rule Protocol
//!
//! 1. The rule's `pattern()` is checked structurally against the expression.
//! 2. `matches()` runs any custom conditions (e.g. "both operands are integer
//!    literals and the sum does not overflow").
//! 3. If the rule is still applicable and not disabled, `replace()` builds the
//!    replacement by calling back into the factory, and returns the group of
//!    the replacement. Replacements are therefore always memoized already.
//!
//! Rules tagged with `detect_cycles()` run under the rule cycle guard, which is
//! what allows mutually recursive rule pairs.
//!
//! ## Rule Registry
//!
//! The `RuleRegistry` keeps rules in registration order and indexes them by
//! the operators their pattern root accepts. For a given operator, rules are
//! tried in registration order and the first applicable rule wins; this order
//! is the rule priority and is fully deterministic.

use crate::expr::Op;
use crate::factory::Factory;
use crate::memo::{GroupId, Memo, MemoExpr};
use crate::pattern::Pattern;
use std::collections::HashMap;

/// A normalization rule.
pub trait NormRule: Send + Sync {
    /// Unique name of this rule, reported to the matched/applied callbacks.
    fn name(&self) -> &'static str;

    /// Structural pattern the expression must match.
    fn pattern(&self) -> Pattern;

    /// Whether the rule must run under the rule cycle guard.
    fn detect_cycles(&self) -> bool {
        false
    }

    /// Custom match conditions beyond the structural pattern.
    fn matches(&self, _memo: &Memo, _expr: &MemoExpr) -> bool {
        true
    }

    /// Build the replacement for `expr` and return its group.
    ///
    /// Only called when `pattern()` and `matches()` both hold.
    fn replace(&self, factory: &mut Factory, expr: &MemoExpr) -> GroupId;
}

/// A rule together with its pattern, computed once at registration.
pub struct RegisteredRule {
    pub rule: Box<dyn NormRule>,
    pub pattern: Pattern,
}

/// Registry of normalization rules, ordered by priority.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<RegisteredRule>,
    by_op: HashMap<Op, Vec<usize>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; it has lower priority than every rule added before it.
    pub fn add_rule(&mut self, rule: Box<dyn NormRule>) {
        let pattern = rule.pattern();
        let index = self.rules.len();
        for op in pattern.root_ops() {
            self.by_op.entry(op).or_default().push(index);
        }
        self.rules.push(RegisteredRule { rule, pattern });
    }

    /// Rules whose pattern root accepts `op`, in priority order.
    pub fn rules_for(&self, op: Op) -> impl Iterator<Item = &RegisteredRule> + '_ {
        self.by_op
            .get(&op)
            .into_iter()
            .flatten()
            .map(move |i| &self.rules[*i])
    }

    /// Names of all registered rules in priority order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.rule.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
