//! # Rule Cycle Detection
//!
//! Some normalization rules are meant to rewrite each other's output: a rule
//! that pushes a filter down and one that pulls it back up may both match the
//! result of the other. Rules tagged for cycle detection push the fingerprint
//! of the expression they are about to replace onto a stack before building
//! their replacement. If the replacement (transitively) asks to construct an
//! expression whose fingerprint is already on the stack, the chain has come
//! back to where it started and the rule is skipped instead of recursing
//! again.
//!
//! The push/pop pair is scoped by [`CycleGuard`]: the fingerprint is popped
//! when the guard is dropped, including on early return and unwinding.

use crate::factory::Factory;
use crate::memo::Fingerprint;
use std::ops::{Deref, DerefMut};

/// Stack of fingerprints whose replacement is under construction.
#[derive(Debug, Default)]
pub struct RuleCycles {
    stack: Vec<Fingerprint>,
}

impl RuleCycles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the stack for reuse.
    pub fn init(&mut self) {
        self.stack.clear();
    }

    /// True if `fingerprint` is already being replaced higher up the call stack.
    pub fn detect_cycle(&self, fingerprint: &Fingerprint) -> bool {
        self.stack.iter().any(|f| f == fingerprint)
    }

    pub fn push(&mut self, fingerprint: Fingerprint) {
        self.stack.push(fingerprint);
    }

    pub fn pop(&mut self) {
        if self.stack.pop().is_none() {
            panic!("rule cycle stack popped while empty");
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Scoped entry on the factory's rule cycle stack.
///
/// Dereferences to the factory so a rule's replacement can keep constructing
/// through the guard; the fingerprint is popped when the guard goes away.
pub struct CycleGuard<'a> {
    factory: &'a mut Factory,
}

impl<'a> CycleGuard<'a> {
    pub(crate) fn enter(factory: &'a mut Factory, fingerprint: Fingerprint) -> Self {
        factory.cycles_mut().push(fingerprint);
        Self { factory }
    }
}

impl Deref for CycleGuard<'_> {
    type Target = Factory;

    fn deref(&self) -> &Factory {
        self.factory
    }
}

impl DerefMut for CycleGuard<'_> {
    fn deref_mut(&mut self) -> &mut Factory {
        self.factory
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.factory.cycles_mut().pop();
    }
}
