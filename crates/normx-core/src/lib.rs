//! # normx-core: Memo and Normalizing Factory
//!
//! This crate implements the expression memo of a relational query optimizer
//! and the construction protocol that normalizes every expression before it is
//! stored. Semantically identical subexpressions, however they were reached,
//! collapse into one group; rewrite rules run transparently on every
//! construction and may call each other recursively without looping forever.
//!
//! ## Module Overview
//!
//! - **`expr`**: Operator tags, literal values, and operator data.
//! - **`intern`**: Hash-consing tables and the handles they hand out.
//! - **`metadata`**: Tables and columns referenced by one query.
//! - **`memo`**: Groups, expressions, fingerprints, and the deduplication index.
//! - **`properties`**: Logical properties of groups and required root properties.
//! - **`pattern`**: Declarative pattern matching for rule applicability checks.
//! - **`rule`**: The normalization rule trait and the priority-ordered registry.
//! - **`cycle`**: The rule cycle guard that lets rules recurse into each other.
//! - **`factory`**: The single construction entry point and its callbacks.
//! - **`placeholder`**: Rebinding prepared-statement placeholders to values.
//! - **`error`**: Recoverable errors.

pub mod cycle;
pub mod error;
pub mod expr;
pub mod factory;
pub mod intern;
pub mod memo;
pub mod metadata;
pub mod pattern;
pub mod placeholder;
pub mod properties;
pub mod rule;
