//! # Errors
//!
//! Recoverable failures surfaced to callers of the factory. Internal
//! consistency violations (a rule changing a group's logical properties, an
//! unbalanced cycle stack) are not represented here: they are programming
//! errors and panic in the checked configuration.

use crate::expr::DataType;
use crate::memo::GroupId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormError {
    /// Placeholder assignment was requested before a root was set.
    #[error("memo has no root group")]
    NoRoot,
    /// The tree references a placeholder for which no value was supplied.
    #[error("no value supplied for placeholder ${0}")]
    UnboundPlaceholder(u16),
    /// The supplied value does not have the placeholder's declared type.
    #[error("placeholder ${index} expects {expected:?}, got {actual:?}")]
    PlaceholderTypeMismatch {
        index: u16,
        expected: DataType,
        actual: DataType,
    },
    /// The group id does not name a group in this memo.
    #[error("group {0} does not exist")]
    InvalidGroup(GroupId),
}
