//! # Operators, Literals, and Operator Data
//!
//! This module defines the vocabulary the memo stores. It is organized into
//! three layers:
//!
//! ## Literal Values (`ScalarValue`, `DataType`)
//! Constant values that appear in queries (e.g., `WHERE x = 42`). Literals are
//! interned in the memo, so they must be hashable and totally comparable; `f64`
//! is wrapped in `OrderedFloat` for that reason.
//!
//! ## Operator Tags (`Op`)
//! An `Op` is a data-less discriminant naming what an expression computes. Both
//! relational operators (`Scan`, `Select`, `InnerJoin`, ...) and scalar
//! operators (`Eq`, `Plus`, `Const`, ...) are memo expressions: a predicate is a
//! group just like a join input, so scalar subexpressions are shared too.
//!
//! ## Operator Data (`Private`, `OpDef`)
//! Everything an expression carries besides its child groups is reduced to a
//! small `Copy` handle. Bulky payloads (scan definitions, projection column
//! lists, placeholder declarations) are `OpDef` blocks stored in an intern
//! table, so comparing two expressions never compares payloads structurally.

use crate::intern::{ColSetId, DatumId, DefId};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a column registered in the query metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Identifier of a table registered in the query metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TableId(pub u32);

/// Type of a scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of an untyped `NULL`; compatible with every other type.
    Unknown,
    Bool,
    Int64,
    Float64,
    Utf8,
    /// Days since the Unix epoch.
    Date,
    /// Type of tuple-like scalars (`Tuple`, `Projections`).
    Tuple,
}

impl DataType {
    /// Two types are compatible if they are equal or either is `Unknown`.
    pub fn is_compatible(self, other: DataType) -> bool {
        self == other || self == DataType::Unknown || other == DataType::Unknown
    }
}

/// Scalar literal value.
///
/// Uses `OrderedFloat` for `f64` so that floating-point values can be ordered.
/// Equality and hashing compare floats by bit pattern: `-0.0` and `0.0` are
/// distinct literals, and the intern table must not merge them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    /// SQL NULL value.
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
    /// Date as days since Unix epoch (1970-01-01).
    Date(i32),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.0.to_bits() == b.0.to_bits(),
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.0.to_bits().hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
        }
    }
}

impl ScalarValue {
    pub fn float(v: f64) -> Self {
        ScalarValue::Float64(OrderedFloat(v))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Unknown,
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Date(_) => DataType::Date,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Compare two non-null values of the same type.
    ///
    /// Returns `None` for NULLs and for values of different types; callers
    /// treat that as "not statically decidable".
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::Float64(a), Self::Float64(b)) => Some(a.cmp(b)),
            (Self::Utf8(a), Self::Utf8(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v),
            ScalarValue::Date(v) => write!(f, "date({})", v),
        }
    }
}

/// Operator tag.
///
/// The discriminant is part of every fingerprint, so variants must never be
/// reordered once memos built with them are persisted (e.g. prepared
/// statements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Op {
    // Relational operators.
    /// Table scan. Private: `Def(ScanDef)`. Leaf.
    Scan,
    /// Constant rows. Private: `Def(ValuesDef)`. Children: one `Tuple` per row.
    Values,
    /// Children: input, filter predicate.
    Select,
    /// Children: input, `Projections`.
    Project,
    /// Children: left, right, join condition.
    InnerJoin,
    /// Children: input, limit expression.
    Limit,

    // Scalar operators.
    /// Column reference. Private: `Column`.
    Variable,
    /// Non-null, non-boolean literal. Private: `Datum`.
    Const,
    /// Typed NULL. Private: `Type`.
    Null,
    True,
    False,
    /// Deferred value of a prepared statement. Private: `Def(PlaceholderDef)`.
    Placeholder,
    /// Children: elements.
    Tuple,
    /// Children: synthesized column expressions. Private: `Def(ProjectionsDef)`.
    Projections,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Mult,
    Div,
}

impl Op {
    pub const ALL: &'static [Op] = &[
        Op::Scan,
        Op::Values,
        Op::Select,
        Op::Project,
        Op::InnerJoin,
        Op::Limit,
        Op::Variable,
        Op::Const,
        Op::Null,
        Op::True,
        Op::False,
        Op::Placeholder,
        Op::Tuple,
        Op::Projections,
        Op::And,
        Op::Or,
        Op::Not,
        Op::Eq,
        Op::Ne,
        Op::Lt,
        Op::Le,
        Op::Gt,
        Op::Ge,
        Op::Plus,
        Op::Minus,
        Op::Mult,
        Op::Div,
    ];

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Op::Scan | Op::Values | Op::Select | Op::Project | Op::InnerJoin | Op::Limit
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Op::Plus | Op::Minus | Op::Mult | Op::Div)
    }

    /// Literal operators whose value is known at construction time.
    pub fn is_constant(self) -> bool {
        matches!(self, Op::Const | Op::Null | Op::True | Op::False)
    }

    /// Number of children, or `None` for variadic operators.
    pub fn arity(self) -> Option<usize> {
        match self {
            Op::Values | Op::Tuple | Op::Projections => None,
            Op::Scan | Op::Variable | Op::Const | Op::Null | Op::True | Op::False => Some(0),
            Op::Placeholder => Some(0),
            Op::Not => Some(1),
            Op::Select | Op::Project | Op::Limit => Some(2),
            Op::And | Op::Or => Some(2),
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => Some(2),
            Op::Plus | Op::Minus | Op::Mult | Op::Div => Some(2),
            Op::InnerJoin => Some(3),
        }
    }

    /// The comparison that holds when the operands are swapped (`a < b` iff `b > a`).
    pub fn commuted(self) -> Option<Op> {
        match self {
            Op::Eq => Some(Op::Eq),
            Op::Ne => Some(Op::Ne),
            Op::Lt => Some(Op::Gt),
            Op::Le => Some(Op::Ge),
            Op::Gt => Some(Op::Lt),
            Op::Ge => Some(Op::Le),
            _ => None,
        }
    }
}

/// Operator-specific data of an expression, reduced to a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Private {
    None,
    Column(ColumnId),
    Type(DataType),
    Datum(DatumId),
    Def(DefId),
}

impl Private {
    /// Tag and payload used in the fingerprint encoding.
    pub(crate) fn encode(self) -> (u8, u32) {
        match self {
            Private::None => (0, 0),
            Private::Column(c) => (1, c.0),
            Private::Type(t) => (2, t as u32),
            Private::Datum(d) => (3, d.index()),
            Private::Def(d) => (4, d.index()),
        }
    }
}

/// Scan definition: which table and which of its columns are produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanDef {
    pub table: TableId,
    pub cols: ColSetId,
}

/// Columns produced by a `Values` operator, in row order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValuesDef {
    pub cols: Vec<ColumnId>,
}

/// Output columns of a `Projections` list.
///
/// `synthesized[i]` is the column computed by the i-th child of the
/// `Projections` expression; `passthrough` columns are forwarded unchanged
/// from the `Project` input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionsDef {
    pub synthesized: Vec<ColumnId>,
    pub passthrough: ColSetId,
}

/// Declaration of a prepared-statement placeholder (`$index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderDef {
    pub index: u16,
    pub data_type: DataType,
}

/// Operator metadata block stored in the memo's definition table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpDef {
    Scan(ScanDef),
    Values(ValuesDef),
    Projections(ProjectionsDef),
    Placeholder(PlaceholderDef),
}
