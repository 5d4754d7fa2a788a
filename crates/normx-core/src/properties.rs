//! # Logical and Required Properties
//!
//! ## Logical Properties
//!
//! Logical properties are shared by all expressions in a group because they
//! describe *what* the group produces, not how: output columns, not-null
//! columns, candidate keys, and cardinality bounds for relational groups; type,
//! outer columns, and constness for scalar groups. They are derived once, from
//! the group's canonical member, when the group is created.
//!
//! Every rewrite must preserve them. The factory checks this in the checked
//! configuration:
//!
//! - a member added to an existing group must derive *identical* properties;
//! - a normalization rule's replacement must be a *consistent rewrite* of the
//!   expression it replaces: same output columns (or a compatible scalar type),
//!   and cardinality bounds inside the original's. Rules may learn more (e.g.
//!   a filter that folds to `false` tightens the bounds to zero rows) but may
//!   never change the shape of the output.
//!
//! ## Required Properties
//!
//! `RequiredProps` records what the consumer of the root expects of the final
//! result (column presentation order, row ordering). They are attached to the
//! root with `set_root` and carried across placeholder rebinding unchanged.

use crate::expr::{ColumnId, DataType, Op, OpDef, Private, ScalarValue};
use crate::intern::ColSet;
use crate::memo::{GroupId, Memo, MemoExpr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bounds on the number of rows a relational expression produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u64,
    /// `None` means unbounded.
    pub max: Option<u64>,
}

impl Cardinality {
    pub const ANY: Cardinality = Cardinality { min: 0, max: None };

    pub fn exactly(n: u64) -> Self {
        Cardinality { min: n, max: Some(n) }
    }

    /// Same upper bound, no lower bound (e.g. after a filter).
    pub fn at_most(self) -> Self {
        Cardinality { min: 0, max: self.max }
    }

    /// Cap both bounds at `n` rows.
    pub fn limit(self, n: u64) -> Self {
        Cardinality {
            min: self.min.min(n),
            max: Some(self.max.map_or(n, |m| m.min(n))),
        }
    }

    /// Bounds of a cross product.
    pub fn product(self, other: Cardinality) -> Self {
        let max = match (self.max, other.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => a.checked_mul(b),
            _ => None,
        };
        Cardinality {
            min: self.min.saturating_mul(other.min),
            max,
        }
    }

    /// True if every row count allowed by `self` is also allowed by `other`.
    pub fn is_within(&self, other: &Cardinality) -> bool {
        let max_ok = match (self.max, other.max) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a <= b,
        };
        self.min >= other.min && max_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalProps {
    pub output_cols: ColSet,
    pub not_null_cols: ColSet,
    /// Candidate keys. The empty set is a key of a relation with at most one row.
    pub keys: BTreeSet<ColSet>,
    pub cardinality: Cardinality,
    pub has_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarProps {
    pub data_type: DataType,
    /// Columns referenced by the expression.
    pub outer_cols: ColSet,
    pub has_placeholder: bool,
    /// The expression is a literal (`Const`, `Null`, `True`, `False`).
    pub is_constant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalProps {
    Relational(RelationalProps),
    Scalar(ScalarProps),
}

impl LogicalProps {
    pub fn relational(&self) -> Option<&RelationalProps> {
        match self {
            LogicalProps::Relational(p) => Some(p),
            LogicalProps::Scalar(_) => None,
        }
    }

    pub fn scalar(&self) -> Option<&ScalarProps> {
        match self {
            LogicalProps::Scalar(p) => Some(p),
            LogicalProps::Relational(_) => None,
        }
    }

    pub fn has_placeholder(&self) -> bool {
        match self {
            LogicalProps::Relational(p) => p.has_placeholder,
            LogicalProps::Scalar(p) => p.has_placeholder,
        }
    }

    /// Whether a group with these properties may stand in for an expression
    /// whose properties were derived as `original`.
    pub fn is_consistent_rewrite_of(&self, original: &LogicalProps) -> bool {
        match (self, original) {
            (LogicalProps::Relational(new), LogicalProps::Relational(old)) => {
                new.output_cols == old.output_cols && new.cardinality.is_within(&old.cardinality)
            }
            (LogicalProps::Scalar(new), LogicalProps::Scalar(old)) => {
                new.data_type.is_compatible(old.data_type)
            }
            _ => false,
        }
    }
}

/// One column of a required ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingColumn {
    pub col: ColumnId,
    pub descending: bool,
}

/// Properties the consumer of the root requires of the final result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiredProps {
    /// Output columns in presentation order; empty means "any".
    pub presentation: Vec<ColumnId>,
    /// Required row ordering; empty means "any".
    pub ordering: Vec<OrderingColumn>,
}

impl RequiredProps {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_presentation(cols: Vec<ColumnId>) -> Self {
        Self {
            presentation: cols,
            ordering: Vec::new(),
        }
    }

    pub fn with_ordering(mut self, ordering: Vec<OrderingColumn>) -> Self {
        self.ordering = ordering;
        self
    }

}

/// Derive the logical properties of an expression from its operator data and
/// the already-derived properties of its child groups.
///
/// The expression need not be memoized; the factory derives properties of
/// pre-rule expressions to validate rule replacements.
pub(crate) fn derive(memo: &Memo, expr: &MemoExpr) -> LogicalProps {
    if expr.op.is_relational() {
        LogicalProps::Relational(derive_relational(memo, expr))
    } else {
        LogicalProps::Scalar(derive_scalar(memo, expr))
    }
}

fn relational(memo: &Memo, group: GroupId) -> &RelationalProps {
    memo.properties(group)
        .relational()
        .unwrap_or_else(|| panic!("group {} is not relational", group))
}

fn scalar(memo: &Memo, group: GroupId) -> &ScalarProps {
    memo.properties(group)
        .scalar()
        .unwrap_or_else(|| panic!("group {} is not scalar", group))
}

fn derive_relational(memo: &Memo, expr: &MemoExpr) -> RelationalProps {
    let children = memo.list(expr.children);
    match expr.op {
        Op::Scan => {
            let Some(OpDef::Scan(def)) = def_of(memo, expr.private) else {
                panic!("scan without scan definition");
            };
            let md = memo.metadata();
            let cols = memo.col_set(def.cols).clone();
            let not_null = cols.iter().filter(|c| !md.column(*c).nullable).collect();
            let keys = md
                .table(def.table)
                .primary_key
                .iter()
                .filter(|pk| pk.is_subset(&cols))
                .cloned()
                .collect();
            RelationalProps {
                output_cols: cols,
                not_null_cols: not_null,
                keys,
                cardinality: Cardinality::ANY,
                has_placeholder: false,
            }
        }
        Op::Values => {
            let Some(OpDef::Values(def)) = def_of(memo, expr.private) else {
                panic!("values without values definition");
            };
            let mut keys = BTreeSet::new();
            if children.len() <= 1 {
                keys.insert(ColSet::new());
            }
            RelationalProps {
                output_cols: def.cols.iter().copied().collect(),
                not_null_cols: ColSet::new(),
                keys,
                cardinality: Cardinality::exactly(children.len() as u64),
                has_placeholder: any_placeholder(memo, children),
            }
        }
        Op::Select => {
            let input = relational(memo, children[0]);
            let filter = children[1];
            let cardinality = match memo.normalized(filter).op {
                Op::True => input.cardinality,
                Op::False => Cardinality::exactly(0),
                _ => input.cardinality.at_most(),
            };
            let rejected = null_rejected_cols(memo, filter).intersection(&input.output_cols);
            RelationalProps {
                output_cols: input.output_cols.clone(),
                not_null_cols: input.not_null_cols.union(&rejected),
                keys: input.keys.clone(),
                cardinality,
                has_placeholder: any_placeholder(memo, children),
            }
        }
        Op::Project => {
            let input = relational(memo, children[0]);
            let projections = memo.normalized(children[1]);
            let (passthrough, synthesized) = match def_of(memo, projections.private) {
                Some(OpDef::Projections(def)) => (
                    memo.col_set(def.passthrough).clone(),
                    def.synthesized.iter().copied().collect::<ColSet>(),
                ),
                _ => (input.output_cols.clone(), ColSet::new()),
            };
            RelationalProps {
                output_cols: passthrough.union(&synthesized),
                not_null_cols: input.not_null_cols.intersection(&passthrough),
                keys: input
                    .keys
                    .iter()
                    .filter(|k| k.is_subset(&passthrough))
                    .cloned()
                    .collect(),
                cardinality: input.cardinality,
                has_placeholder: any_placeholder(memo, children),
            }
        }
        Op::InnerJoin => {
            let left = relational(memo, children[0]);
            let right = relational(memo, children[1]);
            let on = children[2];
            let output_cols = left.output_cols.union(&right.output_cols);
            let mut not_null = left.not_null_cols.union(&right.not_null_cols);
            not_null.union_with(&null_rejected_cols(memo, on).intersection(&output_cols));
            let keys = left
                .keys
                .iter()
                .flat_map(|l| right.keys.iter().map(move |r| l.union(r)))
                .collect();
            let cardinality = match memo.normalized(on).op {
                Op::False => Cardinality::exactly(0),
                _ => left.cardinality.product(right.cardinality).at_most(),
            };
            RelationalProps {
                output_cols,
                not_null_cols: not_null,
                keys,
                cardinality,
                has_placeholder: any_placeholder(memo, children),
            }
        }
        Op::Limit => {
            let input = relational(memo, children[0]);
            let cardinality = match memo.const_value(children[1]) {
                Some(ScalarValue::Int64(n)) if n >= 0 => input.cardinality.limit(n as u64),
                _ => input.cardinality.at_most(),
            };
            RelationalProps {
                output_cols: input.output_cols.clone(),
                not_null_cols: input.not_null_cols.clone(),
                keys: input.keys.clone(),
                cardinality,
                has_placeholder: any_placeholder(memo, children),
            }
        }
        op => panic!("{:?} is not a relational operator", op),
    }
}

fn derive_scalar(memo: &Memo, expr: &MemoExpr) -> ScalarProps {
    let children = memo.list(expr.children);
    let mut outer_cols = ColSet::new();
    for child in children {
        outer_cols.union_with(&scalar(memo, *child).outer_cols);
    }
    let data_type = match (expr.op, expr.private) {
        (Op::Variable, Private::Column(col)) => {
            outer_cols.insert(col);
            memo.metadata().column(col).data_type
        }
        (Op::Const, Private::Datum(d)) => memo.datum(d).data_type(),
        (Op::Null, Private::Type(t)) => t,
        (Op::True | Op::False | Op::And | Op::Or | Op::Not, _) => DataType::Bool,
        (op, _) if op.is_comparison() => DataType::Bool,
        (op, _) if op.is_arithmetic() => {
            let left = scalar(memo, children[0]).data_type;
            if left == DataType::Unknown {
                scalar(memo, children[1]).data_type
            } else {
                left
            }
        }
        (Op::Placeholder, Private::Def(d)) => match memo.def(d) {
            OpDef::Placeholder(def) => def.data_type,
            other => panic!("placeholder with {:?} definition", other),
        },
        (Op::Tuple | Op::Projections, _) => DataType::Tuple,
        (op, private) => panic!("cannot derive scalar properties of {:?} {:?}", op, private),
    };
    ScalarProps {
        data_type,
        outer_cols,
        has_placeholder: expr.op == Op::Placeholder || any_placeholder(memo, children),
        is_constant: expr.op.is_constant(),
    }
}

fn def_of(memo: &Memo, private: Private) -> Option<&OpDef> {
    match private {
        Private::Def(d) => Some(memo.def(d)),
        _ => None,
    }
}

fn any_placeholder(memo: &Memo, children: &[GroupId]) -> bool {
    children
        .iter()
        .any(|c| memo.properties(*c).has_placeholder())
}

/// Columns that cannot be NULL in any row for which `filter` is true.
///
/// Conjuncts are walked through `And`; a comparison of scalars rejects NULL in
/// every column it references, since comparing NULL yields NULL. Tuple
/// comparisons other than `Eq` can be true with a NULL element, e.g.
/// `(2, NULL) <> (1, 2)`, so they reject nothing.
fn null_rejected_cols(memo: &Memo, filter: GroupId) -> ColSet {
    let expr = memo.normalized(filter);
    let children = memo.list(expr.children);
    match expr.op {
        Op::And => {
            null_rejected_cols(memo, children[0]).union(&null_rejected_cols(memo, children[1]))
        }
        Op::Eq => scalar(memo, filter).outer_cols.clone(),
        op if op.is_comparison() => {
            if children.iter().any(|c| memo.normalized(*c).op == Op::Tuple) {
                ColSet::new()
            } else {
                scalar(memo, filter).outer_cols.clone()
            }
        }
        _ => ColSet::new(),
    }
}
