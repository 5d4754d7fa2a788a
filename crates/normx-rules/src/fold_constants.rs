//! # Constant Folding Rules
//!
//! Arithmetic and comparisons over two literals are evaluated at construction
//! time and replaced by the resulting literal.
//!
//! ```text
//! Before: Plus(Const(1), Const(2))      Lt(Const(1), Const(2))
//! After:  Const(3)                      True
//! ```
//!
//! ## NULL Semantics
//!
//! Any arithmetic or comparison with a NULL operand is NULL. The result is a
//! `Null` typed like the folded expression, so the group keeps its type.
//!
//! ## What Is Not Folded
//!
//! Operations that would fail at run time (integer overflow, division by zero,
//! non-finite float results) and operands of different types stay as they are,
//! so the error is still raised when the query executes.

use normx_core::expr::{DataType, Op, ScalarValue};
use normx_core::factory::Factory;
use normx_core::memo::{GroupId, Memo, MemoExpr};
use normx_core::pattern::{OpMatcher, Pattern};
use normx_core::rule::NormRule;
use std::cmp::Ordering;

/// Literal values of both operands of a binary expression.
pub(crate) fn const_operands(memo: &Memo, expr: &MemoExpr) -> Option<(ScalarValue, ScalarValue)> {
    let children = memo.children(expr);
    if children.len() != 2 {
        return None;
    }
    Some((memo.const_value(children[0])?, memo.const_value(children[1])?))
}

/// Evaluate an arithmetic operator over two literals.
fn eval_arithmetic(op: Op, left: &ScalarValue, right: &ScalarValue) -> Option<ScalarValue> {
    match (left, right) {
        (ScalarValue::Null, _) | (_, ScalarValue::Null) => Some(ScalarValue::Null),
        (ScalarValue::Int64(a), ScalarValue::Int64(b)) => {
            let value = match op {
                Op::Plus => a.checked_add(*b),
                Op::Minus => a.checked_sub(*b),
                Op::Mult => a.checked_mul(*b),
                Op::Div => a.checked_div(*b),
                _ => None,
            };
            value.map(ScalarValue::Int64)
        }
        (ScalarValue::Float64(a), ScalarValue::Float64(b)) => {
            let (a, b) = (a.into_inner(), b.into_inner());
            let value = match op {
                Op::Plus => a + b,
                Op::Minus => a - b,
                Op::Mult => a * b,
                Op::Div if b != 0.0 => a / b,
                _ => return None,
            };
            value.is_finite().then(|| ScalarValue::float(value))
        }
        _ => None,
    }
}

/// Evaluate a comparison over two literals.
fn eval_comparison(op: Op, left: &ScalarValue, right: &ScalarValue) -> Option<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Some(ScalarValue::Null);
    }
    let ord = left.compare(right)?;
    let result = match op {
        Op::Eq => ord == Ordering::Equal,
        Op::Ne => ord != Ordering::Equal,
        Op::Lt => ord == Ordering::Less,
        Op::Le => ord != Ordering::Greater,
        Op::Gt => ord == Ordering::Greater,
        Op::Ge => ord != Ordering::Less,
        _ => return None,
    };
    Some(ScalarValue::Bool(result))
}

/// Build the folded literal. NULL keeps the type of the expression it replaces.
fn construct_folded(f: &mut Factory, value: ScalarValue, data_type: DataType) -> GroupId {
    if value.is_null() {
        f.construct_null(data_type)
    } else {
        f.construct_const_val(value)
    }
}

/// Fold `Plus`, `Minus`, `Mult`, and `Div` over two literals.
pub struct FoldArithmeticRule;

impl FoldArithmeticRule {
    fn fold(memo: &Memo, expr: &MemoExpr) -> Option<ScalarValue> {
        let (left, right) = const_operands(memo, expr)?;
        eval_arithmetic(expr.op, &left, &right)
    }
}

impl NormRule for FoldArithmeticRule {
    fn name(&self) -> &'static str {
        "FoldArithmetic"
    }

    fn pattern(&self) -> Pattern {
        Pattern::binary(OpMatcher::Arithmetic, Pattern::constant(), Pattern::constant())
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        Self::fold(memo, expr).is_some()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        let children = f.memo().children(expr).to_vec();
        let left = f.memo().scalar(children[0]).map(|p| p.data_type);
        let right = f.memo().scalar(children[1]).map(|p| p.data_type);
        let data_type = match (left, right) {
            (Some(DataType::Unknown), Some(t)) | (Some(t), _) => t,
            (None, _) => DataType::Unknown,
        };
        match Self::fold(f.memo(), expr) {
            Some(value) => construct_folded(f, value, data_type),
            None => unreachable!("FoldArithmetic replaced an expression it did not match"),
        }
    }
}

/// Fold comparisons of two literals to `True`, `False`, or a boolean `Null`.
pub struct FoldComparisonRule;

impl FoldComparisonRule {
    fn fold(memo: &Memo, expr: &MemoExpr) -> Option<ScalarValue> {
        let (left, right) = const_operands(memo, expr)?;
        eval_comparison(expr.op, &left, &right)
    }
}

impl NormRule for FoldComparisonRule {
    fn name(&self) -> &'static str {
        "FoldComparison"
    }

    fn pattern(&self) -> Pattern {
        Pattern::binary(OpMatcher::Comparison, Pattern::constant(), Pattern::constant())
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        Self::fold(memo, expr).is_some()
    }

    fn replace(&self, f: &mut Factory, expr: &MemoExpr) -> GroupId {
        match Self::fold(f.memo(), expr) {
            Some(value) => construct_folded(f, value, DataType::Bool),
            None => unreachable!("FoldComparison replaced an expression it did not match"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_metadata() {
        assert_eq!(FoldArithmeticRule.name(), "FoldArithmetic");
        assert_eq!(FoldComparisonRule.name(), "FoldComparison");
        assert!(!FoldArithmeticRule.detect_cycles());
    }

    #[test]
    fn test_eval_arithmetic() {
        let int = ScalarValue::Int64;
        assert_eq!(eval_arithmetic(Op::Plus, &int(1), &int(2)), Some(int(3)));
        assert_eq!(eval_arithmetic(Op::Div, &int(7), &int(2)), Some(int(3)));
        assert_eq!(eval_arithmetic(Op::Div, &int(1), &int(0)), None);
        assert_eq!(eval_arithmetic(Op::Mult, &int(i64::MAX), &int(2)), None);
        assert_eq!(eval_arithmetic(Op::Div, &int(i64::MIN), &int(-1)), None);
        assert_eq!(
            eval_arithmetic(Op::Minus, &ScalarValue::Null, &int(2)),
            Some(ScalarValue::Null)
        );
        assert_eq!(
            eval_arithmetic(Op::Mult, &ScalarValue::float(1.5), &ScalarValue::float(2.0)),
            Some(ScalarValue::float(3.0))
        );
        assert_eq!(
            eval_arithmetic(Op::Div, &ScalarValue::float(1.0), &ScalarValue::float(0.0)),
            None
        );
        assert_eq!(eval_arithmetic(Op::Plus, &int(1), &ScalarValue::float(1.0)), None);
    }

    #[test]
    fn test_eval_comparison() {
        let int = ScalarValue::Int64;
        assert_eq!(
            eval_comparison(Op::Le, &int(2), &int(2)),
            Some(ScalarValue::Bool(true))
        );
        assert_eq!(
            eval_comparison(Op::Ne, &int(2), &int(2)),
            Some(ScalarValue::Bool(false))
        );
        assert_eq!(
            eval_comparison(Op::Gt, &ScalarValue::Utf8("b".into()), &ScalarValue::Utf8("a".into())),
            Some(ScalarValue::Bool(true))
        );
        assert_eq!(
            eval_comparison(Op::Eq, &ScalarValue::Null, &int(1)),
            Some(ScalarValue::Null)
        );
        assert_eq!(eval_comparison(Op::Eq, &int(1), &ScalarValue::Utf8("1".into())), None);
    }
}
