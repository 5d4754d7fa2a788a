//! Property tests for the scalar rules of the default catalog.

use normx_core::expr::{DataType, Op, ScalarValue};
use normx_core::factory::{Factory, FactoryConfig};
use normx_rules::default_rule_registry;
use proptest::prelude::*;
use std::sync::Arc;

fn factory() -> Factory {
    Factory::new(
        Arc::new(default_rule_registry()),
        FactoryConfig {
            check_consistency: true,
        },
    )
}

fn comparison() -> impl Strategy<Value = Op> {
    prop::sample::select(vec![Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge])
}

proptest! {
    #[test]
    fn test_integer_folding_matches_checked_arithmetic(
        a in any::<i64>(),
        b in prop_oneof![Just(0i64), Just(-1i64), -1000i64..1000, any::<i64>()],
        op in prop::sample::select(vec![Op::Plus, Op::Minus, Op::Mult, Op::Div]),
    ) {
        let mut f = factory();
        let left = f.construct_const_val(ScalarValue::Int64(a));
        let right = f.construct_const_val(ScalarValue::Int64(b));
        let result = f.construct_binary(op, left, right);
        let expected = match op {
            Op::Plus => a.checked_add(b),
            Op::Minus => a.checked_sub(b),
            Op::Mult => a.checked_mul(b),
            _ => a.checked_div(b),
        };
        match expected {
            Some(v) => prop_assert_eq!(f.memo().const_value(result), Some(ScalarValue::Int64(v))),
            None => prop_assert_eq!(f.memo().normalized(result).op, op),
        }
    }

    #[test]
    fn test_comparison_spellings_converge(v in -5i64..5, op in comparison()) {
        let mut f = factory();
        let col = f.metadata_mut().add_column("x", DataType::Int64);
        let x = f.construct_variable(col);
        let c = f.construct_const_val(ScalarValue::Int64(v));
        let const_left = f.construct_binary(op, c, x);
        let commuted = op.commuted().expect("comparison");
        prop_assert_eq!(f.construct_binary(commuted, x, c), const_left);
    }

    #[test]
    fn test_double_negation(v in -5i64..5, op in comparison()) {
        let mut f = factory();
        let col = f.metadata_mut().add_column("x", DataType::Int64);
        let x = f.construct_variable(col);
        let c = f.construct_const_val(ScalarValue::Int64(v));
        let cmp = f.construct_binary(op, x, c);
        let not = f.construct_not(cmp);
        prop_assert_ne!(not, cmp);
        prop_assert_eq!(f.construct_not(not), cmp);
    }
}
