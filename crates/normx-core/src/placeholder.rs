//! # Placeholder Rebinding
//!
//! A prepared statement is normalized once with its parameters left as
//! `Placeholder` expressions. When it is executed with concrete values, the
//! rooted tree is walked top-down and every placeholder is replaced by a
//! literal. Since a parent's fingerprint depends on its children's group ids,
//! every ancestor of a replaced placeholder is rebuilt through
//! [`Factory::construct`]. That re-enters normalization, so rules that could
//! not fire on an opaque placeholder (constant folding, filter elimination,
//! limit elimination) fire now.
//!
//! Groups without placeholders are shared as-is: the walk never descends into
//! them, and they keep their group ids in the rebuilt tree.

use crate::error::NormError;
use crate::expr::{Op, OpDef, PlaceholderDef, Private, ScalarValue};
use crate::factory::Factory;
use crate::memo::{GroupId, Memo, MemoExpr};
use std::collections::HashMap;
use tracing::debug;

impl Factory {
    /// Replace every placeholder `$i` under the root with `values[i]` and
    /// renormalize. The rebuilt root becomes the memo's root, with the same
    /// required properties; its group id is returned.
    pub fn assign_placeholders(&mut self, values: &[ScalarValue]) -> Result<GroupId, NormError> {
        let root = self.memo().root_group().ok_or(NormError::NoRoot)?;
        let props = self.memo().root_props().clone();

        let mut rebuilt = HashMap::new();
        let new_root = self.replace_placeholders(root, values, &mut rebuilt)?;
        debug!(
            "Assigned {} placeholder values, rebuilt {} groups, root {} -> {}",
            values.len(),
            rebuilt.len(),
            root,
            new_root
        );
        self.set_root(new_root, props);
        Ok(new_root)
    }

    fn replace_placeholders(
        &mut self,
        group: GroupId,
        values: &[ScalarValue],
        rebuilt: &mut HashMap<GroupId, GroupId>,
    ) -> Result<GroupId, NormError> {
        if let Some(done) = rebuilt.get(&group) {
            return Ok(*done);
        }
        if !self.memo().properties(group).has_placeholder() {
            return Ok(group);
        }

        let expr = *self.memo().normalized(group);
        let result = match placeholder_def(self.memo(), &expr) {
            Some(def) => self.bind(def, values)?,
            None => {
                let children = self.memo().children(&expr).to_vec();
                let mut replaced = Vec::with_capacity(children.len());
                for child in &children {
                    replaced.push(self.replace_placeholders(*child, values, rebuilt)?);
                }
                if replaced == children {
                    group
                } else {
                    self.construct(expr.op, expr.private, &replaced)
                }
            }
        };
        rebuilt.insert(group, result);
        Ok(result)
    }

    fn bind(&mut self, def: PlaceholderDef, values: &[ScalarValue]) -> Result<GroupId, NormError> {
        let value = values
            .get(def.index as usize)
            .ok_or(NormError::UnboundPlaceholder(def.index))?;
        if value.is_null() {
            return Ok(self.construct_null(def.data_type));
        }
        if !value.data_type().is_compatible(def.data_type) {
            return Err(NormError::PlaceholderTypeMismatch {
                index: def.index,
                expected: def.data_type,
                actual: value.data_type(),
            });
        }
        Ok(self.construct_const_val(value.clone()))
    }
}

fn placeholder_def(memo: &Memo, expr: &MemoExpr) -> Option<PlaceholderDef> {
    match (expr.op, expr.private) {
        (Op::Placeholder, Private::Def(d)) => match memo.def(d) {
            OpDef::Placeholder(def) => Some(*def),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::DataType;
    use crate::factory::FactoryConfig;
    use crate::properties::RequiredProps;
    use crate::rule::RuleRegistry;
    use std::sync::Arc;

    fn factory() -> Factory {
        Factory::new(
            Arc::new(RuleRegistry::new()),
            FactoryConfig {
                check_consistency: true,
            },
        )
    }

    #[test]
    fn test_no_root() {
        let mut f = factory();
        assert_eq!(f.assign_placeholders(&[]), Err(NormError::NoRoot));
    }

    #[test]
    fn test_unbound_and_mismatched() {
        let mut f = factory();
        let p = f.construct_placeholder(1, DataType::Int64);
        f.set_root(p, RequiredProps::any());
        assert_eq!(
            f.assign_placeholders(&[ScalarValue::Int64(1)]),
            Err(NormError::UnboundPlaceholder(1))
        );
        assert_eq!(
            f.assign_placeholders(&[ScalarValue::Int64(1), ScalarValue::Utf8("x".into())]),
            Err(NormError::PlaceholderTypeMismatch {
                index: 1,
                expected: DataType::Int64,
                actual: DataType::Utf8,
            })
        );
        // A failed assignment leaves the root alone.
        assert_eq!(f.memo().root_group(), Some(p));
    }

    #[test]
    fn test_rebuilds_only_placeholder_ancestors() {
        let mut f = factory();
        let one = f.construct_const_val(ScalarValue::Int64(1));
        let two = f.construct_const_val(ScalarValue::Int64(2));
        let fixed = f.construct_binary(Op::Plus, one, two);
        let p = f.construct_placeholder(0, DataType::Int64);
        let open = f.construct_binary(Op::Mult, p, one);
        let root = f.construct_tuple(&[fixed, open]);
        f.set_root(root, RequiredProps::any());

        let new_root = f.assign_placeholders(&[ScalarValue::Null]).expect("assign");
        assert_ne!(new_root, root);
        let children = f.memo().children(f.memo().normalized(new_root)).to_vec();
        assert_eq!(children[0], fixed);
        let mult = f.memo().normalized(children[1]);
        let operands = f.memo().children(mult);
        assert_eq!(f.memo().const_value(operands[0]), Some(ScalarValue::Null));
        assert_eq!(
            f.memo().scalar(operands[0]).map(|p| p.data_type),
            Some(DataType::Int64)
        );
        assert!(!f.memo().properties(new_root).has_placeholder());
        assert_eq!(f.memo().root_group(), Some(new_root));
    }
}
