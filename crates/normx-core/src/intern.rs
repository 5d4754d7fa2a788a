//! # Intern Tables
//!
//! Hash-consing stores for the immutable payloads expressions refer to. Each
//! distinct payload is stored exactly once; callers get back a small integer
//! handle, and two handles are equal iff their payloads are structurally
//! equal. This is what lets fingerprints and rule pattern checks compare
//! payloads by integer equality.
//!
//! Tables only grow. Handles stay valid for the lifetime of the memo that owns
//! the table. Storage is insertion-ordered (`IndexSet`), so handle assignment
//! is deterministic for a given construction sequence.

use crate::expr::ColumnId;
use indexmap::IndexSet;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                $name(index)
            }
        }
    };
}

define_handle!(
    /// Handle of an interned list of child groups.
    ListId
);
define_handle!(
    /// Handle of an interned column set.
    ColSetId
);
define_handle!(
    /// Handle of an interned literal value.
    DatumId
);
define_handle!(
    /// Handle of an interned operator metadata block.
    DefId
);

impl ListId {
    /// The empty list, interned by every memo on creation.
    pub const EMPTY: ListId = ListId(0);
}

/// Insertion-ordered hash-consing table.
///
/// `H` is the handle type returned for payloads of type `T`.
pub struct Interner<T, H> {
    items: IndexSet<T>,
    _handle: PhantomData<H>,
}

impl<T, H> Interner<T, H>
where
    T: Eq + Hash,
    H: From<u32> + Into<u32> + Copy,
{
    pub fn new() -> Self {
        Self {
            items: IndexSet::new(),
            _handle: PhantomData,
        }
    }

    /// Return the handle of `item`, storing it first if no equal payload exists.
    pub fn intern(&mut self, item: T) -> H {
        let (index, _) = self.items.insert_full(item);
        H::from(index as u32)
    }

    pub fn get(&self, handle: H) -> &T {
        let index: u32 = handle.into();
        self.items
            .get_index(index as usize)
            .unwrap_or_else(|| panic!("intern handle {} out of range", index))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T, H> Default for Interner<T, H>
where
    T: Eq + Hash,
    H: From<u32> + Into<u32> + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! handle_into_u32 {
    ($($name:ident),*) => {
        $(impl From<$name> for u32 {
            fn from(handle: $name) -> u32 {
                handle.0
            }
        })*
    };
}

handle_into_u32!(ListId, ColSetId, DatumId, DefId);

/// Ordered set of column identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColSet(BTreeSet<ColumnId>);

impl ColSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, col: ColumnId) {
        self.0.insert(col);
    }

    pub fn contains(&self, col: ColumnId) -> bool {
        self.0.contains(&col)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &ColSet) -> ColSet {
        ColSet(self.0.union(&other.0).copied().collect())
    }

    pub fn union_with(&mut self, other: &ColSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn intersection(&self, other: &ColSet) -> ColSet {
        ColSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn difference(&self, other: &ColSet) -> ColSet {
        ColSet(self.0.difference(&other.0).copied().collect())
    }

    pub fn is_subset(&self, other: &ColSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl FromIterator<ColumnId> for ColSet {
    fn from_iter<I: IntoIterator<Item = ColumnId>>(iter: I) -> Self {
        ColSet(iter.into_iter().collect())
    }
}

impl fmt::Display for ColSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, col) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", col.0)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_payloads_share_handle() {
        let mut table: Interner<Vec<u32>, ListId> = Interner::new();
        let a = table.intern(vec![1, 2, 3]);
        let b = table.intern(vec![4]);
        let c = table.intern(vec![1, 2, 3]);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b), &vec![4]);
    }

    #[test]
    fn test_handles_assigned_in_insertion_order() {
        let mut table: Interner<String, DatumId> = Interner::new();
        assert_eq!(table.intern("x".to_string()).index(), 0);
        assert_eq!(table.intern("y".to_string()).index(), 1);
        assert_eq!(table.intern("x".to_string()).index(), 0);
        assert_eq!(table.get(DatumId::from(1)), "y");
    }

    #[test]
    fn test_colset_operations() {
        let a: ColSet = [ColumnId(1), ColumnId(2)].into_iter().collect();
        let b: ColSet = [ColumnId(2), ColumnId(3)].into_iter().collect();
        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![ColumnId(2)]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![ColumnId(1)]);
        assert!(a.intersection(&b).is_subset(&a));
        assert_eq!(a.to_string(), "(1,2)");
    }
}
