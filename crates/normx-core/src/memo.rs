//! # The Memo
//!
//! The memo stores every expression built during one query's planning as a
//! graph of groups. An expression's children are group ids, never embedded
//! subtrees, so an expression reachable along many paths is stored once.
//!
//! ## Groups
//!
//! A group is an equivalence class of logically equivalent expressions. Its
//! first member is the normalized (canonical) expression, used by default
//! traversal, by rule pattern matching, and to derive the group's logical
//! properties. Additional members may be appended later by exploration-style
//! callers; they never replace the canonical member.
//!
//! ## Fingerprints
//!
//! A fingerprint is the byte encoding of an expression's operator tag,
//! operator data handle, and child group ids. Since operator data is interned,
//! two expressions are equal iff their fingerprints are byte-identical. The
//! fingerprint index maps the fingerprint of each group's canonical member to
//! the group; this is the deduplication index.
//!
//! ## Ownership
//!
//! The memo owns all groups, expressions, and intern tables. Only the
//! [`Factory`](crate::factory::Factory) mutates it; everything outside this
//! crate gets read-only access.

use crate::error::NormError;
use crate::expr::{Op, OpDef, Private, ScalarValue};
use crate::intern::{ColSet, ColSetId, DatumId, DefId, Interner, ListId};
use crate::metadata::Metadata;
use crate::properties::{self, LogicalProps, RelationalProps, RequiredProps, ScalarProps};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;
use tracing::trace;

/// Identifier of a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl GroupId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Position of an expression within its group's member list.
pub type ExprOrdinal = usize;

/// An expression as stored in the memo: operator tag, operator data, and the
/// interned list of child groups.
///
/// Every field is a handle, so equality is integer equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoExpr {
    pub op: Op,
    pub private: Private,
    pub children: ListId,
}

impl MemoExpr {
    pub fn new(op: Op, private: Private, children: ListId) -> Self {
        Self {
            op,
            private,
            children,
        }
    }
}

/// Canonical byte encoding of a [`MemoExpr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An equivalence class of logically equivalent expressions.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    exprs: Vec<MemoExpr>,
    props: LogicalProps,
}

impl Group {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The canonical member.
    pub fn normalized(&self) -> &MemoExpr {
        &self.exprs[0]
    }

    pub fn exprs(&self) -> &[MemoExpr] {
        &self.exprs
    }

    pub fn props(&self) -> &LogicalProps {
        &self.props
    }
}

/// The memo table.
pub struct Memo {
    metadata: Metadata,
    groups: Vec<Group>,
    fingerprints: HashMap<Fingerprint, GroupId>,
    lists: Interner<Box<[GroupId]>, ListId>,
    col_sets: Interner<ColSet, ColSetId>,
    datums: Interner<ScalarValue, DatumId>,
    defs: Interner<OpDef, DefId>,
    root: Option<GroupId>,
    root_props: RequiredProps,
}

impl Memo {
    pub fn new() -> Self {
        let mut lists: Interner<Box<[GroupId]>, ListId> = Interner::new();
        let empty = lists.intern(Box::default());
        debug_assert_eq!(empty, ListId::EMPTY);
        Self {
            metadata: Metadata::new(),
            groups: Vec::new(),
            fingerprints: HashMap::new(),
            lists,
            col_sets: Interner::new(),
            datums: Interner::new(),
            defs: Interner::new(),
            root: None,
            root_props: RequiredProps::any(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    // ------------------------------------------------------------------
    // Intern tables.
    // ------------------------------------------------------------------

    pub(crate) fn intern_list(&mut self, items: &[GroupId]) -> ListId {
        if items.is_empty() {
            return ListId::EMPTY;
        }
        self.lists.intern(items.into())
    }

    pub(crate) fn intern_col_set(&mut self, cols: ColSet) -> ColSetId {
        self.col_sets.intern(cols)
    }

    pub(crate) fn intern_datum(&mut self, value: ScalarValue) -> DatumId {
        self.datums.intern(value)
    }

    pub(crate) fn intern_def(&mut self, def: OpDef) -> DefId {
        self.defs.intern(def)
    }

    pub fn list(&self, id: ListId) -> &[GroupId] {
        self.lists.get(id)
    }

    pub fn col_set(&self, id: ColSetId) -> &ColSet {
        self.col_sets.get(id)
    }

    pub fn datum(&self, id: DatumId) -> &ScalarValue {
        self.datums.get(id)
    }

    pub fn def(&self, id: DefId) -> &OpDef {
        self.defs.get(id)
    }

    pub fn num_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn num_datums(&self) -> usize {
        self.datums.len()
    }

    // ------------------------------------------------------------------
    // Groups and expressions.
    // ------------------------------------------------------------------

    pub fn fingerprint(&self, expr: &MemoExpr) -> Fingerprint {
        let children = self.list(expr.children);
        let (tag, payload) = expr.private.encode();
        let mut bytes = Vec::with_capacity(11 + 4 * children.len());
        bytes.extend_from_slice(&(expr.op as u16).to_le_bytes());
        bytes.push(tag);
        bytes.extend_from_slice(&payload.to_le_bytes());
        bytes.extend_from_slice(&(children.len() as u32).to_le_bytes());
        for child in children {
            bytes.extend_from_slice(&child.0.to_le_bytes());
        }
        Fingerprint(bytes.into_boxed_slice())
    }

    pub fn group_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<GroupId> {
        self.fingerprints.get(fingerprint).copied()
    }

    /// Add `expr` to the memo as the canonical member of a new group, unless an
    /// equal expression is already memoized, in which case its group is returned
    /// and `expr` is discarded.
    pub(crate) fn memoize_expr(&mut self, expr: MemoExpr) -> GroupId {
        let fingerprint = self.fingerprint(&expr);
        if let Some(group) = self.group_by_fingerprint(&fingerprint) {
            return group;
        }
        let props = properties::derive(self, &expr);
        let id = GroupId(self.groups.len() as u32);
        trace!("Memoized {:?} as new group {}", expr.op, id);
        self.groups.push(Group {
            id,
            exprs: vec![expr],
            props,
        });
        self.fingerprints.insert(fingerprint, id);
        id
    }

    /// Append `expr` as a non-canonical member of `group`.
    ///
    /// Returns the new member's ordinal, or `None` if the expression is already
    /// a member of this group or the canonical member of any group. With
    /// `check` set, panics if `expr` would change the group's logical
    /// properties.
    pub(crate) fn add_expr_to_group(
        &mut self,
        group: GroupId,
        expr: MemoExpr,
        rule: &str,
        check: bool,
    ) -> Option<ExprOrdinal> {
        let fingerprint = self.fingerprint(&expr);
        if self.group_by_fingerprint(&fingerprint).is_some()
            || self.group(group).exprs.contains(&expr)
        {
            return None;
        }
        if check {
            let derived = properties::derive(self, &expr);
            if derived != self.group(group).props {
                panic!(
                    "rule {} added {:?} to group {} with different logical properties:\n\
                     group: {:?}\nexpr:  {:?}",
                    rule,
                    expr.op,
                    group,
                    self.group(group).props,
                    derived
                );
            }
        }
        let members = &mut self.groups[group.index()].exprs;
        members.push(expr);
        trace!("Added {:?} to group {} at ordinal {}", expr.op, group, members.len() - 1);
        Some(members.len() - 1)
    }

    pub fn group(&self, id: GroupId) -> &Group {
        self.groups
            .get(id.index())
            .unwrap_or_else(|| panic!("group {} does not exist", id))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// The canonical member of a group.
    pub fn normalized(&self, id: GroupId) -> &MemoExpr {
        self.group(id).normalized()
    }

    pub fn children(&self, expr: &MemoExpr) -> &[GroupId] {
        self.list(expr.children)
    }

    pub fn properties(&self, id: GroupId) -> &LogicalProps {
        &self.group(id).props
    }

    pub fn try_properties(&self, id: GroupId) -> Result<&LogicalProps, NormError> {
        self.groups
            .get(id.index())
            .map(|g| &g.props)
            .ok_or(NormError::InvalidGroup(id))
    }

    pub fn relational(&self, id: GroupId) -> Option<&RelationalProps> {
        self.properties(id).relational()
    }

    pub fn scalar(&self, id: GroupId) -> Option<&ScalarProps> {
        self.properties(id).scalar()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// The literal value of a group whose canonical member is a constant.
    pub fn const_value(&self, id: GroupId) -> Option<ScalarValue> {
        let expr = self.normalized(id);
        match (expr.op, expr.private) {
            (Op::Const, Private::Datum(d)) => Some(self.datum(d).clone()),
            (Op::True, _) => Some(ScalarValue::Bool(true)),
            (Op::False, _) => Some(ScalarValue::Bool(false)),
            (Op::Null, _) => Some(ScalarValue::Null),
            _ => None,
        }
    }

    pub fn is_true(&self, id: GroupId) -> bool {
        self.normalized(id).op == Op::True
    }

    pub fn is_false(&self, id: GroupId) -> bool {
        self.normalized(id).op == Op::False
    }

    // ------------------------------------------------------------------
    // Root.
    // ------------------------------------------------------------------

    pub(crate) fn set_root(&mut self, group: GroupId, props: RequiredProps) {
        self.root = Some(group);
        self.root_props = props;
    }

    pub fn root_group(&self) -> Option<GroupId> {
        self.root
    }

    pub fn root_props(&self) -> &RequiredProps {
        &self.root_props
    }

    // ------------------------------------------------------------------
    // Display.
    // ------------------------------------------------------------------

    /// Render the normalized expression tree rooted at `group`, one
    /// expression per line.
    pub fn format_tree(&self, group: GroupId) -> String {
        let mut out = String::new();
        self.format_group(group, 0, &mut out);
        out
    }

    fn format_group(&self, group: GroupId, indent: usize, out: &mut String) {
        let expr = self.normalized(group);
        let _ = write!(out, "{:indent$}{:?}", "", expr.op, indent = indent * 2);
        match expr.private {
            Private::Column(col) => {
                let _ = write!(out, " {}", self.metadata.column(col).name);
            }
            Private::Datum(d) => {
                let _ = write!(out, " {}", self.datum(d));
            }
            Private::Type(t) => {
                let _ = write!(out, " {:?}", t);
            }
            Private::Def(d) => match self.def(d) {
                OpDef::Scan(def) => {
                    let _ = write!(
                        out,
                        " {} {}",
                        self.metadata.table(def.table).name,
                        self.col_set(def.cols)
                    );
                }
                OpDef::Values(def) => {
                    let cols: ColSet = def.cols.iter().copied().collect();
                    let _ = write!(out, " {}", cols);
                }
                OpDef::Projections(def) => {
                    let synthesized: ColSet = def.synthesized.iter().copied().collect();
                    let _ = write!(
                        out,
                        " {} passthrough={}",
                        synthesized,
                        self.col_set(def.passthrough)
                    );
                }
                OpDef::Placeholder(def) => {
                    let _ = write!(out, " ${}", def.index);
                }
            },
            Private::None => {}
        }
        let _ = writeln!(out, " [{}]", group);
        for child in self.list(expr.children) {
            self.format_group(*child, indent + 1, out);
        }
    }
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}
