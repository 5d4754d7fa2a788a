//! # Query Metadata
//!
//! The metadata records the tables and columns a single query refers to.
//! Column identifiers are assigned here and are unique within one memo; the
//! property derivation code consults the metadata for column types,
//! nullability, and table keys.
//!
//! Unlike the memo's intern tables, the metadata is populated by the caller
//! (typically the tree builder) before the expressions that reference it are
//! constructed. It holds no expressions, so mutating it cannot break sharing.

use crate::expr::{ColumnId, DataType, TableId};
use crate::intern::ColSet;

/// Metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Owning table, or `None` for columns synthesized by projections.
    pub table: Option<TableId>,
}

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub primary_key: Option<ColSet>,
}

/// Tables and columns referenced by a query.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    columns: Vec<ColumnMeta>,
    tables: Vec<TableMeta>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table and assign ids to its columns.
    ///
    /// Columns are given as `(name, type, nullable)`.
    pub fn add_table(&mut self, name: &str, columns: &[(&str, DataType, bool)]) -> TableId {
        let table = TableId(self.tables.len() as u32);
        let ids = columns
            .iter()
            .map(|(col_name, data_type, nullable)| {
                self.push_column(ColumnMeta {
                    name: format!("{}.{}", name, col_name),
                    data_type: *data_type,
                    nullable: *nullable,
                    table: Some(table),
                })
            })
            .collect();
        self.tables.push(TableMeta {
            name: name.to_string(),
            columns: ids,
            primary_key: None,
        });
        table
    }

    pub fn set_primary_key(&mut self, table: TableId, key: &[ColumnId]) {
        self.tables[table.0 as usize].primary_key = Some(key.iter().copied().collect());
    }

    /// Register a column that is computed by the query rather than read from a table.
    pub fn add_column(&mut self, name: &str, data_type: DataType) -> ColumnId {
        self.push_column(ColumnMeta {
            name: name.to_string(),
            data_type,
            nullable: true,
            table: None,
        })
    }

    fn push_column(&mut self, meta: ColumnMeta) -> ColumnId {
        let id = ColumnId(self.columns.len() as u32);
        self.columns.push(meta);
        id
    }

    pub fn column(&self, id: ColumnId) -> &ColumnMeta {
        &self.columns[id.0 as usize]
    }

    pub fn table(&self, id: TableId) -> &TableMeta {
        &self.tables[id.0 as usize]
    }

    /// All columns of a table as a set.
    pub fn table_cols(&self, id: TableId) -> ColSet {
        self.table(id).columns.iter().copied().collect()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}
