//! The revisioning model: tables as introspected, and groups of them sharing
//! one revision lifecycle.

use std::fmt;
use std::str::FromStr;

use revisor_sql::{ColumnDef, ColumnName, IndexName, SqlType, TableName};

use crate::Error;

/// A column of a live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnModel {
    pub name: ColumnName,
    /// Declared type, verbatim from `COLUMN_TYPE` (e.g. `int(10) unsigned`).
    pub ty: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Set on string columns only.
    pub charset: Option<String>,
    pub collation: Option<String>,
}

impl ColumnModel {
    /// The column's type, character set and collation, without nullability.
    /// `COLUMN_TYPE` alone would let a redefinition fall back to the table
    /// default.
    pub fn definition(&self) -> ColumnDef {
        let mut def = ColumnDef::new(self.name.clone(), self.ty.clone());
        if let Some(charset) = &self.charset {
            def = def.charset(charset.as_str());
        }
        if let Some(collation) = &self.collation {
            def = def.collate(collation.as_str());
        }
        def
    }
}

/// A named unique index and its columns, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub name: IndexName,
    pub columns: Vec<ColumnName>,
}

/// A live table, minus any columns revisioning added to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableModel {
    pub name: TableName,
    /// Columns in declaration order.
    pub columns: Vec<ColumnModel>,
    /// Primary key columns in key order. Empty only for key-less children.
    pub primary_key: Vec<ColumnName>,
    /// Unique indexes, excluding the ones revisioning owns.
    pub unique_indexes: Vec<UniqueIndex>,
    pub auto_increment: Option<ColumnName>,
}

impl TableModel {
    pub fn column_names(&self) -> Vec<ColumnName> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.name.as_str() == name)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The primary key columns with their full definitions.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnModel> {
        self.primary_key.iter().filter_map(|name| self.column(name.as_str()))
    }
}

/// How a child table hangs off its group's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    pub parent: TableName,
    /// Column in the child referencing the parent.
    pub foreign_key: ColumnName,
    /// Column in the parent the foreign key points at.
    pub parent_key: ColumnName,
}

/// A child table together with its link to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildTable {
    pub table: TableModel,
    pub link: ChildLink,
    /// `_revision_<child>` already exists.
    pub storage_exists: bool,
}

/// Which body the root's after-insert/after-update triggers get.
///
/// Decided once while building the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerShape {
    /// No children: resolve the revision and log history.
    Single,
    /// Additionally snapshot (or, on revert, restore) these children.
    WithChildren(Vec<ChildTable>),
}

impl TriggerShape {
    pub fn children(&self) -> &[ChildTable] {
        match self {
            TriggerShape::Single => &[],
            TriggerShape::WithChildren(children) => children,
        }
    }
}

/// A root and its children, installed and removed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGroup {
    pub root: TableModel,
    pub shape: TriggerShape,
    /// The root's storage already exists: skip its DDL. Children carry their
    /// own flag, so a child added later still gets its snapshot table.
    pub structural_skip: bool,
}

impl TableGroup {
    pub fn children(&self) -> &[ChildTable] {
        self.shape.children()
    }
}

/// A root table name and its ordered child table names.
///
/// Parses from `root(child1, child2)`, `root,child1,child2` or any mix of
/// commas, parentheses and whitespace; the first name is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub root: TableName,
    pub children: Vec<TableName>,
}

impl GroupSpec {
    pub fn new(root: impl Into<TableName>) -> Self {
        Self {
            root: root.into(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<TableName>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Root first, then children in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableName> {
        std::iter::once(&self.root).chain(self.children.iter())
    }
}

impl FromStr for GroupSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut names = s
            .split(|c: char| c == ',' || c == '(' || c == ')' || c.is_whitespace())
            .filter(|name| !name.is_empty());

        let root = names
            .next()
            .ok_or_else(|| Error::InvalidGroupSpec(s.to_owned()))?;

        Ok(GroupSpec {
            root: root.into(),
            children: names.map(TableName::from).collect(),
        })
    }
}

impl fmt::Display for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        if !self.children.is_empty() {
            let children: Vec<&str> = self.children.iter().map(|c| c.as_str()).collect();
            write!(f, "({})", children.join(", "))?;
        }
        Ok(())
    }
}
