//! DDL statements.

use crate::expr::Expr;
use crate::{ColumnName, IndexName, TableName, TriggerName};

/// A column type as the server spells it, e.g. `int(10) unsigned`.
///
/// Types are taken verbatim from `INFORMATION_SCHEMA.COLUMNS.COLUMN_TYPE`
/// and are rendered without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlType(String);

impl SqlType {
    pub fn new(ty: impl Into<String>) -> Self {
        Self(ty.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bigint_unsigned() -> Self {
        Self::new("bigint unsigned")
    }

    pub fn int_unsigned() -> Self {
        Self::new("int unsigned")
    }

    pub fn text() -> Self {
        Self::new("text")
    }

    pub fn datetime() -> Self {
        Self::new("datetime")
    }

    pub fn timestamp() -> Self {
        Self::new("timestamp")
    }

    pub fn boolean() -> Self {
        Self::new("boolean")
    }

    /// `enum('A','B')` with escaped variants.
    pub fn enumeration<S: AsRef<str>>(variants: &[S]) -> Self {
        let variants: Vec<String> = variants
            .iter()
            .map(|v| crate::escape_string(v.as_ref()))
            .collect();
        Self(format!("enum({})", variants.join(",")))
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A column definition in CREATE TABLE or ALTER TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: ColumnName,
    pub ty: SqlType,
    /// `Some(true)` renders NULL, `Some(false)` NOT NULL, `None` nothing.
    pub nullable: Option<bool>,
    pub default: Option<Expr>,
    pub auto_increment: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<ColumnName>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            charset: None,
            collation: None,
            nullable: None,
            default: None,
            auto_increment: false,
        }
    }

    pub fn null(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn default(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Rendered bare: catalog names like `utf8mb4`, never user input.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// An index definition, inline in CREATE TABLE or in ALTER TABLE ADD.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    /// Unnamed indexes get a server-chosen name (the first column's).
    pub name: Option<IndexName>,
    pub columns: Vec<ColumnName>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(columns: impl IntoIterator<Item = ColumnName>) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().collect(),
            unique: false,
        }
    }

    pub fn named(
        name: impl Into<IndexName>,
        columns: impl IntoIterator<Item = ColumnName>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(columns)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// CREATE TABLE with explicit columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: TableName,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub engine: Option<String>,
}

impl CreateTable {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            engine: None,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }
}

/// CREATE TABLE t LIKE other
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableLike {
    pub table: TableName,
    pub like: TableName,
}

impl CreateTableLike {
    pub fn new(table: impl Into<TableName>, like: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            like: like.into(),
        }
    }
}

/// One clause of an ALTER TABLE.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOp {
    AddColumn(ColumnDef),
    ModifyColumn(ColumnDef),
    DropColumn(ColumnName),
    DropPrimaryKey,
    AddPrimaryKey(Vec<ColumnName>),
    AddIndex(IndexDef),
    DropIndex(IndexName),
    Comment(String),
}

/// ALTER TABLE with one or more clauses, applied atomically by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: TableName,
    pub ops: Vec<AlterOp>,
}

impl AlterTable {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            ops: Vec::new(),
        }
    }

    pub fn op(mut self, op: AlterOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn ops(mut self, ops: impl IntoIterator<Item = AlterOp>) -> Self {
        self.ops.extend(ops);
        self
    }
}

/// DROP TABLE [IF EXISTS]
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub table: TableName,
    pub if_exists: bool,
}

impl DropTable {
    pub fn if_exists(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            if_exists: true,
        }
    }
}

/// DROP TRIGGER [IF EXISTS]
#[derive(Debug, Clone, PartialEq)]
pub struct DropTrigger {
    pub name: TriggerName,
    pub if_exists: bool,
}

impl DropTrigger {
    pub fn if_exists(name: impl Into<TriggerName>) -> Self {
        Self {
            name: name.into(),
            if_exists: true,
        }
    }
}
