//! SQL statements.

use crate::ddl::{AlterTable, CreateTable, CreateTableLike, DropTable, DropTrigger};
use crate::expr::{ColumnRef, Expr};
use crate::routine::CreateTrigger;
use crate::{ColumnName, TableName, VarName};

/// A SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTable),
    CreateTableLike(CreateTableLike),
    AlterTable(AlterTable),
    DropTable(DropTable),
    CreateTrigger(CreateTrigger),
    DropTrigger(DropTrigger),
}

macro_rules! impl_from_for_stmt {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Stmt {
                fn from(stmt: $ty) -> Self {
                    Stmt::$variant(stmt)
                }
            }
        )*
    };
}

impl_from_for_stmt! {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTable),
    CreateTableLike(CreateTableLike),
    AlterTable(AlterTable),
    DropTable(DropTable),
    CreateTrigger(CreateTrigger),
    DropTrigger(DropTrigger),
}

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStmt {
    pub columns: Vec<SelectColumn>,
    /// `SELECT ... INTO var, ...` targets (stored programs only)
    pub into: Vec<VarName>,
    pub from: Option<FromClause>,
    pub joins: Vec<Join>,
    pub where_: Option<Expr>,
    pub limit: Option<u64>,
}

/// A column in a SELECT clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expr: Expr,
    pub alias: Option<ColumnName>,
}

impl SelectColumn {
    pub fn expr(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<ColumnName>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: TableName,
    pub alias: Option<TableName>,
}

impl FromClause {
    pub fn table(name: impl Into<TableName>) -> Self {
        Self {
            table: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<TableName>, alias: impl Into<TableName>) -> Self {
        Self {
            table: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableName,
    pub alias: Option<TableName>,
    pub on: Expr,
}

impl Join {
    pub fn inner(table: impl Into<TableName>, alias: impl Into<TableName>, on: Expr) -> Self {
        Self {
            kind: JoinKind::Inner,
            table: table.into(),
            alias: Some(alias.into()),
            on,
        }
    }

    pub fn left(table: impl Into<TableName>, alias: impl Into<TableName>, on: Expr) -> Self {
        Self {
            kind: JoinKind::Left,
            table: table.into(),
            alias: Some(alias.into()),
            on,
        }
    }
}

/// Type of JOIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

// ============================================================================
// INSERT / REPLACE statement
// ============================================================================

/// Leading verb of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertVerb {
    #[default]
    Insert,
    /// INSERT IGNORE: duplicate-key rows are dropped with a warning
    InsertIgnore,
    /// REPLACE: duplicate-key rows are deleted, then inserted
    Replace,
}

impl InsertVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            InsertVerb::Insert => "INSERT INTO",
            InsertVerb::InsertIgnore => "INSERT IGNORE INTO",
            InsertVerb::Replace => "REPLACE INTO",
        }
    }
}

/// Where inserted rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Expr>),
    Select(Box<SelectStmt>),
}

/// An INSERT (or REPLACE) statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub verb: InsertVerb,
    pub table: TableName,
    pub columns: Vec<ColumnName>,
    pub source: InsertSource,
}

/// An assignment in UPDATE SET.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAssignment {
    pub column: ColumnRef,
    pub value: Expr,
}

impl UpdateAssignment {
    pub fn new(column: ColumnRef, value: Expr) -> Self {
        Self { column, value }
    }
}

// ============================================================================
// UPDATE statement
// ============================================================================

/// An UPDATE statement, optionally multi-table.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: TableName,
    pub alias: Option<TableName>,
    pub joins: Vec<Join>,
    pub assignments: Vec<UpdateAssignment>,
    pub where_: Option<Expr>,
}

// ============================================================================
// DELETE statement
// ============================================================================

/// A DELETE statement.
///
/// With joins this renders the multi-table form `DELETE alias FROM ...`,
/// which MySQL does not allow to carry a LIMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: TableName,
    pub alias: Option<TableName>,
    pub joins: Vec<Join>,
    pub where_: Option<Expr>,
    pub limit: Option<u64>,
}

// ============================================================================
// Builder-style constructors
// ============================================================================

impl SelectStmt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, col: SelectColumn) -> Self {
        self.columns.push(col);
        self
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = SelectColumn>) -> Self {
        self.columns.extend(cols);
        self
    }

    pub fn exprs(self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.columns(exprs.into_iter().map(SelectColumn::expr))
    }

    pub fn into_vars(mut self, vars: impl IntoIterator<Item = VarName>) -> Self {
        self.into.extend(vars);
        self
    }

    pub fn from(mut self, from: FromClause) -> Self {
        self.from = Some(from);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }

    pub fn and_where(mut self, expr: Expr) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl InsertStmt {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            verb: InsertVerb::Insert,
            table: table.into(),
            columns: Vec::new(),
            source: InsertSource::Values(Vec::new()),
        }
    }

    /// INSERT INTO table (columns) SELECT ...
    pub fn select(
        table: impl Into<TableName>,
        columns: impl IntoIterator<Item = ColumnName>,
        select: SelectStmt,
    ) -> Self {
        Self {
            verb: InsertVerb::Insert,
            table: table.into(),
            columns: columns.into_iter().collect(),
            source: InsertSource::Select(Box::new(select)),
        }
    }

    /// Add a column with its VALUES expression.
    ///
    /// Only meaningful for VALUES inserts; a SELECT source is left untouched
    /// apart from the column list.
    pub fn column(mut self, name: impl Into<ColumnName>, value: Expr) -> Self {
        self.columns.push(name.into());
        if let InsertSource::Values(values) = &mut self.source {
            values.push(value);
        }
        self
    }

    pub fn verb(mut self, verb: InsertVerb) -> Self {
        self.verb = verb;
        self
    }

    pub fn ignore(self) -> Self {
        self.verb(InsertVerb::InsertIgnore)
    }

    pub fn replace(self) -> Self {
        self.verb(InsertVerb::Replace)
    }
}

impl UpdateStmt {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            joins: Vec::new(),
            assignments: Vec::new(),
            where_: None,
        }
    }

    pub fn aliased(table: impl Into<TableName>, alias: impl Into<TableName>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::new(table)
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn set(mut self, column: impl Into<ColumnName>, value: Expr) -> Self {
        self.assignments
            .push(UpdateAssignment::new(ColumnRef::new(column.into()), value));
        self
    }

    pub fn set_qualified(
        mut self,
        table: impl Into<TableName>,
        column: impl Into<ColumnName>,
        value: Expr,
    ) -> Self {
        self.assignments.push(UpdateAssignment::new(
            ColumnRef::qualified(table.into(), column.into()),
            value,
        ));
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }

    pub fn and_where(mut self, expr: Expr) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }
}

impl DeleteStmt {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            joins: Vec::new(),
            where_: None,
            limit: None,
        }
    }

    pub fn aliased(table: impl Into<TableName>, alias: impl Into<TableName>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::new(table)
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }

    pub fn and_where(mut self, expr: Expr) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
