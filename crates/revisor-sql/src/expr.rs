//! SQL expressions.

use crate::stmt::SelectStmt;
use crate::{ColumnName, TableName, VarName};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference
    Column(ColumnRef),
    /// `NEW.col` inside a trigger body
    New(ColumnName),
    /// `OLD.col` inside a trigger body
    Old(ColumnName),
    /// A stored-program local variable
    Var(VarName),
    /// A session user variable (`@name`)
    UserVar(VarName),
    /// A string literal
    String(String),
    /// An integer literal
    Int(i64),
    /// A boolean literal
    Bool(bool),
    /// NULL
    Null,
    /// NOW() function
    Now,
    /// Binary operation (e.g., a = b, a AND b)
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// NOT (expr)
    Not(Box<Expr>),
    /// expr IN (SELECT ...)
    InSelect {
        expr: Box<Expr>,
        select: Box<SelectStmt>,
    },
    /// Function call
    FnCall { name: String, args: Vec<Expr> },
    /// Raw SQL (escape hatch)
    Raw(String),
}

/// A column reference, optionally qualified with table/alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<TableName>,
    pub column: ColumnName,
}

impl ColumnRef {
    pub fn new(column: ColumnName) -> Self {
        Self {
            table: None,
            column,
        }
    }

    pub fn qualified(table: TableName, column: ColumnName) -> Self {
        Self {
            table: Some(table),
            column,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    /// Null-safe equality, `<=>`
    NullSafeEq,
    Gt,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::Ne => "!=",
            BinOp::NullSafeEq => "<=>",
            BinOp::Gt => ">",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }

    /// Binding strength; operands with a lower value get parenthesized.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::NullSafeEq | BinOp::Gt => 3,
        }
    }
}

// Convenience constructors
impl Expr {
    pub fn column(name: impl Into<ColumnName>) -> Self {
        Expr::Column(ColumnRef::new(name.into()))
    }

    pub fn qualified_column(table: impl Into<TableName>, column: impl Into<ColumnName>) -> Self {
        Expr::Column(ColumnRef::qualified(table.into(), column.into()))
    }

    pub fn new_row(column: impl Into<ColumnName>) -> Self {
        Expr::New(column.into())
    }

    pub fn old_row(column: impl Into<ColumnName>) -> Self {
        Expr::Old(column.into())
    }

    pub fn var(name: impl Into<VarName>) -> Self {
        Expr::Var(name.into())
    }

    pub fn user_var(name: impl Into<VarName>) -> Self {
        Expr::UserVar(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn bool(b: bool) -> Self {
        Expr::Bool(b)
    }

    /// `LAST_INSERT_ID()`
    pub fn last_insert_id() -> Self {
        Expr::FnCall {
            name: "LAST_INSERT_ID".into(),
            args: Vec::new(),
        }
    }

    /// `ROW_COUNT()`
    pub fn row_count() -> Self {
        Expr::FnCall {
            name: "ROW_COUNT".into(),
            args: Vec::new(),
        }
    }

    fn binop(self, op: BinOp, other: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    /// Create an equality expression: self = other
    pub fn eq(self, other: Expr) -> Self {
        self.binop(BinOp::Eq, other)
    }

    /// Create an inequality expression: self != other
    pub fn ne(self, other: Expr) -> Self {
        self.binop(BinOp::Ne, other)
    }

    /// Create a null-safe equality expression: self <=> other
    pub fn null_safe_eq(self, other: Expr) -> Self {
        self.binop(BinOp::NullSafeEq, other)
    }

    /// Create a comparison: self > other
    pub fn gt(self, other: Expr) -> Self {
        self.binop(BinOp::Gt, other)
    }

    /// Create an AND expression: self AND other
    pub fn and(self, other: Expr) -> Self {
        self.binop(BinOp::And, other)
    }

    /// Create an OR expression: self OR other
    pub fn or(self, other: Expr) -> Self {
        self.binop(BinOp::Or, other)
    }

    /// Create IS NULL expression
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// Create IS NOT NULL expression
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// Create NOT (self)
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Create `self IN (select)`
    pub fn in_select(self, select: SelectStmt) -> Self {
        Expr::InSelect {
            expr: Box::new(self),
            select: Box::new(select),
        }
    }

    /// Fold expressions with AND. Returns `None` for an empty iterator.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Fold expressions with OR. Returns `None` for an empty iterator.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        exprs.into_iter().reduce(Expr::or)
    }
}
