//! Trigger definitions and the stored-program statements they contain.

use crate::ddl::SqlType;
use crate::expr::Expr;
use crate::stmt::Stmt;
use crate::{TableName, TriggerName, VarName};

/// BEFORE or AFTER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

impl TriggerTiming {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
        }
    }
}

/// The row event a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        }
    }
}

/// CREATE TRIGGER ... FOR EACH ROW BEGIN ... END
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTrigger {
    pub name: TriggerName,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: TableName,
    pub body: Block,
}

impl CreateTrigger {
    pub fn new(
        name: impl Into<TriggerName>,
        timing: TriggerTiming,
        event: TriggerEvent,
        table: impl Into<TableName>,
        body: Block,
    ) -> Self {
        Self {
            name: name.into(),
            timing,
            event,
            table: table.into(),
            body,
        }
    }
}

/// A BEGIN ... END block. Declarations always precede statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub declarations: Vec<Declare>,
    pub statements: Vec<ProcStmt>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, declaration: Declare) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn declares(mut self, declarations: impl IntoIterator<Item = Declare>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn stmt(mut self, stmt: impl Into<ProcStmt>) -> Self {
        self.statements.push(stmt.into());
        self
    }

    pub fn stmts(mut self, stmts: impl IntoIterator<Item = ProcStmt>) -> Self {
        self.statements.extend(stmts);
        self
    }
}

/// A DECLARE in a stored-program block.
#[derive(Debug, Clone, PartialEq)]
pub enum Declare {
    /// DECLARE var type
    Var { name: VarName, ty: SqlType },
    /// DECLARE CONTINUE HANDLER FOR <errno> BEGIN END
    ///
    /// Swallows the given server error number and resumes with the next
    /// statement.
    IgnoreError(u16),
}

impl Declare {
    pub fn var(name: impl Into<VarName>, ty: SqlType) -> Self {
        Declare::Var {
            name: name.into(),
            ty,
        }
    }
}

/// A statement inside a stored-program block.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcStmt {
    /// A plain SQL statement
    Sql(Box<Stmt>),
    /// SET target = value, ...
    Set(Vec<SetAssignment>),
    /// IF ... THEN ... [ELSEIF ...] [ELSE ...] END IF
    If(IfStmt),
    /// SIGNAL SQLSTATE '<state>' SET MESSAGE_TEXT = '<message>'
    Signal { sqlstate: String, message: String },
    /// DO expr
    Do(Expr),
}

impl From<Stmt> for ProcStmt {
    fn from(stmt: Stmt) -> Self {
        ProcStmt::Sql(Box::new(stmt))
    }
}

impl From<IfStmt> for ProcStmt {
    fn from(stmt: IfStmt) -> Self {
        ProcStmt::If(stmt)
    }
}

impl ProcStmt {
    pub fn sql(stmt: impl Into<Stmt>) -> Self {
        ProcStmt::Sql(Box::new(stmt.into()))
    }

    /// A single `SET target = value`.
    pub fn set(target: Expr, value: Expr) -> Self {
        ProcStmt::Set(vec![SetAssignment { target, value }])
    }
}

/// One `target = value` pair of a SET.
///
/// The target is a local variable, a user variable or a `NEW` column.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAssignment {
    pub target: Expr,
    pub value: Expr,
}

impl SetAssignment {
    pub fn new(target: Expr, value: Expr) -> Self {
        Self { target, value }
    }
}

/// IF with any number of ELSEIF branches and an optional ELSE.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// Condition and body pairs; the first is IF, the rest ELSEIF.
    pub branches: Vec<(Expr, Vec<ProcStmt>)>,
    /// Rendered only when non-empty.
    pub otherwise: Vec<ProcStmt>,
}

impl IfStmt {
    pub fn new(condition: Expr, then: impl IntoIterator<Item = ProcStmt>) -> Self {
        Self {
            branches: vec![(condition, then.into_iter().collect())],
            otherwise: Vec::new(),
        }
    }

    pub fn else_if(mut self, condition: Expr, then: impl IntoIterator<Item = ProcStmt>) -> Self {
        self.branches.push((condition, then.into_iter().collect()));
        self
    }

    pub fn otherwise(mut self, stmts: impl IntoIterator<Item = ProcStmt>) -> Self {
        self.otherwise.extend(stmts);
        self
    }
}
