//! Render SQL AST to string.

use std::fmt;

use crate::ddl::*;
use crate::expr::{BinOp, ColumnRef, Expr};
use crate::routine::*;
use crate::stmt::*;
use crate::{Ident, write_lit};


/// Rendering context.
///
/// Carries the server settings that change how literals must be written.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    /// Whether the server treats backslash as an escape character in string
    /// literals (true unless `sql_mode` contains `NO_BACKSLASH_ESCAPES`).
    pub backslash_escapes: bool,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            backslash_escapes: true,
        }
    }

    pub fn no_backslash_escapes() -> Self {
        Self {
            backslash_escapes: false,
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for rendering a value via Display.
pub struct Fmt<'a, T: Render + ?Sized>(pub &'a RenderContext, pub &'a T);

impl<T: Render + ?Sized> fmt::Display for Fmt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.1.render(self.0, f)
    }
}

/// Write `text` with every line prefixed by `pad`.
fn write_indented(f: &mut fmt::Formatter<'_>, text: &str, pad: &str) -> fmt::Result {
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        write!(f, "{pad}{line}")?;
    }
    Ok(())
}

fn write_comma_separated<T: Render>(
    ctx: &RenderContext,
    f: &mut fmt::Formatter<'_>,
    items: &[T],
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", Fmt(ctx, item))?;
    }
    Ok(())
}

fn write_ident_list<T: AsRef<str>>(f: &mut fmt::Formatter<'_>, names: &[T]) -> fmt::Result {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", Ident(name.as_ref()))?;
    }
    Ok(())
}

fn write_table(f: &mut fmt::Formatter<'_>, table: &str, alias: Option<&str>) -> fmt::Result {
    write!(f, "{}", Ident(table))?;
    if let Some(alias) = alias {
        write!(f, " AS {}", Ident(alias))?;
    }
    Ok(())
}

fn write_joins(ctx: &RenderContext, f: &mut fmt::Formatter<'_>, joins: &[Join]) -> fmt::Result {
    for join in joins {
        write!(f, "\n{} ", join.kind.as_str())?;
        write_table(f, join.table.as_str(), join.alias.as_ref().map(|a| a.as_str()))?;
        write!(f, " ON {}", Fmt(ctx, &join.on))?;
    }
    Ok(())
}

// ============================================================================
// Render implementations
// ============================================================================

/// Trait for types that can be rendered to SQL.
pub trait Render {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl Render for Expr {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => col.render(ctx, f),
            Expr::New(col) => write!(f, "NEW.{}", Ident(col.as_str())),
            Expr::Old(col) => write!(f, "OLD.{}", Ident(col.as_str())),
            Expr::Var(name) => write!(f, "{}", Ident(name.as_str())),
            Expr::UserVar(name) => write!(f, "@{}", Ident(name.as_str())),
            Expr::String(s) => write_lit(f, s, ctx.backslash_escapes),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Null => write!(f, "NULL"),
            Expr::Now => write!(f, "NOW()"),
            Expr::BinOp { left, op, right } => {
                write_operand(ctx, f, *op, left)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(ctx, f, *op, right)
            }
            Expr::IsNull { expr, negated } => {
                if matches!(expr.as_ref(), Expr::BinOp { .. }) {
                    write!(f, "({})", Fmt(ctx, expr.as_ref()))?;
                } else {
                    write!(f, "{}", Fmt(ctx, expr.as_ref()))?;
                }
                let suffix = if *negated { " IS NOT NULL" } else { " IS NULL" };
                write!(f, "{suffix}")
            }
            Expr::Not(expr) => write!(f, "NOT ({})", Fmt(ctx, expr.as_ref())),
            Expr::InSelect { expr, select } => {
                let expr = Fmt(ctx, expr.as_ref());
                let select = Fmt(ctx, select.as_ref()).to_string().replace('\n', " ");
                write!(f, "{expr} IN ({select})")
            }
            Expr::FnCall { name, args } => {
                write!(f, "{name}(")?;
                write_comma_separated(ctx, f, args)?;
                write!(f, ")")
            }
            Expr::Raw(s) => write!(f, "{s}"),
        }
    }
}

/// Write one side of a binary operation, parenthesizing where MySQL's
/// precedence would otherwise regroup it.
///
/// All comparison operators (and IS) share one precedence level in MySQL, so
/// any compound operand of a comparison gets parentheses.
fn write_operand(
    ctx: &RenderContext,
    f: &mut fmt::Formatter<'_>,
    parent: BinOp,
    operand: &Expr,
) -> fmt::Result {
    let wrap = match operand {
        Expr::BinOp { op, .. } => {
            op.precedence() < parent.precedence() || parent.precedence() == 3
        }
        Expr::IsNull { .. } | Expr::Not(_) => parent.precedence() == 3,
        _ => false,
    };
    if wrap {
        write!(f, "({})", Fmt(ctx, operand))
    } else {
        write!(f, "{}", Fmt(ctx, operand))
    }
}

impl Render for ColumnRef {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            let table = Ident(table.as_str());
            write!(f, "{table}.")?;
        }
        let column = Ident(self.column.as_str());
        write!(f, "{column}")
    }
}

impl Render for SelectColumn {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Fmt(ctx, &self.expr))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", Ident(alias.as_str()))?;
        }
        Ok(())
    }
}

impl Render for SelectStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;

        // Columns
        if self.columns.is_empty() {
            write!(f, "*")?;
        } else {
            write_comma_separated(ctx, f, &self.columns)?;
        }

        // INTO
        if !self.into.is_empty() {
            write!(f, "\nINTO ")?;
            write_ident_list(f, &self.into)?;
        }

        // FROM
        if let Some(from) = &self.from {
            write!(f, "\nFROM ")?;
            write_table(f, from.table.as_str(), from.alias.as_ref().map(|a| a.as_str()))?;
        }

        write_joins(ctx, f, &self.joins)?;

        // WHERE
        if let Some(where_) = &self.where_ {
            write!(f, "\nWHERE {}", Fmt(ctx, where_))?;
        }

        // LIMIT
        if let Some(limit) = self.limit {
            write!(f, "\nLIMIT {limit}")?;
        }

        Ok(())
    }
}

impl Render for InsertStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Ident(self.table.as_str());
        write!(f, "{} {table} (", self.verb.as_str())?;
        write_ident_list(f, &self.columns)?;
        write!(f, ")")?;

        match &self.source {
            InsertSource::Values(values) => {
                write!(f, "\nVALUES (")?;
                write_comma_separated(ctx, f, values)?;
                write!(f, ")")
            }
            InsertSource::Select(select) => write!(f, "\n{}", Fmt(ctx, select.as_ref())),
        }
    }
}

impl Render for UpdateAssignment {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", Fmt(ctx, &self.column), Fmt(ctx, &self.value))
    }
}

impl Render for UpdateStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE ")?;
        write_table(f, self.table.as_str(), self.alias.as_ref().map(|a| a.as_str()))?;
        write_joins(ctx, f, &self.joins)?;

        // SET
        write!(f, "\nSET ")?;
        write_comma_separated(ctx, f, &self.assignments)?;

        // WHERE
        if let Some(where_) = &self.where_ {
            write!(f, "\nWHERE {}", Fmt(ctx, where_))?;
        }

        Ok(())
    }
}

impl Render for DeleteStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.joins.is_empty() {
            write!(f, "DELETE FROM {}", Ident(self.table.as_str()))?;
        } else {
            let target = self.alias.as_ref().unwrap_or(&self.table);
            write!(f, "DELETE {} FROM ", Ident(target.as_str()))?;
            write_table(f, self.table.as_str(), self.alias.as_ref().map(|a| a.as_str()))?;
            write_joins(ctx, f, &self.joins)?;
        }

        // WHERE
        if let Some(where_) = &self.where_ {
            write!(f, "\nWHERE {}", Fmt(ctx, where_))?;
        }

        // LIMIT (single-table form only)
        if let Some(limit) = self.limit
            && self.joins.is_empty()
        {
            write!(f, "\nLIMIT {limit}")?;
        }

        Ok(())
    }
}

impl Render for ColumnDef {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Ident(self.name.as_str()), self.ty)?;
        if let Some(charset) = &self.charset {
            write!(f, " CHARACTER SET {charset}")?;
        }
        if let Some(collation) = &self.collation {
            write!(f, " COLLATE {collation}")?;
        }
        match self.nullable {
            Some(true) => write!(f, " NULL")?,
            Some(false) => write!(f, " NOT NULL")?,
            None => {}
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {}", Fmt(ctx, default))?;
        }
        if self.auto_increment {
            write!(f, " AUTO_INCREMENT")?;
        }
        Ok(())
    }
}

impl Render for IndexDef {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "UNIQUE ")?;
        }
        write!(f, "INDEX")?;
        if let Some(name) = &self.name {
            write!(f, " {}", Ident(name.as_str()))?;
        }
        write!(f, " (")?;
        write_ident_list(f, &self.columns)?;
        write!(f, ")")
    }
}

impl Render for CreateTable {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TABLE {} (", Ident(self.table.as_str()))?;
        let parts = self
            .columns
            .iter()
            .map(|c| Fmt(ctx, c).to_string())
            .chain(self.indexes.iter().map(|i| Fmt(ctx, i).to_string()));
        for (i, part) in parts.enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "\n  {part}")?;
        }
        write!(f, "\n)")?;
        if let Some(engine) = &self.engine {
            write!(f, " ENGINE={engine}")?;
        }
        Ok(())
    }
}

impl Render for CreateTableLike {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CREATE TABLE {} LIKE {}",
            Ident(self.table.as_str()),
            Ident(self.like.as_str())
        )
    }
}

impl Render for AlterOp {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterOp::AddColumn(def) => write!(f, "ADD COLUMN {}", Fmt(ctx, def)),
            AlterOp::ModifyColumn(def) => write!(f, "MODIFY COLUMN {}", Fmt(ctx, def)),
            AlterOp::DropColumn(name) => write!(f, "DROP COLUMN {}", Ident(name.as_str())),
            AlterOp::DropPrimaryKey => write!(f, "DROP PRIMARY KEY"),
            AlterOp::AddPrimaryKey(columns) => {
                write!(f, "ADD PRIMARY KEY (")?;
                write_ident_list(f, columns)?;
                write!(f, ")")
            }
            AlterOp::AddIndex(index) => write!(f, "ADD {}", Fmt(ctx, index)),
            AlterOp::DropIndex(name) => write!(f, "DROP INDEX {}", Ident(name.as_str())),
            AlterOp::Comment(comment) => {
                write!(f, "COMMENT = ")?;
                write_lit(f, comment, ctx.backslash_escapes)
            }
        }
    }
}

impl Render for AlterTable {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ALTER TABLE {}", Ident(self.table.as_str()))?;
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "\n  {}", Fmt(ctx, op))?;
        }
        Ok(())
    }
}

impl Render for DropTable {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let if_exists = if self.if_exists { " IF EXISTS" } else { "" };
        write!(f, "DROP TABLE{if_exists} {}", Ident(self.table.as_str()))
    }
}

impl Render for DropTrigger {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let if_exists = if self.if_exists { " IF EXISTS" } else { "" };
        write!(f, "DROP TRIGGER{if_exists} {}", Ident(self.name.as_str()))
    }
}

impl Render for CreateTrigger {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CREATE TRIGGER {} {} {} ON {}\nFOR EACH ROW {}",
            Ident(self.name.as_str()),
            self.timing.as_str(),
            self.event.as_str(),
            Ident(self.table.as_str()),
            Fmt(ctx, &self.body)
        )
    }
}

impl Render for Block {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declarations.is_empty() && self.statements.is_empty() {
            return write!(f, "BEGIN END");
        }
        write!(f, "BEGIN")?;
        for declaration in &self.declarations {
            writeln!(f)?;
            write_indented(f, &Fmt(ctx, declaration).to_string(), "  ")?;
            write!(f, ";")?;
        }
        write_statements(ctx, f, &self.statements)?;
        write!(f, "\nEND")
    }
}

/// Write each statement on its own indented line(s), terminated by `;`.
fn write_statements(
    ctx: &RenderContext,
    f: &mut fmt::Formatter<'_>,
    stmts: &[ProcStmt],
) -> fmt::Result {
    for stmt in stmts {
        writeln!(f)?;
        write_indented(f, &Fmt(ctx, stmt).to_string(), "  ")?;
        write!(f, ";")?;
    }
    Ok(())
}

impl Render for Declare {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declare::Var { name, ty } => write!(f, "DECLARE {} {}", Ident(name.as_str()), ty),
            Declare::IgnoreError(errno) => {
                write!(f, "DECLARE CONTINUE HANDLER FOR {errno} BEGIN END")
            }
        }
    }
}

impl Render for SetAssignment {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", Fmt(ctx, &self.target), Fmt(ctx, &self.value))
    }
}

impl Render for ProcStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcStmt::Sql(stmt) => stmt.render(ctx, f),
            ProcStmt::Set(assignments) => {
                write!(f, "SET ")?;
                write_comma_separated(ctx, f, assignments)
            }
            ProcStmt::If(stmt) => stmt.render(ctx, f),
            ProcStmt::Signal { sqlstate, message } => {
                write!(f, "SIGNAL SQLSTATE ")?;
                write_lit(f, sqlstate, ctx.backslash_escapes)?;
                write!(f, " SET MESSAGE_TEXT = ")?;
                write_lit(f, message, ctx.backslash_escapes)
            }
            ProcStmt::Do(expr) => write!(f, "DO {}", Fmt(ctx, expr)),
        }
    }
}

impl Render for IfStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (condition, body)) in self.branches.iter().enumerate() {
            let keyword = if i == 0 { "IF" } else { "\nELSEIF" };
            write!(f, "{keyword} {} THEN", Fmt(ctx, condition))?;
            write_statements(ctx, f, body)?;
        }
        if !self.otherwise.is_empty() {
            write!(f, "\nELSE")?;
            write_statements(ctx, f, &self.otherwise)?;
        }
        write!(f, "\nEND IF")
    }
}

impl Render for Stmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Select(s) => s.render(ctx, f),
            Stmt::Insert(s) => s.render(ctx, f),
            Stmt::Update(s) => s.render(ctx, f),
            Stmt::Delete(s) => s.render(ctx, f),
            Stmt::CreateTable(s) => s.render(ctx, f),
            Stmt::CreateTableLike(s) => s.render(ctx, f),
            Stmt::AlterTable(s) => s.render(ctx, f),
            Stmt::DropTable(s) => s.render(ctx, f),
            Stmt::CreateTrigger(s) => s.render(ctx, f),
            Stmt::DropTrigger(s) => s.render(ctx, f),
        }
    }
}

// ============================================================================
// Convenience methods
// ============================================================================

/// Render a statement to SQL with the server's default escaping rules.
pub fn render(stmt: &impl Render) -> String {
    render_with(&RenderContext::new(), stmt)
}

/// Render a statement to SQL using the given context.
pub fn render_with(ctx: &RenderContext, stmt: &impl Render) -> String {
    format!("{}", Fmt(ctx, stmt))
}
