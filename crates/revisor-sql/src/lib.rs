//! MySQL AST and rendering.
//!
//! Build statements as a typed AST, then render them to a string. Every
//! identifier and string literal goes through [`Ident`] and [`Lit`], so names
//! read back from the catalog can never break out of their quoting.

use strid::braid;

mod expr;
pub use expr::*;

mod ddl;
pub use ddl::*;

mod render;
pub use render::*;

mod routine;
pub use routine::*;

mod stmt;
pub use stmt::*;

/// The name of a table (or table alias).
#[braid]
pub struct TableName;

/// The name of a column.
#[braid]
pub struct ColumnName;

/// The name of an index or constraint.
#[braid]
pub struct IndexName;

/// The name of a trigger.
#[braid]
pub struct TriggerName;

/// The name of a stored-program local variable or a session user variable.
#[braid]
pub struct VarName;

/// A MySQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes. Backslashes
/// are doubled as well, matching the server's default `sql_mode`.
///
/// # Example
/// ```
/// use revisor_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// assert_eq!(format!("{}", Lit("a\\b")), "'a\\\\b'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_lit(f, self.0.as_ref(), true)
    }
}

/// A MySQL identifier wrapper.
///
/// Display writes the value escaped and quoted with backticks.
///
/// # Example
/// ```
/// use revisor_sql::Ident;
/// assert_eq!(format!("{}", Ident("order")), "`order`");
/// assert_eq!(format!("{}", Ident("bla`h")), "`bla``h`");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`")?;
        for c in self.0.as_ref().chars() {
            if c == '`' {
                write!(f, "``")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "`")
    }
}

pub(crate) fn write_lit(
    f: &mut std::fmt::Formatter<'_>,
    value: &str,
    backslash_escapes: bool,
) -> std::fmt::Result {
    write!(f, "'")?;
    for c in value.chars() {
        match c {
            '\'' => write!(f, "''")?,
            '\\' if backslash_escapes => write!(f, "\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "'")
}

/// Escape a string literal for MySQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Quote a MySQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `order`, `group`, `key`, etc. Doubles any embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}
