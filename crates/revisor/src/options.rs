use std::fmt;
use std::str::FromStr;

use revisor_sql::{Expr, ProcStmt};

/// How generated triggers raise an application error.
///
/// Chosen explicitly by the caller; the server is never asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `SIGNAL SQLSTATE '<code>' SET MESSAGE_TEXT = '<message>'` (MySQL 5.5+).
    #[default]
    StandardSignal,
    /// ``DO `<message>` ``: fails with "unknown column" carrying the message.
    /// For servers without SIGNAL; the SQLSTATE is lost.
    LegacySignal,
}

impl Dialect {
    /// The statement that aborts the current write with `message`.
    pub fn raise(self, sqlstate: &str, message: &str) -> ProcStmt {
        match self {
            Dialect::StandardSignal => ProcStmt::Signal {
                sqlstate: sqlstate.to_owned(),
                message: message.to_owned(),
            },
            Dialect::LegacySignal => ProcStmt::Do(Expr::column(message)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::StandardSignal => "standard",
            Dialect::LegacySignal => "legacy",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "signal" => Ok(Dialect::StandardSignal),
            "legacy" | "do" => Ok(Dialect::LegacySignal),
            other => Err(format!(
                "unknown dialect {other:?} (expected `standard` or `legacy`)"
            )),
        }
    }
}

/// Synthesis options shared by every group of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub dialect: Dialect,
    /// Session variable (without `@`) holding the acting user's id.
    pub user_variable: String,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn user_variable(mut self, name: impl Into<String>) -> Self {
        self.user_variable = name.into();
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            user_variable: "auth_uid".to_owned(),
        }
    }
}
