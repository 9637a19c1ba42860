use thiserror::Error;

/// SQLSTATE raised by the before-update guard when a primary key changes.
pub const IMMUTABLE_PRIMARY_KEY_SQLSTATE: &str = "23000";

/// SQLSTATE raised when a write references a revision id that does not exist.
pub const UNKNOWN_REVISION_SQLSTATE: &str = "45000";

/// A table could not be modelled for revisioning.
///
/// These never abort a batch: the offending table (or its whole group, for a
/// root) is skipped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table `{table}` does not exist")]
    TableNotFound { table: String },

    #[error("unable to add revisioning to table `{table}`: table does not have a primary key")]
    MissingPrimaryKey { table: String },

    #[error(
        "unable to add revisioning to table `{table}` as child of `{parent}`: table does not have a foreign key reference to the parent table"
    )]
    MissingForeignKey { table: String, parent: String },
}

impl SchemaError {
    /// The table the error is about.
    pub fn table(&self) -> &str {
        match self {
            SchemaError::TableNotFound { table }
            | SchemaError::MissingPrimaryKey { table }
            | SchemaError::MissingForeignKey { table, .. } => table,
        }
    }
}

/// A statement was rejected by the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "query failed ({}): {message}",
    number.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
)]
pub struct StatementError {
    /// Native server error number, e.g. 1146 for a missing table.
    pub number: Option<u16>,
    /// Five-character SQLSTATE, when the server sent one.
    pub sqlstate: Option<String>,
    pub message: String,
    /// The statement that failed, as sent.
    pub statement: String,
}

impl StatementError {
    /// Whether this is the revisioning guard rejecting a primary key change.
    ///
    /// Matches on the message so it works for both signal dialects; the
    /// legacy one surfaces as an "unknown column" error carrying the text.
    pub fn is_immutable_primary_key(&self) -> bool {
        self.message.contains(IMMUTABLE_PRIMARY_KEY_MESSAGE)
    }

    /// Whether this is a write referencing a revision id that does not exist.
    pub fn is_unknown_revision(&self) -> bool {
        self.message.contains(UNKNOWN_REVISION_MESSAGE)
    }
}

const IMMUTABLE_PRIMARY_KEY_MESSAGE: &str = "Can't change the value of the primary key of table";
const UNKNOWN_REVISION_MESSAGE: &str = "Unknown revision for table";

pub(crate) fn immutable_primary_key_message(table: &str) -> String {
    format!("{IMMUTABLE_PRIMARY_KEY_MESSAGE} '{table}' because of revisioning")
}

pub(crate) fn unknown_revision_message(table: &str) -> String {
    format!("{UNKNOWN_REVISION_MESSAGE} '{table}'")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error("failed to connect to mysql: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("unexpected NULL in column {column} of `{query}`")]
    UnexpectedNull { column: usize, query: String },

    #[error("invalid group specification {0:?}: expected `root(child, ...)`")]
    InvalidGroupSpec(String),
}
