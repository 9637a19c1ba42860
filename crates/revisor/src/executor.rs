//! The seam between synthesis and the database.

use std::future::Future;

use crate::{Error, StatementError};

/// Runs statements on behalf of the orchestrator.
///
/// `execute` takes one complete statement per call; trigger bodies contain
/// semicolons, so implementations must not split on them.
pub trait Executor {
    /// Execute a statement, returning the number of rows affected.
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<u64, StatementError>> + Send;

    /// Run a query with `?` placeholders bound to `params`, returning all rows.
    fn fetch(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Row>, StatementError>> + Send;
}

impl<E: Executor + Send + ?Sized> Executor for &mut E {
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<u64, StatementError>> + Send {
        (**self).execute(sql)
    }

    fn fetch(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Row>, StatementError>> + Send {
        (**self).fetch(sql, params)
    }
}

/// A result row, every value as text (or NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `idx`, `None` for NULL or out of range.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// The value at `idx`, failing on NULL.
    pub(crate) fn text(&self, idx: usize, query: &str) -> Result<&str, Error> {
        self.get(idx).ok_or_else(|| Error::UnexpectedNull {
            column: idx,
            query: query.to_owned(),
        })
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Row::new(iter.into_iter().map(|v| v.map(Into::into)).collect())
    }
}

/// Records statements instead of executing them; queries still reach the
/// wrapped executor so introspection sees the live catalog.
pub struct DryRun<E> {
    inner: E,
    statements: Vec<String>,
}

impl<E> DryRun<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            statements: Vec::new(),
        }
    }

    /// Statements recorded so far, in execution order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<String> {
        self.statements
    }
}

impl<E: Executor + Send> Executor for DryRun<E> {
    async fn execute(&mut self, sql: &str) -> Result<u64, StatementError> {
        tracing::debug!(sql = %sql, "dry run: recorded statement");
        self.statements.push(sql.to_owned());
        Ok(0)
    }

    fn fetch(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Row>, StatementError>> + Send {
        self.inner.fetch(sql, params)
    }
}
