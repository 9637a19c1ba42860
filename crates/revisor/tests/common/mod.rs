//! An in-memory stand-in for a MySQL session.
//!
//! Catalog queries are answered from declared tables; every other statement
//! is recorded. A statement containing the configured marker fails.

#![allow(dead_code)]

use std::collections::HashMap;

use revisor::{Executor, Row, StatementError};

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    ty: String,
    nullable: bool,
    key: &'static str,
    extra: &'static str,
    collation: Option<(&'static str, &'static str)>,
}

impl Column {
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// (character set, collation)
    pub fn collate(mut self, charset: &'static str, collation: &'static str) -> Self {
        self.collation = Some((charset, collation));
        self
    }

    fn row(&self) -> Row {
        [
            Some(self.name.as_str()),
            Some(self.ty.as_str()),
            Some(if self.nullable { "YES" } else { "NO" }),
            Some(self.key),
            Some(self.extra),
            self.collation.map(|(charset, _)| charset),
            self.collation.map(|(_, collation)| collation),
        ]
        .into_iter()
        .collect()
    }
}

/// `int unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY`
pub fn serial(name: &str) -> Column {
    Column {
        name: name.into(),
        ty: "int(10) unsigned".into(),
        nullable: false,
        key: "PRI",
        extra: "auto_increment",
        collation: None,
    }
}

pub fn column(name: &str, ty: &str) -> Column {
    Column {
        name: name.into(),
        ty: ty.into(),
        nullable: true,
        key: "",
        extra: "",
        collation: None,
    }
}

#[derive(Debug, Default)]
struct Table {
    columns: Vec<Column>,
    unique: Vec<(String, String)>,
    /// (parent table, fk column, referenced column)
    foreign_keys: Vec<(String, String, String)>,
}

#[derive(Debug, Default)]
pub struct MockDb {
    tables: HashMap<String, Table>,
    sql_mode: String,
    fail_on: Option<String>,
    /// Every statement passed to `execute`, in order.
    pub executed: Vec<String>,
    /// Every query passed to `fetch`, in order.
    pub fetched: Vec<String>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: Vec<Column>) -> Self {
        self.tables.entry(name.into()).or_default().columns = columns;
        self
    }

    pub fn unique(mut self, table: &str, index: &str, column: &str) -> Self {
        self.tables
            .entry(table.into())
            .or_default()
            .unique
            .push((index.into(), column.into()));
        self
    }

    pub fn foreign_key(
        mut self,
        table: &str,
        column: &str,
        parent: &str,
        parent_column: &str,
    ) -> Self {
        self.tables
            .entry(table.into())
            .or_default()
            .foreign_keys
            .push((parent.into(), column.into(), parent_column.into()));
        self
    }

    pub fn sql_mode(mut self, mode: &str) -> Self {
        self.sql_mode = mode.into();
        self
    }

    /// Fail every statement containing `marker`.
    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.into());
        self
    }

    /// Statements that start with `prefix`.
    pub fn executed_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.executed
            .iter()
            .map(String::as_str)
            .filter(|sql| sql.starts_with(prefix))
            .collect()
    }

    /// First line of every executed statement.
    pub fn heads(&self) -> Vec<&str> {
        self.executed
            .iter()
            .map(|sql| sql.lines().next().unwrap_or_default())
            .collect()
    }

    fn query(&self, sql: &str, params: &[&str]) -> Vec<Row> {
        let table = params.first().and_then(|name| self.tables.get(*name));

        if sql.contains("sql_mode") {
            return vec![[Some(self.sql_mode.as_str())].into_iter().collect()];
        }
        let Some(table) = table else {
            return Vec::new();
        };

        if sql.contains("CONSTRAINT_TYPE = 'UNIQUE'") {
            table
                .unique
                .iter()
                .map(|(index, column)| {
                    [Some(index.as_str()), Some(column.as_str())]
                        .into_iter()
                        .collect()
                })
                .collect()
        } else if sql.contains("REFERENCED_TABLE_NAME") {
            let parent = params.get(1).copied().unwrap_or_default();
            table
                .foreign_keys
                .iter()
                .filter(|(p, _, _)| p == parent)
                .map(|(_, fk, key)| [Some(fk.as_str()), Some(key.as_str())].into_iter().collect())
                .collect()
        } else if sql.contains("INFORMATION_SCHEMA.TABLES") {
            vec![[params.first().copied()].into_iter().collect()]
        } else if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
            table.columns.iter().map(Column::row).collect()
        } else {
            Vec::new()
        }
    }
}

impl Executor for MockDb {
    async fn execute(&mut self, sql: &str) -> Result<u64, StatementError> {
        if let Some(marker) = &self.fail_on
            && sql.contains(marker.as_str())
        {
            return Err(StatementError {
                number: Some(1064),
                sqlstate: Some("42000".into()),
                message: "You have an error in your SQL syntax".into(),
                statement: sql.to_owned(),
            });
        }
        self.executed.push(sql.to_owned());
        Ok(0)
    }

    async fn fetch(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, StatementError> {
        self.fetched.push(sql.to_owned());
        Ok(self.query(sql, params))
    }
}

/// `orders(id, code, status)` with a unique code.
pub fn shop() -> MockDb {
    MockDb::new()
        .table(
            "orders",
            vec![serial("id"), column("code", "varchar(16)"), column("status", "varchar(32)")],
        )
        .unique("orders", "uniq_code", "code")
        .table(
            "order_notes",
            vec![column("order_id", "int(10) unsigned"), column("note", "text")],
        )
        .foreign_key("order_notes", "order_id", "orders", "id")
}
