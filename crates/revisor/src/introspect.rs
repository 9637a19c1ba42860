//! Reads table structure from `INFORMATION_SCHEMA`, scoped to `DATABASE()`.

use indexmap::IndexMap;
use revisor_sql::{ColumnName, IndexName, RenderContext, SqlType, TableName};

use crate::executor::{Executor, Row};
use crate::model::{ChildLink, ColumnModel, TableModel, UniqueIndex};
use crate::names;
use crate::{Error, SchemaError};

const COLUMNS_SQL: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), \
CAST(COLUMN_KEY AS CHAR), CAST(EXTRA AS CHAR), \
CAST(CHARACTER_SET_NAME AS CHAR), CAST(COLLATION_NAME AS CHAR) \
FROM INFORMATION_SCHEMA.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const UNIQUE_SQL: &str = "\
SELECT CAST(c.CONSTRAINT_NAME AS CHAR), CAST(k.COLUMN_NAME AS CHAR) \
FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS AS c \
INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE AS k \
ON c.TABLE_SCHEMA = k.TABLE_SCHEMA AND c.TABLE_NAME = k.TABLE_NAME \
AND c.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ? AND c.CONSTRAINT_TYPE = 'UNIQUE' \
ORDER BY c.CONSTRAINT_NAME, k.ORDINAL_POSITION";

const FOREIGN_KEY_SQL: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR), CAST(REFERENCED_COLUMN_NAME AS CHAR) \
FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
AND REFERENCED_TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME = ? \
AND REFERENCED_COLUMN_NAME IS NOT NULL \
ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION";

const TABLES_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) FROM INFORMATION_SCHEMA.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

const SQL_MODE_SQL: &str = "SELECT CAST(@@SESSION.sql_mode AS CHAR)";

/// A described table: its model plus any revisioning columns found on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub model: TableModel,
    /// Live columns carrying the reserved prefix, left out of `model`.
    pub reserved_columns: Vec<ColumnName>,
}

impl TableDescription {
    /// Whether revisioning storage already exists for this table.
    pub fn is_revisioned(&self) -> bool {
        !self.reserved_columns.is_empty()
    }
}

/// Reads table metadata through an executor.
pub struct Introspector<'a, E> {
    executor: &'a mut E,
}

impl<'a, E: Executor> Introspector<'a, E> {
    pub fn new(executor: &'a mut E) -> Self {
        Self { executor }
    }

    /// Describe a table: columns, primary key, unique indexes, autoincrement.
    pub async fn describe(&mut self, table: &TableName) -> Result<TableDescription, Error> {
        let rows = self.executor.fetch(COLUMNS_SQL, &[table.as_str()]).await?;
        if rows.is_empty() {
            return Err(SchemaError::TableNotFound {
                table: table.to_string(),
            }
            .into());
        }
        let (columns, reserved_columns) = parse_columns(&rows)?;

        let rows = self.executor.fetch(UNIQUE_SQL, &[table.as_str()]).await?;
        let unique_indexes = parse_unique_indexes(&rows)?;

        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        let auto_increment = columns
            .iter()
            .find(|c| c.auto_increment)
            .map(|c| c.name.clone());

        Ok(TableDescription {
            model: TableModel {
                name: table.clone(),
                columns,
                primary_key,
                unique_indexes,
                auto_increment,
            },
            reserved_columns,
        })
    }

    /// Describe a table that will carry its own revision chain; it must have
    /// a primary key.
    pub async fn describe_root(&mut self, table: &TableName) -> Result<TableDescription, Error> {
        let description = self.describe(table).await?;
        if !description.model.has_primary_key() {
            return Err(SchemaError::MissingPrimaryKey {
                table: table.to_string(),
            }
            .into());
        }
        Ok(description)
    }

    /// Find the foreign key from `table` to `parent`.
    ///
    /// When several exist, the first by constraint name wins.
    pub async fn resolve_foreign_key(
        &mut self,
        table: &TableName,
        parent: &TableName,
    ) -> Result<ChildLink, Error> {
        let rows = self
            .executor
            .fetch(FOREIGN_KEY_SQL, &[table.as_str(), parent.as_str()])
            .await?;
        let Some(row) = rows.first() else {
            return Err(SchemaError::MissingForeignKey {
                table: table.to_string(),
                parent: parent.to_string(),
            }
            .into());
        };

        Ok(ChildLink {
            parent: parent.clone(),
            foreign_key: row.text(0, FOREIGN_KEY_SQL)?.into(),
            parent_key: row.text(1, FOREIGN_KEY_SQL)?.into(),
        })
    }

    /// The columns install adds to a root (`_revision`, `_revision_comment`)
    /// that are actually present. Empty when the table does not exist.
    pub async fn root_revision_columns(
        &mut self,
        table: &TableName,
    ) -> Result<Vec<ColumnName>, Error> {
        let rows = self.executor.fetch(COLUMNS_SQL, &[table.as_str()]).await?;
        let mut present = Vec::new();
        for row in &rows {
            let name = row.text(0, COLUMNS_SQL)?;
            if names::ROOT_COLUMNS.contains(&name) {
                present.push(ColumnName::from(name));
            }
        }
        Ok(present)
    }

    pub async fn table_exists(&mut self, table: &TableName) -> Result<bool, Error> {
        let rows = self.executor.fetch(TABLES_SQL, &[table.as_str()]).await?;
        Ok(!rows.is_empty())
    }

    /// How string literals must be escaped on this session.
    pub async fn render_context(&mut self) -> Result<RenderContext, Error> {
        let rows = self.executor.fetch(SQL_MODE_SQL, &[]).await?;
        let sql_mode = rows.first().and_then(|row| row.get(0)).unwrap_or_default();
        Ok(render_context_for(sql_mode))
    }
}

fn render_context_for(sql_mode: &str) -> RenderContext {
    let no_backslash = sql_mode
        .split(',')
        .any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES"));
    if no_backslash {
        RenderContext::no_backslash_escapes()
    } else {
        RenderContext::new()
    }
}

/// Split column rows into model columns and reserved (revisioning) names.
fn parse_columns(rows: &[Row]) -> Result<(Vec<ColumnModel>, Vec<ColumnName>), Error> {
    let mut columns = Vec::new();
    let mut reserved = Vec::new();

    for row in rows {
        let name = row.text(0, COLUMNS_SQL)?;
        if names::is_reserved(name) {
            reserved.push(ColumnName::from(name));
            continue;
        }

        let extra = row.get(4).unwrap_or_default();
        columns.push(ColumnModel {
            name: ColumnName::from(name),
            ty: SqlType::new(row.text(1, COLUMNS_SQL)?),
            nullable: row.get(2) == Some("YES"),
            primary_key: row.get(3) == Some("PRI"),
            auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
            charset: row.get(5).map(str::to_owned),
            collation: row.get(6).map(str::to_owned),
        });
    }

    Ok((columns, reserved))
}

/// Group (constraint, column) rows into indexes, keeping key order.
fn parse_unique_indexes(rows: &[Row]) -> Result<Vec<UniqueIndex>, Error> {
    let mut indexes: IndexMap<String, Vec<ColumnName>> = IndexMap::new();
    for row in rows {
        let name = row.text(0, UNIQUE_SQL)?;
        if names::is_reserved(name) {
            continue;
        }
        let column = row.text(1, UNIQUE_SQL)?;
        indexes
            .entry(name.to_owned())
            .or_default()
            .push(ColumnName::from(column));
    }

    Ok(indexes
        .into_iter()
        .map(|(name, columns)| UniqueIndex {
            name: IndexName::from(name),
            columns,
        })
        .collect())
}
