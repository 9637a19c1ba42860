//! Transparent revision history for MySQL tables.
//!
//! Revisioning a table adds:
//! - `_revision_<table>`: one snapshot row per revision, chained backwards
//!   through `_revision_previous`
//! - `_revhistory_<table>`: an append-only log of every insert, update and
//!   delete
//! - a `_revision` pointer and a transient `_revision_comment` on the table
//!   itself
//! - five triggers that keep all of the above in step with ordinary writes
//!
//! Applications keep writing the table as before. Setting `_revision` to an
//! older revision id in an update reverts the row (and its child rows) to that
//! snapshot.
//!
//! A root table can bring child tables along: rows that reference the root
//! through a foreign key are snapshotted under the root's revision and
//! restored with it.
//!
//! # Naming Convention
//!
//! Everything revisioning adds starts with `_revision` (or `_revhistory` for
//! the log). Application columns must not use that prefix: a column carrying
//! it marks the table as already revisioned.
//!
//! # Usage
//!
//! ```ignore
//! let mut executor = MySqlExecutor::connect("mysql://root@localhost/shop").await?;
//! let render = Introspector::new(&mut executor).render_context().await?;
//!
//! let mut orchestrator = Orchestrator::new(executor, Options::default())
//!     .with_render_context(render);
//! let report = orchestrator
//!     .install(&["orders(order_lines)".parse()?])
//!     .await;
//! assert!(!report.has_failures());
//! ```

mod builder;
mod ddl;
mod error;
mod executor;
mod introspect;
mod model;
mod mysql;
pub mod names;
mod options;
mod orchestrator;
mod triggers;

pub use builder::{BuiltGroup, build_group};
pub use ddl::{child_statements, root_statements};
pub use error::{
    Error, IMMUTABLE_PRIMARY_KEY_SQLSTATE, SchemaError, StatementError, UNKNOWN_REVISION_SQLSTATE,
};
pub use executor::{DryRun, Executor, Row};
pub use introspect::{Introspector, TableDescription};
pub use model::{
    ChildLink, ChildTable, ColumnModel, GroupSpec, TableGroup, TableModel, TriggerShape,
    UniqueIndex,
};
pub use mysql::MySqlExecutor;
pub use options::{Dialect, Options};
pub use orchestrator::{GroupOutcome, GroupReport, Orchestrator, Plan, Report};
pub use triggers::TriggerSynthesizer;

pub use revisor_sql as sql;
