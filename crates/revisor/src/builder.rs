//! Assembles introspected tables into a [`TableGroup`].

use crate::executor::Executor;
use crate::introspect::Introspector;
use crate::model::{ChildTable, GroupSpec, TableGroup, TriggerShape};
use crate::names;
use crate::{Error, SchemaError};

/// A built group plus the children that had to be left out.
#[derive(Debug)]
pub struct BuiltGroup {
    pub group: TableGroup,
    /// One entry per declared child that could not be modelled.
    pub skipped_children: Vec<SchemaError>,
}

/// Build the group described by `spec`.
///
/// Storage is decided per table: the root's by the revisioning columns on the
/// root, each child's by whether its snapshot table exists.
///
/// Schema problems with the root fail the whole group. Schema problems with a
/// child drop that child only. Any other error (a failed query) fails the
/// group.
pub async fn build_group<E: Executor>(
    introspector: &mut Introspector<'_, E>,
    spec: &GroupSpec,
) -> Result<BuiltGroup, Error> {
    let root = introspector.describe_root(&spec.root).await?;
    let structural_skip = root.is_revisioned();

    let mut children = Vec::new();
    let mut skipped_children = Vec::new();
    for name in &spec.children {
        let child = match introspector.describe(name).await {
            Ok(child) => child,
            Err(Error::Schema(err)) => {
                tracing::warn!(table = %name, "{err}");
                skipped_children.push(err);
                continue;
            }
            Err(err) => return Err(err),
        };

        match introspector.resolve_foreign_key(name, &spec.root).await {
            Ok(link) => {
                let storage_exists = introspector
                    .table_exists(&names::revision_table(name))
                    .await?;
                children.push(ChildTable {
                    table: child.model,
                    link,
                    storage_exists,
                });
            }
            Err(Error::Schema(err)) => {
                tracing::warn!(table = %name, "{err}");
                skipped_children.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    let shape = if children.is_empty() {
        TriggerShape::Single
    } else {
        TriggerShape::WithChildren(children)
    };

    Ok(BuiltGroup {
        group: TableGroup {
            root: root.model,
            shape,
            structural_skip,
        },
        skipped_children,
    })
}
