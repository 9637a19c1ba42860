//! Structural statements: snapshot tables, history tables, the root's pointer
//! column, and the backfills that seed them from existing rows.

use revisor_sql::{
    AlterOp, AlterTable, ColumnDef, ColumnName, CreateTable, CreateTableLike, Expr, FromClause,
    IndexDef, InsertStmt, Join, SelectStmt, SqlType, Stmt, TableName, UpdateStmt,
};

use crate::model::{ChildTable, TableModel};
use crate::names::{self, column};

/// Every structural statement for a root table, in execution order.
pub fn root_statements(root: &TableModel) -> Vec<Stmt> {
    let revision = names::revision_table(&root.name);
    let history = names::history_table(&root.name);

    vec![
        CreateTableLike::new(revision.clone(), root.name.clone()).into(),
        alter_revision_table(root, &revision).into(),
        backfill_revisions(root, &revision).into(),
        alter_root(root).into(),
        backfill_root_pointer(root, &revision).into(),
        create_history_table(root, &history).into(),
        backfill_history(root, &revision, &history).into(),
    ]
}

/// Every structural statement for a child table, in execution order.
///
/// The parent must already carry its `_revision` pointer.
pub fn child_statements(child: &ChildTable) -> Vec<Stmt> {
    let table = &child.table;
    let revision = names::revision_table(&table.name);

    vec![
        CreateTableLike::new(revision.clone(), table.name.clone()).into(),
        alter_child_revision_table(child, &revision).into(),
        backfill_child_revisions(child, &revision).into(),
    ]
}

/// Turn the clone of the root into snapshot storage.
///
/// Pending entries are inserted with nothing but bookkeeping columns, so every
/// cloned column must accept NULL. Redefining the autoincrement column this
/// way also strips its AUTO_INCREMENT.
fn alter_revision_table(root: &TableModel, revision: &TableName) -> AlterTable {
    let mut ops: Vec<AlterOp> = root
        .columns
        .iter()
        .filter(|c| !c.nullable || c.auto_increment)
        .map(|c| AlterOp::ModifyColumn(c.definition().null()))
        .collect();

    ops.extend([
        AlterOp::DropPrimaryKey,
        AlterOp::AddColumn(
            ColumnDef::new(names::REVISION, SqlType::bigint_unsigned())
                .not_null()
                .auto_increment(),
        ),
        AlterOp::AddColumn(
            ColumnDef::new(names::REVISION_PREVIOUS, SqlType::bigint_unsigned()).null(),
        ),
        AlterOp::AddColumn(
            ColumnDef::new(names::REVISION_ACTION, SqlType::enumeration(&["INSERT", "UPDATE"]))
                .null()
                .default(Expr::Null),
        ),
        AlterOp::AddColumn(ColumnDef::new(names::REVISION_USER_ID, SqlType::int_unsigned()).null()),
        AlterOp::AddColumn(
            ColumnDef::new(names::REVISION_TIMESTAMP, SqlType::datetime())
                .null()
                .default(Expr::Null),
        ),
        AlterOp::AddColumn(ColumnDef::new(names::REVISION_COMMENT, SqlType::text()).null()),
        AlterOp::AddPrimaryKey(vec![column(names::REVISION)]),
        AlterOp::AddIndex(IndexDef::new([column(names::REVISION_PREVIOUS)])),
        AlterOp::AddIndex(IndexDef::named(
            names::ORIGINAL_PRIMARY_INDEX,
            root.primary_key.iter().cloned(),
        )),
    ]);
    ops.extend(demote_unique_indexes(root));

    AlterTable::new(revision.clone()).ops(ops)
}

/// Snapshots hold many versions of a row, so uniqueness cannot hold.
fn demote_unique_indexes(table: &TableModel) -> Vec<AlterOp> {
    table
        .unique_indexes
        .iter()
        .flat_map(|index| {
            [
                AlterOp::DropIndex(index.name.clone()),
                AlterOp::AddIndex(IndexDef::named(
                    index.name.clone(),
                    index.columns.iter().cloned(),
                )),
            ]
        })
        .collect()
}

/// One resolved INSERT entry per existing root row.
fn backfill_revisions(root: &TableModel, revision: &TableName) -> InsertStmt {
    let columns = root.column_names();

    let mut target = columns.clone();
    target.extend([
        column(names::REVISION_ACTION),
        column(names::REVISION_TIMESTAMP),
        column(names::REVISION_COMMENT),
    ]);

    let select = SelectStmt::new()
        .exprs(columns.into_iter().map(Expr::column))
        .exprs([
            Expr::string("INSERT"),
            Expr::Now,
            Expr::string(names::BACKFILL_COMMENT),
        ])
        .from(FromClause::table(root.name.clone()));

    InsertStmt::select(revision.clone(), target, select)
}

fn alter_root(root: &TableModel) -> AlterTable {
    AlterTable::new(root.name.clone()).ops([
        AlterOp::AddColumn(ColumnDef::new(names::REVISION, SqlType::bigint_unsigned()).null()),
        AlterOp::AddColumn(ColumnDef::new(names::REVISION_COMMENT, SqlType::text()).null()),
        AlterOp::AddIndex(IndexDef::new([column(names::REVISION)]).unique()),
    ])
}

/// Point each live row at the entry the backfill created for it.
fn backfill_root_pointer(root: &TableModel, revision: &TableName) -> UpdateStmt {
    let on = Expr::all(root.primary_key.iter().map(|pk| {
        Expr::qualified_column("t", pk.clone()).eq(Expr::qualified_column("r", pk.clone()))
    }))
    .unwrap_or(Expr::Bool(false));

    UpdateStmt::aliased(root.name.clone(), "t")
        .join(Join::inner(revision.clone(), "r", on))
        .set_qualified("t", names::REVISION, Expr::qualified_column("r", names::REVISION))
}

fn create_history_table(root: &TableModel, history: &TableName) -> CreateTable {
    let mut table = CreateTable::new(history.clone());
    for pk in root.primary_key_columns() {
        table = table.column(pk.definition());
    }

    table
        .column(ColumnDef::new(names::REVISION, SqlType::bigint_unsigned()).null())
        .column(ColumnDef::new(names::HISTORY_USER_ID, SqlType::int_unsigned()).null())
        .column(
            ColumnDef::new(names::HISTORY_TIMESTAMP, SqlType::timestamp())
                .not_null()
                .default(Expr::Raw("CURRENT_TIMESTAMP".into())),
        )
        .index(IndexDef::new(root.primary_key.iter().cloned()))
        .index(IndexDef::new([column(names::REVISION)]))
        .index(IndexDef::new([column(names::HISTORY_USER_ID)]))
        .index(IndexDef::new([column(names::HISTORY_TIMESTAMP)]))
        .engine("InnoDB")
}

/// One history row per snapshot row, stamped with the snapshot's time.
fn backfill_history(root: &TableModel, revision: &TableName, history: &TableName) -> InsertStmt {
    let mut target: Vec<ColumnName> = root.primary_key.clone();
    target.extend([
        column(names::REVISION),
        column(names::HISTORY_USER_ID),
        column(names::HISTORY_TIMESTAMP),
    ]);

    let select = SelectStmt::new()
        .exprs(root.primary_key.iter().map(|pk| Expr::column(pk.clone())))
        .exprs([
            Expr::column(names::REVISION),
            Expr::Null,
            Expr::column(names::REVISION_TIMESTAMP),
        ])
        .from(FromClause::table(revision.clone()));

    InsertStmt::select(history.clone(), target, select)
}

fn alter_child_revision_table(child: &ChildTable, revision: &TableName) -> AlterTable {
    let table = &child.table;
    let mut ops = Vec::new();

    // The clone keeps AUTO_INCREMENT; snapshot rows always carry explicit ids.
    if let Some(auto) = table.auto_increment.as_ref().and_then(|a| table.column(a.as_str())) {
        let def = auto.definition();
        let def = if auto.nullable { def.null() } else { def.not_null() };
        ops.push(AlterOp::ModifyColumn(def));
    }

    if table.has_primary_key() {
        let mut key = vec![column(names::REVISION)];
        key.extend(table.primary_key.iter().cloned());
        ops.extend([
            AlterOp::DropPrimaryKey,
            AlterOp::AddColumn(
                ColumnDef::new(names::REVISION, SqlType::bigint_unsigned()).not_null(),
            ),
            AlterOp::AddPrimaryKey(key),
            AlterOp::AddIndex(IndexDef::named(
                names::ORIGINAL_PRIMARY_INDEX,
                table.primary_key.iter().cloned(),
            )),
        ]);
    } else {
        ops.extend([
            AlterOp::AddColumn(ColumnDef::new(names::REVISION, SqlType::bigint_unsigned()).null()),
            AlterOp::AddIndex(IndexDef::named(names::REVISION, [column(names::REVISION)])),
        ]);
    }

    ops.extend(demote_unique_indexes(table));
    ops.push(AlterOp::Comment(format!(
        "Child of `{}`",
        names::revision_table(&child.link.parent)
    )));

    AlterTable::new(revision.clone()).ops(ops)
}

/// Pair every live child row with its parent's current revision.
fn backfill_child_revisions(child: &ChildTable, revision: &TableName) -> InsertStmt {
    let table = &child.table;
    let mut target = table.column_names();
    target.push(column(names::REVISION));

    let select = SelectStmt::new()
        .exprs(
            table
                .columns
                .iter()
                .map(|c| Expr::qualified_column("t", c.name.clone())),
        )
        .exprs([Expr::qualified_column("p", names::REVISION)])
        .from(FromClause::aliased(table.name.clone(), "t"))
        .join(Join::inner(
            child.link.parent.clone(),
            "p",
            Expr::qualified_column("t", child.link.foreign_key.clone())
                .eq(Expr::qualified_column("p", child.link.parent_key.clone())),
        ));

    InsertStmt::select(revision.clone(), target, select)
}
