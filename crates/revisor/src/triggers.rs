//! Trigger bodies implementing the revision chain.
//!
//! A root table gets five triggers. The before-triggers decide which revision
//! a write lands on:
//!
//! - pointer left NULL (or, on update, unchanged): open a new *pending*
//!   revision chained to the old pointer and point the row at it;
//! - pointer set to another existing revision: when that revision is
//!   resolved, copy its snapshot onto the row (a revert); when it is pending,
//!   keep the row as written;
//! - pointer set to an id that does not exist: abort the write.
//!
//! The after-triggers resolve the pending revision with the committed values,
//! append to the history log, and for groups with children either snapshot
//! the children (fresh revision) or restore them from the snapshot (revert).
//!
//! Child tables get three mirror triggers that keep the snapshot under the
//! parent's current revision in step with direct writes to the child.

use revisor_sql::{
    Block, ColumnName, CreateTrigger, Declare, DeleteStmt, Expr, FromClause, IfStmt, InsertStmt,
    Join, ProcStmt, SelectStmt, SetAssignment, SqlType, TriggerEvent, UpdateStmt,
};

use crate::error::{
    IMMUTABLE_PRIMARY_KEY_SQLSTATE, UNKNOWN_REVISION_SQLSTATE, immutable_primary_key_message,
    unknown_revision_message,
};
use crate::model::{ChildTable, TableGroup, TableModel, TriggerShape};
use crate::names::{self, TriggerKind, column, restore_var};
use crate::options::Options;

/// Server error raised when a trigger writes to a table the triggering
/// statement is itself reading. Child mirrors treat it as "a root cascade is
/// in charge" and stand down.
const TABLE_IN_USE_BY_STATEMENT: u16 = 1442;

/// Local flag set by the root after-triggers when they resolved a fresh
/// revision (as opposed to a revert).
const FRESH_REVISION: &str = "fresh-revision";

/// Builds trigger definitions for one set of options.
pub struct TriggerSynthesizer<'a> {
    options: &'a Options,
}

impl<'a> TriggerSynthesizer<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    /// Every trigger of a group: the root's five, then three per child.
    pub fn group(&self, group: &TableGroup) -> Vec<CreateTrigger> {
        let root = &group.root;
        let mut triggers = vec![
            self.before_insert(root),
            self.before_update(root),
            self.after_write(TriggerEvent::Insert, root, &group.shape),
            self.after_write(TriggerEvent::Update, root, &group.shape),
            self.after_delete(root),
        ];
        for child in group.children() {
            triggers.push(self.child_after_insert(child));
            triggers.push(self.child_after_update(child));
            triggers.push(self.child_after_delete(child));
        }
        triggers
    }

    pub fn before_insert(&self, root: &TableModel) -> CreateTrigger {
        let body = Block::new()
            .declares(restore_declarations(root))
            .stmt(IfStmt::new(
                Expr::new_row(names::REVISION).is_not_null(),
                self.restore_from_revision(root),
            ))
            .stmt(self.open_pending_revision(root, Expr::Null))
            .stmt(clear_comment());

        trigger(TriggerKind::BeforeInsert, root, body)
    }

    pub fn before_update(&self, root: &TableModel) -> CreateTrigger {
        let pointer_unchanged = IfStmt::new(
            Expr::new_row(names::REVISION).eq(Expr::old_row(names::REVISION)),
            [ProcStmt::set(Expr::new_row(names::REVISION), Expr::Null)],
        )
        .else_if(
            Expr::new_row(names::REVISION).is_not_null(),
            self.restore_from_revision(root),
        );

        let body = Block::new()
            .declares(restore_declarations(root))
            .stmt(pointer_unchanged)
            .stmt(self.primary_key_guard(root))
            .stmt(self.open_pending_revision(root, Expr::old_row(names::REVISION)))
            .stmt(clear_comment());

        trigger(TriggerKind::BeforeUpdate, root, body)
    }

    /// After insert or after update (any other event is treated as insert);
    /// the shape decides whether children are cascaded.
    pub fn after_write(
        &self,
        event: TriggerEvent,
        root: &TableModel,
        shape: &TriggerShape,
    ) -> CreateTrigger {
        let (kind, action) = match event {
            TriggerEvent::Update => (TriggerKind::AfterUpdate, "UPDATE"),
            _ => (TriggerKind::AfterInsert, "INSERT"),
        };

        let mut resolve = UpdateStmt::new(names::revision_table(&root.name));
        for c in &root.columns {
            resolve = resolve.set(c.name.clone(), Expr::new_row(c.name.clone()));
        }
        let resolve = resolve
            .set(names::REVISION_ACTION, Expr::string(action))
            .where_(
                Expr::column(names::REVISION)
                    .eq(Expr::new_row(names::REVISION))
                    .and(Expr::column(names::REVISION_ACTION).is_null()),
            );
        let history = self.history_entry(root, Expr::new_row, Expr::new_row(names::REVISION));

        let body = match shape {
            TriggerShape::Single => Block::new()
                .stmt(ProcStmt::sql(resolve))
                .stmt(ProcStmt::sql(history)),
            TriggerShape::WithChildren(children) => {
                let snapshot = children.iter().map(|c| ProcStmt::sql(snapshot_child(c)));
                let restore = children.iter().flat_map(|c| restore_child(c, event));

                Block::new()
                    .declare(Declare::var(FRESH_REVISION, SqlType::boolean()))
                    .stmt(ProcStmt::sql(resolve))
                    .stmt(ProcStmt::set(
                        Expr::var(FRESH_REVISION),
                        Expr::row_count().gt(Expr::int(0)),
                    ))
                    .stmt(ProcStmt::sql(history))
                    .stmt(IfStmt::new(Expr::var(FRESH_REVISION), snapshot).otherwise(restore))
            }
        };

        trigger(kind, root, body)
    }

    pub fn after_delete(&self, root: &TableModel) -> CreateTrigger {
        let history = self.history_entry(root, Expr::old_row, Expr::Null);
        trigger(TriggerKind::AfterDelete, root, Block::new().stmt(ProcStmt::sql(history)))
    }

    pub fn child_after_insert(&self, child: &ChildTable) -> CreateTrigger {
        let insert = mirror_into_snapshot(child).ignore();
        let body = Block::new()
            .declare(Declare::IgnoreError(TABLE_IN_USE_BY_STATEMENT))
            .stmt(ProcStmt::sql(insert));

        trigger(TriggerKind::AfterInsert, &child.table, body)
    }

    pub fn child_after_update(&self, child: &ChildTable) -> CreateTrigger {
        let mut body = Block::new();
        if !child.table.has_primary_key() {
            body = body.stmt(ProcStmt::sql(delete_one_snapshot_row(child)));
        }
        body = body.stmt(ProcStmt::sql(mirror_into_snapshot(child).replace()));

        trigger(TriggerKind::AfterUpdate, &child.table, body)
    }

    pub fn child_after_delete(&self, child: &ChildTable) -> CreateTrigger {
        let table = &child.table;
        let delete = if table.has_primary_key() {
            let same_row = Expr::all(table.primary_key.iter().map(|pk| {
                Expr::qualified_column("r", pk.clone()).eq(Expr::old_row(pk.clone()))
            }));
            let delete = DeleteStmt::aliased(names::revision_table(&table.name), "r").join(
                Join::inner(
                    child.link.parent.clone(),
                    "p",
                    Expr::qualified_column("r", names::REVISION)
                        .eq(Expr::qualified_column("p", names::REVISION)),
                ),
            );
            match same_row {
                Some(cond) => delete.where_(cond),
                None => delete,
            }
        } else {
            delete_one_snapshot_row(child)
        };

        let body = Block::new()
            .declare(Declare::IgnoreError(TABLE_IN_USE_BY_STATEMENT))
            .stmt(ProcStmt::sql(delete));

        trigger(TriggerKind::AfterDelete, table, body)
    }

    fn user(&self) -> Expr {
        Expr::user_var(self.options.user_variable.as_str())
    }

    /// Look up the revision the row points at. Copy a resolved snapshot onto
    /// the row; leave the row alone for a pending one; abort for a missing one.
    fn restore_from_revision(&self, root: &TableModel) -> Vec<ProcStmt> {
        let mut columns: Vec<ColumnName> = root.column_names();
        columns.extend([column(names::REVISION), column(names::REVISION_ACTION)]);

        let lookup = SelectStmt::new()
            .exprs(columns.iter().cloned().map(Expr::column))
            .into_vars(columns.iter().map(restore_var))
            .from(FromClause::table(names::revision_table(&root.name)))
            .where_(Expr::column(names::REVISION).eq(Expr::new_row(names::REVISION)))
            .limit(1);

        let copy_snapshot = ProcStmt::Set(
            root.columns
                .iter()
                .map(|c| {
                    SetAssignment::new(
                        Expr::new_row(c.name.clone()),
                        Expr::Var(restore_var(&c.name)),
                    )
                })
                .collect(),
        );

        let missing = self.options.dialect.raise(
            UNKNOWN_REVISION_SQLSTATE,
            &unknown_revision_message(root.name.as_str()),
        );

        vec![
            ProcStmt::sql(lookup),
            IfStmt::new(
                Expr::Var(restore_var(&column(names::REVISION))).is_null(),
                [missing],
            )
            .else_if(
                Expr::Var(restore_var(&column(names::REVISION_ACTION))).is_not_null(),
                [copy_snapshot],
            )
            .into(),
        ]
    }

    /// Abort the update when any primary key column changes value or
    /// null-ness.
    fn primary_key_guard(&self, root: &TableModel) -> IfStmt {
        let changed = Expr::any(root.primary_key.iter().map(|pk| {
            Expr::new_row(pk.clone())
                .null_safe_eq(Expr::old_row(pk.clone()))
                .not()
        }))
        .unwrap_or(Expr::Bool(false));

        IfStmt::new(
            changed,
            [self.options.dialect.raise(
                IMMUTABLE_PRIMARY_KEY_SQLSTATE,
                &immutable_primary_key_message(root.name.as_str()),
            )],
        )
    }

    /// When the row has no revision yet, open a pending one and point at it.
    fn open_pending_revision(&self, root: &TableModel, previous: Expr) -> IfStmt {
        let insert = InsertStmt::new(names::revision_table(&root.name))
            .column(names::REVISION_PREVIOUS, previous)
            .column(names::REVISION_COMMENT, Expr::new_row(names::REVISION_COMMENT))
            .column(names::REVISION_USER_ID, self.user())
            .column(names::REVISION_TIMESTAMP, Expr::Now);

        IfStmt::new(
            Expr::new_row(names::REVISION).is_null(),
            [
                ProcStmt::sql(insert),
                ProcStmt::set(Expr::new_row(names::REVISION), Expr::last_insert_id()),
            ],
        )
    }

    /// One history row for the row's primary key, as seen through `row`
    /// (`NEW` or `OLD`).
    fn history_entry(
        &self,
        root: &TableModel,
        row: fn(ColumnName) -> Expr,
        revision: Expr,
    ) -> InsertStmt {
        let mut insert = InsertStmt::new(names::history_table(&root.name));
        for pk in &root.primary_key {
            insert = insert.column(pk.clone(), row(pk.clone()));
        }
        insert
            .column(names::REVISION, revision)
            .column(names::HISTORY_USER_ID, self.user())
            .column(names::HISTORY_TIMESTAMP, Expr::Now)
    }
}

fn trigger(kind: TriggerKind, table: &TableModel, body: Block) -> CreateTrigger {
    CreateTrigger::new(
        kind.name_for(&table.name),
        kind.timing(),
        kind.event(),
        table.name.clone(),
        body,
    )
}

fn restore_declarations(root: &TableModel) -> Vec<Declare> {
    let mut declarations: Vec<Declare> = root
        .columns
        .iter()
        .map(|c| Declare::var(restore_var(&c.name), c.ty.clone()))
        .collect();
    declarations.push(Declare::var(
        restore_var(&column(names::REVISION)),
        SqlType::bigint_unsigned(),
    ));
    declarations.push(Declare::var(
        restore_var(&column(names::REVISION_ACTION)),
        SqlType::enumeration(&["INSERT", "UPDATE"]),
    ));
    declarations
}

fn clear_comment() -> ProcStmt {
    ProcStmt::set(Expr::new_row(names::REVISION_COMMENT), Expr::Null)
}

/// Copy the child's live rows under this parent into the new revision.
fn snapshot_child(child: &ChildTable) -> InsertStmt {
    let table = &child.table;
    let mut target = table.column_names();
    target.push(column(names::REVISION));

    let select = SelectStmt::new()
        .exprs(table.column_names().into_iter().map(Expr::column))
        .exprs([Expr::new_row(names::REVISION)])
        .from(FromClause::table(table.name.clone()))
        .where_(
            Expr::column(child.link.foreign_key.clone())
                .eq(Expr::new_row(child.link.parent_key.clone())),
        );

    InsertStmt::select(names::revision_table(&table.name), target, select)
}

/// Replace the child's live rows under this parent with the snapshot taken
/// for the revision the parent now points at.
///
/// Both statements read the snapshot table, so the child's own mirror
/// triggers fail with 1442 (handled) instead of rewriting that snapshot
/// while it is being restored. On insert there are no live rows to clear.
fn restore_child(child: &ChildTable, event: TriggerEvent) -> Vec<ProcStmt> {
    let table = &child.table;
    let revision = names::revision_table(&table.name);
    let mut stmts = Vec::new();

    if event == TriggerEvent::Update {
        let clear = DeleteStmt::aliased(table.name.clone(), "t")
            .join(Join::left(revision.clone(), "r", Expr::Bool(false)))
            .where_(
                Expr::qualified_column("t", child.link.foreign_key.clone())
                    .eq(Expr::new_row(child.link.parent_key.clone())),
            );
        stmts.push(ProcStmt::sql(clear));
    }

    let select = SelectStmt::new()
        .exprs(table.column_names().into_iter().map(Expr::column))
        .from(FromClause::table(revision))
        .where_(Expr::column(names::REVISION).eq(Expr::new_row(names::REVISION)));
    stmts.push(ProcStmt::sql(InsertStmt::select(
        table.name.clone(),
        table.column_names(),
        select,
    )));

    stmts
}

/// `INSERT INTO _revision_C (cols, _revision) SELECT NEW.cols, p._revision
/// FROM parent AS p WHERE p.key = NEW.fk`
fn mirror_into_snapshot(child: &ChildTable) -> InsertStmt {
    let table = &child.table;
    let mut target = table.column_names();
    target.push(column(names::REVISION));

    let select = SelectStmt::new()
        .exprs(table.column_names().into_iter().map(Expr::new_row))
        .exprs([Expr::qualified_column("p", names::REVISION)])
        .from(FromClause::aliased(child.link.parent.clone(), "p"))
        .where_(
            Expr::qualified_column("p", child.link.parent_key.clone())
                .eq(Expr::new_row(child.link.foreign_key.clone())),
        );

    InsertStmt::select(names::revision_table(&table.name), target, select)
}

/// Delete one snapshot row equal to OLD within the parent's current revision.
/// Key-less children can hold duplicates, so at most one row goes.
fn delete_one_snapshot_row(child: &ChildTable) -> DeleteStmt {
    let table = &child.table;
    let parent_revision = SelectStmt::new()
        .exprs([Expr::column(names::REVISION)])
        .from(FromClause::table(child.link.parent.clone()))
        .where_(
            Expr::column(child.link.parent_key.clone())
                .eq(Expr::old_row(child.link.foreign_key.clone())),
        );

    let mut cond = Expr::column(names::REVISION).in_select(parent_revision);
    for c in &table.columns {
        cond = cond.and(Expr::column(c.name.clone()).null_safe_eq(Expr::old_row(c.name.clone())));
    }

    DeleteStmt::new(names::revision_table(&table.name))
        .where_(cond)
        .limit(1)
}

#[cfg(test)]
mod tests;
