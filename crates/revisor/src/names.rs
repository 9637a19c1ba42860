//! Physical names of everything revisioning adds to a schema.
//!
//! All of them share the `_revision` prefix, which doubles as the marker for
//! "already revisioned": any live column carrying it means the storage exists.

use revisor_sql::{ColumnName, TableName, TriggerEvent, TriggerName, TriggerTiming, VarName};

/// Reserved prefix of every column, index and table added by revisioning.
pub const RESERVED_PREFIX: &str = "_revision";

/// Revision id; the pointer column on live roots and the key of snapshots.
pub const REVISION: &str = "_revision";
/// Back-pointer to the revision this one was derived from.
pub const REVISION_PREVIOUS: &str = "_revision_previous";
/// `INSERT`, `UPDATE`, or NULL while pending.
pub const REVISION_ACTION: &str = "_revision_action";
pub const REVISION_USER_ID: &str = "_revision_user_id";
pub const REVISION_TIMESTAMP: &str = "_revision_timestamp";
/// Free-text comment; transient scratch on the live root.
pub const REVISION_COMMENT: &str = "_revision_comment";

pub const HISTORY_USER_ID: &str = "_revhistory_user_id";
pub const HISTORY_TIMESTAMP: &str = "_revhistory_timestamp";

/// Non-unique index on the original primary key inside snapshot tables.
pub const ORIGINAL_PRIMARY_INDEX: &str = "org_primary";

/// Comment stored on snapshot rows copied in at install time.
pub const BACKFILL_COMMENT: &str = "initialization";

/// Columns that install adds to a live root table, in the order they are added.
pub const ROOT_COLUMNS: [&str; 2] = [REVISION, REVISION_COMMENT];

/// Whether a column or index name belongs to revisioning.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// `_revision_<table>`: snapshot storage for a root or child table.
pub fn revision_table(table: &TableName) -> TableName {
    TableName::from(format!("_revision_{table}"))
}

/// `_revhistory_<table>`: the append-only event log of a root table.
pub fn history_table(table: &TableName) -> TableName {
    TableName::from(format!("_revhistory_{table}"))
}

pub fn column(name: &str) -> ColumnName {
    ColumnName::from(name)
}

/// Longest identifier MySQL accepts, local variables included.
pub const IDENT_MAX: usize = 64;

/// `restore-<column>`: the trigger local that holds a column's value while a
/// revert is in progress.
///
/// Names that would not fit are truncated and suffixed with a hash of the full
/// column name, so two long columns sharing a prefix still get distinct locals.
pub fn restore_var(column: &ColumnName) -> VarName {
    const PREFIX: &str = "restore-";
    let name = column.as_str();
    if PREFIX.len() + name.len() <= IDENT_MAX {
        return VarName::from(format!("{PREFIX}{name}"));
    }

    let hex = blake3::hash(name.as_bytes()).to_hex().to_string();
    let suffix = &hex[..16];
    let max_name_len = IDENT_MAX - PREFIX.len() - 1 - suffix.len();

    // Column names may be multi-byte; never split a character.
    let mut len = max_name_len.min(name.len());
    while len > 0 && !name.is_char_boundary(len) {
        len -= 1;
    }
    VarName::from(format!("{PREFIX}{}_{suffix}", &name[..len]))
}

/// The five triggers revisioning may install on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    BeforeInsert,
    BeforeUpdate,
    AfterInsert,
    AfterUpdate,
    AfterDelete,
}

impl TriggerKind {
    /// Every kind, in the order teardown drops them.
    pub const ALL: [TriggerKind; 5] = [
        TriggerKind::AfterDelete,
        TriggerKind::AfterUpdate,
        TriggerKind::BeforeUpdate,
        TriggerKind::AfterInsert,
        TriggerKind::BeforeInsert,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            TriggerKind::BeforeInsert => "beforeinsert",
            TriggerKind::BeforeUpdate => "beforeupdate",
            TriggerKind::AfterInsert => "afterinsert",
            TriggerKind::AfterUpdate => "afterupdate",
            TriggerKind::AfterDelete => "afterdelete",
        }
    }

    pub fn timing(self) -> TriggerTiming {
        match self {
            TriggerKind::BeforeInsert | TriggerKind::BeforeUpdate => TriggerTiming::Before,
            TriggerKind::AfterInsert | TriggerKind::AfterUpdate | TriggerKind::AfterDelete => {
                TriggerTiming::After
            }
        }
    }

    pub fn event(self) -> TriggerEvent {
        match self {
            TriggerKind::BeforeInsert | TriggerKind::AfterInsert => TriggerEvent::Insert,
            TriggerKind::BeforeUpdate | TriggerKind::AfterUpdate => TriggerEvent::Update,
            TriggerKind::AfterDelete => TriggerEvent::Delete,
        }
    }

    /// `<table>-<suffix>`, e.g. `orders-beforeinsert`.
    pub fn name_for(self, table: &TableName) -> TriggerName {
        TriggerName::from(format!("{table}-{}", self.suffix()))
    }
}
