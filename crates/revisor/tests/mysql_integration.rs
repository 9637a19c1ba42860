//! Integration tests against real MySQL.
//!
//! These tests verify that:
//! 1. Installed triggers chain revisions and write history on every change
//! 2. Reverting through `_revision` restores the row and its children
//! 3. Remove leaves the tables as they were before install
//!
//! Run with: cargo nextest run -p revisor --features test-mysql --test mysql_integration
//!
//! Note: Requires Docker to be running, unless `MYSQL_URL` points at a
//! scratch database. Every test recreates the same tables, so a shared
//! database needs `--test-threads=1`.

#![cfg(feature = "test-mysql")]

use std::time::Duration;

use revisor::{Executor, GroupSpec, MySqlExecutor, Options, Orchestrator, Row};
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mysql::Mysql;

struct TestDb {
    executor: MySqlExecutor,
    _container: Option<ContainerAsync<Mysql>>,
}

async fn setup() -> TestDb {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("revisor=debug")
        .with_test_writer()
        .try_init();

    let (url, container) = match std::env::var("MYSQL_URL") {
        Ok(url) => (url, None),
        Err(_) => {
            let container = Mysql::default()
                .start()
                .await
                .expect("failed to start mysql container");
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(3306).await.unwrap();
            (format!("mysql://root@{host}:{port}/test"), Some(container))
        }
    };

    // The server accepts connections a little after the container reports ready.
    let mut attempts = 0;
    let executor = loop {
        match MySqlExecutor::connect(&url).await {
            Ok(executor) => break executor,
            Err(err) if attempts < 30 => {
                attempts += 1;
                tracing::debug!("mysql not ready yet: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => panic!("could not connect to {url}: {err}"),
        }
    };

    let mut db = TestDb {
        executor,
        _container: container,
    };
    for table in [
        "order_notes",
        "_revision_order_notes",
        "order_lines",
        "_revision_order_lines",
        "_revhistory_orders",
        "_revision_orders",
        "orders",
    ] {
        db.exec(&format!("DROP TABLE IF EXISTS `{table}`")).await;
    }
    db.exec(
        "CREATE TABLE orders (
            id int unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY,
            status varchar(32)
        ) ENGINE=InnoDB",
    )
    .await;
    db.exec(
        "CREATE TABLE order_lines (
            id int unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY,
            order_id int unsigned NOT NULL,
            sku varchar(20),
            CONSTRAINT fk_order FOREIGN KEY (order_id) REFERENCES orders (id)
        ) ENGINE=InnoDB",
    )
    .await;
    db.exec(
        "CREATE TABLE order_notes (
            order_id int unsigned NOT NULL,
            note varchar(64),
            CONSTRAINT fk_note_order FOREIGN KEY (order_id) REFERENCES orders (id)
        ) ENGINE=InnoDB",
    )
    .await;
    db
}

fn group() -> GroupSpec {
    GroupSpec::new("orders").child("order_lines").child("order_notes")
}

impl TestDb {
    async fn exec(&mut self, sql: &str) {
        self.executor.execute(sql).await.unwrap();
    }

    async fn rows(&mut self, sql: &str) -> Vec<Vec<Option<String>>> {
        let rows = self.executor.fetch(sql, &[]).await.unwrap();
        rows.iter().map(values).collect()
    }

    async fn count(&mut self, table: &str) -> usize {
        let rows = self
            .rows(&format!("SELECT CAST(COUNT(*) AS CHAR) FROM `{table}`"))
            .await;
        rows[0][0].as_deref().unwrap().parse().unwrap()
    }

    async fn skus(&mut self) -> Vec<String> {
        self.rows("SELECT CAST(sku AS CHAR) FROM order_lines WHERE order_id = 1 ORDER BY id")
            .await
            .into_iter()
            .map(|row| row[0].clone().unwrap())
            .collect()
    }

    /// The children of order 1 under its current revision, as stored in the
    /// snapshot, must equal the live rows.
    async fn assert_children_snapshotted(&mut self) {
        for (table, columns) in [
            ("order_lines", "CAST(id AS CHAR), CAST(sku AS CHAR)"),
            ("order_notes", "CAST(note AS CHAR)"),
        ] {
            let live = self
                .rows(&format!(
                    "SELECT {columns} FROM `{table}` WHERE order_id = 1 ORDER BY {columns}"
                ))
                .await;
            let snapshot = self
                .rows(&format!(
                    "SELECT {columns} FROM `_revision_{table}` \
                     WHERE _revision = (SELECT _revision FROM orders WHERE id = 1) \
                     ORDER BY {columns}"
                ))
                .await;
            assert_eq!(live, snapshot, "{table}");
        }
    }
}

fn values(row: &Row) -> Vec<Option<String>> {
    (0..row.len()).map(|i| row.get(i).map(str::to_owned)).collect()
}

fn s(v: &str) -> Option<String> {
    Some(v.to_owned())
}

async fn install(db: TestDb) -> TestDb {
    let TestDb {
        executor,
        _container,
    } = db;
    let specs = [group()];
    let mut orchestrator = Orchestrator::new(executor, Options::default());
    let report = orchestrator.install(&specs).await;
    assert!(!report.has_failures(), "{report:#?}");
    TestDb {
        executor: orchestrator.into_executor(),
        _container,
    }
}

#[tokio::test]
async fn test_revision_chain_and_revert() {
    let mut db = install(setup().await).await;
    db.exec("SET @auth_uid = 7").await;

    db.exec("INSERT INTO orders (id, status) VALUES (1, 'new')").await;
    db.exec("INSERT INTO order_lines (order_id, sku) VALUES (1, 'apple')").await;
    db.exec("INSERT INTO order_notes (order_id, note) VALUES (1, 'leave at door')").await;
    db.exec("UPDATE orders SET status = 'shipped' WHERE id = 1").await;
    db.exec("INSERT INTO order_lines (order_id, sku) VALUES (1, 'pear')").await;
    db.assert_children_snapshotted().await;

    // A key-less child row is matched by value.
    db.exec("UPDATE order_notes SET note = 'ring twice' WHERE order_id = 1").await;
    db.assert_children_snapshotted().await;
    assert_eq!(db.count("_revision_order_notes").await, 2);

    let revisions = db
        .rows(
            "SELECT CAST(_revision AS CHAR), CAST(_revision_previous AS CHAR), \
             CAST(_revision_action AS CHAR), CAST(_revision_user_id AS CHAR), CAST(status AS CHAR) \
             FROM _revision_orders ORDER BY _revision",
        )
        .await;
    assert_eq!(
        revisions,
        vec![
            vec![s("1"), None, s("INSERT"), s("7"), s("new")],
            vec![s("2"), s("1"), s("UPDATE"), s("7"), s("shipped")],
        ]
    );
    assert_eq!(db.count("_revhistory_orders").await, 2);

    // The comment is scratch space: it lands on the revision, never on the row.
    db.exec("UPDATE orders SET status = 'paid', _revision_comment = 'customer paid' WHERE id = 1")
        .await;
    let comment = db
        .rows("SELECT CAST(_revision_comment AS CHAR) FROM _revision_orders WHERE _revision = 3")
        .await;
    assert_eq!(comment, vec![vec![s("customer paid")]]);
    let live = db.rows("SELECT CAST(_revision_comment AS CHAR) FROM orders WHERE id = 1").await;
    assert_eq!(live, vec![vec![None]]);
    assert_eq!(db.skus().await, ["apple", "pear"]);

    // Revert to the first revision: no new entry, fields and children restored.
    db.exec("UPDATE orders SET _revision = 1 WHERE id = 1").await;
    let row = db
        .rows("SELECT CAST(status AS CHAR), CAST(_revision AS CHAR) FROM orders WHERE id = 1")
        .await;
    assert_eq!(row, vec![vec![s("new"), s("1")]]);
    assert_eq!(db.count("_revision_orders").await, 3);
    assert_eq!(db.count("_revhistory_orders").await, 4);
    assert_eq!(db.skus().await, ["apple"]);
    db.assert_children_snapshotted().await;
    let notes = db.rows("SELECT CAST(note AS CHAR) FROM order_notes").await;
    assert_eq!(notes, vec![vec![s("leave at door")]]);

    // A regular update after the revert branches off revision 1.
    db.exec("UPDATE orders SET status = 'cancelled' WHERE id = 1").await;
    let latest = db
        .rows(
            "SELECT CAST(_revision_previous AS CHAR) FROM _revision_orders \
             ORDER BY _revision DESC LIMIT 1",
        )
        .await;
    assert_eq!(latest, vec![vec![s("1")]]);

    db.assert_children_snapshotted().await;

    db.exec("DELETE FROM order_lines WHERE order_id = 1").await;
    db.exec("DELETE FROM order_notes WHERE order_id = 1").await;
    db.exec("DELETE FROM orders WHERE id = 1").await;
    let deleted = db
        .rows(
            "SELECT CAST(_revision AS CHAR) FROM _revhistory_orders \
             ORDER BY _revhistory_timestamp DESC, _revision LIMIT 1",
        )
        .await;
    assert_eq!(deleted, vec![vec![None]]);
    assert_eq!(db.count("_revhistory_orders").await, 6);
}

#[tokio::test]
async fn test_guards() {
    let mut db = install(setup().await).await;
    db.exec("INSERT INTO orders (id, status) VALUES (1, 'new')").await;

    let err = db
        .executor
        .execute("UPDATE orders SET id = 5 WHERE id = 1")
        .await
        .unwrap_err();
    assert!(err.is_immutable_primary_key(), "{err}");

    let err = db
        .executor
        .execute("UPDATE orders SET _revision = 99 WHERE id = 1")
        .await
        .unwrap_err();
    assert!(err.is_unknown_revision(), "{err}");

    // Neither attempt left a trace.
    let row = db.rows("SELECT CAST(id AS CHAR), CAST(status AS CHAR) FROM orders").await;
    assert_eq!(row, vec![vec![s("1"), s("new")]]);
    assert_eq!(db.count("_revision_orders").await, 1);
}

#[tokio::test]
async fn test_insert_with_revision_restores_deleted_row() {
    let mut db = install(setup().await).await;
    db.exec("INSERT INTO orders (id, status) VALUES (2, 'draft')").await;
    let revision = db.rows("SELECT CAST(_revision AS CHAR) FROM orders WHERE id = 2").await;
    let revision = revision[0][0].clone().unwrap();
    db.exec("DELETE FROM orders WHERE id = 2").await;

    db.exec(&format!("INSERT INTO orders (_revision) VALUES ({revision})")).await;
    let row = db
        .rows("SELECT CAST(id AS CHAR), CAST(status AS CHAR), CAST(_revision AS CHAR) FROM orders")
        .await;
    assert_eq!(row, vec![vec![s("2"), s("draft"), Some(revision)]]);
    assert_eq!(db.count("_revision_orders").await, 1);
    assert_eq!(db.count("_revhistory_orders").await, 3);
}

#[tokio::test]
async fn test_backfill_reinstall_and_remove() {
    let mut db = setup().await;
    db.exec("INSERT INTO orders (id, status) VALUES (1, 'new'), (2, 'new')").await;
    db.exec("INSERT INTO order_lines (order_id, sku) VALUES (1, 'apple')").await;

    let mut db = install(db).await;
    let backfilled = db
        .rows(
            "SELECT CAST(o.id AS CHAR), CAST(r._revision_action AS CHAR), \
             CAST(r._revision_comment AS CHAR) \
             FROM orders AS o INNER JOIN _revision_orders AS r ON r._revision = o._revision \
             ORDER BY o.id",
        )
        .await;
    assert_eq!(
        backfilled,
        vec![
            vec![s("1"), s("INSERT"), s("initialization")],
            vec![s("2"), s("INSERT"), s("initialization")],
        ]
    );
    assert_eq!(db.count("_revhistory_orders").await, 2);
    assert_eq!(db.count("_revision_order_lines").await, 1);

    // Installing again keeps the data and only replaces triggers.
    let db = install(db).await;
    let TestDb {
        executor,
        _container,
    } = db;
    let mut orchestrator = Orchestrator::new(executor, Options::default());
    let report = orchestrator
        .remove(&[group()])
        .await;
    assert!(!report.has_failures(), "{report:#?}");

    let mut db = TestDb {
        executor: orchestrator.into_executor(),
        _container,
    };
    let leftovers = db
        .rows(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME LIKE '\\_rev%'",
        )
        .await;
    assert!(leftovers.is_empty(), "{leftovers:?}");
    let columns = db
        .rows(
            "SELECT CAST(COLUMN_NAME AS CHAR) FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = 'orders' ORDER BY ORDINAL_POSITION",
        )
        .await;
    assert_eq!(columns, vec![vec![s("id")], vec![s("status")]]);

    // Plain writes work again.
    db.exec("UPDATE orders SET id = 5 WHERE id = 2").await;
}
