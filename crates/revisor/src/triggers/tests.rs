use revisor_sql::{SqlType, TriggerEvent, render};

use super::*;
use crate::model::{ChildLink, ColumnModel};
use crate::options::Dialect;

fn col(name: &str, ty: &str) -> ColumnModel {
    ColumnModel {
        name: name.into(),
        ty: SqlType::new(ty),
        nullable: true,
        primary_key: false,
        auto_increment: false,
        charset: None,
        collation: None,
    }
}

fn orders() -> TableModel {
    let mut id = col("id", "int(10) unsigned");
    id.nullable = false;
    id.primary_key = true;
    id.auto_increment = true;
    TableModel {
        name: "orders".into(),
        columns: vec![id, col("code", "varchar(16)"), col("status", "varchar(32)")],
        primary_key: vec!["id".into()],
        unique_indexes: vec![],
        auto_increment: Some("id".into()),
    }
}

fn link() -> ChildLink {
    ChildLink {
        parent: "orders".into(),
        foreign_key: "order_id".into(),
        parent_key: "id".into(),
    }
}

/// Key-less child.
fn order_notes() -> ChildTable {
    ChildTable {
        table: TableModel {
            name: "order_notes".into(),
            columns: vec![col("order_id", "int(10) unsigned"), col("note", "text")],
            primary_key: vec![],
            unique_indexes: vec![],
            auto_increment: None,
        },
        link: link(),
        storage_exists: false,
    }
}

/// Keyed child.
fn order_lines() -> ChildTable {
    let mut id = col("id", "int(10) unsigned");
    id.primary_key = true;
    ChildTable {
        table: TableModel {
            name: "order_lines".into(),
            columns: vec![id, col("order_id", "int(10) unsigned"), col("sku", "varchar(20)")],
            primary_key: vec!["id".into()],
            unique_indexes: vec![],
            auto_increment: None,
        },
        link: link(),
        storage_exists: false,
    }
}

#[test]
fn test_before_insert() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).before_insert(&orders());

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `orders-beforeinsert` BEFORE INSERT ON `orders`
    FOR EACH ROW BEGIN
      DECLARE `restore-id` int(10) unsigned;
      DECLARE `restore-code` varchar(16);
      DECLARE `restore-status` varchar(32);
      DECLARE `restore-_revision` bigint unsigned;
      DECLARE `restore-_revision_action` enum('INSERT','UPDATE');
      IF NEW.`_revision` IS NOT NULL THEN
        SELECT `id`, `code`, `status`, `_revision`, `_revision_action`
        INTO `restore-id`, `restore-code`, `restore-status`, `restore-_revision`, `restore-_revision_action`
        FROM `_revision_orders`
        WHERE `_revision` = NEW.`_revision`
        LIMIT 1;
        IF `restore-_revision` IS NULL THEN
          SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'Unknown revision for table ''orders''';
        ELSEIF `restore-_revision_action` IS NOT NULL THEN
          SET NEW.`id` = `restore-id`, NEW.`code` = `restore-code`, NEW.`status` = `restore-status`;
        END IF;
      END IF;
      IF NEW.`_revision` IS NULL THEN
        INSERT INTO `_revision_orders` (`_revision_previous`, `_revision_comment`, `_revision_user_id`, `_revision_timestamp`)
        VALUES (NULL, NEW.`_revision_comment`, @`auth_uid`, NOW());
        SET NEW.`_revision` = LAST_INSERT_ID();
      END IF;
      SET NEW.`_revision_comment` = NULL;
    END
    ");
}

#[test]
fn test_before_update_chains_and_guards() {
    let options = Options::default();
    let sql = render(&TriggerSynthesizer::new(&options).before_update(&orders()));

    assert!(sql.starts_with("CREATE TRIGGER `orders-beforeupdate` BEFORE UPDATE ON `orders`"));
    assert!(sql.contains(
        "  IF NEW.`_revision` = OLD.`_revision` THEN\n    SET NEW.`_revision` = NULL;\n  ELSEIF NEW.`_revision` IS NOT NULL THEN\n"
    ));
    assert!(sql.contains(
        "  IF NOT (NEW.`id` <=> OLD.`id`) THEN\n    SIGNAL SQLSTATE '23000' SET MESSAGE_TEXT = 'Can''t change the value of the primary key of table ''orders'' because of revisioning';\n  END IF;"
    ));
    assert!(sql.contains("VALUES (OLD.`_revision`, NEW.`_revision_comment`, @`auth_uid`, NOW());"));

    // The guard runs after the pointer has been settled and before the new
    // revision is opened.
    let guard = sql.find("IF NOT (").unwrap();
    assert!(sql.find("ELSEIF NEW.`_revision` IS NOT NULL").unwrap() < guard);
    assert!(guard < sql.find("INSERT INTO `_revision_orders`").unwrap());
}

/// The lookup both before-triggers run when the pointer names another
/// revision. A resolved entry is copied onto the row; a pending one (NULL
/// action) falls through with NEW untouched.
const REVISION_LOOKUP: &str = "    SELECT `id`, `code`, `status`, `_revision`, `_revision_action`
    INTO `restore-id`, `restore-code`, `restore-status`, `restore-_revision`, `restore-_revision_action`
    FROM `_revision_orders`
    WHERE `_revision` = NEW.`_revision`
    LIMIT 1;
    IF `restore-_revision` IS NULL THEN
      SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'Unknown revision for table ''orders''';
    ELSEIF `restore-_revision_action` IS NOT NULL THEN
      SET NEW.`id` = `restore-id`, NEW.`code` = `restore-code`, NEW.`status` = `restore-status`;
    END IF;
";

#[test]
fn test_other_revision_copies_resolved_and_keeps_pending() {
    let options = Options::default();
    let sql = render(&TriggerSynthesizer::new(&options).before_update(&orders()));

    let branch = "  ELSEIF NEW.`_revision` IS NOT NULL THEN\n";
    let lookup_at = sql.find(REVISION_LOOKUP).unwrap();
    assert_eq!(sql.find(branch).unwrap() + branch.len(), lookup_at);
    // No ELSE: a pending revision leaves the row as written.
    assert!(sql[lookup_at..].starts_with(&format!("{REVISION_LOOKUP}  END IF;\n")));
    assert_eq!(sql.matches("SET NEW.`id` = ").count(), 1);

    // A pointer to any other revision opens no new entry.
    let open = sql.find("  IF NEW.`_revision` IS NULL THEN\n    INSERT INTO").unwrap();
    assert!(lookup_at < open);
}

#[test]
fn test_insert_with_revision_reverts() {
    let options = Options::default();
    let synth = TriggerSynthesizer::new(&options);

    let before = render(&synth.before_insert(&orders()));
    let guarded = format!("  IF NEW.`_revision` IS NOT NULL THEN\n{REVISION_LOOKUP}  END IF;\n");
    assert!(before.contains(&guarded), "{before}");

    // Nothing pending to resolve means a revert: children come back from the
    // snapshot instead of being copied into it.
    let shape = TriggerShape::WithChildren(vec![order_notes()]);
    let after = render(&synth.after_write(TriggerEvent::Insert, &orders(), &shape));
    let restore = after.find("INSERT INTO `order_notes` (`order_id`, `note`)").unwrap();
    assert!(after.find("  ELSE\n").unwrap() < restore);
    assert!(!after.contains("DELETE `t` FROM `order_notes`"));
}

#[test]
fn test_composite_key_guard_checks_every_column() {
    let mut root = orders();
    root.columns[1].primary_key = true;
    root.primary_key.push("code".into());

    let options = Options::default();
    let sql = render(&TriggerSynthesizer::new(&options).before_update(&root));
    assert!(sql.contains("IF NOT (NEW.`id` <=> OLD.`id`) OR NOT (NEW.`code` <=> OLD.`code`) THEN"));
}

#[test]
fn test_legacy_dialect_raises_with_do() {
    let options = Options::new().dialect(Dialect::LegacySignal);
    let sql = render(&TriggerSynthesizer::new(&options).before_update(&orders()));

    assert!(!sql.contains("SIGNAL"));
    assert!(sql.contains(
        "DO `Can't change the value of the primary key of table 'orders' because of revisioning`;"
    ));
    assert!(sql.contains("DO `Unknown revision for table 'orders'`;"));
}

#[test]
fn test_user_variable_option() {
    let options = Options::new().user_variable("editor_id");
    let synth = TriggerSynthesizer::new(&options);

    assert!(render(&synth.before_insert(&orders())).contains("@`editor_id`"));
    assert!(render(&synth.after_delete(&orders())).contains("@`editor_id`"));
}

#[test]
fn test_after_insert_single() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).after_write(
        TriggerEvent::Insert,
        &orders(),
        &TriggerShape::Single,
    );

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `orders-afterinsert` AFTER INSERT ON `orders`
    FOR EACH ROW BEGIN
      UPDATE `_revision_orders`
      SET `id` = NEW.`id`, `code` = NEW.`code`, `status` = NEW.`status`, `_revision_action` = 'INSERT'
      WHERE `_revision` = NEW.`_revision` AND `_revision_action` IS NULL;
      INSERT INTO `_revhistory_orders` (`id`, `_revision`, `_revhistory_user_id`, `_revhistory_timestamp`)
      VALUES (NEW.`id`, NEW.`_revision`, @`auth_uid`, NOW());
    END
    ");
}

#[test]
fn test_after_insert_with_children() {
    let options = Options::default();
    let shape = TriggerShape::WithChildren(vec![order_notes()]);
    let trigger =
        TriggerSynthesizer::new(&options).after_write(TriggerEvent::Insert, &orders(), &shape);

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `orders-afterinsert` AFTER INSERT ON `orders`
    FOR EACH ROW BEGIN
      DECLARE `fresh-revision` boolean;
      UPDATE `_revision_orders`
      SET `id` = NEW.`id`, `code` = NEW.`code`, `status` = NEW.`status`, `_revision_action` = 'INSERT'
      WHERE `_revision` = NEW.`_revision` AND `_revision_action` IS NULL;
      SET `fresh-revision` = ROW_COUNT() > 0;
      INSERT INTO `_revhistory_orders` (`id`, `_revision`, `_revhistory_user_id`, `_revhistory_timestamp`)
      VALUES (NEW.`id`, NEW.`_revision`, @`auth_uid`, NOW());
      IF `fresh-revision` THEN
        INSERT INTO `_revision_order_notes` (`order_id`, `note`, `_revision`)
        SELECT `order_id`, `note`, NEW.`_revision`
        FROM `order_notes`
        WHERE `order_id` = NEW.`id`;
      ELSE
        INSERT INTO `order_notes` (`order_id`, `note`)
        SELECT `order_id`, `note`
        FROM `_revision_order_notes`
        WHERE `_revision` = NEW.`_revision`;
      END IF;
    END
    ");
}

#[test]
fn test_after_update_clears_children_before_restoring() {
    let options = Options::default();
    let shape = TriggerShape::WithChildren(vec![order_notes(), order_lines()]);
    let trigger =
        TriggerSynthesizer::new(&options).after_write(TriggerEvent::Update, &orders(), &shape);
    let sql = render(&trigger);

    assert!(sql.starts_with("CREATE TRIGGER `orders-afterupdate` AFTER UPDATE ON `orders`"));
    assert!(sql.contains("`_revision_action` = 'UPDATE'"));

    let clear = "    DELETE `t` FROM `order_notes` AS `t`\n    LEFT JOIN `_revision_order_notes` AS `r` ON FALSE\n    WHERE `t`.`order_id` = NEW.`id`;";
    let restore = "    INSERT INTO `order_notes` (`order_id`, `note`)\n    SELECT `order_id`, `note`\n    FROM `_revision_order_notes`\n";
    let clear_at = sql.find(clear).unwrap();
    let restore_at = sql.find(restore).unwrap();
    assert!(sql.find("  ELSE\n").unwrap() < clear_at);
    assert!(clear_at < restore_at);

    // Children are handled in declaration order.
    assert!(restore_at < sql.find("DELETE `t` FROM `order_lines` AS `t`").unwrap());
    assert!(sql.contains("INSERT INTO `_revision_order_lines` (`id`, `order_id`, `sku`, `_revision`)"));
}

#[test]
fn test_after_delete_logs_null_revision() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).after_delete(&orders());

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `orders-afterdelete` AFTER DELETE ON `orders`
    FOR EACH ROW BEGIN
      INSERT INTO `_revhistory_orders` (`id`, `_revision`, `_revhistory_user_id`, `_revhistory_timestamp`)
      VALUES (OLD.`id`, NULL, @`auth_uid`, NOW());
    END
    ");
}

#[test]
fn test_child_after_insert() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).child_after_insert(&order_notes());

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `order_notes-afterinsert` AFTER INSERT ON `order_notes`
    FOR EACH ROW BEGIN
      DECLARE CONTINUE HANDLER FOR 1442 BEGIN END;
      INSERT IGNORE INTO `_revision_order_notes` (`order_id`, `note`, `_revision`)
      SELECT NEW.`order_id`, NEW.`note`, `p`.`_revision`
      FROM `orders` AS `p`
      WHERE `p`.`id` = NEW.`order_id`;
    END
    ");
}

#[test]
fn test_child_after_update_without_key() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).child_after_update(&order_notes());

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `order_notes-afterupdate` AFTER UPDATE ON `order_notes`
    FOR EACH ROW BEGIN
      DELETE FROM `_revision_order_notes`
      WHERE `_revision` IN (SELECT `_revision` FROM `orders` WHERE `id` = OLD.`order_id`) AND `order_id` <=> OLD.`order_id` AND `note` <=> OLD.`note`
      LIMIT 1;
      REPLACE INTO `_revision_order_notes` (`order_id`, `note`, `_revision`)
      SELECT NEW.`order_id`, NEW.`note`, `p`.`_revision`
      FROM `orders` AS `p`
      WHERE `p`.`id` = NEW.`order_id`;
    END
    ");
}

#[test]
fn test_child_after_update_with_key_only_replaces() {
    let options = Options::default();
    let sql = render(&TriggerSynthesizer::new(&options).child_after_update(&order_lines()));

    assert!(!sql.contains("DELETE"));
    assert!(sql.contains("REPLACE INTO `_revision_order_lines` (`id`, `order_id`, `sku`, `_revision`)"));
}

#[test]
fn test_child_after_delete_with_key() {
    let options = Options::default();
    let trigger = TriggerSynthesizer::new(&options).child_after_delete(&order_lines());

    insta::assert_snapshot!(render(&trigger), @r"
    CREATE TRIGGER `order_lines-afterdelete` AFTER DELETE ON `order_lines`
    FOR EACH ROW BEGIN
      DECLARE CONTINUE HANDLER FOR 1442 BEGIN END;
      DELETE `r` FROM `_revision_order_lines` AS `r`
      INNER JOIN `orders` AS `p` ON `r`.`_revision` = `p`.`_revision`
      WHERE `r`.`id` = OLD.`id`;
    END
    ");
}

#[test]
fn test_child_after_delete_without_key_removes_one_row() {
    let options = Options::default();
    let sql = render(&TriggerSynthesizer::new(&options).child_after_delete(&order_notes()));

    assert!(sql.contains("DECLARE CONTINUE HANDLER FOR 1442 BEGIN END;"));
    assert!(sql.contains("DELETE FROM `_revision_order_notes`\n"));
    assert!(sql.contains("`note` <=> OLD.`note`\n  LIMIT 1;"));
}

#[test]
fn test_group_trigger_order() {
    let group = TableGroup {
        root: orders(),
        shape: TriggerShape::WithChildren(vec![order_notes()]),
        structural_skip: false,
    };
    let options = Options::default();
    let names: Vec<String> = TriggerSynthesizer::new(&options)
        .group(&group)
        .iter()
        .map(|t| t.name.to_string())
        .collect();

    assert_eq!(
        names,
        [
            "orders-beforeinsert",
            "orders-beforeupdate",
            "orders-afterinsert",
            "orders-afterupdate",
            "orders-afterdelete",
            "order_notes-afterinsert",
            "order_notes-afterupdate",
            "order_notes-afterdelete",
        ]
    );
}
