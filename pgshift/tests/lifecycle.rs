use pgshift::{
    MemoryEngine, Migration, MigrationStatus, RawMigration, Session, ShiftError, StoreError,
};
use serde_json::{json, Value};

fn migration(name: &str, operations: Value) -> Migration {
    Migration::parse(RawMigration {
        name: name.to_owned(),
        operations,
    })
    .unwrap()
}

fn create_foo() -> Migration {
    migration(
        "0001_create_foo_table",
        json!([{
            "create_table": {
                "name": "foo",
                "columns": [{"name": "id", "type": "serial", "pk": true}]
            }
        }]),
    )
}

#[tokio::test]
async fn start_then_complete_finalizes_schema() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();

    // Expand phase: visible in the view, not yet committed.
    assert!(engine.view().tables.contains_key("foo"));
    assert!(!engine.committed().tables.contains_key("foo"));

    let record = session.complete().await.unwrap();

    assert_eq!(record.status, MigrationStatus::Completed);
    assert!(engine.committed().tables.contains_key("foo"));

    let status = session.status().await.unwrap();
    assert!(status.active.is_none());
    assert_eq!(status.last.unwrap().name, "0001_create_foo_table");
}

#[tokio::test]
async fn start_then_rollback_leaves_no_trace() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();
    let record = session.rollback().await.unwrap();

    assert_eq!(record.status, MigrationStatus::RolledBack);
    assert!(!engine.committed().tables.contains_key("foo"));
    assert!(!engine.view().tables.contains_key("foo"));
    assert!(session.status().await.unwrap().active.is_none());
}

#[tokio::test]
async fn rolled_back_migration_can_be_reapplied() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();
    session.rollback().await.unwrap();

    // Same name again: the rolled-back record does not block the retry.
    session.start(&create_foo()).await.unwrap();
    let record = session.complete().await.unwrap();

    assert_eq!(record.name, "0001_create_foo_table");
    assert_eq!(record.status, MigrationStatus::Completed);
    assert!(engine.committed().tables.contains_key("foo"));
}

#[tokio::test]
async fn concurrent_finishes_pick_a_single_winner() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();

    let (complete, rollback) = tokio::join!(session.complete(), session.rollback());

    // Exactly one transition lands; the other finds no active migration.
    assert!(complete.is_ok() != rollback.is_ok());
    assert!(session.status().await.unwrap().active.is_none());
}

#[tokio::test]
async fn start_while_in_progress_fails_and_leaves_state() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();
    let view_before = engine.view();

    let second = migration(
        "0002_create_bar_table",
        json!([{
            "create_table": {
                "name": "bar",
                "columns": [{"name": "id", "type": "serial", "pk": true}]
            }
        }]),
    );
    let err = session.start(&second).await.unwrap_err();

    assert!(matches!(
        err,
        ShiftError::Store(StoreError::MigrationInProgress(name)) if name == "0001_create_foo_table"
    ));
    assert_eq!(engine.view(), view_before);
    assert_eq!(
        session.status().await.unwrap().active.unwrap().name,
        "0001_create_foo_table"
    );
}

#[tokio::test]
async fn complete_and_rollback_require_active_migration() {
    let session = MemoryEngine::session("public");
    session.init().await.unwrap();

    assert!(matches!(
        session.complete().await.unwrap_err(),
        ShiftError::Store(StoreError::NoActiveMigration)
    ));
    assert!(matches!(
        session.rollback().await.unwrap_err(),
        ShiftError::Store(StoreError::NoActiveMigration)
    ));
}

#[tokio::test]
async fn add_column_is_staged_before_complete() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();
    session.complete().await.unwrap();

    let add = migration(
        "0002_add_name",
        json!([{
            "add_column": {
                "table": "foo",
                "column": {"name": "name", "type": "text", "nullable": false},
                "up": "'unknown'"
            }
        }]),
    );
    session.start(&add).await.unwrap();

    assert!(engine.view().tables["foo"].column("name").is_some());
    assert!(engine.committed().tables["foo"].column("name").is_none());

    session.complete().await.unwrap();

    assert!(engine.committed().tables["foo"].column("name").is_some());
}

#[tokio::test]
async fn drop_column_disappears_from_view_first() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    let create = migration(
        "0001_create_users",
        json!([{
            "create_table": {
                "name": "users",
                "columns": [
                    {"name": "id", "type": "serial", "pk": true},
                    {"name": "legacy", "type": "text"}
                ]
            }
        }]),
    );
    session.start(&create).await.unwrap();
    session.complete().await.unwrap();

    let drop = migration(
        "0002_drop_legacy",
        json!([{"drop_column": {"table": "users", "column": "legacy"}}]),
    );
    session.start(&drop).await.unwrap();

    // Old consumers still see the column; the expand view hides it.
    assert!(engine.committed().tables["users"].column("legacy").is_some());
    assert!(engine.view().tables["users"].column("legacy").is_none());

    session.complete().await.unwrap();

    assert!(engine.committed().tables["users"].column("legacy").is_none());
}

#[tokio::test]
async fn structural_failure_releases_the_slot() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    session.start(&create_foo()).await.unwrap();
    session.complete().await.unwrap();

    // Second migration recreates an existing table: the engine rejects it
    // and the in-progress slot is released again.
    let clash = migration(
        "0002_create_foo_again",
        json!([{
            "create_table": {
                "name": "foo",
                "columns": [{"name": "id", "type": "serial", "pk": true}]
            }
        }]),
    );
    let err = session.start(&clash).await.unwrap_err();

    assert!(matches!(err, ShiftError::Any(_)));
    assert!(session.status().await.unwrap().active.is_none());

    let next = migration(
        "0003_create_bar",
        json!([{
            "create_table": {
                "name": "bar",
                "columns": [{"name": "id", "type": "serial", "pk": true}]
            }
        }]),
    );
    session.start(&next).await.unwrap();
    session.complete().await.unwrap();

    assert!(engine.committed().tables.contains_key("bar"));
}

#[tokio::test]
async fn raw_sql_has_no_structural_footprint() {
    let engine = MemoryEngine::new("public");
    let session = Session::new(engine.clone());
    session.init().await.unwrap();

    let raw = migration(
        "0001_seed",
        json!([{
            "raw_sql": {
                "up": "INSERT INTO foo (id) VALUES (1)",
                "down": "DELETE FROM foo WHERE id = 1"
            }
        }]),
    );
    session.start(&raw).await.unwrap();

    assert_eq!(engine.view(), engine.committed());

    session.complete().await.unwrap();
}
