//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sessionstore_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("session"), "missing session table");
    assert!(info_str.contains("last_enter"), "missing last_enter table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn session_indexes_are_defined() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sessionstore_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR TABLE session").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR TABLE should return a value"));

    assert!(info_str.contains("idx_session_secret"), "missing secret index");
    assert!(info_str.contains("idx_session_user"), "missing user_id index");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Run twice — should not fail.
    sessionstore_db::run_migrations(&db).await.unwrap();
    sessionstore_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_secrets() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sessionstore_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE session:a SET \
         secret = 'same', user_id = 'u1', last_usage = time::now(), \
         user_agent = 'ua', auth_method = 'password'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query(
            "CREATE session:b SET \
             secret = 'same', user_id = 'u2', last_usage = time::now(), \
             user_agent = 'ua', auth_method = 'password'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate secret should be rejected");
}
