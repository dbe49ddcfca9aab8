//! Integration tests for pool setup and schema migration.

use taskhub_core::config::DatabaseConfig;
use taskhub_database::DatabasePool;
use taskhub_database::migration::run_migrations;

use crate::helpers::TestDb;

#[tokio::test]
async fn test_connect_with_auto_migrate_passes_health_check() {
    let Some(_db) = TestDb::connect().await else {
        return;
    };
    let config = DatabaseConfig {
        url: std::env::var("TASKHUB_TEST_DATABASE_URL").unwrap(),
        auto_migrate: true,
        ..DatabaseConfig::default()
    };

    let pool = DatabasePool::connect(&config).await.unwrap();
    assert!(pool.health_check().await.unwrap());
    pool.close().await;
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    let first = run_migrations(&db.pool).await.unwrap();
    let second = run_migrations(&db.pool).await.unwrap();
    assert_eq!(first, second);
    assert!(first >= 1);
}
