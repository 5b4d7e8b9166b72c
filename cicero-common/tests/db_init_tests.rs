//! Database initialization tests
//!
//! Covers automatic creation on first run, reopening an existing database,
//! and the constraints the extraction service relies on.

use cicero_common::db::{init_database, init_memory_database, seed_defaults, SCHEMA_VERSION};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("cicero.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    let tables = table_names(&pool).await;
    for expected in [
        "countries",
        "institutions",
        "parties",
        "protocols",
        "speakers",
        "speeches",
        "speech_texts",
        "raw_texts",
        "speaker_speeches",
        "protocol_speeches",
        "schema_version",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cicero.db");

    let pool1 = init_database(&db_path).await.unwrap();
    seed_defaults(&pool1).await.unwrap();
    pool1.close().await;

    // Second open keeps the data and does not duplicate the schema version
    let pool2 = init_database(&db_path).await.unwrap();
    let countries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert!(countries > 0);

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&pool2)
        .await
        .unwrap();
    assert_eq!(versions, vec![SCHEMA_VERSION]);
}

#[tokio::test]
async fn test_speaker_unique_per_country_and_normalized_name() {
    let pool = init_memory_database().await.unwrap();
    seed_defaults(&pool).await.unwrap();

    let country_id: String = sqlx::query_scalar("SELECT id FROM countries LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO speakers (id, country_id, name, normalized_name) VALUES (?, ?, ?, ?)";
    sqlx::query(insert)
        .bind(Uuid::new_v4().to_string())
        .bind(&country_id)
        .bind("Anna Schmidt")
        .bind("anna schmidt")
        .execute(&pool)
        .await
        .unwrap();

    let duplicate = sqlx::query(insert)
        .bind(Uuid::new_v4().to_string())
        .bind(&country_id)
        .bind("ANNA SCHMIDT")
        .bind("anna schmidt")
        .execute(&pool)
        .await;

    assert!(duplicate.is_err(), "second speaker with same key must be rejected");
}

#[tokio::test]
async fn test_speech_row_requires_existing_protocol() {
    let pool = init_memory_database().await.unwrap();

    let orphan = sqlx::query(
        "INSERT INTO speeches (id, protocol_id, speaker_id, speech_text_id, protocol_order) VALUES (?, ?, ?, ?, 1)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(Uuid::new_v4().to_string())
    .bind(Uuid::new_v4().to_string())
    .bind(Uuid::new_v4().to_string())
    .execute(&pool)
    .await;

    assert!(orphan.is_err(), "foreign keys must be enforced");
}
