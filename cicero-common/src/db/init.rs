//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the protocol/speech
//! schema. Every statement is `CREATE ... IF NOT EXISTS`, so initialization
//! is safe to run on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite busy timeout applied to every connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets extraction workers read while one of them writes
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool is pinned to a single connection that never expires, because
/// every SQLite in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    // Reference data
    create_countries_table(pool).await?;
    create_institutions_table(pool).await?;
    create_parties_table(pool).await?;

    // Documents and the speech graph
    create_protocols_table(pool).await?;
    create_speakers_table(pool).await?;
    create_speech_tables(pool).await?;

    // Relations (read back by indexed lookup)
    create_relation_tables(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    debug!("Database schema ready (version {})", SCHEMA_VERSION);

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_countries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS countries (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_institutions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS institutions (
            id TEXT PRIMARY KEY,
            country_id TEXT REFERENCES countries(id) ON DELETE SET NULL,
            kind TEXT NOT NULL,
            label TEXT NOT NULL,
            UNIQUE (country_id, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_parties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parties (
            id TEXT PRIMARY KEY,
            country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            UNIQUE (country_id, label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_protocols_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS protocols (
            id TEXT PRIMARY KEY,
            institution_id TEXT REFERENCES institutions(id) ON DELETE SET NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            text TEXT NOT NULL,
            label TEXT,
            file_source TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Speakers are unique per (country, normalized name)
///
/// The unique index backs up lookup-before-create when two protocols
/// introduce the same person concurrently.
async fn create_speakers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speakers (
            id TEXT PRIMARY KEY,
            country_id TEXT NOT NULL REFERENCES countries(id),
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            party_id TEXT REFERENCES parties(id) ON DELETE SET NULL,
            role TEXT,
            birth_date TEXT,
            gender TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (country_id, normalized_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Speech / SpeechText / RawText triple
///
/// The forward references (speech → text, text → raw) are deferred so the
/// three rows can be inserted in one transaction in any order; the
/// backward references cascade so deleting a speech removes its texts.
async fn create_speech_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speeches (
            id TEXT PRIMARY KEY,
            protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
            speaker_id TEXT NOT NULL REFERENCES speakers(id),
            speech_text_id TEXT NOT NULL
                REFERENCES speech_texts(id) DEFERRABLE INITIALLY DEFERRED,
            protocol_order INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speech_texts (
            id TEXT PRIMARY KEY,
            speech_id TEXT NOT NULL UNIQUE REFERENCES speeches(id) ON DELETE CASCADE,
            raw_text_id TEXT NOT NULL
                REFERENCES raw_texts(id) DEFERRABLE INITIALLY DEFERRED,
            language TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_texts (
            id TEXT PRIMARY KEY,
            speech_text_id TEXT NOT NULL UNIQUE REFERENCES speech_texts(id) ON DELETE CASCADE,
            text TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One speech per ordinal: of two runs racing on a protocol, the second
    // to commit its first speech hits this index.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_speeches_protocol_order ON speeches(protocol_id, protocol_order)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_speeches_speaker ON speeches(speaker_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_relation_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speaker_speeches (
            speaker_id TEXT NOT NULL REFERENCES speakers(id) ON DELETE CASCADE,
            speech_id TEXT NOT NULL REFERENCES speeches(id) ON DELETE CASCADE,
            PRIMARY KEY (speaker_id, speech_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS protocol_speeches (
            protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
            speech_id TEXT NOT NULL REFERENCES speeches(id) ON DELETE CASCADE,
            protocol_order INTEGER NOT NULL,
            PRIMARY KEY (protocol_id, speech_id),
            UNIQUE (protocol_id, protocol_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_speaker_speeches_speech ON speaker_speeches(speech_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
