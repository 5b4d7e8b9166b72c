//! Database Test Utilities
//!
//! Seeded databases, protocols and extraction specs for integration tests

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use cicero_common::db::{
    init_database, init_memory_database, load_institution, seed_defaults, Institution, Protocol,
};
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};
use cicero_se::{ExtractionSpec, SqliteStore};

/// Seeded database with the German parliament looked up
pub struct TestDb {
    /// Keeps a file database alive; None for in-memory databases
    pub temp_dir: Option<TempDir>,
    pub store: Arc<SqliteStore>,
    pub parliament: Institution,
}

impl TestDb {
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }
}

/// Seeded in-memory database
pub async fn create_memory_db() -> TestDb {
    let pool = init_memory_database().await.unwrap();
    finish(pool, None).await
}

/// Seeded file database in a temporary directory (real connection pool)
pub async fn create_file_db() -> TestDb {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("cicero.db")).await.unwrap();
    finish(pool, Some(temp_dir)).await
}

async fn finish(pool: SqlitePool, temp_dir: Option<TempDir>) -> TestDb {
    seed_defaults(&pool).await.unwrap();
    let parliament = load_institution(&pool, CountryCode::Germany, InstitutionKind::Parliament)
        .await
        .unwrap()
        .unwrap();

    TestDb {
        temp_dir,
        store: Arc::new(SqliteStore::new(pool)),
        parliament,
    }
}

/// Store a protocol of `kind` with `text`
pub async fn save_protocol(
    db: &TestDb,
    institution_id: Option<Uuid>,
    kind: ProtocolKind,
    text: &str,
) -> Protocol {
    let protocol = Protocol::new(
        institution_id,
        NaiveDate::from_ymd_opt(2021, 6, 24).unwrap(),
        kind,
        text.to_string(),
    );
    db.store.save_protocol(&protocol).await.unwrap();
    protocol
}

pub fn hearing_spec(protocol_id: Uuid) -> ExtractionSpec {
    ExtractionSpec::new(
        protocol_id,
        CountryCode::Germany,
        InstitutionKind::Parliament,
        Language::German,
        ProtocolKind::Hearing,
    )
}

pub fn plenary_spec(protocol_id: Uuid) -> ExtractionSpec {
    ExtractionSpec::new(
        protocol_id,
        CountryCode::Germany,
        InstitutionKind::Parliament,
        Language::German,
        ProtocolKind::Plenary,
    )
}

/// Number of rows in `table`
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
