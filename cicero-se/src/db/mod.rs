//! Database access for cicero-se
//!
//! Free async query functions over the shared SQLite pool. Schema creation
//! and reference data live in `cicero_common::db`.

pub mod protocols;
pub mod speakers;
pub mod speeches;

use cicero_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;

/// Open the database in `db_path`, creating the schema if needed
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    debug!("Connecting to database: {}", db_path.display());
    cicero_common::db::init_database(db_path).await
}
