//! Protocol database operations
//!
//! Protocols enter the store through the import command and are read back
//! by the extraction service. Deleting a protocol cascades to its speeches
//! and their texts.

use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use cicero_common::db::{Country, Institution, Protocol};
use cicero_common::uuid_utils::{parse_column, parse_optional_column};
use cicero_common::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Insert a protocol
pub async fn save_protocol(pool: &SqlitePool, protocol: &Protocol) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO protocols (id, institution_id, date, kind, text, label, file_source, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(protocol.id.to_string())
    .bind(protocol.institution_id.map(|id| id.to_string()))
    .bind(protocol.date.format(DATE_FORMAT).to_string())
    .bind(protocol.kind.as_str())
    .bind(&protocol.text)
    .bind(&protocol.label)
    .bind(&protocol.file_source)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load protocol by id
pub async fn load_protocol(pool: &SqlitePool, id: Uuid) -> Result<Option<Protocol>> {
    let row = sqlx::query(
        r#"
        SELECT id, institution_id, date, kind, text, label, file_source
        FROM protocols
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id_str: String = row.get("id");
            let institution_str: Option<String> = row.get("institution_id");
            let date_str: String = row.get("date");
            let kind_str: String = row.get("kind");

            Ok(Some(Protocol {
                id: parse_column("protocols.id", &id_str)?,
                institution_id: parse_optional_column(
                    "protocols.institution_id",
                    institution_str.as_deref(),
                )?,
                date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    Error::InvalidInput(format!("invalid protocol date '{}': {}", date_str, e))
                })?,
                kind: kind_str.parse()?,
                text: row.get("text"),
                label: row.get("label"),
                file_source: row.get("file_source"),
            }))
        }
        None => Ok(None),
    }
}

/// Delete a protocol with its speeches; false if it did not exist
pub async fn delete_protocol(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM protocols WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Ids of protocols that own no speech yet, oldest session first
pub async fn list_unextracted_protocol_ids(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT p.id
        FROM protocols p
        WHERE NOT EXISTS (SELECT 1 FROM speeches s WHERE s.protocol_id = p.id)
        ORDER BY p.date, p.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    ids.iter().map(|id| parse_column("protocols.id", id)).collect()
}

/// Load institution by id
pub async fn load_institution(pool: &SqlitePool, id: Uuid) -> Result<Option<Institution>> {
    let row = sqlx::query("SELECT id, country_id, kind, label FROM institutions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let id_str: String = row.get("id");
            let country_str: Option<String> = row.get("country_id");
            let kind_str: String = row.get("kind");

            Ok(Some(Institution {
                id: parse_column("institutions.id", &id_str)?,
                country_id: parse_optional_column("institutions.country_id", country_str.as_deref())?,
                kind: kind_str.parse()?,
                label: row.get("label"),
            }))
        }
        None => Ok(None),
    }
}

/// Load country by id
pub async fn load_country(pool: &SqlitePool, id: Uuid) -> Result<Option<Country>> {
    let code: Option<String> = sqlx::query_scalar("SELECT code FROM countries WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match code {
        Some(code) => Ok(Some(Country {
            id,
            code: code.parse()?,
        })),
        None => Ok(None),
    }
}
