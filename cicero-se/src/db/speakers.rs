//! Speaker and party database operations
//!
//! A speaker is identified by (country, normalized name). Inserts use
//! `INSERT OR IGNORE` and read the row back, so two runs introducing the
//! same person at once end up sharing one record.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use cicero_common::db::{Party, Speaker};
use cicero_common::uuid_utils::{generate, parse_column, parse_optional_column};
use cicero_common::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SPEAKER_COLUMNS: &str =
    "id, country_id, name, normalized_name, party_id, role, birth_date, gender";

/// Find a speaker by country and normalized name
///
/// The returned speaker's `speeches` is empty; see [`load_speaker_with_speeches`].
pub async fn find_speaker(
    pool: &SqlitePool,
    country_id: Uuid,
    normalized_name: &str,
) -> Result<Option<Speaker>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM speakers WHERE country_id = ? AND normalized_name = ?",
        SPEAKER_COLUMNS
    ))
    .bind(country_id.to_string())
    .bind(normalized_name)
    .fetch_optional(pool)
    .await?;

    row.map(|row| speaker_from_row(&row)).transpose()
}

/// Insert a speaker unless its (country, normalized name) exists
///
/// Returns the stored record, which is the pre-existing one when the insert
/// was ignored.
pub async fn save_speaker(pool: &SqlitePool, speaker: &Speaker) -> Result<Speaker> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO speakers
            (id, country_id, name, normalized_name, party_id, role, birth_date, gender)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(speaker.id.to_string())
    .bind(speaker.country_id.to_string())
    .bind(&speaker.name)
    .bind(&speaker.normalized_name)
    .bind(speaker.party_id.map(|id| id.to_string()))
    .bind(&speaker.role)
    .bind(speaker.birth_date.map(|d| d.format(DATE_FORMAT).to_string()))
    .bind(speaker.gender.map(|g| g.as_str()))
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        debug!(
            name = %speaker.name,
            "Speaker already stored by a concurrent run, reusing record"
        );
    }

    find_speaker(pool, speaker.country_id, &speaker.normalized_name)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "speaker '{}' missing after insert",
                speaker.normalized_name
            ))
        })
}

/// Load a speaker together with its speech ids, in linking order
pub async fn load_speaker_with_speeches(pool: &SqlitePool, id: Uuid) -> Result<Option<Speaker>> {
    let row = sqlx::query(&format!("SELECT {} FROM speakers WHERE id = ?", SPEAKER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut speaker = speaker_from_row(&row)?;
    speaker.speeches = list_speaker_speech_ids(pool, id).await?;
    Ok(Some(speaker))
}

/// Speech ids linked to a speaker
pub async fn list_speaker_speech_ids(pool: &SqlitePool, speaker_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT speech_id FROM speaker_speeches WHERE speaker_id = ? ORDER BY rowid",
    )
    .bind(speaker_id.to_string())
    .fetch_all(pool)
    .await?;

    ids.iter()
        .map(|id| parse_column("speaker_speeches.speech_id", id))
        .collect()
}

/// Link a speech to its speaker (idempotent)
pub async fn save_speaker_speech(pool: &SqlitePool, speaker_id: Uuid, speech_id: Uuid) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO speaker_speeches (speaker_id, speech_id) VALUES (?, ?)")
        .bind(speaker_id.to_string())
        .bind(speech_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Party with this label in the country, created on first sight
pub async fn find_or_save_party(pool: &SqlitePool, country_id: Uuid, label: &str) -> Result<Party> {
    let label = label.trim();

    sqlx::query("INSERT OR IGNORE INTO parties (id, country_id, label) VALUES (?, ?, ?)")
        .bind(generate().to_string())
        .bind(country_id.to_string())
        .bind(label)
        .execute(pool)
        .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM parties WHERE country_id = ? AND label = ?")
        .bind(country_id.to_string())
        .bind(label)
        .fetch_one(pool)
        .await?;

    Ok(Party {
        id: parse_column("parties.id", &id)?,
        country_id,
        label: label.to_string(),
    })
}

fn speaker_from_row(row: &SqliteRow) -> Result<Speaker> {
    let id_str: String = row.get("id");
    let country_str: String = row.get("country_id");
    let party_str: Option<String> = row.get("party_id");
    let birth_str: Option<String> = row.get("birth_date");
    let gender_str: Option<String> = row.get("gender");

    let birth_date = birth_str
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| Error::InvalidInput(format!("invalid birth date '{}': {}", s, e)))
        })
        .transpose()?;

    Ok(Speaker {
        id: parse_column("speakers.id", &id_str)?,
        country_id: parse_column("speakers.country_id", &country_str)?,
        name: row.get("name"),
        normalized_name: row.get("normalized_name"),
        speeches: Vec::new(),
        party_id: parse_optional_column("speakers.party_id", party_str.as_deref())?,
        role: row.get("role"),
        birth_date,
        gender: gender_str.map(|g| g.parse()).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cicero_common::db::{init_memory_database, load_country_by_code, seed_defaults};
    use cicero_common::types::{CountryCode, Gender};

    async fn germany(pool: &SqlitePool) -> Uuid {
        seed_defaults(pool).await.unwrap();
        load_country_by_code(pool, CountryCode::Germany)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_save_and_find_speaker() {
        let pool = init_memory_database().await.unwrap();
        let country_id = germany(&pool).await;

        let mut speaker = Speaker::new(country_id, "Anna  Schmidt");
        speaker.gender = Some(Gender::Female);
        speaker.birth_date = NaiveDate::from_ymd_opt(1970, 3, 1);
        let stored = save_speaker(&pool, &speaker).await.unwrap();
        assert_eq!(stored, speaker);

        let found = find_speaker(&pool, country_id, "anna schmidt").await.unwrap();
        assert_eq!(found, Some(speaker));
    }

    #[tokio::test]
    async fn test_duplicate_speaker_returns_existing() {
        let pool = init_memory_database().await.unwrap();
        let country_id = germany(&pool).await;

        let first = save_speaker(&pool, &Speaker::new(country_id, "Karl Meier")).await.unwrap();
        let second = save_speaker(&pool, &Speaker::new(country_id, "karl  meier")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Karl Meier");
    }

    #[tokio::test]
    async fn test_party_is_created_once() {
        let pool = init_memory_database().await.unwrap();
        let country_id = germany(&pool).await;

        let first = find_or_save_party(&pool, country_id, "SPD").await.unwrap();
        let second = find_or_save_party(&pool, country_id, " SPD ").await.unwrap();

        assert_eq!(first, second);
    }
}
