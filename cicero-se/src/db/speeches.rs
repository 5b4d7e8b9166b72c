//! Speech database operations
//!
//! A speech is stored as three linked rows (speech, speech text, raw text)
//! written in one transaction. Protocol membership is recorded twice: by
//! `speeches.protocol_id`, which the re-extraction guard reads, and by the
//! ordered `protocol_speeches` relation.

use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use cicero_common::db::{RawText, Speech, SpeechText};
use cicero_common::uuid_utils::parse_column;
use cicero_common::{Error, Result};

use crate::types::SpeechTriple;

/// Insert speech, speech text and raw text atomically
pub async fn save_speech_triple(pool: &SqlitePool, triple: &SpeechTriple) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO speeches (id, protocol_id, speaker_id, speech_text_id, protocol_order)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(triple.speech.id.to_string())
    .bind(triple.speech.protocol_id.to_string())
    .bind(triple.speech.speaker_id.to_string())
    .bind(triple.speech.speech_text_id.to_string())
    .bind(triple.speech.protocol_order as i64)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO speech_texts (id, speech_id, raw_text_id, language) VALUES (?, ?, ?, ?)")
        .bind(triple.speech_text.id.to_string())
        .bind(triple.speech_text.speech_id.to_string())
        .bind(triple.speech_text.raw_text_id.to_string())
        .bind(triple.speech_text.language.as_str())
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO raw_texts (id, speech_text_id, text) VALUES (?, ?, ?)")
        .bind(triple.raw_text.id.to_string())
        .bind(triple.raw_text.speech_text_id.to_string())
        .bind(&triple.raw_text.text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    debug!(
        speech_id = %triple.speech.id,
        order = triple.speech.protocol_order,
        chars = triple.raw_text.num_characters(),
        "Speech committed"
    );

    Ok(())
}

/// Record a speech at `protocol_order` within its protocol
///
/// Repeating an identical link is a no-op. A link that collides with a
/// different speech at the same ordinal, or with the same speech at another
/// ordinal, fails with [`Error::Conflict`].
pub async fn save_protocol_speech(
    pool: &SqlitePool,
    protocol_id: Uuid,
    speech_id: Uuid,
    protocol_order: u32,
) -> Result<()> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO protocol_speeches (protocol_id, speech_id, protocol_order) VALUES (?, ?, ?)",
    )
    .bind(protocol_id.to_string())
    .bind(speech_id.to_string())
    .bind(protocol_order as i64)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        return Ok(());
    }

    let same: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM protocol_speeches WHERE protocol_id = ? AND speech_id = ? AND protocol_order = ?",
    )
    .bind(protocol_id.to_string())
    .bind(speech_id.to_string())
    .bind(protocol_order as i64)
    .fetch_one(pool)
    .await?;

    if same == 1 {
        return Ok(());
    }

    Err(Error::Conflict(format!(
        "protocol {} cannot link speech {} at ordinal {}: slot or speech already linked",
        protocol_id, speech_id, protocol_order
    )))
}

/// Ids of every speech owned by a protocol, in protocol order
pub async fn list_protocol_speech_ids(pool: &SqlitePool, protocol_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM speeches WHERE protocol_id = ? ORDER BY protocol_order",
    )
    .bind(protocol_id.to_string())
    .fetch_all(pool)
    .await?;

    ids.iter().map(|id| parse_column("speeches.id", id)).collect()
}

/// Full speech triples of a protocol, in protocol order
pub async fn load_protocol_speeches(pool: &SqlitePool, protocol_id: Uuid) -> Result<Vec<SpeechTriple>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.speaker_id, s.speech_text_id, s.protocol_order,
               st.raw_text_id, st.language, rt.text
        FROM speeches s
        JOIN speech_texts st ON st.id = s.speech_text_id
        JOIN raw_texts rt ON rt.id = st.raw_text_id
        WHERE s.protocol_id = ?
        ORDER BY s.protocol_order
        "#,
    )
    .bind(protocol_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut triples = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let speaker_str: String = row.get("speaker_id");
        let speech_text_str: String = row.get("speech_text_id");
        let raw_text_str: String = row.get("raw_text_id");
        let language_str: String = row.get("language");
        let order: i64 = row.get("protocol_order");

        let speech_id = parse_column("speeches.id", &id_str)?;
        let speech_text_id = parse_column("speeches.speech_text_id", &speech_text_str)?;
        let raw_text_id = parse_column("speech_texts.raw_text_id", &raw_text_str)?;

        triples.push(SpeechTriple {
            speech: Speech {
                id: speech_id,
                protocol_id,
                speaker_id: parse_column("speeches.speaker_id", &speaker_str)?,
                speech_text_id,
                protocol_order: order as u32,
            },
            speech_text: SpeechText {
                id: speech_text_id,
                speech_id,
                raw_text_id,
                language: language_str.parse()?,
            },
            raw_text: RawText {
                id: raw_text_id,
                speech_text_id,
                text: row.get("text"),
            },
        });
    }

    Ok(triples)
}

/// Speech ids from the ordered protocol relation
pub async fn list_protocol_relation(pool: &SqlitePool, protocol_id: Uuid) -> Result<Vec<(u32, Uuid)>> {
    let rows = sqlx::query(
        "SELECT protocol_order, speech_id FROM protocol_speeches WHERE protocol_id = ? ORDER BY protocol_order",
    )
    .bind(protocol_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let order: i64 = row.get("protocol_order");
            let speech_str: String = row.get("speech_id");
            Ok((order as u32, parse_column("protocol_speeches.speech_id", &speech_str)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{protocols, speakers};
    use chrono::NaiveDate;
    use cicero_common::db::{init_memory_database, load_country_by_code, seed_defaults, Protocol, Speaker};
    use cicero_common::types::{CountryCode, Language, ProtocolKind};

    async fn fixture(pool: &SqlitePool) -> (Uuid, Uuid) {
        seed_defaults(pool).await.unwrap();
        let country = load_country_by_code(pool, CountryCode::Germany).await.unwrap().unwrap();
        let speaker = speakers::save_speaker(pool, &Speaker::new(country.id, "Anna Schmidt"))
            .await
            .unwrap();
        let protocol = Protocol::new(
            None,
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            ProtocolKind::Plenary,
            "x".to_string(),
        );
        protocols::save_protocol(pool, &protocol).await.unwrap();
        (protocol.id, speaker.id)
    }

    #[tokio::test]
    async fn test_triple_round_trip_in_order() {
        let pool = init_memory_database().await.unwrap();
        let (protocol_id, speaker_id) = fixture(&pool).await;

        let second = SpeechTriple::new(protocol_id, speaker_id, 2, Language::German, "Zwei".into());
        let first = SpeechTriple::new(protocol_id, speaker_id, 1, Language::German, "Eins".into());
        save_speech_triple(&pool, &second).await.unwrap();
        save_speech_triple(&pool, &first).await.unwrap();

        let loaded = load_protocol_speeches(&pool, protocol_id).await.unwrap();
        assert_eq!(loaded, vec![first.clone(), second.clone()]);
        assert_eq!(
            list_protocol_speech_ids(&pool, protocol_id).await.unwrap(),
            vec![first.speech.id, second.speech.id]
        );
    }

    #[tokio::test]
    async fn test_failed_triple_leaves_nothing() {
        let pool = init_memory_database().await.unwrap();
        let (protocol_id, _) = fixture(&pool).await;

        // Unknown speaker violates the speaker foreign key
        let triple = SpeechTriple::new(protocol_id, Uuid::new_v4(), 1, Language::German, "x".into());
        assert!(save_speech_triple(&pool, &triple).await.is_err());

        assert!(list_protocol_speech_ids(&pool, protocol_id).await.unwrap().is_empty());
        let raw: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_texts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(raw, 0);
    }

    #[tokio::test]
    async fn test_protocol_relation() {
        let pool = init_memory_database().await.unwrap();
        let (protocol_id, speaker_id) = fixture(&pool).await;
        let triple = SpeechTriple::new(protocol_id, speaker_id, 1, Language::German, "x".into());
        save_speech_triple(&pool, &triple).await.unwrap();

        save_protocol_speech(&pool, protocol_id, triple.speech.id, 1).await.unwrap();
        save_protocol_speech(&pool, protocol_id, triple.speech.id, 1).await.unwrap();

        assert_eq!(
            list_protocol_relation(&pool, protocol_id).await.unwrap(),
            vec![(1, triple.speech.id)]
        );
    }

    #[tokio::test]
    async fn test_taken_ordinal_is_a_conflict() {
        let pool = init_memory_database().await.unwrap();
        let (protocol_id, speaker_id) = fixture(&pool).await;
        let first = SpeechTriple::new(protocol_id, speaker_id, 1, Language::German, "a".into());
        let second = SpeechTriple::new(protocol_id, speaker_id, 2, Language::German, "b".into());
        save_speech_triple(&pool, &first).await.unwrap();
        save_speech_triple(&pool, &second).await.unwrap();
        save_protocol_speech(&pool, protocol_id, first.speech.id, 1).await.unwrap();

        // Another speech at ordinal 1
        let err = save_protocol_speech(&pool, protocol_id, second.speech.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Same speech at a second ordinal
        let err = save_protocol_speech(&pool, protocol_id, first.speech.id, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        assert_eq!(
            list_protocol_relation(&pool, protocol_id).await.unwrap(),
            vec![(1, first.speech.id)]
        );
    }

    #[tokio::test]
    async fn test_second_speech_at_same_ordinal_rejected() {
        let pool = init_memory_database().await.unwrap();
        let (protocol_id, speaker_id) = fixture(&pool).await;
        let first = SpeechTriple::new(protocol_id, speaker_id, 1, Language::German, "a".into());
        let rival = SpeechTriple::new(protocol_id, speaker_id, 1, Language::German, "b".into());
        save_speech_triple(&pool, &first).await.unwrap();

        let err = save_speech_triple(&pool, &rival).await.unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(
            list_protocol_speech_ids(&pool, protocol_id).await.unwrap(),
            vec![first.speech.id]
        );
        let texts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM speech_texts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(texts, 1);
    }
}
