//! Database models
//!
//! Durable entities of the protocol/speech graph. Entities reference each
//! other by id only; collections such as "speeches of a speaker" are read
//! back through the relation tables rather than stored on the entity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CountryCode, Gender, InstitutionKind, Language, ProtocolKind};
use crate::uuid_utils;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub code: CountryCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: Uuid,
    /// None only for records imported without reference data
    pub country_id: Option<Uuid>,
    pub kind: InstitutionKind,
    pub label: String,
}

/// Political party, scoped to one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub country_id: Uuid,
    pub label: String,
}

/// A single transcribed legislative session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: Uuid,
    pub institution_id: Option<Uuid>,
    pub date: NaiveDate,
    pub kind: ProtocolKind,
    /// Full undifferentiated transcript text
    pub text: String,
    pub label: Option<String>,
    pub file_source: Option<String>,
}

impl Protocol {
    pub fn new(institution_id: Option<Uuid>, date: NaiveDate, kind: ProtocolKind, text: String) -> Self {
        Self {
            id: uuid_utils::generate(),
            institution_id,
            date,
            kind,
            text,
            label: None,
            file_source: None,
        }
    }
}

/// Person who spoke in at least one protocol
///
/// `speeches` is a read view filled from the `speaker_speeches` relation;
/// writes go through the relation table, never through this field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: Uuid,
    pub country_id: Uuid,
    /// Name as it first appeared in a transcript (whitespace collapsed)
    pub name: String,
    /// Lookup key; see [`normalize_speaker_name`]
    pub normalized_name: String,
    pub speeches: Vec<Uuid>,
    pub party_id: Option<Uuid>,
    pub role: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl Speaker {
    /// New speaker with a fresh id and no speeches
    pub fn new(country_id: Uuid, name: &str) -> Self {
        Self {
            id: uuid_utils::generate(),
            country_id,
            name: collapse_whitespace(name),
            normalized_name: normalize_speaker_name(name),
            speeches: Vec::new(),
            party_id: None,
            role: None,
            birth_date: None,
            gender: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    pub id: Uuid,
    pub protocol_id: Uuid,
    pub speaker_id: Uuid,
    pub speech_text_id: Uuid,
    /// 1-based position within the protocol, in extraction order
    pub protocol_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechText {
    pub id: Uuid,
    pub speech_id: Uuid,
    pub raw_text_id: Uuid,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    pub id: Uuid,
    pub speech_text_id: Uuid,
    pub text: String,
}

impl RawText {
    pub fn num_characters(&self) -> usize {
        self.text.chars().count()
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) into one space
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Speaker lookup key: whitespace collapsed, lower-cased
///
/// "Dr.  Anna\u{a0}Schmidt" and "dr. anna schmidt" share a key.
pub fn normalize_speaker_name(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_speaker_name() {
        assert_eq!(normalize_speaker_name("  Anna \u{a0} Schmidt\n"), "anna schmidt");
        assert_eq!(normalize_speaker_name("Jürgen Özdemir"), "jürgen özdemir");
        assert_eq!(normalize_speaker_name(""), "");
    }

    #[test]
    fn test_speaker_new_keeps_display_name() {
        let country = Uuid::new_v4();
        let speaker = Speaker::new(country, "Anna\u{a0}Schmidt");
        assert_eq!(speaker.name, "Anna Schmidt");
        assert_eq!(speaker.normalized_name, "anna schmidt");
        assert_eq!(speaker.country_id, country);
        assert!(speaker.speeches.is_empty());
    }

    #[test]
    fn test_raw_text_counts_characters_not_bytes() {
        let raw = RawText {
            id: Uuid::new_v4(),
            speech_text_id: Uuid::new_v4(),
            text: "Größe".to_string(),
        };
        assert_eq!(raw.num_characters(), 5);
    }
}
