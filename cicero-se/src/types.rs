//! Extraction request and in-flight value types
//!
//! `SpeakerMatch` and `SpeechSegment` live only for the duration of one
//! run; `SpeechTriple` is the unit the assembler commits.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cicero_common::db::{RawText, Speech, SpeechText};
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};
use cicero_common::uuid_utils::generate;

/// Lookup key of the pattern registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub country: CountryCode,
    pub institution: InstitutionKind,
    pub language: Language,
    pub protocol_kind: ProtocolKind,
}

/// One extraction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSpec {
    pub protocol_id: Uuid,
    pub country: CountryCode,
    pub institution: InstitutionKind,
    pub language: Language,
    pub protocol_kind: ProtocolKind,
    /// Registered pattern id; bypasses the context lookup
    pub pattern_override: Option<String>,
}

impl ExtractionSpec {
    pub fn new(
        protocol_id: Uuid,
        country: CountryCode,
        institution: InstitutionKind,
        language: Language,
        protocol_kind: ProtocolKind,
    ) -> Self {
        Self {
            protocol_id,
            country,
            institution,
            language,
            protocol_kind,
            pattern_override: None,
        }
    }

    pub fn with_pattern_override(mut self, pattern_id: impl Into<String>) -> Self {
        self.pattern_override = Some(pattern_id.into());
        self
    }

    pub fn key(&self) -> PatternKey {
        PatternKey {
            country: self.country,
            institution: self.institution,
            language: self.language,
            protocol_kind: self.protocol_kind,
        }
    }
}

/// A speaker marker found in the document
///
/// Offsets are byte offsets into the full protocol text. `end` is where the
/// speech body begins, which may be before the end of the regex match.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerMatch {
    pub speaker_name: String,
    pub region: Option<String>,
    pub affiliation: Option<String>,
    pub role: Option<String>,
    pub start: usize,
    pub end: usize,
    /// Id of the rule that produced the match
    pub rule_id: &'static str,
    /// In [0, 1]
    pub confidence: f64,
}

impl SpeakerMatch {
    /// True if the half-open spans share at least one byte
    pub fn overlaps(&self, other: &SpeakerMatch) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn name_chars(&self) -> usize {
        self.speaker_name.chars().count()
    }
}

/// Text attributed to one speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub speaker: SpeakerMatch,
    /// Trimmed span content; may be empty
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// 1-based, gapless
    pub ordinal: u32,
}

impl SpeechSegment {
    /// First characters of the text, for log lines
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push('…');
        }
        preview
    }
}

/// Speech, SpeechText and RawText with full cross-references
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechTriple {
    pub speech: Speech,
    pub speech_text: SpeechText,
    pub raw_text: RawText,
}

impl SpeechTriple {
    /// Mint ids and link the three records
    pub fn new(
        protocol_id: Uuid,
        speaker_id: Uuid,
        protocol_order: u32,
        language: Language,
        text: String,
    ) -> Self {
        let speech_id = generate();
        let speech_text_id = generate();
        let raw_text_id = generate();

        Self {
            speech: Speech {
                id: speech_id,
                protocol_id,
                speaker_id,
                speech_text_id,
                protocol_order,
            },
            speech_text: SpeechText {
                id: speech_text_id,
                speech_id,
                raw_text_id,
                language,
            },
            raw_text: RawText {
                id: raw_text_id,
                speech_text_id,
                text,
            },
        }
    }
}
