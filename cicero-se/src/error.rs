//! Error types for cicero-se
//!
//! `ExtractionError` separates outcomes the caller can act on (nothing to
//! do, wrong configuration) from data faults and storage failures.

use thiserror::Error;
use uuid::Uuid;

use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};

/// Result type for extraction operations
pub type ExtractionResult<T> = std::result::Result<T, ExtractionError>;

/// Failure of one extraction run
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No pattern variant for the requested context; nothing was written
    #[error(
        "No extraction pattern for {country}/{institution}/{language}/{protocol_kind}{}",
        override_suffix(.pattern_override)
    )]
    PatternNotFound {
        country: CountryCode,
        institution: InstitutionKind,
        language: Language,
        protocol_kind: ProtocolKind,
        pattern_override: Option<String>,
    },

    /// Protocol already owns speeches; nothing was written
    #[error("Protocol {protocol_id} already has {existing} speeches")]
    AlreadyExtracted { protocol_id: Uuid, existing: usize },

    #[error("Protocol {0} not found")]
    ProtocolNotFound(Uuid),

    /// Protocol has no institution, or its institution record is missing
    #[error("Protocol {protocol_id} has no institution context")]
    MissingInstitutionContext { protocol_id: Uuid },

    /// Institution exists but is not linked to a country
    #[error("Institution {institution_id} of protocol {protocol_id} has no country")]
    MissingCountryContext { protocol_id: Uuid, institution_id: Uuid },

    /// No speaker marker found and the caller does not accept empty results
    #[error("No speeches found in protocol {protocol_id}")]
    EmptyExtraction { protocol_id: Uuid },

    /// Segment `ordinal` failed; the first `committed` speeches stay stored
    #[error("Extraction of protocol {protocol_id} failed at segment {ordinal} after {committed} committed speeches: {source}")]
    PartialFailure {
        protocol_id: Uuid,
        committed: usize,
        ordinal: u32,
        #[source]
        source: Box<ExtractionError>,
    },

    #[error(transparent)]
    Store(#[from] cicero_common::Error),
}

fn override_suffix(pattern_override: &Option<String>) -> String {
    match pattern_override {
        Some(id) => format!(" (override '{}')", id),
        None => String::new(),
    }
}

impl ExtractionError {
    /// True for outcomes that wrote nothing and need no operator action
    pub fn is_benign(&self) -> bool {
        matches!(self, ExtractionError::AlreadyExtracted { .. })
    }

    /// Speeches that remain committed after this error
    pub fn committed(&self) -> usize {
        match self {
            ExtractionError::PartialFailure { committed, .. } => *committed,
            _ => 0,
        }
    }
}

/// Pattern registration fault; raised at startup
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A variant with the same id or the same context tuple already exists
    #[error("Duplicate pattern registration '{pattern_id}': {reason}")]
    DuplicateRegistration { pattern_id: String, reason: String },

    #[error("Pattern '{pattern_id}' rule '{rule_id}' does not compile: {source}")]
    InvalidPattern {
        pattern_id: String,
        rule_id: String,
        #[source]
        source: regex::Error,
    },

    /// Compiled rule lacks the mandatory `name` capture group
    #[error("Pattern '{pattern_id}' rule '{rule_id}' has no 'name' group")]
    MissingNameGroup { pattern_id: String, rule_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_not_found_message_names_context() {
        let err = ExtractionError::PatternNotFound {
            country: CountryCode::France,
            institution: InstitutionKind::Parliament,
            language: Language::French,
            protocol_kind: ProtocolKind::Plenary,
            pattern_override: None,
        };
        assert_eq!(err.to_string(), "No extraction pattern for France/Parliament/fr/Plenary");

        let err = ExtractionError::PatternNotFound {
            country: CountryCode::Germany,
            institution: InstitutionKind::Parliament,
            language: Language::German,
            protocol_kind: ProtocolKind::Plenary,
            pattern_override: Some("nope".to_string()),
        };
        assert!(err.to_string().ends_with("(override 'nope')"));
    }

    #[test]
    fn test_partial_failure_reports_committed() {
        let err = ExtractionError::PartialFailure {
            protocol_id: Uuid::nil(),
            committed: 2,
            ordinal: 3,
            source: Box::new(ExtractionError::Store(cicero_common::Error::Internal(
                "disk full".to_string(),
            ))),
        };
        assert_eq!(err.committed(), 2);
        assert!(!err.is_benign());
        assert!(err.to_string().contains("segment 3"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_already_extracted_is_benign() {
        let err = ExtractionError::AlreadyExtracted {
            protocol_id: Uuid::nil(),
            existing: 3,
        };
        assert!(err.is_benign());
        assert_eq!(err.committed(), 0);
    }
}
