//! cicero-se library interface
//!
//! Speech extraction for legislative protocols. The pipeline finds speaker
//! markers with a context-specific pattern, drops overlapping markers,
//! cuts the text between markers into speeches and stores the resulting
//! speaker/speech graph.

pub mod assembler;
pub mod db;
pub mod error;
pub mod extractor;
pub mod patterns;
pub mod resolver;
pub mod segmenter;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::error::{ExtractionError, ExtractionResult, RegistryError};
pub use crate::patterns::{PatternRegistry, PatternVariant};
pub use crate::service::{ExtractorService, SpecOverrides};
pub use crate::store::{ExtractionStore, SqliteStore};
pub use crate::types::{ExtractionSpec, PatternKey, SpeakerMatch, SpeechSegment, SpeechTriple};
