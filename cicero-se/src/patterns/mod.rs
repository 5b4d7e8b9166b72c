//! Structural speaker patterns
//!
//! A pattern variant recognises the speaker markers of one legislative
//! context (country, institution, language, protocol kind). Compiling a
//! variant yields a [`CompiledPattern`]: one or more versioned rules plus
//! optional session-bounds markers.
//!
//! Every rule regex exposes a mandatory `name` group and may expose
//! `region`, `affiliation`, `role` and `lead`. When `lead` is present the
//! speech body starts at `lead`, not at the end of the match.

pub mod bundestag;
pub mod hearing;
pub mod registry;

pub use registry::{PatternRegistry, RegisteredPattern};

use regex::Regex;
use std::ops::Range;

use crate::error::RegistryError;
use crate::types::PatternKey;

/// Rule versions are scored relative to this ceiling
pub const MAX_PATTERN_VERSION: u32 = 5;

/// Uncompiled rule definition
#[derive(Debug, Clone, Copy)]
pub struct RuleSource {
    pub id: &'static str,
    pub version: u32,
    pub regex: &'static str,
    /// Candidates whose name starts with one of these words are discarded
    pub excluded_leading_words: &'static [&'static str],
}

/// Compiled rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: &'static str,
    pub version: u32,
    pub regex: Regex,
    excluded_leading_words: &'static [&'static str],
}

impl CompiledRule {
    /// True if the first word of `name` is an introducing word
    pub fn is_excluded_name(&self, name: &str) -> bool {
        let first = name
            .split(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '-')
            .find(|w| !w.is_empty());

        match first {
            Some(word) => self.excluded_leading_words.contains(&word),
            None => false,
        }
    }
}

/// Markers delimiting the session proper inside a protocol
#[derive(Debug, Clone)]
pub struct SessionBounds {
    pub start: Regex,
    pub end: Regex,
}

/// Ready-to-run rule set of one pattern variant
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub pattern_id: &'static str,
    pub rules: Vec<CompiledRule>,
    pub session: Option<SessionBounds>,
}

impl CompiledPattern {
    /// Byte range of `text` that holds speeches
    ///
    /// Starts after the first session start marker and ends before the
    /// first end marker that follows it. A missing marker falls back to the
    /// document start or end.
    pub fn session_range(&self, text: &str) -> Range<usize> {
        let Some(bounds) = &self.session else {
            return 0..text.len();
        };

        let start = bounds.start.find(text).map(|m| m.end()).unwrap_or(0);
        let end = bounds
            .end
            .find_at(text, start)
            .map(|m| m.start())
            .unwrap_or(text.len());

        start..end
    }
}

/// Descriptive data of a pattern variant
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMetadata {
    pub id: &'static str,
    pub key: PatternKey,
    pub description: &'static str,
    /// (rule id, version) in evaluation order
    pub rules: Vec<(&'static str, u32)>,
    pub has_session_bounds: bool,
}

/// Capability set shared by all pattern variants
pub trait StructuralPattern {
    fn metadata(&self) -> PatternMetadata;

    fn compile(&self) -> Result<CompiledPattern, RegistryError>;
}

/// Closed set of known pattern variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternVariant {
    /// German Bundestag plenary protocols
    BundestagPlenary,
    /// German Bundestag committee hearings
    BundestagHearing,
}

impl PatternVariant {
    pub const ALL: &'static [PatternVariant] =
        &[PatternVariant::BundestagPlenary, PatternVariant::BundestagHearing];

    /// Stable identifier, usable as a pattern override
    pub fn id(self) -> &'static str {
        match self {
            PatternVariant::BundestagPlenary => bundestag::PATTERN_ID,
            PatternVariant::BundestagHearing => hearing::PATTERN_ID,
        }
    }
}

impl StructuralPattern for PatternVariant {
    fn metadata(&self) -> PatternMetadata {
        match self {
            PatternVariant::BundestagPlenary => bundestag::metadata(),
            PatternVariant::BundestagHearing => hearing::metadata(),
        }
    }

    fn compile(&self) -> Result<CompiledPattern, RegistryError> {
        match self {
            PatternVariant::BundestagPlenary => bundestag::compile(),
            PatternVariant::BundestagHearing => hearing::compile(),
        }
    }
}

/// Compile a rule set; every rule must have a `name` group
pub(crate) fn compile_rules(
    pattern_id: &'static str,
    sources: &[RuleSource],
    session: Option<(&'static str, &'static str)>,
) -> Result<CompiledPattern, RegistryError> {
    let mut rules = Vec::with_capacity(sources.len());

    for source in sources {
        let regex = Regex::new(source.regex).map_err(|e| RegistryError::InvalidPattern {
            pattern_id: pattern_id.to_string(),
            rule_id: source.id.to_string(),
            source: e,
        })?;

        if !regex.capture_names().any(|name| name == Some("name")) {
            return Err(RegistryError::MissingNameGroup {
                pattern_id: pattern_id.to_string(),
                rule_id: source.id.to_string(),
            });
        }

        rules.push(CompiledRule {
            id: source.id,
            version: source.version,
            regex,
            excluded_leading_words: source.excluded_leading_words,
        });
    }

    let session = match session {
        Some((start, end)) => {
            let compile = |rule_id: &str, source: &str| {
                Regex::new(source).map_err(|e| RegistryError::InvalidPattern {
                    pattern_id: pattern_id.to_string(),
                    rule_id: rule_id.to_string(),
                    source: e,
                })
            };
            Some(SessionBounds {
                start: compile("session-start", start)?,
                end: compile("session-end", end)?,
            })
        }
        None => None,
    };

    Ok(CompiledPattern {
        pattern_id,
        rules,
        session,
    })
}

pub(crate) fn rule_versions(sources: &[RuleSource]) -> Vec<(&'static str, u32)> {
    sources.iter().map(|r| (r.id, r.version)).collect()
}
