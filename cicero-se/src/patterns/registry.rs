//! Pattern registry
//!
//! Maps an extraction context to a compiled pattern. Variants are compiled
//! once when registered; the process-wide registry is built on first use
//! and never changes afterwards.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

use super::{CompiledPattern, PatternMetadata, PatternVariant, StructuralPattern};
use crate::error::{ExtractionError, RegistryError};
use crate::types::{ExtractionSpec, PatternKey};

static GLOBAL: Lazy<Result<PatternRegistry, RegistryError>> = Lazy::new(PatternRegistry::with_defaults);

/// A variant together with its compiled rule set
#[derive(Debug, Clone)]
pub struct RegisteredPattern {
    pub variant: PatternVariant,
    pub metadata: PatternMetadata,
    pub compiled: Arc<CompiledPattern>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    entries: Vec<RegisteredPattern>,
}

impl PatternRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every known variant
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for variant in PatternVariant::ALL {
            registry.register(*variant)?;
        }
        Ok(registry)
    }

    /// Process-wide registry with every known variant
    pub fn global() -> Result<&'static PatternRegistry, RegistryError> {
        GLOBAL.as_ref().map_err(Clone::clone)
    }

    /// Compile and add a variant
    ///
    /// Rejects a second variant with the same id or the same context tuple.
    pub fn register(&mut self, variant: PatternVariant) -> Result<(), RegistryError> {
        let metadata = variant.metadata();

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.metadata.id == metadata.id || e.metadata.key == metadata.key)
        {
            let reason = if existing.metadata.id == metadata.id {
                "id already registered".to_string()
            } else {
                format!("context already served by '{}'", existing.metadata.id)
            };
            return Err(RegistryError::DuplicateRegistration {
                pattern_id: metadata.id.to_string(),
                reason,
            });
        }

        let compiled = variant.compile()?;
        debug!(
            pattern_id = metadata.id,
            rules = compiled.rules.len(),
            "Registered extraction pattern"
        );

        self.entries.push(RegisteredPattern {
            variant,
            metadata,
            compiled: Arc::new(compiled),
        });

        Ok(())
    }

    /// Exact match on all four context fields
    pub fn find(&self, key: &PatternKey) -> Option<&RegisteredPattern> {
        self.entries.iter().find(|e| e.metadata.key == *key)
    }

    /// Lookup by stable pattern id
    pub fn get(&self, pattern_id: &str) -> Option<&RegisteredPattern> {
        self.entries.iter().find(|e| e.metadata.id == pattern_id)
    }

    /// Pattern for a request: the override if given, else the context lookup
    pub fn resolve(&self, spec: &ExtractionSpec) -> Result<&RegisteredPattern, ExtractionError> {
        let found = match &spec.pattern_override {
            Some(pattern_id) => self.get(pattern_id),
            None => self.find(&spec.key()),
        };

        found.ok_or_else(|| ExtractionError::PatternNotFound {
            country: spec.country,
            institution: spec.institution,
            language: spec.language,
            protocol_kind: spec.protocol_kind,
            pattern_override: spec.pattern_override.clone(),
        })
    }

    pub fn patterns(&self) -> impl Iterator<Item = &RegisteredPattern> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
