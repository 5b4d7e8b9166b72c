//! Speech extraction service
//!
//! Runs the pipeline for one protocol:
//! registry → extractor → resolver → segmenter → assembler.
//!
//! Runs for different protocols may proceed in parallel. Within one service,
//! runs for the same protocol are serialised by a per-protocol lock held from
//! the guard check to the last write. Runs in other services or processes are
//! stopped by the store's unique (protocol, ordinal) index at their first
//! commit; see [`crate::assembler`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cicero_common::config::ExtractionDefaults;
use cicero_common::db::Protocol;
use cicero_common::events::{EventBus, ExtractionEvent};
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};

use crate::assembler::EntityGraphAssembler;
use crate::error::{ExtractionError, ExtractionResult};
use crate::extractor;
use crate::patterns::{PatternRegistry, RegisteredPattern};
use crate::resolver::ConflictResolver;
use crate::segmenter;
use crate::store::ExtractionStore;
use crate::types::ExtractionSpec;

/// Per-spec overrides on top of [`ExtractionDefaults`]
#[derive(Debug, Clone, Default)]
pub struct SpecOverrides {
    pub country: Option<CountryCode>,
    pub institution: Option<InstitutionKind>,
    pub language: Option<Language>,
    pub protocol_kind: Option<ProtocolKind>,
    pub pattern: Option<String>,
}

pub struct ExtractorService<S: ExtractionStore + ?Sized> {
    store: Arc<S>,
    events: EventBus,
    registry: &'static PatternRegistry,
    resolver: ConflictResolver,
    assembler: EntityGraphAssembler<S>,
    protocol_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    allow_empty: bool,
}

impl<S: ExtractionStore + ?Sized> ExtractorService<S> {
    pub fn new(store: Arc<S>, events: EventBus, registry: &'static PatternRegistry) -> Self {
        Self {
            assembler: EntityGraphAssembler::new(Arc::clone(&store), events.clone()),
            store,
            events,
            registry,
            resolver: ConflictResolver::new(),
            protocol_locks: Mutex::new(HashMap::new()),
            allow_empty: true,
        }
    }

    /// Whether a protocol without speaker markers is a success (default) or
    /// an `EmptyExtraction` error
    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Extract and store the speeches of `spec.protocol_id`
    ///
    /// Returns the new speech ids in protocol order.
    pub async fn extract_speeches(&self, spec: &ExtractionSpec) -> ExtractionResult<Vec<Uuid>> {
        let guard = self.protocol_lock(spec.protocol_id).await.lock_owned().await;

        let result = self.run(spec).await;

        drop(guard);
        self.release_protocol_lock(spec.protocol_id).await;

        result
    }

    /// Run several extractions with at most `concurrency` in flight
    ///
    /// Results come back in completion order, each tagged with its protocol.
    pub async fn extract_batch(
        &self,
        specs: Vec<ExtractionSpec>,
        concurrency: usize,
    ) -> Vec<(Uuid, ExtractionResult<Vec<Uuid>>)> {
        let total = specs.len();
        info!(protocols = total, concurrency, "Starting batch extraction");

        let results: Vec<_> = stream::iter(specs)
            .map(|spec| async move {
                let result = self.extract_speeches(&spec).await;
                (spec.protocol_id, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!(
            protocols = total,
            succeeded,
            failed = total - succeeded,
            "Batch extraction finished"
        );

        results
    }

    /// Build the request for a protocol
    ///
    /// Priority per field: `overrides`, then `defaults`, then the protocol's
    /// own institution, country and kind.
    pub async fn spec_for(
        &self,
        protocol_id: Uuid,
        defaults: &ExtractionDefaults,
        overrides: &SpecOverrides,
    ) -> ExtractionResult<ExtractionSpec> {
        let protocol = self.load_protocol(protocol_id).await?;

        let mut country = overrides.country.or(defaults.country);
        let mut institution = overrides.institution.or(defaults.institution);

        if country.is_none() || institution.is_none() {
            let missing_institution = || ExtractionError::MissingInstitutionContext { protocol_id };
            let institution_id = protocol.institution_id.ok_or_else(missing_institution)?;
            let record = self
                .store
                .institution(institution_id)
                .await?
                .ok_or_else(missing_institution)?;
            institution = institution.or(Some(record.kind));

            if country.is_none() {
                let missing_country = || ExtractionError::MissingCountryContext {
                    protocol_id,
                    institution_id,
                };
                let country_id = record.country_id.ok_or_else(missing_country)?;
                let found = self.store.country(country_id).await?.ok_or_else(missing_country)?;
                country = Some(found.code);
            }
        }

        let (Some(country), Some(institution)) = (country, institution) else {
            return Err(ExtractionError::MissingInstitutionContext { protocol_id });
        };

        let mut spec = ExtractionSpec::new(
            protocol_id,
            country,
            institution,
            overrides.language.unwrap_or(defaults.language),
            overrides
                .protocol_kind
                .or(defaults.protocol_kind)
                .unwrap_or(protocol.kind),
        );
        spec.pattern_override = overrides.pattern.clone();

        Ok(spec)
    }

    async fn run(&self, spec: &ExtractionSpec) -> ExtractionResult<Vec<Uuid>> {
        let protocol = self.load_protocol(spec.protocol_id).await?;
        self.assembler.check_guard(protocol.id).await?;

        let pattern = self.registry.resolve(spec)?;

        info!(
            protocol_id = %protocol.id,
            pattern_id = pattern.metadata.id,
            "Extracting speeches"
        );
        self.events.emit_lossy(ExtractionEvent::ExtractionStarted {
            protocol_id: protocol.id,
            pattern_id: pattern.metadata.id.to_string(),
            timestamp: Utc::now(),
        });

        match self.extract_and_assemble(&protocol, spec, pattern).await {
            Ok(speech_ids) => {
                info!(
                    protocol_id = %protocol.id,
                    speeches = speech_ids.len(),
                    "Extraction complete"
                );
                self.events.emit_lossy(ExtractionEvent::ExtractionCompleted {
                    protocol_id: protocol.id,
                    speech_count: speech_ids.len(),
                    timestamp: Utc::now(),
                });
                Ok(speech_ids)
            }
            Err(e) => {
                warn!(
                    protocol_id = %protocol.id,
                    committed = e.committed(),
                    "Extraction failed: {}",
                    e
                );
                self.events.emit_lossy(ExtractionEvent::ExtractionFailed {
                    protocol_id: protocol.id,
                    committed: e.committed(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn extract_and_assemble(
        &self,
        protocol: &Protocol,
        spec: &ExtractionSpec,
        pattern: &RegisteredPattern,
    ) -> ExtractionResult<Vec<Uuid>> {
        let compiled = &pattern.compiled;

        let candidates = extractor::extract(&protocol.text, compiled);
        let candidate_count = candidates.len();
        let resolved = self.resolver.resolve(candidates);
        let session = compiled.session_range(&protocol.text);
        let segments = segmenter::segment_until(&resolved, &protocol.text, session.end);

        debug!(
            protocol_id = %protocol.id,
            candidates = candidate_count,
            resolved = resolved.len(),
            segments = segments.len(),
            "Speaker markers processed"
        );

        if segments.is_empty() {
            if self.allow_empty {
                info!(protocol_id = %protocol.id, "No speaker markers found");
                return Ok(Vec::new());
            }
            return Err(ExtractionError::EmptyExtraction {
                protocol_id: protocol.id,
            });
        }

        self.assembler.assemble(protocol, spec, &segments).await
    }

    async fn load_protocol(&self, protocol_id: Uuid) -> ExtractionResult<Protocol> {
        self.store
            .protocol(protocol_id)
            .await?
            .ok_or(ExtractionError::ProtocolNotFound(protocol_id))
    }

    async fn protocol_lock(&self, protocol_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.protocol_locks.lock().await;
        Arc::clone(locks.entry(protocol_id).or_default())
    }

    /// Forget the lock once no run holds or waits for it
    async fn release_protocol_lock(&self, protocol_id: Uuid) {
        let mut locks = self.protocol_locks.lock().await;
        if locks
            .get(&protocol_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&protocol_id);
        }
    }
}
