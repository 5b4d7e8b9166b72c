//! Entity graph assembly
//!
//! Turns speech segments into stored speeches linked to speakers and to
//! their protocol. Each segment runs the same fixed steps:
//!
//! 1. Find or create the speaker (country, normalized name)
//! 2. Build the speech triple with fresh ids
//! 3. Commit the triple in one transaction
//! 4. Link the speech to the speaker
//! 5. Link the speech to the protocol at its ordinal
//!
//! A failure stops the run; segments committed before it stay committed.
//! The guard is read before the first write and enforced by the store's
//! unique (protocol, ordinal) index, so of two runs racing on one protocol
//! only the first to commit a speech proceeds.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cicero_common::db::{normalize_speaker_name, Country, Protocol, Speaker};
use cicero_common::events::{EventBus, ExtractionEvent};

use crate::error::{ExtractionError, ExtractionResult};
use crate::store::ExtractionStore;
use crate::types::{ExtractionSpec, SpeechSegment, SpeechTriple};

/// Characters of segment text shown in failure logs
const PREVIEW_CHARS: usize = 80;

pub struct EntityGraphAssembler<S: ExtractionStore + ?Sized> {
    store: Arc<S>,
    events: EventBus,
}

impl<S: ExtractionStore + ?Sized> EntityGraphAssembler<S> {
    pub fn new(store: Arc<S>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Fail with `AlreadyExtracted` if the protocol owns any speech
    pub async fn check_guard(&self, protocol_id: Uuid) -> ExtractionResult<()> {
        let existing = self.store.protocol_speech_ids(protocol_id).await?;
        if existing.is_empty() {
            return Ok(());
        }

        warn!(
            protocol_id = %protocol_id,
            existing = existing.len(),
            "Protocol already extracted, skipping"
        );
        Err(ExtractionError::AlreadyExtracted {
            protocol_id,
            existing: existing.len(),
        })
    }

    /// Country of the protocol, through its institution
    pub async fn resolve_country(&self, protocol: &Protocol) -> ExtractionResult<Country> {
        let missing_institution = || ExtractionError::MissingInstitutionContext {
            protocol_id: protocol.id,
        };

        let institution_id = protocol.institution_id.ok_or_else(missing_institution)?;
        let institution = self
            .store
            .institution(institution_id)
            .await?
            .ok_or_else(missing_institution)?;

        let missing_country = || ExtractionError::MissingCountryContext {
            protocol_id: protocol.id,
            institution_id,
        };

        let country_id = institution.country_id.ok_or_else(missing_country)?;
        self.store
            .country(country_id)
            .await?
            .ok_or_else(missing_country)
    }

    /// Store `segments` as the speeches of `protocol`
    ///
    /// Returns the new speech ids in ordinal order.
    pub async fn assemble(
        &self,
        protocol: &Protocol,
        spec: &ExtractionSpec,
        segments: &[SpeechSegment],
    ) -> ExtractionResult<Vec<Uuid>> {
        self.check_guard(protocol.id).await?;

        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let country = self.resolve_country(protocol).await?;

        let mut speech_ids = Vec::with_capacity(segments.len());
        let mut committed = 0usize;

        for segment in segments {
            match self
                .commit_segment(protocol, &country, spec, segment, &mut committed)
                .await
            {
                Ok(speech_id) => speech_ids.push(speech_id),
                // Another run committed this protocol's first speech after our guard check
                Err(e) if committed == 0 && e.is_unique_violation() => {
                    let existing = self.store.protocol_speech_ids(protocol.id).await?.len();
                    warn!(
                        protocol_id = %protocol.id,
                        existing,
                        "Protocol claimed by a concurrent run, skipping"
                    );
                    return Err(ExtractionError::AlreadyExtracted {
                        protocol_id: protocol.id,
                        existing,
                    });
                }
                Err(e) => {
                    error!(
                        protocol_id = %protocol.id,
                        ordinal = segment.ordinal,
                        speaker = %segment.speaker.speaker_name,
                        committed,
                        preview = %segment.preview(PREVIEW_CHARS),
                        "Failed to store speech: {}",
                        e
                    );
                    return Err(ExtractionError::PartialFailure {
                        protocol_id: protocol.id,
                        committed,
                        ordinal: segment.ordinal,
                        source: Box::new(ExtractionError::Store(e)),
                    });
                }
            }
        }

        info!(
            protocol_id = %protocol.id,
            speeches = speech_ids.len(),
            "Assembled speech graph"
        );

        Ok(speech_ids)
    }

    async fn commit_segment(
        &self,
        protocol: &Protocol,
        country: &Country,
        spec: &ExtractionSpec,
        segment: &SpeechSegment,
        committed: &mut usize,
    ) -> cicero_common::Result<Uuid> {
        let speaker = self.find_or_add_speaker(country, segment).await?;

        let triple = SpeechTriple::new(
            protocol.id,
            speaker.id,
            segment.ordinal,
            spec.language,
            segment.text.clone(),
        );
        let speech_id = triple.speech.id;

        self.store.add_speech_triple(&triple).await?;
        *committed += 1;

        self.store.append_speaker_speech(speaker.id, speech_id).await?;
        self.store
            .append_protocol_speech(protocol.id, speech_id, segment.ordinal)
            .await?;

        self.events.emit_lossy(ExtractionEvent::SpeechCommitted {
            protocol_id: protocol.id,
            speech_id,
            speaker_id: speaker.id,
            ordinal: segment.ordinal,
            timestamp: Utc::now(),
        });

        Ok(speech_id)
    }

    async fn find_or_add_speaker(
        &self,
        country: &Country,
        segment: &SpeechSegment,
    ) -> cicero_common::Result<Speaker> {
        let marker = &segment.speaker;
        let normalized = normalize_speaker_name(&marker.speaker_name);

        if let Some(existing) = self.store.find_speaker(country.id, &normalized).await? {
            return Ok(existing);
        }

        let mut speaker = Speaker::new(country.id, &marker.speaker_name);
        speaker.role = marker.role.clone();
        if let Some(label) = &marker.affiliation {
            speaker.party_id = Some(self.store.find_or_add_party(country.id, label).await?.id);
        }

        let stored = self.store.add_speaker(&speaker).await?;
        debug!(
            speaker_id = %stored.id,
            name = %stored.name,
            "New speaker"
        );
        Ok(stored)
    }
}
