//! Store wrapper that fails on demand

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use cicero_common::db::{Country, Institution, Party, Protocol, Speaker};
use cicero_common::{Error, Result};
use cicero_se::{ExtractionStore, SpeechTriple, SqliteStore};

/// Delegates to a [`SqliteStore`] but fails the Nth speech commit, or the
/// Nth protocol link after the triple committed
///
/// It can also report no speeches for the first guard reads, which is what a
/// run sees when another run commits right after its guard check.
pub struct FailingStore {
    inner: Arc<SqliteStore>,
    fail_triple_at: Option<usize>,
    fail_protocol_link_at: Option<usize>,
    stale_guard_reads: usize,
    guard_reads: AtomicUsize,
    triples: AtomicUsize,
    protocol_links: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            fail_triple_at: None,
            fail_protocol_link_at: None,
            stale_guard_reads: 0,
            guard_reads: AtomicUsize::new(0),
            triples: AtomicUsize::new(0),
            protocol_links: AtomicUsize::new(0),
        }
    }

    /// Fail the `n`-th (1-based) `add_speech_triple`
    pub fn fail_triple_at(mut self, n: usize) -> Self {
        self.fail_triple_at = Some(n);
        self
    }

    /// Fail the `n`-th (1-based) `append_protocol_speech`
    pub fn fail_protocol_link_at(mut self, n: usize) -> Self {
        self.fail_protocol_link_at = Some(n);
        self
    }

    /// Answer the first `n` `protocol_speech_ids` calls with no speeches
    pub fn stale_guard_reads(mut self, n: usize) -> Self {
        self.stale_guard_reads = n;
        self
    }
}

fn injected(what: &str, n: usize) -> Error {
    Error::Internal(format!("injected failure: {} #{}", what, n))
}

#[async_trait]
impl ExtractionStore for FailingStore {
    async fn protocol(&self, id: Uuid) -> Result<Option<Protocol>> {
        self.inner.protocol(id).await
    }

    async fn protocol_speech_ids(&self, protocol_id: Uuid) -> Result<Vec<Uuid>> {
        let n = self.guard_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.stale_guard_reads {
            return Ok(Vec::new());
        }
        self.inner.protocol_speech_ids(protocol_id).await
    }

    async fn institution(&self, id: Uuid) -> Result<Option<Institution>> {
        self.inner.institution(id).await
    }

    async fn country(&self, id: Uuid) -> Result<Option<Country>> {
        self.inner.country(id).await
    }

    async fn find_speaker(&self, country_id: Uuid, normalized_name: &str) -> Result<Option<Speaker>> {
        self.inner.find_speaker(country_id, normalized_name).await
    }

    async fn add_speaker(&self, speaker: &Speaker) -> Result<Speaker> {
        self.inner.add_speaker(speaker).await
    }

    async fn find_or_add_party(&self, country_id: Uuid, label: &str) -> Result<Party> {
        self.inner.find_or_add_party(country_id, label).await
    }

    async fn add_speech_triple(&self, triple: &SpeechTriple) -> Result<()> {
        let n = self.triples.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_triple_at == Some(n) {
            return Err(injected("add_speech_triple", n));
        }
        self.inner.add_speech_triple(triple).await
    }

    async fn append_speaker_speech(&self, speaker_id: Uuid, speech_id: Uuid) -> Result<()> {
        self.inner.append_speaker_speech(speaker_id, speech_id).await
    }

    async fn append_protocol_speech(&self, protocol_id: Uuid, speech_id: Uuid, protocol_order: u32) -> Result<()> {
        let n = self.protocol_links.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_protocol_link_at == Some(n) {
            return Err(injected("append_protocol_speech", n));
        }
        self.inner
            .append_protocol_speech(protocol_id, speech_id, protocol_order)
            .await
    }
}
