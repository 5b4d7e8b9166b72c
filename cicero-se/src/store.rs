//! Extraction store abstraction
//!
//! The assembler and service see persistence only through
//! [`ExtractionStore`]. [`SqliteStore`] is the production implementation;
//! tests wrap it to inject faults.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use cicero_common::db::{Country, Institution, Party, Protocol, Speaker};
use cicero_common::Result;

use crate::db::{protocols, speakers, speeches};
use crate::types::SpeechTriple;
use crate::utils::{retry_on_lock, db_retry::DEFAULT_MAX_LOCK_WAIT_MS};

/// Persistence operations needed by one extraction run
#[async_trait]
pub trait ExtractionStore: Send + Sync {
    async fn protocol(&self, id: Uuid) -> Result<Option<Protocol>>;

    /// Ids of speeches already owned by the protocol, in protocol order
    async fn protocol_speech_ids(&self, protocol_id: Uuid) -> Result<Vec<Uuid>>;

    async fn institution(&self, id: Uuid) -> Result<Option<Institution>>;

    async fn country(&self, id: Uuid) -> Result<Option<Country>>;

    async fn find_speaker(&self, country_id: Uuid, normalized_name: &str) -> Result<Option<Speaker>>;

    /// Store a new speaker; returns the existing record on a unique conflict
    async fn add_speaker(&self, speaker: &Speaker) -> Result<Speaker>;

    async fn find_or_add_party(&self, country_id: Uuid, label: &str) -> Result<Party>;

    /// Commit speech, speech text and raw text as one transaction
    async fn add_speech_triple(&self, triple: &SpeechTriple) -> Result<()>;

    async fn append_speaker_speech(&self, speaker_id: Uuid, speech_id: Uuid) -> Result<()>;

    async fn append_protocol_speech(&self, protocol_id: Uuid, speech_id: Uuid, protocol_order: u32) -> Result<()>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    /// Override how long a locked database is retried
    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn save_protocol(&self, protocol: &Protocol) -> Result<()> {
        retry_on_lock("save_protocol", self.max_lock_wait_ms, || {
            protocols::save_protocol(&self.pool, protocol)
        })
        .await
    }

    /// Delete a protocol with its speeches; false if it did not exist
    pub async fn delete_protocol(&self, id: Uuid) -> Result<bool> {
        retry_on_lock("delete_protocol", self.max_lock_wait_ms, || {
            protocols::delete_protocol(&self.pool, id)
        })
        .await
    }

    /// Protocols that own no speech yet
    pub async fn unextracted_protocol_ids(&self) -> Result<Vec<Uuid>> {
        protocols::list_unextracted_protocol_ids(&self.pool).await
    }

    pub async fn protocol_speeches(&self, protocol_id: Uuid) -> Result<Vec<SpeechTriple>> {
        speeches::load_protocol_speeches(&self.pool, protocol_id).await
    }

    /// Speech ids from the ordered protocol relation
    pub async fn protocol_relation(&self, protocol_id: Uuid) -> Result<Vec<(u32, Uuid)>> {
        speeches::list_protocol_relation(&self.pool, protocol_id).await
    }

    pub async fn speaker_with_speeches(&self, id: Uuid) -> Result<Option<Speaker>> {
        speakers::load_speaker_with_speeches(&self.pool, id).await
    }
}

#[async_trait]
impl ExtractionStore for SqliteStore {
    async fn protocol(&self, id: Uuid) -> Result<Option<Protocol>> {
        protocols::load_protocol(&self.pool, id).await
    }

    async fn protocol_speech_ids(&self, protocol_id: Uuid) -> Result<Vec<Uuid>> {
        speeches::list_protocol_speech_ids(&self.pool, protocol_id).await
    }

    async fn institution(&self, id: Uuid) -> Result<Option<Institution>> {
        protocols::load_institution(&self.pool, id).await
    }

    async fn country(&self, id: Uuid) -> Result<Option<Country>> {
        protocols::load_country(&self.pool, id).await
    }

    async fn find_speaker(&self, country_id: Uuid, normalized_name: &str) -> Result<Option<Speaker>> {
        speakers::find_speaker(&self.pool, country_id, normalized_name).await
    }

    async fn add_speaker(&self, speaker: &Speaker) -> Result<Speaker> {
        retry_on_lock("add_speaker", self.max_lock_wait_ms, || {
            speakers::save_speaker(&self.pool, speaker)
        })
        .await
    }

    async fn find_or_add_party(&self, country_id: Uuid, label: &str) -> Result<Party> {
        retry_on_lock("find_or_add_party", self.max_lock_wait_ms, || {
            speakers::find_or_save_party(&self.pool, country_id, label)
        })
        .await
    }

    async fn add_speech_triple(&self, triple: &SpeechTriple) -> Result<()> {
        retry_on_lock("add_speech_triple", self.max_lock_wait_ms, || {
            speeches::save_speech_triple(&self.pool, triple)
        })
        .await
    }

    async fn append_speaker_speech(&self, speaker_id: Uuid, speech_id: Uuid) -> Result<()> {
        retry_on_lock("append_speaker_speech", self.max_lock_wait_ms, || {
            speakers::save_speaker_speech(&self.pool, speaker_id, speech_id)
        })
        .await
    }

    async fn append_protocol_speech(&self, protocol_id: Uuid, speech_id: Uuid, protocol_order: u32) -> Result<()> {
        retry_on_lock("append_protocol_speech", self.max_lock_wait_ms, || {
            speeches::save_protocol_speech(&self.pool, protocol_id, speech_id, protocol_order)
        })
        .await
    }
}
