use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message not found: seq={0}")]
    MessageNotFound(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A dead-lettered message. The original payload is preserved byte-for-byte
/// (base64 in the stored JSON) next to the reason it was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub seq: u64,
    pub payload_base64: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn payload(&self) -> Option<Vec<u8>> {
        BASE64.decode(&self.payload_base64).ok()
    }
}

/// Persistent inbound queue backed by a Fjall keyspace.
///
/// Partitions:
/// - `inbox`: u64 (big-endian) → raw payload bytes
/// - `dead_letter`: u64 (big-endian) → DeadLetter (JSON)
/// - `metadata`: "next_seq" → u64
///
/// Payloads are persisted before they are handed to listener channels, so a
/// crash between enqueue and processing never loses a message.
pub struct QueueStore {
    keyspace: Keyspace,
    inbox: PartitionHandle,
    dead_letter: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
}

impl QueueStore {
    /// Open or create a queue at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening queue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;
        let inbox = keyspace.open_partition("inbox", PartitionCreateOptions::default())?;
        let dead_letter =
            keyspace.open_partition("dead_letter", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        info!(current_seq, "Queue opened");

        Ok(Self {
            keyspace,
            inbox,
            dead_letter,
            metadata,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
        })
    }

    /// Persist a payload and return its sequence number.
    pub fn enqueue(&self, payload: &[u8]) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        self.inbox.insert(seq.to_be_bytes(), payload)?;
        self.metadata
            .insert(b"next_seq", (seq + 1).to_be_bytes())?;

        debug!(seq, size = payload.len(), "Payload enqueued");
        Ok(seq)
    }

    /// Retrieve a payload by sequence number.
    pub fn get(&self, seq: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.inbox.get(seq.to_be_bytes())?.map(|b| b.to_vec()))
    }

    /// Move a payload to the dead-letter partition with its rejection reason.
    pub fn dead_letter(&self, seq: u64, error: &str) -> Result<()> {
        let payload = self
            .get(seq)?
            .ok_or(QueueError::MessageNotFound(seq))?;

        let entry = DeadLetter {
            seq,
            payload_base64: BASE64.encode(&payload),
            error: error.to_string(),
            failed_at: Utc::now(),
        };

        self.dead_letter
            .insert(seq.to_be_bytes(), serde_json::to_vec(&entry)?)?;
        warn!(seq, error, "Message dead-lettered");
        Ok(())
    }

    /// List dead letters for inspection, oldest first.
    pub fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>> {
        let mut entries = Vec::new();
        for item in self.dead_letter.iter().take(limit) {
            let (_, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    /// Current sequence counter value.
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify the keyspace is accessible.
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"next_seq")?;
        Ok(())
    }
}
