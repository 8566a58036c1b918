//! The store contract.

use async_trait::async_trait;
use relay_core::ids::{InvalidStreamId, StreamId};
use relay_core::recorded::{Envelope, RecordedEvent};

/// Errors any `EventStore` implementation can surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O failed (file adapter).
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored JSON failed to parse, or a value failed to serialize.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stream id failed 's path-safety validation.
    #[error(transparent)]
    InvalidStreamId(#[from] InvalidStreamId),
    /// The requested stream has no events.
    #[error("stream not found: {0}")]
    StreamNotFound(StreamId),
    /// This adapter does not implement the optional snapshot extension.
    #[error("snapshots are not supported by this store adapter")]
    SnapshotsUnsupported,
    /// A composite/TTL wrapper's member adapter reported a failure that doesn't
    /// fit the other variants.
    #[error("store adapter error: {0}")]
    Adapter(String),
}

/// A point-in-time snapshot of accumulated content, keyed by the sequence
/// number it was taken at.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Sequence number the snapshot was taken at (inclusive).
    pub at_seq: u64,
    /// Opaque snapshot payload, defined by the caller (typically a serialized
    /// `SessionSnapshot`).
    pub content: serde_json::Value,
}

/// Mapping from stream-id to an ordered sequence of envelopes, with an
/// optional snapshot slot. Implementations must serialize appends per stream
/// so sequence numbers stay dense and monotone even under concurrent callers.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event, assigning it the next dense sequence number for
    /// `stream_id`. Creates the stream if it doesn't exist yet.
    async fn append(&self, stream_id: &StreamId, event: RecordedEvent) -> Result<Envelope, StoreError>;

    /// All envelopes for a stream, in sequence order. Empty if the stream doesn't
    /// exist.
    async fn get_events(&self, stream_id: &StreamId) -> Result<Vec<Envelope>, StoreError>;

    /// Whether a stream has at least one recorded event.
    async fn exists(&self, stream_id: &StreamId) -> Result<bool, StoreError>;

    /// The most recently appended envelope, if any.
    async fn get_last_event(&self, stream_id: &StreamId) -> Result<Option<Envelope>, StoreError>;

    /// Envelopes with `seq > seq`, in order.
    async fn get_events_after(&self, stream_id: &StreamId, seq: u64) -> Result<Vec<Envelope>, StoreError>;

    /// Permanently remove a stream and all its envelopes (and its snapshot, if
    /// any).
    async fn delete(&self, stream_id: &StreamId) -> Result<(), StoreError>;

    /// All known stream ids. Order is adapter-defined.
    async fn list_streams(&self) -> Result<Vec<StreamId>, StoreError>;

    /// Save or overwrite the snapshot slot for a stream. Adapters that don't
    /// support snapshots return `Err(StoreError::SnapshotsUnsupported)`.
    async fn save_snapshot(
        &self,
        _stream_id: &StreamId,
        _snapshot: Snapshot,
    ) -> Result<(), StoreError> {
        Err(StoreError::SnapshotsUnsupported)
    }

    /// The current snapshot for a stream, if one was saved.
    async fn get_snapshot(&self, _stream_id: &StreamId) -> Result<Option<Snapshot>, StoreError> {
        Ok(None)
    }

    /// The snapshot for a stream, only if it was taken at or before `seq`; `None`
    /// otherwise (including when no snapshot exists).
    async fn get_snapshot_before(
        &self,
        stream_id: &StreamId,
        seq: u64,
    ) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .get_snapshot(stream_id)
            .await?
            .filter(|snap| snap.at_seq <= seq))
    }
}
