//! In-memory `EventStore` adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::ids::StreamId;
use relay_core::recorded::{Envelope, RecordedEvent};

use crate::store::{EventStore, Snapshot, StoreError};

#[derive(Default)]
struct StreamLog {
    envelopes: Vec<Envelope>,
    snapshot: Option<Snapshot>,
}

/// A process-local, non-durable `EventStore`. Useful for tests and for
/// callers that only want live dispatch, not durable recording.
#[derive(Default)]
pub struct MemoryStore {
    streams: Mutex<HashMap<StreamId, StreamLog>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, stream_id: &StreamId, event: RecordedEvent) -> Result<Envelope, StoreError> {
        let mut streams = self.streams.lock();
        let log = streams.entry(stream_id.clone()).or_default();
        let seq = log.envelopes.len() as u64;
        let envelope = Envelope::new(stream_id.clone(), seq, event);
        log.envelopes.push(envelope.clone());
        Ok(envelope)
    }

    async fn get_events(&self, stream_id: &StreamId) -> Result<Vec<Envelope>, StoreError> {
        Ok(self
            .streams
            .lock()
            .get(stream_id)
            .map(|log| log.envelopes.clone())
            .unwrap_or_default())
    }

    async fn exists(&self, stream_id: &StreamId) -> Result<bool, StoreError> {
        Ok(self.streams.lock().contains_key(stream_id))
    }

    async fn get_last_event(&self, stream_id: &StreamId) -> Result<Option<Envelope>, StoreError> {
        Ok(self
            .streams
            .lock()
            .get(stream_id)
            .and_then(|log| log.envelopes.last().cloned()))
    }

    async fn get_events_after(&self, stream_id: &StreamId, seq: u64) -> Result<Vec<Envelope>, StoreError> {
        Ok(self
            .streams
            .lock()
            .get(stream_id)
            .map(|log| log.envelopes.iter().filter(|e| e.seq > seq).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, stream_id: &StreamId) -> Result<(), StoreError> {
        self.streams.lock().remove(stream_id);
        Ok(())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, StoreError> {
        Ok(self.streams.lock().keys().cloned().collect())
    }

    async fn save_snapshot(&self, stream_id: &StreamId, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut streams = self.streams.lock();
        let log = streams.entry(stream_id.clone()).or_default();
        log.snapshot = Some(snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, stream_id: &StreamId) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.streams.lock().get(stream_id).and_then(|log| log.snapshot.clone()))
    }
}
