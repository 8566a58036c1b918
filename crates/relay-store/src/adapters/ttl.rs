//! TTL-filtering `EventStore` wrapper. Wraps any `EventStore` and hides
//! streams whose last append is older than `ttl`. Expiry is lazy: a stream
//! is only actually deleted from the inner store the next time it is
//! touched after expiring.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::ids::StreamId;
use relay_core::recorded::{Envelope, RecordedEvent};

use crate::store::{EventStore, Snapshot, StoreError};

/// Wraps `inner`, filtering out (and lazily deleting) any stream whose most
/// recent append is older than `ttl`.
pub struct TtlStore<S: EventStore> {
    inner: S,
    ttl: Duration,
    last_seen: Mutex<HashMap<StreamId, Instant>>,
}

impl<S: EventStore> TtlStore<S> {
    /// Wrap `inner`, expiring streams `ttl` after their last append.
    #[must_use]
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self { inner, ttl, last_seen: Mutex::new(HashMap::new()) }
    }

    fn touch(&self, stream_id: &StreamId) {
        self.last_seen.lock().insert(stream_id.clone(), Instant::now());
    }

    /// `true` if this stream is known to have expired. Streams never observed by
    /// this wrapper (e.g. pre-existing in a persisted inner store) are treated as
    /// fresh until their first append through this wrapper.
    fn is_expired(&self, stream_id: &StreamId) -> bool {
        self.last_seen
            .lock()
            .get(stream_id)
            .is_some_and(|seen| seen.elapsed() > self.ttl)
    }

    async fn expire_if_needed(&self, stream_id: &StreamId) -> Result<bool, StoreError> {
        if self.is_expired(stream_id) {
            self.inner.delete(stream_id).await?;
            self.last_seen.lock().remove(stream_id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl<S: EventStore> EventStore for TtlStore<S> {
    async fn append(&self, stream_id: &StreamId, event: RecordedEvent) -> Result<Envelope, StoreError> {
        let _ = self.expire_if_needed(stream_id).await?;
        let envelope = self.inner.append(stream_id, event).await?;
        self.touch(stream_id);
        Ok(envelope)
    }

    async fn get_events(&self, stream_id: &StreamId) -> Result<Vec<Envelope>, StoreError> {
        if self.expire_if_needed(stream_id).await? {
            return Ok(Vec::new());
        }
        self.inner.get_events(stream_id).await
    }

    async fn exists(&self, stream_id: &StreamId) -> Result<bool, StoreError> {
        if self.expire_if_needed(stream_id).await? {
            return Ok(false);
        }
        self.inner.exists(stream_id).await
    }

    async fn get_last_event(&self, stream_id: &StreamId) -> Result<Option<Envelope>, StoreError> {
        if self.expire_if_needed(stream_id).await? {
            return Ok(None);
        }
        self.inner.get_last_event(stream_id).await
    }

    async fn get_events_after(&self, stream_id: &StreamId, seq: u64) -> Result<Vec<Envelope>, StoreError> {
        if self.expire_if_needed(stream_id).await? {
            return Ok(Vec::new());
        }
        self.inner.get_events_after(stream_id, seq).await
    }

    async fn delete(&self, stream_id: &StreamId) -> Result<(), StoreError> {
        self.last_seen.lock().remove(stream_id);
        self.inner.delete(stream_id).await
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, StoreError> {
        let all = self.inner.list_streams().await?;
        let mut fresh = Vec::with_capacity(all.len());
        for stream_id in all {
            if self.expire_if_needed(&stream_id).await? {
                continue;
            }
            fresh.push(stream_id);
        }
        Ok(fresh)
    }

    async fn save_snapshot(&self, stream_id: &StreamId, snapshot: Snapshot) -> Result<(), StoreError> {
        self.inner.save_snapshot(stream_id, snapshot).await
    }

    async fn get_snapshot(&self, stream_id: &StreamId) -> Result<Option<Snapshot>, StoreError> {
        if self.expire_if_needed(stream_id).await? {
            return Ok(None);
        }
        self.inner.get_snapshot(stream_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn sid(s: &str) -> StreamId {
        StreamId::new(s).unwrap()
    }

    #[tokio::test]
    async fn fresh_stream_is_visible() {
        let store = TtlStore::new(MemoryStore::new(), Duration::from_secs(60));
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Complete { content: String::new(), token_count: 0 }).await.unwrap();
        assert!(store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_stream_reads_as_absent_and_is_purged() {
        let store = TtlStore::new(MemoryStore::new(), Duration::from_millis(5));
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Complete { content: String::new(), token_count: 0 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.exists(&id).await.unwrap());
        assert!(store.get_events(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appending_again_revives_an_expired_stream() {
        let store = TtlStore::new(MemoryStore::new(), Duration::from_millis(5));
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Token { value: "a".into(), index: 0 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let env = store.append(&id, RecordedEvent::Token { value: "b".into(), index: 0 }).await.unwrap();
        assert_eq!(env.seq, 0, "expired stream was purged, so the new append restarts the sequence");
        assert!(store.exists(&id).await.unwrap());
    }
}
