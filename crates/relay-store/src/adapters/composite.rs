//! Composite `EventStore`: fan writes out to every member, read from one
//! designated primary.

use async_trait::async_trait;
use relay_core::ids::StreamId;
use relay_core::recorded::{Envelope, RecordedEvent};
use tracing::warn;

use crate::store::{EventStore, Snapshot, StoreError};

/// Writes to all members; reads only from `members[0]` (the primary). A
/// secondary member failing to write is logged and swallowed so one flaky
/// mirror can't block recording on the primary — the primary's result is
/// authoritative and is what callers get back.
pub struct CompositeStore {
    members: Vec<Box<dyn EventStore>>,
}

impl CompositeStore {
    /// Build a composite over `members`. `members[0]` is the primary used
    /// for every read.
    ///
    /// # Panics
    ///
    /// Panics if `members` is empty — a composite store needs a primary.
    #[must_use]
    pub fn new(members: Vec<Box<dyn EventStore>>) -> Self {
        assert!(!members.is_empty(), "CompositeStore requires at least one member");
        Self { members }
    }

    fn primary(&self) -> &dyn EventStore {
        self.members[0].as_ref()
    }
}

#[async_trait]
impl EventStore for CompositeStore {
    async fn append(&self, stream_id: &StreamId, event: RecordedEvent) -> Result<Envelope, StoreError> {
        let primary_result = self.primary().append(stream_id, event.clone()).await?;
        for (i, member) in self.members.iter().enumerate().skip(1) {
            if let Err(e) = member.append(stream_id, event.clone()).await {
                warn!(stream_id = %stream_id, member = i, error = %e, "composite store: secondary write failed");
            }
        }
        Ok(primary_result)
    }

    async fn get_events(&self, stream_id: &StreamId) -> Result<Vec<Envelope>, StoreError> {
        self.primary().get_events(stream_id).await
    }

    async fn exists(&self, stream_id: &StreamId) -> Result<bool, StoreError> {
        self.primary().exists(stream_id).await
    }

    async fn get_last_event(&self, stream_id: &StreamId) -> Result<Option<Envelope>, StoreError> {
        self.primary().get_last_event(stream_id).await
    }

    async fn get_events_after(&self, stream_id: &StreamId, seq: u64) -> Result<Vec<Envelope>, StoreError> {
        self.primary().get_events_after(stream_id, seq).await
    }

    async fn delete(&self, stream_id: &StreamId) -> Result<(), StoreError> {
        for (i, member) in self.members.iter().enumerate() {
            if let Err(e) = member.delete(stream_id).await {
                if i == 0 {
                    return Err(e);
                }
                warn!(stream_id = %stream_id, member = i, error = %e, "composite store: secondary delete failed");
            }
        }
        Ok(())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, StoreError> {
        self.primary().list_streams().await
    }

    async fn save_snapshot(&self, stream_id: &StreamId, snapshot: Snapshot) -> Result<(), StoreError> {
        self.primary().save_snapshot(stream_id, snapshot).await
    }

    async fn get_snapshot(&self, stream_id: &StreamId) -> Result<Option<Snapshot>, StoreError> {
        self.primary().get_snapshot(stream_id).await
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
    async fn append_writes_to_all_members() {
        let primary = MemoryStore::new();
        let mirror = MemoryStore::new();
        let composite = CompositeStore::new(vec![Box::new(primary), Box::new(mirror)]);
        let id = sid("s1");
        let _ = composite
            .append(&id, RecordedEvent::Complete { content: "hi".into(), token_count: 1 })
            .await
            .unwrap();
        assert!(composite.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn reads_come_from_primary() {
        let primary = MemoryStore::new();
        let other = MemoryStore::new();
        let composite = CompositeStore::new(vec![Box::new(primary), Box::new(other)]);
        let id = sid("s1");
        let _ = composite
            .append(&id, RecordedEvent::Token { value: "a".into(), index: 0 })
            .await
            .unwrap();
        assert_eq!(composite.get_events(&id).await.unwrap().len(), 1);
    }

    #[test]
    #[should_panic(expected = "at least one member")]
    fn rejects_empty_member_list() {
        let _ = CompositeStore::new(Vec::new());
    }
}
