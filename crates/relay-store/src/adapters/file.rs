//! File-backed `EventStore` adapter. One pretty-printed JSON array per
//! stream, plus a sibling `<stream>.snapshot.json`. Stream ids are only ever
//! `StreamId`s, whose constructor already enforces `^[A-Za-z0-9_-]+$`, so the
//! filename built from `stream_id.as_str()` can never escape `base_dir`.
//! Appends are serialized per stream with a `tokio::sync::Mutex` keyed

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use relay_core::ids::StreamId;
use relay_core::recorded::Envelope;
use tokio::sync::Mutex as AsyncMutex;

use crate::store::{EventStore, Snapshot, StoreError};

/// A store that persists each stream as a JSON file under `base_dir`.
pub struct FileStore {
    base_dir: PathBuf,
    locks: SyncMutex<HashMap<StreamId, Arc<AsyncMutex<()>>>>,
}

impl FileStore {
    /// Use (creating if needed) `base_dir` as the store root.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir, locks: SyncMutex::new(HashMap::new()) })
    }

    fn events_path(&self, stream_id: &StreamId) -> PathBuf {
        self.base_dir.join(format!("{}.json", stream_id.as_str()))
    }

    fn snapshot_path(&self, stream_id: &StreamId) -> PathBuf {
        self.base_dir.join(format!("{}.snapshot.json", stream_id.as_str()))
    }

    fn lock_for(&self, stream_id: &StreamId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(stream_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    async fn read_events(path: &Path) -> Result<Vec<Envelope>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_events(path: &Path, envelopes: &[Envelope]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(envelopes)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for FileStore {
    async fn append(
        &self,
        stream_id: &StreamId,
        event: relay_core::recorded::RecordedEvent,
    ) -> Result<Envelope, StoreError> {
        let lock = self.lock_for(stream_id);
        let _guard = lock.lock().await;

        let path = self.events_path(stream_id);
        let mut envelopes = Self::read_events(&path).await?;
        let seq = envelopes.len() as u64;
        let envelope = Envelope::new(stream_id.clone(), seq, event);
        envelopes.push(envelope.clone());
        Self::write_events(&path, &envelopes).await?;
        Ok(envelope)
    }

    async fn get_events(&self, stream_id: &StreamId) -> Result<Vec<Envelope>, StoreError> {
        Self::read_events(&self.events_path(stream_id)).await
    }

    async fn exists(&self, stream_id: &StreamId) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.events_path(stream_id)).await?)
    }

    async fn get_last_event(&self, stream_id: &StreamId) -> Result<Option<Envelope>, StoreError> {
        Ok(Self::read_events(&self.events_path(stream_id)).await?.into_iter().last())
    }

    async fn get_events_after(&self, stream_id: &StreamId, seq: u64) -> Result<Vec<Envelope>, StoreError> {
        Ok(Self::read_events(&self.events_path(stream_id))
            .await?
            .into_iter()
            .filter(|e| e.seq > seq)
            .collect())
    }

    async fn delete(&self, stream_id: &StreamId) -> Result<(), StoreError> {
        let lock = self.lock_for(stream_id);
        let _guard = lock.lock().await;
        for path in [self.events_path(stream_id), self.snapshot_path(stream_id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.locks.lock().remove(stream_id);
        Ok(())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, StoreError> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if stem.ends_with(".snapshot") {
                    continue;
                }
                if let Ok(id) = StreamId::new(stem) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    async fn save_snapshot(&self, stream_id: &StreamId, snapshot: Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(self.snapshot_path(stream_id), bytes).await?;
        Ok(())
    }

    async fn get_snapshot(&self, stream_id: &StreamId) -> Result<Option<Snapshot>, StoreError> {
        match tokio::fs::read(self.snapshot_path(stream_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::recorded::RecordedEvent;

    fn sid(s: &str) -> StreamId {
        StreamId::new(s).unwrap()
    }

    #[tokio::test]
    async fn append_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Token { value: "a".into(), index: 0 }).await.unwrap();

        let reopened = FileStore::new(dir.path()).await.unwrap();
        let events = reopened.get_events(&id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 0);
    }

    #[tokio::test]
    async fn seq_is_dense_and_monotone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let id = sid("s1");
        for i in 0..4 {
            let env = store
                .append(&id, RecordedEvent::Token { value: i.to_string(), index: i })
                .await
                .unwrap();
            assert_eq!(env.seq, i);
        }
    }

    #[tokio::test]
    async fn delete_removes_events_and_snapshot_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Complete { content: String::new(), token_count: 0 }).await.unwrap();
        store.save_snapshot(&id, Snapshot { at_seq: 0, content: serde_json::json!(null) }).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
        assert!(store.get_snapshot(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_streams_ignores_snapshot_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let id = sid("s1");
        let _ = store.append(&id, RecordedEvent::Complete { content: String::new(), token_count: 0 }).await.unwrap();
        store.save_snapshot(&id, Snapshot { at_seq: 0, content: serde_json::json!(null) }).await.unwrap();
        let streams = store.list_streams().await.unwrap();
        assert_eq!(streams, vec![id]);
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_stream_stay_dense() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()).await.unwrap());
        let id = sid("s1");
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store.append(&id, RecordedEvent::Token { value: i.to_string(), index: i }).await.unwrap()
            }));
        }
        for h in handles {
            let _ = h.await.unwrap();
        }
        let events = store.get_events(&id).await.unwrap();
        let mut seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..10).collect::<Vec<_>>());
    }
}
