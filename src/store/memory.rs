use std::sync::Arc;

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::store::{FieldUpdates, MatchStore, error::StorageResult, write_at_path};

/// Snapshots buffered per subscriber before old ones are dropped.
const WATCH_CAPACITY: usize = 64;

/// In-memory [`MatchStore`] backend.
///
/// Serves as the test double for the transport and as a single-process
/// deployment option. Each document mutation happens under the document's map
/// entry guard, so one `update_fields` call is atomic and publishes exactly
/// one snapshot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<DashMap<String, Value>>,
    watchers: Arc<DashMap<String, broadcast::Sender<Value>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, path: &str) -> broadcast::Sender<Value> {
        self.watchers
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0)
            .clone()
    }

    fn publish(&self, path: &str, snapshot: Value) {
        if let Some(sender) = self.watchers.get(path) {
            // Send errors just mean nobody is listening right now.
            let _ = sender.send(snapshot);
        }
    }
}

impl MatchStore for MemoryStore {
    fn create_document(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            store.documents.insert(path.clone(), value.clone());
            store.publish(&path, value);
            Ok(())
        })
    }

    fn get_document(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { Ok(store.documents.get(&path).map(|doc| doc.value().clone())) })
    }

    fn update_fields(
        &self,
        path: &str,
        updates: FieldUpdates,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let snapshot = {
                let mut entry = store
                    .documents
                    .entry(path.clone())
                    .or_insert(Value::Null);
                for (subpath, value) in updates {
                    write_at_path(entry.value_mut(), &subpath, value);
                }
                entry.value().clone()
            };
            store.publish(&path, snapshot);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        path: &str,
    ) -> BoxFuture<'static, StorageResult<BoxStream<'static, Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let mut receiver = store.sender_for(&path).subscribe();
            let initial = store.documents.get(&path).map(|doc| doc.value().clone());
            let stream = async_stream::stream! {
                if let Some(snapshot) = initial {
                    yield snapshot;
                }
                loop {
                    match receiver.recv().await {
                        Ok(snapshot) => yield snapshot,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged snapshots but keep the stream alive.
                            warn!(%path, skipped, "subscriber lagging behind store commits");
                            continue;
                        }
                    }
                }
            };
            Ok(stream.boxed())
        })
    }

    fn unsubscribe(&self, path: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            // Dropping the sender closes every receiver, ending their streams.
            store.watchers.remove(&path);
            Ok(())
        })
    }
}
