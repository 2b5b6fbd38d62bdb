//! crates/course_viewer_core/src/memory.rs
//!
//! A process-local `DocumentStore`. Used by the test suites and by the API
//! service when no database is configured.

use crate::ports::{Document, DocumentStore, PortError, PortResult, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Collection {
    documents: Vec<Document>,
    watcher: watch::Sender<Vec<Document>>,
}

impl Collection {
    fn new() -> Self {
        let (watcher, _) = watch::channel(Vec::new());
        Self {
            documents: Vec::new(),
            watcher,
        }
    }

    fn publish(&self) {
        self.watcher.send_replace(self.documents.clone());
    }
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document under a caller-chosen id, replacing any previous one.
    pub async fn put(&self, collection: &str, id: &str, data: Value) {
        let mut collections = self.collections.lock().await;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        let document = Document {
            id: id.to_string(),
            data,
        };
        match entry.documents.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = document,
            None => entry.documents.push(document),
        }
        entry.publish();
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of `create`/`update`/`put` calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Live subscribers on a collection.
    pub async fn subscriber_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .await
            .get(collection)
            .map(|c| c.watcher.receiver_count())
            .unwrap_or(0)
    }

    /// Ends every live feed on a collection, as a lost database connection
    /// would. Later subscriptions work normally.
    pub async fn end_feeds(&self, collection: &str) {
        if let Some(entry) = self.collections.lock().await.get_mut(collection) {
            let (watcher, _) = watch::channel(entry.documents.clone());
            entry.watcher = watcher;
        }
    }

    /// While offline, every call fails with `PortError::Unexpected`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("document store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> PortResult<Document> {
        self.check_online()?;
        self.collections
            .lock()
            .await
            .get(collection)
            .and_then(|c| c.documents.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {}/{}", collection, id)))
    }

    async fn query(&self, collection: &str) -> PortResult<Vec<Document>> {
        self.check_online()?;
        Ok(self
            .collections
            .lock()
            .await
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, data: Value) -> PortResult<String> {
        self.check_online()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.lock().await;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        entry.documents.push(Document {
            id: id.clone(),
            data,
        });
        entry.publish();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> PortResult<()> {
        self.check_online()?;
        let Value::Object(fields) = partial else {
            return Err(PortError::Unexpected(
                "partial update must be a JSON object".to_string(),
            ));
        };

        let mut collections = self.collections.lock().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| PortError::NotFound(format!("Document {}/{}", collection, id)))?;
        let document = entry
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Document {}/{}", collection, id)))?;

        match &mut document.data {
            Value::Object(existing) => existing.extend(fields),
            other => *other = Value::Object(fields),
        }
        entry.publish();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> PortResult<Subscription> {
        self.check_online()?;
        let receiver = self
            .collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_insert_with(Collection::new)
            .watcher
            .subscribe();

        Ok(Subscription::new(receiver, CancellationToken::new()))
    }
}
