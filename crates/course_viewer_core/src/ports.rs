//! crates/course_viewer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted document database and object storage.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Documents and Subscriptions
//=========================================================================================

/// A stored document: its id within the collection plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// A live feed of full collection snapshots.
///
/// Each item replaces the previous one; a consumer that falls behind only
/// sees the latest state. The feed ends once cancelled through
/// [`Subscription::cancel`] or its token, or by dropping it.
pub struct Subscription {
    snapshots: watch::Receiver<Vec<Document>>,
    delivered_initial: bool,
    token: CancellationToken,
}

impl Subscription {
    pub fn new(snapshots: watch::Receiver<Vec<Document>>, token: CancellationToken) -> Self {
        Self {
            snapshots,
            delivered_initial: false,
            token,
        }
    }

    /// Waits for the next snapshot. The first call returns the state at
    /// subscription time. `None` once cancelled or the source closed.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        if self.token.is_cancelled() {
            return None;
        }
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.snapshots.borrow_and_update().clone());
        }
        tokio::select! {
            _ = self.token.cancelled() => None,
            changed = self.snapshots.changed() => match changed {
                Ok(()) => Some(self.snapshots.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one document by id.
    async fn get(&self, collection: &str, id: &str) -> PortResult<Document>;

    /// Returns every document in a collection.
    async fn query(&self, collection: &str) -> PortResult<Vec<Document>>;

    /// Stores a new document and returns its generated id.
    async fn create(&self, collection: &str, data: Value) -> PortResult<String>;

    /// Shallow-merges the top-level fields of `partial` into an existing document.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> PortResult<()>;

    /// Opens a live feed of the collection. The first snapshot is the current state.
    async fn subscribe(&self, collection: &str) -> PortResult<Subscription>;
}

/// A progress report emitted while an upload is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL of the object.
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> PortResult<String>;
}
