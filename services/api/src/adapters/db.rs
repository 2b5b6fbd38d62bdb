//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. Documents are JSONB rows keyed
//! by collection path; live subscriptions ride on Postgres `LISTEN/NOTIFY`.
//!
//! One listener connection serves every subscription of a store. It refetches
//! a collection when notified about it and fans the snapshot out through that
//! collection's `watch` channel, so subscribers hold no pool connections.

use async_trait::async_trait;
use course_viewer_core::ports::{Document, DocumentStore, PortError, PortResult, Subscription};
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The channel the `documents_changed` trigger notifies on.
const CHANGE_CHANNEL: &str = "document_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

type Watchers = Arc<Mutex<HashMap<String, watch::Sender<Vec<Document>>>>>;

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    watchers: Watchers,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Live subscribers on a collection.
    pub async fn subscriber_count(&self, collection: &str) -> usize {
        self.watchers
            .lock()
            .await
            .get(collection)
            .map(|w| w.receiver_count())
            .unwrap_or(0)
    }

    /// Starts the shared change listener unless it is already running.
    async fn ensure_listening(&self) -> PortResult<()> {
        let mut running = self.listener.lock().await;
        if running.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unexpected)?;
        listener.listen(CHANGE_CHANNEL).await.map_err(unexpected)?;
        info!("Listening for document changes on {}", CHANGE_CHANNEL);

        *running = Some(tokio::spawn(watch_changes(
            listener,
            self.pool.clone(),
            self.watchers.clone(),
        )));
        Ok(())
    }
}

/// Runs until the listener fails. Ending it closes every watched collection,
/// which ends their subscriptions; the next `subscribe` starts a new listener.
async fn watch_changes(mut listener: PgListener, pool: PgPool, watchers: Watchers) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => refresh(&pool, &watchers, notification.payload()).await,
            Ok(None) => {
                // The connection dropped and notifications may have been
                // missed; the next `try_recv` reconnects.
                warn!("Change listener reconnecting; refreshing every watched collection");
                let collections: Vec<String> = watchers.lock().await.keys().cloned().collect();
                for collection in collections {
                    refresh(&pool, &watchers, &collection).await;
                }
            }
            Err(e) => {
                error!("Change listener failed: {}", e);
                break;
            }
        }
    }
    watchers.lock().await.clear();
    debug!("Stopped watching document changes");
}

/// Re-reads a watched collection and publishes it. Collections nobody
/// watches any more are dropped.
async fn refresh(pool: &PgPool, watchers: &Watchers, collection: &str) {
    let mut watchers = watchers.lock().await;
    let Some(watcher) = watchers.get(collection) else {
        return;
    };
    if watcher.receiver_count() == 0 {
        watchers.remove(collection);
        return;
    }
    match fetch_collection(pool, collection).await {
        Ok(documents) => {
            watcher.send_replace(documents);
        }
        Err(e) => warn!("Failed to refresh {}: {}", collection, e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    data: Json<Value>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            data: self.data.0,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(collection: &str, id: &str) -> PortError {
    PortError::NotFound(format!("Document {}/{}", collection, id))
}

async fn fetch_collection(pool: &PgPool, collection: &str) -> PortResult<Vec<Document>> {
    let records = sqlx::query_as::<_, DocumentRecord>(
        "SELECT id, data FROM documents WHERE collection_path = $1 ORDER BY created_at, id",
    )
    .bind(collection)
    .fetch_all(pool)
    .await
    .map_err(unexpected)?;

    Ok(records.into_iter().map(DocumentRecord::to_domain).collect())
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, data FROM documents WHERE collection_path = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| not_found(collection, id))?;

        Ok(record.to_domain())
    }

    async fn query(&self, collection: &str) -> PortResult<Vec<Document>> {
        fetch_collection(&self.pool, collection).await
    }

    async fn create(&self, collection: &str, data: Value) -> PortResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection_path, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(data))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> PortResult<()> {
        if !partial.is_object() {
            return Err(PortError::Unexpected(
                "partial update must be a JSON object".to_string(),
            ));
        }

        // `||` on two JSONB objects replaces top-level keys and keeps the rest.
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = now() \
             WHERE collection_path = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(partial))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> PortResult<Subscription> {
        // Listen before reading so no change between the two is missed. The
        // watcher lock is held across the initial read, so a notification in
        // between waits and refreshes the new channel.
        self.ensure_listening().await?;

        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, watcher| watcher.receiver_count() > 0);
        let receiver = match watchers.get(collection) {
            Some(watcher) => watcher.subscribe(),
            None => {
                let initial = fetch_collection(&self.pool, collection).await?;
                let (watcher, receiver) = watch::channel(initial);
                watchers.insert(collection.to_string(), watcher);
                receiver
            }
        };
        debug!("Subscribed to {}", collection);

        Ok(Subscription::new(receiver, CancellationToken::new()))
    }
}
