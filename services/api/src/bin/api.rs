//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::PgDocumentStore, media::LocalObjectStore},
    config::Config,
    error::ApiError,
    web::{app, state::AppState},
};
use course_viewer_core::ports::DocumentStore;
use course_viewer_core::InMemoryDocumentStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Document Store ---
    let documents: Arc<dyn DocumentStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgDocumentStore::new(db_pool);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL is not set; documents are kept in memory and lost on exit.");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    // --- 3. Initialize the Object Store ---
    tokio::fs::create_dir_all(&config.media_root).await?;
    let objects = Arc::new(LocalObjectStore::new(
        config.media_root.clone(),
        config.media_base_url.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(documents, objects, config.clone()));

    // --- 5. Create the Web Router ---
    // Uploaded media is served back from the same process.
    let router = app(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
