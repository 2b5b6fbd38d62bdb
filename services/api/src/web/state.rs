//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use course_viewer_core::ports::{DocumentStore, ObjectStore};
use course_viewer_core::ViewerServices;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Per-connection viewing state lives in the `ViewerSession` owned by each socket task.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub services: ViewerServices,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            services: ViewerServices::new(documents.clone()),
            documents,
            objects,
            config,
        }
    }
}
