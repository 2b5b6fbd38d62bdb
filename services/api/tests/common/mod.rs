//! Shared helpers for the API integration tests.
#![allow(dead_code)]

use api_lib::adapters::LocalObjectStore;
use api_lib::config::Config;
use api_lib::web::{api_router, app, AppState};
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use course_viewer_core::InMemoryDocumentStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryDocumentStore>,
    pub media_dir: TempDir,
}

/// The API routes alone.
pub async fn create_test_app() -> TestApp {
    build(api_router)
}

/// The whole application as the `api` binary serves it.
pub async fn create_served_app() -> TestApp {
    build(|state| app(state).unwrap())
}

fn build(router: impl FnOnce(Arc<AppState>) -> Router) -> TestApp {
    let media_dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_lookup(|_| None).unwrap();
    config.media_root = media_dir.path().to_path_buf();

    let store = Arc::new(InMemoryDocumentStore::new());
    let objects = Arc::new(LocalObjectStore::new(
        media_dir.path(),
        config.media_base_url.clone(),
    ));
    let state = Arc::new(AppState::new(store.clone(), objects, Arc::new(config)));

    TestApp {
        router: router(state),
        store,
        media_dir,
    }
}

/// A course with two chapters of two and one videos.
pub async fn seed_course(store: &InMemoryDocumentStore, id: &str) {
    store
        .put(
            "courses",
            id,
            json!({
                "title": "Rust 101",
                "description": "Ownership from the ground up",
                "chapters": [
                    {
                        "chapterTitle": "Basics",
                        "videos": [
                            { "title": "Hello", "videoURL": "https://cdn/hello.mp4" },
                            { "title": "Bindings", "videoURL": "https://cdn/bindings.mp4" }
                        ]
                    },
                    {
                        "chapterTitle": "Ownership",
                        "videos": ["https://cdn/moves.mp4"]
                    }
                ]
            }),
        )
        .await;
}

pub fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder
            .header("x-user-id", user)
            .header("x-user-name", format!("{} name", user));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
