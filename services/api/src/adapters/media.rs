//! services/api/src/adapters/media.rs
//!
//! A local-disk implementation of the `ObjectStore` port. Files land under a
//! root directory and are served back by the API under `MEDIA_BASE_URL`.

use async_trait::async_trait;
use bytes::Bytes;
use course_viewer_core::ports::{ObjectStore, PortError, PortResult, UploadProgress};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
    chunk_size: usize,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Overrides how many bytes are written between progress reports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Accepts only relative paths made of plain segments.
fn validate_path(path: &str) -> PortResult<Vec<&str>> {
    let mut segments = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => segments.push(
                segment
                    .to_str()
                    .ok_or_else(|| PortError::InvalidInput(format!("Invalid object path '{}'", path)))?,
            ),
            Component::CurDir => {}
            _ => {
                return Err(PortError::InvalidInput(format!(
                    "Object path '{}' must be relative and stay inside the store",
                    path
                )))
            }
        }
    }
    if segments.is_empty() {
        return Err(PortError::InvalidInput("Object path is empty".to_string()));
    }
    Ok(segments)
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> PortResult<String> {
        let segments = validate_path(path)?;
        let target = segments.iter().fold(self.root.clone(), |acc, s| acc.join(s));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let total_bytes = bytes.len() as u64;
        // Objects are write-once; an existing file is never truncated.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    PortError::AlreadyExists(format!("Object '{}'", segments.join("/")))
                }
                _ => io_error(e),
            })?;
        let mut transferred = 0u64;
        on_progress(UploadProgress {
            bytes_transferred: 0,
            total_bytes,
        });
        for chunk in bytes.chunks(self.chunk_size) {
            file.write_all(chunk).await.map_err(io_error)?;
            transferred += chunk.len() as u64;
            on_progress(UploadProgress {
                bytes_transferred: transferred,
                total_bytes,
            });
        }
        file.flush().await.map_err(io_error)?;

        let url = format!("{}/{}", self.base_url, segments.join("/"));
        info!("Stored {} bytes at {}", total_bytes, url);
        Ok(url)
    }
}
