//! crates/course_viewer_core/src/progress.rs
//!
//! Records which videos each user has finished, per course.
//!
//! Progress documents live under `user_progress/{userId}/courses` and are
//! found by their `courseId` field. Nothing is cached: every call reads the
//! store, so several API instances on one database agree on the record.
//! Writes from this process are serialized, and `mark_complete` re-reads the
//! record under that lock before choosing between `create` and `update`.

use crate::catalog::CourseCatalog;
use crate::domain::{PlaybackPosition, ProgressRecord, ProgressSummary};
use crate::error::ViewerResult;
use crate::ports::DocumentStore;
use crate::records;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct StoredProgress {
    document_id: Option<String>,
    record: ProgressRecord,
}

pub struct ProgressRecorder {
    documents: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

fn collection_for(user_id: &str) -> String {
    format!("user_progress/{}/courses", user_id)
}

impl ProgressRecorder {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            write_lock: Mutex::new(()),
        }
    }

    /// Adds `position` to the user's completed set. Returns `false` when it
    /// was already there, in which case nothing is written.
    pub async fn mark_complete(
        &self,
        user_id: &str,
        course_id: &str,
        position: PlaybackPosition,
    ) -> ViewerResult<bool> {
        let _guard = self.write_lock.lock().await;
        let stored = self.fetch(user_id, course_id).await?;

        if stored.record.completed_videos.contains(&position) {
            debug!(
                "Video {} of course {} already complete for {}",
                position, course_id, user_id
            );
            return Ok(false);
        }

        let mut updated = stored.record;
        updated.completed_videos.insert(position);

        let collection = collection_for(user_id);
        match &stored.document_id {
            Some(id) => {
                self.documents
                    .update(&collection, id, json!({ "completedVideos": updated.tokens() }))
                    .await?;
            }
            None => {
                self.documents
                    .create(&collection, records::progress_to_value(&updated)?)
                    .await?;
            }
        }

        info!(
            "Marked video {} of course {} complete for {}",
            position, course_id, user_id
        );
        Ok(true)
    }

    /// Unknown users and courses simply have nothing completed.
    pub async fn is_complete(
        &self,
        user_id: &str,
        course_id: &str,
        position: PlaybackPosition,
    ) -> ViewerResult<bool> {
        let stored = self.fetch(user_id, course_id).await?;
        Ok(stored.record.completed_videos.contains(&position))
    }

    pub async fn record(&self, user_id: &str, course_id: &str) -> ViewerResult<ProgressRecord> {
        Ok(self.fetch(user_id, course_id).await?.record)
    }

    /// Completion counts against the videos the course has right now.
    /// Tokens for positions the course no longer has are not counted.
    pub async fn summary(
        &self,
        user_id: &str,
        catalog: &CourseCatalog,
    ) -> ViewerResult<ProgressSummary> {
        let record = self.record(user_id, catalog.course_id()).await?;
        let completed = record
            .completed_videos
            .iter()
            .filter(|position| catalog.contains(**position))
            .count();
        let total = catalog.total_videos();
        let fraction = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        Ok(ProgressSummary {
            completed,
            total,
            fraction,
        })
    }

    async fn fetch(&self, user_id: &str, course_id: &str) -> ViewerResult<StoredProgress> {
        let documents = self.documents.query(&collection_for(user_id)).await?;

        let mut found = StoredProgress {
            document_id: None,
            record: ProgressRecord::empty(user_id, course_id),
        };
        for doc in documents {
            if records::progress_course_id(&doc) != Some(course_id) {
                continue;
            }
            let id = doc.id.clone();
            let record = records::progress_from_document(user_id, doc)?;
            match &found.document_id {
                None => found.document_id = Some(id),
                Some(kept) => warn!(
                    "Duplicate progress document {} for {}/{}; merging into {}",
                    id, user_id, course_id, kept
                ),
            }
            found.record.completed_videos.extend(record.completed_videos);
        }
        Ok(found)
    }
}
