//! crates/course_viewer_core/src/library.rs
//!
//! Listing, loading and creating courses in the `courses` collection.

use crate::catalog::summarize;
use crate::domain::{Course, CourseSummary, NewCourse};
use crate::engagement::validate_text;
use crate::error::ViewerResult;
use crate::ports::DocumentStore;
use crate::records;
use std::sync::Arc;
use tracing::{info, warn};

pub const COURSES: &str = "courses";

#[derive(Clone)]
pub struct CourseLibrary {
    documents: Arc<dyn DocumentStore>,
}

impl CourseLibrary {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Every readable course, sorted by title. Malformed documents are skipped.
    pub async fn list_courses(&self) -> ViewerResult<Vec<CourseSummary>> {
        let documents = self.documents.query(COURSES).await?;
        let mut summaries: Vec<CourseSummary> = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match records::course_from_document(doc) {
                    Ok(course) => Some(summarize(&course)),
                    Err(e) => {
                        warn!("Skipping unreadable course {}: {}", id, e);
                        None
                    }
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    pub async fn load_course(&self, course_id: &str) -> ViewerResult<Course> {
        let doc = self.documents.get(COURSES, course_id).await?;
        records::course_from_document(doc)
    }

    pub async fn create_course(&self, course: &NewCourse) -> ViewerResult<String> {
        validate_text(&course.title)?;
        let id = self
            .documents
            .create(COURSES, records::course_to_value(course)?)
            .await?;
        info!("Created course {} ('{}')", id, course.title.trim());
        Ok(id)
    }
}
