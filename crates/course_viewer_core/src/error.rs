//! crates/course_viewer_core/src/error.rs
//!
//! The error type returned by every viewer operation.

use crate::domain::PlaybackPosition;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// A referenced course, video or comment does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A seek or start position outside the loaded course.
    #[error("Invalid position {0} for the loaded course")]
    InvalidPosition(PlaybackPosition),

    /// Blank comment, reply or title text. Raised before any store call.
    #[error("Content must not be blank")]
    EmptyContent,

    /// The document or object store rejected the call.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<PortError> for ViewerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ViewerError::NotFound(what),
            // Only the object store rejects input or existing paths.
            PortError::AlreadyExists(reason)
            | PortError::InvalidInput(reason)
            | PortError::Unexpected(reason) => ViewerError::StoreUnavailable(reason),
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::StoreUnavailable(format!("malformed document: {}", err))
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
