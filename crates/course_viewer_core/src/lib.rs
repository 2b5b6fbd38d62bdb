pub mod catalog;
pub mod cursor;
pub mod domain;
pub mod engagement;
pub mod error;
pub mod library;
pub mod memory;
pub mod ports;
pub mod progress;
mod records;
pub mod session;

pub use catalog::CourseCatalog;
pub use cursor::{CursorStep, PlaybackCursor, PlaybackEnded};
pub use domain::{
    Chapter, Comment, Course, CourseSummary, Identity, NewCourse, PlaybackPosition,
    ProgressRecord, ProgressSummary, ReactionKind, ReactionTally, Reply, Role, ScopedKey, Video,
};
pub use engagement::{CommentFeed, EngagementStore};
pub use error::{ViewerError, ViewerResult};
pub use library::CourseLibrary;
pub use memory::InMemoryDocumentStore;
pub use ports::{
    Document, DocumentStore, ObjectStore, PortError, PortResult, Subscription, UploadProgress,
};
pub use progress::ProgressRecorder;
pub use session::{ViewerServices, ViewerSession};
