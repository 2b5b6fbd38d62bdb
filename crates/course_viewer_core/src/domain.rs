//! crates/course_viewer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format;
//! the document shapes live in `records.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

//=========================================================================================
// Course Tree
//=========================================================================================

/// A course as loaded into a viewing session. Never mutated by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_ref: Option<String>,
    pub chapters: Vec<Chapter>,
}

/// An ordered grouping of videos. Its position in the course is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub videos: Vec<Video>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    /// Opaque object-store URL.
    pub media_ref: String,
}

/// The listing shape of a course, without its chapter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_ref: Option<String>,
    pub chapter_count: usize,
    pub video_count: usize,
}

/// Input for creating a course through the library.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

//=========================================================================================
// Positions and Scoping
//=========================================================================================

/// A (chapter, video) pair inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub chapter_index: usize,
    pub video_index: usize,
}

impl PlaybackPosition {
    pub const fn new(chapter_index: usize, video_index: usize) -> Self {
        Self {
            chapter_index,
            video_index,
        }
    }

    /// The `"{chapter}_{video}"` token used in progress documents.
    pub fn token(&self) -> String {
        format!("{}_{}", self.chapter_index, self.video_index)
    }

    /// Parses a progress token. Returns `None` for anything malformed.
    pub fn from_token(token: &str) -> Option<Self> {
        let (chapter, video) = token.split_once('_')?;
        Some(Self::new(chapter.parse().ok()?, video.parse().ok()?))
    }
}

impl fmt::Display for PlaybackPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.chapter_index, self.video_index)
    }
}

/// The (course, chapter, video) triple that partitions engagement data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedKey {
    pub course_id: String,
    pub chapter_index: usize,
    pub video_index: usize,
}

impl ScopedKey {
    pub fn new(course_id: impl Into<String>, position: PlaybackPosition) -> Self {
        Self {
            course_id: course_id.into(),
            chapter_index: position.chapter_index,
            video_index: position.video_index,
        }
    }

    pub fn position(&self) -> PlaybackPosition {
        PlaybackPosition::new(self.chapter_index, self.video_index)
    }

    /// The document-store collection holding this video's comments.
    pub fn collection_path(&self) -> String {
        format!(
            "courses/{}/comments/{}/{}",
            self.course_id, self.chapter_index, self.video_index
        )
    }
}

//=========================================================================================
// Identity
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
}

impl Role {
    /// Parses a role, falling back to `Student` for anything unrecognised.
    pub fn parse_or_student(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("teacher") => Role::Teacher,
            _ => Role::Student,
        }
    }
}

/// The acting user of a session. Passed explicitly, never read from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

//=========================================================================================
// Engagement
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    #[serde(alias = "likes")]
    Like,
    #[serde(alias = "dislikes")]
    Dislike,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author: String,
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
    pub dislikes: u32,
    /// Users with no entry have no reaction.
    pub reacted_users: HashMap<String, ReactionKind>,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub author: String,
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
}

/// Counters and the acting user's reaction after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionTally {
    pub likes: u32,
    pub dislikes: u32,
    pub user_reaction: Option<ReactionKind>,
}

//=========================================================================================
// Progress
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub course_id: String,
    pub completed_videos: BTreeSet<PlaybackPosition>,
}

impl ProgressRecord {
    pub fn empty(user_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            course_id: course_id.into(),
            completed_videos: BTreeSet::new(),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.completed_videos.iter().map(PlaybackPosition::token).collect()
    }
}

/// How far a user is through one course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
}
