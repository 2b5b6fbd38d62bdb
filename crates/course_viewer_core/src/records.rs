//! crates/course_viewer_core/src/records.rs
//!
//! The "impure" document shapes as they sit in the document store, and their
//! conversions to and from the domain types.

use crate::domain::{
    Chapter, Comment, Course, NewCourse, PlaybackPosition, ProgressRecord, ReactionKind, Reply,
    Role, Video,
};
use crate::error::ViewerResult;
use crate::ports::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::warn;

fn role_or_student<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(Role::parse_or_student(raw.as_deref()))
}

fn clamp_counter(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

//=========================================================================================
// Courses
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct CourseRecord {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "imageURL", alias = "image", default, skip_serializing_if = "Option::is_none")]
    image_ref: Option<String>,
    #[serde(default)]
    chapters: Vec<ChapterRecord>,
}

#[derive(Serialize, Deserialize)]
struct ChapterRecord {
    #[serde(rename = "chapterTitle", alias = "title", default)]
    title: String,
    #[serde(default)]
    videos: Vec<VideoRecord>,
}

/// Older course documents hold bare URLs instead of video objects.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VideoRecord {
    Full {
        #[serde(default)]
        title: String,
        #[serde(rename = "videoURL")]
        media_ref: String,
    },
    Url(String),
}

impl CourseRecord {
    fn to_domain(self, id: String) -> Course {
        Course {
            id,
            title: self.title,
            description: self.description,
            image_ref: self.image_ref,
            chapters: self.chapters.into_iter().map(ChapterRecord::to_domain).collect(),
        }
    }

    fn from_new(course: &NewCourse) -> Self {
        Self {
            title: course.title.trim().to_string(),
            description: course.description.clone(),
            image_ref: course.image_ref.clone(),
            chapters: course
                .chapters
                .iter()
                .map(|chapter| ChapterRecord {
                    title: chapter.title.clone(),
                    videos: chapter
                        .videos
                        .iter()
                        .map(|video| VideoRecord::Full {
                            title: video.title.clone(),
                            media_ref: video.media_ref.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            title: self.title,
            videos: self
                .videos
                .into_iter()
                .map(|video| match video {
                    VideoRecord::Full { title, media_ref } => Video { title, media_ref },
                    VideoRecord::Url(media_ref) => Video {
                        title: String::new(),
                        media_ref,
                    },
                })
                .collect(),
        }
    }
}

pub(crate) fn course_from_document(doc: Document) -> ViewerResult<Course> {
    let record: CourseRecord = serde_json::from_value(doc.data)?;
    Ok(record.to_domain(doc.id))
}

pub(crate) fn course_to_value(course: &NewCourse) -> ViewerResult<Value> {
    Ok(serde_json::to_value(CourseRecord::from_new(course))?)
}

//=========================================================================================
// Comments
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentRecord {
    text: String,
    #[serde(default)]
    author: String,
    #[serde(default, deserialize_with = "role_or_student")]
    author_role: Role,
    #[serde(default)]
    created_at: DateTime<Utc>,
    #[serde(default)]
    likes: i64,
    #[serde(default)]
    dislikes: i64,
    #[serde(default)]
    reacted_users: HashMap<String, Option<ReactionKind>>,
    #[serde(default)]
    replies: Vec<ReplyRecord>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRecord {
    text: String,
    #[serde(default)]
    author: String,
    #[serde(default, deserialize_with = "role_or_student")]
    author_role: Role,
    #[serde(default)]
    created_at: DateTime<Utc>,
}

impl CommentRecord {
    fn to_domain(self, id: String) -> Comment {
        Comment {
            id,
            text: self.text,
            author: self.author,
            author_role: self.author_role,
            created_at: self.created_at,
            likes: clamp_counter(self.likes),
            dislikes: clamp_counter(self.dislikes),
            reacted_users: self
                .reacted_users
                .into_iter()
                .filter_map(|(user, reaction)| reaction.map(|kind| (user, kind)))
                .collect(),
            replies: self.replies.into_iter().map(ReplyRecord::to_domain).collect(),
        }
    }
}

impl ReplyRecord {
    fn to_domain(self) -> Reply {
        Reply {
            text: self.text,
            author: self.author,
            author_role: self.author_role,
            created_at: self.created_at,
        }
    }

    fn from_domain(reply: &Reply) -> Self {
        Self {
            text: reply.text.clone(),
            author: reply.author.clone(),
            author_role: reply.author_role,
            created_at: reply.created_at,
        }
    }
}

pub(crate) fn comment_from_document(doc: Document) -> ViewerResult<Comment> {
    let record: CommentRecord = serde_json::from_value(doc.data)?;
    Ok(record.to_domain(doc.id))
}

/// The body of a freshly posted comment.
pub(crate) fn new_comment_value(
    text: &str,
    author: &str,
    role: Role,
    created_at: DateTime<Utc>,
) -> ViewerResult<Value> {
    let record = CommentRecord {
        text: text.to_string(),
        author: author.to_string(),
        author_role: role,
        created_at,
        likes: 0,
        dislikes: 0,
        reacted_users: HashMap::new(),
        replies: Vec::new(),
    };
    Ok(serde_json::to_value(record)?)
}

/// The partial update replacing a comment's whole reply list.
pub(crate) fn replies_update(replies: &[Reply]) -> ViewerResult<Value> {
    let records: Vec<ReplyRecord> = replies.iter().map(ReplyRecord::from_domain).collect();
    Ok(json!({ "replies": serde_json::to_value(records)? }))
}

/// The partial update carrying a comment's counters and reaction map.
pub(crate) fn reactions_update(comment: &Comment) -> ViewerResult<Value> {
    Ok(json!({
        "likes": comment.likes,
        "dislikes": comment.dislikes,
        "reactedUsers": serde_json::to_value(&comment.reacted_users)?,
    }))
}

//=========================================================================================
// Progress
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressDocument {
    course_id: String,
    #[serde(default)]
    completed_videos: Vec<String>,
}

impl ProgressDocument {
    fn to_domain(self, user_id: &str) -> ProgressRecord {
        let mut record = ProgressRecord::empty(user_id, self.course_id);
        for token in self.completed_videos {
            match PlaybackPosition::from_token(&token) {
                Some(position) => {
                    record.completed_videos.insert(position);
                }
                None => warn!("Ignoring malformed progress token '{}'", token),
            }
        }
        record
    }
}

/// The course a progress document belongs to, if it is a progress document at all.
pub(crate) fn progress_course_id(doc: &Document) -> Option<&str> {
    doc.data.get("courseId").and_then(Value::as_str)
}

pub(crate) fn progress_from_document(user_id: &str, doc: Document) -> ViewerResult<ProgressRecord> {
    let record: ProgressDocument = serde_json::from_value(doc.data)?;
    Ok(record.to_domain(user_id))
}

pub(crate) fn progress_to_value(record: &ProgressRecord) -> ViewerResult<Value> {
    Ok(serde_json::to_value(ProgressDocument {
        course_id: record.course_id.clone(),
        completed_videos: record.tokens(),
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_documents_accept_legacy_field_names() {
        let doc = Document {
            id: "c1".into(),
            data: json!({
                "title": "Rust",
                "image": "https://cdn/img.png",
                "chapters": [
                    { "chapterTitle": "Basics", "videos": [{ "title": "Intro", "videoURL": "https://cdn/v1.mp4" }] },
                    { "title": "Ownership", "videos": ["https://cdn/v2.mp4"] }
                ]
            }),
        };

        let course = course_from_document(doc).unwrap();
        assert_eq!(course.image_ref.as_deref(), Some("https://cdn/img.png"));
        assert_eq!(course.chapters[0].title, "Basics");
        assert_eq!(course.chapters[1].title, "Ownership");
        assert_eq!(course.chapters[1].videos[0].media_ref, "https://cdn/v2.mp4");
        assert_eq!(course.description, "");
    }

    #[test]
    fn comment_documents_decode_null_reactions_as_none() {
        let doc = Document {
            id: "k".into(),
            data: json!({
                "text": "hi",
                "author": "ann",
                "authorRole": "admin",
                "createdAt": "2024-03-01T10:00:00Z",
                "likes": 1,
                "dislikes": -2,
                "reactedUsers": { "u1": "likes", "u2": null },
                "replies": []
            }),
        };

        let comment = comment_from_document(doc).unwrap();
        assert_eq!(comment.author_role, Role::Student);
        assert_eq!(comment.dislikes, 0);
        assert_eq!(comment.reacted_users.len(), 1);
        assert_eq!(comment.reacted_users.get("u1"), Some(&ReactionKind::Like));
    }

    #[test]
    fn progress_documents_skip_malformed_tokens() {
        let doc = Document {
            id: "p".into(),
            data: json!({ "courseId": "c1", "completedVideos": ["0_0", "0_0", "bogus", "1_2"] }),
        };
        assert_eq!(progress_course_id(&doc), Some("c1"));

        let record = progress_from_document("u1", doc).unwrap();
        assert_eq!(record.completed_videos.len(), 2);
        assert_eq!(record.tokens(), vec!["0_0".to_string(), "1_2".to_string()]);
    }
}
