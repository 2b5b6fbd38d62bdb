//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for a course viewing session. Every frame is a JSON text message tagged by `type`.

use course_viewer_core::{
    Comment, CursorStep, PlaybackPosition, ProgressSummary, ReactionKind, ReactionTally, Reply,
    Video,
};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the viewing session. This must be the first message sent on the connection.
    /// Without a position the session starts at the first video of the course.
    Init {
        course_id: String,
        #[serde(default)]
        chapter_index: Option<usize>,
        #[serde(default)]
        video_index: Option<usize>,
    },

    /// Moves to the next video.
    Advance,

    /// Moves to the previous video.
    Retreat,

    /// Jumps to a specific video.
    Seek {
        chapter_index: usize,
        video_index: usize,
    },

    /// The current video finished playing.
    PlaybackEnded,

    PostComment { text: String },

    PostReply { comment_id: String, text: String },

    /// Toggles the user's like or dislike on a comment of the current video.
    React {
        comment_id: String,
        kind: ReactionKind,
    },

    /// Asks for the completion summary of the course.
    GetProgress,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is open and which video it starts on.
    SessionInitialized {
        course_id: String,
        course_title: String,
        position: PlaybackPosition,
        video: Video,
    },

    /// The cursor moved; the client should load the new video.
    PositionChanged {
        from: PlaybackPosition,
        to: PlaybackPosition,
        video: Video,
    },

    /// Where the cursor is now. Sent when a request left it in place or
    /// when the client needs to resynchronise after a failure.
    Position {
        position: PlaybackPosition,
        video: Video,
    },

    /// The last video of the course ended.
    CourseComplete { at: PlaybackPosition },

    /// A full replacement of the comment list for the video at `position`.
    Comments {
        position: PlaybackPosition,
        comments: Vec<Comment>,
    },

    CommentPosted { comment_id: String },

    ReplyPosted { comment_id: String, reply: Reply },

    ReactionApplied {
        comment_id: String,
        tally: ReactionTally,
    },

    Progress {
        completed_videos: Vec<PlaybackPosition>,
        summary: ProgressSummary,
    },

    /// Reports a failed request. The session stays open.
    Error { message: String },
}

impl ServerMessage {
    /// The message describing a cursor step.
    pub fn from_step(step: CursorStep, video: &Video) -> Self {
        match step {
            CursorStep::Moved { from, to } => ServerMessage::PositionChanged {
                from,
                to,
                video: video.clone(),
            },
            CursorStep::Stayed { at } => ServerMessage::Position {
                position: at,
                video: video.clone(),
            },
            CursorStep::CourseComplete { at } => ServerMessage::CourseComplete { at },
        }
    }
}
