//! crates/course_viewer_core/src/cursor.rs
//!
//! The playback cursor: where a learner is inside a course and how they move.
//!
//! Every operation here is a pure state transition. Nothing in this module
//! talks to a store; callers act on the returned [`CursorStep`] and
//! [`PlaybackEnded`] values.

use crate::catalog::CourseCatalog;
use crate::domain::{PlaybackPosition, Video};
use crate::error::{ViewerError, ViewerResult};
use serde::Serialize;

/// The outcome of one cursor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorStep {
    Moved {
        from: PlaybackPosition,
        to: PlaybackPosition,
    },
    /// Nothing to move to; the cursor stays put.
    Stayed { at: PlaybackPosition },
    /// `advance` from the last video of the course.
    CourseComplete { at: PlaybackPosition },
}

impl CursorStep {
    /// The position after the step.
    pub fn position(&self) -> PlaybackPosition {
        match *self {
            CursorStep::Moved { to, .. } => to,
            CursorStep::Stayed { at } | CursorStep::CourseComplete { at } => at,
        }
    }

    pub fn moved(&self) -> bool {
        matches!(self, CursorStep::Moved { .. })
    }

    pub fn is_course_complete(&self) -> bool {
        matches!(self, CursorStep::CourseComplete { .. })
    }
}

/// The intent produced when a video finishes playing: record `completed`,
/// then follow `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackEnded {
    pub completed: PlaybackPosition,
    pub step: CursorStep,
}

#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    catalog: CourseCatalog,
    position: PlaybackPosition,
}

impl PlaybackCursor {
    /// Binds a cursor to a course. Without a `start`, the cursor opens on the
    /// first video of the course.
    pub fn new(catalog: CourseCatalog, start: Option<PlaybackPosition>) -> ViewerResult<Self> {
        let position = match start {
            Some(position) if catalog.contains(position) => position,
            Some(position) => return Err(ViewerError::InvalidPosition(position)),
            None => catalog.first_position().ok_or_else(|| {
                ViewerError::NotFound(format!("Videos in course {}", catalog.course_id()))
            })?,
        };
        Ok(Self { catalog, position })
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    pub fn current_video(&self) -> &Video {
        let PlaybackPosition {
            chapter_index,
            video_index,
        } = self.position;
        &self.catalog.course().chapters[chapter_index].videos[video_index]
    }

    fn next_position(&self) -> Option<PlaybackPosition> {
        let PlaybackPosition {
            chapter_index,
            video_index,
        } = self.position;
        let in_chapter = self.catalog.video_count(chapter_index).unwrap_or(0);
        if video_index + 1 < in_chapter {
            return Some(PlaybackPosition::new(chapter_index, video_index + 1));
        }
        self.catalog.first_video_from(chapter_index + 1)
    }

    fn previous_position(&self) -> Option<PlaybackPosition> {
        let PlaybackPosition {
            chapter_index,
            video_index,
        } = self.position;
        if video_index > 0 {
            return Some(PlaybackPosition::new(chapter_index, video_index - 1));
        }
        self.catalog.last_video_before(chapter_index)
    }

    pub fn has_previous(&self) -> bool {
        self.previous_position().is_some()
    }

    /// Next video in the chapter, else the first video of the next non-empty
    /// chapter, else `CourseComplete` without moving.
    pub fn advance(&mut self) -> CursorStep {
        let from = self.position;
        match self.next_position() {
            Some(to) => {
                self.position = to;
                CursorStep::Moved { from, to }
            }
            None => CursorStep::CourseComplete { at: from },
        }
    }

    /// Previous video in the chapter, else the last video of the previous
    /// non-empty chapter, else stays on the first video.
    pub fn retreat(&mut self) -> CursorStep {
        let from = self.position;
        match self.previous_position() {
            Some(to) => {
                self.position = to;
                CursorStep::Moved { from, to }
            }
            None => CursorStep::Stayed { at: from },
        }
    }

    pub fn seek(&mut self, target: PlaybackPosition) -> ViewerResult<CursorStep> {
        if !self.catalog.contains(target) {
            return Err(ViewerError::InvalidPosition(target));
        }
        let from = self.position;
        if from == target {
            return Ok(CursorStep::Stayed { at: from });
        }
        self.position = target;
        Ok(CursorStep::Moved { from, to: target })
    }

    /// Advances and reports the position that was just vacated as complete.
    pub fn on_playback_ended(&mut self) -> PlaybackEnded {
        let completed = self.position;
        let step = self.advance();
        PlaybackEnded { completed, step }
    }
}
