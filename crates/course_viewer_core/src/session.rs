//! crates/course_viewer_core/src/session.rs
//!
//! A learner's viewing session over one course.
//!
//! The session owns the cursor and performs the store calls its intents ask
//! for. It keeps at most one live comment feed: whenever the cursor moves,
//! the old feed is cancelled before the feed for the new video is opened.

use crate::catalog::CourseCatalog;
use crate::cursor::{CursorStep, PlaybackCursor, PlaybackEnded};
use crate::domain::{
    Comment, Course, Identity, PlaybackPosition, ProgressRecord, ProgressSummary, ReactionKind,
    ReactionTally, Reply, ScopedKey, Video,
};
use crate::engagement::{CommentFeed, EngagementStore};
use crate::error::{ViewerError, ViewerResult};
use crate::library::CourseLibrary;
use crate::ports::DocumentStore;
use crate::progress::ProgressRecorder;
use std::sync::Arc;
use tracing::{info, warn};

/// The shared services a session is built from. Cheap to clone.
#[derive(Clone)]
pub struct ViewerServices {
    pub library: CourseLibrary,
    pub engagement: EngagementStore,
    pub progress: Arc<ProgressRecorder>,
}

impl ViewerServices {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            library: CourseLibrary::new(documents.clone()),
            engagement: EngagementStore::new(documents.clone()),
            progress: Arc::new(ProgressRecorder::new(documents)),
        }
    }
}

pub struct ViewerSession {
    identity: Identity,
    cursor: PlaybackCursor,
    engagement: EngagementStore,
    progress: Arc<ProgressRecorder>,
    feed: Option<CommentFeed>,
}

impl ViewerSession {
    /// Loads the course, places the cursor and opens the comment feed of the
    /// starting video.
    pub async fn open(
        services: &ViewerServices,
        identity: Identity,
        course_id: &str,
        start: Option<PlaybackPosition>,
    ) -> ViewerResult<Self> {
        let course = services.library.load_course(course_id).await?;
        let cursor = PlaybackCursor::new(CourseCatalog::new(course), start)?;

        let mut session = Self {
            identity,
            cursor,
            engagement: services.engagement.clone(),
            progress: services.progress.clone(),
            feed: None,
        };
        session.resubscribe().await?;

        info!(
            "Viewing session opened for {} on course {} at {}",
            session.identity.user_id,
            course_id,
            session.position()
        );
        Ok(session)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn course(&self) -> &Course {
        self.cursor.catalog().course()
    }

    pub fn position(&self) -> PlaybackPosition {
        self.cursor.position()
    }

    pub fn current_video(&self) -> &Video {
        self.cursor.current_video()
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    /// The scope of the video under the cursor right now.
    pub fn current_key(&self) -> ScopedKey {
        ScopedKey::new(self.course().id.clone(), self.position())
    }

    pub async fn advance(&mut self) -> ViewerResult<CursorStep> {
        let step = self.cursor.advance();
        self.follow(step).await?;
        Ok(step)
    }

    pub async fn retreat(&mut self) -> ViewerResult<CursorStep> {
        let step = self.cursor.retreat();
        self.follow(step).await?;
        Ok(step)
    }

    pub async fn seek(&mut self, target: PlaybackPosition) -> ViewerResult<CursorStep> {
        let step = self.cursor.seek(target)?;
        self.follow(step).await?;
        Ok(step)
    }

    /// Records the finished video, then moves on. A failed progress write is
    /// returned after the cursor has already moved; nothing is rolled back.
    pub async fn playback_ended(&mut self) -> ViewerResult<PlaybackEnded> {
        let ended = self.cursor.on_playback_ended();
        let recorded = self
            .progress
            .mark_complete(&self.identity.user_id, &self.course().id, ended.completed)
            .await;
        if let Err(e) = &recorded {
            warn!(
                "Could not record completion of {} for {}: {}",
                ended.completed, self.identity.user_id, e
            );
        }
        self.follow(ended.step).await?;
        recorded?;
        Ok(ended)
    }

    pub async fn post_comment(&self, text: &str) -> ViewerResult<String> {
        let key = self.current_key();
        self.engagement
            .post_comment(&key, text, &self.identity.display_name, self.identity.role)
            .await
    }

    pub async fn post_reply(&self, comment_id: &str, text: &str) -> ViewerResult<Reply> {
        let key = self.current_key();
        self.engagement
            .post_reply(
                &key,
                comment_id,
                text,
                &self.identity.display_name,
                self.identity.role,
            )
            .await
    }

    pub async fn react(&self, comment_id: &str, kind: ReactionKind) -> ViewerResult<ReactionTally> {
        let key = self.current_key();
        self.engagement
            .react(&key, comment_id, &self.identity.user_id, kind)
            .await
    }

    pub async fn is_complete(&self, position: PlaybackPosition) -> ViewerResult<bool> {
        self.progress
            .is_complete(&self.identity.user_id, &self.course().id, position)
            .await
    }

    /// Everything the user has completed in this course.
    pub async fn progress_record(&self) -> ViewerResult<ProgressRecord> {
        self.progress
            .record(&self.identity.user_id, &self.course().id)
            .await
    }

    pub async fn progress_summary(&self) -> ViewerResult<ProgressSummary> {
        self.progress
            .summary(&self.identity.user_id, self.cursor.catalog())
            .await
    }

    /// Waits for the next comment snapshot of the current video.
    ///
    /// Pends forever while there is no feed, so it can sit in a `select!`
    /// next to other event sources. A feed that ends on its own is reopened
    /// and reported as `StoreUnavailable`; the reopened feed starts over with
    /// a full snapshot.
    pub async fn next_comments(&mut self) -> ViewerResult<(ScopedKey, Vec<Comment>)> {
        let Some(feed) = self.feed.as_mut() else {
            return std::future::pending().await;
        };
        if let Some(comments) = feed.next().await {
            return Ok((feed.key().clone(), comments));
        }

        let key = feed.key().clone();
        warn!("Live comments for {:?} ended; reopening", key);
        self.resubscribe().await?;
        Err(ViewerError::StoreUnavailable(format!(
            "live comments for {} were interrupted",
            key.position()
        )))
    }

    /// The key of the live feed, if one is open.
    pub fn subscribed_key(&self) -> Option<&ScopedKey> {
        self.feed.as_ref().map(CommentFeed::key)
    }

    /// Cancels the live feed.
    pub fn close(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.cancel();
        }
    }

    async fn follow(&mut self, step: CursorStep) -> ViewerResult<()> {
        if step.moved() {
            self.resubscribe().await?;
        }
        Ok(())
    }

    async fn resubscribe(&mut self) -> ViewerResult<()> {
        self.close();
        let key = self.current_key();
        self.feed = Some(self.engagement.subscribe(&key).await?);
        Ok(())
    }
}
