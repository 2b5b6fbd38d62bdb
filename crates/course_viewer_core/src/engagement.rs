//! crates/course_viewer_core/src/engagement.rs
//!
//! Comments, replies and like/dislike reactions attached to one video.
//!
//! The toggle and validation rules are plain functions over domain values;
//! [`EngagementStore`] is the effect layer that reads and writes them through
//! the document store. Every store operation takes its [`ScopedKey`]
//! explicitly so that a cursor moving mid-call cannot redirect the write.

use crate::domain::{Comment, ReactionKind, ReactionTally, Reply, Role, ScopedKey};
use crate::error::{ViewerError, ViewerResult};
use crate::ports::{DocumentStore, Subscription};
use crate::records;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

//=========================================================================================
// Pure Rules
//=========================================================================================

/// Returns the trimmed text, or `EmptyContent` if nothing is left.
pub fn validate_text(text: &str) -> ViewerResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ViewerError::EmptyContent);
    }
    Ok(trimmed)
}

/// Applies one reaction toggle by `user_id` to `comment`.
///
/// Same kind as before clears the reaction, the opposite kind switches it,
/// and no prior reaction adds one. Afterwards each counter equals the number
/// of users holding that reaction, provided it did before.
pub fn toggle_reaction(comment: &mut Comment, user_id: &str, kind: ReactionKind) -> ReactionTally {
    let previous = comment.reacted_users.get(user_id).copied();

    match previous {
        Some(prior) if prior == kind => {
            decrement(comment, kind);
            comment.reacted_users.remove(user_id);
        }
        Some(prior) => {
            decrement(comment, prior);
            increment(comment, kind);
            comment.reacted_users.insert(user_id.to_string(), kind);
        }
        None => {
            increment(comment, kind);
            comment.reacted_users.insert(user_id.to_string(), kind);
        }
    }

    ReactionTally {
        likes: comment.likes,
        dislikes: comment.dislikes,
        user_reaction: comment.reacted_users.get(user_id).copied(),
    }
}

fn counter(comment: &mut Comment, kind: ReactionKind) -> &mut u32 {
    match kind {
        ReactionKind::Like => &mut comment.likes,
        ReactionKind::Dislike => &mut comment.dislikes,
    }
}

fn increment(comment: &mut Comment, kind: ReactionKind) {
    let count = counter(comment, kind);
    *count = count.saturating_add(1);
}

fn decrement(comment: &mut Comment, kind: ReactionKind) {
    let count = counter(comment, kind);
    *count = count.saturating_sub(1);
}

/// Orders a snapshot oldest first. Ties fall back to the document id.
pub fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

fn decode_snapshot(documents: Vec<crate::ports::Document>) -> Vec<Comment> {
    let mut comments: Vec<Comment> = documents
        .into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match records::comment_from_document(doc) {
                Ok(comment) => Some(comment),
                Err(e) => {
                    warn!("Skipping malformed comment {}: {}", id, e);
                    None
                }
            }
        })
        .collect();
    sort_comments(&mut comments);
    comments
}

//=========================================================================================
// Live Feed
//=========================================================================================

/// A live feed of one video's comments. Every item is the full, ordered
/// collection and replaces whatever the consumer held before.
#[derive(Debug)]
pub struct CommentFeed {
    key: ScopedKey,
    subscription: Subscription,
}

impl CommentFeed {
    pub fn key(&self) -> &ScopedKey {
        &self.key
    }

    /// The next snapshot, or `None` once the feed is cancelled.
    pub async fn next(&mut self) -> Option<Vec<Comment>> {
        let documents = self.subscription.next().await?;
        Some(decode_snapshot(documents))
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }
}

//=========================================================================================
// Effect Layer
//=========================================================================================

#[derive(Clone)]
pub struct EngagementStore {
    documents: Arc<dyn DocumentStore>,
}

impl EngagementStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Posts a top-level comment and returns its id.
    pub async fn post_comment(
        &self,
        key: &ScopedKey,
        text: &str,
        author: &str,
        role: Role,
    ) -> ViewerResult<String> {
        let text = validate_text(text)?;
        let body = records::new_comment_value(text, author, role, Utc::now())?;
        let id = self.documents.create(&key.collection_path(), body).await?;
        info!("Comment {} posted by {} on {}", id, author, key.collection_path());
        Ok(id)
    }

    /// Appends a reply to an existing comment.
    pub async fn post_reply(
        &self,
        key: &ScopedKey,
        comment_id: &str,
        text: &str,
        author: &str,
        role: Role,
    ) -> ViewerResult<Reply> {
        let text = validate_text(text)?;
        let path = key.collection_path();
        let mut comment = self.load_comment(&path, comment_id).await?;

        let reply = Reply {
            text: text.to_string(),
            author: author.to_string(),
            author_role: role,
            created_at: Utc::now(),
        };
        comment.replies.push(reply.clone());

        self.documents
            .update(&path, comment_id, records::replies_update(&comment.replies)?)
            .await?;
        debug!("Reply by {} appended to comment {}", author, comment_id);
        Ok(reply)
    }

    /// Toggles `user_id`'s reaction on a comment.
    pub async fn react(
        &self,
        key: &ScopedKey,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> ViewerResult<ReactionTally> {
        let path = key.collection_path();
        let mut comment = self.load_comment(&path, comment_id).await?;
        let tally = toggle_reaction(&mut comment, user_id, kind);

        self.documents
            .update(&path, comment_id, records::reactions_update(&comment)?)
            .await?;
        debug!(
            "Reaction {:?} by {} on comment {} -> likes={} dislikes={}",
            kind, user_id, comment_id, tally.likes, tally.dislikes
        );
        Ok(tally)
    }

    /// A one-shot read of the current comments, oldest first.
    pub async fn comments(&self, key: &ScopedKey) -> ViewerResult<Vec<Comment>> {
        let documents = self.documents.query(&key.collection_path()).await?;
        Ok(decode_snapshot(documents))
    }

    /// Opens a live feed of the comments under `key`.
    pub async fn subscribe(&self, key: &ScopedKey) -> ViewerResult<CommentFeed> {
        let subscription = self.documents.subscribe(&key.collection_path()).await?;
        debug!("Subscribed to {}", key.collection_path());
        Ok(CommentFeed {
            key: key.clone(),
            subscription,
        })
    }

    async fn load_comment(&self, path: &str, comment_id: &str) -> ViewerResult<Comment> {
        let doc = self.documents.get(path, comment_id).await?;
        records::comment_from_document(doc)
    }
}
