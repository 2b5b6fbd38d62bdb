use course_viewer_core::{
    CursorStep, DocumentStore, Identity, InMemoryDocumentStore, PlaybackPosition, ReactionKind,
    Role, ScopedKey, ViewerError, ViewerServices, ViewerSession,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const COURSE: &str = "rust-101";

async fn seeded_store() -> Arc<InMemoryDocumentStore> {
    let store = Arc::new(InMemoryDocumentStore::new());
    store
        .put(
            "courses",
            COURSE,
            json!({
                "title": "Rust 101",
                "description": "Ownership from the ground up",
                "imageURL": "https://cdn/rust.png",
                "chapters": [
                    {
                        "chapterTitle": "Basics",
                        "videos": [
                            { "title": "Hello", "videoURL": "https://cdn/hello.mp4" },
                            { "title": "Bindings", "videoURL": "https://cdn/bindings.mp4" }
                        ]
                    },
                    {
                        "chapterTitle": "Ownership",
                        "videos": [
                            { "title": "Moves", "videoURL": "https://cdn/moves.mp4" },
                            { "title": "Borrows", "videoURL": "https://cdn/borrows.mp4" },
                            { "title": "Lifetimes", "videoURL": "https://cdn/lifetimes.mp4" }
                        ]
                    }
                ]
            }),
        )
        .await;
    store
}

fn learner(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        display_name: format!("{} display", user_id),
        role: Role::Student,
    }
}

async fn open_session(
    store: &Arc<InMemoryDocumentStore>,
    user_id: &str,
    start: Option<PlaybackPosition>,
) -> (ViewerServices, ViewerSession) {
    let services = ViewerServices::new(store.clone());
    let session = ViewerSession::open(&services, learner(user_id), COURSE, start)
        .await
        .unwrap();
    (services, session)
}

fn comments_path(chapter: usize, video: usize) -> String {
    ScopedKey::new(COURSE, PlaybackPosition::new(chapter, video)).collection_path()
}

#[tokio::test]
async fn advancing_from_the_last_video_of_a_chapter_crosses_into_the_next() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", Some(PlaybackPosition::new(0, 1))).await;

    let step = session.advance().await.unwrap();
    assert_eq!(
        step,
        CursorStep::Moved {
            from: PlaybackPosition::new(0, 1),
            to: PlaybackPosition::new(1, 0),
        }
    );
    assert_eq!(session.current_video().title, "Moves");
}

#[tokio::test]
async fn retreating_from_a_chapter_start_lands_on_the_previous_chapter_end() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", Some(PlaybackPosition::new(1, 0))).await;

    session.retreat().await.unwrap();
    assert_eq!(session.position(), PlaybackPosition::new(0, 1));

    session.retreat().await.unwrap();
    let step = session.retreat().await.unwrap();
    assert_eq!(step, CursorStep::Stayed { at: PlaybackPosition::new(0, 0) });
}

#[tokio::test]
async fn opening_at_a_position_outside_the_course_fails() {
    let store = seeded_store().await;
    let services = ViewerServices::new(store.clone());

    let result =
        ViewerSession::open(&services, learner("u1"), COURSE, Some(PlaybackPosition::new(0, 7)))
            .await;
    assert!(matches!(result, Err(ViewerError::InvalidPosition(_))));

    let result = ViewerSession::open(&services, learner("u1"), "missing", None).await;
    assert!(matches!(result, Err(ViewerError::NotFound(_))));
}

#[tokio::test]
async fn exactly_one_feed_is_open_after_any_sequence_of_moves() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", None).await;
    assert_eq!(store.subscriber_count(&comments_path(0, 0)).await, 1);

    session.advance().await.unwrap();
    session.advance().await.unwrap();
    session.retreat().await.unwrap();
    session.seek(PlaybackPosition::new(1, 2)).await.unwrap();

    assert_eq!(store.subscriber_count(&comments_path(0, 0)).await, 0);
    assert_eq!(store.subscriber_count(&comments_path(0, 1)).await, 0);
    assert_eq!(store.subscriber_count(&comments_path(1, 0)).await, 0);
    assert_eq!(store.subscriber_count(&comments_path(1, 2)).await, 1);
    assert_eq!(session.subscribed_key(), Some(&session.current_key()));

    session.close();
    assert_eq!(store.subscriber_count(&comments_path(1, 2)).await, 0);
}

#[tokio::test]
async fn a_rejected_seek_keeps_position_and_feed() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", Some(PlaybackPosition::new(1, 1))).await;

    let result = session.seek(PlaybackPosition::new(3, 0)).await;
    assert!(matches!(result, Err(ViewerError::InvalidPosition(_))));
    assert_eq!(session.position(), PlaybackPosition::new(1, 1));
    assert_eq!(store.subscriber_count(&comments_path(1, 1)).await, 1);
}

#[tokio::test]
async fn playback_ended_records_the_video_that_was_left() {
    let store = seeded_store().await;
    let (services, mut session) =
        open_session(&store, "u1", Some(PlaybackPosition::new(0, 1))).await;

    let ended = session.playback_ended().await.unwrap();
    assert_eq!(ended.completed, PlaybackPosition::new(0, 1));
    assert_eq!(session.position(), PlaybackPosition::new(1, 0));

    assert!(session.is_complete(PlaybackPosition::new(0, 1)).await.unwrap());
    assert!(!session.is_complete(PlaybackPosition::new(1, 0)).await.unwrap());

    let stored = store.query("user_progress/u1/courses").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].data["courseId"], json!(COURSE));
    assert_eq!(stored[0].data["completedVideos"], json!(["0_1"]));

    let summary = services
        .progress
        .summary("u1", session.cursor().catalog())
        .await
        .unwrap();
    assert_eq!((summary.completed, summary.total), (1, 5));
}

#[tokio::test]
async fn finishing_the_last_video_completes_the_course_in_place() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", Some(PlaybackPosition::new(1, 2))).await;

    let ended = session.playback_ended().await.unwrap();
    assert!(ended.step.is_course_complete());
    assert_eq!(session.position(), PlaybackPosition::new(1, 2));
    assert!(session.is_complete(PlaybackPosition::new(1, 2)).await.unwrap());

    let writes = store.write_count();
    session.playback_ended().await.unwrap();
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn progress_survives_a_new_session() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", None).await;
    session.playback_ended().await.unwrap();
    session.playback_ended().await.unwrap();
    drop(session);

    let (_, session) = open_session(&store, "u1", None).await;
    let summary = session.progress_summary().await.unwrap();
    assert_eq!(summary.completed, 2);
    assert!((summary.fraction - 0.4).abs() < f64::EPSILON);

    let (_, other) = open_session(&store, "u2", None).await;
    assert_eq!(other.progress_summary().await.unwrap().completed, 0);
}

#[tokio::test]
async fn blank_comments_are_rejected_without_a_write() {
    let store = seeded_store().await;
    let (_, session) = open_session(&store, "u1", None).await;
    let writes = store.write_count();

    assert!(matches!(session.post_comment("").await, Err(ViewerError::EmptyContent)));
    assert!(matches!(session.post_comment("   ").await, Err(ViewerError::EmptyContent)));
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn replying_to_a_missing_comment_changes_nothing() {
    let store = seeded_store().await;
    let (_, session) = open_session(&store, "u1", None).await;
    let id = session.post_comment("first!").await.unwrap();
    let writes = store.write_count();

    let result = session.post_reply("no-such-comment", "hello").await;
    assert!(matches!(result, Err(ViewerError::NotFound(_))));
    assert_eq!(store.write_count(), writes);

    let stored = store.get(&comments_path(0, 0), &id).await.unwrap();
    assert_eq!(stored.data["replies"], json!([]));
}

#[tokio::test]
async fn the_live_feed_reflects_comments_replies_and_reactions() {
    let store = seeded_store().await;
    let (services, mut session) = open_session(&store, "u1", None).await;

    let (key, initial) = session.next_comments().await.unwrap();
    assert_eq!(key, session.current_key());
    assert!(initial.is_empty());

    let id = session.post_comment("  What is a move?  ").await.unwrap();
    let (_, comments) = timeout(Duration::from_secs(1), session.next_comments())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "What is a move?");
    assert_eq!(comments[0].author, "u1 display");

    let teacher = Identity {
        user_id: "t1".into(),
        display_name: "Professor".into(),
        role: Role::Teacher,
    };
    services
        .engagement
        .post_reply(&key, &id, "A transfer of ownership.", &teacher.display_name, teacher.role)
        .await
        .unwrap();

    let (_, comments) = timeout(Duration::from_secs(1), session.next_comments())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comments[0].replies.len(), 1);
    assert_eq!(comments[0].replies[0].author_role, Role::Teacher);

    session.react(&id, ReactionKind::Like).await.unwrap();
    let (_, comments) = timeout(Duration::from_secs(1), session.next_comments())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comments[0].likes, 1);
}

#[tokio::test]
async fn reactions_toggle_switch_and_count_per_user() {
    let store = seeded_store().await;
    let (_, u1) = open_session(&store, "u1", None).await;
    let (_, u2) = open_session(&store, "u2", None).await;
    let id = u1.post_comment("hello").await.unwrap();

    let tally = u1.react(&id, ReactionKind::Like).await.unwrap();
    assert_eq!((tally.likes, tally.dislikes), (1, 0));

    let tally = u1.react(&id, ReactionKind::Like).await.unwrap();
    assert_eq!((tally.likes, tally.dislikes), (0, 0));
    assert_eq!(tally.user_reaction, None);

    let tally = u1.react(&id, ReactionKind::Dislike).await.unwrap();
    assert_eq!((tally.likes, tally.dislikes), (0, 1));

    let tally = u2.react(&id, ReactionKind::Like).await.unwrap();
    assert_eq!((tally.likes, tally.dislikes), (1, 1));

    let tally = u1.react(&id, ReactionKind::Like).await.unwrap();
    assert_eq!((tally.likes, tally.dislikes), (2, 0));

    let stored = store.get(&comments_path(0, 0), &id).await.unwrap();
    assert_eq!(stored.data["reactedUsers"], json!({ "u1": "like", "u2": "like" }));
}

#[tokio::test]
async fn comments_stay_with_the_video_they_were_posted_on() {
    let store = seeded_store().await;
    let (services, mut session) = open_session(&store, "u1", None).await;
    session.post_comment("on the first video").await.unwrap();

    session.advance().await.unwrap();
    let (key, comments) = session.next_comments().await.unwrap();
    assert_eq!(key.position(), PlaybackPosition::new(0, 1));
    assert!(comments.is_empty());

    let first = ScopedKey::new(COURSE, PlaybackPosition::new(0, 0));
    assert_eq!(services.engagement.comments(&first).await.unwrap().len(), 1);
}

#[tokio::test]
async fn an_unreachable_store_surfaces_as_store_unavailable() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", None).await;
    store.set_offline(true);

    assert!(matches!(
        session.post_comment("hello").await,
        Err(ViewerError::StoreUnavailable(_))
    ));
    assert!(matches!(
        session.playback_ended().await,
        Err(ViewerError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn an_interrupted_feed_is_reported_and_reopened() {
    let store = seeded_store().await;
    let (_, mut session) = open_session(&store, "u1", None).await;
    session.next_comments().await.unwrap();

    store.end_feeds(&comments_path(0, 0)).await;
    let interrupted = timeout(Duration::from_secs(1), session.next_comments())
        .await
        .unwrap();
    assert!(matches!(interrupted, Err(ViewerError::StoreUnavailable(_))));
    assert_eq!(store.subscriber_count(&comments_path(0, 0)).await, 1);

    session.post_comment("still listening").await.unwrap();
    let (_, comments) = timeout(Duration::from_secs(1), session.next_comments())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comments.len(), 1);
}
