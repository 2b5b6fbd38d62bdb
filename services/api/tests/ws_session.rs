mod common;

use api_lib::web::protocol::ServerMessage;
use api_lib::web::ws_handler::{comments_message, handle_text_message};
use common::seed_course;
use course_viewer_core::{
    Identity, InMemoryDocumentStore, PlaybackPosition, Role, ViewerServices, ViewerSession,
};
use std::sync::Arc;

async fn open_session() -> (Arc<InMemoryDocumentStore>, ViewerSession) {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_course(&store, "rust").await;
    let services = ViewerServices::new(store.clone());
    let identity = Identity {
        user_id: "u1".into(),
        display_name: "Ada".into(),
        role: Role::Student,
    };
    let session = ViewerSession::open(&services, identity, "rust", None)
        .await
        .unwrap();
    (store, session)
}

#[tokio::test]
async fn navigation_requests_report_the_new_position() {
    let (_, mut session) = open_session().await;

    let replies = handle_text_message(r#"{"type":"advance"}"#, &mut session).await;
    assert!(matches!(
        replies.as_slice(),
        [ServerMessage::PositionChanged { to, .. }] if *to == PlaybackPosition::new(0, 1)
    ));

    let replies = handle_text_message(
        r#"{"type":"seek","chapter_index":0,"video_index":0}"#,
        &mut session,
    )
    .await;
    assert!(matches!(replies.as_slice(), [ServerMessage::PositionChanged { .. }]));

    let replies = handle_text_message(r#"{"type":"retreat"}"#, &mut session).await;
    assert!(matches!(
        replies.as_slice(),
        [ServerMessage::Position { position, .. }] if *position == PlaybackPosition::new(0, 0)
    ));
}

#[tokio::test]
async fn rejected_requests_keep_the_session_usable() {
    let (_, mut session) = open_session().await;

    let replies = handle_text_message(
        r#"{"type":"seek","chapter_index":4,"video_index":0}"#,
        &mut session,
    )
    .await;
    assert!(matches!(
        replies.as_slice(),
        [ServerMessage::Error { .. }, ServerMessage::Position { .. }]
    ));

    let replies = handle_text_message("not json", &mut session).await;
    assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));

    let replies = handle_text_message(r#"{"type":"post_comment","text":" "}"#, &mut session).await;
    assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));

    let replies =
        handle_text_message(r#"{"type":"post_comment","text":"still here"}"#, &mut session).await;
    assert!(matches!(replies.as_slice(), [ServerMessage::CommentPosted { .. }]));
}

#[tokio::test]
async fn finishing_the_course_reports_completion_and_progress() {
    let (_, mut session) = open_session().await;

    for _ in 0..2 {
        handle_text_message(r#"{"type":"playback_ended"}"#, &mut session).await;
    }
    let replies = handle_text_message(r#"{"type":"playback_ended"}"#, &mut session).await;
    match replies.as_slice() {
        [ServerMessage::CourseComplete { at }, ServerMessage::Progress { completed_videos, summary }] =>
        {
            assert_eq!(*at, PlaybackPosition::new(1, 0));
            assert_eq!(completed_videos.len(), 3);
            assert_eq!((summary.completed, summary.total), (3, 3));
        }
        other => panic!("unexpected replies: {:?}", other),
    }
}

#[tokio::test]
async fn comment_snapshots_follow_the_cursor() {
    let (_, mut session) = open_session().await;
    handle_text_message(r#"{"type":"post_comment","text":"first video"}"#, &mut session).await;

    let (key, comments) = session.next_comments().await.unwrap();
    assert_eq!(key.position(), PlaybackPosition::new(0, 0));
    assert_eq!(comments.len(), 1);

    handle_text_message(r#"{"type":"advance"}"#, &mut session).await;
    let (key, comments) = session.next_comments().await.unwrap();
    assert_eq!(key.position(), PlaybackPosition::new(0, 1));
    assert!(comments.is_empty());
}

#[tokio::test]
async fn an_interrupted_feed_becomes_an_error_then_resumes() {
    let (store, mut session) = open_session().await;
    session.next_comments().await.unwrap();

    let path = session.current_key().collection_path();
    store.end_feeds(&path).await;
    let msg = comments_message(session.next_comments().await);
    assert!(matches!(msg, ServerMessage::Error { .. }));

    let msg = comments_message(session.next_comments().await);
    assert!(matches!(
        msg,
        ServerMessage::Comments { position, .. } if position == PlaybackPosition::new(0, 0)
    ));
}
