//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection owns one `ViewerSession`; the loop interleaves client
//! requests with the comment snapshots of whichever video the session is on.

use crate::{
    error::ApiError,
    web::{
        middleware::identity_from_headers,
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use course_viewer_core::{
    Comment, Identity, PlaybackPosition, Role, ScopedKey, ViewerError, ViewerResult, ViewerSession,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// Browsers cannot set headers on a WebSocket handshake, so the identity may
/// also arrive as query parameters.
#[derive(Deserialize, Debug, Default)]
pub struct WsIdentityParams {
    user_id: Option<String>,
    user_name: Option<String>,
    user_role: Option<String>,
}

impl WsIdentityParams {
    fn into_identity(self) -> Option<Identity> {
        let user_id = self.user_id.filter(|id| !id.trim().is_empty())?;
        Some(Identity {
            display_name: self.user_name.unwrap_or_else(|| user_id.clone()),
            role: Role::parse_or_student(self.user_role.as_deref()),
            user_id,
        })
    }
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<WsIdentityParams>,
) -> Response {
    let Some(identity) = identity_from_headers(&headers).or_else(|| params.into_identity()) else {
        return (StatusCode::UNAUTHORIZED, "x-user-id is required").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    info!("New WebSocket connection established for user: {}", identity.user_id);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    // Failed attempts are reported and the client may try again.
    let mut session = loop {
        let text = match receiver.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                info!("Client disconnected before the session opened.");
                return;
            }
            Some(Err(e)) => {
                warn!("WebSocket receive failed: {}", e);
                return;
            }
            Some(Ok(_)) => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Init {
                course_id,
                chapter_index,
                video_index,
            }) => {
                let start = chapter_index
                    .map(|chapter| PlaybackPosition::new(chapter, video_index.unwrap_or(0)));
                match ViewerSession::open(&app_state.services, identity.clone(), &course_id, start)
                    .await
                {
                    Ok(session) => break session,
                    Err(e) => error_message(e),
                }
            }
            Ok(_) => ServerMessage::Error {
                message: "The first message must be init.".to_string(),
            },
            Err(e) => ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            },
        };
        if send_message(&mut sender, &reply).await.is_err() {
            return;
        }
    };

    let init_msg = ServerMessage::SessionInitialized {
        course_id: session.course().id.clone(),
        course_title: session.course().title.clone(),
        position: session.position(),
        video: session.current_video().clone(),
    };
    if let Err(e) = send_message(&mut sender, &init_msg).await {
        error!("Failed to send session initialized message: {}", e);
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let replies = handle_text_message(&text, &mut session).await;
                    if send_all(&mut sender, &replies).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected.");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket receive failed: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            update = session.next_comments() => {
                if send_message(&mut sender, &comments_message(update)).await.is_err() {
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    session.close();
    info!("WebSocket connection closed for user: {}", identity.user_id);
}

/// A comment snapshot, or the error when the live feed was interrupted.
pub fn comments_message(update: ViewerResult<(ScopedKey, Vec<Comment>)>) -> ServerMessage {
    match update {
        Ok((key, comments)) => ServerMessage::Comments {
            position: key.position(),
            comments,
        },
        Err(e) => error_message(e),
    }
}

fn error_message(e: ViewerError) -> ServerMessage {
    if let ViewerError::StoreUnavailable(_) = e {
        error!("Viewer request failed: {}", e);
    }
    ServerMessage::Error {
        message: e.to_string(),
    }
}

async fn send_message(sender: &mut WsSender, msg: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(msg).map_err(|e| ApiError::Internal(e.to_string()))?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn send_all(sender: &mut WsSender, msgs: &[ServerMessage]) -> Result<(), ApiError> {
    for msg in msgs {
        send_message(sender, msg).await?;
    }
    Ok(())
}

/// Applies one client request to the session and returns the messages to send back.
pub async fn handle_text_message(text: &str, session: &mut ViewerSession) -> Vec<ServerMessage> {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return vec![ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            }];
        }
    };

    match client_msg {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
            vec![ServerMessage::Error {
                message: "The session is already initialized.".to_string(),
            }]
        }
        ClientMessage::Advance => match session.advance().await {
            Ok(step) => vec![ServerMessage::from_step(step, session.current_video())],
            Err(e) => resync(session, e),
        },
        ClientMessage::Retreat => match session.retreat().await {
            Ok(step) => vec![ServerMessage::from_step(step, session.current_video())],
            Err(e) => resync(session, e),
        },
        ClientMessage::Seek {
            chapter_index,
            video_index,
        } => match session
            .seek(PlaybackPosition::new(chapter_index, video_index))
            .await
        {
            Ok(step) => vec![ServerMessage::from_step(step, session.current_video())],
            Err(e) => resync(session, e),
        },
        ClientMessage::PlaybackEnded => match session.playback_ended().await {
            Ok(ended) => {
                let mut replies = vec![ServerMessage::from_step(ended.step, session.current_video())];
                replies.push(progress_message(session).await);
                replies
            }
            Err(e) => resync(session, e),
        },
        ClientMessage::PostComment { text } => match session.post_comment(&text).await {
            Ok(comment_id) => vec![ServerMessage::CommentPosted { comment_id }],
            Err(e) => vec![error_message(e)],
        },
        ClientMessage::PostReply { comment_id, text } => {
            match session.post_reply(&comment_id, &text).await {
                Ok(reply) => vec![ServerMessage::ReplyPosted { comment_id, reply }],
                Err(e) => vec![error_message(e)],
            }
        }
        ClientMessage::React { comment_id, kind } => match session.react(&comment_id, kind).await
        {
            Ok(tally) => vec![ServerMessage::ReactionApplied { comment_id, tally }],
            Err(e) => vec![error_message(e)],
        },
        ClientMessage::GetProgress => vec![progress_message(session).await],
    }
}

/// The error, followed by where the cursor actually is now.
fn resync(session: &ViewerSession, e: ViewerError) -> Vec<ServerMessage> {
    vec![
        error_message(e),
        ServerMessage::Position {
            position: session.position(),
            video: session.current_video().clone(),
        },
    ]
}

async fn progress_message(session: &ViewerSession) -> ServerMessage {
    let result = async {
        let record = session.progress_record().await?;
        let summary = session.progress_summary().await?;
        Ok::<_, ViewerError>((record, summary))
    }
    .await;

    match result {
        Ok((record, summary)) => ServerMessage::Progress {
            completed_videos: record.completed_videos.into_iter().collect(),
            summary,
        },
        Err(e) => error_message(e),
    }
}
