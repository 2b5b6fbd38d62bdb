pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Re-export the main handlers so the binary and the tests build the same router.
pub use middleware::require_identity;
pub use rest::{
    complete_video_handler, create_course_handler, get_course_handler, get_progress_handler,
    list_comments_handler, list_courses_handler, post_comment_handler, post_reply_handler,
    react_handler, upload_media_handler,
};
pub use state::AppState;
pub use ws_handler::ws_handler;

/// The API routes. Everything except the WebSocket handshake requires the
/// identity headers; `/ws` also accepts them as query parameters.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    let comments = "/courses/{course_id}/chapters/{chapter}/videos/{video}/comments";

    let protected_routes = Router::new()
        .route("/courses", get(list_courses_handler).post(create_course_handler))
        .route("/courses/{course_id}", get(get_course_handler))
        .route(comments, get(list_comments_handler).post(post_comment_handler))
        .route(&format!("{}/{{comment_id}}/replies", comments), post(post_reply_handler))
        .route(&format!("{}/{{comment_id}}/reactions", comments), post(react_handler))
        .route("/progress/{course_id}", get(get_progress_handler))
        .route("/progress/{course_id}/complete", post(complete_video_handler))
        .route("/uploads", post(upload_media_handler))
        .layer(axum_middleware::from_fn(require_identity));

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}

/// Everything the `api` binary serves: the API routes behind CORS, uploaded
/// media under `/media`, and the Swagger UI.
pub fn app(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let config = app_state.config.clone();
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(middleware::USER_ID_HEADER),
            HeaderName::from_static(middleware::USER_NAME_HEADER),
            HeaderName::from_static(middleware::USER_ROLE_HEADER),
        ]);

    Ok(Router::new()
        .merge(api_router(app_state))
        .nest_service("/media", ServeDir::new(&config.media_root))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi())))
}
