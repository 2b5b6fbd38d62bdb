//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use course_viewer_core::{
    Chapter, Comment, Course, CourseCatalog, CourseSummary, Identity, NewCourse, PlaybackPosition,
    PortError, ProgressRecord, ProgressSummary, ReactionKind, ReactionTally, Reply, Role,
    ScopedKey, Video, ViewerError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_courses_handler,
        create_course_handler,
        get_course_handler,
        list_comments_handler,
        post_comment_handler,
        post_reply_handler,
        react_handler,
        get_progress_handler,
        complete_video_handler,
        upload_media_handler,
    ),
    components(
        schemas(
            CourseSummaryResponse,
            CourseResponse,
            ChapterBody,
            VideoBody,
            CreateCourseRequest,
            CreatedResponse,
            TextRequest,
            ReactRequest,
            CommentResponse,
            ReplyResponse,
            ReactionResponse,
            CompleteRequest,
            ProgressResponse,
            UploadResponse,
        )
    ),
    tags(
        (name = "Course Viewer API", description = "Course catalog, comments, reactions, progress and media uploads.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CourseSummaryResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_ref: Option<String>,
    pub chapter_count: usize,
    pub video_count: usize,
}

impl From<CourseSummary> for CourseSummaryResponse {
    fn from(summary: CourseSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            description: summary.description,
            image_ref: summary.image_ref,
            chapter_count: summary.chapter_count,
            video_count: summary.video_count,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct VideoBody {
    pub title: String,
    pub media_ref: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChapterBody {
    pub title: String,
    #[serde(default)]
    pub videos: Vec<VideoBody>,
}

impl From<Chapter> for ChapterBody {
    fn from(chapter: Chapter) -> Self {
        Self {
            title: chapter.title,
            videos: chapter
                .videos
                .into_iter()
                .map(|v| VideoBody {
                    title: v.title,
                    media_ref: v.media_ref,
                })
                .collect(),
        }
    }
}

impl From<ChapterBody> for Chapter {
    fn from(body: ChapterBody) -> Self {
        Self {
            title: body.title,
            videos: body
                .videos
                .into_iter()
                .map(|v| Video {
                    title: v.title,
                    media_ref: v.media_ref,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_ref: Option<String>,
    pub chapters: Vec<ChapterBody>,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            image_ref: course.image_ref,
            chapters: course.chapters.into_iter().map(ChapterBody::from).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterBody>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

/// The body of a new comment or reply.
#[derive(Deserialize, ToSchema)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReactRequest {
    /// `like` or `dislike`.
    #[schema(value_type = String, example = "like")]
    pub kind: ReactionKind,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReplyResponse {
    pub text: String,
    pub author: String,
    #[schema(value_type = String, example = "teacher")]
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Reply> for ReplyResponse {
    fn from(reply: Reply) -> Self {
        Self {
            text: reply.text,
            author: reply.author,
            author_role: reply.author_role,
            created_at: reply.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: String,
    pub text: String,
    pub author: String,
    #[schema(value_type = String, example = "student")]
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
    pub dislikes: u32,
    /// The caller's own reaction, if any.
    #[schema(value_type = Option<String>)]
    pub my_reaction: Option<ReactionKind>,
    pub replies: Vec<ReplyResponse>,
}

impl CommentResponse {
    fn for_viewer(comment: Comment, user_id: &str) -> Self {
        Self {
            my_reaction: comment.reacted_users.get(user_id).copied(),
            id: comment.id,
            text: comment.text,
            author: comment.author,
            author_role: comment.author_role,
            created_at: comment.created_at,
            likes: comment.likes,
            dislikes: comment.dislikes,
            replies: comment.replies.into_iter().map(ReplyResponse::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReactionResponse {
    pub likes: u32,
    pub dislikes: u32,
    #[schema(value_type = Option<String>)]
    pub my_reaction: Option<ReactionKind>,
}

impl From<ReactionTally> for ReactionResponse {
    fn from(tally: ReactionTally) -> Self {
        Self {
            likes: tally.likes,
            dislikes: tally.dislikes,
            my_reaction: tally.user_reaction,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteRequest {
    pub chapter_index: usize,
    pub video_index: usize,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProgressResponse {
    pub course_id: String,
    /// `"{chapter}_{video}"` tokens, in course order.
    pub completed_videos: Vec<String>,
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
    /// Set by the completion endpoint: whether this call added anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newly_recorded: Option<bool>,
}

impl ProgressResponse {
    fn new(record: ProgressRecord, summary: ProgressSummary, newly_recorded: Option<bool>) -> Self {
        Self {
            completed_videos: record.tokens(),
            course_id: record.course_id,
            completed: summary.completed,
            total: summary.total,
            fraction: summary.fraction,
            newly_recorded,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
    pub bytes: u64,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a rejected viewer operation onto an HTTP status.
pub fn viewer_error(e: ViewerError) -> (StatusCode, String) {
    let status = match &e {
        ViewerError::NotFound(_) => StatusCode::NOT_FOUND,
        ViewerError::InvalidPosition(_) => StatusCode::BAD_REQUEST,
        ViewerError::EmptyContent => StatusCode::UNPROCESSABLE_ENTITY,
        ViewerError::StoreUnavailable(_) => {
            error!("Document store unavailable: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, e.to_string())
}

/// Loads the course and checks that the position names one of its videos.
async fn load_scoped(
    app_state: &AppState,
    course_id: &str,
    position: PlaybackPosition,
) -> Result<(CourseCatalog, ScopedKey), (StatusCode, String)> {
    let course = app_state
        .services
        .library
        .load_course(course_id)
        .await
        .map_err(viewer_error)?;
    let catalog = CourseCatalog::new(course);
    if !catalog.contains(position) {
        return Err(viewer_error(ViewerError::InvalidPosition(position)));
    }
    Ok((catalog, ScopedKey::new(course_id, position)))
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// List every course, ordered by title.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Course summaries", body = [CourseSummaryResponse]),
        (status = 503, description = "Document store unavailable")
    )
)]
pub async fn list_courses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let courses = app_state
        .services
        .library
        .list_courses()
        .await
        .map_err(viewer_error)?;
    let body: Vec<CourseSummaryResponse> = courses.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Create a course from its full chapter and video outline.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CreatedResponse),
        (status = 422, description = "Blank title")
    )
)]
pub async fn create_course_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = NewCourse {
        title: request.title,
        description: request.description,
        image_ref: request.image_ref,
        chapters: request.chapters.into_iter().map(Chapter::from).collect(),
    };
    let id = app_state
        .services
        .library
        .create_course(&course)
        .await
        .map_err(viewer_error)?;
    info!("Course {} created by {}", id, identity.user_id);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Fetch one course with its chapters and videos.
#[utoipa::path(
    get,
    path = "/courses/{course_id}",
    params(("course_id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course", body = CourseResponse),
        (status = 404, description = "No such course")
    )
)]
pub async fn get_course_handler(
    State(app_state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = app_state
        .services
        .library
        .load_course(&course_id)
        .await
        .map_err(viewer_error)?;
    Ok(Json(CourseResponse::from(course)))
}

//=========================================================================================
// Engagement Handlers
//=========================================================================================

/// The comments of one video, oldest first.
#[utoipa::path(
    get,
    path = "/courses/{course_id}/chapters/{chapter}/videos/{video}/comments",
    params(
        ("course_id" = String, Path, description = "Course id"),
        ("chapter" = usize, Path, description = "Chapter index"),
        ("video" = usize, Path, description = "Video index within the chapter")
    ),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
        (status = 400, description = "Position outside the course"),
        (status = 404, description = "No such course")
    )
)]
pub async fn list_comments_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((course_id, chapter, video)): Path<(String, usize, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (_, key) = load_scoped(&app_state, &course_id, PlaybackPosition::new(chapter, video)).await?;
    let comments = app_state
        .services
        .engagement
        .comments(&key)
        .await
        .map_err(viewer_error)?;
    let body: Vec<CommentResponse> = comments
        .into_iter()
        .map(|c| CommentResponse::for_viewer(c, &identity.user_id))
        .collect();
    Ok(Json(body))
}

/// Post a top-level comment on a video.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/chapters/{chapter}/videos/{video}/comments",
    request_body = TextRequest,
    params(
        ("course_id" = String, Path, description = "Course id"),
        ("chapter" = usize, Path, description = "Chapter index"),
        ("video" = usize, Path, description = "Video index within the chapter")
    ),
    responses(
        (status = 201, description = "Comment posted", body = CreatedResponse),
        (status = 422, description = "Blank text")
    )
)]
pub async fn post_comment_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((course_id, chapter, video)): Path<(String, usize, usize)>,
    Json(request): Json<TextRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (_, key) = load_scoped(&app_state, &course_id, PlaybackPosition::new(chapter, video)).await?;
    let id = app_state
        .services
        .engagement
        .post_comment(&key, &request.text, &identity.display_name, identity.role)
        .await
        .map_err(viewer_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Reply to a comment.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/chapters/{chapter}/videos/{video}/comments/{comment_id}/replies",
    request_body = TextRequest,
    params(
        ("course_id" = String, Path, description = "Course id"),
        ("chapter" = usize, Path, description = "Chapter index"),
        ("video" = usize, Path, description = "Video index within the chapter"),
        ("comment_id" = String, Path, description = "Comment id")
    ),
    responses(
        (status = 201, description = "Reply appended", body = ReplyResponse),
        (status = 404, description = "No such comment"),
        (status = 422, description = "Blank text")
    )
)]
pub async fn post_reply_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((course_id, chapter, video, comment_id)): Path<(String, usize, usize, String)>,
    Json(request): Json<TextRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (_, key) = load_scoped(&app_state, &course_id, PlaybackPosition::new(chapter, video)).await?;
    let reply = app_state
        .services
        .engagement
        .post_reply(
            &key,
            &comment_id,
            &request.text,
            &identity.display_name,
            identity.role,
        )
        .await
        .map_err(viewer_error)?;
    Ok((StatusCode::CREATED, Json(ReplyResponse::from(reply))))
}

/// Toggle the caller's like or dislike on a comment.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/chapters/{chapter}/videos/{video}/comments/{comment_id}/reactions",
    request_body = ReactRequest,
    params(
        ("course_id" = String, Path, description = "Course id"),
        ("chapter" = usize, Path, description = "Chapter index"),
        ("video" = usize, Path, description = "Video index within the chapter"),
        ("comment_id" = String, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Counters after the toggle", body = ReactionResponse),
        (status = 404, description = "No such comment")
    )
)]
pub async fn react_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((course_id, chapter, video, comment_id)): Path<(String, usize, usize, String)>,
    Json(request): Json<ReactRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (_, key) = load_scoped(&app_state, &course_id, PlaybackPosition::new(chapter, video)).await?;
    let tally = app_state
        .services
        .engagement
        .react(&key, &comment_id, &identity.user_id, request.kind)
        .await
        .map_err(viewer_error)?;
    Ok(Json(ReactionResponse::from(tally)))
}

//=========================================================================================
// Progress Handlers
//=========================================================================================

async fn progress_body(
    app_state: &AppState,
    identity: &Identity,
    catalog: &CourseCatalog,
    newly_recorded: Option<bool>,
) -> Result<ProgressResponse, (StatusCode, String)> {
    let progress = &app_state.services.progress;
    let record = progress
        .record(&identity.user_id, catalog.course_id())
        .await
        .map_err(viewer_error)?;
    let summary = progress
        .summary(&identity.user_id, catalog)
        .await
        .map_err(viewer_error)?;
    Ok(ProgressResponse::new(record, summary, newly_recorded))
}

/// The caller's completed videos in a course.
#[utoipa::path(
    get,
    path = "/progress/{course_id}",
    params(("course_id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Completion state", body = ProgressResponse),
        (status = 404, description = "No such course")
    )
)]
pub async fn get_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = app_state
        .services
        .library
        .load_course(&course_id)
        .await
        .map_err(viewer_error)?;
    let catalog = CourseCatalog::new(course);
    Ok(Json(progress_body(&app_state, &identity, &catalog, None).await?))
}

/// Mark one video of a course as completed by the caller.
#[utoipa::path(
    post,
    path = "/progress/{course_id}/complete",
    request_body = CompleteRequest,
    params(("course_id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Completion state after the call", body = ProgressResponse),
        (status = 400, description = "Position outside the course"),
        (status = 404, description = "No such course")
    )
)]
pub async fn complete_video_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let position = PlaybackPosition::new(request.chapter_index, request.video_index);
    let (catalog, _) = load_scoped(&app_state, &course_id, position).await?;
    let recorded = app_state
        .services
        .progress
        .mark_complete(&identity.user_id, &course_id, position)
        .await
        .map_err(viewer_error)?;
    Ok(Json(
        progress_body(&app_state, &identity, &catalog, Some(recorded)).await?,
    ))
}

//=========================================================================================
// Media Upload Handler
//=========================================================================================

/// Object path for an upload without an explicit `path` field.
fn generated_path(file_name: Option<&str>) -> String {
    let extension = file_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("uploads/{}{}", Uuid::new_v4(), extension)
}

fn upload_error(identity: &Identity, e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::AlreadyExists(_) => StatusCode::CONFLICT,
        PortError::NotFound(_) | PortError::Unexpected(_) => {
            error!("Upload by {} failed: {}", identity.user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

/// Upload a video or image to the object store.
///
/// Accepts a multipart/form-data request with a `file` part and an optional
/// `path` part naming where the object should be stored.
#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content_type = "multipart/form-data", description = "The file to upload."),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or invalid path"),
        (status = 409, description = "An object already exists at the path"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_media_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut requested_path: Option<String> = None;
    let mut file: Option<(Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("path") => {
                let text = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read path: {}", e))
                })?;
                requested_path = Some(text.trim().to_string()).filter(|p| !p.is_empty());
            }
            Some("file") => {
                let name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some((name, data));
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        )
    })?;
    let path = requested_path.unwrap_or_else(|| generated_path(file_name.as_deref()));
    let total = data.len() as u64;

    let url = app_state
        .objects
        .upload(&path, data, &|progress| {
            debug!("Upload of {}: {:.0}%", path, progress.percent());
        })
        .await
        .map_err(|e| upload_error(&identity, e))?;

    Ok((StatusCode::CREATED, Json(UploadResponse { url, bytes: total })))
}
