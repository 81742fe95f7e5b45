//! Post composition and history endpoints

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::models::{Post, PostType};
use crate::domain::posts;
use crate::routes::auth::AuthUser;
use crate::services::error::{ApiError, LogErr, bad_request, error_response, not_found};
use crate::services::publish::orchestrator::{
    self, DestinationResult, MediaFile, PostDraft, SubmitError,
};
use crate::services::publish::reporter::{self, Upload};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", post(create_post).get(list_posts))
        .route("/posts/{id}", put(edit_post).delete(delete_post))
}

fn submit_error_response(e: SubmitError) -> ApiError {
    match e {
        SubmitError::Validation(msg) => bad_request(msg),
        SubmitError::Storage(msg) => error_response(StatusCode::BAD_GATEWAY, msg),
        SubmitError::Database(inner) => {
            tracing::error!("post persistence error: {}", inner);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[derive(Serialize)]
struct CreatePostResponse {
    post: Post,
    results: Vec<DestinationResult>,
    succeeded: usize,
    failed: usize,
    warnings: Vec<String>,
    uploads: Vec<Upload>,
}

/// POST /posts - Submit a draft as multipart form data
///
/// Text fields: `title`, `caption`, `post_type` (`media`|`text`),
/// `account_ids` (comma-separated UUIDs), optional `scheduled_for`
/// (RFC 3339). A `media` file part carries the bytes for media posts.
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatePostResponse>), ApiError> {
    let mut title = String::new();
    let mut caption = String::new();
    let mut post_type = PostType::Text;
    let mut account_ids: Vec<Uuid> = Vec::new();
    let mut scheduled_for: Option<DateTime<Utc>> = None;
    let mut media: Option<MediaFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .log_status("Multipart field error", StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                title = field
                    .text()
                    .await
                    .log_status("Invalid title field", StatusCode::BAD_REQUEST)?;
            }
            "caption" => {
                caption = field
                    .text()
                    .await
                    .log_status("Invalid caption field", StatusCode::BAD_REQUEST)?;
            }
            "post_type" => {
                let value = field
                    .text()
                    .await
                    .log_status("Invalid post_type field", StatusCode::BAD_REQUEST)?;
                post_type = PostType::from_str(&value)
                    .ok_or_else(|| bad_request(format!("Unknown post type: {}", value)))?;
            }
            "account_ids" => {
                let value = field
                    .text()
                    .await
                    .log_status("Invalid account_ids field", StatusCode::BAD_REQUEST)?;
                for id in value.split(',').filter(|s| !s.trim().is_empty()) {
                    let id = id
                        .trim()
                        .parse::<Uuid>()
                        .map_err(|_| bad_request(format!("Invalid account id: {}", id)))?;
                    account_ids.push(id);
                }
            }
            "scheduled_for" => {
                let value = field
                    .text()
                    .await
                    .log_status("Invalid scheduled_for field", StatusCode::BAD_REQUEST)?;
                if !value.trim().is_empty() {
                    let when = DateTime::parse_from_rfc3339(value.trim())
                        .map_err(|_| bad_request("scheduled_for must be an RFC 3339 timestamp"))?;
                    scheduled_for = Some(when.with_timezone(&Utc));
                }
            }
            "media" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .log_status("Failed to read media field", StatusCode::BAD_REQUEST)?;
                media = Some(MediaFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {} // unknown fields are ignored
        }
    }

    let draft = PostDraft {
        title,
        caption,
        post_type,
        media,
        account_ids,
        scheduled_for,
    };

    let (upload_reporter, upload_log) = reporter::channel();
    let outcome = orchestrator::submit_post(
        &state.db,
        &state.storage,
        &state.publishers,
        &upload_reporter,
        user_id,
        draft,
    )
    .await
    .map_err(submit_error_response)?;
    drop(upload_reporter);

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            post: outcome.post,
            results: outcome.results,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            warnings: outcome.warnings,
            uploads: upload_log.into_uploads(),
        }),
    ))
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ListPostsResponse {
    posts: Vec<Post>,
    total: i64,
    limit: i64,
    offset: i64,
    has_more: bool,
}

/// GET /posts - Post history, newest first
async fn list_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListPostsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let total = posts::count_posts(&state.db, user_id)
        .await
        .log_500("Failed to count posts")?;
    let posts = posts::list_posts_paginated(&state.db, user_id, limit, offset)
        .await
        .log_500("Failed to list posts")?;

    let has_more = (offset + limit) < total;

    Ok(Json(ListPostsResponse {
        posts,
        total,
        limit,
        offset,
        has_more,
    }))
}

#[derive(Deserialize)]
struct EditPostRequest {
    title: String,
    caption: String,
}

/// PUT /posts/{id} - Edit title/caption, best-effort syncing destinations
async fn edit_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<EditPostRequest>,
) -> Result<Json<Post>, ApiError> {
    let updated = orchestrator::edit_post(
        &state.db,
        &state.publishers,
        user_id,
        post_id,
        &req.title,
        &req.caption,
    )
    .await
    .map_err(submit_error_response)?;

    updated.map(Json).ok_or_else(|| not_found("Post not found"))
}

/// DELETE /posts/{id} - Remove the local record only; published external
/// copies are untouched
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = posts::delete_post(&state.db, post_id, user_id)
        .await
        .log_500("Failed to delete post")?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Post not found"))
    }
}
