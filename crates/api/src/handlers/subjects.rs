//! Subject management (admin only).
//!
//! Reads are cached for two minutes; every mutation invalidates the subject
//! prefix so the next read recomputes. Deleting a subject cascades to its
//! chapters, and creating a chapter here changes what subject listings
//! embed, so those paths invalidate the chapter prefix as well.
//!
//! Endpoints:
//! - GET /subjects - List all subjects
//! - GET /subjects/{id} - Get a subject
//! - GET /subjects/{id}/chapters - List a subject's chapters
//! - POST /subjects - Create a subject
//! - PUT /subjects/{id} - Update a subject
//! - DELETE /subjects/{id} - Delete a subject (and its chapters)
//! - POST /subjects/{id}/chapters - Create a chapter under a subject

use axum::{
    Extension, Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use garde::Validate;
use shared::api::{
    ChapterView, CreateChapterPayload, CreateSubjectPayload, SubjectView, UpdateSubjectPayload,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::invalidate_prefixes,
    middleware::{
        auth,
        cache::{CachePolicy, CacheScope, cacheable},
        rate_limit::{RatePolicy, rate_limited},
    },
    state::AppState,
};

const SUBJECTS_PREFIX: &str = "cache:/subjects";
const CHAPTERS_PREFIX: &str = "cache:/chapters";

pub fn router(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/", get(list_subjects))
        .route("/{id}", get(get_subject))
        .route("/{id}/chapters", get(list_subject_chapters))
        .route_layer(middleware::from_fn_with_state(state.clone(), cacheable))
        .route_layer(Extension(CachePolicy {
            ttl_secs: 120,
            scope: CacheScope::Shared,
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "subjects",
            limit: 100,
            window_secs: 60,
        }));

    let writes = Router::new()
        .route("/", post(create_subject))
        .route("/{id}", put(update_subject).delete(delete_subject))
        .route("/{id}/chapters", post(create_chapter))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "subjects_write",
            limit: 50,
            window_secs: 60,
        }));

    reads
        .merge(writes)
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin))
}

#[debug_handler]
async fn list_subjects(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let subjects = state.repos.subjects.list().await?;

    let views: Vec<SubjectView> = subjects.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[debug_handler]
async fn get_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match state.repos.subjects.find(id).await? {
        Some(subject) => Ok(Json(SubjectView::from(subject))),
        None => Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Subject not found",
        )),
    }
}

#[debug_handler]
async fn list_subject_chapters(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.repos.subjects.find(id).await?.is_none() {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Subject not found",
        ));
    }

    let chapters = state.repos.chapters.list_by_subject(id).await?;

    let views: Vec<ChapterView> = chapters.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[debug_handler]
async fn create_subject(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubjectPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let subject = state
        .repos
        .subjects
        .create(&payload.name, payload.description.as_deref())
        .await?;

    invalidate_prefixes(&state, &[SUBJECTS_PREFIX]).await;

    tracing::info!(subject_id = %subject.id, "subject created");

    Ok((StatusCode::CREATED, Json(SubjectView::from(subject))))
}

#[debug_handler]
async fn update_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSubjectPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let updated = state
        .repos
        .subjects
        .update(id, payload.name.as_deref(), payload.description.as_deref())
        .await?;

    if !updated {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Subject not found",
        ));
    }

    invalidate_prefixes(&state, &[SUBJECTS_PREFIX]).await;

    tracing::info!(subject_id = %id, "subject updated");

    Ok(Json(serde_json::json!({ "message": "Subject updated" })))
}

#[debug_handler]
async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.repos.subjects.delete(id).await?;

    if !deleted {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Subject not found",
        ));
    }

    // Chapters went with the subject, so both listings are stale.
    invalidate_prefixes(&state, &[SUBJECTS_PREFIX, CHAPTERS_PREFIX]).await;

    tracing::info!(subject_id = %id, "subject deleted");

    Ok(Json(serde_json::json!({ "message": "Subject deleted" })))
}

#[debug_handler]
async fn create_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateChapterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if state.repos.subjects.find(id).await?.is_none() {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Subject not found",
        ));
    }

    let chapter = state
        .repos
        .chapters
        .create(id, &payload.name, payload.description.as_deref())
        .await?;

    // Subject listings embed chapter data, so both prefixes are stale.
    invalidate_prefixes(&state, &[CHAPTERS_PREFIX, SUBJECTS_PREFIX]).await;

    tracing::info!(chapter_id = %chapter.id, subject_id = %id, "chapter created");

    Ok((StatusCode::CREATED, Json(ChapterView::from(chapter))))
}
