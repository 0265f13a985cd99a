//! Chapter management (admin only).
//!
//! Subject listings embed chapter data, so every chapter mutation
//! invalidates both the chapter and the subject cache prefixes.
//!
//! Endpoints:
//! - GET /chapters/all - List every chapter
//! - GET /chapters/{id} - Get a chapter
//! - PUT /chapters/{id} - Update a chapter
//! - DELETE /chapters/{id} - Delete a chapter

use axum::{
    Extension, Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use garde::Validate;
use shared::api::{ChapterView, UpdateChapterPayload};
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

const CHAPTERS_PREFIX: &str = "cache:/chapters";
const SUBJECTS_PREFIX: &str = "cache:/subjects";

pub fn router(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/all", get(list_chapters))
        .route("/{id}", get(get_chapter))
        .route_layer(middleware::from_fn_with_state(state.clone(), cacheable))
        .route_layer(Extension(CachePolicy {
            ttl_secs: 120,
            scope: CacheScope::Shared,
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "chapters",
            limit: 100,
            window_secs: 60,
        }));

    let writes = Router::new()
        .route("/{id}", put(update_chapter).delete(delete_chapter))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "chapters_write",
            limit: 50,
            window_secs: 60,
        }));

    reads
        .merge(writes)
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin))
}

#[debug_handler]
async fn list_chapters(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let chapters = state.repos.chapters.list_all().await?;

    let views: Vec<ChapterView> = chapters.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[debug_handler]
async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match state.repos.chapters.find(id).await? {
        Some(chapter) => Ok(Json(ChapterView::from(chapter))),
        None => Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Chapter not found",
        )),
    }
}

#[debug_handler]
async fn update_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateChapterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let updated = state
        .repos
        .chapters
        .update(id, payload.name.as_deref(), payload.description.as_deref())
        .await?;

    if !updated {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Chapter not found",
        ));
    }

    invalidate_prefixes(&state, &[CHAPTERS_PREFIX, SUBJECTS_PREFIX]).await;

    tracing::info!(chapter_id = %id, "chapter updated");

    Ok(Json(serde_json::json!({ "message": "Chapter updated" })))
}

#[debug_handler]
async fn delete_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.repos.chapters.delete(id).await?;

    if !deleted {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Chapter not found",
        ));
    }

    invalidate_prefixes(&state, &[CHAPTERS_PREFIX, SUBJECTS_PREFIX]).await;

    tracing::info!(chapter_id = %id, "chapter deleted");

    Ok(Json(serde_json::json!({ "message": "Chapter deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MockChapterRepo;
    use crate::stores::MockResponseCache;
    use crate::test_utils::{TestStateBuilder, mock_chapter};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn update_chapter_invalidates_chapters_and_subjects() {
        let mut chapters = MockChapterRepo::new();
        chapters.expect_update().returning(|_, _, _| Ok(true));

        let invalidated = Arc::new(Mutex::new(Vec::new()));
        let record = invalidated.clone();
        let mut cache = MockResponseCache::new();
        cache.expect_invalidate_prefix().returning(move |prefix| {
            record.lock().unwrap().push(prefix.to_string());
            Ok(2)
        });

        let state = TestStateBuilder::new()
            .with_chapter_repo(chapters)
            .with_response_cache(cache)
            .build();

        let payload = UpdateChapterPayload {
            name: Some("Renamed".into()),
            description: None,
        };

        let response = update_chapter(State(state), Path(Uuid::new_v4()), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let seen: HashSet<String> = invalidated.lock().unwrap().iter().cloned().collect();
        assert!(seen.contains(CHAPTERS_PREFIX));
        assert!(seen.contains(SUBJECTS_PREFIX));
    }

    #[tokio::test]
    async fn invalidation_failure_does_not_fail_the_mutation() {
        let mut chapters = MockChapterRepo::new();
        chapters.expect_delete().returning(|_| Ok(true));

        let mut cache = MockResponseCache::new();
        cache
            .expect_invalidate_prefix()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let state = TestStateBuilder::new()
            .with_chapter_repo(chapters)
            .with_response_cache(cache)
            .build();

        let response = delete_chapter(State(state), Path(Uuid::new_v4()))
            .await
            .unwrap()
            .into_response();

        // The delete already committed; a stale cache is the accepted cost.
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_chapter_returns_not_found() {
        let mut chapters = MockChapterRepo::new();
        chapters.expect_find().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_chapter_repo(chapters).build();

        let result = get_chapter(State(state), Path(Uuid::new_v4())).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected External error");
        };
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_chapters_returns_views() {
        let subject_id = Uuid::new_v4();
        let mut chapters = MockChapterRepo::new();
        chapters.expect_list_all().returning(move || {
            Ok(vec![
                mock_chapter(subject_id, "Optics"),
                mock_chapter(subject_id, "Waves"),
            ])
        });

        let state = TestStateBuilder::new().with_chapter_repo(chapters).build();

        let response = list_chapters(State(state)).await.unwrap().into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
