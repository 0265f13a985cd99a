//! Quizzes: browsing and taking them, plus admin management.
//!
//! Quiz content is the same for every taker, so the list and detail reads
//! share one cache entry each. Submitting an attempt records a score and
//! invalidates only the submitting user's scores cache.
//!
//! Endpoints:
//! - GET /quizzes - List quizzes (any signed-in user)
//! - GET /quizzes/{id} - Quiz with its questions, answers stripped
//! - POST /quizzes/{id}/submit - Score an attempt
//! - POST /quizzes - Create a quiz (admin)
//! - POST /quizzes/{id}/questions - Add a question (admin)
//! - DELETE /quizzes/{id} - Delete a quiz (admin)

use std::collections::HashMap;

use axum::{
    Extension, Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use garde::Validate;
use shared::api::{
    CreateQuestionPayload, CreateQuizPayload, QuestionView, QuizDetailResponse, QuizView,
    SubmitQuizPayload, SubmitQuizResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::invalidate_prefixes,
    middleware::{
        auth::{self, AuthUser},
        cache::{CachePolicy, CacheScope, cacheable},
        rate_limit::{RatePolicy, rate_limited},
    },
    state::AppState,
};

const QUIZZES_PREFIX: &str = "cache:/quizzes";

fn user_scores_prefix(user_id: Uuid) -> String {
    format!("cache:/scores:user:{}", user_id)
}

pub fn router(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/", get(list_quizzes))
        .route("/{id}", get(get_quiz))
        .route_layer(middleware::from_fn_with_state(state.clone(), cacheable))
        .route_layer(Extension(CachePolicy {
            ttl_secs: 120,
            scope: CacheScope::Shared,
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "quizzes",
            limit: 100,
            window_secs: 60,
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let submit = Router::new()
        .route("/{id}/submit", post(submit_quiz))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "quiz_submit",
            limit: 50,
            window_secs: 60,
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let admin = Router::new()
        .route("/", post(create_quiz))
        .route("/{id}/questions", post(add_question))
        .route("/{id}", delete(delete_quiz))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "quizzes_write",
            limit: 50,
            window_secs: 60,
        }))
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin));

    reads.merge(submit).merge(admin)
}

#[debug_handler]
async fn list_quizzes(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.repos.quizzes.list().await?;

    let views: Vec<QuizView> = quizzes.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[debug_handler]
async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state
        .repos
        .quizzes
        .find(id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Quiz not found"))?;

    let questions = state.repos.quizzes.questions(id).await?;

    Ok(Json(QuizDetailResponse {
        quiz: quiz.into(),
        questions: questions.into_iter().map(QuestionView::from).collect(),
    }))
}

#[debug_handler]
async fn submit_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitQuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let quiz = state
        .repos
        .quizzes
        .find(id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Quiz not found"))?;

    let questions = state.repos.quizzes.questions(id).await?;
    if questions.is_empty() {
        return Err(AppError::PreconditionFailed("Quiz has no questions yet."));
    }

    let total_questions = questions.len() as i32;
    let correct: HashMap<Uuid, i32> = questions
        .into_iter()
        .map(|q| (q.id, q.correct_index))
        .collect();

    // Unknown question ids simply score zero; duplicates are counted once
    // per submitted answer, which the per-question correct map prevents
    // from exceeding the total.
    let mut seen: HashMap<Uuid, bool> = HashMap::new();
    for answer in &payload.answers {
        if let Some(&correct_index) = correct.get(&answer.question_id) {
            seen.entry(answer.question_id)
                .or_insert(answer.selected_index == correct_index);
        }
    }
    let total_scored = seen.values().filter(|&&ok| ok).count() as i32;

    let score = state
        .repos
        .scores
        .record(user.id, quiz.id, total_scored, total_questions)
        .await?;

    invalidate_prefixes(&state, &[&user_scores_prefix(user.id)]).await;

    tracing::info!(
        user_id = %user.id,
        quiz_id = %quiz.id,
        total_scored,
        total_questions,
        "quiz attempt recorded"
    );

    Ok(Json(SubmitQuizResponse {
        quiz_id: score.quiz_id,
        total_scored: score.total_scored,
        total_questions: score.total_questions,
    }))
}

#[debug_handler]
async fn create_quiz(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if state
        .repos
        .chapters
        .find(payload.chapter_id)
        .await?
        .is_none()
    {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Chapter not found",
        ));
    }

    let quiz = state
        .repos
        .quizzes
        .create(
            payload.chapter_id,
            &payload.name,
            payload.remarks.as_deref(),
            payload.duration_minutes,
        )
        .await?;

    invalidate_prefixes(&state, &[QUIZZES_PREFIX]).await;

    tracing::info!(quiz_id = %quiz.id, "quiz created");

    Ok((StatusCode::CREATED, Json(QuizView::from(quiz))))
}

#[debug_handler]
async fn add_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if payload.correct_index as usize >= payload.options.len() {
        return Err(AppError::Validation(
            "correct_index is out of range for the given options".into(),
        ));
    }

    if state.repos.quizzes.find(id).await?.is_none() {
        return Err(AppError::External(StatusCode::NOT_FOUND, "Quiz not found"));
    }

    let question = state
        .repos
        .quizzes
        .add_question(id, &payload.statement, payload.options, payload.correct_index)
        .await?;

    invalidate_prefixes(&state, &[QUIZZES_PREFIX]).await;

    tracing::info!(quiz_id = %id, question_id = %question.id, "question added");

    Ok((StatusCode::CREATED, Json(QuestionView::from(question))))
}

#[debug_handler]
async fn delete_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.repos.quizzes.delete(id).await?;

    if !deleted {
        return Err(AppError::External(StatusCode::NOT_FOUND, "Quiz not found"));
    }

    invalidate_prefixes(&state, &[QUIZZES_PREFIX]).await;

    tracing::info!(quiz_id = %id, "quiz deleted");

    Ok(Json(serde_json::json!({ "message": "Quiz deleted" })))
}
