//! A user's quiz attempt history.
//!
//! The listing is cached per user: the cache key carries the user id, so
//! entries are never shared across accounts, and submitting a new attempt
//! invalidates exactly that user's prefix.
//!
//! Endpoints:
//! - GET /scores - The authenticated user's attempts, newest first

use axum::{
    Extension, Json, Router, debug_handler, extract::State, middleware,
    response::IntoResponse, routing::get,
};
use shared::api::ScoreView;

use crate::{
    error::AppError,
    middleware::{
        auth::{self, AuthUser},
        cache::{CachePolicy, CacheScope, cacheable},
        rate_limit::{RatePolicy, rate_limited},
    },
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_scores))
        .route_layer(middleware::from_fn_with_state(state.clone(), cacheable))
        .route_layer(Extension(CachePolicy {
            ttl_secs: 60,
            scope: CacheScope::PerUser,
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "scores",
            limit: 100,
            window_secs: 60,
        }))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

#[debug_handler]
async fn list_scores(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let scores = state.repos.scores.list_by_user(user.id).await?;

    let views: Vec<ScoreView> = scores.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::repos::MockScoreRepo;
    use crate::test_utils::{TestStateBuilder, mock_score};
    use axum::http::StatusCode;
    use mockall::predicate::eq;
    use uuid::Uuid;

    #[tokio::test]
    async fn list_scores_queries_only_the_callers_rows() {
        let user_id = Uuid::new_v4();
        let quiz_id = Uuid::new_v4();

        let mut scores = MockScoreRepo::new();
        scores
            .expect_list_by_user()
            .with(eq(user_id))
            .times(1)
            .returning(move |user_id| Ok(vec![mock_score(user_id, quiz_id, 4, 5)]));

        let state = TestStateBuilder::new().with_score_repo(scores).build();

        let response = list_scores(
            AuthUser {
                id: user_id,
                role: UserRole::User,
            },
            State(state),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
