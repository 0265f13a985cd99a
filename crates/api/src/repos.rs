//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for database access.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **users** - Accounts, verification state, credentials
//! - **subjects** - Subject CRUD
//! - **chapters** - Chapter CRUD
//! - **quizzes** - Quizzes and their questions
//! - **scores** - Quiz attempt results
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let user = state.repos.users.find_by_id(user_id).await?;
//!     let chapters = state.repos.chapters.list_by_subject(subject_id).await?;
//! }
//! ```

mod chapters;
mod quizzes;
mod scores;
mod subjects;
mod users;

pub use chapters::{ChapterRepo, PgChapterRepo};
pub use quizzes::{PgQuizRepo, QuizRepo};
pub use scores::{PgScoreRepo, ScoreRepo};
pub use subjects::{PgSubjectRepo, SubjectRepo};
pub use users::{NewUser, PgUserRepo, UserRepo};

#[cfg(test)]
pub use chapters::MockChapterRepo;
#[cfg(test)]
pub use quizzes::MockQuizRepo;
#[cfg(test)]
pub use scores::MockScoreRepo;
#[cfg(test)]
pub use subjects::MockSubjectRepo;
#[cfg(test)]
pub use users::MockUserRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub subjects: Arc<dyn SubjectRepo>,
    pub chapters: Arc<dyn ChapterRepo>,
    pub quizzes: Arc<dyn QuizRepo>,
    pub scores: Arc<dyn ScoreRepo>,
}
