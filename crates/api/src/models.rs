use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::api::{ChapterView, QuestionView, QuizView, ScoreView, SubjectView};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Email address, doubles as the login name.
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
    pub role: UserRole,
    pub status: UserStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    /// Suspension wins over everything else; a pending account is still
    /// "active" in this sense, it just cannot pass the verified gate.
    pub fn is_active(&self) -> bool {
        !matches!(self.status, UserStatus::Suspended)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Subject> for SubjectView {
    fn from(s: Subject) -> Self {
        SubjectView {
            id: s.id,
            name: s.name,
            description: s.description,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Chapter {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<Chapter> for ChapterView {
    fn from(c: Chapter) -> Self {
        ChapterView {
            id: c.id,
            subject_id: c.subject_id,
            name: c.name,
            description: c.description,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub name: String,
    pub remarks: Option<String>,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Quiz> for QuizView {
    fn from(q: Quiz) -> Self {
        QuizView {
            id: q.id,
            chapter_id: q.chapter_id,
            name: q.name,
            remarks: q.remarks,
            duration_minutes: q.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub statement: String,
    pub options: Json<Vec<String>>,
    /// Index into `options`. Never serialized to quiz takers.
    pub correct_index: i32,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        QuestionView {
            id: q.id,
            statement: q.statement,
            options: q.options.0,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Score {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub total_scored: i32,
    pub total_questions: i32,
    pub attempted_at: DateTime<Utc>,
}

impl From<Score> for ScoreView {
    fn from(s: Score) -> Self {
        ScoreView {
            id: s.id,
            quiz_id: s.quiz_id,
            total_scored: s.total_scored,
            total_questions: s.total_questions,
            attempted_at: s.attempted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_users_are_not_active() {
        let statuses = [
            (UserStatus::Pending, true),
            (UserStatus::Active, true),
            (UserStatus::Suspended, false),
        ];
        for (status, expected) in statuses {
            let user = User {
                id: Uuid::new_v4(),
                username: "u@example.com".into(),
                password_hash: "x".into(),
                full_name: "U".into(),
                qualification: None,
                dob: None,
                role: UserRole::User,
                status,
                verified_at: None,
                last_login: None,
                created_at: Utc::now(),
            };
            assert_eq!(user.is_active(), expected);
        }
    }

    #[test]
    fn question_view_never_exposes_the_answer() {
        let question = Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            statement: "2 + 2 = ?".into(),
            options: Json(vec!["3".into(), "4".into()]),
            correct_index: 1,
        };
        let view: QuestionView = question.into();
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("correct"));
    }
}
