//! Shared API request/response types used by the server and its clients.

use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which sensitive flow a one-time code belongs to.
///
/// Each purpose has its own preconditions on the server side; the purpose is
/// also named in the email so users know what they are confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Register,
    Reset,
    Delete,
}

/// Create a new (unverified) account. A verification code is emailed to the
/// given address; the account cannot log in until it is confirmed.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterPayload {
    /// Email address, doubles as the login name.
    #[garde(email)]
    pub username: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(length(min = 1, max = 100))]
    pub full_name: String,
    #[garde(skip)]
    pub qualification: Option<String>,
    #[garde(skip)]
    pub dob: Option<NaiveDate>,
}

/// Returned after registration; the id is needed for the verify/resend calls.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

/// Submit the emailed verification code.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyEmailPayload {
    #[garde(skip)]
    pub user_id: Uuid,
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[garde(email)]
    pub username: String,
    #[garde(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    /// Lowercase role name (`admin` or `user`).
    pub role: String,
}

/// Start a password reset. The new password is staged server-side and only
/// applied once the emailed code is confirmed.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestPasswordResetPayload {
    #[garde(email)]
    pub username: String,
    #[garde(length(min = 8, max = 128))]
    pub new_password: String,
    #[garde(matches(new_password))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyPasswordResetPayload {
    #[garde(skip)]
    pub user_id: Uuid,
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub code: String,
}

/// Ask for a fresh code for one of the OTP flows. Rejected with a cooldown
/// while a previously issued code is still live.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResendOtpPayload {
    #[garde(skip)]
    pub user_id: Uuid,
    #[garde(skip)]
    pub context: OtpPurpose,
}

/// Step 1 of account deletion: confirm the password to receive a code.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestAccountDeletionPayload {
    #[garde(length(min = 1))]
    pub password: String,
}

/// Step 2 of account deletion: confirm the emailed code.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfirmAccountDeletionPayload {
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSubjectPayload {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(skip)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateSubjectPayload {
    #[garde(inner(length(min = 1, max = 100)))]
    pub name: Option<String>,
    #[garde(skip)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateChapterPayload {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(skip)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateChapterPayload {
    #[garde(inner(length(min = 1, max = 100)))]
    pub name: Option<String>,
    #[garde(skip)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterView {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Max options per question. Matches the four-option format of the quiz UI
/// with a little headroom.
const MAX_OPTIONS: usize = 6;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuizPayload {
    #[garde(skip)]
    pub chapter_id: Uuid,
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(skip)]
    pub remarks: Option<String>,
    /// Time allowed for an attempt, in minutes.
    #[garde(range(min = 1, max = 480))]
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizView {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub name: String,
    pub remarks: Option<String>,
    pub duration_minutes: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[garde(length(min = 1, max = 1000))]
    pub statement: String,
    #[garde(length(min = 2, max = MAX_OPTIONS))]
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    #[garde(custom(index_within_options))]
    pub correct_index: i32,
}

fn index_within_options(value: &i32, _ctx: &()) -> garde::Result {
    if *value < 0 {
        return Err(garde::Error::new("correct_index cannot be negative"));
    }
    if *value as usize >= MAX_OPTIONS {
        return Err(garde::Error::new("correct_index is out of range"));
    }
    Ok(())
}

/// Question as shown to quiz takers. Never carries the correct answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub statement: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizDetailResponse {
    pub quiz: QuizView,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitQuizPayload {
    #[garde(length(min = 1), dive)]
    pub answers: Vec<AnswerPayload>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AnswerPayload {
    #[garde(skip)]
    pub question_id: Uuid,
    #[garde(range(min = 0, max = 5))]
    pub selected_index: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub quiz_id: Uuid,
    pub total_scored: i32,
    pub total_questions: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreView {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub total_scored: i32,
    pub total_questions: i32,
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_bad_email() {
        let payload = RegisterPayload {
            username: "not-an-email".into(),
            password: "password123".into(),
            full_name: "Test User".into(),
            qualification: None,
            dob: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn verify_code_must_be_six_digits() {
        let short = VerifyEmailPayload {
            user_id: Uuid::nil(),
            code: "12345".into(),
        };
        assert!(short.validate().is_err());

        let letters = VerifyEmailPayload {
            user_id: Uuid::nil(),
            code: "12a456".into(),
        };
        assert!(letters.validate().is_err());

        let ok = VerifyEmailPayload {
            user_id: Uuid::nil(),
            code: "123456".into(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn reset_passwords_must_match() {
        let payload = RequestPasswordResetPayload {
            username: "user@example.com".into(),
            new_password: "password123".into(),
            confirm_password: "password124".into(),
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn otp_purpose_uses_lowercase_names() {
        let json = serde_json::to_string(&OtpPurpose::Register).unwrap();
        assert_eq!(json, "\"register\"");
        let parsed: OtpPurpose = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(parsed, OtpPurpose::Delete);
    }
}
