use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::models::answer::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Submitted => "submitted",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Submission {
    pub id: i32,
    pub form_id: i32,
    pub respondent_id: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn is_in_progress(&self) -> bool {
        self.status == SubmissionStatus::InProgress.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct Start {
    pub form_id: i32,
    pub respondent_id: i32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Query {
    pub form_id_eq: Option<i32>,
    pub respondent_id_eq: Option<i32>,
    pub status_eq: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionDetail {
    pub id: i32,
    pub form_id: i32,
    pub respondent_id: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub answers: Vec<Answer>,
}
