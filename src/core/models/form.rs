use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::models::question::{QuestionCreate, QuestionWithOptions};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Form {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FormCreate {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionCreate>,
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
}

#[derive(Debug, Default)]
pub struct Query {
    pub owner_id_eq: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct FormDetail {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuestionWithOptions>,
}
