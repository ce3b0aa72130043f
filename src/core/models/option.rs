use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Opt {
    pub id: i32,
    pub question_id: i32,
    pub label: String,
    pub value: String,
    pub order_index: i32,
}

#[derive(Debug, Deserialize)]
pub struct OptCreate {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub question_id: i32,
    pub label: String,
    pub value: String,
    pub order_index: i32,
}
