use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::models::option::{Opt, OptCreate};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Checkbox,
    Radio,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Radio => "radio",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "text" => Ok(QuestionType::Text),
            "checkbox" => Ok(QuestionType::Checkbox),
            "radio" => Ok(QuestionType::Radio),
            other => Err(Error::ServerError(format!("unknown question type: {}", other))),
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::Checkbox | QuestionType::Radio)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    pub id: i32,
    pub form_id: i32,
    pub label: String,
    pub type_: String,
    pub is_required: bool,
    pub min_choices: Option<i32>,
    pub max_choices: Option<i32>,
    pub order_index: i32,
}

impl Question {
    pub fn kind(&self) -> Result<QuestionType, Error> {
        QuestionType::parse(&self.type_)
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionCreate {
    pub label: String,
    pub type_: QuestionType,
    #[serde(default)]
    pub is_required: bool,
    pub min_choices: Option<i32>,
    pub max_choices: Option<i32>,
    #[serde(default)]
    pub options: Vec<OptCreate>,
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub form_id: i32,
    pub label: String,
    pub type_: String,
    pub is_required: bool,
    pub min_choices: Option<i32>,
    pub max_choices: Option<i32>,
    pub order_index: i32,
}

#[derive(Debug, Serialize)]
pub struct QuestionWithOptions {
    pub id: i32,
    pub label: String,
    pub type_: String,
    pub is_required: bool,
    pub min_choices: Option<i32>,
    pub max_choices: Option<i32>,
    pub order_index: i32,
    pub options: Vec<Opt>,
}
