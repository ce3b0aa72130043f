use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("dotenv error")]
    DotEnvError(#[from] dotenv::Error),

    #[error("jwt error")]
    JWTError(#[from] jsonwebtoken::errors::Error),

    #[error("header error")]
    HeaderError(#[from] header::ToStrError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("form {0} is not published")]
    FormNotPublished(i32),

    #[error("submission {0} is no longer editable")]
    SubmissionNotEditable(i32),

    #[error("question {question_id}: answer fields do not match the question type")]
    IncompatibleField { question_id: i32 },

    #[error("question {question_id}: at most {max} option(s) may be selected")]
    TooManyChoices { question_id: i32, max: i32 },

    #[error("question {question_id}: at least {min} option(s) must be selected")]
    TooFewChoices { question_id: i32, min: i32 },

    #[error("question {question_id}: option {option_id} does not belong to it")]
    InvalidOption { question_id: i32, option_id: i32 },

    #[error("question {question_id}: an answer is required")]
    MissingRequiredAnswer { question_id: i32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("business error: {0}")]
    BusinessError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

impl Error {
    fn question_id(&self) -> Option<i32> {
        match self {
            Error::IncompatibleField { question_id }
            | Error::TooManyChoices { question_id, .. }
            | Error::TooFewChoices { question_id, .. }
            | Error::InvalidOption { question_id, .. }
            | Error::MissingRequiredAnswer { question_id } => Some(*question_id),
            _ => None,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Forbidden(_) | Error::FormNotPublished(_) => StatusCode::FORBIDDEN,
            Error::SubmissionNotEditable(_) | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::IncompatibleField { .. }
            | Error::TooManyChoices { .. }
            | Error::TooFewChoices { .. }
            | Error::InvalidOption { .. }
            | Error::MissingRequiredAnswer { .. }
            | Error::BusinessError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::JWTError(_) | Error::HeaderError(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.to_string() });
        if let Some(qid) = self.question_id() {
            body["question_id"] = json!(qid);
        }
        match self {
            Error::TooManyChoices { max, .. } => body["max_choices"] = json!(max),
            Error::TooFewChoices { min, .. } => body["min_choices"] = json!(min),
            Error::InvalidOption { option_id, .. } => body["option_id"] = json!(option_id),
            _ => {}
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
