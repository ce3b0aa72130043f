use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One respondent-supplied answer, as it arrives on the wire. Exactly one
/// of `text_value` / `selected_option_ids` is meaningful for a given
/// question type; the validator rejects mismatches.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    pub question_id: i32,
    pub text_value: Option<String>,
    pub selected_option_ids: Option<Vec<i32>>,
}

impl AnswerInput {
    /// Selected option ids with set semantics: repeats collapse, order is
    /// irrelevant.
    pub fn selected_set(&self) -> Vec<i32> {
        self.selected_option_ids
            .as_deref()
            .unwrap_or_default()
            .iter()
            .copied()
            .collect::<BTreeSet<i32>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnswerRow {
    pub id: i32,
    pub submission_id: i32,
    pub question_id: i32,
    pub text_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Upsert {
    pub submission_id: i32,
    pub question_id: i32,
    pub text_value: Option<String>,
}

/// A selected-option link joined with its option label, keyed by the
/// owning answer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Selection {
    pub answer_id: i32,
    pub option_id: i32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedOption {
    pub option_id: i32,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct Answer {
    pub id: i32,
    pub submission_id: i32,
    pub question_id: i32,
    pub text_value: Option<String>,
    pub selected_options: Vec<SelectedOption>,
}
