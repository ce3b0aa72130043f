use chrono::{DateTime, Utc};

use crate::core::models::{
    answer::{AnswerRow, Selection, Upsert as AnswerUpsert},
    common::Pagination,
    form::{Form, Insert as FormInsert, Query as FormQuery, Update as FormUpdate},
    option::{Insert as OptionInsert, Opt},
    question::{Insert as QuestionInsert, Question},
    submission::{Query as SubmissionQuery, Start as SubmissionStart, Submission},
    user::{Insert as UserInsert, User},
};
use crate::error::Error;

pub trait UserCommon {
    async fn insert(&mut self, user: UserInsert) -> Result<i32, Error>;
    async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, Error>;
}

pub trait FormCommon {
    async fn insert(&mut self, form: FormInsert) -> Result<i32, Error>;
    async fn get(&mut self, id: i32) -> Result<Option<Form>, Error>;
    async fn update(&mut self, id: i32, form: FormUpdate) -> Result<(), Error>;
    async fn query(&mut self, query: &FormQuery, pagination: Option<Pagination>) -> Result<Vec<Form>, Error>;
    async fn count(&mut self, query: &FormQuery) -> Result<i64, Error>;
}

pub trait QuestionCommon {
    async fn insert(&mut self, question: QuestionInsert) -> Result<i32, Error>;
    async fn query_by_form(&mut self, form_id: i32) -> Result<Vec<Question>, Error>;
    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Question>, Error>;
}

pub trait OptionCommon {
    async fn insert(&mut self, option: OptionInsert) -> Result<i32, Error>;
    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<Opt>, Error>;
    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Opt>, Error>;
}

pub trait SubmissionCommon {
    /// Atomic insert-or-fetch of the one open submission for
    /// (form, respondent). Backed by the storage-level uniqueness
    /// constraint, never by a read-then-write check.
    async fn insert_or_fetch_in_progress(&mut self, start: SubmissionStart) -> Result<Submission, Error>;
    async fn get(&mut self, id: i32) -> Result<Option<Submission>, Error>;
    async fn query(&mut self, query: &SubmissionQuery) -> Result<Vec<Submission>, Error>;
    async fn count(&mut self, query: &SubmissionQuery) -> Result<i64, Error>;
    /// Guarded transition: returns None when the row is no longer
    /// `in_progress`, so racing finalizers cannot both succeed.
    async fn mark_submitted(&mut self, id: i32, at: DateTime<Utc>) -> Result<Option<Submission>, Error>;
}

pub trait AnswerCommon {
    async fn upsert(&mut self, answer: AnswerUpsert) -> Result<i32, Error>;
    async fn replace_selected_options(&mut self, answer_id: i32, option_ids: Vec<i32>) -> Result<(), Error>;
    async fn query_by_submission(&mut self, submission_id: i32) -> Result<Vec<AnswerRow>, Error>;
    async fn selections_by_submission(&mut self, submission_id: i32) -> Result<Vec<Selection>, Error>;
}

pub trait Common: UserCommon + FormCommon + QuestionCommon + OptionCommon + SubmissionCommon + AnswerCommon {}

pub trait Store: Common {}

pub trait TxStore: Store {
    async fn commit(self) -> Result<(), Error>;
    async fn rollback(self) -> Result<(), Error>;
}
