//! In-memory store for exercising the services without Postgres. Shares
//! its state across clones so a "transaction" handed to a service by
//! value can be inspected afterwards; the uniqueness rules the schema
//! enforces are mirrored here.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::core::models::{
    answer::{AnswerRow, Selection, Upsert as AnswerUpsert},
    common::Pagination,
    form::{Form, Insert as FormInsert, Query as FormQuery, Update as FormUpdate},
    option::{Insert as OptionInsert, Opt},
    question::{Insert as QuestionInsert, Question},
    submission::{Query as SubmissionQuery, Start as SubmissionStart, Submission, SubmissionStatus},
    user::{Insert as UserInsert, User},
};
use crate::core::ports::repository::{AnswerCommon, Common, FormCommon, OptionCommon, QuestionCommon, Store, SubmissionCommon, TxStore, UserCommon};
use crate::error::Error;

#[derive(Debug, Default)]
pub struct State {
    next_id: i32,
    pub users: Vec<User>,
    pub forms: Vec<Form>,
    pub questions: Vec<Question>,
    pub options: Vec<Opt>,
    pub submissions: Vec<Submission>,
    pub answers: Vec<AnswerRow>,
    /// (answer_id, option_id) pairs, unique like the schema's key.
    pub selections: Vec<(i32, i32)>,
}

#[derive(Clone, Default)]
pub struct MemStore(pub Rc<RefCell<State>>);

impl MemStore {
    fn next_id(&self) -> i32 {
        let mut state = self.0.borrow_mut();
        state.next_id += 1;
        state.next_id
    }

    pub fn add_user(&self, nickname: &str) -> i32 {
        let id = self.next_id();
        self.0.borrow_mut().users.push(User {
            id,
            nickname: nickname.into(),
            email: format!("{}@example.com", nickname),
            password: String::new(),
            salt: String::new(),
            role: "user".into(),
        });
        id
    }

    pub fn add_form(&self, owner_id: i32, is_published: bool) -> i32 {
        let id = self.next_id();
        self.0.borrow_mut().forms.push(Form {
            id,
            title: format!("form {}", id),
            description: None,
            owner_id,
            is_published,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_question(&self, form_id: i32, type_: &str, is_required: bool, min_choices: Option<i32>, max_choices: Option<i32>) -> i32 {
        let id = self.next_id();
        let mut state = self.0.borrow_mut();
        let order_index = state.questions.iter().filter(|q| q.form_id == form_id).count() as i32;
        state.questions.push(Question {
            id,
            form_id,
            label: format!("question {}", id),
            type_: type_.into(),
            is_required,
            min_choices,
            max_choices,
            order_index,
        });
        id
    }

    pub fn add_option(&self, question_id: i32) -> i32 {
        let id = self.next_id();
        let mut state = self.0.borrow_mut();
        let order_index = state.options.iter().filter(|o| o.question_id == question_id).count() as i32;
        state.options.push(Opt {
            id,
            question_id,
            label: format!("option {}", id),
            value: format!("value-{}", id),
            order_index,
        });
        id
    }
}

impl UserCommon for MemStore {
    async fn insert(&mut self, user: UserInsert) -> Result<i32, Error> {
        let id = self.next_id();
        self.0.borrow_mut().users.push(User {
            id,
            nickname: user.nickname,
            email: user.email,
            password: user.password,
            salt: user.salt,
            role: user.role,
        });
        Ok(id)
    }

    async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, Error> {
        Ok(self.0.borrow().users.iter().find(|u| u.email == email).cloned())
    }
}

impl FormCommon for MemStore {
    async fn insert(&mut self, form: FormInsert) -> Result<i32, Error> {
        let id = self.next_id();
        self.0.borrow_mut().forms.push(Form {
            id,
            title: form.title,
            description: form.description,
            owner_id: form.owner_id,
            is_published: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Form>, Error> {
        Ok(self.0.borrow().forms.iter().find(|f| f.id == id).cloned())
    }

    async fn update(&mut self, id: i32, form: FormUpdate) -> Result<(), Error> {
        let mut state = self.0.borrow_mut();
        if let Some(row) = state.forms.iter_mut().find(|f| f.id == id) {
            row.title = form.title;
            row.description = form.description;
            row.is_published = form.is_published;
        }
        Ok(())
    }

    async fn query(&mut self, query: &FormQuery, _pagination: Option<Pagination>) -> Result<Vec<Form>, Error> {
        Ok(self
            .0
            .borrow()
            .forms
            .iter()
            .filter(|f| query.owner_id_eq.map_or(true, |oid| f.owner_id == oid))
            .cloned()
            .collect())
    }

    async fn count(&mut self, query: &FormQuery) -> Result<i64, Error> {
        Ok(self
            .0
            .borrow()
            .forms
            .iter()
            .filter(|f| query.owner_id_eq.map_or(true, |oid| f.owner_id == oid))
            .count() as i64)
    }
}

impl QuestionCommon for MemStore {
    async fn insert(&mut self, question: QuestionInsert) -> Result<i32, Error> {
        let id = self.next_id();
        self.0.borrow_mut().questions.push(Question {
            id,
            form_id: question.form_id,
            label: question.label,
            type_: question.type_,
            is_required: question.is_required,
            min_choices: question.min_choices,
            max_choices: question.max_choices,
            order_index: question.order_index,
        });
        Ok(id)
    }

    async fn query_by_form(&mut self, form_id: i32) -> Result<Vec<Question>, Error> {
        let mut questions: Vec<Question> = self.0.borrow().questions.iter().filter(|q| q.form_id == form_id).cloned().collect();
        questions.sort_by_key(|q| q.order_index);
        Ok(questions)
    }

    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Question>, Error> {
        Ok(self.0.borrow().questions.iter().filter(|q| ids.contains(&q.id)).cloned().collect())
    }
}

impl OptionCommon for MemStore {
    async fn insert(&mut self, option: OptionInsert) -> Result<i32, Error> {
        let id = self.next_id();
        self.0.borrow_mut().options.push(Opt {
            id,
            question_id: option.question_id,
            label: option.label,
            value: option.value,
            order_index: option.order_index,
        });
        Ok(id)
    }

    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<Opt>, Error> {
        let mut options: Vec<Opt> = self.0.borrow().options.iter().filter(|o| o.question_id == question_id).cloned().collect();
        options.sort_by_key(|o| o.order_index);
        Ok(options)
    }

    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Opt>, Error> {
        Ok(self.0.borrow().options.iter().filter(|o| ids.contains(&o.id)).cloned().collect())
    }
}

impl SubmissionCommon for MemStore {
    async fn insert_or_fetch_in_progress(&mut self, start: SubmissionStart) -> Result<Submission, Error> {
        let mut state = self.0.borrow_mut();
        if let Some(existing) = state
            .submissions
            .iter()
            .find(|s| s.form_id == start.form_id && s.respondent_id == start.respondent_id && s.status == SubmissionStatus::InProgress.as_str())
        {
            return Ok(existing.clone());
        }
        state.next_id += 1;
        let submission = Submission {
            id: state.next_id,
            form_id: start.form_id,
            respondent_id: start.respondent_id,
            status: SubmissionStatus::InProgress.as_str().into(),
            started_at: start.started_at,
            submitted_at: None,
        };
        state.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Submission>, Error> {
        Ok(self.0.borrow().submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn query(&mut self, query: &SubmissionQuery) -> Result<Vec<Submission>, Error> {
        Ok(self
            .0
            .borrow()
            .submissions
            .iter()
            .filter(|s| query.form_id_eq.map_or(true, |fid| s.form_id == fid))
            .filter(|s| query.respondent_id_eq.map_or(true, |rid| s.respondent_id == rid))
            .filter(|s| query.status_eq.as_deref().map_or(true, |status| s.status == status))
            .cloned()
            .collect())
    }

    async fn count(&mut self, query: &SubmissionQuery) -> Result<i64, Error> {
        Ok(SubmissionCommon::query(self, query).await?.len() as i64)
    }

    async fn mark_submitted(&mut self, id: i32, at: DateTime<Utc>) -> Result<Option<Submission>, Error> {
        let mut state = self.0.borrow_mut();
        match state.submissions.iter_mut().find(|s| s.id == id && s.status == SubmissionStatus::InProgress.as_str()) {
            Some(row) => {
                row.status = SubmissionStatus::Submitted.as_str().into();
                row.submitted_at = Some(at);
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }
}

impl AnswerCommon for MemStore {
    async fn upsert(&mut self, answer: AnswerUpsert) -> Result<i32, Error> {
        let mut state = self.0.borrow_mut();
        if let Some(row) = state
            .answers
            .iter_mut()
            .find(|a| a.submission_id == answer.submission_id && a.question_id == answer.question_id)
        {
            row.text_value = answer.text_value;
            return Ok(row.id);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.answers.push(AnswerRow {
            id,
            submission_id: answer.submission_id,
            question_id: answer.question_id,
            text_value: answer.text_value,
        });
        Ok(id)
    }

    async fn replace_selected_options(&mut self, answer_id: i32, option_ids: Vec<i32>) -> Result<(), Error> {
        let mut state = self.0.borrow_mut();
        state.selections.retain(|(aid, _)| *aid != answer_id);
        for option_id in option_ids {
            if !state.selections.contains(&(answer_id, option_id)) {
                state.selections.push((answer_id, option_id));
            }
        }
        Ok(())
    }

    async fn query_by_submission(&mut self, submission_id: i32) -> Result<Vec<AnswerRow>, Error> {
        Ok(self.0.borrow().answers.iter().filter(|a| a.submission_id == submission_id).cloned().collect())
    }

    async fn selections_by_submission(&mut self, submission_id: i32) -> Result<Vec<Selection>, Error> {
        let state = self.0.borrow();
        let answer_ids: Vec<i32> = state.answers.iter().filter(|a| a.submission_id == submission_id).map(|a| a.id).collect();
        Ok(state
            .selections
            .iter()
            .filter(|(aid, _)| answer_ids.contains(aid))
            .map(|(aid, oid)| Selection {
                answer_id: *aid,
                option_id: *oid,
                label: state
                    .options
                    .iter()
                    .find(|o| o.id == *oid)
                    .map(|o| o.label.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

impl Common for MemStore {}
impl Store for MemStore {}

impl TxStore for MemStore {
    async fn commit(self) -> Result<(), Error> {
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}
