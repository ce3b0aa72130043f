use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{query, query_as, query_scalar, Executor, PgPool, Postgres, QueryBuilder, Transaction};

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

pub struct PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e>,
{
    executor: E,
}

impl<E> PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E> UserCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, user: UserInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO users (nickname, email, password, salt, role) VALUES ($1, $2, $3, $4, $5) RETURNING id")
            .bind(user.nickname)
            .bind(user.email)
            .bind(user.password)
            .bind(user.salt)
            .bind(user.role)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(id)
    }

    async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, Error> {
        let user = query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&mut self.executor).await?;
        Ok(user)
    }
}

impl<E> FormCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, form: FormInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO forms (title, description, owner_id) VALUES ($1, $2, $3) RETURNING id")
            .bind(form.title)
            .bind(form.description)
            .bind(form.owner_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Form>, Error> {
        let form = query_as("SELECT * FROM forms WHERE id = $1").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(form)
    }

    async fn update(&mut self, id: i32, form: FormUpdate) -> Result<(), Error> {
        query("UPDATE forms SET title = $1, description = $2, is_published = $3 WHERE id = $4")
            .bind(form.title)
            .bind(form.description)
            .bind(form.is_published)
            .bind(id)
            .execute(&mut self.executor)
            .await?;
        Ok(())
    }

    async fn query(&mut self, query: &FormQuery, pagination: Option<Pagination>) -> Result<Vec<Form>, Error> {
        let mut stmt = QueryBuilder::new("SELECT * FROM forms WHERE 1 = 1");
        if let Some(owner_id) = query.owner_id_eq {
            stmt.push(" AND owner_id = ").push_bind(owner_id);
        }
        stmt.push(" ORDER BY id");
        if let Some(pagination) = pagination {
            stmt.push(" LIMIT ").push_bind(pagination.size);
            stmt.push(" OFFSET ").push_bind(pagination.offset());
        }
        let forms = stmt.build_query_as().fetch_all(&mut self.executor).await?;
        Ok(forms)
    }

    async fn count(&mut self, query: &FormQuery) -> Result<i64, Error> {
        let mut stmt = QueryBuilder::new("SELECT COUNT(*) FROM forms WHERE 1 = 1");
        if let Some(owner_id) = query.owner_id_eq {
            stmt.push(" AND owner_id = ").push_bind(owner_id);
        }
        let (total,) = stmt.build_query_as().fetch_one(&mut self.executor).await?;
        Ok(total)
    }
}

impl<E> QuestionCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, question: QuestionInsert) -> Result<i32, Error> {
        let id = query_scalar(
            "INSERT INTO questions (form_id, label, type_, is_required, min_choices, max_choices, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id",
        )
        .bind(question.form_id)
        .bind(question.label)
        .bind(question.type_)
        .bind(question.is_required)
        .bind(question.min_choices)
        .bind(question.max_choices)
        .bind(question.order_index)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(id)
    }

    async fn query_by_form(&mut self, form_id: i32) -> Result<Vec<Question>, Error> {
        let questions = query_as("SELECT * FROM questions WHERE form_id = $1 ORDER BY order_index")
            .bind(form_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(questions)
    }

    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Question>, Error> {
        let questions = query_as("SELECT * FROM questions WHERE id = ANY($1)").bind(ids).fetch_all(&mut self.executor).await?;
        Ok(questions)
    }
}

impl<E> OptionCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, option: OptionInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO question_options (question_id, label, value, order_index) VALUES ($1, $2, $3, $4) RETURNING id")
            .bind(option.question_id)
            .bind(option.label)
            .bind(option.value)
            .bind(option.order_index)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(id)
    }

    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<Opt>, Error> {
        let options = query_as("SELECT * FROM question_options WHERE question_id = $1 ORDER BY order_index")
            .bind(question_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(options)
    }

    async fn get_by_ids(&mut self, ids: Vec<i32>) -> Result<Vec<Opt>, Error> {
        let options = query_as("SELECT * FROM question_options WHERE id = ANY($1)").bind(ids).fetch_all(&mut self.executor).await?;
        Ok(options)
    }
}

impl<E> SubmissionCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_or_fetch_in_progress(&mut self, start: SubmissionStart) -> Result<Submission, Error> {
        // the partial unique index arbitrates racing starts; a losing
        // insert falls through to the winner's row
        let created: Option<Submission> = query_as(
            "INSERT INTO submissions (form_id, respondent_id, status, started_at)
            VALUES ($1, $2, 'in_progress', $3)
            ON CONFLICT (form_id, respondent_id) WHERE status = 'in_progress' DO NOTHING
            RETURNING *",
        )
        .bind(start.form_id)
        .bind(start.respondent_id)
        .bind(start.started_at)
        .fetch_optional(&mut self.executor)
        .await?;
        if let Some(submission) = created {
            return Ok(submission);
        }
        let existing = query_as("SELECT * FROM submissions WHERE form_id = $1 AND respondent_id = $2 AND status = 'in_progress'")
            .bind(start.form_id)
            .bind(start.respondent_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(existing)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Submission>, Error> {
        let submission = query_as("SELECT * FROM submissions WHERE id = $1").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(submission)
    }

    async fn query(&mut self, query: &SubmissionQuery) -> Result<Vec<Submission>, Error> {
        let mut stmt = QueryBuilder::new("SELECT * FROM submissions WHERE 1 = 1");
        if let Some(form_id) = query.form_id_eq {
            stmt.push(" AND form_id = ").push_bind(form_id);
        }
        if let Some(respondent_id) = query.respondent_id_eq {
            stmt.push(" AND respondent_id = ").push_bind(respondent_id);
        }
        if let Some(status) = &query.status_eq {
            stmt.push(" AND status = ").push_bind(status.clone());
        }
        stmt.push(" ORDER BY started_at");
        let submissions = stmt.build_query_as().fetch_all(&mut self.executor).await?;
        Ok(submissions)
    }

    async fn count(&mut self, query: &SubmissionQuery) -> Result<i64, Error> {
        let mut stmt = QueryBuilder::new("SELECT COUNT(*) FROM submissions WHERE 1 = 1");
        if let Some(form_id) = query.form_id_eq {
            stmt.push(" AND form_id = ").push_bind(form_id);
        }
        if let Some(respondent_id) = query.respondent_id_eq {
            stmt.push(" AND respondent_id = ").push_bind(respondent_id);
        }
        if let Some(status) = &query.status_eq {
            stmt.push(" AND status = ").push_bind(status.clone());
        }
        let (total,) = stmt.build_query_as().fetch_one(&mut self.executor).await?;
        Ok(total)
    }

    async fn mark_submitted(&mut self, id: i32, at: DateTime<Utc>) -> Result<Option<Submission>, Error> {
        let submission = query_as(
            "UPDATE submissions
            SET status = $1, submitted_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *",
        )
        .bind(SubmissionStatus::Submitted.as_str())
        .bind(at)
        .bind(id)
        .bind(SubmissionStatus::InProgress.as_str())
        .fetch_optional(&mut self.executor)
        .await?;
        Ok(submission)
    }
}

impl<E> AnswerCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn upsert(&mut self, answer: AnswerUpsert) -> Result<i32, Error> {
        let id = query_scalar(
            "INSERT INTO answers (submission_id, question_id, text_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (submission_id, question_id) DO UPDATE SET text_value = EXCLUDED.text_value
            RETURNING id",
        )
        .bind(answer.submission_id)
        .bind(answer.question_id)
        .bind(answer.text_value)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(id)
    }

    async fn replace_selected_options(&mut self, answer_id: i32, option_ids: Vec<i32>) -> Result<(), Error> {
        query("DELETE FROM answer_selected_options WHERE answer_id = $1")
            .bind(answer_id)
            .execute(&mut self.executor)
            .await?;
        if option_ids.is_empty() {
            return Ok(());
        }
        QueryBuilder::new("INSERT INTO answer_selected_options (answer_id, option_id)")
            .push_values(option_ids.into_iter(), |mut b, option_id| {
                b.push_bind(answer_id);
                b.push_bind(option_id);
            })
            .build()
            .execute(&mut self.executor)
            .await?;
        Ok(())
    }

    async fn query_by_submission(&mut self, submission_id: i32) -> Result<Vec<AnswerRow>, Error> {
        let answers = query_as("SELECT * FROM answers WHERE submission_id = $1")
            .bind(submission_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(answers)
    }

    async fn selections_by_submission(&mut self, submission_id: i32) -> Result<Vec<Selection>, Error> {
        let selections = query_as(
            "SELECT aso.answer_id AS answer_id, aso.option_id AS option_id, qo.label AS label
            FROM answer_selected_options AS aso
            JOIN answers AS a ON aso.answer_id = a.id
            JOIN question_options AS qo ON aso.option_id = qo.id
            WHERE a.submission_id = $1",
        )
        .bind(submission_id)
        .fetch_all(&mut self.executor)
        .await?;
        Ok(selections)
    }
}

impl Common for PgSqlx<PoolConnection<Postgres>> {}
impl<'a> Common for PgSqlx<Transaction<'a, Postgres>> {}
impl Store for PgSqlx<PoolConnection<Postgres>> {}
impl<'a> Store for PgSqlx<Transaction<'a, Postgres>> {}

impl<'a> TxStore for PgSqlx<Transaction<'a, Postgres>> {
    async fn commit(self) -> Result<(), Error> {
        self.executor.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        self.executor.rollback().await?;
        Ok(())
    }
}

pub struct PgSqlxManager {
    pool: PgPool,
}

impl PgSqlxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<PgSqlx<Transaction<'static, Postgres>>, Error> {
        let tx = self.pool.begin().await?;
        Ok(PgSqlx::new(tx))
    }

    pub async fn acquire(&self) -> Result<PgSqlx<PoolConnection<Postgres>>, Error> {
        let conn = self.pool.acquire().await?;
        Ok(PgSqlx::new(conn))
    }
}
