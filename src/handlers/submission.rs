use actix_web::web::{Data, Json, Path};

use crate::context::UserInfo;
use crate::core::models::answer::{Answer, AnswerInput};
use crate::core::models::submission::{Submission, SubmissionDetail};
use crate::core::ports::cache::Cache;
use crate::core::services::submission as submission_service;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;
use crate::response::List;

pub async fn start<C: Cache + 'static>(user_info: UserInfo, form_id: Path<(i32,)>, manager: Data<PgSqlxManager>, cache: Data<C>) -> Result<Json<Submission>, Error> {
    let form_id = form_id.into_inner().0;
    let mut store = manager.acquire().await?;
    let submission = submission_service::start(&mut store, user_info.id, user_info.role, form_id).await?;
    cache.invalidate(&[format!("form:{}:submissions", form_id)]);
    Ok(Json(submission))
}

pub async fn list_by_form(user_info: UserInfo, form_id: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<Json<List<Submission>>, Error> {
    let mut store = manager.acquire().await?;
    let (submissions, total) = submission_service::list_by_form(&mut store, user_info.id, user_info.role, form_id.into_inner().0).await?;
    Ok(Json(List::new(submissions, total)))
}

pub async fn detail(user_info: UserInfo, submission_id: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<Json<SubmissionDetail>, Error> {
    let mut store = manager.acquire().await?;
    let detail = submission_service::submission_detail(&mut store, user_info.id, user_info.role, submission_id.into_inner().0).await?;
    Ok(Json(detail))
}

pub async fn upsert_answer<C: Cache + 'static>(
    user_info: UserInfo,
    submission_id: Path<(i32,)>,
    Json(input): Json<AnswerInput>,
    manager: Data<PgSqlxManager>,
    cache: Data<C>,
) -> Result<Json<Answer>, Error> {
    let submission_id = submission_id.into_inner().0;
    let tx = manager.begin().await?;
    let answer = submission_service::upsert_answer(tx, user_info.id, submission_id, input).await?;
    cache.invalidate(&[format!("submission:{}", submission_id)]);
    Ok(Json(answer))
}

pub async fn upsert_answers_batch<C: Cache + 'static>(
    user_info: UserInfo,
    submission_id: Path<(i32,)>,
    Json(inputs): Json<Vec<AnswerInput>>,
    manager: Data<PgSqlxManager>,
    cache: Data<C>,
) -> Result<Json<Submission>, Error> {
    let submission_id = submission_id.into_inner().0;
    let tx = manager.begin().await?;
    let submission = submission_service::upsert_answers_batch(tx, user_info.id, submission_id, inputs).await?;
    cache.invalidate(&[format!("submission:{}", submission_id), format!("form:{}:submissions", submission.form_id)]);
    Ok(Json(submission))
}

pub async fn submit<C: Cache + 'static>(user_info: UserInfo, submission_id: Path<(i32,)>, manager: Data<PgSqlxManager>, cache: Data<C>) -> Result<Json<Submission>, Error> {
    let submission_id = submission_id.into_inner().0;
    let tx = manager.begin().await?;
    let submission = submission_service::submit(tx, user_info.id, submission_id).await?;
    cache.invalidate(&[format!("submission:{}", submission_id), format!("form:{}:submissions", submission.form_id)]);
    Ok(Json(submission))
}
