use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;

use crate::core::models::answer::{Answer, AnswerInput, SelectedOption, Upsert as AnswerUpsert};
use crate::core::models::question::{Question, QuestionType};
use crate::core::models::submission::{Query as SubmissionQuery, Start, Submission, SubmissionDetail};
use crate::core::models::user::Role;
use crate::core::ports::repository::{AnswerCommon, FormCommon, OptionCommon, QuestionCommon, Store, SubmissionCommon, TxStore};
use crate::core::services::validation::{self, StoredAnswer};
use crate::error::Error;

/// Start (or resume) a submission. Starting twice for the same
/// (form, respondent) hands back the same open submission; the storage
/// layer's uniqueness constraint resolves concurrent starts.
pub async fn start<S>(store: &mut S, uid: i32, role: Role, form_id: i32) -> Result<Submission, Error>
where
    S: Store,
{
    let form = FormCommon::get(store, form_id).await?.ok_or(Error::NotFound { entity: "form", id: form_id })?;
    if !form.is_published && form.owner_id != uid && !role.is_admin() {
        return Err(Error::FormNotPublished(form_id));
    }
    SubmissionCommon::insert_or_fetch_in_progress(
        store,
        Start {
            form_id,
            respondent_id: uid,
            started_at: Utc::now(),
        },
    )
    .await
}

/// Loads a submission and checks that `uid` may still edit it: the
/// caller must be the respondent and the submission must not have been
/// finalized.
async fn load_editable<S>(store: &mut S, uid: i32, submission_id: i32) -> Result<Submission, Error>
where
    S: Store,
{
    let submission = SubmissionCommon::get(store, submission_id).await?.ok_or(Error::NotFound {
        entity: "submission",
        id: submission_id,
    })?;
    if submission.respondent_id != uid {
        return Err(Error::Forbidden("only the respondent may edit a submission".into()));
    }
    if !submission.is_in_progress() {
        return Err(Error::SubmissionNotEditable(submission_id));
    }
    Ok(submission)
}

/// Full-replace write of one answer: the text value is overwritten and
/// the selected-option set is deleted and re-inserted, all on the
/// caller's transaction. An omitted selection clears prior choices.
async fn apply_answer<S>(store: &mut S, submission_id: i32, question: &Question, input: &AnswerInput) -> Result<i32, Error>
where
    S: Store,
{
    let kind = question.kind()?;
    let text_value = if kind == QuestionType::Text { input.text_value.clone() } else { None };
    let selected = if kind.is_choice() { input.selected_set() } else { Vec::new() };
    let answer_id = AnswerCommon::upsert(
        store,
        AnswerUpsert {
            submission_id,
            question_id: question.id,
            text_value,
        },
    )
    .await?;
    AnswerCommon::replace_selected_options(store, answer_id, selected).await?;
    Ok(answer_id)
}

pub async fn upsert_answer<T>(mut tx: T, uid: i32, submission_id: i32, input: AnswerInput) -> Result<Answer, Error>
where
    T: TxStore,
{
    let submission = load_editable(&mut tx, uid, submission_id).await?;
    let question = QuestionCommon::get_by_ids(&mut tx, vec![input.question_id])
        .await?
        .into_iter()
        .next()
        .filter(|q| q.form_id == submission.form_id)
        .ok_or(Error::NotFound {
            entity: "question",
            id: input.question_id,
        })?;
    let options = OptionCommon::get_by_ids(&mut tx, input.selected_set()).await?;
    validation::validate_answer_shape(&question, &input, &options)?;
    let answer_id = apply_answer(&mut tx, submission.id, &question, &input).await?;
    tx.commit().await?;

    let kind = question.kind()?;
    let selected = if kind.is_choice() { input.selected_set() } else { Vec::new() };
    let selected_options = options
        .into_iter()
        .filter(|o| selected.contains(&o.id))
        .sorted_by_key(|o| o.order_index)
        .map(|o| SelectedOption {
            option_id: o.id,
            label: o.label,
        })
        .collect();
    Ok(Answer {
        id: answer_id,
        submission_id: submission.id,
        question_id: question.id,
        text_value: if kind == QuestionType::Text { input.text_value } else { None },
        selected_options,
    })
}

/// Replace all given answers, then finalize, as one transaction. The
/// whole batch is pre-checked (question membership, option ownership,
/// shape) before the first write; one bad reference rejects everything.
pub async fn upsert_answers_batch<T>(mut tx: T, uid: i32, submission_id: i32, inputs: Vec<AnswerInput>) -> Result<Submission, Error>
where
    T: TxStore,
{
    let submission = load_editable(&mut tx, uid, submission_id).await?;
    let question_ids: Vec<i32> = inputs.iter().map(|i| i.question_id).unique().collect();
    let questions_by_id: HashMap<i32, Question> = QuestionCommon::get_by_ids(&mut tx, question_ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();
    let option_ids: Vec<i32> = inputs.iter().flat_map(|i| i.selected_set()).unique().collect();
    let options = OptionCommon::get_by_ids(&mut tx, option_ids).await?;
    for input in &inputs {
        let question = questions_by_id
            .get(&input.question_id)
            .filter(|q| q.form_id == submission.form_id)
            .ok_or(Error::NotFound {
                entity: "question",
                id: input.question_id,
            })?;
        validation::validate_answer_shape(question, input, &options)?;
    }
    for input in &inputs {
        let question = &questions_by_id[&input.question_id];
        apply_answer(&mut tx, submission.id, question, input).await?;
    }
    let submitted = finalize(&mut tx, &submission).await?;
    tx.commit().await?;
    Ok(submitted)
}

pub async fn submit<T>(mut tx: T, uid: i32, submission_id: i32) -> Result<Submission, Error>
where
    T: TxStore,
{
    let submission = load_editable(&mut tx, uid, submission_id).await?;
    let submitted = finalize(&mut tx, &submission).await?;
    tx.commit().await?;
    Ok(submitted)
}

/// Completeness check over the persisted answers, then the terminal
/// `in_progress` -> `submitted` transition. Questions are walked in form
/// order and the first violation aborts, so the reported question is
/// deterministic for a given stored state.
async fn finalize<S>(store: &mut S, submission: &Submission) -> Result<Submission, Error>
where
    S: Store,
{
    let questions = QuestionCommon::query_by_form(store, submission.form_id).await?;
    let answers = AnswerCommon::query_by_submission(store, submission.id).await?;
    let selections = AnswerCommon::selections_by_submission(store, submission.id).await?;
    let counts = selections.iter().counts_by(|s| s.answer_id);
    let stored: HashMap<i32, StoredAnswer> = answers
        .into_iter()
        .map(|a| {
            let selected_count = counts.get(&a.id).copied().unwrap_or(0);
            (
                a.question_id,
                StoredAnswer {
                    text_value: a.text_value,
                    selected_count,
                },
            )
        })
        .collect();
    for question in &questions {
        validation::validate_answer_against_question(question, stored.get(&question.id))?;
    }
    SubmissionCommon::mark_submitted(store, submission.id, Utc::now())
        .await?
        .ok_or(Error::SubmissionNotEditable(submission.id))
}

pub async fn list_by_form<S>(store: &mut S, uid: i32, role: Role, form_id: i32) -> Result<(Vec<Submission>, i64), Error>
where
    S: Store,
{
    let form = FormCommon::get(store, form_id).await?.ok_or(Error::NotFound { entity: "form", id: form_id })?;
    if form.owner_id != uid && !role.is_admin() {
        return Err(Error::Forbidden("only the form owner may list submissions".into()));
    }
    let query = SubmissionQuery {
        form_id_eq: Some(form_id),
        ..Default::default()
    };
    let total = SubmissionCommon::count(store, &query).await?;
    let submissions = SubmissionCommon::query(store, &query).await?;
    Ok((submissions, total))
}

pub async fn submission_detail<S>(store: &mut S, uid: i32, role: Role, submission_id: i32) -> Result<SubmissionDetail, Error>
where
    S: Store,
{
    let submission = SubmissionCommon::get(store, submission_id).await?.ok_or(Error::NotFound {
        entity: "submission",
        id: submission_id,
    })?;
    if submission.respondent_id != uid && !role.is_admin() {
        let form = FormCommon::get(store, submission.form_id).await?.ok_or(Error::NotFound {
            entity: "form",
            id: submission.form_id,
        })?;
        if form.owner_id != uid {
            return Err(Error::Forbidden("not a party to this submission".into()));
        }
    }
    let answers = AnswerCommon::query_by_submission(store, submission_id).await?;
    let selections = AnswerCommon::selections_by_submission(store, submission_id).await?;
    let mut grouped: HashMap<i32, Vec<SelectedOption>> = selections
        .into_iter()
        .map(|s| {
            (
                s.answer_id,
                SelectedOption {
                    option_id: s.option_id,
                    label: s.label,
                },
            )
        })
        .into_group_map();
    let answers = answers
        .into_iter()
        .map(|a| Answer {
            id: a.id,
            submission_id: a.submission_id,
            question_id: a.question_id,
            text_value: a.text_value,
            selected_options: grouped.remove(&a.id).unwrap_or_default(),
        })
        .collect();
    Ok(SubmissionDetail {
        id: submission.id,
        form_id: submission.form_id,
        respondent_id: submission.respondent_id,
        status: submission.status,
        started_at: submission.started_at,
        submitted_at: submission.submitted_at,
        answers,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::models::submission::SubmissionStatus;
    use crate::core::services::teststore::MemStore;

    struct Fixture {
        store: MemStore,
        respondent: i32,
        owner: i32,
        form_id: i32,
        q_text: i32,
        q_radio: i32,
        o1: i32,
        o2: i32,
    }

    /// One published form: required text question, required radio
    /// question with two options.
    fn fixture() -> Fixture {
        let store = MemStore::default();
        let owner = store.add_user("owner");
        let respondent = store.add_user("respondent");
        let form_id = store.add_form(owner, true);
        let q_text = store.add_question(form_id, "text", true, None, None);
        let q_radio = store.add_question(form_id, "radio", true, None, None);
        let o1 = store.add_option(q_radio);
        let o2 = store.add_option(q_radio);
        Fixture {
            store,
            respondent,
            owner,
            form_id,
            q_text,
            q_radio,
            o1,
            o2,
        }
    }

    fn text_input(question_id: i32, text: &str) -> AnswerInput {
        AnswerInput {
            question_id,
            text_value: Some(text.into()),
            selected_option_ids: None,
        }
    }

    fn choice_input(question_id: i32, ids: Vec<i32>) -> AnswerInput {
        AnswerInput {
            question_id,
            text_value: None,
            selected_option_ids: Some(ids),
        }
    }

    #[tokio::test]
    async fn start_twice_returns_the_same_submission() {
        let f = fixture();
        let first = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let second = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(f.store.0.borrow().submissions.len(), 1);
    }

    #[tokio::test]
    async fn start_on_unpublished_form_is_owner_or_admin_only() {
        let f = fixture();
        let hidden = f.store.add_form(f.owner, false);
        let err = start(&mut f.store.clone(), f.respondent, Role::User, hidden).await.unwrap_err();
        assert!(matches!(err, Error::FormNotPublished(id) if id == hidden));
        assert!(start(&mut f.store.clone(), f.owner, Role::User, hidden).await.is_ok());
        assert!(start(&mut f.store.clone(), f.respondent, Role::Admin, hidden).await.is_ok());
    }

    #[tokio::test]
    async fn start_on_missing_form_is_not_found() {
        let f = fixture();
        let err = start(&mut f.store.clone(), f.respondent, Role::User, 999).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "form", id: 999 }));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_question() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "hello")).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "hello")).await.unwrap();
        let state = f.store.0.borrow();
        assert_eq!(state.answers.len(), 1);
        assert_eq!(state.answers[0].text_value.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn duplicate_selections_collapse_and_empty_clears() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let q_multi = f.store.add_question(f.form_id, "checkbox", false, None, None);
        let a = f.store.add_option(q_multi);
        let b = f.store.add_option(q_multi);
        let answer = upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(q_multi, vec![a, a, b]))
            .await
            .unwrap();
        let chosen: Vec<i32> = answer.selected_options.iter().map(|o| o.option_id).collect();
        assert_eq!(chosen, vec![a, b]);
        assert_eq!(f.store.0.borrow().selections.len(), 2);

        let cleared = upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(q_multi, vec![])).await.unwrap();
        assert!(cleared.selected_options.is_empty());
        assert!(f.store.0.borrow().selections.is_empty());
    }

    #[tokio::test]
    async fn text_answer_with_selection_mutates_nothing() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let mut bad = text_input(f.q_text, "hello");
        bad.selected_option_ids = Some(vec![f.o1]);
        let err = upsert_answer(f.store.clone(), f.respondent, s.id, bad).await.unwrap_err();
        assert!(matches!(err, Error::IncompatibleField { question_id } if question_id == f.q_text));
        assert!(f.store.0.borrow().answers.is_empty());
    }

    #[tokio::test]
    async fn option_of_another_question_is_rejected() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let q_other = f.store.add_question(f.form_id, "radio", false, None, None);
        let foreign = f.store.add_option(q_other);
        let err = upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(f.q_radio, vec![foreign]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { option_id, .. } if option_id == foreign));
    }

    #[tokio::test]
    async fn question_of_another_form_is_not_found() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let other_form = f.store.add_form(f.owner, true);
        let stray = f.store.add_question(other_form, "text", false, None, None);
        let err = upsert_answer(f.store.clone(), f.respondent, s.id, text_input(stray, "hello")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "question", id } if id == stray));
    }

    #[tokio::test]
    async fn only_the_respondent_may_edit() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let err = upsert_answer(f.store.clone(), f.owner, s.id, text_input(f.q_text, "hello")).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn submit_transitions_once_and_only_once() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "hello")).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(f.q_radio, vec![f.o1])).await.unwrap();
        let submitted = submit(f.store.clone(), f.respondent, s.id).await.unwrap();
        assert_eq!(submitted.status, SubmissionStatus::Submitted.as_str());
        assert!(submitted.submitted_at.is_some());

        let err = submit(f.store.clone(), f.respondent, s.id).await.unwrap_err();
        assert!(matches!(err, Error::SubmissionNotEditable(id) if id == s.id));
        let err = upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "late")).await.unwrap_err();
        assert!(matches!(err, Error::SubmissionNotEditable(_)));
    }

    #[tokio::test]
    async fn submit_reports_the_first_unmet_question_in_form_order() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        // both questions unanswered; the text question comes first
        let err = submit(f.store.clone(), f.respondent, s.id).await.unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id } if question_id == f.q_text));
    }

    #[tokio::test]
    async fn submit_with_unanswered_radio_stays_in_progress() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "hello")).await.unwrap();
        let err = submit(f.store.clone(), f.respondent, s.id).await.unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id } if question_id == f.q_radio));
        let state = f.store.0.borrow();
        assert_eq!(state.submissions[0].status, SubmissionStatus::InProgress.as_str());
        assert!(state.submissions[0].submitted_at.is_none());
    }

    #[tokio::test]
    async fn whitespace_text_fails_required_check() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, text_input(f.q_text, "   ")).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(f.q_radio, vec![f.o2])).await.unwrap();
        let err = submit(f.store.clone(), f.respondent, s.id).await.unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id } if question_id == f.q_text));
    }

    #[tokio::test]
    async fn batch_upsert_writes_everything_and_submits() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let submitted = upsert_answers_batch(
            f.store.clone(),
            f.respondent,
            s.id,
            vec![text_input(f.q_text, "hello"), choice_input(f.q_radio, vec![f.o1])],
        )
        .await
        .unwrap();
        assert_eq!(submitted.status, SubmissionStatus::Submitted.as_str());
        assert_eq!(f.store.0.borrow().answers.len(), 2);
    }

    #[tokio::test]
    async fn batch_with_one_bad_reference_writes_nothing() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let err = upsert_answers_batch(
            f.store.clone(),
            f.respondent,
            s.id,
            vec![text_input(f.q_text, "hello"), choice_input(f.q_radio, vec![999])],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { option_id: 999, .. }));
        assert!(f.store.0.borrow().answers.is_empty());
    }

    #[tokio::test]
    async fn batch_that_fails_completeness_submits_nothing() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let err = upsert_answers_batch(f.store.clone(), f.respondent, s.id, vec![text_input(f.q_text, "hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id } if question_id == f.q_radio));
        assert_eq!(f.store.0.borrow().submissions[0].status, SubmissionStatus::InProgress.as_str());
    }

    #[tokio::test]
    async fn listing_is_owner_or_admin_only() {
        let f = fixture();
        start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        let err = list_by_form(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let (subs, total) = list_by_form(&mut f.store.clone(), f.owner, Role::User, f.form_id).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(subs.len(), 1);
        assert!(list_by_form(&mut f.store.clone(), f.respondent, Role::Admin, f.form_id).await.is_ok());
    }

    #[tokio::test]
    async fn detail_resolves_option_labels() {
        let f = fixture();
        let s = start(&mut f.store.clone(), f.respondent, Role::User, f.form_id).await.unwrap();
        upsert_answer(f.store.clone(), f.respondent, s.id, choice_input(f.q_radio, vec![f.o2])).await.unwrap();
        let detail = submission_detail(&mut f.store.clone(), f.respondent, Role::User, s.id).await.unwrap();
        assert_eq!(detail.answers.len(), 1);
        assert_eq!(detail.answers[0].selected_options[0].option_id, f.o2);
        assert!(!detail.answers[0].selected_options[0].label.is_empty());

        let err = submission_detail(&mut f.store.clone(), f.owner + f.respondent, Role::User, s.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
