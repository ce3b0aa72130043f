use crate::core::models::{
    common::Pagination,
    form::{Form, FormCreate, FormDetail, Insert as FormInsert, Query as FormQuery, Update as FormUpdate},
    option::Insert as OptionInsert,
    question::{Insert as QuestionInsert, QuestionCreate, QuestionType, QuestionWithOptions},
    user::Role,
};
use crate::core::ports::repository::{FormCommon, OptionCommon, QuestionCommon, Store, TxStore};
use crate::error::Error;

/// Authoring-time schema rules: text questions carry neither bounds nor
/// options; radio bounds, when present, are pinned to one; checkbox
/// bounds must be coherent.
fn validate_question_schema(question: &QuestionCreate) -> Result<(), Error> {
    match question.type_ {
        QuestionType::Text => {
            if question.min_choices.is_some() || question.max_choices.is_some() {
                return Err(Error::BusinessError("text questions cannot carry choice bounds".into()));
            }
            if !question.options.is_empty() {
                return Err(Error::BusinessError("text questions cannot have options".into()));
            }
        }
        QuestionType::Radio => {
            if question.min_choices.map_or(false, |m| m != 1) || question.max_choices.map_or(false, |m| m != 1) {
                return Err(Error::BusinessError("radio bounds, when set, must both be 1".into()));
            }
        }
        QuestionType::Checkbox => {
            if question.min_choices.map_or(false, |m| m < 0) || question.max_choices.map_or(false, |m| m < 0) {
                return Err(Error::BusinessError("choice bounds must be non-negative".into()));
            }
            if let (Some(min), Some(max)) = (question.min_choices, question.max_choices) {
                if min > max {
                    return Err(Error::BusinessError("min_choices cannot exceed max_choices".into()));
                }
            }
        }
    }
    Ok(())
}

/// Create a form together with its ordered questions and options in one
/// transaction.
pub async fn create_form<T>(mut tx: T, uid: i32, form: FormCreate) -> Result<i32, Error>
where
    T: TxStore,
{
    for question in &form.questions {
        validate_question_schema(question)?;
    }
    let form_id = FormCommon::insert(
        &mut tx,
        FormInsert {
            title: form.title,
            description: form.description,
            owner_id: uid,
        },
    )
    .await?;
    for (question_index, question) in form.questions.into_iter().enumerate() {
        let question_id = QuestionCommon::insert(
            &mut tx,
            QuestionInsert {
                form_id,
                label: question.label,
                type_: question.type_.as_str().into(),
                is_required: question.is_required,
                min_choices: question.min_choices,
                max_choices: question.max_choices,
                order_index: question_index as i32,
            },
        )
        .await?;
        for (option_index, option) in question.options.into_iter().enumerate() {
            OptionCommon::insert(
                &mut tx,
                OptionInsert {
                    question_id,
                    label: option.label,
                    value: option.value,
                    order_index: option_index as i32,
                },
            )
            .await?;
        }
    }
    tx.commit().await?;
    Ok(form_id)
}

pub async fn form_detail<S>(store: &mut S, uid: i32, role: Role, form_id: i32) -> Result<FormDetail, Error>
where
    S: Store,
{
    let form = FormCommon::get(store, form_id).await?.ok_or(Error::NotFound { entity: "form", id: form_id })?;
    if !form.is_published && form.owner_id != uid && !role.is_admin() {
        return Err(Error::FormNotPublished(form_id));
    }
    let questions = QuestionCommon::query_by_form(store, form_id).await?;
    let mut detailed = Vec::with_capacity(questions.len());
    for question in questions {
        let options = OptionCommon::query_by_question(store, question.id).await?;
        detailed.push(QuestionWithOptions {
            id: question.id,
            label: question.label,
            type_: question.type_,
            is_required: question.is_required,
            min_choices: question.min_choices,
            max_choices: question.max_choices,
            order_index: question.order_index,
            options,
        });
    }
    Ok(FormDetail {
        id: form.id,
        title: form.title,
        description: form.description,
        owner_id: form.owner_id,
        is_published: form.is_published,
        created_at: form.created_at,
        questions: detailed,
    })
}

pub async fn query_forms<S>(store: &mut S, uid: i32, pagination: Pagination) -> Result<(Vec<Form>, i64), Error>
where
    S: Store,
{
    let query = FormQuery { owner_id_eq: Some(uid) };
    let total = FormCommon::count(store, &query).await?;
    let forms = FormCommon::query(store, &query, Some(pagination)).await?;
    Ok((forms, total))
}

pub async fn update_form<S>(store: &mut S, uid: i32, role: Role, form_id: i32, update: FormUpdate) -> Result<(), Error>
where
    S: Store,
{
    let form = FormCommon::get(store, form_id).await?.ok_or(Error::NotFound { entity: "form", id: form_id })?;
    if form.owner_id != uid && !role.is_admin() {
        return Err(Error::Forbidden("only the form owner may update it".into()));
    }
    FormCommon::update(store, form_id, update).await
}
