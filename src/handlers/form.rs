use actix_web::web::{Data, Json, Path, Query};
use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::Value;

use crate::core::models::common::Pagination;
use crate::core::models::form::{Form, FormCreate, Update as FormUpdate};
use crate::core::ports::cache::Cache;
use crate::core::services::form as form_service;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;
use crate::response::{CreateResponse, List};
use crate::context::UserInfo;

pub async fn create(user_info: UserInfo, Json(form): Json<FormCreate>, manager: Data<PgSqlxManager>) -> Result<Json<CreateResponse>, Error> {
    let tx = manager.begin().await?;
    let id = form_service::create_form(tx, user_info.id, form).await?;
    Ok(Json(CreateResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: i64,
    size: i64,
}

pub async fn list(user_info: UserInfo, Query(ListParams { page, size }): Query<ListParams>, manager: Data<PgSqlxManager>) -> Result<Json<List<Form>>, Error> {
    let mut store = manager.acquire().await?;
    let (forms, total) = form_service::query_forms(&mut store, user_info.id, Pagination::new(page, size)).await?;
    Ok(Json(List::new(forms, total)))
}

pub async fn detail<C: Cache + 'static>(user_info: UserInfo, form_id: Path<(i32,)>, manager: Data<PgSqlxManager>, cache: Data<C>) -> Result<Json<Value>, Error> {
    let form_id = form_id.into_inner().0;
    let key = format!("form:{}", form_id);
    if let Some(hit) = cache.get(&key) {
        return Ok(Json(hit));
    }
    let mut store = manager.acquire().await?;
    let detail = form_service::form_detail(&mut store, user_info.id, user_info.role, form_id).await?;
    let value = serde_json::to_value(&detail).map_err(|e| Error::ServerError(e.to_string()))?;
    // unpublished forms are visible to their owner only, so they never
    // enter the shared cache
    if detail.is_published {
        cache.put(key, value.clone());
    }
    Ok(Json(value))
}

pub async fn update<C: Cache + 'static>(
    user_info: UserInfo,
    form_id: Path<(i32,)>,
    Json(update): Json<FormUpdate>,
    manager: Data<PgSqlxManager>,
    cache: Data<C>,
) -> Result<HttpResponse, Error> {
    let form_id = form_id.into_inner().0;
    let mut store = manager.acquire().await?;
    form_service::update_form(&mut store, user_info.id, user_info.role, form_id, update).await?;
    cache.invalidate(&[format!("form:{}", form_id)]);
    Ok(HttpResponse::Ok().finish())
}
