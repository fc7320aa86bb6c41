use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use serde::Serialize;
use todo_core::{
    validate_item, CreateItemInput, Envelope, Filters, ItemDraft, UpdateItemInput, Validator,
    ITEM_SORT_SAFELIST,
};

use crate::errors::ApiFailure;
use crate::json::{read_json, write_json};
use crate::AppState;

#[derive(Debug, Serialize)]
struct SystemInfo {
    environment: &'static str,
    version: &'static str,
}

pub(crate) async fn healthcheck(State(state): State<AppState>) -> Result<Response, ApiFailure> {
    let info = SystemInfo {
        environment: state.config.environment.as_str(),
        version: crate::config::VERSION,
    };
    let envelope = Envelope::new().with("status", "available")?.with("system_info", &info)?;
    write_json(StatusCode::OK, &envelope, HeaderMap::new())
}

pub(crate) async fn create_item(
    State(state): State<AppState>,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiFailure> {
    let input: CreateItemInput = read_json(payload)?;
    let draft = ItemDraft::from(input);
    ensure_valid(&draft)?;

    let item = state.store.insert(&draft).await?;

    let location = HeaderValue::from_str(&format!("/v1/todo/{}", item.id))
        .map_err(|err| ApiFailure::server_error(&err))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, location);
    write_json(StatusCode::CREATED, &Envelope::new().with("item", &item)?, headers)
}

pub(crate) async fn show_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiFailure> {
    let id = read_id_param(&raw_id)?;
    let item = state.store.get(id).await?;
    write_json(StatusCode::OK, &Envelope::new().with("item", &item)?, HeaderMap::new())
}

pub(crate) async fn update_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiFailure> {
    let id = read_id_param(&raw_id)?;
    let mut item = state.store.get(id).await?;

    let input: UpdateItemInput = read_json(payload)?;
    input.merge_into(&mut item);
    ensure_valid(&item.draft())?;

    let item = state.store.update(&item).await?;
    write_json(StatusCode::OK, &Envelope::new().with("todo", &item)?, HeaderMap::new())
}

pub(crate) async fn delete_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiFailure> {
    let id = read_id_param(&raw_id)?;
    state.store.delete(id).await?;
    let envelope = Envelope::new().with("message", "Item successfully deleted")?;
    write_json(StatusCode::OK, &envelope, HeaderMap::new())
}

pub(crate) async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiFailure> {
    let mut v = Validator::new();
    let filters = Filters::from_query(
        query_param(&params, "page"),
        query_param(&params, "page_size"),
        query_param(&params, "sort"),
        ITEM_SORT_SAFELIST,
        &mut v,
    );
    if !v.valid() {
        return Err(ApiFailure::failed_validation(v.into_errors()));
    }

    let name = query_param(&params, "item").unwrap_or_default();
    let description = query_param(&params, "description").unwrap_or_default();
    let (items, metadata) = state.store.list(name, description, &filters).await?;

    let envelope = Envelope::new().with("todo", &items)?.with("metadata", &metadata)?;
    write_json(StatusCode::OK, &envelope, HeaderMap::new())
}

pub(crate) async fn method_not_allowed(method: Method) -> ApiFailure {
    ApiFailure::method_not_allowed(&method)
}

pub(crate) async fn not_found() -> ApiFailure {
    ApiFailure::not_found()
}

fn query_param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

/// Ids that do not parse or are below 1 cannot name a record.
fn read_id_param(raw: &str) -> Result<i64, ApiFailure> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiFailure::not_found()),
    }
}

fn ensure_valid(draft: &ItemDraft) -> Result<(), ApiFailure> {
    let mut v = Validator::new();
    validate_item(&mut v, draft);
    if v.valid() {
        Ok(())
    } else {
        Err(ApiFailure::failed_validation(v.into_errors()))
    }
}
