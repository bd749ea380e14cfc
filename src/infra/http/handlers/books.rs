use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::application::repos::BookSearch;
use crate::cache::CacheKey;
use crate::domain::entities::BookDraft;
use crate::infra::http::error::{ApiError, catalog_to_api};
use crate::infra::http::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
}

pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> Result<Response, ApiError> {
    let key = CacheKey::book_search(&query.title, &query.genre, &query.author);
    if let Some(payload) = cached(&state, &key) {
        return Ok(json_payload(StatusCode::OK, payload));
    }

    let search = BookSearch {
        title: query.title,
        author: query.author,
        genre: query.genre,
    };
    let books = state.catalog.books(&search).await.map_err(catalog_to_api)?;
    let payload = encode(&books)?;
    state
        .responses
        .store(key, payload.clone(), state.cache_ttl);

    Ok(json_payload(StatusCode::OK, payload))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw_id)?;
    let key = CacheKey::book(id);
    if let Some(payload) = cached(&state, &key) {
        return Ok(json_payload(StatusCode::OK, payload));
    }

    let book = state.catalog.book(id).await.map_err(catalog_to_api)?;
    let payload = encode(&book)?;
    state
        .responses
        .store(key, payload.clone(), state.cache_ttl);

    Ok(json_payload(StatusCode::OK, payload))
}

pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<BookDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(draft) = payload.map_err(ApiError::invalid_json)?;
    let book = state
        .catalog
        .create_book(draft)
        .await
        .map_err(catalog_to_api)?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update_book(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<BookDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(draft) = payload.map_err(ApiError::invalid_json)?;
    let book = state
        .catalog
        .update_book(id, draft)
        .await
        .map_err(catalog_to_api)?;
    Ok(Json(book))
}

pub async fn delete_book(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    state
        .catalog
        .delete_book(id)
        .await
        .map_err(catalog_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

fn cached(state: &AppState, key: &CacheKey) -> Option<Bytes> {
    match state.responses.lookup(key) {
        Some(payload) => {
            counter!("bookstore_cache_hit_total").increment(1);
            Some(payload)
        }
        None => {
            counter!("bookstore_cache_miss_total").increment(1);
            None
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes, ApiError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|err| ApiError::internal(err.to_string()))
}

fn json_payload(status: StatusCode, payload: Bytes) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], payload).into_response()
}
