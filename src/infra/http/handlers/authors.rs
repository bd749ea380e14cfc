use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::parse_id;
use crate::domain::entities::AuthorDraft;
use crate::infra::http::error::{ApiError, catalog_to_api};
use crate::infra::http::state::AppState;

pub async fn list_authors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let authors = state.catalog.authors().await.map_err(catalog_to_api)?;
    Ok(Json(authors))
}

pub async fn get_author(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let author = state.catalog.author(id).await.map_err(catalog_to_api)?;
    Ok(Json(author))
}

pub async fn create_author(
    State(state): State<AppState>,
    payload: Result<Json<AuthorDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(draft) = payload.map_err(ApiError::invalid_json)?;
    let author = state
        .catalog
        .create_author(draft)
        .await
        .map_err(catalog_to_api)?;
    Ok((StatusCode::CREATED, Json(author)))
}

pub async fn update_author(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<AuthorDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(draft) = payload.map_err(ApiError::invalid_json)?;
    let author = state
        .catalog
        .update_author(id, draft)
        .await
        .map_err(catalog_to_api)?;
    Ok(Json(author))
}

pub async fn delete_author(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    state
        .catalog
        .delete_author(id)
        .await
        .map_err(catalog_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
