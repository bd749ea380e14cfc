use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use metrics::counter;
use tracing::info;

use crate::domain::credentials::Credentials;
use crate::infra::http::error::{ApiError, auth_to_api};
use crate::infra::http::state::AppState;

pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(credentials) = payload.map_err(ApiError::invalid_json)?;
    let credential = state.auth.sign_up(credentials).await.map_err(auth_to_api)?;

    counter!("bookstore_tokens_issued_total").increment(1);
    info!(
        target = "bookstore::http::auth",
        user_id = credential.subject_id,
        "user signed up"
    );
    Ok(credential.token.to_string())
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(credentials) = payload.map_err(ApiError::invalid_json)?;
    let credential = state.auth.login(credentials).await.map_err(auth_to_api)?;

    counter!("bookstore_tokens_issued_total").increment(1);
    Ok(credential.token.to_string())
}
