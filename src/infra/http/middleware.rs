use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderValue;
use axum::{body::Body, http::Request, middleware::Next, response::IntoResponse, response::Response};
use metrics::counter;
use tracing::{error, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::application::error::ErrorReport;

const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Subject id resolved by the bearer gate.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client = client_identity(&request);
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let user_id = response
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.user_id.to_string())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "bookstore::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                client = %client,
                user_id = %user_id,
                "request failed",
            );
        } else {
            warn!(
                target = "bookstore::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                client = %client,
                user_id = %user_id,
                "client request error",
            );
        }
    }

    response
}

/// Rejects clients that exhausted their admission budget with 429.
pub async fn admission_gate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(&request);

    if state.admission.check(&client).is_err() {
        counter!("bookstore_admission_rejected_total").increment(1);
        let retry_after = retry_after_secs(state.admission.retry_after(&client));
        return ApiError::rate_limited(retry_after);
    }

    next.run(request).await
}

pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user_id = match extract_token(request.headers().get(axum::http::header::AUTHORIZATION))
        .map(|token| state.tokens.validate(&token))
    {
        Some(Ok(user_id)) => user_id,
        Some(Err(_)) | None => {
            counter!("bookstore_auth_rejected_total").increment(1);
            return ApiError::unauthorized().into_response();
        }
    };

    let user = AuthenticatedUser { user_id };
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

/// Bounds the time a handler may take before the caller gets 503.
pub async fn request_deadline(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::request_timeout().into_response(),
    }
}

fn client_identity(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_tokens_only() {
        let header = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_token(Some(&header)), Some("abc".to_string()));

        let bare = HeaderValue::from_static("abc");
        assert_eq!(extract_token(Some(&bare)), None);
        assert_eq!(extract_token(None), None);
    }

    #[test]
    fn retry_after_rounds_up_with_floor_of_one() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(200)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1_500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(999)), 999);
    }

    #[test]
    fn client_identity_uses_peer_ip() {
        let mut request = Request::new(Body::empty());
        assert_eq!(client_identity(&request), UNKNOWN_CLIENT);

        let addr: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_identity(&request), "10.1.2.3");
    }
}
