use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure that ends the process before or while serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn attached_report_travels_with_response() {
        let mut response = StatusCode::CONFLICT.into_response();
        ErrorReport::from_message("test", StatusCode::CONFLICT, "duplicate").attach(&mut response);

        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.source, "test");
        assert_eq!(report.messages, vec!["duplicate".to_string()]);
    }

    #[test]
    fn infra_errors_display_transparently() {
        let error = AppError::from(InfraError::configuration("database url is not configured"));
        assert_eq!(
            error.to_string(),
            "configuration error: database url is not configured"
        );
    }
}
