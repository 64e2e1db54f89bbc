//! Process-level failures and the JSON error body every router answers with.

use crate::config::ConfigError;
use crate::import::ImportError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("import error: {0}")]
    Import(#[from] ImportError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Import(ImportError::Csv(_)) => StatusCode::BAD_REQUEST,
            AppError::Import(ImportError::Records(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}

/// `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn missing_identity() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        format!("missing {} header", crate::audit::USER_HEADER),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn app_errors_render_as_json() {
        let csv_failure = crate::import::FamilyImporter::dry_run("Given Name\nAda\n".as_bytes())
            .expect_err("missing Ref column");
        let response = AppError::from(csv_failure).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert!(body["error"]
            .as_str()
            .expect("message")
            .starts_with("import error:"));

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let response = AppError::from(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_identity_names_the_header() {
        let response = missing_identity();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await["error"], "missing x-kindred-user header");
    }
}
