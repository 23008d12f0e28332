//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError`
//! converts with `?` and renders as `{error, details, code}` with the status
//! from its [`ErrorMetadata`].

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use wavepeak_core::{AppError, ErrorMetadata, LogLevel};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Client-facing summary, e.g. "Dropbox authentication failed"
    pub error: String,
    /// Full error message, e.g. the analyzer's stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        // Validation errors already say everything in `error`.
        let details = match error {
            AppError::BadRequest(_) => None,
            other => Some(other.details()),
        };
        Self {
            error: error.client_message(),
            details,
            code: error.error_code().to_string(),
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from wavepeak-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(rejection.body_text()))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
/// Use this instead of `Json<T>` when you want a consistent API error shape for invalid bodies.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, error_code, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, error_code, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type, error_code, "Request failed");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(ErrorResponse::from_app_error(app_error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavepeak_core::PersistTarget;

    #[test]
    fn test_bad_request_has_no_details() {
        let response = ErrorResponse::from_app_error(&AppError::BadRequest("url".to_string()));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "Missing url");
        assert!(json.get("details").is_none());
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_analysis_failure_shape() {
        let response = ErrorResponse::from_app_error(&AppError::AnalysisFailed {
            exit_code: 1,
            stderr: "invalid file".to_string(),
        });
        assert_eq!(response.error, "Failed to generate waveform");
        assert!(response.details.unwrap().contains("invalid file"));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::BadRequest("referenceId".to_string()), 400),
            (AppError::InvalidInput("eof".to_string()), 400),
            (AppError::CredentialNotFound, 401),
            (AppError::ReferenceNotFound("r".to_string()), 404),
            (
                AppError::PersistFailed {
                    target: PersistTarget::ReferenceItem,
                    message: "denied".to_string(),
                },
                500,
            ),
        ];
        for (err, expected) in cases {
            let response = HttpAppError(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }
}
