//! Error types module
//!
//! Every stage of the waveform pipeline fails with an `AppError`. The variants
//! mirror the pipeline stages (request validation, credential lifecycle,
//! reference lookup, download, analysis, persistence) so the HTTP layer can
//! map them to a status code and a `{error, details}` body without knowing
//! which stage produced them.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for upstream failures outside our control
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Which record a failed persistence write was targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistTarget {
    /// The principal's refreshed Dropbox credential
    Credential,
    /// The reference item's waveform peaks
    ReferenceItem,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DOWNLOAD_FAILED")
    fn error_code(&self) -> &'static str;

    /// Client-facing summary, rendered as the `error` field
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing {0}")]
    BadRequest(String),

    #[error("Invalid request body: {0}")]
    InvalidInput(String),

    #[error("No access token available")]
    CredentialNotFound,

    #[error("No refresh token available")]
    RefreshTokenMissing,

    #[error("Token refresh failed: {status} - {body}")]
    RefreshFailed { status: u16, body: String },

    #[error("{}", persist_failed_message(.target, .message))]
    PersistFailed {
        target: PersistTarget,
        message: String,
    },

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Dropbox download failed: {status} - {body}")]
    DownloadFailed { status: u16, body: String },

    #[error("audiowaveform is not available: {0}")]
    AnalysisUnavailable(String),

    #[error("audiowaveform exited with code {exit_code}: {stderr}")]
    AnalysisFailed { exit_code: i32, stderr: String },

    #[error("audiowaveform did not produce expected data array: {0}")]
    MalformedOutput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn persist_failed_message(target: &PersistTarget, message: &str) -> String {
    match target {
        PersistTarget::Credential => {
            format!("Failed to save new token to database: {}", message)
        }
        PersistTarget::ReferenceItem => {
            format!("Failed to save peaks to database: {}", message)
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, LogLevel) {
    match err {
        AppError::BadRequest(_) => (400, "BAD_REQUEST", LogLevel::Debug),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", LogLevel::Debug),
        AppError::CredentialNotFound => (401, "CREDENTIAL_NOT_FOUND", LogLevel::Warn),
        AppError::RefreshTokenMissing => (401, "REFRESH_TOKEN_MISSING", LogLevel::Warn),
        AppError::RefreshFailed { .. } => (401, "REFRESH_FAILED", LogLevel::Warn),
        AppError::PersistFailed {
            target: PersistTarget::Credential,
            ..
        } => (401, "CREDENTIAL_PERSIST_FAILED", LogLevel::Error),
        AppError::PersistFailed {
            target: PersistTarget::ReferenceItem,
            ..
        } => (500, "PERSIST_FAILED", LogLevel::Error),
        AppError::ReferenceNotFound(_) => (404, "REFERENCE_NOT_FOUND", LogLevel::Debug),
        AppError::DownloadFailed { .. } => (500, "DOWNLOAD_FAILED", LogLevel::Warn),
        AppError::AnalysisUnavailable(_) => (500, "ANALYSIS_UNAVAILABLE", LogLevel::Error),
        AppError::AnalysisFailed { .. } => (500, "ANALYSIS_FAILED", LogLevel::Warn),
        AppError::MalformedOutput(_) => (500, "MALFORMED_OUTPUT", LogLevel::Error),
        AppError::Database(_) => (500, "DATABASE_ERROR", LogLevel::Error),
        AppError::Config(_) => (500, "CONFIGURATION_ERROR", LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for structured logs
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BadRequest",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::CredentialNotFound => "CredentialNotFound",
            AppError::RefreshTokenMissing => "RefreshTokenMissing",
            AppError::RefreshFailed { .. } => "RefreshFailed",
            AppError::PersistFailed { .. } => "PersistFailed",
            AppError::ReferenceNotFound(_) => "ReferenceNotFound",
            AppError::DownloadFailed { .. } => "DownloadFailed",
            AppError::AnalysisUnavailable(_) => "AnalysisUnavailable",
            AppError::AnalysisFailed { .. } => "AnalysisFailed",
            AppError::MalformedOutput(_) => "MalformedOutput",
            AppError::Database(_) => "Database",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Whether the error came out of the credential lifecycle.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AppError::CredentialNotFound
                | AppError::RefreshTokenMissing
                | AppError::RefreshFailed { .. }
                | AppError::PersistFailed {
                    target: PersistTarget::Credential,
                    ..
                }
        )
    }

    /// Detailed message rendered as the `details` field of error responses
    pub fn details(&self) -> String {
        match self {
            AppError::ReferenceNotFound(_) => "No reference item with that id".to_string(),
            AppError::MalformedOutput(_) => {
                "audiowaveform did not produce expected data array".to_string()
            }
            AppError::PersistFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            AppError::BadRequest(field) => format!("Missing {}", field),
            AppError::InvalidInput(_) => "Invalid request body".to_string(),
            _ if self.is_credential_failure() => "Dropbox authentication failed".to_string(),
            AppError::ReferenceNotFound(_) => "Reference not found".to_string(),
            AppError::MalformedOutput(_) => "Failed to generate valid waveform data".to_string(),
            AppError::PersistFailed { .. } => "Failed to save peaks to database".to_string(),
            _ => "Failed to generate waveform".to_string(),
        }
    }
}
