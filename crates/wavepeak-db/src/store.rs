//! Persistence store traits
//!
//! The credential manager and the pipeline only see these traits, so the
//! backend can be swapped by configuration.

use async_trait::async_trait;
use thiserror::Error;
use wavepeak_core::models::{Credential, CredentialUpdate, ReferenceItem, WaveformUpdate};
use wavepeak_core::AppError;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("No {table} row matched id {id}")]
    NoRowMatched { table: &'static str, id: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Dropbox credentials stored on the `profiles` table, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the stored credential. `None` when the profile row is absent.
    async fn get_credential(&self, user_id: &str) -> StoreResult<Option<Credential>>;

    /// Overwrite the access token and its expiry. Last write wins.
    async fn update_credential(&self, user_id: &str, update: &CredentialUpdate)
        -> StoreResult<()>;
}

/// Reference items that waveform peaks are persisted onto.
#[async_trait]
pub trait ReferenceItemStore: Send + Sync {
    /// Owner lookup. `None` when no item has this id.
    async fn get_reference_item(&self, id: &str) -> StoreResult<Option<ReferenceItem>>;

    /// Merge the waveform columns onto the item.
    async fn update_waveform(&self, id: &str, update: &WaveformUpdate) -> StoreResult<()>;
}
