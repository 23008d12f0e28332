//! Dropbox API integration

pub mod client;
pub mod credentials;
pub mod source;

pub use client::{DropboxClient, TokenResponse};
pub use credentials::CredentialManager;
pub use source::{classify_locator, SourceResolver};
