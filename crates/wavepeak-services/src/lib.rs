//! Wavepeak Services Layer
//!
//! Dropbox integration used by the waveform pipeline: keeping a principal's
//! OAuth credential fresh and downloading audio under each addressing scheme.

pub mod dropbox;

pub use dropbox::{classify_locator, CredentialManager, DropboxClient, SourceResolver};
