//! Wavepeak API Library
//!
//! HTTP surface of the waveform service: the generation pipeline, its
//! handler, health probes, middleware and application setup.

mod api_doc;
mod handlers;
mod middleware;
mod telemetry;

pub mod error;
pub mod pipeline;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use pipeline::{WaveformOutcome, WaveformPipeline, PREVIEW_REFERENCE_ID};
pub use state::AppState;
