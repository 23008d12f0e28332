//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use wavepeak_core::models;

/// The OpenAPI document served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wavepeak API",
        version = "0.1.0",
        description = "Generates waveform peak data for audio stored in Dropbox using audiowaveform, and saves the peaks onto reference items."
    ),
    paths(handlers::waveform::generate_waveform),
    components(schemas(
        models::GenerateWaveformRequest,
        models::GenerateWaveformResponse,
        models::WaveformPayload,
        error::ErrorResponse,
    )),
    tags(
        (name = "waveforms", description = "Waveform generation")
    )
)]
pub struct ApiDoc;
