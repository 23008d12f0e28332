use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use wavepeak_core::models::{GenerateWaveformRequest, GenerateWaveformResponse};

#[utoipa::path(
    post,
    path = "/generate-waveform",
    tag = "waveforms",
    request_body = GenerateWaveformRequest,
    responses(
        (status = 200, description = "Waveform generated (and saved unless previewing)", body = GenerateWaveformResponse),
        (status = 400, description = "Missing url or referenceId, or malformed body", body = ErrorResponse),
        (status = 401, description = "Dropbox authentication failed", body = ErrorResponse),
        (status = 404, description = "Reference item not found", body = ErrorResponse),
        (status = 500, description = "Download, analysis or persistence failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "generate_waveform"))]
pub async fn generate_waveform(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<GenerateWaveformRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.pipeline.run(&request).await?;
    Ok(Json(GenerateWaveformResponse::from(outcome)))
}
