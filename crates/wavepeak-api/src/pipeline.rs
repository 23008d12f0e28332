//! Waveform generation pipeline
//!
//! Resolve credential, fetch audio, analyze it in scratch files, persist the
//! peaks. Preview requests skip the credential and persistence stages.
//! Scratch files are released after analysis whatever its outcome.

use std::sync::Arc;
use wavepeak_core::models::{
    GenerateWaveformRequest, GenerateWaveformResponse, SourceLocator, WaveformResult,
};
use wavepeak_core::{AppError, PersistTarget};
use wavepeak_db::ReferenceItemStore;
use wavepeak_processing::{TempStorage, WaveformAnalyzer};
use wavepeak_services::{CredentialManager, SourceResolver};

/// `referenceId` value that selects anonymous one-off generation.
pub const PREVIEW_REFERENCE_ID: &str = "preview";

#[derive(Debug, Clone)]
pub struct WaveformOutcome {
    pub result: WaveformResult,
    pub saved: bool,
}

impl From<WaveformOutcome> for GenerateWaveformResponse {
    fn from(outcome: WaveformOutcome) -> Self {
        GenerateWaveformResponse {
            waveform: outcome.result.into(),
            saved: outcome.saved,
        }
    }
}

#[derive(Clone)]
pub struct WaveformPipeline {
    reference_items: Arc<dyn ReferenceItemStore>,
    credentials: CredentialManager,
    resolver: SourceResolver,
    temp: TempStorage,
    analyzer: Arc<dyn WaveformAnalyzer>,
}

impl WaveformPipeline {
    pub fn new(
        reference_items: Arc<dyn ReferenceItemStore>,
        credentials: CredentialManager,
        resolver: SourceResolver,
        temp: TempStorage,
        analyzer: Arc<dyn WaveformAnalyzer>,
    ) -> Self {
        Self {
            reference_items,
            credentials,
            resolver,
            temp,
            analyzer,
        }
    }

    #[tracing::instrument(skip_all, fields(reference_id = tracing::field::Empty))]
    pub async fn run(&self, request: &GenerateWaveformRequest) -> Result<WaveformOutcome, AppError> {
        let url = required(request.url.as_deref(), "url")?;
        let reference_id = required(request.reference_id.as_deref(), "referenceId")?;
        tracing::Span::current().record("reference_id", reference_id);

        let preview = reference_id == PREVIEW_REFERENCE_ID;
        let locator = SourceLocator::for_request(url, preview);

        let access_token = if preview {
            None
        } else {
            let owner = self
                .reference_items
                .get_reference_item(reference_id)
                .await?
                .ok_or_else(|| AppError::ReferenceNotFound(reference_id.to_string()))?;

            let token = self.credentials.get_valid_access_token(&owner.user_id).await?;
            Some(token.access_token)
        };

        let audio = self.resolver.fetch(&locator, access_token.as_deref()).await?;

        let mut files = self.temp.allocate(&audio.extension);
        let analysis = self.analyzer.analyze(&audio.bytes, &files).await;
        files.release().await;
        let result = analysis?;

        if preview {
            tracing::info!(peaks = result.num_peaks(), "Preview waveform generated");
            return Ok(WaveformOutcome {
                result,
                saved: false,
            });
        }

        self.reference_items
            .update_waveform(reference_id, &result.to_update())
            .await
            .map_err(|e| AppError::PersistFailed {
                target: PersistTarget::ReferenceItem,
                message: e.to_string(),
            })?;

        tracing::info!(peaks = result.num_peaks(), "Waveform saved");

        Ok(WaveformOutcome {
            result,
            saved: true,
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(field.to_string()))
}
