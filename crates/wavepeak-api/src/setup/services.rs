//! Service initialization and application state setup

use crate::pipeline::WaveformPipeline;
use crate::state::AppState;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use wavepeak_core::Config;
use wavepeak_db::Stores;
use wavepeak_processing::{AudiowaveformAnalyzer, TempStorage};
use wavepeak_services::{CredentialManager, DropboxClient, SourceResolver};

/// Wire the Dropbox client, credential manager, source resolver and analyzer
/// into the pipeline, returning the application state
pub fn initialize_services(
    config: &Config,
    stores: Stores,
    pool: Option<PgPool>,
) -> Result<Arc<AppState>> {
    let dropbox = DropboxClient::from_config(config).context("Failed to create Dropbox client")?;

    let credentials = CredentialManager::new(stores.profiles.clone(), dropbox.clone());
    let resolver = SourceResolver::new(dropbox, config.max_audio_size_bytes());

    std::fs::create_dir_all(config.temp_dir()).with_context(|| {
        format!(
            "Failed to create temp directory {}",
            config.temp_dir().display()
        )
    })?;
    let temp = TempStorage::new(config.temp_dir());

    let analyzer = Arc::new(AudiowaveformAnalyzer::from_config(config));
    tracing::info!(
        audiowaveform_path = %config.audiowaveform_path(),
        pixels_per_second = config.pixels_per_second(),
        split_channels = config.split_channels(),
        temp_dir = %config.temp_dir().display(),
        "Waveform analyzer configured"
    );

    let pipeline = WaveformPipeline::new(
        stores.reference_items.clone(),
        credentials,
        resolver,
        temp,
        analyzer,
    );

    Ok(Arc::new(AppState::new(config.clone(), stores, pipeline, pool)))
}
