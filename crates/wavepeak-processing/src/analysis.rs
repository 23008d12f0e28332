//! Waveform analysis via the external `audiowaveform` tool.

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use wavepeak_core::models::WaveformResult;
use wavepeak_core::{AppError, Config};

use crate::temp::TempFilePair;

/// Turns audio bytes into peak data using the scratch files of one run.
#[async_trait]
pub trait WaveformAnalyzer: Send + Sync {
    async fn analyze(&self, audio: &[u8], files: &TempFilePair) -> Result<WaveformResult, AppError>;
}

/// Runs the `audiowaveform` binary as a child process.
#[derive(Debug, Clone)]
pub struct AudiowaveformAnalyzer {
    binary_path: String,
    pixels_per_second: u32,
    split_channels: bool,
}

impl AudiowaveformAnalyzer {
    pub fn new(binary_path: impl Into<String>, pixels_per_second: u32, split_channels: bool) -> Self {
        Self {
            binary_path: binary_path.into(),
            pixels_per_second,
            split_channels,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.audiowaveform_path(),
            config.pixels_per_second(),
            config.split_channels(),
        )
    }

    fn args(&self, files: &TempFilePair) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            files.audio_path().into(),
            "-o".into(),
            files.json_path().into(),
            "--pixels-per-second".into(),
            self.pixels_per_second.to_string().into(),
            "--output-format".into(),
            "json".into(),
        ];
        if self.split_channels {
            args.push("--split-channels".into());
        }
        args
    }
}

#[async_trait]
impl WaveformAnalyzer for AudiowaveformAnalyzer {
    #[tracing::instrument(skip(self, audio, files), fields(bytes = audio.len(), token = %files.token()))]
    async fn analyze(&self, audio: &[u8], files: &TempFilePair) -> Result<WaveformResult, AppError> {
        tokio::fs::write(files.audio_path(), audio).await?;
        tracing::debug!(path = %files.audio_path().display(), "Audio written to temp file");

        let output = Command::new(&self.binary_path)
            .args(self.args(files))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::AnalysisUnavailable(format!("failed to run {}: {}", self.binary_path, e))
            })?;

        if !output.status.success() {
            // No exit code means the process was killed by a signal.
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(exit_code, stderr = %stderr.trim(), "audiowaveform failed");
            return Err(AppError::AnalysisFailed { exit_code, stderr });
        }

        let raw = tokio::fs::read(files.json_path()).await?;
        let result = WaveformResult::from_json_slice(&raw)?;

        tracing::info!(
            peaks = result.num_peaks(),
            channels = ?result.channels,
            sample_rate = ?result.sample_rate,
            "audiowaveform completed"
        );

        Ok(result)
    }
}
