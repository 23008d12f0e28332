//! Transient storage for one pipeline run.
//!
//! Each run gets a pair of scratch paths sharing a unique token: the
//! downloaded audio and the analyzer's JSON output. The pair removes both
//! files exactly once, either through [`TempFilePair::release`] or, if that
//! was never reached, when it is dropped.

use std::io;
use std::path::{Path, PathBuf};

/// Allocates scratch file pairs under one directory.
#[derive(Debug, Clone)]
pub struct TempStorage {
    dir: PathBuf,
}

impl TempStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a fresh pair of paths. Nothing is created on disk.
    ///
    /// `extension` includes its leading dot.
    pub fn allocate(&self, extension: &str) -> TempFilePair {
        let token = unique_token();
        let pair = TempFilePair {
            audio_path: self
                .dir
                .join(format!("waveform-audio-{}{}", token, extension)),
            json_path: self.dir.join(format!("waveform-peaks-{}.json", token)),
            token,
            released: false,
        };
        tracing::debug!(
            audio_path = %pair.audio_path.display(),
            json_path = %pair.json_path.display(),
            "Allocated temp files"
        );
        pair
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

/// Millisecond timestamp plus a random component.
fn unique_token() -> String {
    format!(
        "{}-{:016x}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

/// Scoped guard over the audio and JSON scratch files of one run.
#[derive(Debug)]
pub struct TempFilePair {
    audio_path: PathBuf,
    json_path: PathBuf,
    token: String,
    released: bool,
}

impl TempFilePair {
    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove both files. Idempotent; files that never got created are
    /// fine, other failures are logged and swallowed.
    ///
    /// The pair only counts as released once both removals have finished,
    /// so a cancelled release is completed on drop.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }

        for path in [&self.audio_path, &self.json_path] {
            log_removal(path, tokio::fs::remove_file(path).await);
        }
        self.released = true;
    }
}

impl Drop for TempFilePair {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        tracing::debug!(token = %self.token, "Releasing temp files on drop");
        for path in [&self.audio_path, &self.json_path] {
            log_removal(path, std::fs::remove_file(path));
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove temp file"
        ),
    }
}
