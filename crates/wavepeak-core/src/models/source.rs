use bytes::Bytes;
use std::path::Path;

pub const DEFAULT_AUDIO_FILENAME: &str = "audio.mp3";
pub const DEFAULT_AUDIO_EXTENSION: &str = ".mp3";

/// How the requested audio file is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Dropbox shared link (`http://` or `https://`), fetched with the
    /// principal's credential.
    SharedLink(String),
    /// Path inside the principal's Dropbox.
    ProviderPath(String),
    /// Shared link fetched anonymously through the direct-download host.
    Preview(String),
}

impl SourceLocator {
    /// Classify a raw locator string. Preview is never inferred from the
    /// string itself; see [`SourceLocator::for_request`].
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SourceLocator::SharedLink(raw.to_string())
        } else {
            SourceLocator::ProviderPath(raw.to_string())
        }
    }

    /// Locator for an incoming request; `preview` comes from the caller.
    pub fn for_request(raw: &str, preview: bool) -> Self {
        if preview {
            SourceLocator::Preview(raw.to_string())
        } else {
            Self::classify(raw)
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            SourceLocator::SharedLink(_) => "shared_link",
            SourceLocator::ProviderPath(_) => "provider_path",
            SourceLocator::Preview(_) => "preview",
        }
    }

    pub fn is_preview(&self) -> bool {
        matches!(self, SourceLocator::Preview(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceLocator::SharedLink(raw)
            | SourceLocator::ProviderPath(raw)
            | SourceLocator::Preview(raw) => raw,
        }
    }
}

/// Downloaded audio, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    pub bytes: Bytes,
    pub filename: String,
    /// Leading dot included, e.g. `.wav`.
    pub extension: String,
}

impl FetchedAudio {
    pub fn new(bytes: Bytes, filename: String) -> Self {
        let extension = extension_of(&filename);
        Self {
            bytes,
            filename,
            extension,
        }
    }
}

/// Extension of `filename` with its leading dot, `.mp3` when there is none.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_AUDIO_EXTENSION.to_string())
}
