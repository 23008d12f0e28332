//! Audio acquisition from Dropbox
//!
//! One retrieval strategy per [`SourceLocator`] variant. Every strategy
//! buffers the whole body in memory, bounded by a size ceiling.

use bytes::{Bytes, BytesMut};
use reqwest::Response;
use wavepeak_core::models::{FetchedAudio, SourceLocator, DEFAULT_AUDIO_FILENAME};
use wavepeak_core::AppError;

use super::client::DropboxClient;

/// Classify a raw locator: `http://`/`https://` is a shared link, anything
/// else a Dropbox path.
pub fn classify_locator(raw: &str) -> SourceLocator {
    SourceLocator::classify(raw)
}

/// Shared links on this host are rewritten to the direct-download host for
/// anonymous preview fetches.
const SHARE_HOST: &str = "www.dropbox.com";
const DIRECT_DOWNLOAD_HOST: &str = "dl.dropboxusercontent.com";

#[derive(Debug, Clone)]
pub struct SourceResolver {
    dropbox: DropboxClient,
    max_bytes: usize,
}

impl SourceResolver {
    pub fn new(dropbox: DropboxClient, max_bytes: usize) -> Self {
        Self { dropbox, max_bytes }
    }

    /// Download the audio addressed by `locator`.
    ///
    /// `credential` is required for every strategy except `Preview`.
    #[tracing::instrument(skip_all, fields(strategy = locator.strategy()))]
    pub async fn fetch(
        &self,
        locator: &SourceLocator,
        credential: Option<&str>,
    ) -> Result<FetchedAudio, AppError> {
        let (response, filename) = match locator {
            SourceLocator::Preview(url) => {
                let direct_url = direct_download_url(url);
                tracing::debug!(url = %direct_url, "Downloading preview from direct link");
                let response = self
                    .dropbox
                    .get_anonymous(&direct_url)
                    .await
                    .map_err(transport_error)?;
                (response, filename_from_url(url))
            }
            SourceLocator::SharedLink(url) => {
                let token = credential.ok_or(AppError::CredentialNotFound)?;
                let response = self
                    .dropbox
                    .get_shared_link_file(token, url)
                    .await
                    .map_err(transport_error)?;
                let filename = filename_from_api_result(&response);
                (response, filename)
            }
            SourceLocator::ProviderPath(path) => {
                let token = credential.ok_or(AppError::CredentialNotFound)?;
                let response = self
                    .dropbox
                    .download_path(token, path)
                    .await
                    .map_err(transport_error)?;
                let filename = filename_from_api_result(&response);
                (response, filename)
            }
        };

        let bytes = self.read_body(response).await?;
        let audio = FetchedAudio::new(bytes, filename);

        tracing::info!(
            bytes = audio.bytes.len(),
            filename = %audio.filename,
            extension = %audio.extension,
            "Audio downloaded"
        );

        Ok(audio)
    }

    async fn read_body(&self, mut response: Response) -> Result<Bytes, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = status.as_u16(), "Dropbox download rejected");
            return Err(AppError::DownloadFailed {
                status: status.as_u16(),
                body,
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(length));
            }
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if buffer.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((buffer.len() + chunk.len()) as u64));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer.freeze())
    }

    fn too_large(&self, length: u64) -> AppError {
        AppError::DownloadFailed {
            status: 413,
            body: format!(
                "audio file of {} bytes exceeds the limit of {} bytes",
                length, self.max_bytes
            ),
        }
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::DownloadFailed {
        status: 0,
        body: err.to_string(),
    }
}

/// Point a `www.dropbox.com` share link at the direct-download host.
/// Other URLs are returned unchanged.
fn direct_download_url(url: &str) -> String {
    url.replacen(SHARE_HOST, DIRECT_DOWNLOAD_HOST, 1)
}

/// Last path segment of `url` without its query string, when it looks like
/// a file name.
fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .and_then(|segment| segment.split('?').next())
        .filter(|name| name.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_AUDIO_FILENAME.to_string())
}

/// `name` from the JSON `Dropbox-API-Result` response header.
fn filename_from_api_result(response: &Response) -> String {
    response
        .headers()
        .get("dropbox-api-result")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(result) => result
                .get("name")
                .and_then(|name| name.as_str())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse Dropbox-API-Result header");
                None
            }
        })
        .unwrap_or_else(|| DEFAULT_AUDIO_FILENAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn resolver(server: &mockito::ServerGuard, max_bytes: usize) -> SourceResolver {
        let dropbox = DropboxClient::new(
            "client-id",
            "client-secret",
            server.url(),
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap();
        SourceResolver::new(dropbox, max_bytes)
    }

    #[test]
    fn test_classify_locator() {
        assert!(matches!(
            classify_locator("https://www.dropbox.com/s/x/a.wav"),
            SourceLocator::SharedLink(_)
        ));
        assert!(matches!(
            classify_locator("/Apps/track.mp3"),
            SourceLocator::ProviderPath(_)
        ));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://www.dropbox.com/s/abc/track.wav?dl=0"),
            "track.wav"
        );
        assert_eq!(
            filename_from_url("https://www.dropbox.com/s/abc/noext?dl=0"),
            "audio.mp3"
        );
        assert_eq!(filename_from_url("https://www.dropbox.com/s/abc/"), "audio.mp3");
    }

    #[tokio::test]
    async fn test_shared_link_uses_api_result_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sharing/get_shared_link_file")
            .match_header("authorization", "Bearer token-1")
            .match_header(
                "dropbox-api-arg",
                r#"{"url":"https://www.dropbox.com/s/abc/song?dl=0"}"#,
            )
            .with_status(200)
            .with_header("dropbox-api-result", r#"{"name":"song.flac","size":5}"#)
            .with_body("fLaC!")
            .create_async()
            .await;

        let audio = resolver(&server, 1024)
            .fetch(
                &classify_locator("https://www.dropbox.com/s/abc/song?dl=0"),
                Some("token-1"),
            )
            .await
            .unwrap();

        assert_eq!(audio.filename, "song.flac");
        assert_eq!(audio.extension, ".flac");
        assert_eq!(&audio.bytes[..], b"fLaC!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_path_defaults_filename() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/files/download")
            .match_header("dropbox-api-arg", r#"{"path":"/Music/track"}"#)
            .with_status(200)
            .with_header("dropbox-api-result", "not json")
            .with_body("ID3")
            .create_async()
            .await;

        let audio = resolver(&server, 1024)
            .fetch(&classify_locator("/Music/track"), Some("token-1"))
            .await
            .unwrap();

        assert_eq!(audio.filename, "audio.mp3");
        assert_eq!(audio.extension, ".mp3");
    }

    #[tokio::test]
    async fn test_non_preview_without_credential_fails() {
        let server = mockito::Server::new_async().await;
        let err = resolver(&server, 1024)
            .fetch(&classify_locator("/Music/track.wav"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CredentialNotFound));
    }

    #[tokio::test]
    async fn test_download_rejection_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/files/download")
            .with_status(409)
            .with_body(r#"{"error_summary":"path/not_found/"}"#)
            .create_async()
            .await;

        let err = resolver(&server, 1024)
            .fetch(&classify_locator("/missing.wav"), Some("token-1"))
            .await
            .unwrap_err();
        match err {
            AppError::DownloadFailed { status, body } => {
                assert_eq!(status, 409);
                assert!(body.contains("path/not_found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_size_ceiling() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/files/download")
            .with_status(200)
            .with_body(vec![0u8; 64])
            .create_async()
            .await;

        let err = resolver(&server, 16)
            .fetch(&classify_locator("/big.wav"), Some("token-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DownloadFailed { status: 413, .. }));
    }

    #[tokio::test]
    async fn test_preview_rewrites_host_and_sends_no_auth() {
        // The rewrite only touches the host, so a local server stands in for
        // the direct-download host here.
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/s/abc/track.wav")
            .match_query(mockito::Matcher::UrlEncoded("dl".to_string(), "0".to_string()))
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("RIFF")
            .create_async()
            .await;

        let url = format!("{}/s/abc/track.wav?dl=0", server.url());
        let audio = resolver(&server, 1024)
            .fetch(&SourceLocator::for_request(&url, true), None)
            .await
            .unwrap();

        assert_eq!(audio.filename, "track.wav");
        assert_eq!(audio.extension, ".wav");
        mock.assert_async().await;
    }

    #[test]
    fn test_preview_share_link_uses_direct_download_host() {
        let url = "https://www.dropbox.com/s/abc/song.mp3?dl=0";
        assert_eq!(
            direct_download_url(url),
            "https://dl.dropboxusercontent.com/s/abc/song.mp3?dl=0"
        );

        let filename = filename_from_url(url);
        assert_eq!(filename, "song.mp3");
        assert_eq!(wavepeak_core::models::extension_of(&filename), ".mp3");

        let local = "http://127.0.0.1:1234/s/abc/song.mp3";
        assert_eq!(direct_download_url(local), local);
    }
}
