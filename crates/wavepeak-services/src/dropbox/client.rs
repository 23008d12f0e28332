//! Thin HTTP client for the Dropbox endpoints the pipeline needs.

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use wavepeak_core::{AppError, Config};

/// Successful `oauth2/token` response for a refresh grant.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds, when reported.
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

impl Debug for TokenResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TokenResponse")
            .field("access_token", &"***")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Clone)]
pub struct DropboxClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    api_base_url: String,
    content_base_url: String,
}

impl Debug for DropboxClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DropboxClient")
            .field("api_base_url", &self.api_base_url)
            .field("content_base_url", &self.content_base_url)
            .finish_non_exhaustive()
    }
}

impl DropboxClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_base_url: impl Into<String>,
        content_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client for Dropbox: {}", e)))?;

        Ok(Self {
            http_client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            content_base_url: content_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client_id = config
            .dropbox_client_id()
            .ok_or_else(|| AppError::Config("DROPBOX_CLIENT_ID not configured".to_string()))?;
        let client_secret = config
            .dropbox_client_secret()
            .ok_or_else(|| AppError::Config("DROPBOX_CLIENT_SECRET not configured".to_string()))?;

        Self::new(
            client_id,
            client_secret,
            config.dropbox_api_base_url(),
            config.dropbox_content_base_url(),
            Duration::from_secs(config.http_timeout_secs()),
        )
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Any failure, including transport errors (status 0), is `RefreshFailed`.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let url = format!("{}/oauth2/token", self.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::RefreshFailed {
                status: 0,
                body: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            return Err(AppError::RefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AppError::RefreshFailed {
            status: status.as_u16(),
            body: format!("unexpected token response: {}", e),
        })
    }

    /// `sharing/get_shared_link_file` for a shared link.
    pub async fn get_shared_link_file(
        &self,
        access_token: &str,
        shared_url: &str,
    ) -> Result<Response, reqwest::Error> {
        self.content_request("sharing/get_shared_link_file", access_token, &json!({ "url": shared_url }))
            .await
    }

    /// `files/download` for a path in the user's Dropbox.
    pub async fn download_path(&self, access_token: &str, path: &str) -> Result<Response, reqwest::Error> {
        self.content_request("files/download", access_token, &json!({ "path": path }))
            .await
    }

    /// Plain unauthenticated GET, used for direct-download links.
    pub async fn get_anonymous(&self, url: &str) -> Result<Response, reqwest::Error> {
        self.http_client.get(url).send().await
    }

    async fn content_request(
        &self,
        endpoint: &str,
        access_token: &str,
        arg: &serde_json::Value,
    ) -> Result<Response, reqwest::Error> {
        self.http_client
            .post(format!("{}/{}", self.content_base_url, endpoint))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", header_safe_json(arg))
            .send()
            .await
    }
}

/// Serialize `value` with every non-ASCII character escaped as `\uXXXX`, as
/// Dropbox requires for JSON carried in HTTP headers.
fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    escaped
}
