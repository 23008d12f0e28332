//! Supabase REST backend
//!
//! Talks to the PostgREST endpoint of a Supabase project with the
//! service-role key, which bypasses row level security.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use wavepeak_core::models::{Credential, CredentialUpdate, ReferenceItem, WaveformUpdate};

use crate::store::{ProfileStore, ReferenceItemStore, StoreError, StoreResult};

const PROFILE_COLUMNS: &str = "dropbox_access_token,dropbox_refresh_token,dropbox_token_expires_at";

/// PostgreSQL `invalid_text_representation`, returned when an id filter is not a UUID.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

#[derive(Deserialize)]
struct ProfileRecord {
    dropbox_access_token: Option<String>,
    dropbox_refresh_token: Option<String>,
    dropbox_token_expires_at: Option<String>,
}

#[derive(Deserialize)]
struct ReferenceItemRecord {
    id: String,
    user_id: Option<String>,
}

pub struct SupabaseStore {
    http_client: Client,
    base_url: String,
    service_role_key: String,
}

impl Debug for SupabaseStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SupabaseStore {
    pub fn new(
        base_url: impl Into<String>,
        service_role_key: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn ensure_success(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parse a `timestamptz` (RFC 3339) or a bare `timestamp`, read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .ok()
}

#[async_trait]
impl ProfileStore for SupabaseStore {
    #[tracing::instrument(skip(self), fields(db.table = "profiles"))]
    async fn get_credential(&self, user_id: &str) -> StoreResult<Option<Credential>> {
        let request = self
            .http_client
            .get(self.table_url("profiles"))
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ]);
        let response = self.authorized(request).send().await?;
        let records: Vec<ProfileRecord> = Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        Ok(records.into_iter().next().map(|record| {
            let expires_at = record.dropbox_token_expires_at.as_deref().and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(raw, "Unparsable dropbox_token_expires_at, treating as expired");
                }
                parsed
            });
            Credential {
                access_token: record.dropbox_access_token,
                refresh_token: record.dropbox_refresh_token,
                expires_at,
            }
        }))
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "profiles"))]
    async fn update_credential(
        &self,
        user_id: &str,
        update: &CredentialUpdate,
    ) -> StoreResult<()> {
        let request = self
            .http_client
            .patch(self.table_url("profiles"))
            .query(&[("user_id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "dropbox_access_token": update.access_token,
                "dropbox_token_expires_at": update.expires_at.to_rfc3339(),
            }));
        let response = self.authorized(request).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ReferenceItemStore for SupabaseStore {
    #[tracing::instrument(skip(self), fields(db.table = "reference_items"))]
    async fn get_reference_item(&self, id: &str) -> StoreResult<Option<ReferenceItem>> {
        let request = self
            .http_client
            .get(self.table_url("reference_items"))
            .query(&[
                ("select", "id,user_id".to_string()),
                ("id", format!("eq.{}", id)),
            ]);
        let response = self.authorized(request).send().await?;

        let records: Vec<ReferenceItemRecord> = match Self::ensure_success(response).await {
            Ok(response) => response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse(e.to_string()))?,
            // Malformed id: no row can match.
            Err(StoreError::Rejected { status: 400, body })
                if body.contains(INVALID_TEXT_REPRESENTATION) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(records.into_iter().next().and_then(|record| {
            record.user_id.map(|user_id| ReferenceItem {
                id: record.id,
                user_id,
            })
        }))
    }

    #[tracing::instrument(
        skip(self, update),
        fields(db.table = "reference_items", peaks = update.peaks.len())
    )]
    async fn update_waveform(&self, id: &str, update: &WaveformUpdate) -> StoreResult<()> {
        let request = self
            .http_client
            .patch(self.table_url("reference_items"))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "waveform_peaks": update.peaks }));
        let response = self.authorized(request).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
