//! Dropbox credential lifecycle
//!
//! Hands out an access token that stays valid for at least
//! [`EXPIRY_SAFETY_MARGIN_SECS`], refreshing and persisting it when the
//! stored one is about to expire. There is no cross-request lock: two
//! concurrent refreshes for one principal both succeed and the last write
//! wins.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use wavepeak_core::models::{
    refreshed_validity, CredentialUpdate, ValidToken, EXPIRY_SAFETY_MARGIN_SECS,
};
use wavepeak_core::{AppError, PersistTarget};
use wavepeak_db::ProfileStore;

use super::client::DropboxClient;

#[derive(Clone)]
pub struct CredentialManager {
    profiles: Arc<dyn ProfileStore>,
    dropbox: DropboxClient,
}

impl CredentialManager {
    pub fn new(profiles: Arc<dyn ProfileStore>, dropbox: DropboxClient) -> Self {
        Self { profiles, dropbox }
    }

    /// Valid access token for `principal_id`, refreshed if necessary.
    pub async fn get_valid_access_token(&self, principal_id: &str) -> Result<ValidToken, AppError> {
        self.get_valid_access_token_at(principal_id, Utc::now()).await
    }

    /// Same as [`get_valid_access_token`](Self::get_valid_access_token) with
    /// an explicit clock reading.
    #[tracing::instrument(skip_all, fields(user_id = %principal_id))]
    pub async fn get_valid_access_token_at(
        &self,
        principal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidToken, AppError> {
        let credential = self
            .profiles
            .get_credential(principal_id)
            .await?
            .filter(|credential| credential.access_token().is_some())
            .ok_or_else(|| {
                tracing::warn!("No Dropbox access token on record");
                AppError::CredentialNotFound
            })?;

        if credential.is_fresh_at(now) {
            if let Some(access_token) = credential.access_token() {
                tracing::debug!(expires_at = ?credential.expires_at, "Stored token still valid");
                return Ok(ValidToken {
                    access_token: access_token.to_string(),
                    refreshed: false,
                });
            }
        }

        tracing::info!(expires_at = ?credential.expires_at, "Token expired or expiring, refreshing");

        let refresh_token = credential.refresh_token().ok_or_else(|| {
            tracing::warn!("No Dropbox refresh token on record");
            AppError::RefreshTokenMissing
        })?;

        let tokens = self.dropbox.refresh_access_token(refresh_token).await?;

        let validity = refreshed_validity(tokens.expires_in);
        if validity.num_seconds() <= EXPIRY_SAFETY_MARGIN_SECS {
            return Err(AppError::RefreshFailed {
                status: 200,
                body: format!(
                    "refreshed token lifetime of {}s is within the {}s safety margin",
                    validity.num_seconds(),
                    EXPIRY_SAFETY_MARGIN_SECS
                ),
            });
        }

        let update = CredentialUpdate {
            access_token: tokens.access_token,
            expires_at: now + validity,
        };

        self.profiles
            .update_credential(principal_id, &update)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to persist refreshed token");
                AppError::PersistFailed {
                    target: PersistTarget::Credential,
                    message: e.to_string(),
                }
            })?;

        tracing::info!(expires_at = %update.expires_at, "Token refreshed");

        Ok(ValidToken {
            access_token: update.access_token,
            refreshed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use wavepeak_core::models::Credential;
    use wavepeak_db::test_helpers::MockProfileStore;

    const USER: &str = "user-1";

    fn manager(store: &MockProfileStore, api_base: &str) -> CredentialManager {
        let dropbox = DropboxClient::new(
            "client-id",
            "client-secret",
            api_base,
            api_base,
            Duration::from_secs(5),
        )
        .unwrap();
        CredentialManager::new(Arc::new(store.clone()), dropbox)
    }

    fn store_with(expires_in: Option<ChronoDuration>, now: DateTime<Utc>) -> MockProfileStore {
        let store = MockProfileStore::new();
        store.add_credential(
            USER,
            Credential {
                access_token: Some("stored-token".to_string()),
                refresh_token: Some("refresh-token".to_string()),
                expires_at: expires_in.map(|delta| now + delta),
            },
        );
        store
    }

    async fn mock_refresh(server: &mut mockito::ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"refreshed-token","token_type":"bearer","expires_in":14400}"#)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fresh_token_returned_without_network_or_write() {
        let mut server = mockito::Server::new_async().await;
        let refresh = mock_refresh(&mut server, 0).await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::hours(2)), now);

        let token = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap();

        assert_eq!(token.access_token, "stored-token");
        assert!(!token.refreshed);
        assert_eq!(store.write_count(), 0);
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_two_minutes_before_expiry() {
        let mut server = mockito::Server::new_async().await;
        let refresh = mock_refresh(&mut server, 1).await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::minutes(2)), now);

        let token = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap();

        assert_eq!(token.access_token, "refreshed-token");
        assert!(token.refreshed);
        assert_eq!(store.write_count(), 1);

        let stored = store.credential(USER).unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("refreshed-token"));
        assert_eq!(stored.expires_at, Some(now + ChronoDuration::hours(4)));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-token"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_iff_within_safety_margin() {
        let cases = [
            (ChronoDuration::minutes(-60), true),
            (ChronoDuration::zero(), true),
            (ChronoDuration::minutes(4), true),
            (ChronoDuration::minutes(5), true),
            (ChronoDuration::minutes(5) + ChronoDuration::seconds(1), false),
            (ChronoDuration::minutes(30), false),
            (ChronoDuration::days(3), false),
        ];

        for (expires_in, expect_refresh) in cases {
            let mut server = mockito::Server::new_async().await;
            let refresh = mock_refresh(&mut server, usize::from(expect_refresh)).await;
            let now = Utc::now();
            let store = store_with(Some(expires_in), now);

            let token = manager(&store, &server.url())
                .get_valid_access_token_at(USER, now)
                .await
                .unwrap();

            assert_eq!(token.refreshed, expect_refresh, "expires in {}", expires_in);
            assert_eq!(store.write_count(), usize::from(expect_refresh));
            refresh.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_missing_expiry_is_treated_as_expired() {
        let mut server = mockito::Server::new_async().await;
        let refresh = mock_refresh(&mut server, 1).await;
        let now = Utc::now();
        let store = store_with(None, now);

        let token = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap();
        assert!(token.refreshed);
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_shorter_provider_lifetime_is_honoured() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"short","expires_in":1800}"#)
            .create_async()
            .await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::minutes(1)), now);

        manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap();

        let stored = store.credential(USER).unwrap();
        assert_eq!(stored.expires_at, Some(now + ChronoDuration::minutes(30)));
    }

    #[tokio::test]
    async fn test_lifetime_inside_safety_margin_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tiny","expires_in":60}"#)
            .create_async()
            .await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::minutes(1)), now);

        let err = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RefreshFailed { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_principal_is_credential_not_found() {
        let server = mockito::Server::new_async().await;
        let store = MockProfileStore::new();

        let err = manager(&store, &server.url())
            .get_valid_access_token("nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CredentialNotFound));
    }

    #[tokio::test]
    async fn test_blank_access_token_is_credential_not_found() {
        let server = mockito::Server::new_async().await;
        let store = MockProfileStore::new();
        store.add_credential(
            USER,
            Credential {
                access_token: Some(String::new()),
                refresh_token: Some("refresh-token".to_string()),
                expires_at: None,
            },
        );

        let err = manager(&store, &server.url())
            .get_valid_access_token(USER)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CredentialNotFound));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let server = mockito::Server::new_async().await;
        let now = Utc::now();
        let store = MockProfileStore::new();
        store.add_credential(
            USER,
            Credential {
                access_token: Some("stale".to_string()),
                refresh_token: None,
                expires_at: Some(now - ChronoDuration::hours(1)),
            },
        );

        let err = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RefreshTokenMissing));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::minutes(-5)), now);

        let err = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RefreshFailed { status: 400, .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_targets_credential() {
        let mut server = mockito::Server::new_async().await;
        mock_refresh(&mut server, 1).await;
        let now = Utc::now();
        let store = store_with(Some(ChronoDuration::minutes(-5)), now);
        store.fail_writes();

        let err = manager(&store, &server.url())
            .get_valid_access_token_at(USER, now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::PersistFailed {
                target: PersistTarget::Credential,
                ..
            }
        ));
        assert!(err.is_credential_failure());
    }
}
