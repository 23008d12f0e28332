use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A stored token is only handed out while it has at least this much life left.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 5 * 60;

/// Upper bound on how long a freshly refreshed token is trusted.
pub const REFRESHED_TOKEN_VALIDITY_SECS: i64 = 4 * 60 * 60;

/// Dropbox credential stored on a principal's profile row.
#[derive(Clone, Default)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// `None` when the column is empty or could not be parsed.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the stored access token can be used as-is at `now`.
    ///
    /// A credential without a known expiry is never fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS),
            None => false,
        }
    }

    /// Non-empty refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    /// Non-empty access token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Fields written back after a successful refresh.
#[derive(Clone)]
pub struct CredentialUpdate {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("access_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Access token that is valid for at least [`EXPIRY_SAFETY_MARGIN_SECS`].
#[derive(Clone)]
pub struct ValidToken {
    pub access_token: String,
    pub refreshed: bool,
}

impl fmt::Debug for ValidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidToken")
            .field("access_token", &"***")
            .field("refreshed", &self.refreshed)
            .finish()
    }
}

/// Validity window for a refreshed token: the provider's `expires_in` when
/// reported, capped at [`REFRESHED_TOKEN_VALIDITY_SECS`].
pub fn refreshed_validity(expires_in_secs: Option<i64>) -> Duration {
    let cap = REFRESHED_TOKEN_VALIDITY_SECS;
    match expires_in_secs {
        Some(secs) if secs > 0 => Duration::seconds(secs.min(cap)),
        _ => Duration::seconds(cap),
    }
}
