//! Profile repository: Dropbox credential columns of the profiles table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use wavepeak_core::models::{Credential, CredentialUpdate};

use super::{parse_id, require_id};
use crate::store::{ProfileStore, StoreError, StoreResult};

/// Row type for the credential columns of `profiles` (for FromRow).
#[derive(sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub dropbox_access_token: Option<String>,
    pub dropbox_refresh_token: Option<String>,
    pub dropbox_token_expires_at: Option<DateTime<Utc>>,
}

impl ProfileRow {
    pub fn to_credential(self) -> Credential {
        Credential {
            access_token: self.dropbox_access_token,
            refresh_token: self.dropbox_refresh_token,
            expires_at: self.dropbox_token_expires_at,
        }
    }
}

/// Repository for the profiles table.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    #[tracing::instrument(skip(self), fields(db.table = "profiles"))]
    async fn get_credential(&self, user_id: &str) -> StoreResult<Option<Credential>> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(None);
        };

        let row: Option<ProfileRow> = sqlx::query_as::<Postgres, ProfileRow>(
            r#"
            SELECT user_id, dropbox_access_token, dropbox_refresh_token, dropbox_token_expires_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProfileRow::to_credential))
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "profiles"))]
    async fn update_credential(
        &self,
        user_id: &str,
        update: &CredentialUpdate,
    ) -> StoreResult<()> {
        let user_id = require_id(user_id)?;

        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET dropbox_access_token = $2, dropbox_token_expires_at = $3
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&update.access_token)
        .bind(update.expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NoRowMatched {
                table: "profiles",
                id: user_id.to_string(),
            });
        }

        Ok(())
    }
}
