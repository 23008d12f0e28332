//! Reference item repository: owner lookup and waveform columns.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use wavepeak_core::models::{ReferenceItem, WaveformUpdate};

use super::{parse_id, require_id};
use crate::store::{ReferenceItemStore, StoreError, StoreResult};

/// Row type for the owner lookup on `reference_items` (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct ReferenceItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
}

impl ReferenceItemRow {
    pub fn to_reference_item(self) -> ReferenceItem {
        ReferenceItem {
            id: self.id.to_string(),
            user_id: self.user_id.to_string(),
        }
    }
}

/// Repository for the reference_items table.
#[derive(Clone)]
pub struct ReferenceItemRepository {
    pool: PgPool,
}

impl ReferenceItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceItemStore for ReferenceItemRepository {
    #[tracing::instrument(skip(self), fields(db.table = "reference_items"))]
    async fn get_reference_item(&self, id: &str) -> StoreResult<Option<ReferenceItem>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };

        let row: Option<ReferenceItemRow> = sqlx::query_as::<Postgres, ReferenceItemRow>(
            "SELECT id, user_id FROM reference_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ReferenceItemRow::to_reference_item))
    }

    #[tracing::instrument(
        skip(self, update),
        fields(db.table = "reference_items", peaks = update.peaks.len())
    )]
    async fn update_waveform(&self, id: &str, update: &WaveformUpdate) -> StoreResult<()> {
        let id = require_id(id)?;
        let sample_rate = sample_rate_column(update.sample_rate)?;

        let result = sqlx::query(
            r#"
            UPDATE reference_items
            SET waveform_peaks = $2,
                duration_seconds = COALESCE($3, duration_seconds),
                sample_rate = COALESCE($4, sample_rate),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(&update.peaks))
        .bind(update.duration_seconds)
        .bind(sample_rate)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NoRowMatched {
                table: "reference_items",
                id: id.to_string(),
            });
        }

        Ok(())
    }
}

/// `sample_rate` is an INTEGER column.
fn sample_rate_column(rate: Option<u32>) -> StoreResult<Option<i32>> {
    rate.map(|rate| {
        i32::try_from(rate)
            .map_err(|_| StoreError::InvalidValue(format!("sample_rate {} out of range", rate)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_column_rejects_out_of_range() {
        assert_eq!(sample_rate_column(Some(44100)).unwrap(), Some(44100));
        assert_eq!(sample_rate_column(None).unwrap(), None);
        assert!(matches!(
            sample_rate_column(Some(u32::MAX)),
            Err(StoreError::InvalidValue(_))
        ));
    }
}
