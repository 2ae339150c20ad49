use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{ChargebackStats, ChargebackTotals};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChargebackPrediction {
    pub id: Uuid,
    pub transaction_id: String,
    pub chargeback_predicted: bool,
    pub confidence: f64, // 0-1 fraction
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateChargebackPredictionData {
    pub transaction_id: String,
    pub chargeback_predicted: bool,
    pub confidence: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl ChargebackPrediction {
    pub async fn create(
        pool: &PgPool,
        data: CreateChargebackPredictionData,
    ) -> Result<Self, sqlx::Error> {
        let prediction = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO chargeback_predictions (
                transaction_id, chargeback_predicted, confidence, created_at
            )
            VALUES ($1, $2, $3, COALESCE($4, NOW()))
            RETURNING *
            "#,
        )
        .bind(&data.transaction_id)
        .bind(data.chargeback_predicted)
        .bind(data.confidence)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(prediction)
    }

    pub async fn insert_many(
        pool: &PgPool,
        records: Vec<CreateChargebackPredictionData>,
    ) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    pub async fn list(pool: &PgPool, limit: i64, skip: i64) -> Result<Vec<Self>, sqlx::Error> {
        let predictions = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM chargeback_predictions
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await?;

        Ok(predictions)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chargeback_predictions")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn stats(pool: &PgPool) -> Result<ChargebackStats, sqlx::Error> {
        let totals = sqlx::query_as::<_, ChargebackTotals>(
            r#"
            SELECT
                COUNT(*) AS total_predictions,
                COUNT(*) FILTER (WHERE chargeback_predicted) AS predicted_chargebacks,
                COALESCE(SUM(confidence), 0)::float8 AS confidence_sum
            FROM chargeback_predictions
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(ChargebackStats::from_totals(&totals))
    }

    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chargeback_predictions")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
