use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{FraudStats, FraudTotals};

/// One pass of the external fraud checker over a transaction. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FraudResult {
    pub id: Uuid,
    pub transaction_id: String,
    pub email: Option<String>,
    pub fraud_detected: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateFraudResultData {
    pub transaction_id: String,
    pub email: Option<String>,
    pub fraud_detected: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl FraudResult {
    pub async fn create(pool: &PgPool, data: CreateFraudResultData) -> Result<Self, sqlx::Error> {
        let result = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO fraud_results (
                transaction_id, email, fraud_detected, confidence, reasons, checked_at
            )
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
            RETURNING *
            "#,
        )
        .bind(&data.transaction_id)
        .bind(&data.email)
        .bind(data.fraud_detected)
        .bind(data.confidence)
        .bind(&data.reasons)
        .bind(data.checked_at)
        .fetch_one(pool)
        .await?;

        Ok(result)
    }

    pub async fn insert_many(
        pool: &PgPool,
        records: Vec<CreateFraudResultData>,
    ) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    pub async fn list(pool: &PgPool, limit: i64, skip: i64) -> Result<Vec<Self>, sqlx::Error> {
        let results = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM fraud_results
            ORDER BY checked_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await?;

        Ok(results)
    }

    /// Checks recorded for one transaction, newest first
    pub async fn list_by_transaction_id(
        pool: &PgPool,
        transaction_id: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let results = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM fraud_results
            WHERE transaction_id = $1
            ORDER BY checked_at DESC
            LIMIT $2
            "#,
        )
        .bind(transaction_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(results)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fraud_results")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn stats(pool: &PgPool) -> Result<FraudStats, sqlx::Error> {
        let totals = sqlx::query_as::<_, FraudTotals>(
            r#"
            SELECT
                COUNT(*) AS total_checks,
                COUNT(*) FILTER (WHERE fraud_detected) AS fraud_detected,
                COALESCE(SUM(confidence), 0)::float8 AS confidence_sum
            FROM fraud_results
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(FraudStats::from_totals(&totals))
    }

    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fraud_results").execute(pool).await?;
        Ok(result.rows_affected())
    }
}
