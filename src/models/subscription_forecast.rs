use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{ForecastStats, ForecastTotals};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionForecast {
    pub id: Uuid,
    pub subscription_id: String,
    pub predicted_revenue: f64,
    pub confidence: f64,
    pub forecast_period: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateForecastData {
    pub subscription_id: String,
    pub predicted_revenue: f64,
    pub confidence: f64,
    pub forecast_period: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SubscriptionForecast {
    pub async fn create(pool: &PgPool, data: CreateForecastData) -> Result<Self, sqlx::Error> {
        let forecast = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO subscription_forecasts (
                subscription_id, predicted_revenue, confidence, forecast_period, created_at
            )
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            RETURNING *
            "#,
        )
        .bind(&data.subscription_id)
        .bind(data.predicted_revenue)
        .bind(data.confidence)
        .bind(&data.forecast_period)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(forecast)
    }

    pub async fn insert_many(pool: &PgPool, records: Vec<CreateForecastData>) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    pub async fn list(pool: &PgPool, limit: i64, skip: i64) -> Result<Vec<Self>, sqlx::Error> {
        let forecasts = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subscription_forecasts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await?;

        Ok(forecasts)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription_forecasts")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn stats(pool: &PgPool) -> Result<ForecastStats, sqlx::Error> {
        let totals = sqlx::query_as::<_, ForecastTotals>(
            r#"
            SELECT
                COUNT(*) AS total_forecasts,
                COALESCE(SUM(predicted_revenue), 0)::float8 AS total_predicted_revenue,
                COALESCE(SUM(confidence), 0)::float8 AS confidence_sum
            FROM subscription_forecasts
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(ForecastStats::from_totals(&totals))
    }

    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscription_forecasts")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
