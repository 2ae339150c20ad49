use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::like_pattern;
use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{ActiveRevenue, SubscriptionStats, SubscriptionTotals};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub subscription_id: String,
    pub email: String,
    pub status: String, // 'active', 'trialing', 'canceled', ...
    pub price_amount: f64,
    pub quantity: i32,
    pub currency: String,
    pub interval: String, // 'week', 'month', 'year'; anything else is priced as daily
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionData {
    pub subscription_id: String,
    pub email: String,
    pub status: String,
    pub price_amount: f64,
    pub quantity: i32,
    pub currency: String,
    pub interval: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub email: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR email = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL OR subscription_id ILIKE $3 OR email ILIKE $3)
"#;

impl Subscription {
    pub async fn create(pool: &PgPool, data: CreateSubscriptionData) -> Result<Self, sqlx::Error> {
        let subscription = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO subscriptions (
                subscription_id, email, status, price_amount, quantity, currency,
                "interval", current_period_start, current_period_end, trial_start,
                trial_end, canceled_at, ended_at, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    COALESCE($15, NOW()), NOW())
            RETURNING *
            "#,
        )
        .bind(&data.subscription_id)
        .bind(&data.email)
        .bind(&data.status)
        .bind(data.price_amount)
        .bind(data.quantity)
        .bind(&data.currency)
        .bind(&data.interval)
        .bind(data.current_period_start)
        .bind(data.current_period_end)
        .bind(data.trial_start)
        .bind(data.trial_end)
        .bind(data.canceled_at)
        .bind(data.ended_at)
        .bind(&data.metadata)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(subscription)
    }

    pub async fn insert_many(
        pool: &PgPool,
        records: Vec<CreateSubscriptionData>,
    ) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    pub async fn find_by_subscription_id(
        pool: &PgPool,
        subscription_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let subscription = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subscriptions WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?;

        Ok(subscription)
    }

    pub async fn list(
        pool: &PgPool,
        filter: &SubscriptionFilter,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT * FROM subscriptions {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            FILTER_CLAUSE
        );

        let subscriptions = sqlx::query_as::<_, Self>(&query)
            .bind(&filter.email)
            .bind(&filter.status)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await?;

        Ok(subscriptions)
    }

    pub async fn list_by_email(
        pool: &PgPool,
        email: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = SubscriptionFilter {
            email: Some(email.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = SubscriptionFilter {
            status: Some(status.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    /// Case-insensitive substring search over subscription_id and email
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let filter = SubscriptionFilter {
            search: Some(query.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        Self::count_matching(pool, &SubscriptionFilter::default()).await
    }

    pub async fn count_matching(
        pool: &PgPool,
        filter: &SubscriptionFilter,
    ) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM subscriptions {}", FILTER_CLAUSE);

        let count: i64 = sqlx::query_scalar(&query)
            .bind(&filter.email)
            .bind(&filter.status)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts by status plus MRR/ARR over active subscriptions (unrounded)
    pub async fn stats(pool: &PgPool) -> Result<SubscriptionStats, sqlx::Error> {
        let totals = sqlx::query_as::<_, SubscriptionTotals>(
            r#"
            SELECT
                COUNT(*) AS total_subscriptions,
                COUNT(*) FILTER (WHERE status = 'active') AS active_subscriptions,
                COUNT(*) FILTER (WHERE status = 'canceled') AS canceled_subscriptions,
                COUNT(*) FILTER (WHERE status = 'trialing') AS trialing_subscriptions
            FROM subscriptions
            "#,
        )
        .fetch_one(pool)
        .await?;

        let revenue = sqlx::query_as::<_, ActiveRevenue>(
            r#"
            SELECT "interval", SUM(price_amount * quantity)::float8 AS amount
            FROM subscriptions
            WHERE status = 'active'
            GROUP BY "interval"
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(SubscriptionStats::from_totals(&totals, &revenue))
    }

    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscriptions").execute(pool).await?;
        Ok(result.rows_affected())
    }
}
