use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::db::like_pattern;
use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{TransactionStats, TransactionTotals};
use crate::services::review::ReviewDecision;

/// Risk band shown next to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const MEDIUM_THRESHOLD: i32 = 40;
    pub const HIGH_THRESHOLD: i32 = 70;

    pub fn from_score(score: i32) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown risk level: {0}")]
pub struct UnknownRiskLevel(String);

impl TryFrom<String> for RiskLevel {
    type Error = UnknownRiskLevel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(UnknownRiskLevel(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMark {
    Safe,
    Fraud,
}

/// Audit record of the latest manual review, stored as JSONB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReview {
    pub reviewed: bool,
    pub reviewed_at: DateTime<Utc>,
    pub marked_as: ReviewMark,
    pub notes: String,
    pub retrain_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_id: String,
    pub email: String,
    pub customer_name: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub gateway: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub risk_score: i32,
    #[sqlx(try_from = "String")]
    pub risk_level: RiskLevel,
    pub fraud_detected: bool,
    pub chargeback_predicted: bool,
    pub chargeback_confidence: f64, // 0-1 fraction
    pub manual_review: Option<Json<ManualReview>>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTransactionData {
    pub transaction_id: String,
    pub email: String,
    pub customer_name: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub gateway: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub risk_score: i32,
    pub fraud_detected: bool,
    pub chargeback_predicted: bool,
    pub chargeback_confidence: f64,
    pub metadata: JsonValue,
    pub created_at: Option<DateTime<Utc>>,
}

/// Conjunctive listing filter; unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub email: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(like_pattern)
    }
}

/// Fields written by a review, as returned by the update itself.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewOutcome {
    pub transaction_id: String,
    pub fraud_detected: bool,
    #[sqlx(try_from = "String")]
    pub risk_level: RiskLevel,
    pub risk_score: i32,
    pub manual_review: Json<ManualReview>,
    pub updated_at: DateTime<Utc>,
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR email = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL OR transaction_id ILIKE $3 OR email ILIKE $3)
      AND ($4::timestamptz IS NULL OR created_at >= $4)
      AND ($5::timestamptz IS NULL OR created_at <= $5)
"#;

impl Transaction {
    /// Creates a transaction; `risk_level` follows `risk_score`
    pub async fn create(pool: &PgPool, data: CreateTransactionData) -> Result<Self, sqlx::Error> {
        let risk_level = RiskLevel::from_score(data.risk_score);

        let transaction = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO transactions (
                transaction_id, email, customer_name, description, payment_method,
                gateway, amount, currency, status, risk_score, risk_level,
                fraud_detected, chargeback_predicted, chargeback_confidence,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    COALESCE($16, NOW()), NOW())
            RETURNING *
            "#,
        )
        .bind(&data.transaction_id)
        .bind(&data.email)
        .bind(&data.customer_name)
        .bind(&data.description)
        .bind(&data.payment_method)
        .bind(&data.gateway)
        .bind(data.amount)
        .bind(&data.currency)
        .bind(&data.status)
        .bind(data.risk_score)
        .bind(risk_level.as_str())
        .bind(data.fraud_detected)
        .bind(data.chargeback_predicted)
        .bind(data.chargeback_confidence)
        .bind(&data.metadata)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(transaction)
    }

    /// Inserts each record independently; see [`BulkInsertReport`]
    pub async fn insert_many(
        pool: &PgPool,
        records: Vec<CreateTransactionData>,
    ) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    /// Finds a transaction by its business key
    pub async fn find_by_transaction_id(
        pool: &PgPool,
        transaction_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let transaction = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM transactions WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;

        Ok(transaction)
    }

    /// Lists transactions matching `filter`, newest first
    pub async fn list(
        pool: &PgPool,
        filter: &TransactionFilter,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT * FROM transactions {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            FILTER_CLAUSE
        );

        let transactions = sqlx::query_as::<_, Self>(&query)
            .bind(&filter.email)
            .bind(&filter.status)
            .bind(filter.search_pattern())
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await?;

        Ok(transactions)
    }

    pub async fn list_by_email(
        pool: &PgPool,
        email: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = TransactionFilter {
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
        let filter = TransactionFilter {
            status: Some(status.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    pub async fn list_by_date_range(
        pool: &PgPool,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = TransactionFilter {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    /// Case-insensitive substring search over transaction_id and email
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let filter = TransactionFilter {
            search: Some(query.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        Self::count_matching(pool, &TransactionFilter::default()).await
    }

    pub async fn count_matching(
        pool: &PgPool,
        filter: &TransactionFilter,
    ) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM transactions {}", FILTER_CLAUSE);

        let count: i64 = sqlx::query_scalar(&query)
            .bind(&filter.email)
            .bind(&filter.status)
            .bind(filter.search_pattern())
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Aggregates over the transactions matching `filter` (unrounded)
    pub async fn stats(
        pool: &PgPool,
        filter: &TransactionFilter,
    ) -> Result<TransactionStats, sqlx::Error> {
        let query = format!(
            r#"
            SELECT
                COUNT(*) AS total_transactions,
                COALESCE(SUM(amount), 0)::float8 AS total_amount,
                COUNT(*) FILTER (WHERE status = 'succeeded') AS successful_transactions,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed_transactions,
                COUNT(*) FILTER (WHERE fraud_detected) AS fraud_detected,
                COUNT(*) FILTER (WHERE chargeback_predicted) AS chargebacks_predicted,
                COUNT(*) FILTER (WHERE manual_review IS NOT NULL) AS reviewed_transactions,
                COALESCE(SUM(risk_score), 0)::int8 AS risk_score_sum
            FROM transactions {}
            "#,
            FILTER_CLAUSE
        );

        let totals = sqlx::query_as::<_, TransactionTotals>(&query)
            .bind(&filter.email)
            .bind(&filter.status)
            .bind(filter.search_pattern())
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_one(pool)
            .await?;

        Ok(TransactionStats::from_totals(&totals))
    }

    /// Applies a review decision in a single UPDATE.
    ///
    /// Returns `None` when no row matched: either the transaction does not
    /// exist or, with `expected_updated_at` set, it changed since it was read.
    pub async fn apply_review(
        pool: &PgPool,
        transaction_id: &str,
        decision: &ReviewDecision,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Option<ReviewOutcome>, sqlx::Error> {
        let outcome = sqlx::query_as::<_, ReviewOutcome>(
            r#"
            UPDATE transactions
            SET
                fraud_detected = $2,
                risk_level = $3,
                risk_score = CASE WHEN $2 THEN GREATEST(risk_score, $4)
                                  ELSE LEAST(risk_score, $4) END,
                manual_review = $5,
                updated_at = $6
            WHERE transaction_id = $1
              AND ($7::timestamptz IS NULL OR updated_at = $7)
            RETURNING transaction_id, fraud_detected, risk_level, risk_score,
                      manual_review, updated_at
            "#,
        )
        .bind(transaction_id)
        .bind(decision.fraud_detected)
        .bind(decision.risk_level.as_str())
        .bind(decision.action.risk_score_bound())
        .bind(Json(&decision.manual_review))
        .bind(decision.manual_review.reviewed_at)
        .bind(expected_updated_at)
        .fetch_optional(pool)
        .await?;

        Ok(outcome)
    }

    /// Deletes every transaction (administrative reset)
    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions").execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_score() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(45), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(70), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_round_trips_through_text() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(RiskLevel::try_from(level.as_str().to_string()), Ok(level));
        }
        assert!(RiskLevel::try_from("critical".to_string()).is_err());
    }

    #[test]
    fn test_manual_review_serialization() {
        let review = ManualReview {
            reviewed: true,
            reviewed_at: Utc::now(),
            marked_as: ReviewMark::Fraud,
            notes: String::new(),
            retrain_model: true,
        };

        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["marked_as"], "fraud");
        assert_eq!(json["reviewed"], true);
        assert_eq!(json["notes"], "");
    }
}
