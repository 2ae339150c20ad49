use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::like_pattern;
use crate::models::{insert_each, BulkInsertReport};
use crate::services::aggregation::{CustomerStats, CustomerTotals};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub balance: f64, // positive = credit, negative = owed
    pub currency: String,
    pub delinquent: bool,
    pub address: Option<Json<Address>>,
    pub gateway_ids: Json<BTreeMap<String, String>>, // gateway name -> external customer id
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCustomerData {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub balance: f64,
    pub currency: String,
    pub delinquent: bool,
    pub address: Option<Address>,
    pub gateway_ids: BTreeMap<String, String>,
    pub metadata: JsonValue,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub email: Option<String>,
    pub search: Option<String>,
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR email = $1)
      AND ($2::text IS NULL OR email ILIKE $2 OR name ILIKE $2)
"#;

impl Customer {
    /// Creates a customer; fails with a unique violation if the email exists
    pub async fn create(pool: &PgPool, data: CreateCustomerData) -> Result<Self, sqlx::Error> {
        let customer = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO customers (
                email, name, phone, balance, currency, delinquent,
                address, gateway_ids, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW()), NOW())
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.name)
        .bind(&data.phone)
        .bind(data.balance)
        .bind(&data.currency)
        .bind(data.delinquent)
        .bind(data.address.as_ref().map(Json))
        .bind(Json(&data.gateway_ids))
        .bind(&data.metadata)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(customer)
    }

    pub async fn insert_many(pool: &PgPool, records: Vec<CreateCustomerData>) -> BulkInsertReport {
        insert_each(records, |data| async move {
            Self::create(pool, data).await.map(|_| ())
        })
        .await
    }

    /// Finds a customer by their internal ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let customer = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM customers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(customer)
    }

    /// Finds a customer by email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let customer = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM customers WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(customer)
    }

    pub async fn list(
        pool: &PgPool,
        filter: &CustomerFilter,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT * FROM customers {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            FILTER_CLAUSE
        );

        let customers = sqlx::query_as::<_, Self>(&query)
            .bind(&filter.email)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await?;

        Ok(customers)
    }

    /// Case-insensitive substring search over email and name
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let filter = CustomerFilter {
            search: Some(query.to_string()),
            ..Default::default()
        };
        Self::list(pool, &filter, limit, 0).await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        Self::count_matching(pool, &CustomerFilter::default()).await
    }

    pub async fn count_matching(pool: &PgPool, filter: &CustomerFilter) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM customers {}", FILTER_CLAUSE);

        let count: i64 = sqlx::query_scalar(&query)
            .bind(&filter.email)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn stats(pool: &PgPool) -> Result<CustomerStats, sqlx::Error> {
        let totals = sqlx::query_as::<_, CustomerTotals>(
            r#"
            SELECT
                COUNT(*) AS total_customers,
                COUNT(*) FILTER (WHERE delinquent) AS delinquent_customers,
                COALESCE(SUM(balance), 0)::float8 AS total_balance
            FROM customers
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(CustomerStats::from_totals(&totals))
    }

    pub async fn clear(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers").execute(pool).await?;
        Ok(result.rows_affected())
    }
}
