use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::api::{response::ApiResponse, transactions::metadata_object, AppState};
use crate::error::{is_unique_violation, AppError, Result};
use crate::models::subscription::{CreateSubscriptionData, Subscription, SubscriptionFilter};
use crate::services::aggregation::SubscriptionStats;
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub stats: Option<String>,
}

impl SubscriptionQuery {
    /// Email and status are stored lowercase, so the filter compares them
    /// lowercase too.
    fn filter(&self) -> SubscriptionFilter {
        SubscriptionFilter {
            email: validation::non_blank(self.email.clone()).map(|e| e.to_lowercase()),
            status: validation::non_blank(self.status.clone()).map(|s| s.to_lowercase()),
            search: validation::non_blank(self.search.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSubscriptionRequest {
    pub subscription_id: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub price_amount: Option<f64>,
    pub quantity: Option<i32>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: Option<JsonValue>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateSubscriptionRequest {
    pub fn into_data(self) -> std::result::Result<CreateSubscriptionData, ValidationError> {
        let subscription_id = validation::non_blank(self.subscription_id);
        let email = validation::non_blank(self.email);
        let interval = validation::non_blank(self.interval).map(|i| i.to_lowercase());

        validation::require_fields(&[
            ("subscription_id", subscription_id.is_some()),
            ("email", email.is_some()),
            ("price_amount", self.price_amount.is_some()),
            ("interval", interval.is_some()),
        ])?;

        let (Some(subscription_id), Some(email), Some(price_amount), Some(interval)) =
            (subscription_id, email, self.price_amount, interval)
        else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        let quantity = self.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(ValidationError("quantity must be at least 1".to_string()));
        }

        let status = validation::non_blank(self.status)
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| "active".to_string());

        if self.ended_at.is_some() && matches!(status.as_str(), "active" | "trialing") {
            return Err(ValidationError(format!(
                "ended_at cannot be set on a {} subscription",
                status
            )));
        }

        if let (Some(start), Some(end)) = (self.current_period_start, self.current_period_end) {
            if start > end {
                return Err(ValidationError(
                    "current_period_start must not be after current_period_end".to_string(),
                ));
            }
        }

        Ok(CreateSubscriptionData {
            subscription_id,
            email: validation::normalize_email(&email)?,
            status,
            price_amount: validation::non_negative_amount("price_amount", price_amount)?,
            quantity,
            currency: validation::normalize_currency(self.currency.as_deref().unwrap_or("USD"))?,
            interval,
            current_period_start: validation::stored_precision(self.current_period_start),
            current_period_end: validation::stored_precision(self.current_period_end),
            trial_start: validation::stored_precision(self.trial_start),
            trial_end: validation::stored_precision(self.trial_end),
            canceled_at: validation::stored_precision(self.canceled_at),
            ended_at: validation::stored_precision(self.ended_at),
            metadata: metadata_object(self.metadata)?,
            created_at: validation::stored_precision(self.created_at),
        })
    }
}

/// List subscriptions; `stats=true` adds MRR, ARR and churn over all subscriptions
async fn list_subscriptions(
    State(state): State<AppState>,
    query: std::result::Result<Query<SubscriptionQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Subscription>, SubscriptionStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;

    let filter = query.filter();

    let (subscriptions, total_count) = tokio::try_join!(
        Subscription::list(&state.pool, &filter, page.limit, page.skip),
        Subscription::count_matching(&state.pool, &filter),
    )?;

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(Subscription::stats(&state.pool).await?.rounded())
    } else {
        None
    };

    Ok(Json(
        ApiResponse::data(subscriptions)
            .with_page(total_count, page)
            .with_stats(stats),
    ))
}

async fn create_subscription(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateSubscriptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Subscription>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;
    let subscription_id = data.subscription_id.clone();

    let subscription = Subscription::create(&state.pool, data)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Subscription {} already exists", subscription_id))
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(
        subscription_id = %subscription.subscription_id,
        interval = %subscription.interval,
        "Created subscription"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::data(subscription))))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/subscriptions",
        get(list_subscriptions).post(create_subscription),
    )
}
