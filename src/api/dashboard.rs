use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{response::ApiResponse, AppState};
use crate::error::Result;
use crate::models::{
    customer::CustomerFilter, subscription::SubscriptionFilter, transaction::TransactionFilter,
    ChargebackPrediction, Customer, FraudResult, Subscription,
    SubscriptionForecast, Transaction,
};
use crate::services::aggregation::{
    ChargebackStats, CustomerStats, ForecastStats, FraudStats, SubscriptionStats,
    TransactionStats,
};
use crate::services::validation;

/// How many of the newest rows per collection `includeData=true` attaches.
pub const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub include_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub transactions: TransactionStats,
    pub customers: CustomerStats,
    pub subscriptions: SubscriptionStats,
    pub fraud: FraudStats,
    pub chargebacks: ChargebackStats,
    pub forecasts: ForecastStats,
}

impl DashboardStats {
    fn rounded(self) -> Self {
        Self {
            transactions: self.transactions.rounded(),
            customers: self.customers.rounded(),
            subscriptions: self.subscriptions.rounded(),
            fraud: self.fraud.rounded(),
            chargebacks: self.chargebacks.rounded(),
            forecasts: self.forecasts.rounded(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRecords {
    pub transactions: Vec<Transaction>,
    pub customers: Vec<Customer>,
    pub subscriptions: Vec<Subscription>,
    pub fraud_results: Vec<FraudResult>,
    pub chargeback_predictions: Vec<ChargebackPrediction>,
    pub subscription_forecasts: Vec<SubscriptionForecast>,
}

async fn load_stats(state: &AppState) -> std::result::Result<DashboardStats, sqlx::Error> {
    let pool = &state.pool;
    let all_transactions = TransactionFilter::default();

    let (transactions, customers, subscriptions, fraud, chargebacks, forecasts) = tokio::try_join!(
        Transaction::stats(pool, &all_transactions),
        Customer::stats(pool),
        Subscription::stats(pool),
        FraudResult::stats(pool),
        ChargebackPrediction::stats(pool),
        SubscriptionForecast::stats(pool),
    )?;

    Ok(DashboardStats {
        transactions,
        customers,
        subscriptions,
        fraud,
        chargebacks,
        forecasts,
    })
}

async fn load_recent(state: &AppState) -> std::result::Result<RecentRecords, sqlx::Error> {
    let pool = &state.pool;
    let all_transactions = TransactionFilter::default();
    let all_customers = CustomerFilter::default();
    let all_subscriptions = SubscriptionFilter::default();

    let (
        transactions,
        customers,
        subscriptions,
        fraud_results,
        chargeback_predictions,
        subscription_forecasts,
    ) = tokio::try_join!(
        Transaction::list(pool, &all_transactions, RECENT_LIMIT, 0),
        Customer::list(pool, &all_customers, RECENT_LIMIT, 0),
        Subscription::list(pool, &all_subscriptions, RECENT_LIMIT, 0),
        FraudResult::list(pool, RECENT_LIMIT, 0),
        ChargebackPrediction::list(pool, RECENT_LIMIT, 0),
        SubscriptionForecast::list(pool, RECENT_LIMIT, 0),
    )?;

    Ok(RecentRecords {
        transactions,
        customers,
        subscriptions,
        fraud_results,
        chargeback_predictions,
        subscription_forecasts,
    })
}

/// Combined stats for every collection; `includeData=true` adds the newest rows
async fn get_dashboard(
    State(state): State<AppState>,
    query: std::result::Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<RecentRecords, DashboardStats>>> {
    let Query(query) = query?;

    let (stats, recent) = if validation::flag(query.include_data.as_deref()) {
        let (stats, recent) = tokio::try_join!(load_stats(&state), load_recent(&state))?;
        (stats, Some(recent))
    } else {
        (load_stats(&state).await?, None)
    };

    Ok(Json(
        ApiResponse::optional(recent).with_stats(Some(stats.rounded())),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard))
}
