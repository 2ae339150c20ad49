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

use crate::api::{response::ApiResponse, AppState};
use crate::error::Result;
use crate::models::fraud_result::{CreateFraudResultData, FraudResult};
use crate::services::aggregation::FraudStats;
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct FraudResultQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub transaction_id: Option<String>,
    pub stats: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFraudResultRequest {
    pub transaction_id: Option<String>,
    pub email: Option<String>,
    pub fraud_detected: Option<bool>,
    pub confidence: Option<f64>,
    pub reasons: Option<Vec<String>>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl CreateFraudResultRequest {
    pub fn into_data(self) -> std::result::Result<CreateFraudResultData, ValidationError> {
        let transaction_id = validation::non_blank(self.transaction_id);

        validation::require_fields(&[
            ("transaction_id", transaction_id.is_some()),
            ("fraud_detected", self.fraud_detected.is_some()),
        ])?;

        let (Some(transaction_id), Some(fraud_detected)) = (transaction_id, self.fraud_detected)
        else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        let email = validation::non_blank(self.email)
            .map(|e| validation::normalize_email(&e))
            .transpose()?;

        Ok(CreateFraudResultData {
            transaction_id,
            email,
            fraud_detected,
            confidence: validation::normalize_confidence(
                "confidence",
                self.confidence.unwrap_or(0.0),
            )?,
            reasons: self.reasons.unwrap_or_default(),
            checked_at: validation::stored_precision(self.checked_at),
        })
    }
}

/// Fraud checks, newest first; `transaction_id` narrows to one transaction
async fn list_fraud_results(
    State(state): State<AppState>,
    query: std::result::Result<Query<FraudResultQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<FraudResult>, FraudStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;

    let response = match validation::non_blank(query.transaction_id) {
        Some(transaction_id) => {
            let results =
                FraudResult::list_by_transaction_id(&state.pool, &transaction_id, page.limit)
                    .await?;
            ApiResponse::data(results)
        }
        None => {
            let (results, total_count) = tokio::try_join!(
                FraudResult::list(&state.pool, page.limit, page.skip),
                FraudResult::count(&state.pool),
            )?;
            ApiResponse::data(results).with_page(total_count, page)
        }
    };

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(FraudResult::stats(&state.pool).await?.rounded())
    } else {
        None
    };

    Ok(Json(response.with_stats(stats)))
}

async fn create_fraud_result(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateFraudResultRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<FraudResult>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;

    let result = FraudResult::create(&state.pool, data).await?;

    tracing::info!(
        transaction_id = %result.transaction_id,
        fraud_detected = result.fraud_detected,
        "Recorded fraud check"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::data(result))))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/fraud_results",
        get(list_fraud_results).post(create_fraud_result),
    )
}
