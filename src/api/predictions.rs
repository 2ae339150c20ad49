// Model outputs: chargeback predictions and subscription revenue forecasts

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
use crate::models::chargeback_prediction::{ChargebackPrediction, CreateChargebackPredictionData};
use crate::models::subscription_forecast::{CreateForecastData, SubscriptionForecast};
use crate::services::aggregation::{ChargebackStats, ForecastStats};
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub stats: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChargebackPredictionRequest {
    pub transaction_id: Option<String>,
    pub chargeback_predicted: Option<bool>,
    pub confidence: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateChargebackPredictionRequest {
    pub fn into_data(
        self,
    ) -> std::result::Result<CreateChargebackPredictionData, ValidationError> {
        let transaction_id = validation::non_blank(self.transaction_id);

        validation::require_fields(&[
            ("transaction_id", transaction_id.is_some()),
            ("chargeback_predicted", self.chargeback_predicted.is_some()),
            ("confidence", self.confidence.is_some()),
        ])?;

        let (Some(transaction_id), Some(chargeback_predicted), Some(confidence)) =
            (transaction_id, self.chargeback_predicted, self.confidence)
        else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        Ok(CreateChargebackPredictionData {
            transaction_id,
            chargeback_predicted,
            confidence: validation::normalize_confidence("confidence", confidence)?,
            created_at: validation::stored_precision(self.created_at),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateForecastRequest {
    pub subscription_id: Option<String>,
    pub predicted_revenue: Option<f64>,
    pub confidence: Option<f64>,
    pub forecast_period: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateForecastRequest {
    pub fn into_data(self) -> std::result::Result<CreateForecastData, ValidationError> {
        let subscription_id = validation::non_blank(self.subscription_id);

        validation::require_fields(&[
            ("subscription_id", subscription_id.is_some()),
            ("predicted_revenue", self.predicted_revenue.is_some()),
        ])?;

        let (Some(subscription_id), Some(predicted_revenue)) =
            (subscription_id, self.predicted_revenue)
        else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        Ok(CreateForecastData {
            subscription_id,
            predicted_revenue: validation::non_negative_amount(
                "predicted_revenue",
                predicted_revenue,
            )?,
            confidence: validation::normalize_confidence(
                "confidence",
                self.confidence.unwrap_or(0.0),
            )?,
            forecast_period: validation::non_blank(self.forecast_period),
            created_at: validation::stored_precision(self.created_at),
        })
    }
}

async fn list_chargeback_predictions(
    State(state): State<AppState>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ChargebackPrediction>, ChargebackStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;

    let (predictions, total_count) = tokio::try_join!(
        ChargebackPrediction::list(&state.pool, page.limit, page.skip),
        ChargebackPrediction::count(&state.pool),
    )?;

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(ChargebackPrediction::stats(&state.pool).await?.rounded())
    } else {
        None
    };

    Ok(Json(
        ApiResponse::data(predictions)
            .with_page(total_count, page)
            .with_stats(stats),
    ))
}

async fn create_chargeback_prediction(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateChargebackPredictionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ChargebackPrediction>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;

    let prediction = ChargebackPrediction::create(&state.pool, data).await?;

    tracing::info!(
        transaction_id = %prediction.transaction_id,
        chargeback_predicted = prediction.chargeback_predicted,
        "Recorded chargeback prediction"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::data(prediction))))
}

async fn list_subscription_forecasts(
    State(state): State<AppState>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<SubscriptionForecast>, ForecastStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;

    let (forecasts, total_count) = tokio::try_join!(
        SubscriptionForecast::list(&state.pool, page.limit, page.skip),
        SubscriptionForecast::count(&state.pool),
    )?;

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(SubscriptionForecast::stats(&state.pool).await?.rounded())
    } else {
        None
    };

    Ok(Json(
        ApiResponse::data(forecasts)
            .with_page(total_count, page)
            .with_stats(stats),
    ))
}

async fn create_subscription_forecast(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateForecastRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubscriptionForecast>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;

    let forecast = SubscriptionForecast::create(&state.pool, data).await?;

    tracing::info!(
        subscription_id = %forecast.subscription_id,
        predicted_revenue = forecast.predicted_revenue,
        "Recorded subscription forecast"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::data(forecast))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/chargeback_predictions",
            get(list_chargeback_predictions).post(create_chargeback_prediction),
        )
        .route(
            "/subscription_forecasts",
            get(list_subscription_forecasts).post(create_subscription_forecast),
        )
}
