use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::api::{response::ApiResponse, AppState};
use crate::error::{is_unique_violation, AppError, Result};
use crate::models::transaction::{
    CreateTransactionData, ReviewOutcome, Transaction, TransactionFilter,
};
use crate::services::aggregation::TransactionStats;
use crate::services::review::{ReviewAction, ReviewDecision};
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub stats: Option<String>,
}

impl TransactionQuery {
    fn filter(&self) -> std::result::Result<TransactionFilter, ValidationError> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|d| validation::parse_date("startDate", d, false))
            .transpose()?;
        let end_date = self
            .end_date
            .as_deref()
            .map(|d| validation::parse_date("endDate", d, true))
            .transpose()?;

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(ValidationError(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }

        Ok(TransactionFilter {
            email: validation::non_blank(self.email.clone()).map(|e| e.to_lowercase()),
            status: validation::non_blank(self.status.clone()),
            search: validation::non_blank(self.search.clone()),
            start_date,
            end_date,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionRequest {
    pub transaction_id: Option<String>,
    pub email: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub customer_name: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub gateway: Option<String>,
    pub risk_score: Option<i32>,
    pub fraud_detected: Option<bool>,
    pub chargeback_predicted: Option<bool>,
    pub chargeback_confidence: Option<f64>,
    pub metadata: Option<JsonValue>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateTransactionRequest {
    /// Checks required fields and applies defaults
    pub fn into_data(self) -> std::result::Result<CreateTransactionData, ValidationError> {
        let transaction_id = validation::non_blank(self.transaction_id);
        let email = validation::non_blank(self.email);

        validation::require_fields(&[
            ("transaction_id", transaction_id.is_some()),
            ("email", email.is_some()),
            ("amount", self.amount.is_some()),
        ])?;

        let (Some(transaction_id), Some(email), Some(amount)) = (transaction_id, email, self.amount)
        else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        Ok(CreateTransactionData {
            transaction_id,
            email: validation::normalize_email(&email)?,
            customer_name: validation::non_blank(self.customer_name),
            description: validation::non_blank(self.description),
            payment_method: validation::non_blank(self.payment_method),
            gateway: validation::non_blank(self.gateway),
            amount: validation::positive_amount("amount", amount)?,
            currency: validation::normalize_currency(self.currency.as_deref().unwrap_or("USD"))?,
            status: validation::non_blank(self.status).unwrap_or_else(|| "pending".to_string()),
            risk_score: validation::risk_score(self.risk_score.unwrap_or(0))?,
            fraud_detected: self.fraud_detected.unwrap_or(false),
            chargeback_predicted: self.chargeback_predicted.unwrap_or(false),
            chargeback_confidence: validation::normalize_confidence(
                "chargeback_confidence",
                self.chargeback_confidence.unwrap_or(0.0),
            )?,
            metadata: metadata_object(self.metadata)?,
            created_at: validation::stored_precision(self.created_at),
        })
    }
}

/// Free-form metadata must be a JSON object; absent means `{}`.
pub(crate) fn metadata_object(
    metadata: Option<JsonValue>,
) -> std::result::Result<JsonValue, ValidationError> {
    match metadata {
        None | Some(JsonValue::Null) => Ok(JsonValue::Object(Default::default())),
        Some(value @ JsonValue::Object(_)) => Ok(value),
        Some(_) => Err(ValidationError("metadata must be a JSON object".to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewTransactionRequest {
    pub transaction_id: Option<String>,
    pub action: Option<String>,
    pub notes: Option<String>,
    pub retrain_model: Option<bool>,
    /// When set, the review only applies if the transaction is unchanged since then.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

/// List transactions, optionally with stats over the same filter
async fn list_transactions(
    State(state): State<AppState>,
    query: std::result::Result<Query<TransactionQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Transaction>, TransactionStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;
    let filter = query.filter()?;

    let (transactions, total_count) = tokio::try_join!(
        Transaction::list(&state.pool, &filter, page.limit, page.skip),
        Transaction::count_matching(&state.pool, &filter),
    )?;

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(Transaction::stats(&state.pool, &filter).await?.rounded())
    } else {
        None
    };

    Ok(Json(
        ApiResponse::data(transactions)
            .with_page(total_count, page)
            .with_stats(stats),
    ))
}

/// Record a new transaction
async fn create_transaction(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;
    let transaction_id = data.transaction_id.clone();

    let transaction = Transaction::create(&state.pool, data)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Transaction {} already exists", transaction_id))
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(
        transaction_id = %transaction.transaction_id,
        amount = transaction.amount,
        "Created transaction"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::data(transaction))))
}

/// Apply a manual review decision (`mark_safe` / `mark_fraud`)
async fn review_transaction(
    State(state): State<AppState>,
    body: std::result::Result<Json<ReviewTransactionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ReviewOutcome>>> {
    let Json(body) = body?;
    let transaction_id = validation::non_blank(body.transaction_id);
    let action = validation::non_blank(body.action);

    validation::require_fields(&[
        ("transaction_id", transaction_id.is_some()),
        ("action", action.is_some()),
    ])?;

    let (Some(transaction_id), Some(action)) = (transaction_id, action) else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };

    let action: ReviewAction = action.parse()?;
    let decision = ReviewDecision::new(action, body.notes, body.retrain_model, Utc::now());

    let outcome = Transaction::apply_review(
        &state.pool,
        &transaction_id,
        &decision,
        body.expected_updated_at,
    )
    .await?;

    match outcome {
        Some(outcome) => {
            tracing::info!(
                transaction_id = %outcome.transaction_id,
                marked_as = ?outcome.manual_review.marked_as,
                risk_score = outcome.risk_score,
                "Transaction reviewed"
            );

            Ok(Json(
                ApiResponse::data(outcome).with_message("Transaction review recorded"),
            ))
        }
        None => {
            let exists = body.expected_updated_at.is_some()
                && Transaction::find_by_transaction_id(&state.pool, &transaction_id)
                    .await?
                    .is_some();

            if exists {
                Err(AppError::Conflict(format!(
                    "Transaction {} was modified since expected_updated_at",
                    transaction_id
                )))
            } else {
                Err(AppError::NotFound(format!(
                    "Transaction {} not found",
                    transaction_id
                )))
            }
        }
    }
}

/// Fetch one transaction by its business key
async fn get_transaction(
    State(state): State<AppState>,
    transaction_id: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<Transaction>>> {
    let Path(transaction_id) = transaction_id?;

    let transaction = Transaction::find_by_transaction_id(&state.pool, &transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", transaction_id)))?;

    Ok(Json(ApiResponse::data(transaction)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions)
                .post(create_transaction)
                .patch(review_transaction),
        )
        .route("/transactions/:transaction_id", get(get_transaction))
}
