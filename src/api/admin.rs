// Administrative endpoints: bulk import and full reset

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{
    customers::CreateCustomerRequest,
    fraud_results::CreateFraudResultRequest,
    predictions::{CreateChargebackPredictionRequest, CreateForecastRequest},
    response::ApiResponse,
    subscriptions::CreateSubscriptionRequest,
    transactions::CreateTransactionRequest,
    AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    BulkInsertReport, ChargebackPrediction, Customer, FraudResult, Subscription,
    SubscriptionForecast, Transaction,
};
use crate::services::validation::ValidationError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportRequest {
    pub customers: Option<Vec<CreateCustomerRequest>>,
    pub transactions: Option<Vec<CreateTransactionRequest>>,
    pub subscriptions: Option<Vec<CreateSubscriptionRequest>>,
    pub fraud_results: Option<Vec<CreateFraudResultRequest>>,
    pub chargeback_predictions: Option<Vec<CreateChargebackPredictionRequest>>,
    pub subscription_forecasts: Option<Vec<CreateForecastRequest>>,
}

impl ImportRequest {
    fn is_empty(&self) -> bool {
        fn none_or_empty<T>(records: &Option<Vec<T>>) -> bool {
            records.as_ref().map_or(true, Vec::is_empty)
        }

        none_or_empty(&self.customers)
            && none_or_empty(&self.transactions)
            && none_or_empty(&self.subscriptions)
            && none_or_empty(&self.fraud_results)
            && none_or_empty(&self.chargeback_predictions)
            && none_or_empty(&self.subscription_forecasts)
    }
}

/// Per-collection outcome; collections absent from the request are omitted.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customers: Option<BulkInsertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<BulkInsertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<BulkInsertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_results: Option<BulkInsertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chargeback_predictions: Option<BulkInsertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_forecasts: Option<BulkInsertReport>,
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub customers: u64,
    pub transactions: u64,
    pub subscriptions: u64,
    pub fraud_results: u64,
    pub chargeback_predictions: u64,
    pub subscription_forecasts: u64,
}

/// Records that passed validation, plus where each one sat in the request.
struct PreparedBatch<D> {
    valid: Vec<D>,
    positions: Vec<usize>,
    report: BulkInsertReport,
}

impl<D> PreparedBatch<D> {
    /// Validates every record; rejected ones become failures at their request index.
    fn prepare<R>(
        records: Vec<R>,
        into_data: impl Fn(R) -> std::result::Result<D, ValidationError>,
    ) -> Self {
        let mut batch = PreparedBatch {
            valid: Vec::with_capacity(records.len()),
            positions: Vec::with_capacity(records.len()),
            report: BulkInsertReport::default(),
        };

        for (index, record) in records.into_iter().enumerate() {
            match into_data(record) {
                Ok(data) => {
                    batch.valid.push(data);
                    batch.positions.push(index);
                }
                Err(e) => batch.report.record_failure(index, e.0),
            }
        }

        batch
    }

    /// Folds the insert report back onto request indices.
    fn finish(self, inserted: BulkInsertReport) -> BulkInsertReport {
        let mut report = self.report;
        report.inserted = inserted.inserted;

        for failure in inserted.failed {
            let index = self
                .positions
                .get(failure.index)
                .copied()
                .unwrap_or(failure.index);
            report.record_failure(index, failure.error);
        }

        report.failed.sort_by_key(|f| f.index);
        report
    }
}

/// Bulk load records into any of the collections.
///
/// Rows are validated like their single-record endpoints and inserted one by
/// one. A bad row is reported and skipped, never rolled back with the rest.
async fn import_data(
    State(state): State<AppState>,
    body: std::result::Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ImportReport>>> {
    let Json(body) = body?;

    if body.is_empty() {
        return Err(AppError::Validation(
            "Import payload contains no records".to_string(),
        ));
    }

    let pool = &state.pool;
    let mut report = ImportReport::default();

    if let Some(records) = body.customers {
        let mut batch = PreparedBatch::prepare(records, CreateCustomerRequest::into_data);
        let inserted = Customer::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.customers = Some(batch.finish(inserted));
    }

    if let Some(records) = body.transactions {
        let mut batch = PreparedBatch::prepare(records, CreateTransactionRequest::into_data);
        let inserted = Transaction::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.transactions = Some(batch.finish(inserted));
    }

    if let Some(records) = body.subscriptions {
        let mut batch = PreparedBatch::prepare(records, CreateSubscriptionRequest::into_data);
        let inserted = Subscription::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.subscriptions = Some(batch.finish(inserted));
    }

    if let Some(records) = body.fraud_results {
        let mut batch = PreparedBatch::prepare(records, CreateFraudResultRequest::into_data);
        let inserted = FraudResult::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.fraud_results = Some(batch.finish(inserted));
    }

    if let Some(records) = body.chargeback_predictions {
        let mut batch = PreparedBatch::prepare(records, CreateChargebackPredictionRequest::into_data);
        let inserted = ChargebackPrediction::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.chargeback_predictions = Some(batch.finish(inserted));
    }

    if let Some(records) = body.subscription_forecasts {
        let mut batch = PreparedBatch::prepare(records, CreateForecastRequest::into_data);
        let inserted = SubscriptionForecast::insert_many(pool, std::mem::take(&mut batch.valid)).await;
        report.subscription_forecasts = Some(batch.finish(inserted));
    }

    tracing::info!(?report, "Bulk import finished");

    Ok(Json(
        ApiResponse::data(report).with_message("Import finished"),
    ))
}

/// Delete every row in every collection
async fn clear_data(State(state): State<AppState>) -> Result<Json<ApiResponse<ClearReport>>> {
    let pool = &state.pool;

    let (
        customers,
        transactions,
        subscriptions,
        fraud_results,
        chargeback_predictions,
        subscription_forecasts,
    ) = tokio::try_join!(
        Customer::clear(pool),
        Transaction::clear(pool),
        Subscription::clear(pool),
        FraudResult::clear(pool),
        ChargebackPrediction::clear(pool),
        SubscriptionForecast::clear(pool),
    )?;

    let report = ClearReport {
        customers,
        transactions,
        subscriptions,
        fraud_results,
        chargeback_predictions,
        subscription_forecasts,
    };

    tracing::warn!(?report, "Cleared all data");

    Ok(Json(
        ApiResponse::data(report).with_message("All data cleared"),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/import", post(import_data))
        .route("/admin/data", delete(clear_data))
}
