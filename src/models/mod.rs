// Models module - typed access to each collection

pub mod chargeback_prediction;
pub mod customer;
pub mod fraud_result;
pub mod subscription;
pub mod subscription_forecast;
pub mod transaction;

pub use chargeback_prediction::ChargebackPrediction;
pub use customer::Customer;
pub use fraud_result::FraudResult;
pub use subscription::Subscription;
pub use subscription_forecast::SubscriptionForecast;
pub use transaction::Transaction;

use serde::Serialize;
use std::future::Future;

/// Outcome of a bulk insert.
///
/// Rows are written one at a time without a surrounding database transaction,
/// so a failure part way through leaves the earlier rows in place. Every
/// rejected row is listed here instead of aborting the batch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BulkInsertReport {
    pub inserted: usize,
    pub failed: Vec<BulkInsertFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkInsertFailure {
    pub index: usize,
    pub error: String,
}

impl BulkInsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_failure(&mut self, index: usize, error: impl Into<String>) {
        self.failed.push(BulkInsertFailure {
            index,
            error: error.into(),
        });
    }
}

/// Inserts each record in order with `insert`, collecting failures by position.
pub async fn insert_each<T, F, Fut>(records: Vec<T>, mut insert: F) -> BulkInsertReport
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), sqlx::Error>>,
{
    let mut report = BulkInsertReport::default();

    for (index, record) in records.into_iter().enumerate() {
        match insert(record).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                tracing::warn!(index, error = %e, "Bulk insert row failed");
                report.record_failure(index, e.to_string());
            }
        }
    }

    report
}
