//! Dashboard statistics.
//!
//! The façade queries return raw totals (`*Totals`); the functions here turn
//! them into the figures the dashboard shows. Nothing in this module rounds:
//! handlers call `rounded()` on the way out.

use serde::Serialize;
use sqlx::FromRow;

/// Weeks per month used when normalizing weekly prices.
pub const WEEKS_PER_MONTH: f64 = 4.33;
/// Multiplier for intervals that are not week, month or year.
pub const FALLBACK_DAYS_PER_MONTH: f64 = 30.0;

/// Rounds half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole
    }
}

fn percentage(part: i64, whole: i64) -> f64 {
    ratio(part as f64 * 100.0, whole as f64)
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct TransactionTotals {
    pub total_transactions: i64,
    pub total_amount: f64,
    pub successful_transactions: i64,
    pub failed_transactions: i64,
    pub fraud_detected: i64,
    pub chargebacks_predicted: i64,
    pub reviewed_transactions: i64,
    pub risk_score_sum: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total_transactions: i64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub successful_transactions: i64,
    pub failed_transactions: i64,
    pub success_rate: f64,
    pub fraud_detected: i64,
    pub chargebacks_predicted: i64,
    pub reviewed_transactions: i64,
    pub average_risk_score: f64,
}

impl TransactionStats {
    pub fn from_totals(totals: &TransactionTotals) -> Self {
        let count = totals.total_transactions;
        Self {
            total_transactions: count,
            total_amount: totals.total_amount,
            average_amount: ratio(totals.total_amount, count as f64),
            successful_transactions: totals.successful_transactions,
            failed_transactions: totals.failed_transactions,
            success_rate: percentage(totals.successful_transactions, count),
            fraud_detected: totals.fraud_detected,
            chargebacks_predicted: totals.chargebacks_predicted,
            reviewed_transactions: totals.reviewed_transactions,
            average_risk_score: ratio(totals.risk_score_sum as f64, count as f64),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            total_amount: round2(self.total_amount),
            average_amount: round2(self.average_amount),
            success_rate: round2(self.success_rate),
            average_risk_score: round2(self.average_risk_score),
            ..self
        }
    }
}

/// Billing cadence of a subscription price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingInterval {
    Week,
    Month,
    Year,
    /// Anything else is priced as if it were a daily amount.
    Other,
}

impl BillingInterval {
    pub fn parse(interval: &str) -> Self {
        match interval {
            "week" => BillingInterval::Week,
            "month" => BillingInterval::Month,
            "year" => BillingInterval::Year,
            _ => BillingInterval::Other,
        }
    }

    /// Converts `price_amount * quantity` for this interval into a monthly amount.
    pub fn monthly_equivalent(self, amount: f64) -> f64 {
        match self {
            BillingInterval::Month => amount,
            BillingInterval::Year => amount / 12.0,
            BillingInterval::Week => amount * WEEKS_PER_MONTH,
            BillingInterval::Other => amount * FALLBACK_DAYS_PER_MONTH,
        }
    }
}

/// Sum of `price_amount * quantity` over active subscriptions sharing an interval.
#[derive(Debug, Clone, FromRow)]
pub struct ActiveRevenue {
    pub interval: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct SubscriptionTotals {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub canceled_subscriptions: i64,
    pub trialing_subscriptions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub canceled_subscriptions: i64,
    pub trialing_subscriptions: i64,
    pub mrr: f64,
    pub arr: f64,
    pub churn_rate: f64,
}

/// Monthly recurring revenue across active subscriptions.
pub fn monthly_recurring_revenue(revenue: &[ActiveRevenue]) -> f64 {
    revenue
        .iter()
        .map(|r| BillingInterval::parse(&r.interval).monthly_equivalent(r.amount))
        .sum()
}

impl SubscriptionStats {
    pub fn from_totals(totals: &SubscriptionTotals, revenue: &[ActiveRevenue]) -> Self {
        let mrr = monthly_recurring_revenue(revenue);
        Self {
            total_subscriptions: totals.total_subscriptions,
            active_subscriptions: totals.active_subscriptions,
            canceled_subscriptions: totals.canceled_subscriptions,
            trialing_subscriptions: totals.trialing_subscriptions,
            mrr,
            arr: mrr * 12.0,
            churn_rate: percentage(totals.canceled_subscriptions, totals.total_subscriptions),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            mrr: round2(self.mrr),
            arr: round2(self.arr),
            churn_rate: round2(self.churn_rate),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct FraudTotals {
    pub total_checks: i64,
    pub fraud_detected: i64,
    pub confidence_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudStats {
    pub total_checks: i64,
    pub fraud_detected: i64,
    pub average_confidence: f64,
    pub fraud_rate: f64,
}

impl FraudStats {
    pub fn from_totals(totals: &FraudTotals) -> Self {
        Self {
            total_checks: totals.total_checks,
            fraud_detected: totals.fraud_detected,
            average_confidence: ratio(totals.confidence_sum, totals.total_checks as f64),
            fraud_rate: percentage(totals.fraud_detected, totals.total_checks),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            average_confidence: round2(self.average_confidence),
            fraud_rate: round2(self.fraud_rate),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct CustomerTotals {
    pub total_customers: i64,
    pub delinquent_customers: i64,
    pub total_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_customers: i64,
    pub delinquent_customers: i64,
    pub total_balance: f64,
    pub average_balance: f64,
}

impl CustomerStats {
    pub fn from_totals(totals: &CustomerTotals) -> Self {
        Self {
            total_customers: totals.total_customers,
            delinquent_customers: totals.delinquent_customers,
            total_balance: totals.total_balance,
            average_balance: ratio(totals.total_balance, totals.total_customers as f64),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            total_balance: round2(self.total_balance),
            average_balance: round2(self.average_balance),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct ChargebackTotals {
    pub total_predictions: i64,
    pub predicted_chargebacks: i64,
    pub confidence_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargebackStats {
    pub total_predictions: i64,
    pub predicted_chargebacks: i64,
    pub average_confidence: f64,
}

impl ChargebackStats {
    pub fn from_totals(totals: &ChargebackTotals) -> Self {
        Self {
            total_predictions: totals.total_predictions,
            predicted_chargebacks: totals.predicted_chargebacks,
            average_confidence: ratio(totals.confidence_sum, totals.total_predictions as f64),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            average_confidence: round2(self.average_confidence),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct ForecastTotals {
    pub total_forecasts: i64,
    pub total_predicted_revenue: f64,
    pub confidence_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastStats {
    pub total_forecasts: i64,
    pub total_predicted_revenue: f64,
    pub average_confidence: f64,
}

impl ForecastStats {
    pub fn from_totals(totals: &ForecastTotals) -> Self {
        Self {
            total_forecasts: totals.total_forecasts,
            total_predicted_revenue: totals.total_predicted_revenue,
            average_confidence: ratio(totals.confidence_sum, totals.total_forecasts as f64),
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            total_predicted_revenue: round2(self.total_predicted_revenue),
            average_confidence: round2(self.average_confidence),
            ..self
        }
    }
}
