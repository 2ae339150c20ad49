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
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::api::{response::ApiResponse, transactions::metadata_object, AppState};
use crate::error::{is_unique_violation, AppError, Result};
use crate::models::customer::{Address, CreateCustomerData, Customer, CustomerFilter};
use crate::services::aggregation::CustomerStats;
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub email: Option<String>,
    pub search: Option<String>,
    pub stats: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCustomerRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub delinquent: Option<bool>,
    pub address: Option<Address>,
    pub gateway_ids: Option<BTreeMap<String, String>>,
    pub metadata: Option<JsonValue>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateCustomerRequest {
    pub fn into_data(self) -> std::result::Result<CreateCustomerData, ValidationError> {
        let email = validation::non_blank(self.email);
        let name = validation::non_blank(self.name);

        validation::require_fields(&[("email", email.is_some()), ("name", name.is_some())])?;

        let (Some(email), Some(name)) = (email, name) else {
            return Err(ValidationError("Missing required fields".to_string()));
        };

        let balance = self.balance.unwrap_or(0.0);
        if !balance.is_finite() {
            return Err(ValidationError("balance must be a finite number".to_string()));
        }

        Ok(CreateCustomerData {
            email: validation::normalize_email(&email)?,
            name,
            phone: validation::non_blank(self.phone),
            balance,
            currency: validation::normalize_currency(self.currency.as_deref().unwrap_or("USD"))?,
            delinquent: self.delinquent.unwrap_or(false),
            address: self.address,
            gateway_ids: self.gateway_ids.unwrap_or_default(),
            metadata: metadata_object(self.metadata)?,
            created_at: validation::stored_precision(self.created_at),
        })
    }
}

async fn list_customers(
    State(state): State<AppState>,
    query: std::result::Result<Query<CustomerQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Customer>, CustomerStats>>> {
    let Query(query) = query?;
    let page = validation::pagination(query.limit, query.skip)?;

    let filter = CustomerFilter {
        email: validation::non_blank(query.email).map(|e| e.to_lowercase()),
        search: validation::non_blank(query.search),
    };

    let (customers, total_count) = tokio::try_join!(
        Customer::list(&state.pool, &filter, page.limit, page.skip),
        Customer::count_matching(&state.pool, &filter),
    )?;

    let stats = if validation::flag(query.stats.as_deref()) {
        Some(Customer::stats(&state.pool).await?.rounded())
    } else {
        None
    };

    Ok(Json(
        ApiResponse::data(customers)
            .with_page(total_count, page)
            .with_stats(stats),
    ))
}

async fn create_customer(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>)> {
    let Json(body) = body?;
    let data = body.into_data()?;

    if Customer::find_by_email(&state.pool, &data.email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Customer with email {} already exists",
            data.email
        )));
    }

    let email = data.email.clone();
    // The lookup above can race with a concurrent insert; the unique index decides.
    let customer = Customer::create(&state.pool, data).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Customer with email {} already exists", email))
        } else {
            AppError::Database(e)
        }
    })?;

    tracing::info!(customer_id = %customer.id, email = %customer.email, "Created customer");

    Ok((StatusCode::CREATED, Json(ApiResponse::data(customer))))
}

async fn get_customer(
    State(state): State<AppState>,
    id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<Customer>>> {
    let Path(id) = id?;

    let customer = Customer::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;

    Ok(Json(ApiResponse::data(customer)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/:id", get(get_customer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_name_is_reported() {
        let request: CreateCustomerRequest =
            serde_json::from_value(json!({ "email": "jane@example.com" })).unwrap();
        let err = request.into_data().unwrap_err();
        assert_eq!(err.0, "Missing required fields: name");
    }

    #[test]
    fn test_customer_defaults() {
        let request: CreateCustomerRequest = serde_json::from_value(json!({
            "email": "Jane@Example.com",
            "name": "Jane Doe",
            "balance": -12.5,
            "address": { "city": "Lisbon", "country": "PT" },
            "gateway_ids": { "stripe": "cus_123" }
        }))
        .unwrap();

        let data = request.into_data().unwrap();
        assert_eq!(data.email, "jane@example.com");
        assert_eq!(data.currency, "USD");
        assert_eq!(data.balance, -12.5);
        assert!(!data.delinquent);
        assert_eq!(data.address.unwrap().city.as_deref(), Some("Lisbon"));
        assert_eq!(data.gateway_ids.get("stripe").map(String::as_str), Some("cus_123"));
    }

    #[test]
    fn test_unknown_address_field_rejected() {
        let result: std::result::Result<CreateCustomerRequest, _> = serde_json::from_value(json!({
            "email": "jane@example.com",
            "name": "Jane",
            "address": { "street": "Main" }
        }));
        assert!(result.is_err());
    }
}
