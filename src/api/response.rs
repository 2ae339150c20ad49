use serde::Serialize;

use crate::services::validation::Pagination;

/// Success envelope shared by every endpoint.
///
/// Errors use the `{ success: false, error, details? }` shape built by
/// [`crate::error::AppError`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T, S = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<S>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self::optional(Some(data))
    }

    /// Success envelope whose `data` key is omitted when there is nothing to send.
    pub fn optional(data: Option<T>) -> Self {
        Self {
            success: true,
            data,
            total_count: None,
            limit: None,
            skip: None,
            stats: None,
            message: None,
        }
    }
}

impl<T, S> ApiResponse<T, S> {
    pub fn with_page(self, total_count: i64, page: Pagination) -> Self {
        Self {
            total_count: Some(total_count),
            limit: Some(page.limit),
            skip: Some(page.skip),
            ..self
        }
    }

    pub fn with_stats<S2>(self, stats: Option<S2>) -> ApiResponse<T, S2> {
        ApiResponse {
            success: self.success,
            data: self.data,
            total_count: self.total_count,
            limit: self.limit,
            skip: self.skip,
            stats,
            message: self.message,
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_only_envelope() {
        let json = serde_json::to_value(ApiResponse::data(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn test_paged_envelope_with_stats() {
        let response = ApiResponse::data(Vec::<u8>::new())
            .with_page(42, Pagination { limit: 10, skip: 20 })
            .with_stats(Some(serde_json::json!({ "mrr": 63.3 })));

        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["totalCount"], 42);
        assert_eq!(json["limit"], 10);
        assert_eq!(json["skip"], 20);
        assert_eq!(json["stats"]["mrr"], 63.3);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_optional_data_omitted() {
        let json = serde_json::to_value(ApiResponse::<u8>::optional(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));
    }

    #[test]
    fn test_stats_omitted_when_not_requested() {
        let response = ApiResponse::data(()).with_stats::<u8>(None);
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("stats").is_none());
    }
}
