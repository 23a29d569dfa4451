//! Dashboard API.
//!
//! Read-only axum endpoints over one [`AnalyticsBundle`] snapshot. A derived
//! table that is missing from the bundle is reported as
//! `{"available": false, "rows": []}`, never as an error.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::pipeline::{Slot, TableState};
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// One derived table as served to the dashboard.
#[derive(Debug, Serialize)]
pub struct TableResponse<R> {
    pub available: bool,
    pub state: TableState,
    pub rows: Vec<R>,
}

impl<R: Clone> TableResponse<R> {
    pub fn of(slot: &Slot<R>) -> Self {
        Self::limited(slot, None)
    }

    /// At most `limit` leading rows of the slot.
    pub fn limited(slot: &Slot<R>, limit: Option<usize>) -> Self {
        let rows = slot.rows().unwrap_or_default();
        let take = limit.unwrap_or(rows.len()).min(rows.len());
        Self {
            available: slot.is_available(),
            state: slot.state,
            rows: rows[..take].to_vec(),
        }
    }
}

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        let default = Self::default();
        Self {
            page: page.unwrap_or(default.page).max(1),
            page_size: page_size.unwrap_or(default.page_size).clamp(1, 200),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }

    /// The current page of `items`; empty past the end.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.page_size as usize).min(items.len());
        &items[start..end]
    }
}

/// Pagination metadata in responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u32) -> Self {
        let total_pages = total_items.div_ceil(pagination.page_size);
        Self {
            page: pagination.page,
            page_size: pagination.page_size,
            total_items,
            total_pages,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return cors.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => cors.allow_origin(value),
        Err(e) => {
            warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
            cors
        }
    }
}

/// Build the dashboard router over a bundle snapshot.
pub fn build_router(state: AppState) -> Router {
    use routes::{entities, tables};

    let cors = cors_layer(&state.cors_origin);

    Router::new()
        .route("/api/health", get(tables::health))
        .route("/api/bundle", get(tables::bundle))
        .route("/api/rankings/:kind", get(tables::rankings))
        .route("/api/attributes/comparison", get(tables::attribute_comparison))
        .route("/api/attributes/top-winners", get(tables::top_winner_attributes))
        .route("/api/correlations", get(tables::correlations))
        .route("/api/distribution", get(tables::distribution))
        .route("/api/categories", get(tables::categories))
        .route("/api/categories/list", get(entities::category_list))
        .route("/api/entities", get(entities::list_entities))
        .route("/api/entities/:name", get(entities::entity_detail))
        .route("/api/entities/:name/history", get(entities::entity_history))
        .route("/api/compare", get(entities::compare))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::{get_json, sample_bundle, state_for};
    use super::*;
    use crate::models::EntityStats;
    use crate::pipeline::AnalyticsBundle;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(Some(0), Some(500));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 200);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_slice() {
        let items: Vec<u32> = (1..=25).collect();
        let p = Pagination::new(Some(3), Some(10));
        assert_eq!(p.slice(&items), &[21, 22, 23, 24, 25]);

        let past_end = Pagination::new(Some(9), Some(10));
        assert!(past_end.slice(&items).is_empty());
    }

    #[test]
    fn test_pagination_meta() {
        let p = Pagination::new(Some(2), Some(10));
        let meta = PaginationMeta::new(&p, 25);

        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_table_response_of_missing_slot() {
        let slot: Slot<EntityStats> = Slot::default();
        let resp = TableResponse::of(&slot);
        assert!(!resp.available);
        assert!(resp.rows.is_empty());
        assert_eq!(resp.state, TableState::NotLoaded);
    }

    #[test]
    fn test_table_response_limit() {
        let bundle = sample_bundle();
        let resp = TableResponse::limited(&bundle.entity_stats, Some(2));
        assert!(resp.available);
        assert_eq!(resp.rows.len(), 2);

        let all = TableResponse::limited(&bundle.entity_stats, Some(99));
        assert_eq!(all.rows.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(state_for(AnalyticsBundle::default()));
        let (status, _) = get_json(app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let app = build_router(state_for(sample_bundle()));
        let (status, json) = get_json(app, "/api/rankings/speed").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("speed"));
    }
}
