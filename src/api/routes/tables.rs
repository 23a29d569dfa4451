use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, TableResponse};
use crate::models::{
    AttributeComparison, AttributeCorrelation, CategoryRanking, DistributionBucket, Entity,
    EntityStats,
};
use crate::pipeline::{AnalyticsBundle, TableState};

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TableStatus {
    pub name: &'static str,
    pub state: TableState,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub complete: bool,
    pub missing: Vec<&'static str>,
    pub tables: Vec<TableStatus>,
    pub loaded_at: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let bundle = &state.bundle;
    let tables = bundle
        .states()
        .into_iter()
        .zip(bundle.fingerprints())
        .map(|((name, state), (_, fingerprint))| TableStatus {
            name,
            state,
            fingerprint,
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        complete: bundle.is_complete(),
        missing: bundle.missing(),
        tables,
        loaded_at: state.loaded_at,
    })
}

/// The whole bundle, every table with its state.
pub async fn bundle(State(state): State<AppState>) -> Json<AnalyticsBundle> {
    Json(state.bundle.as_ref().clone())
}

/// `wins`, `losses` or `win-rate`.
pub async fn rankings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<TableResponse<EntityStats>>, ApiError> {
    let bundle = &state.bundle;
    let slot = match kind.as_str() {
        "wins" => &bundle.top_wins,
        "losses" => &bundle.top_losses,
        "win-rate" => &bundle.top_win_rate,
        other => {
            return Err(ApiError::NotFound(format!(
                "ranking '{}' (expected wins, losses or win-rate)",
                other
            )))
        }
    };
    Ok(Json(TableResponse::limited(slot, params.limit)))
}

pub async fn attribute_comparison(
    State(state): State<AppState>,
) -> Json<TableResponse<AttributeComparison>> {
    Json(TableResponse::of(&state.bundle.attribute_comparison))
}

pub async fn top_winner_attributes(
    State(state): State<AppState>,
) -> Json<TableResponse<Entity>> {
    Json(TableResponse::of(&state.bundle.top_winner_attributes))
}

pub async fn correlations(
    State(state): State<AppState>,
) -> Json<TableResponse<AttributeCorrelation>> {
    Json(TableResponse::of(&state.bundle.attribute_win_correlation))
}

pub async fn distribution(
    State(state): State<AppState>,
) -> Json<TableResponse<DistributionBucket>> {
    Json(TableResponse::of(&state.bundle.win_rate_distribution))
}

pub async fn categories(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<TableResponse<CategoryRanking>> {
    Json(TableResponse::limited(
        &state.bundle.category_ranking,
        params.limit,
    ))
}
