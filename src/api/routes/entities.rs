use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::calculate::{mean, round2, win_rate_percent};
use crate::models::{EnrichedOutcome, Entity, EntityStats, EntityTable, NumericAttribute};
use crate::pipeline::AnalyticsBundle;

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub available: bool,
    pub categories: Vec<String>,
}

pub async fn category_list(State(state): State<AppState>) -> Json<CategoryListResponse> {
    let categories = state
        .bundle
        .entities
        .as_ref()
        .map(EntityTable::categories);
    Json(CategoryListResponse {
        available: categories.is_some(),
        categories: categories.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EntityListParams {
    pub category: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub available: bool,
    pub entities: Vec<Entity>,
    pub pagination: PaginationMeta,
}

/// Entity attributes, optionally restricted to one category.
pub async fn list_entities(
    State(state): State<AppState>,
    Query(params): Query<EntityListParams>,
) -> Json<EntityListResponse> {
    let pagination = Pagination::new(params.page, params.page_size);
    let matching: Vec<Entity> = state
        .bundle
        .entities
        .iter()
        .flat_map(|table| table.entities.iter())
        .filter(|e| match params.category.as_deref() {
            Some(category) => e.entity_type.as_deref() == Some(category),
            None => true,
        })
        .cloned()
        .collect();

    Json(EntityListResponse {
        available: state.bundle.entities.is_some(),
        entities: pagination.slice(&matching).to_vec(),
        pagination: PaginationMeta::new(&pagination, matching.len() as u32),
    })
}

/// One attribute of an entity next to the population mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeValue {
    pub attribute: NumericAttribute,
    pub value: f64,
    pub overall_mean: f64,
}

#[derive(Debug, Serialize)]
pub struct EntityProfile {
    pub name: String,
    pub entity: Option<Entity>,
    pub stats: Option<EntityStats>,
    pub attributes: Vec<AttributeValue>,
}

fn attribute_values(table: &EntityTable, entity: &Entity) -> Vec<AttributeValue> {
    NumericAttribute::ALL
        .iter()
        .map(|&attribute| AttributeValue {
            attribute,
            value: entity.attribute(attribute),
            overall_mean: mean(table.entities.iter().map(|e| e.attribute(attribute)))
                .map(round2)
                .unwrap_or_default(),
        })
        .collect()
}

fn profile(bundle: &AnalyticsBundle, name: &str) -> Result<EntityProfile, ApiError> {
    let table = bundle.entities.as_ref();
    let entity = table.and_then(|t| t.by_name(name));
    let stats = bundle
        .entity_stats
        .rows()
        .and_then(|rows| rows.iter().find(|s| s.name == name));

    if entity.is_none() && stats.is_none() {
        return Err(ApiError::NotFound(format!("entity '{}'", name)));
    }

    let attributes = match (table, entity) {
        (Some(table), Some(entity)) => attribute_values(table, entity),
        _ => Vec::new(),
    };

    Ok(EntityProfile {
        name: name.to_string(),
        entity: entity.cloned(),
        stats: stats.cloned(),
        attributes,
    })
}

pub async fn entity_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EntityProfile>, ApiError> {
    Ok(Json(profile(&state.bundle, &name)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestResult {
    Win,
    Loss,
}

#[derive(Debug, Serialize)]
pub struct Contest {
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    pub winner_name: Option<String>,
    pub opponent: Option<String>,
    pub result: ContestResult,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub name: String,
    pub available: bool,
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub contests: Vec<Contest>,
}

fn contest_for(outcome: &EnrichedOutcome, name: &str) -> Contest {
    Contest {
        first_name: outcome.first_name.clone(),
        second_name: outcome.second_name.clone(),
        winner_name: outcome.winner_name.clone(),
        opponent: outcome.opponent_of(name).map(str::to_string),
        result: if outcome.won_by(name) {
            ContestResult::Win
        } else {
            ContestResult::Loss
        },
    }
}

/// Every contest an entity took part in, with its result.
pub async fn entity_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<HistoryResponse> {
    let outcomes = state.bundle.outcomes_named.rows();
    let contests: Vec<Contest> = outcomes
        .unwrap_or_default()
        .iter()
        .filter(|o| o.involves(&name))
        .map(|o| contest_for(o, &name))
        .collect();

    let total = contests.len() as u32;
    let wins = contests
        .iter()
        .filter(|c| c.result == ContestResult::Win)
        .count() as u32;

    Json(HistoryResponse {
        name,
        available: outcomes.is_some(),
        total,
        wins,
        losses: total - wins,
        win_rate: win_rate_percent(wins, total),
        contests,
    })
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub first: Option<String>,
    pub second: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeadToHead {
    pub available: bool,
    pub contests: u32,
    pub first_wins: u32,
    pub second_wins: u32,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub first: EntityProfile,
    pub second: EntityProfile,
    pub head_to_head: HeadToHead,
}

fn head_to_head(outcomes: Option<&[EnrichedOutcome]>, first: &str, second: &str) -> HeadToHead {
    let direct: Vec<&EnrichedOutcome> = outcomes
        .unwrap_or_default()
        .iter()
        .filter(|o| o.involves(first) && o.opponent_of(first) == Some(second))
        .collect();

    HeadToHead {
        available: outcomes.is_some(),
        contests: direct.len() as u32,
        first_wins: direct.iter().filter(|o| o.won_by(first)).count() as u32,
        second_wins: direct.iter().filter(|o| o.won_by(second)).count() as u32,
    }
}

/// Two entities side by side plus their direct contests.
pub async fn compare(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<CompareResponse>, ApiError> {
    let (first, second) = match (params.first, params.second) {
        (Some(first), Some(second)) => (first, second),
        _ => {
            return Err(ApiError::BadRequest(
                "both 'first' and 'second' are required".to_string(),
            ))
        }
    };

    let bundle = &state.bundle;
    Ok(Json(CompareResponse {
        head_to_head: head_to_head(bundle.outcomes_named.rows(), &first, &second),
        first: profile(bundle, &first)?,
        second: profile(bundle, &second)?,
    }))
}
