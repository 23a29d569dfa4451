//! Category standings.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use super::{mean, win_fraction, DeriveError, Derived};
use crate::models::{CategoryRanking, Entity, EntityStats, EntityTable, CATEGORY_COLUMN};

#[derive(Default)]
struct CategoryTotals {
    fractions: Vec<f64>,
    wins: u32,
    participations: u32,
}

/// Rank categories by the mean win fraction of their members.
///
/// Statistics are joined to entities by name; members without a category
/// are left out. Equal means keep alphabetical category order. Ranks run
/// `1..=N` with no gaps or repeats.
pub fn rank_categories(
    stats: Option<&[EntityStats]>,
    entities: Option<&EntityTable>,
) -> Derived<Vec<CategoryRanking>> {
    let Some(stats) = stats else {
        warn!("Cannot rank categories: statistics unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entity_stats"));
    };
    let Some(entities) = entities else {
        warn!("Cannot rank categories: entity table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entities"));
    };
    if !entities.has_categories {
        warn!("Entity table has no '{}' column, skipping category ranking", CATEGORY_COLUMN);
        return Derived::Failed(DeriveError::MissingColumn {
            table: "entities",
            column: CATEGORY_COLUMN,
        });
    }

    let mut by_name: HashMap<&str, &Entity> = HashMap::with_capacity(entities.len());
    for entity in &entities.entities {
        by_name.entry(entity.name.as_str()).or_insert(entity);
    }

    let mut groups: BTreeMap<&str, CategoryTotals> = BTreeMap::new();
    for row in stats {
        let Some(category) = by_name
            .get(row.name.as_str())
            .and_then(|e| e.entity_type.as_deref())
        else {
            continue;
        };
        let totals = groups.entry(category).or_default();
        totals.fractions.push(win_fraction(row.wins, row.participations));
        totals.wins += row.wins;
        totals.participations += row.participations;
    }

    let mut rankings: Vec<CategoryRanking> = groups
        .into_iter()
        .map(|(category, totals)| CategoryRanking {
            category: category.to_string(),
            mean_win_rate: mean(totals.fractions.iter().copied()).unwrap_or(0.0),
            total_wins: totals.wins,
            total_participations: totals.participations,
            rank: 0,
        })
        .collect();
    rankings.sort_by(|a, b| {
        b.mean_win_rate
            .partial_cmp(&a.mean_win_rate)
            .unwrap_or(Ordering::Equal)
    });
    for (index, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = index as u32 + 1;
    }

    info!("Ranked {} categories", rankings.len());
    Derived::from_rows(rankings)
}
