//! Top-N selections over entity statistics.
//!
//! Sorting is stable, so ties keep the statistics table's row order.

use std::cmp::Ordering;

use tracing::{debug, warn};

use super::{DeriveError, Derived};
use crate::models::EntityStats;

/// Entities with the most wins.
pub fn top_by_wins(stats: Option<&[EntityStats]>, n: usize) -> Derived<Vec<EntityStats>> {
    select_top(stats, n, "top_wins", |a, b| b.wins.cmp(&a.wins))
}

/// Entities with the most losses.
pub fn top_by_losses(stats: Option<&[EntityStats]>, n: usize) -> Derived<Vec<EntityStats>> {
    select_top(stats, n, "top_losses", |a, b| b.losses.cmp(&a.losses))
}

/// Entities with the best win rate among those with at least
/// `min_participations` contests. Entities under the threshold are removed
/// before ranking, not ranked low.
pub fn top_by_win_rate(
    stats: Option<&[EntityStats]>,
    n: usize,
    min_participations: u32,
) -> Derived<Vec<EntityStats>> {
    let Some(stats) = stats else {
        warn!("Cannot rank top_win_rate: statistics unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entity_stats"));
    };
    let eligible: Vec<EntityStats> = stats
        .iter()
        .filter(|s| s.participations >= min_participations)
        .cloned()
        .collect();
    debug!(
        "{} of {} entities have at least {} participations",
        eligible.len(),
        stats.len(),
        min_participations
    );
    select_top(Some(&eligible), n, "top_win_rate", |a, b| {
        b.win_rate.partial_cmp(&a.win_rate).unwrap_or(Ordering::Equal)
    })
}

fn select_top(
    stats: Option<&[EntityStats]>,
    n: usize,
    table: &str,
    order: impl Fn(&EntityStats, &EntityStats) -> Ordering,
) -> Derived<Vec<EntityStats>> {
    let Some(stats) = stats else {
        warn!("Cannot rank {}: statistics unavailable", table);
        return Derived::Failed(DeriveError::UpstreamUnavailable("entity_stats"));
    };
    let mut ranked = stats.to_vec();
    ranked.sort_by(|a, b| order(a, b));
    ranked.truncate(n);
    Derived::from_rows(ranked)
}
