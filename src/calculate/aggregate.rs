//! Per-entity participation and win counts.

use std::collections::HashMap;

use tracing::{info, warn};

use super::{DeriveError, Derived};
use crate::models::{EnrichedOutcome, EntityStats};

/// Count participations and wins per entity name.
///
/// Every appearance in either participant column is one participation;
/// every appearance as the winner is one win. Entities that never won still
/// get a row with zero wins. Absent names are skipped.
///
/// Rows come out by descending participations, ties in order of first
/// appearance. Rankings rely on this order to break ties.
pub fn entity_stats(outcomes: Option<&[EnrichedOutcome]>) -> Derived<Vec<EntityStats>> {
    let Some(outcomes) = outcomes else {
        warn!("Cannot compute statistics: enriched outcome table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("outcomes_named"));
    };

    // name -> (first seen, participations)
    let mut participations: HashMap<&str, (usize, u32)> = HashMap::new();
    let mut seen = 0usize;
    for outcome in outcomes {
        for name in [outcome.first_name.as_deref(), outcome.second_name.as_deref()]
            .into_iter()
            .flatten()
        {
            let entry = participations.entry(name).or_insert_with(|| {
                seen += 1;
                (seen, 0)
            });
            entry.1 += 1;
        }
    }

    let mut wins: HashMap<&str, u32> = HashMap::new();
    for name in outcomes.iter().filter_map(|o| o.winner_name.as_deref()) {
        *wins.entry(name).or_default() += 1;
    }

    let mut ordered: Vec<(&str, usize, u32)> = participations
        .into_iter()
        .map(|(name, (first_seen, count))| (name, first_seen, count))
        .collect();
    ordered.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));

    let stats: Vec<EntityStats> = ordered
        .into_iter()
        .map(|(name, _, count)| {
            EntityStats::new(name, count, wins.get(name).copied().unwrap_or(0))
        })
        .collect();

    info!("Computed statistics for {} entities", stats.len());
    Derived::from_rows(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scenario() -> Vec<EnrichedOutcome> {
        vec![
            EnrichedOutcome::new("A", "B", "A"),
            EnrichedOutcome::new("A", "B", "B"),
            EnrichedOutcome::new("A", "C", "A"),
        ]
    }

    #[test]
    fn test_scenario_counts() {
        let Derived::Ready(stats) = entity_stats(Some(&scenario())) else {
            panic!("expected stats");
        };

        assert_eq!(
            stats,
            vec![
                EntityStats {
                    name: "A".to_string(),
                    participations: 3,
                    wins: 2,
                    losses: 1,
                    win_rate: 66.67,
                },
                EntityStats {
                    name: "B".to_string(),
                    participations: 2,
                    wins: 1,
                    losses: 1,
                    win_rate: 50.0,
                },
                EntityStats {
                    name: "C".to_string(),
                    participations: 1,
                    wins: 0,
                    losses: 1,
                    win_rate: 0.0,
                },
            ]
        );
    }

    #[test]
    fn test_invariants_hold_for_every_row() {
        let mut outcomes = scenario();
        outcomes.push(EnrichedOutcome::new("D", "C", "D"));
        outcomes.push(EnrichedOutcome::new("D", "D", "D"));
        outcomes.push(EnrichedOutcome {
            first_name: Some("E".to_string()),
            second_name: None,
            winner_name: None,
        });

        let Derived::Ready(stats) = entity_stats(Some(&outcomes)) else {
            panic!("expected stats");
        };

        for row in &stats {
            assert_eq!(row.wins + row.losses, row.participations);
            assert!((0.0..=100.0).contains(&row.win_rate));
        }
        assert!(stats.iter().any(|s| s.name == "E" && s.wins == 0));
    }

    #[test]
    fn test_ties_keep_first_appearance_order() {
        let outcomes = vec![
            EnrichedOutcome::new("Z", "Y", "Z"),
            EnrichedOutcome::new("X", "W", "X"),
        ];
        let Derived::Ready(stats) = entity_stats(Some(&outcomes)) else {
            panic!("expected stats");
        };
        let names: Vec<&str> = stats.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Z", "Y", "X", "W"]);
    }

    #[test]
    fn test_winner_outside_pair_is_not_counted() {
        let outcomes = vec![EnrichedOutcome::new("A", "B", "Q")];
        let Derived::Ready(stats) = entity_stats(Some(&outcomes)) else {
            panic!("expected stats");
        };
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.wins == 0));
    }

    #[test]
    fn test_absent_input_fails() {
        assert!(entity_stats(None).is_failed());
        assert_eq!(entity_stats(Some(&[])), Derived::Empty);
    }
}
