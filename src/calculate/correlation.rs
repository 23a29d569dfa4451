//! Pearson correlation between numeric attributes and win count.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{info, warn};

use super::{DeriveError, Derived};
use crate::models::{AttributeCorrelation, Entity, EntityStats, EntityTable, NumericAttribute};

/// Correlate win count with each numeric attribute.
///
/// Statistics rows are joined to entities by name. Rows with no matching
/// entity are left out of the computation. Undefined correlations (fewer than
/// two rows, or a constant column) are kept with no value and sort last.
pub fn correlate_with_wins(
    stats: Option<&[EntityStats]>,
    entities: Option<&EntityTable>,
) -> Derived<Vec<AttributeCorrelation>> {
    let Some(stats) = stats else {
        warn!("Cannot correlate attributes: statistics unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entity_stats"));
    };
    let Some(entities) = entities else {
        warn!("Cannot correlate attributes: entity table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entities"));
    };

    let mut by_name: HashMap<&str, &Entity> = HashMap::with_capacity(entities.len());
    for entity in &entities.entities {
        by_name.entry(entity.name.as_str()).or_insert(entity);
    }
    let joined: Vec<(f64, &Entity)> = stats
        .iter()
        .filter_map(|s| by_name.get(s.name.as_str()).map(|e| (s.wins as f64, *e)))
        .collect();

    if joined.is_empty() {
        info!("No statistics row matches an entity, correlation is empty");
        return Derived::Empty;
    }

    let wins: Vec<f64> = joined.iter().map(|(w, _)| *w).collect();
    let mut correlations: Vec<AttributeCorrelation> = NumericAttribute::ALL
        .iter()
        .map(|&attribute| {
            let values: Vec<f64> = joined.iter().map(|(_, e)| e.attribute(attribute)).collect();
            AttributeCorrelation {
                attribute: attribute.to_string(),
                correlation: pearson(&values, &wins),
            }
        })
        .collect();
    correlations.sort_by(|a, b| match (a.correlation, b.correlation) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    info!("Correlated {} attributes over {} entities", correlations.len(), joined.len());
    Derived::Ready(correlations)
}

/// Pearson's r, `None` when undefined.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::entity;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pearson() {
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0));
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0));
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_attack_tracks_wins() {
        let entities = EntityTable::new(vec![
            entity(1, "a", 10, None),
            entity(2, "b", 20, None),
            entity(3, "c", 30, None),
        ]);
        let stats = vec![
            EntityStats::new("c", 10, 9),
            EntityStats::new("b", 10, 5),
            EntityStats::new("a", 10, 1),
            // no entity, dropped from the computation
            EntityStats::new("ghost", 10, 10),
        ];

        let Derived::Ready(rows) = correlate_with_wins(Some(&stats), Some(&entities)) else {
            panic!("expected correlations");
        };

        assert_eq!(rows.len(), NumericAttribute::ALL.len());
        assert_eq!(rows[0].attribute, "attack");
        assert!(close(rows[0].correlation.unwrap(), 1.0));
        // every other fixture attribute is constant
        assert!(rows[1..].iter().all(|r| r.correlation.is_none()));
    }

    #[test]
    fn test_undefined_values_sort_last() {
        let mut entities = EntityTable::new(vec![
            entity(1, "a", 10, None),
            entity(2, "b", 20, None),
            entity(3, "c", 30, None),
        ]);
        entities.entities[0].speed = 90;
        entities.entities[2].speed = 10;
        let stats = vec![
            EntityStats::new("a", 4, 1),
            EntityStats::new("b", 4, 2),
            EntityStats::new("c", 4, 3),
        ];

        let Derived::Ready(rows) = correlate_with_wins(Some(&stats), Some(&entities)) else {
            panic!("expected correlations");
        };

        let defined: Vec<&str> = rows
            .iter()
            .filter(|r| r.correlation.is_some())
            .map(|r| r.attribute.as_str())
            .collect();
        assert_eq!(defined, vec!["attack", "speed"]);
        assert!(rows[0].correlation.unwrap() > rows[1].correlation.unwrap());
        assert!(rows[2..].iter().all(|r| r.correlation.is_none()));
    }

    #[test]
    fn test_absent_or_unmatched_inputs() {
        let entities = EntityTable::new(vec![entity(1, "a", 10, None)]);
        let stats = vec![EntityStats::new("z", 1, 1)];
        assert!(correlate_with_wins(None, Some(&entities)).is_failed());
        assert!(correlate_with_wins(Some(&stats), None).is_failed());
        assert_eq!(correlate_with_wins(Some(&stats), Some(&entities)), Derived::Empty);
    }
}
