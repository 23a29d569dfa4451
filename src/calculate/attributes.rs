//! Attribute profile of the top winners against the whole population.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{info, warn};

use super::{mean, round2, DeriveError, Derived};
use crate::models::{AttributeComparison, Entity, EntityStats, EntityTable, NumericAttribute};

/// Comparison rows plus the entity rows they were computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeProfile {
    /// One row per numeric attribute, descending by difference
    pub comparison: Vec<AttributeComparison>,
    /// Entity rows whose name is in the top set, in entity table order
    pub top_entities: Vec<Entity>,
}

/// Mean of every numeric attribute over the top winners and over everyone.
///
/// An empty top set, or one whose names match no entity, gives `Empty`.
pub fn compare_attributes(
    top_winners: Option<&[EntityStats]>,
    entities: Option<&EntityTable>,
) -> Derived<AttributeProfile> {
    let Some(top_winners) = top_winners else {
        warn!("Cannot compare attributes: top winners unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("top_wins"));
    };
    let Some(entities) = entities else {
        warn!("Cannot compare attributes: entity table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entities"));
    };

    let top_names: HashSet<&str> = top_winners.iter().map(|s| s.name.as_str()).collect();
    let top_entities: Vec<Entity> = entities
        .entities
        .iter()
        .filter(|e| top_names.contains(e.name.as_str()))
        .cloned()
        .collect();

    if top_entities.is_empty() {
        info!("No entity matches the top winners, attribute comparison is empty");
        return Derived::Empty;
    }

    let mut comparison: Vec<AttributeComparison> = NumericAttribute::ALL
        .iter()
        .filter_map(|&attribute| {
            let top = mean(top_entities.iter().map(|e| e.attribute(attribute)))?;
            let overall = mean(entities.entities.iter().map(|e| e.attribute(attribute)))?;
            let top_mean = round2(top);
            let overall_mean = round2(overall);
            Some(AttributeComparison {
                attribute: attribute.to_string(),
                top_mean,
                overall_mean,
                difference: round2(top_mean - overall_mean),
            })
        })
        .collect();
    comparison.sort_by(|a, b| {
        b.difference
            .partial_cmp(&a.difference)
            .unwrap_or(Ordering::Equal)
    });

    info!(
        "Compared {} attributes over {} top winners",
        comparison.len(),
        top_entities.len()
    );
    Derived::Ready(AttributeProfile {
        comparison,
        top_entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::entity;
    use pretty_assertions::assert_eq;

    fn population() -> EntityTable {
        EntityTable::new(vec![
            entity(1, "low", 10, None),
            entity(2, "mid", 20, None),
            entity(3, "high", 30, None),
        ])
    }

    #[test]
    fn test_single_attribute_scenario() {
        let top = vec![EntityStats::new("high", 5, 5)];

        let Derived::Ready(profile) = compare_attributes(Some(&top), Some(&population())) else {
            panic!("expected a comparison");
        };

        assert_eq!(
            profile.comparison[0],
            AttributeComparison {
                attribute: "attack".to_string(),
                top_mean: 30.0,
                overall_mean: 20.0,
                difference: 10.0,
            }
        );
        assert_eq!(profile.comparison.len(), NumericAttribute::ALL.len());
        assert!(profile.comparison[1..].iter().all(|c| c.difference == 0.0));
        assert_eq!(profile.top_entities.len(), 1);
        assert_eq!(profile.top_entities[0].name, "high");
    }

    #[test]
    fn test_sorted_descending_by_difference() {
        let top = vec![EntityStats::new("low", 5, 5)];
        let Derived::Ready(profile) = compare_attributes(Some(&top), Some(&population())) else {
            panic!("expected a comparison");
        };
        let last = profile.comparison.last().unwrap();
        assert_eq!(last.attribute, "attack");
        assert_eq!(last.difference, -10.0);
    }

    #[test]
    fn test_means_are_rounded() {
        let table = EntityTable::new(vec![
            entity(1, "a", 10, None),
            entity(2, "b", 10, None),
            entity(3, "c", 11, None),
        ]);
        let top = vec![EntityStats::new("c", 1, 1)];
        let Derived::Ready(profile) = compare_attributes(Some(&top), Some(&table)) else {
            panic!("expected a comparison");
        };
        let attack = &profile.comparison[0];
        assert_eq!(attack.overall_mean, 10.33);
        assert_eq!(attack.difference, 0.67);
    }

    #[test]
    fn test_no_matching_names_is_empty() {
        let top = vec![EntityStats::new("ghost", 5, 5)];
        assert_eq!(
            compare_attributes(Some(&top), Some(&population())),
            Derived::Empty
        );
        assert_eq!(
            compare_attributes(Some(&[]), Some(&population())),
            Derived::Empty
        );
    }

    #[test]
    fn test_absent_inputs_fail() {
        assert!(compare_attributes(None, Some(&population())).is_failed());
        assert!(compare_attributes(Some(&[]), None).is_failed());
    }
}
