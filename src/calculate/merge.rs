//! Name resolution for raw outcomes.

use std::collections::HashMap;

use tracing::{info, warn};

use super::{DeriveError, Derived};
use crate::models::{EnrichedOutcome, EntityTable, OutcomeEvent};

/// Attach display names to both participants and the winner of every outcome.
///
/// Each id column is resolved independently against the entity table; an id
/// with no matching entity resolves to an absent name and the row is kept.
/// When two entities share an id the first one wins. Fails without partial
/// output if either input is unavailable.
pub fn merge_outcomes(
    outcomes: Option<&[OutcomeEvent]>,
    entities: Option<&EntityTable>,
) -> Derived<Vec<EnrichedOutcome>> {
    let Some(outcomes) = outcomes else {
        warn!("Cannot merge outcomes: raw outcome table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("outcomes"));
    };
    let Some(entities) = entities else {
        warn!("Cannot merge outcomes: entity table unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entities"));
    };

    let mut names: HashMap<i64, &str> = HashMap::with_capacity(entities.len());
    for entity in &entities.entities {
        names.entry(entity.id).or_insert(entity.name.as_str());
    }
    let resolve = |id: i64| names.get(&id).map(|name| name.to_string());

    let merged: Vec<EnrichedOutcome> = outcomes
        .iter()
        .map(|o| EnrichedOutcome {
            first_name: resolve(o.first_id),
            second_name: resolve(o.second_id),
            winner_name: resolve(o.winner_id),
        })
        .collect();

    let unresolved = merged
        .iter()
        .filter(|o| o.first_name.is_none() || o.second_name.is_none() || o.winner_name.is_none())
        .count();
    if unresolved > 0 {
        warn!("{} outcomes reference unknown entity ids", unresolved);
    }
    info!("Merged {} outcomes with entity names", merged.len());

    Derived::from_rows(merged)
}
