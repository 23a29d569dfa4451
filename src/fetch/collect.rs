//! Paginated collection with pacing.
//!
//! Requests run one at a time. There are no retries: a failed listing page
//! ends that loop and whatever was gathered so far is kept.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{EntityRef, RecordSource};
use crate::config::ApiConfig;
use crate::models::{Entity, OutcomeEvent};

/// Everything one collection run gathered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub entity_refs: Vec<EntityRef>,
    pub entities: Vec<Entity>,
    pub outcomes: Vec<OutcomeEvent>,
}

/// Drives a [`RecordSource`] page by page.
#[derive(Debug, Clone)]
pub struct Collector {
    pub max_entity_pages: u32,
    pub max_outcome_pages: u32,
    pub page_delay: Duration,
    pub detail_delay: Duration,
    pub outcome_delay: Duration,
}

impl From<&ApiConfig> for Collector {
    fn from(config: &ApiConfig) -> Self {
        Self {
            max_entity_pages: config.max_entity_pages,
            max_outcome_pages: config.max_outcome_pages,
            page_delay: Duration::from_millis(config.request_delay_ms),
            detail_delay: Duration::from_millis(config.detail_delay_ms),
            outcome_delay: Duration::from_millis(config.outcome_delay_ms),
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

impl Collector {
    /// Entity ids and names from every listing page.
    pub async fn entity_refs(&self, source: &dyn RecordSource) -> Vec<EntityRef> {
        let mut refs = Vec::new();
        for page in 1..=self.max_entity_pages {
            match source.entity_page(page).await {
                Ok(batch) if batch.is_empty() => {
                    debug!("Entity page {} is empty, listing complete", page);
                    break;
                }
                Ok(batch) => {
                    debug!("Entity page {}: {} records", page, batch.len());
                    refs.extend(batch);
                }
                Err(e) => {
                    warn!("Entity page {} failed, stopping: {}", page, e);
                    break;
                }
            }
            pause(self.page_delay).await;
        }
        info!("Collected {} entity ids", refs.len());
        refs
    }

    /// Full attributes for each listed entity. Failed lookups are skipped.
    pub async fn entity_details(
        &self,
        source: &dyn RecordSource,
        refs: &[EntityRef],
    ) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(refs.len());
        for entity_ref in refs {
            match source.entity_detail(entity_ref.id).await {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!("Attributes of entity {} unavailable: {}", entity_ref.id, e),
            }
            pause(self.detail_delay).await;
        }
        info!(
            "Collected attributes for {} of {} entities",
            entities.len(),
            refs.len()
        );
        entities
    }

    /// Outcome events from every page.
    pub async fn outcomes(&self, source: &dyn RecordSource) -> Vec<OutcomeEvent> {
        let mut outcomes = Vec::new();
        for page in 1..=self.max_outcome_pages {
            match source.outcome_page(page).await {
                Ok(batch) if batch.is_empty() => {
                    debug!("Outcome page {} is empty, listing complete", page);
                    break;
                }
                Ok(batch) => {
                    debug!("Outcome page {}: {} records", page, batch.len());
                    outcomes.extend(batch);
                }
                Err(e) => {
                    warn!("Outcome page {} failed, stopping: {}", page, e);
                    break;
                }
            }
            pause(self.outcome_delay).await;
        }
        info!("Collected {} outcomes", outcomes.len());
        outcomes
    }
}

/// Listing, then details, then outcomes.
pub async fn collect_all(source: &dyn RecordSource, collector: &Collector) -> Collected {
    let entity_refs = collector.entity_refs(source).await;
    let entities = collector.entity_details(source, &entity_refs).await;
    let outcomes = collector.outcomes(source).await;
    Collected {
        entity_refs,
        entities,
        outcomes,
    }
}
