//! Pipeline orchestrator.
//!
//! Resolves every derived table in dependency order:
//! 1. Load it from the table store
//! 2. If absent, compute it from already-resolved inputs
//! 3. Persist what was computed
//!
//! The store is the cache: a table found there is never recomputed unless
//! the pipeline runs with `force`. A missing upstream leaves its downstream
//! slots empty; the run itself always completes.

pub mod tables;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::calculate::{
    compare_attributes, correlate_with_wins, entity_stats, merge_outcomes, rank_categories,
    top_by_losses, top_by_win_rate, top_by_wins, win_rate_distribution, AnalysisParams,
    AttributeProfile, Derived, WinRateBuckets,
};
use crate::models::{
    AttributeComparison, AttributeCorrelation, CategoryRanking, DistributionBucket,
    EnrichedOutcome, Entity, EntityStats, EntityTable, OutcomeEvent,
};
use crate::storage::{Record, Table, TableStore};

/// Lifecycle of one derived table within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    /// Neither found in the store nor computed
    #[default]
    NotLoaded,
    LoadedFromStore,
    /// Computed but the write failed
    Computed,
    /// Computed and saved
    Persisted,
}

impl TableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableState::NotLoaded => "not_loaded",
            TableState::LoadedFromStore => "loaded_from_store",
            TableState::Computed => "computed",
            TableState::Persisted => "persisted",
        }
    }
}

/// One table of the bundle and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot<R> {
    pub rows: Option<Vec<R>>,
    pub state: TableState,
}

impl<R> Default for Slot<R> {
    fn default() -> Self {
        Self {
            rows: None,
            state: TableState::NotLoaded,
        }
    }
}

impl<R> Slot<R> {
    fn loaded(rows: Vec<R>) -> Self {
        Self {
            rows: Some(rows),
            state: TableState::LoadedFromStore,
        }
    }

    pub fn is_available(&self) -> bool {
        self.rows.is_some()
    }

    pub fn rows(&self) -> Option<&[R]> {
        self.rows.as_deref()
    }
}

impl<R: Record> Slot<R> {
    /// Fingerprint of the rows as they would be stored.
    pub fn fingerprint(&self) -> Option<String> {
        self.rows
            .as_ref()
            .map(|rows| Table::from_records(rows).fingerprint())
    }
}

/// Everything one run produced, plus the entity table for read-only filters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsBundle {
    pub outcomes_named: Slot<EnrichedOutcome>,
    pub entity_stats: Slot<EntityStats>,
    pub top_wins: Slot<EntityStats>,
    pub top_losses: Slot<EntityStats>,
    pub top_win_rate: Slot<EntityStats>,
    pub top_winner_attributes: Slot<Entity>,
    pub attribute_comparison: Slot<AttributeComparison>,
    pub attribute_win_correlation: Slot<AttributeCorrelation>,
    pub win_rate_distribution: Slot<DistributionBucket>,
    pub category_ranking: Slot<CategoryRanking>,

    #[serde(skip)]
    pub entities: Option<EntityTable>,
}

impl AnalyticsBundle {
    /// State of every derived table, in dependency order.
    pub fn states(&self) -> Vec<(&'static str, TableState)> {
        vec![
            (tables::OUTCOMES_NAMED, self.outcomes_named.state),
            (tables::ENTITY_STATS, self.entity_stats.state),
            (tables::TOP_WINS, self.top_wins.state),
            (tables::TOP_LOSSES, self.top_losses.state),
            (tables::TOP_WIN_RATE, self.top_win_rate.state),
            (tables::TOP_WINNER_ATTRIBUTES, self.top_winner_attributes.state),
            (tables::ATTRIBUTE_COMPARISON, self.attribute_comparison.state),
            (tables::ATTRIBUTE_WIN_CORRELATION, self.attribute_win_correlation.state),
            (tables::WIN_RATE_DISTRIBUTION, self.win_rate_distribution.state),
            (tables::CATEGORY_RANKING, self.category_ranking.state),
        ]
    }

    /// Derived tables with no rows at all.
    pub fn missing(&self) -> Vec<&'static str> {
        self.states()
            .into_iter()
            .filter(|(_, state)| *state == TableState::NotLoaded)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Fingerprint of every derived table, `None` for missing ones.
    pub fn fingerprints(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (tables::OUTCOMES_NAMED, self.outcomes_named.fingerprint()),
            (tables::ENTITY_STATS, self.entity_stats.fingerprint()),
            (tables::TOP_WINS, self.top_wins.fingerprint()),
            (tables::TOP_LOSSES, self.top_losses.fingerprint()),
            (tables::TOP_WIN_RATE, self.top_win_rate.fingerprint()),
            (tables::TOP_WINNER_ATTRIBUTES, self.top_winner_attributes.fingerprint()),
            (tables::ATTRIBUTE_COMPARISON, self.attribute_comparison.fingerprint()),
            (
                tables::ATTRIBUTE_WIN_CORRELATION,
                self.attribute_win_correlation.fingerprint(),
            ),
            (tables::WIN_RATE_DISTRIBUTION, self.win_rate_distribution.fingerprint()),
            (tables::CATEGORY_RANKING, self.category_ranking.fingerprint()),
        ]
    }
}

/// Counts for the end-of-run log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub loaded: usize,
    pub computed: usize,
    pub persisted: usize,
    pub missing: Vec<&'static str>,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    pub fn from_bundle(bundle: &AnalyticsBundle, duration: Duration) -> Self {
        let states = bundle.states();
        let count = |wanted: TableState| states.iter().filter(|(_, s)| *s == wanted).count();
        Self {
            loaded: count(TableState::LoadedFromStore),
            computed: count(TableState::Computed),
            persisted: count(TableState::Persisted),
            missing: bundle.missing(),
            duration,
        }
    }
}

/// Load-or-compute driver over a table store.
pub struct Pipeline<'a> {
    store: &'a TableStore,
    params: AnalysisParams,
    force: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a TableStore, params: AnalysisParams) -> Self {
        Self {
            store,
            params,
            force: false,
        }
    }

    /// Skip the store lookup and recompute every table.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resolve every derived table. Never fails as a whole.
    pub fn run(&self) -> AnalyticsBundle {
        let started = Instant::now();
        info!(
            "Running analytics pipeline on {} (force: {})",
            self.store.describe(),
            self.force
        );

        let entities = self.load_entities();

        let outcomes_named = self.resolve(tables::OUTCOMES_NAMED, || {
            let raw = self.store.load::<OutcomeEvent>(tables::OUTCOMES);
            merge_outcomes(raw.as_deref(), entities.as_ref())
        });

        let entity_stats = self.resolve(tables::ENTITY_STATS, || {
            entity_stats(outcomes_named.rows())
        });
        let stats = entity_stats.rows();

        let top_wins = self.resolve(tables::TOP_WINS, || top_by_wins(stats, self.params.top_n));
        let top_losses = self.resolve(tables::TOP_LOSSES, || {
            top_by_losses(stats, self.params.top_n)
        });
        let top_win_rate = self.resolve(tables::TOP_WIN_RATE, || {
            top_by_win_rate(stats, self.params.top_n, self.params.min_participations)
        });

        let (attribute_comparison, top_winner_attributes) =
            self.resolve_attribute_profile(top_wins.rows(), entities.as_ref());

        let attribute_win_correlation = self.resolve(tables::ATTRIBUTE_WIN_CORRELATION, || {
            correlate_with_wins(stats, entities.as_ref())
        });

        let win_rate_distribution = self.resolve(tables::WIN_RATE_DISTRIBUTION, || {
            match WinRateBuckets::new(self.params.win_rate_edges.clone()) {
                Ok(buckets) => win_rate_distribution(stats, &buckets),
                Err(e) => Derived::Failed(e),
            }
        });

        let category_ranking = self.resolve(tables::CATEGORY_RANKING, || {
            rank_categories(stats, entities.as_ref())
        });

        let bundle = AnalyticsBundle {
            outcomes_named,
            entity_stats,
            top_wins,
            top_losses,
            top_win_rate,
            top_winner_attributes,
            attribute_comparison,
            attribute_win_correlation,
            win_rate_distribution,
            category_ranking,
            entities,
        };

        let summary = RunSummary::from_bundle(&bundle, started.elapsed());
        if summary.missing.is_empty() {
            info!(
                "Pipeline complete in {:?}: {} loaded, {} persisted, {} computed only",
                summary.duration, summary.loaded, summary.persisted, summary.computed
            );
        } else {
            warn!(
                "Pipeline finished with missing tables: {}",
                summary.missing.join(", ")
            );
        }
        bundle
    }

    fn load_entities(&self) -> Option<EntityTable> {
        let table = self.store.load_table(tables::ENTITIES)?;
        match EntityTable::from_table(&table) {
            Ok(entities) => Some(entities),
            Err(e) => {
                warn!("Entity table does not match its schema: {}", e);
                None
            }
        }
    }

    fn cached<R: Record>(&self, name: &str) -> Option<Vec<R>> {
        if self.force {
            return None;
        }
        self.store.load(name)
    }

    fn resolve<R: Record>(
        &self,
        name: &'static str,
        compute: impl FnOnce() -> Derived<Vec<R>>,
    ) -> Slot<R> {
        match self.cached(name) {
            Some(rows) => Slot::loaded(rows),
            None => self.persist(name, compute()),
        }
    }

    fn persist<R: Record>(&self, name: &'static str, derived: Derived<Vec<R>>) -> Slot<R> {
        let rows = match derived {
            Derived::Ready(rows) => rows,
            Derived::Empty => Vec::new(),
            Derived::Failed(e) => {
                warn!("Table '{}' not computed: {}", name, e);
                return Slot::default();
            }
        };
        let state = if self.store.save(name, &rows) {
            TableState::Persisted
        } else {
            TableState::Computed
        };
        Slot {
            rows: Some(rows),
            state,
        }
    }

    /// Comparison and top-winner rows come from one computation, so they are
    /// resolved together and only recomputed if either is missing.
    fn resolve_attribute_profile(
        &self,
        top_wins: Option<&[EntityStats]>,
        entities: Option<&EntityTable>,
    ) -> (Slot<AttributeComparison>, Slot<Entity>) {
        let comparison = self.cached::<AttributeComparison>(tables::ATTRIBUTE_COMPARISON);
        let top_entities = self.cached::<Entity>(tables::TOP_WINNER_ATTRIBUTES);
        match (comparison, top_entities) {
            (Some(comparison), Some(top_entities)) => {
                (Slot::loaded(comparison), Slot::loaded(top_entities))
            }
            (comparison, top_entities) => {
                let (comparison_rows, top_rows) =
                    split_profile(compare_attributes(top_wins, entities));
                (
                    match comparison {
                        Some(rows) => Slot::loaded(rows),
                        None => self.persist(tables::ATTRIBUTE_COMPARISON, comparison_rows),
                    },
                    match top_entities {
                        Some(rows) => Slot::loaded(rows),
                        None => self.persist(tables::TOP_WINNER_ATTRIBUTES, top_rows),
                    },
                )
            }
        }
    }
}

fn split_profile(
    profile: Derived<AttributeProfile>,
) -> (Derived<Vec<AttributeComparison>>, Derived<Vec<Entity>>) {
    match profile {
        Derived::Ready(profile) => (
            Derived::from_rows(profile.comparison),
            Derived::from_rows(profile.top_entities),
        ),
        Derived::Empty => (Derived::Empty, Derived::Empty),
        Derived::Failed(e) => (Derived::Failed(e.clone()), Derived::Failed(e)),
    }
}
