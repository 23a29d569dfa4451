//! Statistics calculation engine.
//!
//! Derives the aggregate tables from stored outcome and entity data:
//! - Name resolution for raw outcomes
//! - Per-entity participations, wins, losses and win rate
//! - Top-N rankings
//! - Attribute comparison of top winners against the population
//! - Attribute/win correlations
//! - Win-rate distribution buckets
//! - Category rankings
//!
//! Every derivation is a pure function returning [`Derived`]; none of them
//! touch the store or raise.

pub mod aggregate;
pub mod attributes;
pub mod categories;
pub mod correlation;
pub mod distribution;
pub mod merge;
pub mod rankings;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use aggregate::entity_stats;
pub use attributes::{compare_attributes, AttributeProfile};
pub use categories::rank_categories;
pub use correlation::correlate_with_wins;
pub use distribution::{win_rate_distribution, WinRateBuckets};
pub use merge::merge_outcomes;
pub use rankings::{top_by_losses, top_by_win_rate, top_by_wins};

/// Why a derivation produced nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeriveError {
    #[error("Required input '{0}' is unavailable")]
    UpstreamUnavailable(&'static str),

    #[error("Input '{table}' lacks column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Outcome of a derivation: rows, no rows, or could not compute.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived<T> {
    Ready(T),
    Empty,
    Failed(DeriveError),
}

impl<T> Derived<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Derived::Failed(_))
    }
}

impl<R> Derived<Vec<R>> {
    /// `Ready` for a non-empty list, `Empty` otherwise.
    pub fn from_rows(rows: Vec<R>) -> Self {
        if rows.is_empty() {
            Derived::Empty
        } else {
            Derived::Ready(rows)
        }
    }
}

/// Tunable policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Length of every top-N ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Entities with fewer participations are left out of the win-rate ranking
    #[serde(default = "default_min_participations")]
    pub min_participations: u32,

    /// Win-rate bucket edges in percent, ascending
    #[serde(default = "default_win_rate_edges")]
    pub win_rate_edges: Vec<f64>,
}

fn default_top_n() -> usize {
    10
}

fn default_min_participations() -> u32 {
    5
}

fn default_win_rate_edges() -> Vec<f64> {
    vec![0.0, 25.0, 50.0, 75.0, 100.0]
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            min_participations: default_min_participations(),
            win_rate_edges: default_win_rate_edges(),
        }
    }
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Wins as a fraction of participations, 0 when there are none.
pub fn win_fraction(wins: u32, participations: u32) -> f64 {
    if participations == 0 {
        0.0
    } else {
        wins as f64 / participations as f64
    }
}

/// Win rate in percent, two decimals.
pub fn win_rate_percent(wins: u32, participations: u32) -> f64 {
    round2(win_fraction(wins, participations) * 100.0)
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
