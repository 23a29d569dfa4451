//! Derived statistics models.

use serde::{Deserialize, Serialize};

use crate::storage::{ColumnSpec, ColumnType, Record, RowReader, SchemaError, Value};

/// Per-entity battle record.
///
/// `wins + losses == participations` and `0 <= win_rate <= 100` always hold
/// for values built through [`EntityStats::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Entity display name
    pub name: String,

    /// Contests taken part in, on either side
    pub participations: u32,

    pub wins: u32,

    /// `participations - wins`
    pub losses: u32,

    /// Wins per participation as a percentage, two decimals
    pub win_rate: f64,
}

impl EntityStats {
    /// Derive losses and win rate from participations and wins.
    ///
    /// Wins are clamped to participations.
    pub fn new(name: impl Into<String>, participations: u32, wins: u32) -> Self {
        let wins = wins.min(participations);
        Self {
            name: name.into(),
            participations,
            wins,
            losses: participations - wins,
            win_rate: crate::calculate::win_rate_percent(wins, participations),
        }
    }
}

impl Record for EntityStats {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::required("participations", ColumnType::Integer),
        ColumnSpec::required("wins", ColumnType::Integer),
        ColumnSpec::required("losses", ColumnType::Integer),
        ColumnSpec::nullable("win_rate", ColumnType::Real),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.name.as_str().into(),
            self.participations.into(),
            self.wins.into(),
            self.losses.into(),
            self.win_rate.into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            name: row.string("name")?,
            participations: row.u32("participations")?,
            wins: row.u32("wins")?,
            losses: row.u32("losses")?,
            win_rate: row.opt_f64("win_rate")?.unwrap_or(0.0),
        })
    }
}

/// Mean of one numeric attribute, top winners vs. everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeComparison {
    pub attribute: String,
    pub top_mean: f64,
    pub overall_mean: f64,
    /// `top_mean - overall_mean`
    pub difference: f64,
}

impl Record for AttributeComparison {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("attribute", ColumnType::Text),
        ColumnSpec::required("top_mean", ColumnType::Real),
        ColumnSpec::required("overall_mean", ColumnType::Real),
        ColumnSpec::required("difference", ColumnType::Real),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.attribute.as_str().into(),
            self.top_mean.into(),
            self.overall_mean.into(),
            self.difference.into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            attribute: row.string("attribute")?,
            top_mean: row.f64("top_mean")?,
            overall_mean: row.f64("overall_mean")?,
            difference: row.f64("difference")?,
        })
    }
}

/// Pearson correlation between an attribute and win count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCorrelation {
    pub attribute: String,
    /// Absent when undefined (constant column or fewer than two rows)
    pub correlation: Option<f64>,
}

impl Record for AttributeCorrelation {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("attribute", ColumnType::Text),
        ColumnSpec::nullable("correlation", ColumnType::Real),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![self.attribute.as_str().into(), self.correlation.into()]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            attribute: row.string("attribute")?,
            correlation: row.opt_f64("correlation")?,
        })
    }
}

/// Share of entities inside one win-rate range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    /// e.g. `25-50%`
    pub label: String,
    /// Fraction of all entities, 0..=1
    pub proportion: f64,
    /// `proportion * 100`, two decimals
    pub percentage: f64,
}

impl Record for DistributionBucket {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("label", ColumnType::Text),
        ColumnSpec::required("proportion", ColumnType::Real),
        ColumnSpec::required("percentage", ColumnType::Real),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.label.as_str().into(),
            self.proportion.into(),
            self.percentage.into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            label: row.string("label")?,
            proportion: row.f64("proportion")?,
            percentage: row.f64("percentage")?,
        })
    }
}

/// One category's standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRanking {
    pub category: String,
    /// Mean of member win fractions (0..=1), not a pooled rate
    pub mean_win_rate: f64,
    pub total_wins: u32,
    pub total_participations: u32,
    /// 1 = best
    pub rank: u32,
}

impl Record for CategoryRanking {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("category", ColumnType::Text),
        ColumnSpec::required("mean_win_rate", ColumnType::Real),
        ColumnSpec::required("total_wins", ColumnType::Integer),
        ColumnSpec::required("total_participations", ColumnType::Integer),
        ColumnSpec::required("rank", ColumnType::Integer),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.category.as_str().into(),
            self.mean_win_rate.into(),
            self.total_wins.into(),
            self.total_participations.into(),
            self.rank.into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            category: row.string("category")?,
            mean_win_rate: row.f64("mean_win_rate")?,
            total_wins: row.u32("total_wins")?,
            total_participations: row.u32("total_participations")?,
            rank: row.u32("rank")?,
        })
    }
}
