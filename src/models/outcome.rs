//! Outcome models — one recorded contest between two entities.

use serde::{Deserialize, Serialize};

use crate::storage::{ColumnSpec, ColumnType, Record, RowReader, SchemaError, Value};

/// A raw outcome event as delivered by the source API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub first_id: i64,
    pub second_id: i64,
    /// Must be one of `first_id` / `second_id`
    pub winner_id: i64,
}

impl OutcomeEvent {
    pub fn new(first_id: i64, second_id: i64, winner_id: i64) -> Self {
        Self {
            first_id,
            second_id,
            winner_id,
        }
    }

    /// Whether the declared winner took part in the contest.
    pub fn winner_is_participant(&self) -> bool {
        self.winner_id == self.first_id || self.winner_id == self.second_id
    }
}

impl Record for OutcomeEvent {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("first_id", ColumnType::Integer),
        ColumnSpec::required("second_id", ColumnType::Integer),
        ColumnSpec::required("winner_id", ColumnType::Integer),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.first_id.into(),
            self.second_id.into(),
            self.winner_id.into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            first_id: row.i64("first_id")?,
            second_id: row.i64("second_id")?,
            winner_id: row.i64("winner_id")?,
        })
    }
}

/// An outcome with names resolved for both sides and the winner.
///
/// A name is absent when its id did not match any entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedOutcome {
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    pub winner_name: Option<String>,
}

impl EnrichedOutcome {
    pub fn new(first: &str, second: &str, winner: &str) -> Self {
        Self {
            first_name: Some(first.to_string()),
            second_name: Some(second.to_string()),
            winner_name: Some(winner.to_string()),
        }
    }

    /// Whether `name` took part on either side.
    pub fn involves(&self, name: &str) -> bool {
        self.first_name.as_deref() == Some(name) || self.second_name.as_deref() == Some(name)
    }

    /// The other participant, from `name`'s point of view.
    pub fn opponent_of(&self, name: &str) -> Option<&str> {
        if self.first_name.as_deref() == Some(name) {
            self.second_name.as_deref()
        } else {
            self.first_name.as_deref()
        }
    }

    pub fn won_by(&self, name: &str) -> bool {
        self.winner_name.as_deref() == Some(name)
    }
}

impl Record for EnrichedOutcome {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::nullable("first_name", ColumnType::Text),
        ColumnSpec::nullable("second_name", ColumnType::Text),
        ColumnSpec::nullable("winner_name", ColumnType::Text),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.first_name.clone().into(),
            self.second_name.clone().into(),
            self.winner_name.clone().into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            first_name: row.opt_string("first_name")?,
            second_name: row.opt_string("second_name")?,
            winner_name: row.opt_string("winner_name")?,
        })
    }
}
