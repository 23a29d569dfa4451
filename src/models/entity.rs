//! Entity model — a ranked competitor and its attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{ColumnSpec, ColumnType, Record, RowReader, SchemaError, Table, Value};

/// A competitor with numeric stats and a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier assigned by the source API
    pub id: i64,

    /// Display name
    pub name: String,

    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub sp_attack: i64,
    pub sp_defense: i64,
    pub speed: i64,
    pub generation: i64,

    /// Legendary flag
    pub legendary: bool,

    /// Category (type), multi-valued types joined with `/`
    pub entity_type: Option<String>,
}

/// Column name of the categorical attribute.
pub const CATEGORY_COLUMN: &str = "entity_type";

impl Entity {
    /// Value of a numeric attribute.
    pub fn attribute(&self, attribute: NumericAttribute) -> f64 {
        let raw = match attribute {
            NumericAttribute::Hp => self.hp,
            NumericAttribute::Attack => self.attack,
            NumericAttribute::Defense => self.defense,
            NumericAttribute::SpAttack => self.sp_attack,
            NumericAttribute::SpDefense => self.sp_defense,
            NumericAttribute::Speed => self.speed,
            NumericAttribute::Generation => self.generation,
        };
        raw as f64
    }
}

impl Record for Entity {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::required("id", ColumnType::Integer),
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::required("hp", ColumnType::Integer),
        ColumnSpec::required("attack", ColumnType::Integer),
        ColumnSpec::required("defense", ColumnType::Integer),
        ColumnSpec::required("sp_attack", ColumnType::Integer),
        ColumnSpec::required("sp_defense", ColumnType::Integer),
        ColumnSpec::required("speed", ColumnType::Integer),
        ColumnSpec::required("generation", ColumnType::Integer),
        ColumnSpec::required("legendary", ColumnType::Boolean),
        ColumnSpec::optional(CATEGORY_COLUMN, ColumnType::Text),
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.name.as_str().into(),
            self.hp.into(),
            self.attack.into(),
            self.defense.into(),
            self.sp_attack.into(),
            self.sp_defense.into(),
            self.speed.into(),
            self.generation.into(),
            self.legendary.into(),
            self.entity_type.clone().into(),
        ]
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
        Ok(Self {
            id: row.i64("id")?,
            name: row.string("name")?,
            hp: row.i64("hp")?,
            attack: row.i64("attack")?,
            defense: row.i64("defense")?,
            sp_attack: row.i64("sp_attack")?,
            sp_defense: row.i64("sp_defense")?,
            speed: row.i64("speed")?,
            generation: row.i64("generation")?,
            legendary: row.bool("legendary")?,
            entity_type: row.opt_string(CATEGORY_COLUMN)?,
        })
    }
}

/// Numeric attributes compared and correlated against wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericAttribute {
    Hp,
    Attack,
    Defense,
    SpAttack,
    SpDefense,
    Speed,
    Generation,
}

impl NumericAttribute {
    pub const ALL: [NumericAttribute; 7] = [
        NumericAttribute::Hp,
        NumericAttribute::Attack,
        NumericAttribute::Defense,
        NumericAttribute::SpAttack,
        NumericAttribute::SpDefense,
        NumericAttribute::Speed,
        NumericAttribute::Generation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericAttribute::Hp => "hp",
            NumericAttribute::Attack => "attack",
            NumericAttribute::Defense => "defense",
            NumericAttribute::SpAttack => "sp_attack",
            NumericAttribute::SpDefense => "sp_defense",
            NumericAttribute::Speed => "speed",
            NumericAttribute::Generation => "generation",
        }
    }
}

impl fmt::Display for NumericAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity attributes as loaded from the store.
///
/// Tracks whether the stored table carried the category column at all, so
/// the category ranker can tell "no categories" from "uncategorized rows".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityTable {
    pub entities: Vec<Entity>,
    pub has_categories: bool,
}

impl EntityTable {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            has_categories: true,
        }
    }

    pub fn from_table(table: &Table) -> Result<Self, SchemaError> {
        Ok(Self {
            entities: table.to_records()?,
            has_categories: table.has_column(CATEGORY_COLUMN),
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity by display name (first match).
    pub fn by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Sorted, de-duplicated category values.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .entities
            .iter()
            .filter_map(|e| e.entity_type.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::Entity;

    pub fn entity(id: i64, name: &str, attack: i64, entity_type: Option<&str>) -> Entity {
        Entity {
            id,
            name: name.to_string(),
            hp: 50,
            attack,
            defense: 50,
            sp_attack: 50,
            sp_defense: 50,
            speed: 50,
            generation: 1,
            legendary: false,
            entity_type: entity_type.map(str::to_string),
        }
    }
}
