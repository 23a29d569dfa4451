//! Typed table schemas.
//!
//! Every persisted table is a list of rows of [`Value`]s under a list of
//! [`Column`]s. Record types describe their columns with [`ColumnSpec`] and
//! convert to and from rows through the [`Record`] trait, so the store never
//! has to know about the domain types it persists.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while mapping a stored table onto a record type.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' expected {expected}, found {found}")]
    InvalidValue {
        column: String,
        expected: ColumnType,
        found: String,
    },

    #[error("Column '{0}' is not nullable but contains a null")]
    UnexpectedNull(String),

    #[error("Row has {found} values but the table has {expected} columns")]
    RowWidth { expected: usize, found: usize },
}

/// Physical column types supported by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ColumnType {
    /// SQL type used when creating a relational table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// Map a declared SQL type back onto a column type.
    pub fn from_sql_decl(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            ColumnType::Boolean
        } else if decl.contains("INT") {
            ColumnType::Integer
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Real => write!(f, "real"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Static column description attached to a record type.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Whether a stored table lacking this column is rejected on load.
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
            required: true,
        }
    }

    pub const fn nullable(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            required: true,
        }
    }

    /// A nullable column that older tables may not carry at all.
    pub const fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            required: false,
        }
    }
}

/// Column of a materialized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl From<&ColumnSpec> for Column {
    fn from(spec: &ColumnSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            column_type: spec.column_type,
        }
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Integer(v) => format!("integer {}", v),
            Value::Real(v) => format!("real {}", v),
            Value::Text(v) => format!("text {:?}", v),
            Value::Boolean(v) => format!("boolean {}", v),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Boolean(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(v) => Some(v.to_string()),
            Value::Real(v) => Some(v.to_string()),
            Value::Boolean(v) => Some(v.to_string()),
            Value::Null => None,
        }
    }

    /// Coerce a loaded value into the declared column type.
    pub fn coerce(self, column_type: ColumnType) -> Value {
        let coerced = match (&self, column_type) {
            (Value::Null, _) => return Value::Null,
            (_, ColumnType::Integer) => self.as_i64().map(Value::Integer),
            (_, ColumnType::Real) => self.as_f64().map(Value::Real),
            (_, ColumnType::Boolean) => self.as_bool().map(Value::Boolean),
            (_, ColumnType::Text) => self.as_text().map(Value::Text),
        };
        coerced.unwrap_or(self)
    }

    fn fingerprint_into(&self, hasher: &mut Sha256) {
        match self {
            Value::Null => hasher.update([0u8]),
            Value::Integer(v) => {
                hasher.update([1u8]);
                hasher.update(v.to_le_bytes());
            }
            Value::Real(v) => {
                hasher.update([2u8]);
                hasher.update(v.to_bits().to_le_bytes());
            }
            Value::Text(s) => {
                hasher.update([3u8]);
                hasher.update((s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            Value::Boolean(v) => {
                hasher.update([4u8]);
                hasher.update([u8::from(*v)]);
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A record type that can be persisted as a table row.
pub trait Record: Sized {
    /// Column layout, in row order.
    const COLUMNS: &'static [ColumnSpec];

    /// Encode this record as a row aligned with [`Record::COLUMNS`].
    fn to_row(&self) -> Vec<Value>;

    /// Decode a row aligned with [`Record::COLUMNS`].
    fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError>;
}

/// Typed accessor over one row aligned with a record's columns.
pub struct RowReader<'a> {
    columns: &'static [ColumnSpec],
    values: &'a [Value],
}

impl<'a> RowReader<'a> {
    pub fn new(columns: &'static [ColumnSpec], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    fn cell(&self, name: &str) -> Result<&'a Value, SchemaError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    fn invalid(name: &str, expected: ColumnType, value: &Value) -> SchemaError {
        SchemaError::InvalidValue {
            column: name.to_string(),
            expected,
            found: value.describe(),
        }
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, SchemaError> {
        let value = self.cell(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_i64()
            .map(Some)
            .ok_or_else(|| Self::invalid(name, ColumnType::Integer, value))
    }

    pub fn i64(&self, name: &str) -> Result<i64, SchemaError> {
        self.opt_i64(name)?
            .ok_or_else(|| SchemaError::UnexpectedNull(name.to_string()))
    }

    pub fn u32(&self, name: &str) -> Result<u32, SchemaError> {
        let raw = self.i64(name)?;
        u32::try_from(raw).map_err(|_| Self::invalid(name, ColumnType::Integer, &Value::Integer(raw)))
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, SchemaError> {
        let value = self.cell(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Self::invalid(name, ColumnType::Real, value))
    }

    pub fn f64(&self, name: &str) -> Result<f64, SchemaError> {
        self.opt_f64(name)?
            .ok_or_else(|| SchemaError::UnexpectedNull(name.to_string()))
    }

    pub fn bool(&self, name: &str) -> Result<bool, SchemaError> {
        let value = self.cell(name)?;
        if value.is_null() {
            return Err(SchemaError::UnexpectedNull(name.to_string()));
        }
        value
            .as_bool()
            .ok_or_else(|| Self::invalid(name, ColumnType::Boolean, value))
    }

    pub fn opt_string(&self, name: &str) -> Result<Option<String>, SchemaError> {
        Ok(self.cell(name)?.as_text())
    }

    pub fn string(&self, name: &str) -> Result<String, SchemaError> {
        self.opt_string(name)?
            .ok_or_else(|| SchemaError::UnexpectedNull(name.to_string()))
    }
}

/// A materialized table: the unit the store loads and saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from typed records.
    pub fn from_records<R: Record>(records: &[R]) -> Self {
        Self {
            columns: R::COLUMNS.iter().map(Column::from).collect(),
            rows: records.iter().map(Record::to_row).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Decode every row into `R`, matching columns by name.
    ///
    /// Required columns must be present; optional columns that the stored
    /// table does not carry decode as null. Extra stored columns are ignored.
    pub fn to_records<R: Record>(&self) -> Result<Vec<R>, SchemaError> {
        let mut positions = Vec::with_capacity(R::COLUMNS.len());
        for spec in R::COLUMNS {
            let position = self.columns.iter().position(|c| c.name == spec.name);
            if position.is_none() && spec.required {
                return Err(SchemaError::MissingColumn(spec.name.to_string()));
            }
            positions.push(position);
        }

        let mut records = Vec::with_capacity(self.rows.len());
        let mut aligned = Vec::with_capacity(R::COLUMNS.len());
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(SchemaError::RowWidth {
                    expected: self.columns.len(),
                    found: row.len(),
                });
            }
            aligned.clear();
            for (spec, position) in R::COLUMNS.iter().zip(&positions) {
                let value = position
                    .map(|idx| row[idx].clone().coerce(spec.column_type))
                    .unwrap_or(Value::Null);
                if value.is_null() && !spec.nullable {
                    return Err(SchemaError::UnexpectedNull(spec.name.to_string()));
                }
                aligned.push(value);
            }
            records.push(R::from_row(&RowReader::new(R::COLUMNS, &aligned))?);
        }
        Ok(records)
    }

    /// SHA-256 over column names and every cell, hex encoded.
    ///
    /// Two tables with the same fingerprint hold identical rows, bit for bit.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.name.as_bytes());
            hasher.update([0xff]);
        }
        for row in &self.rows {
            for value in row {
                value.fingerprint_into(&mut hasher);
            }
            hasher.update([0xfe]);
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        id: i64,
        label: Option<String>,
        score: f64,
        flag: bool,
    }

    impl Record for Sample {
        const COLUMNS: &'static [ColumnSpec] = &[
            ColumnSpec::required("id", ColumnType::Integer),
            ColumnSpec::optional("label", ColumnType::Text),
            ColumnSpec::required("score", ColumnType::Real),
            ColumnSpec::required("flag", ColumnType::Boolean),
        ];

        fn to_row(&self) -> Vec<Value> {
            vec![
                self.id.into(),
                self.label.clone().into(),
                self.score.into(),
                self.flag.into(),
            ]
        }

        fn from_row(row: &RowReader<'_>) -> Result<Self, SchemaError> {
            Ok(Self {
                id: row.i64("id")?,
                label: row.opt_string("label")?,
                score: row.f64("score")?,
                flag: row.bool("flag")?,
            })
        }
    }

    fn sample() -> Vec<Sample> {
        vec![
            Sample {
                id: 1,
                label: Some("a".to_string()),
                score: 1.5,
                flag: true,
            },
            Sample {
                id: 2,
                label: None,
                score: 0.0,
                flag: false,
            },
        ]
    }

    #[test]
    fn test_records_round_trip_through_table() {
        let table = Table::from_records(&sample());
        assert_eq!(table.num_rows(), 2);
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label", "score", "flag"]);
        assert_eq!(table.to_records::<Sample>().unwrap(), sample());
    }

    #[test]
    fn test_missing_optional_column_decodes_as_null() {
        let table = Table::new(
            vec![
                Column { name: "flag".into(), column_type: ColumnType::Integer },
                Column { name: "score".into(), column_type: ColumnType::Real },
                Column { name: "id".into(), column_type: ColumnType::Integer },
            ],
            vec![vec![Value::Integer(1), Value::Real(2.0), Value::Integer(7)]],
        );
        let records = table.to_records::<Sample>().unwrap();
        assert_eq!(records[0].id, 7);
        assert_eq!(records[0].label, None);
        assert!(records[0].flag);
    }

    #[test]
    fn test_missing_required_column_is_rejected() {
        let table = Table::new(
            vec![Column { name: "id".into(), column_type: ColumnType::Integer }],
            vec![vec![Value::Integer(1)]],
        );
        assert_eq!(
            table.to_records::<Sample>().unwrap_err(),
            SchemaError::MissingColumn("score".to_string())
        );
    }

    #[test]
    fn test_null_in_non_nullable_column() {
        let mut table = Table::from_records(&sample());
        table.rows[0][2] = Value::Null;
        assert_eq!(
            table.to_records::<Sample>().unwrap_err(),
            SchemaError::UnexpectedNull("score".to_string())
        );
    }

    #[test]
    fn test_text_values_are_coerced() {
        let mut table = Table::from_records(&sample());
        table.rows[0][0] = Value::Text("42".to_string());
        table.rows[0][3] = Value::Text("False".to_string());
        let records = table.to_records::<Sample>().unwrap();
        assert_eq!(records[0].id, 42);
        assert!(!records[0].flag);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Table::from_records(&sample());
        let b = Table::from_records(&sample());
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = b.clone();
        c.rows[1][2] = Value::Real(0.01);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_sql_decl_mapping() {
        assert_eq!(ColumnType::from_sql_decl("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_sql_decl("bigint"), ColumnType::Integer);
        assert_eq!(ColumnType::from_sql_decl("BOOLEAN"), ColumnType::Boolean);
        assert_eq!(ColumnType::from_sql_decl("DOUBLE PRECISION"), ColumnType::Real);
        assert_eq!(ColumnType::from_sql_decl("VARCHAR(20)"), ColumnType::Text);
    }
}
