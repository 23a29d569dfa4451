//! Parquet backend.
//!
//! One Parquet file per table under the tables directory. Files are written
//! to a temporary path and renamed into place, so a save replaces the
//! previous contents in one step.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::{validate_table_name, Column, ColumnType, StorageError, Table, TableBackend, Value};

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Real => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Boolean => DataType::Boolean,
    }
}

fn column_type_for(field: &Field) -> Result<ColumnType, StorageError> {
    match field.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => Ok(ColumnType::Integer),
        DataType::Float32 | DataType::Float64 => Ok(ColumnType::Real),
        DataType::Utf8 | DataType::LargeUtf8 => Ok(ColumnType::Text),
        DataType::Boolean => Ok(ColumnType::Boolean),
        other => Err(StorageError::UnsupportedType {
            column: field.name().clone(),
            data_type: other.to_string(),
        }),
    }
}

/// Schema for a table.
fn schema_for(table: &Table) -> Schema {
    Schema::new(
        table
            .columns
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.column_type), true))
            .collect::<Vec<_>>(),
    )
}

/// Build one Arrow array per column.
fn column_arrays(table: &Table) -> Vec<ArrayRef> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let cells = table.rows.iter().map(|row| row[idx].clone().coerce(column.column_type));
            match column.column_type {
                ColumnType::Integer => {
                    let values: Vec<Option<i64>> = cells
                        .map(|v| match v {
                            Value::Integer(i) => Some(i),
                            _ => None,
                        })
                        .collect();
                    Arc::new(Int64Array::from(values)) as ArrayRef
                }
                ColumnType::Real => {
                    let values: Vec<Option<f64>> = cells
                        .map(|v| match v {
                            Value::Real(f) => Some(f),
                            _ => None,
                        })
                        .collect();
                    Arc::new(Float64Array::from(values)) as ArrayRef
                }
                ColumnType::Text => {
                    let values: Vec<Option<String>> = cells
                        .map(|v| match v {
                            Value::Text(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                    Arc::new(StringArray::from(values)) as ArrayRef
                }
                ColumnType::Boolean => {
                    let values: Vec<Option<bool>> = cells
                        .map(|v| match v {
                            Value::Boolean(b) => Some(b),
                            _ => None,
                        })
                        .collect();
                    Arc::new(BooleanArray::from(values)) as ArrayRef
                }
            }
        })
        .collect()
}

/// Read cell `row` of an array already cast to the column's Arrow type.
fn cell(array: &dyn Array, column_type: ColumnType, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    let any = array.as_any();
    match column_type {
        ColumnType::Integer => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Integer(a.value(row))),
        ColumnType::Real => any
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Real(a.value(row))),
        ColumnType::Text => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::Text(a.value(row).to_string())),
        ColumnType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Boolean(a.value(row))),
    }
    .unwrap_or(Value::Null)
}

/// Tables stored as Parquet files.
pub struct ParquetBackend {
    dir: PathBuf,
}

impl ParquetBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Get the path for a table.
    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", name))
    }

    /// Write a record batch to a Parquet file.
    fn write_batch(
        &self,
        path: &Path,
        schema: &Arc<Schema>,
        batch: &RecordBatch,
    ) -> Result<(), StorageError> {
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        Ok(())
    }

    /// Read all record batches from a Parquet file.
    fn read_batches(&self, path: &Path) -> Result<(Arc<Schema>, Vec<RecordBatch>), StorageError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        debug!("Read {} batches from {:?}", batches.len(), path);
        Ok((schema, batches))
    }
}

impl TableBackend for ParquetBackend {
    fn load(&self, name: &str) -> Result<Option<Table>, StorageError> {
        validate_table_name(name)?;
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let (schema, batches) = self.read_batches(&path)?;
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                Ok(Column {
                    name: field.name().clone(),
                    column_type: column_type_for(field)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let mut rows = Vec::new();
        for batch in &batches {
            let arrays = columns
                .iter()
                .enumerate()
                .map(|(idx, column)| cast(batch.column(idx), &arrow_type(column.column_type)))
                .collect::<Result<Vec<_>, _>>()?;

            for row in 0..batch.num_rows() {
                rows.push(
                    columns
                        .iter()
                        .zip(&arrays)
                        .map(|(column, array)| cell(array.as_ref(), column.column_type, row))
                        .collect(),
                );
            }
        }

        Ok(Some(Table::new(columns, rows)))
    }

    fn save(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        validate_table_name(name)?;
        fs::create_dir_all(&self.dir)?;

        let schema = Arc::new(schema_for(table));
        let batch = RecordBatch::try_new(schema.clone(), column_arrays(table))?;

        let path = self.table_path(name);
        let tmp_path = self.dir.join(format!(".{}.parquet.tmp", name));
        self.write_batch(&tmp_path, &schema, &batch)?;
        fs::rename(&tmp_path, &path)?;

        debug!("Wrote {} rows to {:?}", table.num_rows(), path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("parquet:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_table() -> Table {
        Table::new(
            vec![
                Column { name: "category".into(), column_type: ColumnType::Text },
                Column { name: "mean_win_rate".into(), column_type: ColumnType::Real },
                Column { name: "rank".into(), column_type: ColumnType::Integer },
                Column { name: "legendary".into(), column_type: ColumnType::Boolean },
            ],
            vec![
                vec![
                    Value::Text("Dragon".into()),
                    Value::Real(0.72),
                    Value::Integer(1),
                    Value::Boolean(true),
                ],
                vec![Value::Null, Value::Null, Value::Integer(2), Value::Boolean(false)],
            ],
        )
    }

    #[test]
    fn test_write_and_read_table() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ParquetBackend::new(temp_dir.path().to_path_buf());

        backend.save("category_ranking", &sample_table()).unwrap();

        assert!(temp_dir.path().join("category_ranking.parquet").exists());
        let loaded = backend.load("category_ranking").unwrap().unwrap();
        assert_eq!(loaded, sample_table());
        assert_eq!(loaded.fingerprint(), sample_table().fingerprint());
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ParquetBackend::new(temp_dir.path().to_path_buf());

        assert!(backend.load("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_empty_table_keeps_columns() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ParquetBackend::new(temp_dir.path().to_path_buf());
        let mut empty = sample_table();
        empty.rows.clear();

        backend.save("empty", &empty).unwrap();
        let loaded = backend.load("empty").unwrap().unwrap();
        assert_eq!(loaded.columns, empty.columns);
        assert_eq!(loaded.num_rows(), 0);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ParquetBackend::new(temp_dir.path().to_path_buf());

        backend.save("t", &sample_table()).unwrap();
        let mut one_row = sample_table();
        one_row.rows.truncate(1);
        backend.save("t", &one_row).unwrap();

        assert_eq!(backend.load("t").unwrap().unwrap(), one_row);
        assert!(!temp_dir.path().join(".t.parquet.tmp").exists());
    }
}
