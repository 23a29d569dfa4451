//! SQLite backend.
//!
//! Each named table is a real SQL table. A save drops and recreates the
//! table inside one transaction, so readers see either the old or the new
//! contents. Every operation opens its own connection.

use std::fs;
use std::path::PathBuf;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ToSql};
use tracing::debug;

use super::{validate_table_name, Column, ColumnType, StorageError, Table, TableBackend, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

/// Tables stored in a single SQLite database file.
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(conn)
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool, StorageError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn quote(identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

fn read_value(value: ValueRef<'_>, column_type: ColumnType) -> Value {
    let raw = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
    };
    raw.coerce(column_type)
}

impl TableBackend for SqliteBackend {
    fn load(&self, name: &str) -> Result<Option<Table>, StorageError> {
        validate_table_name(name)?;
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = self.connect()?;
        if !Self::table_exists(&conn, name)? {
            return Ok(None);
        }

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", Self::quote(name)))?;
        let columns: Vec<Column> = stmt
            .columns()
            .iter()
            .map(|c| Column {
                name: c.name().to_string(),
                column_type: c
                    .decl_type()
                    .map(ColumnType::from_sql_decl)
                    .unwrap_or(ColumnType::Text),
            })
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                values.push(read_value(row.get_ref(idx)?, column.column_type));
            }
            rows.push(values);
        }

        debug!("Read {} rows from {}.{}", rows.len(), self.path.display(), name);
        Ok(Some(Table::new(columns, rows)))
    }

    fn save(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        validate_table_name(name)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let quoted = Self::quote(name);
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quoted))?;

        let column_defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", Self::quote(&c.name), c.column_type.sql_type()))
            .collect();
        tx.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quoted,
            column_defs.join(", ")
        ))?;

        if !table.columns.is_empty() {
            let placeholders: Vec<String> =
                (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quoted,
                placeholders.join(", ")
            ))?;
            for row in &table.rows {
                insert.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }

        tx.commit()?;
        debug!(
            "Replaced {}.{} with {} rows",
            self.path.display(),
            name,
            table.num_rows()
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
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
                Column { name: "id".into(), column_type: ColumnType::Integer },
                Column { name: "name".into(), column_type: ColumnType::Text },
                Column { name: "score".into(), column_type: ColumnType::Real },
                Column { name: "legendary".into(), column_type: ColumnType::Boolean },
            ],
            vec![
                vec![
                    Value::Integer(1),
                    Value::Text("Bulbasaur".into()),
                    Value::Real(45.5),
                    Value::Boolean(false),
                ],
                vec![
                    Value::Integer(2),
                    Value::Null,
                    Value::Real(0.0),
                    Value::Boolean(true),
                ],
            ],
        )
    }

    #[test]
    fn test_write_and_read_table() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("store.db"));

        backend.save("entities", &sample_table()).unwrap();
        let loaded = backend.load("entities").unwrap().unwrap();

        assert_eq!(loaded, sample_table());
    }

    #[test]
    fn test_save_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("store.db"));

        backend.save("entities", &sample_table()).unwrap();
        let mut smaller = sample_table();
        smaller.rows.truncate(1);
        backend.save("entities", &smaller).unwrap();

        assert_eq!(backend.load("entities").unwrap().unwrap().num_rows(), 1);
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("store.db"));

        assert!(backend.load("missing").unwrap().is_none());
        backend.save("other", &sample_table()).unwrap();
        assert!(backend.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("store.db"));

        assert!(matches!(
            backend.save("x; DROP TABLE y", &sample_table()),
            Err(StorageError::InvalidTableName(_))
        ));
    }

    #[test]
    fn test_empty_table_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("store.db"));
        let mut empty = sample_table();
        empty.rows.clear();

        backend.save("empty", &empty).unwrap();
        let loaded = backend.load("empty").unwrap().unwrap();
        assert_eq!(loaded.columns, empty.columns);
        assert!(loaded.is_empty());
    }
}
