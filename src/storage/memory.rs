//! In-memory backend.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{validate_table_name, StorageError, Table, TableBackend};

/// Tables held in a map; nothing survives the process.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Table>>,
    read_only: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that rejects every write.
    pub fn read_only() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            read_only: true,
        }
    }

    /// Start with some tables already stored.
    pub fn with_tables(tables: impl IntoIterator<Item = (String, Table)>) -> Self {
        Self {
            tables: Mutex::new(tables.into_iter().collect()),
            read_only: false,
        }
    }

    /// Keep the current tables but reject further writes.
    pub fn freeze(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }
}

impl TableBackend for MemoryBackend {
    fn load(&self, name: &str) -> Result<Option<Table>, StorageError> {
        validate_table_name(name)?;
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(name).cloned())
    }

    fn save(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        validate_table_name(name)?;
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.insert(name.to_string(), table.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Column, ColumnType, Value};

    #[test]
    fn test_save_replaces_previous_table() {
        let backend = MemoryBackend::new();
        let column = Column {
            name: "n".to_string(),
            column_type: ColumnType::Integer,
        };
        let first = Table::new(vec![column.clone()], vec![vec![Value::Integer(1)]; 3]);
        let second = Table::new(vec![column], vec![vec![Value::Integer(2)]]);

        backend.save("t", &first).unwrap();
        backend.save("t", &second).unwrap();

        assert_eq!(backend.load("t").unwrap(), Some(second));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let backend = MemoryBackend::read_only();
        let table = Table::new(Vec::new(), Vec::new());
        assert!(matches!(
            backend.save("t", &table),
            Err(StorageError::ReadOnly)
        ));
    }
}
