//! Raw data ingestion.
//!
//! Takes collected (or CSV-imported) entities and outcomes, profiles them,
//! drops duplicate outcomes, writes CSV copies and stores the raw tables the
//! pipeline starts from.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::fetch::{Collected, EntityRef};
use crate::models::{Entity, OutcomeEvent};
use crate::pipeline::tables;
use crate::storage::{Table, TableStore};

pub const ENTITY_IDS_CSV: &str = "entities.csv";
pub const ENTITY_ATTRIBUTES_CSV: &str = "entity_attributes.csv";
pub const OUTCOMES_CSV: &str = "outcomes.csv";

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Input file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to store raw table '{0}'")]
    StoreWrite(&'static str),
}

/// Shape and quality summary of one raw table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub duplicate_rows: usize,
    /// Columns with at least one null, and how many
    pub missing_values: Vec<(String, usize)>,
}

impl DatasetProfile {
    pub fn of(name: &str, table: &Table) -> Self {
        let mut seen = HashSet::with_capacity(table.num_rows());
        let duplicate_rows = table
            .rows
            .iter()
            .filter(|row| !seen.insert(format!("{:?}", row)))
            .count();

        let missing_values = table
            .columns
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| {
                let nulls = table
                    .rows
                    .iter()
                    .filter(|row| row.get(idx).map_or(true, |v| v.is_null()))
                    .count();
                (nulls > 0).then(|| (column.name.clone(), nulls))
            })
            .collect();

        Self {
            name: name.to_string(),
            rows: table.num_rows(),
            columns: table.columns.len(),
            duplicate_rows,
            missing_values,
        }
    }
}

impl fmt::Display for DatasetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rows x {} columns, {} duplicates",
            self.name, self.rows, self.columns, self.duplicate_rows
        )?;
        if self.missing_values.is_empty() {
            write!(f, ", no missing values")
        } else {
            let missing: Vec<String> = self
                .missing_values
                .iter()
                .map(|(column, count)| format!("{}={}", column, count))
                .collect();
            write!(f, ", missing: {}", missing.join(" "))
        }
    }
}

/// Outcome of storing one batch of raw data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub entities: DatasetProfile,
    pub outcomes: DatasetProfile,
    pub duplicates_removed: usize,
    /// Outcomes whose winner is neither participant (kept)
    pub foreign_winners: usize,
}

/// Drop repeated outcomes, keeping the first occurrence.
pub fn dedupe_outcomes(outcomes: Vec<OutcomeEvent>) -> (Vec<OutcomeEvent>, usize) {
    let before = outcomes.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<OutcomeEvent> = outcomes
        .into_iter()
        .filter(|o| seen.insert(o.clone()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Profile, clean and store the raw tables.
pub fn store_raw(
    store: &TableStore,
    entities: &[Entity],
    outcomes: Vec<OutcomeEvent>,
) -> Result<IngestReport, IngestError> {
    let entity_profile = DatasetProfile::of(tables::ENTITIES, &Table::from_records(entities));
    let outcome_profile = DatasetProfile::of(tables::OUTCOMES, &Table::from_records(&outcomes));
    info!("{}", entity_profile);
    info!("{}", outcome_profile);

    let foreign_winners = outcomes.iter().filter(|o| !o.winner_is_participant()).count();
    if foreign_winners > 0 {
        warn!(
            "{} outcomes name a winner that did not take part",
            foreign_winners
        );
    }

    let (outcomes, duplicates_removed) = dedupe_outcomes(outcomes);
    info!(
        "Removed {} duplicate outcomes, {} remain",
        duplicates_removed,
        outcomes.len()
    );

    if !store.save(tables::ENTITIES, entities) {
        return Err(IngestError::StoreWrite(tables::ENTITIES));
    }
    if !store.save(tables::OUTCOMES, &outcomes) {
        return Err(IngestError::StoreWrite(tables::OUTCOMES));
    }

    Ok(IngestReport {
        entities: entity_profile,
        outcomes: outcome_profile,
        duplicates_removed,
        foreign_winners,
    })
}

fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), IngestError> {
    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, IngestError> {
    if !path.exists() {
        return Err(IngestError::MissingFile(path.to_path_buf()));
    }
    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_error)
}

/// Write the collected records as CSV files under `dir`.
pub fn export_csv(dir: &Path, collected: &Collected) -> Result<Vec<PathBuf>, IngestError> {
    fs::create_dir_all(dir)?;
    let ids = dir.join(ENTITY_IDS_CSV);
    let attributes = dir.join(ENTITY_ATTRIBUTES_CSV);
    let outcomes = dir.join(OUTCOMES_CSV);

    write_csv::<EntityRef>(&ids, &collected.entity_refs)?;
    write_csv::<Entity>(&attributes, &collected.entities)?;
    write_csv::<OutcomeEvent>(&outcomes, &collected.outcomes)?;

    info!("Exported raw CSV files to {}", dir.display());
    Ok(vec![ids, attributes, outcomes])
}

/// Read entity attributes and outcomes back from a CSV directory.
pub fn import_csv(dir: &Path) -> Result<(Vec<Entity>, Vec<OutcomeEvent>), IngestError> {
    let entities: Vec<Entity> = read_csv(&dir.join(ENTITY_ATTRIBUTES_CSV))?;
    let outcomes: Vec<OutcomeEvent> = read_csv(&dir.join(OUTCOMES_CSV))?;
    info!(
        "Imported {} entities and {} outcomes from {}",
        entities.len(),
        outcomes.len(),
        dir.display()
    );
    Ok((entities, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::entity;
    use crate::storage::Record;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn collected() -> Collected {
        Collected {
            entity_refs: vec![
                EntityRef {
                    id: 1,
                    name: "Bulbasaur".to_string(),
                },
                EntityRef {
                    id: 4,
                    name: "Charmander".to_string(),
                },
            ],
            entities: vec![
                entity(1, "Bulbasaur", 49, Some("Grass/Poison")),
                entity(4, "Charmander", 52, None),
            ],
            outcomes: vec![
                OutcomeEvent::new(1, 4, 4),
                OutcomeEvent::new(1, 4, 4),
                OutcomeEvent::new(4, 1, 1),
            ],
        }
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let (unique, removed) = dedupe_outcomes(collected().outcomes);

        assert_eq!(removed, 1);
        assert_eq!(
            unique,
            vec![OutcomeEvent::new(1, 4, 4), OutcomeEvent::new(4, 1, 1)]
        );
    }

    #[test]
    fn test_profile_counts_duplicates_and_nulls() {
        let data = collected();
        let outcomes = DatasetProfile::of("outcomes", &Table::from_records(&data.outcomes));
        let entities = DatasetProfile::of("entities", &Table::from_records(&data.entities));

        assert_eq!(outcomes.rows, 3);
        assert_eq!(outcomes.columns, 3);
        assert_eq!(outcomes.duplicate_rows, 1);
        assert!(outcomes.missing_values.is_empty());

        assert_eq!(entities.duplicate_rows, 0);
        assert_eq!(
            entities.missing_values,
            vec![("entity_type".to_string(), 1)]
        );
        assert!(entities.to_string().contains("entity_type=1"));
    }

    #[test]
    fn test_store_raw_dedupes_before_saving() {
        let store = TableStore::in_memory();
        let data = collected();

        let report = store_raw(&store, &data.entities, data.outcomes).unwrap();

        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.foreign_winners, 0);
        assert_eq!(
            store.load::<OutcomeEvent>(tables::OUTCOMES).unwrap().len(),
            2
        );
        assert_eq!(store.load::<Entity>(tables::ENTITIES).unwrap(), data.entities);
    }

    #[test]
    fn test_csv_export_then_import() {
        let temp = TempDir::new().unwrap();
        let data = collected();

        let written = export_csv(temp.path(), &data).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        let (entities, outcomes) = import_csv(temp.path()).unwrap();
        assert_eq!(entities, data.entities);
        assert_eq!(outcomes, data.outcomes);
    }

    #[test]
    fn test_outcome_csv_header() {
        let temp = TempDir::new().unwrap();
        export_csv(temp.path(), &collected()).unwrap();

        let contents = fs::read_to_string(temp.path().join(OUTCOMES_CSV)).unwrap();
        let header = contents.lines().next().unwrap();
        let expected: Vec<&str> = OutcomeEvent::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(header, expected.join(","));
    }

    #[test]
    fn test_import_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            import_csv(temp.path()),
            Err(IngestError::MissingFile(_))
        ));
    }
}
