//! # Arena Analytics
//!
//! Battle outcome analytics: collect entities and pairwise outcomes from a
//! remote API, derive rankings and attribute statistics, and publish them
//! through a dashboard API and an HTML report.
//!
//! ## Architecture
//!
//! - **fetch**: Authenticated, paginated collection from the remote API
//! - **ingest**: Raw data profiling, de-duplication and CSV export/import
//! - **storage**: Named table store (SQLite, Parquet, in-memory)
//! - **calculate**: Table derivations (statistics, rankings, correlations)
//! - **pipeline**: Load-or-compute orchestration over the store
//! - **api**: Read-only dashboard endpoints
//! - **report**: Paginated HTML report
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod storage;

pub use models::*;
