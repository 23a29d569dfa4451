//! Core data models for the arena analytics pipeline.

mod entity;
mod outcome;
mod stats;

pub use entity::*;
pub use outcome::*;
pub use stats::*;
