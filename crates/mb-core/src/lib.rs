//! Core types shared across the Mama Bear workspace.
//!
//! - **types**: the per-request outcome record and the model-health seam
//! - **config**: TOML configuration with eager validation
//! - **variant**: specialised assistant variants and their model preferences
//! - **planning**: SQLite-backed logs, tasks, plans, and context snapshots

pub mod config;
pub mod planning;
pub mod types;
pub mod variant;
