//! Agora listing kernel library.
//!
//! Paginated, filterable, searchable article and tag listings over
//! PostgreSQL. The `agora` binary runs a single listing from the command
//! line.

pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod metrics;
