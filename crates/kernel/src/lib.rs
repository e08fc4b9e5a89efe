//! Fresco Content Kernel Library
//!
//! Content groups, elements, and version history, a pluggable content
//! store, and the ZIP+JSON content transfer pipeline (exporter and
//! importer). The `fresco` binary wires the pipeline to PostgreSQL.

pub mod config;
pub mod error;
pub mod focal;
pub mod models;
pub mod store;
pub mod transfer;
