//! Core business logic - framework-agnostic catalog, pairing, audit and dashboard operations.
//!
//! Every operation takes the database connection explicitly and returns [`crate::errors::Result`].

/// Full reset of audit data
pub mod admin;
/// Audit recording and corrective actions
pub mod audit;
/// Machine and question catalog: import, export, lookups
pub mod catalog;
/// Dashboard grid and matrix aggregation
pub mod dashboard;
/// Pairing tokens and audit cycles
pub mod pairing;
/// Photo storage
pub mod photo;
