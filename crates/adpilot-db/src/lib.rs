//! Campaign data model and the local cold-start cache.
//!
//! The cache mirrors campaign shapes keyed by campaign id. It seeds a view
//! on startup and is never authoritative once a network read succeeds.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
