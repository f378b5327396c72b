//! Platform Catalog Library
//!
//! Normalized relational catalog of compute platforms: the table registry and
//! its PostgreSQL DDL, boundary validation, integrity-enforcing stores and a
//! typed catalog API on top of them.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod pool;
pub mod schema;
pub mod store;
