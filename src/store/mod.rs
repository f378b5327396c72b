//! Row stores for the catalog
//!
//! A store persists rows of the ten catalog tables and enforces the
//! integrity rules on every write:
//! - required attributes, enum labels and value types (see `schema::validate`)
//! - foreign keys resolve to live parents on insert and update
//! - a delete is rejected while a row still references the target
//! - deleting a platform also deletes the records it owns
//!
//! Each call is one atomic unit: it commits in full or fails with no effect.

mod memory;
mod postgres;
mod query;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{Filter, Query};

use crate::error::Result;
use crate::schema::{Record, Table};
use std::future::Future;

pub trait CatalogStore: Send + Sync {
    /// Insert a row and return its surrogate key
    fn insert(&self, table: Table, record: Record) -> impl Future<Output = Result<i64>> + Send;

    /// Change the named columns of an existing row
    fn update(&self, table: Table, id: i64, changes: Record) -> impl Future<Output = Result<()>> + Send;

    /// Delete a row; `false` when there was no such row
    fn delete(&self, table: Table, id: i64) -> impl Future<Output = Result<bool>> + Send;

    /// Fetch a row, including its `id`
    fn get(&self, table: Table, id: i64) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Rows matching a query, ordered by `id`
    fn find(&self, table: Table, query: &Query) -> impl Future<Output = Result<Vec<Record>>> + Send;
}
