//! Table access layer for partition/sort-key document stores.
//!
//! Wraps a store's admin and data clients behind per-table handles that
//! create and seed their table on first use, synthesize partial-update
//! expressions from plain entities, and dispatch queries either to an indexed
//! partition lookup or to an ordered client-side scan.
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
mod provision;
pub mod query;
pub mod schema;
pub mod table;
pub mod update;

pub use batch::{BatchAction, BatchRequestBuilder};
pub use client::{AdminClient, DataClient, SharedAdminClient, SharedDataClient};
pub use config::{ProbePolicy, TableConfig};
pub use error::{TableError, TableResult};
pub use query::{QueryDescriptor, QueryMode};
pub use schema::{InitialData, KeyAttribute, TableSchema};
pub use table::{TableFactory, TableHandle, UpdateOutcome};
