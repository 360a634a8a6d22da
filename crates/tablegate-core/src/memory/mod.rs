//! In-memory store implementing [`AdminClient`](crate::client::AdminClient)
//! and [`DataClient`](crate::client::DataClient).
//!
//! Used for tests and local development. It keeps the store behaviors the
//! access layer relies on: typed primary keys, not-found and in-use errors,
//! placeholder-based update and key-condition expressions, paginated reads
//! and the batch write ceiling.

mod expression;
mod state;
mod storage;
mod store;

pub use expression::{ExpressionError, UpdateAction};
pub use storage::StorageError;
pub use store::MemoryStore;
