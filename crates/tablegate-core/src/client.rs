//! Store client seams.
//!
//! The access layer never talks to the wire itself; it is handed an
//! [`AdminClient`] for table metadata and a [`DataClient`] for item traffic.
//! Both traits use `#[async_trait]` because handles keep them as
//! `Arc<dyn ...>` trait objects. Authentication, connection management,
//! retries and timeouts belong to the implementations.

use std::sync::Arc;

use async_trait::async_trait;

use tablegate_model::StoreError;
use tablegate_model::input::{
    BatchWriteItemInput, CreateTableInput, DeleteItemInput, DescribeTableInput, GetItemInput,
    PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use tablegate_model::output::{
    BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput, DescribeTableOutput, GetItemOutput,
    PutItemOutput, QueryOutput, ScanOutput, UpdateItemOutput,
};

/// Table administration operations.
#[async_trait]
pub trait AdminClient: Send + Sync + std::fmt::Debug {
    /// Fetch table metadata. Fails with `ResourceNotFoundException` when the
    /// table does not exist.
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, StoreError>;

    /// Create a table.
    async fn create_table(&self, input: CreateTableInput) -> Result<CreateTableOutput, StoreError>;
}

/// Item-level operations.
#[async_trait]
pub trait DataClient: Send + Sync + std::fmt::Debug {
    /// Read one item by primary key.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, StoreError>;

    /// Write (insert or replace) one item.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, StoreError>;

    /// Apply an update expression to one item, creating it if absent.
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError>;

    /// Delete one item by primary key. Deleting a missing item succeeds.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, StoreError>;

    /// Read one page of items sharing a partition key.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError>;

    /// Read one page of the whole table.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, StoreError>;

    /// Apply a batch of puts and deletes.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, StoreError>;
}

/// Shared admin client handle.
pub type SharedAdminClient = Arc<dyn AdminClient>;

/// Shared data client handle.
pub type SharedDataClient = Arc<dyn DataClient>;
