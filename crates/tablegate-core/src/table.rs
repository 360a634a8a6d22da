//! Table handles.
//!
//! A [`TableFactory`] holds the store clients and configuration; each
//! [`TableHandle`] it builds is bound to one [`TableSchema`] and exposes the
//! item operations. Every operation except [`TableHandle::batch`] is guarded:
//! the table is provisioned on first use before the operation runs.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use tablegate_core::memory::MemoryStore;
//! use tablegate_core::{KeyAttribute, TableConfig, TableFactory, TableSchema};
//! use tablegate_model::{AttributeValue, item};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let factory = TableFactory::new(store.clone(), store, TableConfig::default());
//! let users = factory.table(
//!     TableSchema::new("users", KeyAttribute::number("id"))
//!         .with_initial_items(vec![item! { "id" => 1, "name" => "Ada" }]),
//! );
//!
//! let found = users.get(AttributeValue::from(1), None).await.unwrap();
//! assert_eq!(found, Some(item! { "id" => 1, "name" => "Ada" }));
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use tablegate_model::input::{BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput};
use tablegate_model::output::BatchWriteItemOutput;
use tablegate_model::{AttributeValue, Item, Key};

use crate::batch::BatchRequestBuilder;
use crate::client::{SharedAdminClient, SharedDataClient};
use crate::config::TableConfig;
use crate::error::{TableError, TableResult};
use crate::provision::{ProvisionLocks, Provisioner};
use crate::query::{QueryDescriptor, execute_query, scan_all};
use crate::schema::TableSchema;
use crate::update::build_update_item_input;

/// Builds [`TableHandle`]s that share store clients, configuration and
/// provisioning state.
///
/// Handles from the same factory never provision a table twice concurrently.
/// Handles from different factories do not coordinate with each other.
#[derive(Debug, Clone)]
pub struct TableFactory {
    admin: SharedAdminClient,
    data: SharedDataClient,
    config: Arc<TableConfig>,
    locks: ProvisionLocks,
}

impl TableFactory {
    /// Create a factory over the given clients.
    #[must_use]
    pub fn new(admin: SharedAdminClient, data: SharedDataClient, config: TableConfig) -> Self {
        Self {
            admin,
            data,
            config: Arc::new(config),
            locks: ProvisionLocks::default(),
        }
    }

    /// The configuration shared by all handles.
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Bind a handle to `schema`.
    #[must_use]
    pub fn table(&self, schema: TableSchema) -> TableHandle {
        TableHandle {
            schema: Arc::new(schema),
            provisioner: Provisioner::new(
                Arc::clone(&self.admin),
                Arc::clone(&self.data),
                Arc::clone(&self.config),
                self.locks.clone(),
            ),
            data: Arc::clone(&self.data),
            config: Arc::clone(&self.config),
        }
    }
}

/// Result of [`TableHandle::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was written; carries the caller's entity.
    Updated(Item),
    /// The entity had no non-key attributes; the store was not contacted.
    Unmodified,
}

/// Operations on one table.
#[derive(Debug, Clone)]
pub struct TableHandle {
    schema: Arc<TableSchema>,
    provisioner: Provisioner,
    data: SharedDataClient,
    config: Arc<TableConfig>,
}

impl TableHandle {
    /// The schema this handle is bound to.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Make sure the table exists, creating and seeding it if needed.
    ///
    /// Guarded operations do this implicitly; calling it up front moves the
    /// provisioning cost to start-up.
    pub async fn provision(&self) -> TableResult<()> {
        self.provisioner.ensure_table(&self.schema).await
    }

    /// Provision the table, then run `op`.
    ///
    /// `op` is only polled once provisioning succeeded, so argument checks
    /// inside it run against an existing table.
    async fn guarded<T>(&self, op: impl Future<Output = TableResult<T>>) -> TableResult<T> {
        self.provision().await?;
        op.await
    }

    /// Read every item of the table.
    pub async fn get_all(&self) -> TableResult<Vec<Item>> {
        self.guarded(async { Ok(scan_all(self.data.as_ref(), &self.schema.table_name).await?) })
            .await
    }

    /// Read one item by primary key. Returns `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingKey`] when the table has a sort key and no
    /// sort value is given.
    pub async fn get(
        &self,
        partition: AttributeValue,
        sort: Option<AttributeValue>,
    ) -> TableResult<Option<Item>> {
        self.guarded(async {
            let input = GetItemInput {
                table_name: self.schema.table_name.clone(),
                key: self.primary_key(partition, sort)?,
                consistent_read: None,
            };
            Ok(self.data.get_item(input).await?.item)
        })
        .await
    }

    /// Put `entity`, dropping empty non-key attributes first.
    ///
    /// Returns the entity as given.
    pub async fn create(&self, entity: Item) -> TableResult<Item> {
        let key_names = self.schema.key_names();
        let item: Item = entity
            .iter()
            .filter(|(name, value)| key_names.contains(&name.as_str()) || !value.is_falsy())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let input = PutItemInput {
            table_name: self.schema.table_name.clone(),
            item,
        };
        self.guarded(async { Ok(self.data.put_item(input).await?) })
            .await?;
        Ok(entity)
    }

    /// Write the non-key attributes of `entity` as a partial update.
    ///
    /// Key values default to the entity's own key attributes. Attributes
    /// holding `NULL` are removed. When nothing is left to write, returns
    /// [`UpdateOutcome::Unmodified`] without sending an update.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingKey`] when a key value is neither given
    /// nor present in the entity.
    pub async fn update(
        &self,
        entity: Item,
        partition: Option<AttributeValue>,
        sort: Option<AttributeValue>,
    ) -> TableResult<UpdateOutcome> {
        self.guarded(async {
            let schema = &self.schema;
            let partition = partition
                .or_else(|| entity.get(&schema.key.name).cloned())
                .ok_or_else(|| TableError::MissingKey {
                    attr: schema.key.name.clone(),
                })?;
            let sort = match &schema.range_key {
                Some(range_key) => Some(
                    sort.or_else(|| entity.get(&range_key.name).cloned())
                        .ok_or_else(|| TableError::MissingKey {
                            attr: range_key.name.clone(),
                        })?,
                ),
                None => None,
            };

            let Some(input) = build_update_item_input(schema, &entity, partition, sort) else {
                debug!(table = %schema.table_name, "nothing to update");
                return Ok(UpdateOutcome::Unmodified);
            };
            self.data.update_item(input).await?;
            Ok(UpdateOutcome::Updated(entity))
        })
        .await
    }

    /// Delete one item by primary key. Deleting a missing item succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingKey`] when the table has a sort key and no
    /// sort value is given.
    pub async fn delete(
        &self,
        partition: AttributeValue,
        sort: Option<AttributeValue>,
    ) -> TableResult<()> {
        self.guarded(async {
            let input = DeleteItemInput {
                table_name: self.schema.table_name.clone(),
                key: self.primary_key(partition, sort)?,
            };
            self.data.delete_item(input).await?;
            Ok(())
        })
        .await
    }

    /// Run an indexed query or an ordered scan, depending on `descriptor`.
    pub async fn query(&self, descriptor: &QueryDescriptor) -> TableResult<Vec<Item>> {
        self.guarded(async {
            Ok(execute_query(self.data.as_ref(), &self.schema, descriptor).await?)
        })
        .await
    }

    /// A batch builder using the configured chunk size.
    #[must_use]
    pub fn batch_builder(&self) -> BatchRequestBuilder {
        BatchRequestBuilder::new().with_chunk_size(self.config.effective_batch_chunk_size())
    }

    /// Write a rendered batch request.
    ///
    /// Not guarded: the request may target any table.
    pub async fn batch(&self, request: BatchWriteItemInput) -> TableResult<BatchWriteItemOutput> {
        let output = self.data.batch_write_item(request).await?;
        let unprocessed: usize = output.unprocessed_items.values().map(Vec::len).sum();
        if unprocessed > 0 {
            warn!(table = %self.schema.table_name, unprocessed, "batch left unprocessed items");
        }
        Ok(output)
    }

    fn primary_key(
        &self,
        partition: AttributeValue,
        sort: Option<AttributeValue>,
    ) -> TableResult<Key> {
        if let Some(range_key) = &self.schema.range_key {
            if sort.is_none() {
                return Err(TableError::MissingKey {
                    attr: range_key.name.clone(),
                });
            }
        }
        Ok(self.schema.key_for(partition, sort))
    }
}
