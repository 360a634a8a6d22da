//! [`MemoryStore`]: both client traits served from process memory.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use tablegate_model::input::{
    BatchWriteItemInput, CreateTableInput, DeleteItemInput, DescribeTableInput, GetItemInput,
    PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use tablegate_model::output::{
    BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput, DescribeTableOutput, GetItemOutput,
    PutItemOutput, QueryOutput, ScanOutput, UpdateItemOutput,
};
use tablegate_model::types::{BillingMode, KeyType, TableStatus};
use tablegate_model::{Item, StoreError};

use super::expression::{apply_update, parse_key_condition, parse_update_expression};
use super::state::{MemoryTable, StoreState};
use super::storage::{KeySchema, PrimaryKey, SortableAttributeValue, extract_primary_key};
use crate::client::{AdminClient, DataClient};
use crate::config::MAX_BATCH_WRITE_ITEMS;
use crate::error::{expression_error_to_store, storage_error_to_store};
use crate::schema::KeyAttribute;

/// An in-memory document store.
///
/// Cloning is cheap and clones share tables.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use tablegate_core::memory::MemoryStore;
/// use tablegate_core::{TableConfig, TableFactory};
///
/// let store = Arc::new(MemoryStore::new());
/// let factory = TableFactory::new(store.clone(), store, TableConfig::default());
/// # let _ = factory;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<StoreState>,
    activation_describes: u32,
}

impl MemoryStore {
    /// Create an empty store whose tables are active immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report newly created tables as `CREATING` for the first `describes`
    /// describe calls.
    #[must_use]
    pub fn with_activation_delay(mut self, describes: u32) -> Self {
        self.activation_describes = describes;
        self
    }

    /// Sorted names of all tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.state.table_names()
    }

    /// Require a table that accepts item traffic.
    fn active_table(&self, name: &str) -> Result<Arc<MemoryTable>, StoreError> {
        let table = self.state.require_table(name)?;
        if table.status() == TableStatus::Active {
            Ok(table)
        } else {
            Err(StoreError::resource_not_found(format!(
                "Requested resource not found: Table: {name} is {}",
                table.status()
            )))
        }
    }
}

/// Derive the storage key schema from a create request.
fn parse_key_schema(input: &CreateTableInput) -> Result<KeySchema, StoreError> {
    let attribute = |name: &str| {
        input
            .attribute_definitions
            .iter()
            .find(|d| d.attribute_name == name)
            .map(|d| KeyAttribute::new(name, d.attribute_type))
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "One or more parameter values were invalid: Some index key attributes are \
                     not defined in AttributeDefinitions. Keys: [{name}]"
                ))
            })
    };

    let mut partition_key = None;
    let mut sort_key = None;
    for element in &input.key_schema {
        let slot = match element.key_type {
            KeyType::Hash => &mut partition_key,
            KeyType::Range => &mut sort_key,
        };
        if slot.is_some() {
            return Err(StoreError::validation(format!(
                "Too many {} keys in KeySchema",
                element.key_type
            )));
        }
        *slot = Some(attribute(&element.attribute_name)?);
    }

    let partition_key = partition_key.ok_or_else(|| {
        StoreError::validation("No Hash Key specified in schema. All tables must have a hash key")
    })?;
    Ok(KeySchema {
        partition_key,
        sort_key,
    })
}

/// Validate that `key` addresses exactly one item and resolve it.
fn resolve_key(key_schema: &KeySchema, key: &Item) -> Result<PrimaryKey, StoreError> {
    if key.keys().any(|name| !key_schema.is_key_attribute(name)) {
        return Err(StoreError::validation(
            "The provided key element does not match the schema",
        ));
    }
    extract_primary_key(key_schema, key).map_err(storage_error_to_store)
}

/// A validated batch write, applied once the whole batch checks out.
enum PlannedWrite {
    Put(Item),
    Delete(PrimaryKey),
}

fn page_count(items: &[Item]) -> i32 {
    i32::try_from(items.len()).unwrap_or(i32::MAX)
}

fn page_limit(limit: Option<i32>) -> Result<Option<usize>, StoreError> {
    match limit {
        None => Ok(None),
        Some(n) if n > 0 => Ok(usize::try_from(n).ok()),
        Some(_) => Err(StoreError::validation(
            "1 validation error detected: Value at 'limit' failed to satisfy constraint: \
             Member must have value greater than or equal to 1",
        )),
    }
}

#[async_trait]
impl AdminClient for MemoryStore {
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, StoreError> {
        let table = self.state.require_table(&input.table_name)?;
        let description = table.to_description();
        table.observe_describe();
        Ok(DescribeTableOutput {
            table: Some(description),
        })
    }

    async fn create_table(&self, input: CreateTableInput) -> Result<CreateTableOutput, StoreError> {
        if input.table_name.is_empty() {
            return Err(StoreError::validation("TableName must not be empty"));
        }
        if input.billing_mode == Some(BillingMode::Provisioned)
            && input.provisioned_throughput.is_none()
        {
            return Err(StoreError::validation(
                "One or more parameter values were invalid: ReadCapacityUnits and \
                 WriteCapacityUnits must both be specified when BillingMode is PROVISIONED",
            ));
        }
        let key_schema = parse_key_schema(&input)?;
        let table = MemoryTable::new(
            input.table_name,
            input.key_schema,
            input.attribute_definitions,
            key_schema,
            self.activation_describes,
        );
        let table = self.state.create_table(table)?;
        info!(table = %table.name, status = %table.status(), "created in-memory table");
        Ok(CreateTableOutput {
            table_description: Some(table.to_description()),
        })
    }
}

#[async_trait]
impl DataClient for MemoryStore {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        let key = resolve_key(table.storage.key_schema(), &input.key)?;
        Ok(GetItemOutput {
            item: table.storage.get_item(&key),
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        table
            .storage
            .put_item(input.item)
            .map_err(storage_error_to_store)?;
        Ok(PutItemOutput {})
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        let key_schema = table.storage.key_schema();
        let key = resolve_key(key_schema, &input.key)?;

        let expression = input
            .update_expression
            .as_deref()
            .ok_or_else(|| StoreError::validation("UpdateExpression is required"))?;
        let actions = parse_update_expression(
            expression,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(expression_error_to_store)?;

        if let Some(action) = actions
            .iter()
            .find(|a| key_schema.is_key_attribute(a.attribute()))
        {
            return Err(StoreError::validation(format!(
                "One or more parameter values were invalid: Cannot update attribute {}. This \
                 attribute is part of the key",
                action.attribute()
            )));
        }

        let mut item = table.storage.get_item(&key).unwrap_or(input.key);
        apply_update(&mut item, actions);
        table
            .storage
            .put_item(item.clone())
            .map_err(storage_error_to_store)?;
        debug!(table = %table.name, "applied update expression");

        Ok(UpdateItemOutput { attributes: item })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        let key = resolve_key(table.storage.key_schema(), &input.key)?;
        table.storage.delete_item(&key);
        Ok(DeleteItemOutput {})
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        let key_schema = table.storage.key_schema();

        let expression = input
            .key_condition_expression
            .as_deref()
            .ok_or_else(|| StoreError::validation("KeyConditionExpression is required"))?;
        let (attr, value) = parse_key_condition(
            expression,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(expression_error_to_store)?;
        if attr != key_schema.partition_key.name {
            return Err(StoreError::validation(format!(
                "Query condition missed key schema element: {}",
                key_schema.partition_key.name
            )));
        }
        if !key_schema.partition_key.attr_type.matches(&value) {
            return Err(StoreError::validation(
                "One or more parameter values were invalid: Condition parameter type does not \
                 match schema type",
            ));
        }

        let start = if input.exclusive_start_key.is_empty() {
            None
        } else {
            let start = resolve_key(key_schema, &input.exclusive_start_key)?;
            Some(start.sort_key.unwrap_or(SortableAttributeValue::Sentinel))
        };

        let (items, last) = table.storage.query(
            &value,
            input.scan_index_forward.unwrap_or(true),
            page_limit(input.limit)?,
            start.as_ref(),
        );
        Ok(QueryOutput {
            count: page_count(&items),
            items,
            last_evaluated_key: last.map(|k| k.to_key(key_schema)).unwrap_or_default(),
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, StoreError> {
        let table = self.active_table(&input.table_name)?;
        let key_schema = table.storage.key_schema();

        let start = if input.exclusive_start_key.is_empty() {
            None
        } else {
            Some(resolve_key(key_schema, &input.exclusive_start_key)?)
        };

        let (items, last) = table
            .storage
            .scan(page_limit(input.limit)?, start.as_ref());
        Ok(ScanOutput {
            count: page_count(&items),
            items,
            last_evaluated_key: last.map(|k| k.to_key(key_schema)).unwrap_or_default(),
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, StoreError> {
        let total = input.len();
        if total == 0 {
            return Err(StoreError::validation(
                "1 validation error detected: Value at 'requestItems' failed to satisfy \
                 constraint: Member must have length greater than or equal to 1",
            ));
        }
        if total > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::validation(format!(
                "Too many items requested for the BatchWriteItem call: {total} > \
                 {MAX_BATCH_WRITE_ITEMS}"
            )));
        }

        // Validate everything before applying anything.
        let mut planned = Vec::with_capacity(total);
        for (table_name, requests) in input.request_items {
            let table = self.active_table(&table_name)?;
            for request in requests {
                match (request.put_request, request.delete_request) {
                    (Some(put), None) => {
                        extract_primary_key(table.storage.key_schema(), &put.item)
                            .map_err(storage_error_to_store)?;
                        planned.push((Arc::clone(&table), PlannedWrite::Put(put.item)));
                    }
                    (None, Some(delete)) => {
                        let key = resolve_key(table.storage.key_schema(), &delete.key)?;
                        planned.push((Arc::clone(&table), PlannedWrite::Delete(key)));
                    }
                    _ => {
                        return Err(StoreError::validation(
                            "Supplied WriteRequest must contain exactly one of PutRequest or \
                             DeleteRequest",
                        ));
                    }
                }
            }
        }

        for (table, write) in planned {
            match write {
                PlannedWrite::Put(item) => {
                    table
                        .storage
                        .put_item(item)
                        .map_err(storage_error_to_store)?;
                }
                PlannedWrite::Delete(key) => {
                    table.storage.delete_item(&key);
                }
            }
        }
        debug!(writes = total, "applied batch write");

        Ok(BatchWriteItemOutput::default())
    }
}
