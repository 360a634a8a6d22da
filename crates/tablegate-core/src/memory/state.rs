//! Table registry of the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use tablegate_model::StoreError;
use tablegate_model::types::{AttributeDefinition, KeySchemaElement, TableDescription, TableStatus};

use super::storage::{KeySchema, TableStorage};

/// All tables of a store, keyed by name.
#[derive(Debug, Default)]
pub struct StoreState {
    tables: DashMap<String, Arc<MemoryTable>>,
}

impl StoreState {
    /// Look up a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Arc<MemoryTable>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Look up a table or fail with `ResourceNotFoundException`.
    pub fn require_table(&self, name: &str) -> Result<Arc<MemoryTable>, StoreError> {
        self.get_table(name).ok_or_else(|| {
            StoreError::resource_not_found(format!(
                "Requested resource not found: Table: {name} not found"
            ))
        })
    }

    /// Register a new table, failing with `ResourceInUseException` if the
    /// name is taken.
    pub fn create_table(&self, table: MemoryTable) -> Result<Arc<MemoryTable>, StoreError> {
        match self.tables.entry(table.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(StoreError::resource_in_use(
                format!("Table already exists: {}", e.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let table = Arc::new(table);
                e.insert(Arc::clone(&table));
                Ok(table)
            }
        }
    }

    /// Sorted names of all tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

/// A table with its metadata and item storage.
#[derive(Debug)]
pub struct MemoryTable {
    /// Table name.
    pub name: String,
    /// Key schema elements as requested at creation.
    pub key_schema_elements: Vec<KeySchemaElement>,
    /// Attribute definitions as requested at creation.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Stable table ID (UUID v4), assigned at creation.
    pub table_id: String,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Item storage.
    pub storage: TableStorage,
    status: RwLock<TableStatus>,
    pending_describes: AtomicU32,
}

impl MemoryTable {
    /// Create table metadata around fresh storage.
    ///
    /// The table reports `CREATING` for the first `activation_describes`
    /// describe calls, then `ACTIVE`.
    #[must_use]
    pub fn new(
        name: String,
        key_schema_elements: Vec<KeySchemaElement>,
        attribute_definitions: Vec<AttributeDefinition>,
        key_schema: KeySchema,
        activation_describes: u32,
    ) -> Self {
        let status = if activation_describes == 0 {
            TableStatus::Active
        } else {
            TableStatus::Creating
        };
        Self {
            name,
            key_schema_elements,
            attribute_definitions,
            table_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
            storage: TableStorage::new(key_schema),
            status: RwLock::new(status),
            pending_describes: AtomicU32::new(activation_describes),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TableStatus {
        self.status.read().clone()
    }

    /// Count one describe call towards activation.
    pub fn observe_describe(&self) {
        let prev = self
            .pending_describes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if prev == Ok(1) {
            *self.status.write() = TableStatus::Active;
        }
    }

    /// Build the table's description.
    #[must_use]
    pub fn to_description(&self) -> TableDescription {
        #[allow(clippy::cast_precision_loss)] // epoch seconds are reported as f64
        let creation_time = self.created_at.timestamp() as f64;
        TableDescription {
            table_name: Some(self.name.clone()),
            table_status: Some(self.status()),
            key_schema: self.key_schema_elements.clone(),
            attribute_definitions: self.attribute_definitions.clone(),
            table_id: Some(self.table_id.clone()),
            creation_date_time: Some(creation_time),
            item_count: Some(i64::try_from(self.storage.item_count()).unwrap_or(i64::MAX)),
        }
    }
}
