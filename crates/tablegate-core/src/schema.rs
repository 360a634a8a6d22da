//! Table schema descriptors.
//!
//! A [`TableSchema`] names the table, its key attributes, and where the seed
//! data for a freshly created table comes from. It is immutable once handed to
//! a [`TableHandle`](crate::table::TableHandle) and shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use tablegate_model::input::CreateTableInput;
use tablegate_model::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType,
};
use tablegate_model::{AttributeValue, Item, Key};

/// A key attribute definition with its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type (S, N, or B).
    pub attr_type: ScalarAttributeType,
}

impl KeyAttribute {
    /// Create a key attribute of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, attr_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
        }
    }

    /// A string-typed key attribute.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ScalarAttributeType::S)
    }

    /// A number-typed key attribute.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ScalarAttributeType::N)
    }

    /// A binary-typed key attribute.
    #[must_use]
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, ScalarAttributeType::B)
    }
}

/// Zero-argument producer of seed items. Returning `None` skips seeding.
pub type ItemProducer = Arc<dyn Fn() -> Option<Vec<Item>> + Send + Sync>;

/// Source of the items written into a table right after it is created.
#[derive(Clone)]
pub enum InitialData {
    /// A fixed collection.
    Items(Vec<Item>),
    /// A producer invoked once per seeding.
    Producer(ItemProducer),
}

impl InitialData {
    /// Resolve the source into concrete items, invoking the producer if any.
    #[must_use]
    pub fn resolve(&self) -> Option<Vec<Item>> {
        match self {
            Self::Items(items) => Some(items.clone()),
            Self::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for InitialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Items(items) => f.debug_tuple("Items").field(&items.len()).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Static definition of a table managed by the access layer.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name in the store.
    pub table_name: String,
    /// Partition (HASH) key.
    pub key: KeyAttribute,
    /// Optional sort (RANGE) key.
    pub range_key: Option<KeyAttribute>,
    /// Billing mode requested at creation.
    pub billing_mode: BillingMode,
    /// Throughput requested at creation when billing mode is provisioned.
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Seed data written after the table is created.
    pub initial_data: Option<InitialData>,
}

impl TableSchema {
    /// Create an on-demand schema with a partition key only.
    #[must_use]
    pub fn new(table_name: impl Into<String>, key: KeyAttribute) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            range_key: None,
            billing_mode: BillingMode::PayPerRequest,
            provisioned_throughput: None,
            initial_data: None,
        }
    }

    /// Add a sort key.
    #[must_use]
    pub fn with_range_key(mut self, range_key: KeyAttribute) -> Self {
        self.range_key = Some(range_key);
        self
    }

    /// Seed the table from a fixed collection.
    #[must_use]
    pub fn with_initial_items(mut self, items: Vec<Item>) -> Self {
        self.initial_data = Some(InitialData::Items(items));
        self
    }

    /// Seed the table from a producer invoked at creation time.
    #[must_use]
    pub fn with_initial_data_fn<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> Option<Vec<Item>> + Send + Sync + 'static,
    {
        self.initial_data = Some(InitialData::Producer(Arc::new(produce)));
        self
    }

    /// Switch to provisioned billing with the given capacity.
    #[must_use]
    pub fn with_provisioned_throughput(mut self, read: i64, write: i64) -> Self {
        self.billing_mode = BillingMode::Provisioned;
        self.provisioned_throughput = Some(ProvisionedThroughput {
            read_capacity_units: read,
            write_capacity_units: write,
        });
        self
    }

    /// Names of the key attributes, partition key first.
    #[must_use]
    pub fn key_names(&self) -> Vec<&str> {
        std::iter::once(self.key.name.as_str())
            .chain(self.range_key.as_ref().map(|k| k.name.as_str()))
            .collect()
    }

    /// Build the primary key for an item.
    ///
    /// The sort value is only used when the schema defines a sort key.
    #[must_use]
    pub fn key_for(&self, partition: AttributeValue, sort: Option<AttributeValue>) -> Key {
        let mut key = Key::new();
        key.insert(self.key.name.clone(), partition);
        if let (Some(range_key), Some(sort)) = (&self.range_key, sort) {
            key.insert(range_key.name.clone(), sort);
        }
        key
    }

    /// Extract the primary key attributes present in `item`.
    #[must_use]
    pub fn key_of(&self, item: &Item) -> Key {
        self.key_names()
            .into_iter()
            .filter_map(|name| item.get(name).map(|v| (name.to_owned(), v.clone())))
            .collect()
    }

    /// Render the full create-table request for this schema.
    #[must_use]
    pub fn to_create_table_input(&self) -> CreateTableInput {
        let mut key_schema = vec![KeySchemaElement {
            attribute_name: self.key.name.clone(),
            key_type: KeyType::Hash,
        }];
        let mut attribute_definitions = vec![AttributeDefinition {
            attribute_name: self.key.name.clone(),
            attribute_type: self.key.attr_type,
        }];

        if let Some(range_key) = &self.range_key {
            key_schema.push(KeySchemaElement {
                attribute_name: range_key.name.clone(),
                key_type: KeyType::Range,
            });
            attribute_definitions.push(AttributeDefinition {
                attribute_name: range_key.name.clone(),
                attribute_type: range_key.attr_type,
            });
        }

        CreateTableInput {
            table_name: self.table_name.clone(),
            key_schema,
            attribute_definitions,
            billing_mode: Some(self.billing_mode.clone()),
            provisioned_throughput: self.provisioned_throughput.clone(),
        }
    }
}
