//! Item storage for a single in-memory table.
//!
//! ```text
//! DashMap<PartitionKey, BTreeMap<SortableAttributeValue, Item>>
//! ```
//!
//! Partitions are independent [`DashMap`] shards; within a partition items are
//! ordered by sort key. Tables without a sort key store each item under a
//! sentinel sort value, one per partition.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use tablegate_model::types::ScalarAttributeType;
use tablegate_model::{AttributeValue, Item, Key};

use crate::schema::KeyAttribute;

/// Errors raised while storing or addressing items.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A required key attribute was not found in the item.
    #[error("missing required key attribute: {attr}")]
    MissingKeyAttribute {
        /// The name of the missing attribute.
        attr: String,
    },
    /// A key attribute has the wrong type.
    #[error("key attribute '{attr}' has wrong type: expected {expected}, got {actual}")]
    InvalidKeyType {
        /// The name of the attribute.
        attr: String,
        /// The expected type descriptor.
        expected: String,
        /// The actual type descriptor.
        actual: String,
    },
}

/// Partition and optional sort key definition of a stored table.
#[derive(Debug, Clone)]
pub struct KeySchema {
    /// Partition (HASH) key.
    pub partition_key: KeyAttribute,
    /// Sort (RANGE) key.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.partition_key.name == name || self.sort_key.as_ref().is_some_and(|k| k.name == name)
    }
}

/// A resolved primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    /// The partition key value.
    pub partition_key: AttributeValue,
    /// The sort key value, for tables that have one.
    pub sort_key: Option<SortableAttributeValue>,
}

impl PrimaryKey {
    /// Render this key back into a store key map.
    #[must_use]
    pub fn to_key(&self, key_schema: &KeySchema) -> Key {
        let mut key = Key::new();
        key.insert(
            key_schema.partition_key.name.clone(),
            self.partition_key.clone(),
        );
        if let (Some(def), Some(value)) = (
            &key_schema.sort_key,
            self.sort_key.as_ref().and_then(SortableAttributeValue::to_attribute_value),
        ) {
            key.insert(def.name.clone(), value);
        }
        key
    }

    fn sort_slot(&self) -> &SortableAttributeValue {
        self.sort_key
            .as_ref()
            .unwrap_or(&SortableAttributeValue::Sentinel)
    }
}

/// Key-eligible attribute value with a total order, usable as a `BTreeMap` key.
///
/// Strings order by bytes, numbers numerically, binaries by bytes.
#[derive(Debug, Clone)]
pub enum SortableAttributeValue {
    /// String sort key.
    S(String),
    /// Number sort key, kept in its original string form.
    N(String),
    /// Binary sort key.
    B(bytes::Bytes),
    /// Placeholder for tables without a sort key.
    Sentinel,
}

impl SortableAttributeValue {
    /// Convert back into an [`AttributeValue`]; `None` for the sentinel.
    #[must_use]
    pub fn to_attribute_value(&self) -> Option<AttributeValue> {
        match self {
            Self::S(s) => Some(AttributeValue::S(s.clone())),
            Self::N(n) => Some(AttributeValue::N(n.clone())),
            Self::B(b) => Some(AttributeValue::B(b.clone())),
            Self::Sentinel => None,
        }
    }

    /// Wrap a key attribute value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKeyType` if `value` is not S, N or B.
    pub fn from_attribute_value(
        attr_name: &str,
        value: &AttributeValue,
    ) -> Result<Self, StorageError> {
        match value {
            AttributeValue::S(s) => Ok(Self::S(s.clone())),
            AttributeValue::N(n) => Ok(Self::N(n.clone())),
            AttributeValue::B(b) => Ok(Self::B(b.clone())),
            other => Err(StorageError::InvalidKeyType {
                attr: attr_name.to_owned(),
                expected: "S, N, or B".to_owned(),
                actual: other.type_descriptor().to_owned(),
            }),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::S(_) => 0,
            Self::N(_) => 1,
            Self::B(_) => 2,
            Self::Sentinel => 3,
        }
    }
}

impl PartialEq for SortableAttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortableAttributeValue {}

impl PartialOrd for SortableAttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableAttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => {
                let fa = a.parse::<f64>().unwrap_or(f64::NAN);
                let fb = b.parse::<f64>().unwrap_or(f64::NAN);
                fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
            }
            (Self::B(a), Self::B(b)) => a.as_ref().cmp(b.as_ref()),
            // Mixed variants never share a partition; order them by kind.
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// In-memory item storage for one table.
#[derive(Debug)]
pub struct TableStorage {
    data: DashMap<AttributeValue, BTreeMap<SortableAttributeValue, Item>>,
    key_schema: KeySchema,
    item_count: AtomicU64,
}

impl TableStorage {
    /// Create empty storage for `key_schema`.
    #[must_use]
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            data: DashMap::new(),
            key_schema,
            item_count: AtomicU64::new(0),
        }
    }

    /// The table's key schema.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Number of stored items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.item_count.load(AtomicOrdering::Relaxed)
    }

    /// Insert or replace an item, returning the replaced item.
    ///
    /// # Errors
    ///
    /// Fails when a key attribute is missing or has the wrong type.
    pub fn put_item(&self, item: Item) -> Result<Option<Item>, StorageError> {
        let primary_key = extract_primary_key(&self.key_schema, &item)?;
        let sort_key = primary_key
            .sort_key
            .unwrap_or(SortableAttributeValue::Sentinel);

        let old = self
            .data
            .entry(primary_key.partition_key)
            .or_default()
            .insert(sort_key, item);

        if old.is_none() {
            self.item_count.fetch_add(1, AtomicOrdering::Relaxed);
            debug!("inserted new item");
        } else {
            debug!("replaced existing item");
        }
        Ok(old)
    }

    /// Fetch an item by primary key.
    #[must_use]
    pub fn get_item(&self, key: &PrimaryKey) -> Option<Item> {
        self.data
            .get(&key.partition_key)
            .and_then(|partition| partition.get(key.sort_slot()).cloned())
    }

    /// Delete an item by primary key, returning it if it existed.
    pub fn delete_item(&self, key: &PrimaryKey) -> Option<Item> {
        let removed = self
            .data
            .get_mut(&key.partition_key)?
            .remove(key.sort_slot())?;
        self.item_count.fetch_sub(1, AtomicOrdering::Relaxed);
        debug!("deleted item");
        Some(removed)
    }

    /// Read items of one partition in sort-key order.
    ///
    /// Returns the page and, when `limit` was reached, the key to resume from.
    #[must_use]
    pub fn query(
        &self,
        partition_key: &AttributeValue,
        scan_forward: bool,
        limit: Option<usize>,
        exclusive_start_key: Option<&SortableAttributeValue>,
    ) -> (Vec<Item>, Option<PrimaryKey>) {
        let Some(partition) = self.data.get(partition_key) else {
            return (Vec::new(), None);
        };

        let take = limit.unwrap_or(usize::MAX);
        let page: Vec<(&SortableAttributeValue, &Item)> = match (scan_forward, exclusive_start_key)
        {
            (true, Some(start)) => partition
                .range((Bound::Excluded(start.clone()), Bound::Unbounded))
                .take(take)
                .collect(),
            (true, None) => partition.iter().take(take).collect(),
            (false, Some(start)) => partition
                .range((Bound::Unbounded, Bound::Excluded(start.clone())))
                .rev()
                .take(take)
                .collect(),
            (false, None) => partition.iter().rev().take(take).collect(),
        };

        let last_key = match (limit, page.last()) {
            (Some(limit), Some((sort_key, _))) if page.len() >= limit => Some(PrimaryKey {
                partition_key: partition_key.clone(),
                sort_key: self
                    .key_schema
                    .sort_key
                    .as_ref()
                    .map(|_| (*sort_key).clone()),
            }),
            _ => None,
        };

        let items = page.into_iter().map(|(_, item)| item.clone()).collect();
        (items, last_key)
    }

    /// Read items across all partitions in a stable order.
    ///
    /// Returns the page and, when more items remain, the key to resume from.
    #[must_use]
    pub fn scan(
        &self,
        limit: Option<usize>,
        exclusive_start_key: Option<&PrimaryKey>,
    ) -> (Vec<Item>, Option<PrimaryKey>) {
        let mut all: Vec<(AttributeValue, SortableAttributeValue, Item)> = Vec::new();
        let mut partitions: Vec<_> = self.data.iter().collect();
        partitions.sort_by(|a, b| a.key().to_string().cmp(&b.key().to_string()));
        for entry in &partitions {
            for (sort_key, item) in entry.value() {
                all.push((entry.key().clone(), sort_key.clone(), item.clone()));
            }
        }
        drop(partitions);

        let start = exclusive_start_key.map_or(0, |start| {
            all.iter()
                .position(|(pk, sk, _)| *pk == start.partition_key && sk == start.sort_slot())
                .map_or(0, |idx| idx + 1)
        });
        let take = limit.unwrap_or(usize::MAX);
        let has_more = start.saturating_add(take) < all.len();

        let page: Vec<_> = all.into_iter().skip(start).take(take).collect();
        let last_key = if has_more {
            page.last().map(|(pk, sk, _)| PrimaryKey {
                partition_key: pk.clone(),
                sort_key: self.key_schema.sort_key.as_ref().map(|_| sk.clone()),
            })
        } else {
            None
        };

        let items = page.into_iter().map(|(_, _, item)| item).collect();
        (items, last_key)
    }
}

/// Extract and validate the primary key of `item`.
///
/// # Errors
///
/// Fails when a key attribute is missing or has the wrong type.
pub fn extract_primary_key(key_schema: &KeySchema, item: &Item) -> Result<PrimaryKey, StorageError> {
    let partition_def = &key_schema.partition_key;
    let partition = item
        .get(&partition_def.name)
        .ok_or_else(|| StorageError::MissingKeyAttribute {
            attr: partition_def.name.clone(),
        })?;
    validate_key_type(&partition_def.name, partition_def.attr_type, partition)?;

    let sort_key = match &key_schema.sort_key {
        Some(def) => {
            let value = item
                .get(&def.name)
                .ok_or_else(|| StorageError::MissingKeyAttribute {
                    attr: def.name.clone(),
                })?;
            validate_key_type(&def.name, def.attr_type, value)?;
            Some(SortableAttributeValue::from_attribute_value(&def.name, value)?)
        }
        None => None,
    };

    Ok(PrimaryKey {
        partition_key: partition.clone(),
        sort_key,
    })
}

fn validate_key_type(
    attr_name: &str,
    expected: ScalarAttributeType,
    value: &AttributeValue,
) -> Result<(), StorageError> {
    if expected.matches(value) {
        Ok(())
    } else {
        Err(StorageError::InvalidKeyType {
            attr: attr_name.to_owned(),
            expected: expected.as_str().to_owned(),
            actual: value.type_descriptor().to_owned(),
        })
    }
}
