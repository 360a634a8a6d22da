//! Batch write request rendering.
//!
//! [`BatchRequestBuilder`] accumulates puts and deletes across tables and
//! renders them into store-native `BatchWriteItem` requests, splitting the
//! writes so that no request exceeds the store's per-request ceiling.

use std::fmt;

use tablegate_model::Item;
use tablegate_model::input::BatchWriteItemInput;
use tablegate_model::types::{DeleteRequest, PutRequest, WriteRequest};

use crate::config::MAX_BATCH_WRITE_ITEMS;

/// What a batch entry does to its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    /// Put the item.
    Add,
    /// Delete the item; the entry is used as the primary key.
    Delete,
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Accumulates write requests and renders them as batch payloads.
#[derive(Debug, Clone)]
pub struct BatchRequestBuilder {
    entries: Vec<(String, WriteRequest)>,
    chunk_size: usize,
}

impl Default for BatchRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRequestBuilder {
    /// Create an empty builder rendering up to 25 writes per request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            chunk_size: MAX_BATCH_WRITE_ITEMS,
        }
    }

    /// Set the number of writes per rendered request, clamped to `1..=25`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_BATCH_WRITE_ITEMS);
        self
    }

    /// Queue `items` against `table_name`.
    pub fn add_items<I>(&mut self, table_name: &str, items: I, action: BatchAction) -> &mut Self
    where
        I: IntoIterator<Item = Item>,
    {
        for item in items {
            let request = match action {
                BatchAction::Add => WriteRequest {
                    put_request: Some(PutRequest { item }),
                    delete_request: None,
                },
                BatchAction::Delete => WriteRequest {
                    put_request: None,
                    delete_request: Some(DeleteRequest { key: item }),
                },
            };
            self.entries.push((table_name.to_owned(), request));
        }
        self
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the queued writes, in insertion order, as one or more requests.
    ///
    /// An empty builder renders no requests.
    #[must_use]
    pub fn render_requests(&self) -> Vec<BatchWriteItemInput> {
        self.entries
            .chunks(self.chunk_size)
            .map(|chunk| {
                let mut input = BatchWriteItemInput::default();
                for (table_name, request) in chunk {
                    input
                        .request_items
                        .entry(table_name.clone())
                        .or_default()
                        .push(request.clone());
                }
                input
            })
            .collect()
    }
}
