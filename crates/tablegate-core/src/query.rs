//! Dual-mode query dispatch.
//!
//! A [`QueryDescriptor`] with a partition key runs an indexed store query;
//! without one, the whole table is scanned and ordered client-side.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use tablegate_model::input::{QueryInput, ScanInput};
use tablegate_model::{AttributeValue, Item, StoreError};

use crate::client::DataClient;
use crate::schema::TableSchema;

/// Name placeholder bound to the partition key attribute in indexed queries.
const KEY_PLACEHOLDER: &str = "#key";
/// Value placeholder bound to the partition key value in indexed queries.
const VALUE_PLACEHOLDER: &str = ":value";

/// Caller-supplied query parameters.
///
/// # Examples
///
/// ```
/// use tablegate_core::query::{QueryDescriptor, QueryMode};
///
/// let descriptor = QueryDescriptor::new().order_by("score").descending().max(10);
/// assert_eq!(descriptor.mode(), QueryMode::Scan);
/// assert_eq!(descriptor.is_ordered, Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Partition key value; selects indexed mode when present.
    pub partition_key: Option<AttributeValue>,
    /// Attribute used for client-side ordering in scan mode.
    pub orderby: Option<String>,
    /// Ascending when `true` or unset; descending when `false`.
    pub is_ordered: Option<bool>,
    /// Result ceiling.
    pub max: Option<usize>,
}

/// Execution strategy selected for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Store-side query by partition key.
    Indexed,
    /// Full scan, ordered and truncated client-side.
    Scan,
}

impl QueryDescriptor {
    /// An empty descriptor (scan mode, store order, no ceiling).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query a single partition.
    #[must_use]
    pub fn partition_key(mut self, value: impl Into<AttributeValue>) -> Self {
        self.partition_key = Some(value.into());
        self
    }

    /// Order scan results by `attr`.
    #[must_use]
    pub fn order_by(mut self, attr: impl Into<String>) -> Self {
        self.orderby = Some(attr.into());
        self
    }

    /// Set the direction explicitly.
    #[must_use]
    pub fn ordered(mut self, ascending: bool) -> Self {
        self.is_ordered = Some(ascending);
        self
    }

    /// Shorthand for `ordered(false)`.
    #[must_use]
    pub fn descending(self) -> Self {
        self.ordered(false)
    }

    /// Return at most `max` items.
    #[must_use]
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// The mode this descriptor runs in.
    #[must_use]
    pub fn mode(&self) -> QueryMode {
        if self.partition_key.is_some() {
            QueryMode::Indexed
        } else {
            QueryMode::Scan
        }
    }
}

/// Run `descriptor` against the table described by `schema`.
pub async fn execute_query(
    client: &dyn DataClient,
    schema: &TableSchema,
    descriptor: &QueryDescriptor,
) -> Result<Vec<Item>, StoreError> {
    let mode = descriptor.mode();
    debug!(table = %schema.table_name, ?mode, "dispatching query");

    match &descriptor.partition_key {
        Some(_) if descriptor.max == Some(0) => Ok(Vec::new()),
        Some(partition) => {
            let input = QueryInput {
                table_name: schema.table_name.clone(),
                key_condition_expression: Some(format!("{KEY_PLACEHOLDER} = {VALUE_PLACEHOLDER}")),
                expression_attribute_names: BTreeMap::from([(
                    KEY_PLACEHOLDER.to_owned(),
                    schema.key.name.clone(),
                )]),
                expression_attribute_values: BTreeMap::from([(
                    VALUE_PLACEHOLDER.to_owned(),
                    partition.clone(),
                )]),
                scan_index_forward: descriptor.is_ordered,
                limit: descriptor.max.map(clamp_limit),
                ..QueryInput::default()
            };
            if let Some(max) = descriptor.max {
                let mut items = client.query(input).await?.items;
                items.truncate(max);
                Ok(items)
            } else {
                query_all(client, input).await
            }
        }
        None => {
            let mut items = scan_all(client, &schema.table_name).await?;
            if let Some(attr) = &descriptor.orderby {
                let descending = descriptor.is_ordered == Some(false);
                items.sort_by(|a, b| {
                    let ord = compare_values(a.get(attr), b.get(attr));
                    if descending { ord.reverse() } else { ord }
                });
            }
            if let Some(max) = descriptor.max {
                items.truncate(max);
            }
            Ok(items)
        }
    }
}

/// Scan every item of `table_name`, following pagination until exhausted.
pub async fn scan_all(client: &dyn DataClient, table_name: &str) -> Result<Vec<Item>, StoreError> {
    let mut items = Vec::new();
    let mut start_key = BTreeMap::new();
    loop {
        let page = client
            .scan(ScanInput {
                table_name: table_name.to_owned(),
                limit: None,
                exclusive_start_key: start_key,
            })
            .await?;
        items.extend(page.items);
        if page.last_evaluated_key.is_empty() {
            return Ok(items);
        }
        start_key = page.last_evaluated_key;
    }
}

/// Run `input` as a query, following pagination until exhausted.
pub async fn query_all(client: &dyn DataClient, input: QueryInput) -> Result<Vec<Item>, StoreError> {
    let mut items = Vec::new();
    let mut input = input;
    loop {
        let page = client.query(input.clone()).await?;
        items.extend(page.items);
        if page.last_evaluated_key.is_empty() {
            return Ok(items);
        }
        input.exclusive_start_key = page.last_evaluated_key;
    }
}

/// Three-way comparison used for scan-mode ordering.
///
/// Values of different kinds order by kind: missing or `NULL`, then booleans
/// (`false < true`), numbers (numerically, unparseable ones last and by
/// text), strings (lexicographically), and finally every other kind, which
/// all compare equal so the stable sort keeps their store order.
#[must_use]
pub fn compare_values(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> Ordering {
    match (a, b) {
        (Some(AttributeValue::N(x)), Some(AttributeValue::N(y))) => compare_numbers(x, y),
        (Some(AttributeValue::S(x)), Some(AttributeValue::S(y))) => x.cmp(y),
        (Some(AttributeValue::Bool(x)), Some(AttributeValue::Bool(y))) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: Option<&AttributeValue>) -> u8 {
    match value {
        None | Some(AttributeValue::Null(_)) => 0,
        Some(AttributeValue::Bool(_)) => 1,
        Some(AttributeValue::N(_)) => 2,
        Some(AttributeValue::S(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_numbers(x: &str, y: &str) -> Ordering {
    match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) if !a.is_nan() && !b.is_nan() => {
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Ok(a), _) if !a.is_nan() => Ordering::Less,
        (_, Ok(b)) if !b.is_nan() => Ordering::Greater,
        _ => x.cmp(y),
    }
}

fn clamp_limit(max: usize) -> i32 {
    i32::try_from(max).unwrap_or(i32::MAX)
}
