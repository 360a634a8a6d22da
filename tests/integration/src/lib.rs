//! End-to-end tests for tablegate table handles.
//!
//! Every scenario runs against [`MemoryStore`] wrapped in a [`CountingClient`]
//! that records how often each store operation was called and can make probes
//! fail on demand. No external service is needed:
//! ```text
//! cargo test -p tablegate-integration
//! ```

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use tablegate_core::memory::MemoryStore;
use tablegate_core::{AdminClient, DataClient, TableConfig, TableFactory};
use tablegate_model::input::{
    BatchWriteItemInput, CreateTableInput, DeleteItemInput, DescribeTableInput, GetItemInput,
    PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use tablegate_model::output::{
    BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput, DescribeTableOutput, GetItemOutput,
    PutItemOutput, QueryOutput, ScanOutput, UpdateItemOutput,
};
use tablegate_model::{StoreError, StoreErrorCode};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Store operation counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    /// `DescribeTable` calls.
    pub describe: AtomicUsize,
    /// `CreateTable` calls.
    pub create: AtomicUsize,
    /// `GetItem` calls.
    pub get: AtomicUsize,
    /// `PutItem` calls.
    pub put: AtomicUsize,
    /// `UpdateItem` calls.
    pub update: AtomicUsize,
    /// `DeleteItem` calls.
    pub delete: AtomicUsize,
    /// `Query` calls.
    pub query: AtomicUsize,
    /// `Scan` calls.
    pub scan: AtomicUsize,
    /// `BatchWriteItem` calls.
    pub batch: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Read a counter.
#[must_use]
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Store client that counts calls and injects probe failures.
#[derive(Debug)]
pub struct CountingClient {
    inner: MemoryStore,
    /// Per-operation call counts.
    pub calls: CallCounts,
    probe_fault: Mutex<Option<StoreErrorCode>>,
    create_delay: Duration,
    page_size: Option<i32>,
}

impl CountingClient {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: CallCounts::default(),
            probe_fault: Mutex::new(None),
            create_delay: Duration::ZERO,
            page_size: None,
        }
    }

    /// Sleep this long inside every `CreateTable`, widening race windows.
    #[must_use]
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Cap every `Query` and `Scan` page at `size` items unless the caller
    /// already set a limit.
    #[must_use]
    pub fn with_page_size(mut self, size: i32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Make every `DescribeTable` fail with `code` until cleared.
    pub fn fail_probes_with(&self, code: Option<StoreErrorCode>) {
        *self.probe_fault.lock() = code;
    }

    /// The wrapped store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl AdminClient for CountingClient {
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, StoreError> {
        bump(&self.calls.describe);
        let fault = *self.probe_fault.lock();
        if let Some(code) = fault {
            debug!(table = %input.table_name, %code, "injecting probe failure");
            return Err(StoreError::with_message(code, "injected probe failure"));
        }
        self.inner.describe_table(input).await
    }

    async fn create_table(&self, input: CreateTableInput) -> Result<CreateTableOutput, StoreError> {
        bump(&self.calls.create);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.inner.create_table(input).await
    }
}

#[async_trait]
impl DataClient for CountingClient {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, StoreError> {
        bump(&self.calls.get);
        self.inner.get_item(input).await
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, StoreError> {
        bump(&self.calls.put);
        self.inner.put_item(input).await
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError> {
        bump(&self.calls.update);
        self.inner.update_item(input).await
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, StoreError> {
        bump(&self.calls.delete);
        self.inner.delete_item(input).await
    }

    async fn query(&self, mut input: QueryInput) -> Result<QueryOutput, StoreError> {
        bump(&self.calls.query);
        input.limit = input.limit.or(self.page_size);
        self.inner.query(input).await
    }

    async fn scan(&self, mut input: ScanInput) -> Result<ScanOutput, StoreError> {
        bump(&self.calls.scan);
        input.limit = input.limit.or(self.page_size);
        self.inner.scan(input).await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, StoreError> {
        bump(&self.calls.batch);
        self.inner.batch_write_item(input).await
    }
}

/// A counting client over a fresh store and a factory using it.
#[must_use]
pub fn counting_factory(config: TableConfig) -> (Arc<CountingClient>, TableFactory) {
    counting_factory_with(CountingClient::new(MemoryStore::new()), config)
}

/// A factory over an existing counting client.
#[must_use]
pub fn counting_factory_with(
    client: CountingClient,
    config: TableConfig,
) -> (Arc<CountingClient>, TableFactory) {
    init_tracing();
    let client = Arc::new(client);
    let factory = TableFactory::new(client.clone(), client.clone(), config);
    (client, factory)
}

mod test_operations;
mod test_provisioning;
mod test_query;
