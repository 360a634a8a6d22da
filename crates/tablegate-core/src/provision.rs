//! Lazy table provisioning.
//!
//! Before any guarded operation the [`Provisioner`] makes sure the table
//! exists: a describe probe on the fast path, and on a miss a single-flight
//! create, activation wait and seed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tablegate_model::{StoreError, StoreErrorCode};
use tablegate_model::input::DescribeTableInput;
use tablegate_model::types::TableStatus;

use crate::batch::{BatchAction, BatchRequestBuilder};
use crate::client::{SharedAdminClient, SharedDataClient};
use crate::config::{ProbePolicy, TableConfig};
use crate::error::{TableError, TableResult};
use crate::schema::{InitialData, TableSchema};

/// Per-table provisioning locks shared by all handles of one factory.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProvisionLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ProvisionLocks {
    fn lock_for(&self, table_name: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.inner.get(table_name) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.inner
                .entry(table_name.to_owned())
                .or_default()
                .value(),
        )
    }
}

/// Outcome of an existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Present,
    Absent,
}

/// Ensures tables exist, creating and seeding them on first use.
#[derive(Debug, Clone)]
pub(crate) struct Provisioner {
    admin: SharedAdminClient,
    data: SharedDataClient,
    config: Arc<TableConfig>,
    locks: ProvisionLocks,
}

impl Provisioner {
    pub(crate) fn new(
        admin: SharedAdminClient,
        data: SharedDataClient,
        config: Arc<TableConfig>,
        locks: ProvisionLocks,
    ) -> Self {
        Self {
            admin,
            data,
            config,
            locks,
        }
    }

    /// Make sure the table of `schema` exists.
    ///
    /// When this call creates the table, it is seeded before returning.
    pub(crate) async fn ensure_table(&self, schema: &TableSchema) -> TableResult<()> {
        let lock = self.locks.lock_for(&schema.table_name);

        if self.probe(schema).await? == Probe::Present {
            // Creation only happens under the lock; if it is held, a create or
            // seed for this table may still be running.
            if lock.try_lock().is_err() {
                drop(lock.lock().await);
            }
            return Ok(());
        }

        let _guard = lock.lock().await;
        if self.probe(schema).await? == Probe::Present {
            debug!(table = %schema.table_name, "table provisioned by a concurrent caller");
            return Ok(());
        }

        if self.create(schema).await? {
            self.seed(schema).await
        } else {
            Ok(())
        }
    }

    async fn probe(&self, schema: &TableSchema) -> TableResult<Probe> {
        let table = &schema.table_name;
        match self
            .admin
            .describe_table(DescribeTableInput {
                table_name: table.clone(),
            })
            .await
        {
            Ok(output) => {
                let status = output.table.and_then(|t| t.table_status);
                debug!(table = %table, ?status, "table present");
                Ok(Probe::Present)
            }
            Err(e) if e.is_not_found() => {
                debug!(table = %table, "table absent");
                Ok(Probe::Absent)
            }
            Err(e) => match self.config.probe_policy {
                ProbePolicy::AnyError => {
                    warn!(table = %table, error = %e, "probe failed, treating table as absent");
                    Ok(Probe::Absent)
                }
                ProbePolicy::NotFoundOnly => Err(TableError::Probe {
                    table: table.clone(),
                    source: e,
                }),
            },
        }
    }

    /// Create the table and wait for it to become active.
    ///
    /// Returns `false` when someone outside this factory created it first; that
    /// creator owns the seed.
    async fn create(&self, schema: &TableSchema) -> TableResult<bool> {
        let table = &schema.table_name;
        let output = match self.admin.create_table(schema.to_create_table_input()).await {
            Ok(output) => output,
            Err(e) if e.code == StoreErrorCode::ResourceInUseException => {
                info!(table = %table, "table created elsewhere, skipping seed");
                self.wait_until_active(schema).await?;
                return Ok(false);
            }
            Err(source) => return Err(provisioning_error(table, source)),
        };

        let status = output.table_description.and_then(|d| d.table_status);
        info!(table = %table, ?status, "table created");
        if status == Some(TableStatus::Creating) {
            self.wait_until_active(schema).await?;
        }
        Ok(true)
    }

    async fn wait_until_active(&self, schema: &TableSchema) -> TableResult<()> {
        let table = &schema.table_name;
        let interval = Duration::from_millis(self.config.create_wait_interval_ms);

        for attempt in 1..=self.config.create_wait_attempts {
            let output = self
                .admin
                .describe_table(DescribeTableInput {
                    table_name: table.clone(),
                })
                .await
                .map_err(|source| provisioning_error(table, source))?;
            if output.table.and_then(|t| t.table_status) == Some(TableStatus::Active) {
                debug!(table = %table, attempt, "table active");
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }

        Err(provisioning_error(
            table,
            StoreError::internal_error(format!(
                "table {table} did not become active after {} probes",
                self.config.create_wait_attempts
            )),
        ))
    }

    async fn seed(&self, schema: &TableSchema) -> TableResult<()> {
        let table = &schema.table_name;
        let items = schema
            .initial_data
            .as_ref()
            .and_then(InitialData::resolve)
            .unwrap_or_default();
        if items.is_empty() {
            debug!(table = %table, "no initial data, skipping seed");
            return Ok(());
        }

        let count = items.len();
        let mut builder =
            BatchRequestBuilder::new().with_chunk_size(self.config.effective_batch_chunk_size());
        builder.add_items(table, items, BatchAction::Add);

        for request in builder.render_requests() {
            let output = self
                .data
                .batch_write_item(request)
                .await
                .map_err(|source| provisioning_error(table, source))?;
            let unprocessed: usize = output.unprocessed_items.values().map(Vec::len).sum();
            if unprocessed > 0 {
                warn!(table = %table, unprocessed, "seed batch left unprocessed items");
            }
        }

        info!(table = %table, items = count, "table seeded");
        Ok(())
    }
}

fn provisioning_error(table: &str, source: StoreError) -> TableError {
    TableError::Provisioning {
        table: table.to_owned(),
        source,
    }
}
