//! Table access configuration.
//!
//! Provides [`TableConfig`], shared by every handle a
//! [`TableFactory`](crate::table::TableFactory) builds. Values can be loaded
//! from environment variables via [`TableConfig::from_env`].

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Largest number of writes the store accepts in one batch request.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// How a failed existence probe is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbePolicy {
    /// Only a `ResourceNotFoundException` means the table is absent; any other
    /// probe error is reported to the caller.
    #[default]
    NotFoundOnly,
    /// Every probe error means the table is absent and must be created.
    AnyError,
}

/// Table access configuration.
///
/// # Examples
///
/// ```
/// use tablegate_core::config::{ProbePolicy, TableConfig};
///
/// let config = TableConfig::default();
/// assert_eq!(config.probe_policy, ProbePolicy::NotFoundOnly);
/// assert_eq!(config.batch_chunk_size, 25);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    /// Interpretation of probe failures.
    #[builder(default)]
    pub probe_policy: ProbePolicy,

    /// Writes per rendered batch request, clamped to `1..=25`.
    #[builder(default = MAX_BATCH_WRITE_ITEMS)]
    pub batch_chunk_size: usize,

    /// Probes made while waiting for a `CREATING` table to become active.
    #[builder(default = 20)]
    pub create_wait_attempts: u32,

    /// Delay between those probes, in milliseconds.
    #[builder(default = 50)]
    pub create_wait_interval_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            probe_policy: ProbePolicy::NotFoundOnly,
            batch_chunk_size: MAX_BATCH_WRITE_ITEMS,
            create_wait_attempts: 20,
            create_wait_interval_ms: 50,
        }
    }
}

impl TableConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TABLEGATE_PROBE_ANY_ERROR` | `false` |
    /// | `TABLEGATE_BATCH_CHUNK_SIZE` | `25` |
    /// | `TABLEGATE_CREATE_WAIT_ATTEMPTS` | `20` |
    /// | `TABLEGATE_CREATE_WAIT_INTERVAL_MS` | `50` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TABLEGATE_PROBE_ANY_ERROR") {
            if parse_bool(&v) {
                config.probe_policy = ProbePolicy::AnyError;
            }
        }
        if let Ok(v) = std::env::var("TABLEGATE_BATCH_CHUNK_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.batch_chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("TABLEGATE_CREATE_WAIT_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                config.create_wait_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("TABLEGATE_CREATE_WAIT_INTERVAL_MS") {
            if let Ok(n) = v.parse::<u64>() {
                config.create_wait_interval_ms = n;
            }
        }

        config
    }

    /// Batch chunk size clamped to what the store accepts.
    #[must_use]
    pub fn effective_batch_chunk_size(&self) -> usize {
        self.batch_chunk_size.clamp(1, MAX_BATCH_WRITE_ITEMS)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
