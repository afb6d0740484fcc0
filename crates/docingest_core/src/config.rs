//! Client configuration.

use std::time::Duration;

/// Default cap on operations in one entry.
pub const DEFAULT_MAX_OPERATIONS: usize = 10_000;

/// Configuration for an [`IngestClient`](crate::IngestClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Upper bound for [`DeferredTx::wait`](crate::DeferredTx::wait).
    ///
    /// `None` waits until the log resolves the entry, however long that takes.
    pub await_timeout: Option<Duration>,

    /// Maximum number of operations accepted in a single entry.
    pub max_operations_per_entry: usize,

    /// Whether an empty operation sequence may be submitted.
    pub allow_empty_entries: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            await_timeout: None,
            max_operations_per_entry: DEFAULT_MAX_OPERATIONS,
            allow_empty_entries: true,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default wait bound for deferred results.
    #[must_use]
    pub const fn await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of operations per entry.
    #[must_use]
    pub const fn max_operations_per_entry(mut self, max: usize) -> Self {
        self.max_operations_per_entry = max;
        self
    }

    /// Sets whether empty entries are accepted.
    #[must_use]
    pub const fn allow_empty_entries(mut self, value: bool) -> Self {
        self.allow_empty_entries = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.await_timeout, None);
        assert_eq!(config.max_operations_per_entry, DEFAULT_MAX_OPERATIONS);
        assert!(config.allow_empty_entries);
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new()
            .await_timeout(Duration::from_secs(2))
            .max_operations_per_entry(16)
            .allow_empty_entries(false);

        assert_eq!(config.await_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_operations_per_entry, 16);
        assert!(!config.allow_empty_entries);
    }
}
