use std::path::Path;

use crate::error::StorageError;
use crate::store::RecordStore;
use crate::wal::JournalConfig;

/// Builder for configuring and opening a record store.
///
/// # Example
///
/// ```rust,no_run
/// use strata::RecordStore;
///
/// # fn main() -> Result<(), strata::StorageError> {
/// let store = RecordStore::builder()
///     .sync_on_write(false)
///     .max_journal_size(8 * 1024 * 1024)
///     .open("metrics.strata")?;
/// # Ok(())
/// # }
/// ```
pub struct RecordStoreBuilder {
    config: JournalConfig,
}

impl RecordStoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: JournalConfig::default(),
        }
    }

    /// Replaces the whole journal configuration, e.g. one loaded from a config file.
    #[must_use]
    pub fn config(mut self, config: JournalConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets whether every write is fsynced before returning.
    ///
    /// Disabling this trades durability of the most recent writes for throughput;
    /// call [`RecordStore::sync`] to flush explicitly.
    ///
    /// Default: true
    #[must_use]
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.config.sync_on_write = enabled;
        self
    }

    /// Sets the journal size (in bytes) above which the store compacts itself.
    ///
    /// Compaction also waits until the journal has doubled since the previous one.
    ///
    /// Default: 64 MB
    #[must_use]
    pub fn max_journal_size(mut self, bytes: u64) -> Self {
        self.config.max_journal_size = bytes;
        self
    }

    /// Opens or creates a record store at the specified path.
    ///
    /// If the file exists its journal is replayed; a torn final entry is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is invalid.
    pub fn open(self, path: impl AsRef<Path>) -> Result<RecordStore, StorageError> {
        let path = path.as_ref().to_path_buf();
        RecordStore::open_with_config(path, self.config)
    }
}

impl Default for RecordStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_default() {
        let builder = RecordStoreBuilder::new();
        assert_eq!(builder.config, JournalConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let builder = RecordStoreBuilder::new()
            .sync_on_write(false)
            .max_journal_size(1024);
        assert!(!builder.config.sync_on_write);
        assert_eq!(builder.config.max_journal_size, 1024);
    }

    #[test]
    fn test_builder_open() {
        let tmpfile = NamedTempFile::new().unwrap();
        let store = RecordStoreBuilder::new()
            .sync_on_write(false)
            .open(tmpfile.path())
            .unwrap();

        assert!(store.is_empty().unwrap());
        assert!(!store.config().sync_on_write);
    }
}
