//! Journal tuning options.

use serde::{Deserialize, Serialize};

/// Default journal size above which the store compacts itself.
const DEFAULT_MAX_JOURNAL_SIZE: u64 = 64 * 1024 * 1024; // 64 MB

/// Configuration for the record journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Fsync the journal after every write.
    ///
    /// Default: true
    pub sync_on_write: bool,

    /// Size of the journal file (in bytes) that triggers an automatic compaction.
    ///
    /// Default: 64 MB
    pub max_journal_size: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_journal_size: DEFAULT_MAX_JOURNAL_SIZE,
        }
    }
}
