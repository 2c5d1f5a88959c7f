use crate::builder::RecordStoreBuilder;
use crate::error::StorageError;
use crate::wal::JournalConfig;
use crate::wal::entry::{RecordEntry, RecordOp};
use crate::wal::journal::RecordJournal;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Largest payload accepted by [`RecordStore::put`].
///
/// Leaves room in the `u32` frame length for the entry header, key and collection.
pub const MAX_RECORD_SIZE: usize = (u32::MAX as usize) - 64 * 1024;

type RecordKey = (String, String);

struct StoreState {
    journal: Option<RecordJournal>,
    records: BTreeMap<RecordKey, Vec<u8>>,
    /// Journal size at the last compaction attempt (0 before the first one).
    compacted_size: u64,
}

impl StoreState {
    fn journal(&mut self) -> Result<&mut RecordJournal, StorageError> {
        self.journal.as_mut().ok_or(StorageError::StoreClosed)
    }
}

/// A durable key/value store of opaque records grouped into named collections.
///
/// All live records are held in memory; every mutation is appended to an
/// on-disk journal which is replayed on open. When the journal grows beyond
/// [`JournalConfig::max_journal_size`], and to more than twice its size after the
/// previous compaction, it is compacted to the live record set.
///
/// # Example
///
/// ```rust,no_run
/// use strata::RecordStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::open("prices.strata")?;
/// store.put("hosts", "AAPL", b"payload")?;
/// assert_eq!(store.get("hosts", "AAPL")?.as_deref(), Some(&b"payload"[..]));
/// # Ok(())
/// # }
/// ```
pub struct RecordStore {
    path: PathBuf,
    config: JournalConfig,
    state: Mutex<StoreState>,
}

impl RecordStore {
    /// Opens or creates a record store at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::builder().open(path)
    }

    /// Returns a builder for configuring the store before opening it.
    pub fn builder() -> RecordStoreBuilder {
        RecordStoreBuilder::new()
    }

    pub(crate) fn open_with_config(
        path: PathBuf,
        config: JournalConfig,
    ) -> Result<Self, StorageError> {
        let (journal, entries) = RecordJournal::open(&path).map_err(into_storage_error)?;

        #[cfg(feature = "logging")]
        log::info!(
            "Journal replay: applying {} entries from {}",
            entries.len(),
            path.display()
        );

        let mut records = BTreeMap::new();
        for entry in entries {
            let key = (entry.collection, entry.key);
            match entry.op {
                RecordOp::Put => {
                    records.insert(key, entry.payload);
                }
                RecordOp::Remove => {
                    records.remove(&key);
                }
            }
        }

        Ok(Self {
            path,
            config,
            state: Mutex::new(StoreState {
                journal: Some(journal),
                records,
                compacted_size: 0,
            }),
        })
    }

    /// Inserts or overwrites a record.
    pub fn put(&self, collection: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if value.len() > MAX_RECORD_SIZE {
            return Err(StorageError::RecordTooLarge(value.len()));
        }

        let mut state = self.state.lock()?;
        let mut entry = RecordEntry::put(collection, key, value.to_vec());
        state.journal()?.append(&mut entry).map_err(into_storage_error)?;
        state
            .records
            .insert((entry.collection, entry.key), entry.payload);

        self.finish_write(&mut state)
    }

    /// Returns a copy of the record, if present.
    pub fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let state = self.state.lock()?;
        if state.journal.is_none() {
            return Err(StorageError::StoreClosed);
        }
        Ok(state
            .records
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    /// Returns `true` if the record exists.
    pub fn contains(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(collection, key)?.is_some())
    }

    /// Removes a record. Returns `true` if it existed.
    pub fn remove(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let mut state = self.state.lock()?;
        let record_key = (collection.to_string(), key.to_string());
        if !state.records.contains_key(&record_key) {
            state.journal()?;
            return Ok(false);
        }

        let mut entry = RecordEntry::remove(collection, key);
        state.journal()?.append(&mut entry).map_err(into_storage_error)?;
        state.records.remove(&record_key);

        self.finish_write(&mut state)?;
        Ok(true)
    }

    /// Lists the keys of a collection in ascending order.
    pub fn keys(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.lock()?;
        if state.journal.is_none() {
            return Err(StorageError::StoreClosed);
        }
        Ok(state
            .records
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, k)| k.clone())
            .collect())
    }

    /// Returns the number of live records across all collections.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.lock()?;
        if state.journal.is_none() {
            return Err(StorageError::StoreClosed);
        }
        Ok(state.records.len())
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Rewrites the journal so that it contains only live records.
    pub fn compact(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock()?;
        Self::compact_locked(&mut state)
    }

    /// Flushes pending journal writes to disk.
    pub fn sync(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock()?;
        state.journal()?.sync()?;
        Ok(())
    }

    /// Syncs and closes the journal. Further operations fail with
    /// [`StorageError::StoreClosed`].
    pub fn close(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock()?;
        if let Some(mut journal) = state.journal.take() {
            journal.sync()?;
        }
        Ok(())
    }

    /// Returns the current journal size in bytes.
    pub fn journal_size(&self) -> Result<u64, StorageError> {
        let mut state = self.state.lock()?;
        Ok(state.journal()?.file_size())
    }

    /// Returns the path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal configuration the store was opened with.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Syncs an appended entry and compacts if the journal has grown enough.
    ///
    /// The entry is already applied to the in-memory map, so it is live whether
    /// or not the sync succeeds. A failed compaction leaves the old journal in
    /// place and does not fail the write.
    fn finish_write(&self, state: &mut StoreState) -> Result<(), StorageError> {
        if self.config.sync_on_write {
            state.journal()?.sync()?;
        }

        let threshold = self
            .config
            .max_journal_size
            .max(state.compacted_size.saturating_mul(2));
        if state.journal()?.file_size() > threshold
            && let Err(_err) = Self::compact_locked(state)
        {
            #[cfg(feature = "logging")]
            log::warn!("Journal compaction failed, keeping current journal: {_err}");

            // Retry only after the journal doubles again
            state.compacted_size = state.journal()?.file_size();
        }
        Ok(())
    }

    fn compact_locked(state: &mut StoreState) -> Result<(), StorageError> {
        let mut live: Vec<RecordEntry> = state
            .records
            .iter()
            .map(|((collection, key), payload)| RecordEntry::put(collection, key, payload.clone()))
            .collect();

        let journal = state.journal.as_mut().ok_or(StorageError::StoreClosed)?;
        #[cfg(feature = "logging")]
        let before = journal.file_size();

        journal.rewrite(&mut live).map_err(into_storage_error)?;
        state.compacted_size = journal.file_size();

        #[cfg(feature = "logging")]
        log::info!(
            "Journal compacted: {} live records, {} -> {} bytes",
            live.len(),
            before,
            journal.file_size()
        );

        Ok(())
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        // Best effort sync on drop
        if let Ok(mut state) = self.state.lock() {
            if let Some(journal) = state.journal.as_mut() {
                let _ = journal.sync();
            }
        }
    }
}

fn into_storage_error(err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            StorageError::Corrupted(err.to_string())
        }
        _ => StorageError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_remove() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("test.strata")).unwrap();

        store.put("hosts", "AAPL", b"one").unwrap();
        store.put("hosts", "MSFT", b"two").unwrap();
        assert_eq!(store.get("hosts", "AAPL").unwrap().unwrap(), b"one");
        assert_eq!(store.len().unwrap(), 2);

        assert!(store.remove("hosts", "AAPL").unwrap());
        assert!(!store.remove("hosts", "AAPL").unwrap());
        assert!(store.get("hosts", "AAPL").unwrap().is_none());
        assert_eq!(store.keys("hosts").unwrap(), vec!["MSFT".to_string()]);
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("test.strata")).unwrap();

        store.put("stocks", "a", b"1").unwrap();
        store.put("sensors", "a", b"2").unwrap();

        assert_eq!(store.get("stocks", "a").unwrap().unwrap(), b"1");
        assert_eq!(store.get("sensors", "a").unwrap().unwrap(), b"2");
        assert_eq!(store.keys("stocks").unwrap().len(), 1);
        assert!(store.keys("missing").unwrap().is_empty());
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("test.strata")).unwrap();
        store.close().unwrap();

        assert!(matches!(
            store.put("hosts", "a", b"1"),
            Err(StorageError::StoreClosed)
        ));
        assert!(matches!(
            store.get("hosts", "a"),
            Err(StorageError::StoreClosed)
        ));
        assert!(matches!(store.len(), Err(StorageError::StoreClosed)));
        assert!(matches!(store.is_empty(), Err(StorageError::StoreClosed)));
    }

    #[test]
    fn test_automatic_compaction() {
        let dir = tempdir().unwrap();
        let store = RecordStore::builder()
            .max_journal_size(4096)
            .sync_on_write(false)
            .open(dir.path().join("test.strata"))
            .unwrap();

        for i in 0..200u32 {
            store.put("hosts", "hot", &i.to_le_bytes()).unwrap();
        }

        assert!(store.journal_size().unwrap() <= 4096);
        assert_eq!(
            store.get("hosts", "hot").unwrap().unwrap(),
            199u32.to_le_bytes()
        );
    }

    #[test]
    fn test_compaction_waits_for_journal_to_double() {
        let dir = tempdir().unwrap();
        let store = RecordStore::builder()
            .max_journal_size(4096)
            .sync_on_write(false)
            .open(dir.path().join("test.strata"))
            .unwrap();

        // Live set alone is larger than max_journal_size
        store.put("hosts", "big", &[7u8; 8192]).unwrap();
        let mut size = store.journal_size().unwrap();

        for i in 0..20u8 {
            store.put("hosts", &format!("k{i}"), &[i]).unwrap();
            let next = store.journal_size().unwrap();
            assert!(next > size, "journal rewritten on small put {i}");
            size = next;
        }

        for _ in 0..20 {
            store.put("hosts", "big", &[9u8; 8192]).unwrap();
            assert!(store.journal_size().unwrap() < 32 * 1024);
        }
        assert_eq!(store.len().unwrap(), 21);
    }

    #[test]
    fn test_failed_compaction_does_not_fail_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.strata");
        // The rewrite target is a directory, so every compaction fails
        std::fs::create_dir(dir.path().join("test.compact")).unwrap();

        {
            let store = RecordStore::builder()
                .max_journal_size(1024)
                .sync_on_write(false)
                .open(&path)
                .unwrap();

            for i in 0..20u8 {
                store.put("hosts", &format!("h{i:02}"), &[i; 100]).unwrap();
            }
            assert!(store.remove("hosts", "h00").unwrap());
            assert_eq!(store.get("hosts", "h19").unwrap().unwrap(), vec![19u8; 100]);
            assert!(store.compact().is_err());
        }

        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 19);
        assert_eq!(store.get("hosts", "h01").unwrap().unwrap(), vec![1u8; 100]);
    }
}
