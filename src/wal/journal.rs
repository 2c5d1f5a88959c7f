use super::entry::RecordEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic number for journal file identification.
const JOURNAL_MAGIC: &[u8; 8] = b"STRATA-J";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

/// Size of the journal file header in bytes.
pub(crate) const JOURNAL_HEADER_SIZE: usize = 512;

/// Length prefix plus trailing CRC around every entry.
const FRAME_OVERHEAD: usize = 4 + 4;

/// Header structure for the journal file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JournalHeader {
    pub(crate) magic: [u8; 8],
    pub(crate) version: u8,
    /// Highest sequence number folded into the journal by the last compaction.
    pub(crate) base_seq: u64,
}

impl JournalHeader {
    fn new(base_seq: u64) -> Self {
        Self {
            magic: *JOURNAL_MAGIC,
            version: JOURNAL_VERSION,
            base_seq,
        }
    }

    fn to_bytes(&self) -> [u8; JOURNAL_HEADER_SIZE] {
        let mut buf = [0u8; JOURNAL_HEADER_SIZE];

        buf[0..8].copy_from_slice(&self.magic);
        buf[8] = self.version;
        buf[9..17].copy_from_slice(&self.base_seq.to_le_bytes());

        // CRC32 of header fields (excluding the CRC field itself)
        let crc = crc32fast::hash(&buf[0..17]);
        buf[17..21].copy_from_slice(&crc.to_le_bytes());

        buf
    }

    fn from_bytes(buf: &[u8; JOURNAL_HEADER_SIZE]) -> io::Result<Self> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[0..8]);

        if &magic != JOURNAL_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid journal magic number",
            ));
        }

        let version = buf[8];
        if version != JOURNAL_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported journal version: {version}"),
            ));
        }

        let mut seq_bytes = [0u8; 8];
        seq_bytes.copy_from_slice(&buf[9..17]);
        let base_seq = u64::from_le_bytes(seq_bytes);

        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&buf[17..21]);
        let stored_crc = u32::from_le_bytes(crc_bytes);

        let computed_crc = crc32fast::hash(&buf[0..17]);
        if computed_crc != stored_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "journal header CRC mismatch",
            ));
        }

        Ok(Self {
            magic,
            version,
            base_seq,
        })
    }
}

/// Append-only journal of record mutations.
///
/// Every entry is framed as `length (4) | entry bytes | crc32 (4)`. Replay stops
/// at the first frame that is torn or fails its checksum, and the file is cut
/// back to the last good frame so later appends never follow garbage.
pub(crate) struct RecordJournal {
    file: File,
    path: PathBuf,
    sequence: u64,
    len: u64,
}

impl RecordJournal {
    /// Opens an existing journal or creates a new one, returning the journal
    /// together with every intact entry it contains.
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> io::Result<(Self, Vec<RecordEntry>)> {
        let path = path.as_ref().to_path_buf();
        #[allow(clippy::suspicious_open_options)]
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        let header = if file_len == 0 {
            let header = JournalHeader::new(0);
            file.write_all(&header.to_bytes())?;
            file.sync_data()?;
            header
        } else {
            if file_len < JOURNAL_HEADER_SIZE as u64 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "journal shorter than its header",
                ));
            }
            let mut header_buf = [0u8; JOURNAL_HEADER_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut header_buf)?;
            JournalHeader::from_bytes(&header_buf)?
        };

        let mut data = Vec::new();
        file.seek(SeekFrom::Start(JOURNAL_HEADER_SIZE as u64))?;
        file.read_to_end(&mut data)?;

        let (entries, valid_len) = Self::scan(&data)?;
        let len = JOURNAL_HEADER_SIZE as u64 + valid_len as u64;
        if len < file_len.max(JOURNAL_HEADER_SIZE as u64) {
            #[cfg(feature = "logging")]
            log::warn!(
                "Journal {} has a torn tail, truncating from {} to {} bytes",
                path.display(),
                file_len,
                len
            );
            file.set_len(len)?;
            file.sync_data()?;
        }

        let sequence = entries
            .last()
            .map_or(header.base_seq, |entry| entry.sequence.max(header.base_seq));

        Ok((
            Self {
                file,
                path,
                sequence,
                len,
            },
            entries,
        ))
    }

    /// Decodes frames until the data runs out or a frame is invalid.
    ///
    /// Returns the decoded entries and the number of bytes they occupy.
    fn scan(data: &[u8]) -> io::Result<(Vec<RecordEntry>, usize)> {
        let mut offset = 0;
        let mut entries = Vec::new();

        while offset + 4 <= data.len() {
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&data[offset..offset + 4]);
            let total_len = u32::from_le_bytes(len_buf) as usize;
            if total_len < FRAME_OVERHEAD || offset + total_len > data.len() {
                break;
            }

            let entry_data = &data[offset + 4..offset + total_len - 4];
            let mut crc_buf = [0u8; 4];
            crc_buf.copy_from_slice(&data[offset + total_len - 4..offset + total_len]);

            if crc32fast::hash(entry_data) != u32::from_le_bytes(crc_buf) {
                #[cfg(feature = "logging")]
                log::warn!("Journal entry CRC mismatch at offset {offset} - stopping replay");
                break;
            }

            let (entry, _) = RecordEntry::from_bytes(entry_data)?;
            entries.push(entry);
            offset += total_len;
        }

        Ok((entries, offset))
    }

    fn frame(entry: &RecordEntry) -> io::Result<Vec<u8>> {
        let entry_data = entry.to_bytes()?;
        let crc = crc32fast::hash(&entry_data);

        let total_len = FRAME_OVERHEAD + entry_data.len();
        let framed_len = u32::try_from(total_len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("entry of {total_len} bytes exceeds the frame limit"),
            )
        })?;

        let mut wire_data = Vec::with_capacity(total_len);
        wire_data.extend_from_slice(&framed_len.to_le_bytes());
        wire_data.extend_from_slice(&entry_data);
        wire_data.extend_from_slice(&crc.to_le_bytes());
        Ok(wire_data)
    }

    /// Appends an entry (without fsync) and returns its assigned sequence number.
    pub(crate) fn append(&mut self, entry: &mut RecordEntry) -> io::Result<u64> {
        entry.sequence = self.sequence + 1;
        let wire_data = Self::frame(entry)?;

        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(&wire_data)?;

        self.sequence = entry.sequence;
        self.len += wire_data.len() as u64;
        Ok(entry.sequence)
    }

    /// Syncs all pending writes to disk.
    pub(crate) fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Replaces the journal with one containing only `entries`.
    ///
    /// The new journal is written next to the old one and renamed over it, so a
    /// crash mid-rewrite leaves the previous journal intact.
    pub(crate) fn rewrite(&mut self, entries: &mut [RecordEntry]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("compact");
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let header = JournalHeader::new(self.sequence);
        tmp.write_all(&header.to_bytes())?;

        let mut len = JOURNAL_HEADER_SIZE as u64;
        let mut sequence = self.sequence;
        for entry in entries.iter_mut() {
            sequence += 1;
            entry.sequence = sequence;
            let wire_data = Self::frame(entry)?;
            tmp.write_all(&wire_data)?;
            len += wire_data.len() as u64;
        }
        tmp.sync_data()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.sequence = sequence;
        self.len = len;
        Ok(())
    }

    /// Reads the journal header.
    ///
    /// Used in tests and diagnostics to inspect journal state.
    #[allow(dead_code)]
    pub(crate) fn read_header(&mut self) -> io::Result<JournalHeader> {
        let mut header_buf = [0u8; JOURNAL_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header_buf)?;
        JournalHeader::from_bytes(&header_buf)
    }

    /// Returns the current journal size in bytes.
    pub(crate) fn file_size(&self) -> u64 {
        self.len
    }

    /// Returns the last assigned sequence number.
    #[allow(dead_code)]
    pub(crate) fn latest_sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_journal_create_and_open() {
        let temp_file = NamedTempFile::new().unwrap();

        let (mut journal, entries) = RecordJournal::open(temp_file.path()).unwrap();
        assert!(entries.is_empty());

        let header = journal.read_header().unwrap();
        assert_eq!(header.magic, *JOURNAL_MAGIC);
        assert_eq!(header.version, JOURNAL_VERSION);
        assert_eq!(header.base_seq, 0);
        assert_eq!(journal.file_size(), JOURNAL_HEADER_SIZE as u64);
    }

    #[test]
    fn test_journal_replay() {
        let temp_file = NamedTempFile::new().unwrap();

        {
            let (mut journal, _) = RecordJournal::open(temp_file.path()).unwrap();
            for i in 0..5 {
                let mut entry = RecordEntry::put("hosts", &format!("host_{i}"), vec![i; 4]);
                let seq = journal.append(&mut entry).unwrap();
                assert_eq!(seq, u64::from(i) + 1);
            }
            journal.sync().unwrap();
        }

        let (journal, entries) = RecordJournal::open(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[4].key, "host_4");
        assert_eq!(journal.latest_sequence(), 5);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let temp_file = NamedTempFile::new().unwrap();

        let good_len = {
            let (mut journal, _) = RecordJournal::open(temp_file.path()).unwrap();
            let mut entry = RecordEntry::put("hosts", "a", vec![1, 2, 3]);
            journal.append(&mut entry).unwrap();
            let good_len = journal.file_size();
            let mut entry = RecordEntry::put("hosts", "b", vec![4, 5, 6]);
            journal.append(&mut entry).unwrap();
            journal.sync().unwrap();
            good_len
        };

        // Chop the last frame in half
        let full_len = std::fs::metadata(temp_file.path()).unwrap().len();
        let file = OpenOptions::new().write(true).open(temp_file.path()).unwrap();
        file.set_len(full_len - 5).unwrap();
        drop(file);

        let (journal, entries) = RecordJournal::open(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(journal.file_size(), good_len);
        assert_eq!(std::fs::metadata(temp_file.path()).unwrap().len(), good_len);
    }

    #[test]
    fn test_rewrite_keeps_sequence_monotonic() {
        let temp_file = NamedTempFile::new().unwrap();

        let (mut journal, _) = RecordJournal::open(temp_file.path()).unwrap();
        for i in 0..3 {
            let mut entry = RecordEntry::put("hosts", "same", vec![i]);
            journal.append(&mut entry).unwrap();
        }

        let mut live = vec![RecordEntry::put("hosts", "same", vec![2])];
        journal.rewrite(&mut live).unwrap();
        assert_eq!(journal.read_header().unwrap().base_seq, 3);
        assert_eq!(live[0].sequence, 4);
        drop(journal);

        let (journal, entries) = RecordJournal::open(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, vec![2]);
        assert_eq!(journal.latest_sequence(), 4);
    }

    #[test]
    fn test_invalid_magic() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), vec![0u8; JOURNAL_HEADER_SIZE]).unwrap();

        let err = RecordJournal::open(temp_file.path()).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
