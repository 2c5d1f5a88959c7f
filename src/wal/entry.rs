use std::io;

/// Kind of mutation recorded by a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordOp {
    /// Insert or overwrite the record.
    Put,
    /// Delete the record.
    Remove,
}

impl RecordOp {
    fn to_byte(self) -> u8 {
        match self {
            RecordOp::Put => 1,
            RecordOp::Remove => 2,
        }
    }

    fn from_byte(byte: u8) -> io::Result<Self> {
        match byte {
            1 => Ok(RecordOp::Put),
            2 => Ok(RecordOp::Remove),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid record op: {other}"),
            )),
        }
    }
}

/// A single entry in the record journal.
///
/// Each entry is one durable mutation of a `(collection, key)` record. Replaying
/// all entries in sequence order rebuilds the live record set.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordEntry {
    /// Monotonic sequence number assigned by the journal.
    pub(crate) sequence: u64,

    pub(crate) op: RecordOp,

    /// Name of the collection the record belongs to.
    pub(crate) collection: String,

    /// Key of the record within its collection.
    pub(crate) key: String,

    /// Record contents. Empty for removals.
    pub(crate) payload: Vec<u8>,
}

impl RecordEntry {
    /// Creates a put entry. The sequence number is assigned by the journal during append.
    pub(crate) fn put(collection: &str, key: &str, payload: Vec<u8>) -> Self {
        Self {
            sequence: 0,
            op: RecordOp::Put,
            collection: collection.to_string(),
            key: key.to_string(),
            payload,
        }
    }

    /// Creates a removal entry.
    pub(crate) fn remove(collection: &str, key: &str) -> Self {
        Self {
            sequence: 0,
            op: RecordOp::Remove,
            collection: collection.to_string(),
            key: key.to_string(),
            payload: Vec::new(),
        }
    }

    /// Serializes the entry to bytes.
    ///
    /// Format:
    /// - sequence: u64 (8 bytes)
    /// - op: u8 (1 byte)
    /// - collection_len: u32 (4 bytes) + collection bytes
    /// - key_len: u32 (4 bytes) + key bytes
    /// - payload_len: u32 (4 bytes) + payload bytes
    pub(crate) fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(
            8 + 1 + 12 + self.collection.len() + self.key.len() + self.payload.len(),
        );

        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.push(self.op.to_byte());
        write_bytes(&mut buf, self.collection.as_bytes())?;
        write_bytes(&mut buf, self.key.as_bytes())?;
        write_bytes(&mut buf, &self.payload)?;

        Ok(buf)
    }

    /// Deserializes an entry from bytes.
    ///
    /// Returns the entry and the number of bytes consumed.
    pub(crate) fn from_bytes(data: &[u8]) -> io::Result<(Self, usize)> {
        let mut offset = 0;

        let sequence = u64::from_le_bytes(read_array(data, &mut offset, "sequence")?);
        let [op_byte] = read_array::<1>(data, &mut offset, "op")?;
        let op = RecordOp::from_byte(op_byte)?;
        let collection = read_string(data, &mut offset, "collection")?;
        let key = read_string(data, &mut offset, "key")?;
        let payload = read_bytes(data, &mut offset, "payload")?.to_vec();

        Ok((
            Self {
                sequence,
                op,
                collection,
                key,
                payload,
            },
            offset,
        ))
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("field of {} bytes is too large", bytes.len()),
        )
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_array<const N: usize>(data: &[u8], offset: &mut usize, what: &str) -> io::Result<[u8; N]> {
    let end = *offset + N;
    let slice = data.get(*offset..end).ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, format!("truncated {what}"))
    })?;
    let mut array = [0u8; N];
    array.copy_from_slice(slice);
    *offset = end;
    Ok(array)
}

fn read_bytes<'a>(data: &'a [u8], offset: &mut usize, what: &str) -> io::Result<&'a [u8]> {
    let len = u32::from_le_bytes(read_array(data, offset, what)?) as usize;
    let end = *offset + len;
    let slice = data.get(*offset..end).ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, format!("truncated {what}"))
    })?;
    *offset = end;
    Ok(slice)
}

fn read_string(data: &[u8], offset: &mut usize, what: &str) -> io::Result<String> {
    let bytes = read_bytes(data, offset, what)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization_round_trip() {
        let mut entry = RecordEntry::put("hosts", "AAPL", vec![1, 2, 3, 4]);
        entry.sequence = 42;

        let bytes = entry.to_bytes().unwrap();
        let (decoded, len) = RecordEntry::from_bytes(&bytes).unwrap();

        assert_eq!(len, bytes.len());
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_remove_entry_has_empty_payload() {
        let entry = RecordEntry::remove("hosts", "AAPL");
        let bytes = entry.to_bytes().unwrap();
        let (decoded, _) = RecordEntry::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.op, RecordOp::Remove);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_truncated_entry() {
        let entry = RecordEntry::put("hosts", "AAPL", vec![9; 16]);
        let bytes = entry.to_bytes().unwrap();

        let err = RecordEntry::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_invalid_op() {
        let entry = RecordEntry::put("hosts", "AAPL", vec![]);
        let mut bytes = entry.to_bytes().unwrap();
        bytes[8] = 7;

        let err = RecordEntry::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
