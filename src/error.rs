use std::fmt::{Display, Formatter};
use std::sync::PoisonError;
use std::io;

/// Errors raised by the record store and its journal.
#[derive(Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// The journal contents could not be interpreted.
    Corrupted(String),
    /// A framed record exceeded the maximum representable length.
    RecordTooLarge(usize),
    /// The store was used after `close()` or after a lock was poisoned.
    StoreClosed,
    /// An error from the underlying file.
    Io(io::Error),
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(_: PoisonError<T>) -> StorageError {
        StorageError::StoreClosed
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> StorageError {
        StorageError::Io(err)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Corrupted(msg) => {
                write!(f, "Journal corrupted: {msg}")
            }
            StorageError::RecordTooLarge(len) => {
                write!(
                    f,
                    "The record of {len} bytes exceeds the maximum framed length"
                )
            }
            StorageError::StoreClosed => {
                write!(f, "Record store has been closed")
            }
            StorageError::Io(err) => {
                write!(f, "I/O error: {err}")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

