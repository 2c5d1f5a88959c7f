//! Journal of record mutations backing the record store.
//!
//! The journal provides:
//! - Append-only writes with optional fsync per write
//! - Crash recovery with CRC32 validation and torn-tail truncation
//! - Compaction that rewrites only live records

pub mod config;
pub(crate) mod entry;
pub(crate) mod journal;

pub use self::config::JournalConfig;
