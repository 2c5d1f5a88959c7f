//! # strata
//!
//! A small journaled record store. Records are opaque byte payloads addressed by
//! `(collection, key)`; every mutation is appended to a crc32-checked journal that
//! is replayed when the store is reopened.
//!
//! Higher-level crates (such as `strata-timeseries`) encode their own documents
//! into records and rely on this crate only for durability.

#![deny(missing_docs)]

mod builder;
mod error;
mod store;
pub mod wal;

pub use builder::RecordStoreBuilder;
pub use error::StorageError;
pub use store::{MAX_RECORD_SIZE, RecordStore};
pub use wal::JournalConfig;
