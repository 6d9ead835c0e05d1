//! Storage backends: the record store and the blob store.
//!
//! Both are consumed through narrow traits so the engine never assumes a
//! concrete backend. The crate ships a `SQLite` record store and a
//! filesystem blob store.

pub mod filesystem;
pub mod sqlite;
pub mod traits;

pub use filesystem::FilesystemBlobStore;
pub use sqlite::SqliteRecordStore;
pub use traits::{BlobStore, RecordStore, RepairPlan};
