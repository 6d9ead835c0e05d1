//! Domain models for filedup.

mod category;
mod outcome;
mod record;

pub use category::FileCategory;
pub use outcome::{MatchResult, UploadOutcome};
pub use record::{FileId, FileRecord, OwnerScope, StorageUsage, split_filename};
