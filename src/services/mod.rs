//! Core engine services.
//!
//! Leaf-first: the hasher and similarity scorers have no dependencies on
//! storage; the resolver, sequencer, accountant, and linker consume the
//! storage traits; the file service orchestrates them all.

pub mod files;
pub mod hasher;
pub mod linker;
pub mod quota;
pub mod resolver;
pub mod sequencer;
pub mod similarity;

pub use files::FileService;
pub use hasher::ContentHasher;
pub use linker::OwnershipLinker;
pub use quota::StorageAccountant;
pub use resolver::DuplicateResolver;
pub use sequencer::NameSequencer;
pub use similarity::SimilarityScorer;
