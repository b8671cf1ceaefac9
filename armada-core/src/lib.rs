//! # Armada Core
//!
//! Domain model for the Armada fleet operations orchestrator: work items,
//! request normalization, progress tallies, and version arithmetic shared by
//! the dispatch layer and the on-host step runtime.

pub mod normalize;
pub mod progress;
pub mod version;
pub mod work_item;

// Re-export commonly used types
pub use normalize::{normalize_request, ClusterBuckets, Pipeline, RunDefaults};
pub use progress::Progress;
pub use work_item::{Action, BackupOptions, RestoreOptions, UpgradeOptions, Work, WorkItem};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for core operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),
}
