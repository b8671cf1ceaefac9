//! # Armada Directory
//!
//! The tenant directory maps onboarded (account, region) pairs to the role
//! the automation assumes there. The resolver turns a request plus the
//! directory contents into the fan-out targets for dispatch.

pub mod directory;
pub mod resolver;

pub use directory::{FileDirectory, Page, ScanCursor, TenantDirectory, TenantRecord};
pub use resolver::{resolve_targets, RequestTarget, Target, DEFAULT_EXECUTION_ROLE};

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for directory operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
