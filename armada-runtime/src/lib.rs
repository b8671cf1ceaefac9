//! # Armada Runtime
//!
//! The step execution engine that runs on each target host: it narrows the
//! carried work items to the clusters this host can act on, drives one step
//! per cluster with guaranteed report upload, and aborts the batch on the
//! first fatal failure.

pub mod context;
pub mod engine;
pub mod filter;
pub mod providers;
pub mod report;
pub mod shell;
pub mod steps;

// Re-export commonly used types
pub use context::StepContext;
pub use engine::{BatchOutcome, Step, StepEngine, StepPolicy};
pub use providers::{BlobStore, ClusterProvider, Identity, ACTIVE_STATUS};
pub use shell::{ProcessRunner, ShellRunner};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("External call error: {0}")]
    ExternalCall(String),

    #[error("Step {step} failed for {cluster}: {detail}")]
    StepFailure {
        step: String,
        cluster: String,
        detail: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] armada_core::Error),
}

impl Error {
    pub fn step_failure(step: &str, cluster: &str, detail: impl Into<String>) -> Self {
        Error::StepFailure {
            step: step.to_string(),
            cluster: cluster.to_string(),
            detail: detail.into(),
        }
    }
}
