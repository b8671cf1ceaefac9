//! # Armada Dispatch
//!
//! The front door of the orchestrator: it normalizes an automation request,
//! resolves its fan-out targets against the tenant directory, starts the
//! automation through an [`AutomationDispatcher`], and polls it to
//! completion. Every outcome maps onto the HTTP-style response envelope the
//! callers consume.

pub mod dispatcher;
pub mod launch;
pub mod polling;
pub mod request;

// Re-export commonly used types
pub use dispatcher::{AutomationDispatcher, ExecutionStatus, StartAutomation};
pub use launch::{launch, DispatchSettings};
pub use polling::wait_for_completion;
pub use request::{ApiResponse, AutomationRequest, LaunchOutcome};

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for dispatch operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No clusters provided")]
    NoClusters,

    #[error("Account details not found for the requested clusters. Please onboard the tenants first")]
    TenantsNotOnboarded,

    #[error("External call error: {0}")]
    ExternalCall(String),

    #[error("Automation {id} finished with status {status:?}")]
    ExecutionFailed {
        id: String,
        status: dispatcher::ExecutionStatus,
    },

    #[error("Automation {id} did not finish within {attempts} polling attempts")]
    Timeout { id: String, attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP-style status the response envelope carries for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 422,
            Error::NoClusters | Error::TenantsNotOnboarded => 404,
            Error::ExternalCall(_)
            | Error::ExecutionFailed { .. }
            | Error::Timeout { .. }
            | Error::Serialization(_) => 500,
        }
    }
}

impl From<armada_core::Error> for Error {
    fn from(e: armada_core::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<armada_directory::Error> for Error {
    fn from(e: armada_directory::Error) -> Self {
        match e {
            armada_directory::Error::NotFound(_) => Error::TenantsNotOnboarded,
            other => Error::ExternalCall(other.to_string()),
        }
    }
}
