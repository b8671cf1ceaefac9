//! Shared test utilities for Armada crates
//!
//! This crate provides:
//! - **Fixtures**: Pre-built tenant records and request payloads
//! - **Builders**: Type-safe builder for automation requests
//! - **Mocks**: In-memory dispatcher and directory implementations
//!
//! # Example
//!
//! ```ignore
//! use armada_tests::{builders, fixtures, mocks};
//!
//! #[tokio::test]
//! async fn test_launch() {
//!     let dispatcher = mocks::MockDispatcher::default();
//!     let request = builders::AutomationRequestBuilder::new()
//!         .backup_cluster("111122223333", "us-east-1", "payments")
//!         .build();
//!     // launch and verify
//! }
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use builders::AutomationRequestBuilder;
pub use mocks::{MockDirectory, MockDispatcher};
