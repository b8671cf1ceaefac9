//! CLI command implementations

pub mod filter;
pub mod onboard;
pub mod resolve;
pub mod tenants;
