//! Azure DevOps API module
//!
//! Provides a typed client for the projects, Git, security and identity
//! endpoints of the Azure DevOps REST API.

pub mod client;
pub mod types;

pub use client::DevOpsClient;
pub use types::*;
