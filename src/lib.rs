//! Azure DevOps Git permission audit
//!
//! Flattens the access control lists of a project's Git repositories into a
//! report with one row per (resource, identity, permission).
//!
//! ## Resolution Model
//!
//! ```text
//! branch → repository → project
//! ```
//!
//! Scopes are read from most to least specific. The first scope that allows
//! or denies a permission for an identity decides it; less specific scopes
//! cannot overturn that decision. Within one entry, deny wins over allow.
//! Group grants are also reported for every user the group contains,
//! following nested groups.
//!
//! ## Example Configuration
//!
//! ```toml
//! [devops]
//! organization_url = "https://dev.azure.com/contoso"
//! project = "Fabrikam"
//! # token from AZURE_DEVOPS_EXT_PAT env var
//!
//! [report]
//! output = "acl-report.csv"
//! include_branches = true
//! exclude = ["-archive$"]
//! ```

pub mod audit;
pub mod auth;
pub mod config;
pub mod devops;
pub mod error;
pub mod permissions;
pub mod report;
pub mod util;

// Re-export main types
pub use audit::{AuditOutcome, run_audit};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
