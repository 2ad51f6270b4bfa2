//! Error types for repo-acl-audit
//!
//! This module defines the error hierarchy used throughout the application.
//! Only configuration, authentication and report-writing errors are fatal;
//! everything raised while walking ACLs and identities is absorbed by the
//! engine and surfaces as a log line or an `Unknown` record.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Azure DevOps API error: {0}")]
    DevOps(#[from] DevOpsError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Azure DevOps API errors
#[derive(Error, Debug)]
pub enum DevOpsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Azure DevOps API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Unauthorized: invalid or expired token")]
    Unauthorized,

    #[error("Forbidden: insufficient permissions for {action}")]
    Forbidden { action: String },

    #[error("Invalid response from Azure DevOps: {0}")]
    InvalidResponse(String),
}

impl DevOpsError {
    /// Create an appropriate error from an HTTP status code and response body
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            // A rejected PAT is answered with 203 and the HTML sign-in page
            203 | 401 => DevOpsError::Unauthorized,
            403 => DevOpsError::Forbidden {
                action: "this operation".into(),
            },
            404 => DevOpsError::NotFound {
                resource: "requested resource".into(),
            },
            429 => DevOpsError::RateLimited { retry_after: 60 },
            _ => DevOpsError::Api {
                status,
                message: if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                },
            },
        }
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authentication configured")]
    NotConfigured,

    #[error("Invalid token format")]
    InvalidToken,
}

/// Report writing errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An identity descriptor that no resolution strategy could name.
///
/// Never fatal: the engine turns it into an `Unknown` identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not resolve identity descriptor '{descriptor}'")]
pub struct ResolutionFailure {
    pub descriptor: String,
}

impl ResolutionFailure {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for Azure DevOps API operations
pub type DevOpsResult<T> = std::result::Result<T, DevOpsError>;
