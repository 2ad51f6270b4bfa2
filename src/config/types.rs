//! Configuration types for repo-acl-audit
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files, environment variables and command-line overrides.

use crate::util::SecretString;
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Azure DevOps connection settings
    pub devops: DevOpsConfig,

    /// Report contents and output
    pub report: ReportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Azure DevOps connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevOpsConfig {
    /// Organization URL (e.g., `https://dev.azure.com/contoso`)
    pub organization_url: String,

    /// Project name or id
    pub project: String,

    /// Personal Access Token (prefer env var AZURE_DEVOPS_EXT_PAT)
    pub token: Option<SecretString>,

    /// Identity service base URL; derived from the organization URL when unset
    pub directory_url: Option<String>,

    /// REST API version (default: "7.1")
    pub api_version: String,

    /// How the token is presented to the service
    pub auth_scheme: AuthScheme,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for failed requests
    pub max_retries: u32,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,
}

impl Default for DevOpsConfig {
    fn default() -> Self {
        Self {
            organization_url: String::new(),
            project: String::new(),
            token: None,
            directory_url: None,
            api_version: "7.1".to_string(),
            auth_scheme: AuthScheme::Basic,
            timeout_secs: 30,
            max_retries: 3,
            verify_ssl: true,
        }
    }
}

impl DevOpsConfig {
    /// Organization URL without a trailing slash
    pub fn organization_base(&self) -> String {
        self.organization_url.trim_end_matches('/').to_string()
    }

    /// Base URL of the identity (VSSPS) service.
    ///
    /// `https://dev.azure.com/{org}` maps to `https://vssps.dev.azure.com/{org}`
    /// and `https://{org}.visualstudio.com` to
    /// `https://{org}.vssps.visualstudio.com`. Any other host is assumed to be
    /// an on-premises server that serves identities itself.
    pub fn directory_base(&self) -> String {
        if let Some(url) = &self.directory_url {
            return url.trim_end_matches('/').to_string();
        }

        let base = self.organization_base();
        let Some((scheme, rest)) = base.split_once("://") else {
            return base;
        };

        if let Some(org_path) = rest.strip_prefix("dev.azure.com/") {
            return format!("{}://vssps.dev.azure.com/{}", scheme, org_path);
        }

        let (host, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
        if let Some(org) = host.strip_suffix(".visualstudio.com")
            && !org.contains('.')
        {
            return format!("{}://{}.vssps.visualstudio.com{}", scheme, org, path);
        }

        base
    }
}

/// How the access token is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP Basic with an empty user name (personal access tokens)
    #[default]
    Basic,
    /// OAuth bearer token (Entra ID access tokens)
    Bearer,
}

/// Report configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output file path
    pub output: String,

    /// Output format
    pub format: ReportFormat,

    /// Also report the default branch of every repository
    pub include_branches: bool,

    /// Expand group grants into their (transitive) user members
    pub expand_groups: bool,

    /// Delay between resources in milliseconds
    pub pacing_ms: u64,

    /// Repository name patterns to report (regex; empty means all)
    pub include: Vec<String>,

    /// Repository name patterns to skip (regex)
    pub exclude: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: "acl-report.csv".to_string(),
            format: ReportFormat::Csv,
            include_branches: false,
            expand_groups: true,
            pacing_ms: 0,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// Report file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ReportFormat::Csv),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
