//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Command-line overrides
//! 2. Conventional Azure DevOps environment variables (`AZURE_DEVOPS_EXT_PAT`, ...)
//!    when the prefixed variable for the same key is unset
//! 3. Environment variables (REPO_ACL_AUDIT__*)
//! 4. Configuration file (TOML)
//! 5. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "repo-acl-audit.toml",
    ".repo-acl-audit.toml",
    "~/.config/repo-acl-audit/config.toml",
];

/// Upper bound on `devops.max_retries`
const MAX_RETRIES: u32 = 10;

const ENV_PREFIX: &str = "REPO_ACL_AUDIT";

/// Conventional variables, checked in order, with the config key they fill
/// and the prefixed variable that takes precedence over them.
const CONVENTIONAL_ENV: &[(&str, &str, &str)] = &[
    ("AZURE_DEVOPS_EXT_PAT", "devops.token", "REPO_ACL_AUDIT__DEVOPS__TOKEN"),
    ("AZDO_PAT", "devops.token", "REPO_ACL_AUDIT__DEVOPS__TOKEN"),
    (
        "AZDO_ORG_URL",
        "devops.organization_url",
        "REPO_ACL_AUDIT__DEVOPS__ORGANIZATION_URL",
    ),
    ("AZDO_PROJECT", "devops.project", "REPO_ACL_AUDIT__DEVOPS__PROJECT"),
];

/// Values supplied on the command line; `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub organization_url: Option<String>,
    pub project: Option<String>,
    pub output: Option<String>,
    pub format: Option<String>,
    pub include_branches: Option<bool>,
    pub expand_groups: Option<bool>,
    pub pacing_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(
        &self,
        mut builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let strings = [
            ("devops.organization_url", &self.organization_url),
            ("devops.project", &self.project),
            ("report.output", &self.output),
            ("report.format", &self.format),
            ("logging.level", &self.log_level),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                builder = builder
                    .set_override(key, value.as_str())
                    .map_err(|e| ConfigError::Load(e.to_string()))?;
            }
        }

        let flags = [
            ("report.include_branches", self.include_branches),
            ("report.expand_groups", self.expand_groups),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                builder = builder
                    .set_override(key, value)
                    .map_err(|e| ConfigError::Load(e.to_string()))?;
            }
        }

        if let Some(pacing) = self.pacing_ms {
            builder = builder
                .set_override("report.pacing_ms", pacing)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }

        Ok(builder)
    }
}

/// Load configuration from a TOML string (useful for testing)
///
/// Skips the required-field checks so fragments can be parsed on their own.
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config_relaxed(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files, environment and command-line overrides
pub fn load_config(
    config_path: Option<&str>,
    overrides: &ConfigOverrides,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        let expanded = shellexpand::tilde(path);
        if !Path::new(expanded.as_ref()).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
    } else {
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Prefixed environment variables,
    // e.g. REPO_ACL_AUDIT__DEVOPS__PROJECT -> devops.project
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    // 4. Conventional variables shared with the az devops CLI
    let mut filled: Vec<&str> = Vec::new();
    for (var, key, prefixed) in CONVENTIONAL_ENV {
        if filled.contains(key) || std::env::var(prefixed).is_ok() {
            continue;
        }
        if let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            builder = builder
                .set_override(*key, value)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
            filled.push(*key);
        }
    }

    // 5. Command-line overrides
    builder = overrides.apply(builder)?;

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values (relaxed - no required fields)
fn validate_config_relaxed(config: &AppConfig) -> Result<(), ConfigError> {
    let devops = &config.devops;

    if !devops.organization_url.is_empty()
        && !devops.organization_url.starts_with("http://")
        && !devops.organization_url.starts_with("https://")
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "devops.organization_url must start with http:// or https://, got: {}",
                devops.organization_url
            ),
        });
    }

    if let Some(url) = &devops.directory_url
        && !url.starts_with("http://")
        && !url.starts_with("https://")
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "devops.directory_url must start with http:// or https://, got: {}",
                url
            ),
        });
    }

    if devops.api_version.trim().is_empty() {
        return Err(ConfigError::Invalid {
            message: "devops.api_version must not be empty".to_string(),
        });
    }

    if devops.max_retries > MAX_RETRIES {
        return Err(ConfigError::Invalid {
            message: format!(
                "devops.max_retries must be at most {}, got: {}",
                MAX_RETRIES, devops.max_retries
            ),
        });
    }

    if devops.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "devops.timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.report.output.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "report.output".to_string(),
        });
    }

    validate_patterns(&config.report.include, "report.include")?;
    validate_patterns(&config.report.exclude, "report.exclude")?;

    Ok(())
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let devops = &config.devops;

    if devops.organization_url.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "devops.organization_url (set AZDO_ORG_URL or --organization)".to_string(),
        });
    }

    if devops.project.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "devops.project (set AZDO_PROJECT or --project)".to_string(),
        });
    }

    if devops.token.as_ref().is_none_or(|t| t.is_empty()) {
        return Err(ConfigError::Missing {
            field: "devops.token (set AZURE_DEVOPS_EXT_PAT environment variable)".to_string(),
        });
    }

    validate_config_relaxed(config)
}

/// Validate that all patterns are valid regex
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!("in {}: {}", field_path, e),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DevOpsConfig, ReportConfig};
    use crate::util::SecretString;

    fn complete_config() -> AppConfig {
        AppConfig {
            devops: DevOpsConfig {
                organization_url: "https://dev.azure.com/contoso".to_string(),
                project: "Fabrikam".to_string(),
                token: Some(SecretString::new("pat")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[devops]
organization_url = "https://dev.azure.com/contoso"
project = "Fabrikam"
token = "pat"

[report]
output = "out.json"
format = "json"
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.devops.organization_url, "https://dev.azure.com/contoso");
        assert_eq!(config.devops.project, "Fabrikam");
        assert_eq!(
            config.devops.token.as_ref().map(|t| t.expose_secret()),
            Some("pat")
        );
        assert_eq!(config.report.output, "out.json");
    }

    #[test]
    fn test_invalid_url_error() {
        let toml = r#"
[devops]
organization_url = "dev.azure.com/contoso"
"#;

        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_complete_config_validates() {
        assert!(validate_config(&complete_config()).is_ok());
    }

    #[test]
    fn test_missing_token() {
        let mut config = complete_config();
        config.devops.token = None;

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field.starts_with("devops.token")));
    }

    #[test]
    fn test_blank_token_is_missing() {
        let mut config = complete_config();
        config.devops.token = Some(SecretString::new(""));

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_missing_project() {
        let mut config = complete_config();
        config.devops.project = String::new();

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field.starts_with("devops.project")));
    }

    #[test]
    fn test_missing_organization() {
        let mut config = complete_config();
        config.devops.organization_url = "  ".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, ConfigError::Missing { ref field } if field.starts_with("devops.organization_url"))
        );
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let config = AppConfig {
            report: ReportConfig {
                exclude: vec!["[invalid".to_string()],
                ..Default::default()
            },
            ..complete_config()
        };

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = complete_config();
        config.devops.timeout_secs = 0;

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_excessive_retries_rejected() {
        let mut config = complete_config();
        config.devops.max_retries = MAX_RETRIES;
        assert!(validate_config(&config).is_ok());

        config.devops.max_retries = 100;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { ref message }) if message.contains("max_retries")
        ));
    }
}
