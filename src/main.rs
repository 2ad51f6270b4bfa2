//! Azure DevOps Git permission audit
//!
//! Writes the effective Git permissions of a project to a CSV or JSON report.

use clap::Parser;
use repo_acl_audit::{
    config::{ConfigOverrides, LogFormat, LoggingConfig, ReportFormat, load_config},
    run_audit,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Report who can do what in the Git repositories of an Azure DevOps project
#[derive(Parser, Debug)]
#[command(name = "repo-acl-audit")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "REPO_ACL_AUDIT_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REPO_ACL_AUDIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Organization URL, e.g. https://dev.azure.com/contoso
    #[arg(long)]
    organization: Option<String>,

    /// Project name or id
    #[arg(short, long)]
    project: Option<String>,

    /// Report file path
    #[arg(short, long)]
    output: Option<String>,

    /// Report format (csv, json)
    #[arg(short, long, value_parser = parse_format)]
    format: Option<ReportFormat>,

    /// Also report the default branch of every repository
    #[arg(long)]
    include_branches: bool,

    /// Report group grants without listing the group members
    #[arg(long)]
    no_expand_groups: bool,

    /// Delay between repositories in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,
}

fn parse_format(s: &str) -> Result<ReportFormat, String> {
    ReportFormat::try_parse(s).ok_or_else(|| format!("unknown report format '{}'", s))
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            organization_url: self.organization.clone(),
            project: self.project.clone(),
            output: self.output.clone(),
            format: self.format.map(|f| match f {
                ReportFormat::Csv => "csv".to_string(),
                ReportFormat::Json => "json".to_string(),
            }),
            include_branches: self.include_branches.then_some(true),
            expand_groups: self.no_expand_groups.then_some(false),
            pacing_ms: self.pacing_ms,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Pick up AZURE_DEVOPS_EXT_PAT and friends from a local .env
    let _ = dotenvy::dotenv();

    // Configuration decides the log format, so it is loaded first
    let config = match load_config(args.config.as_deref(), &args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        project = %config.devops.project,
        "Starting permission audit"
    );

    let outcome = run_audit(&config)
        .await
        .inspect_err(|e| error!(error = %e, "Audit failed"))?;

    info!(
        path = %outcome.output.display(),
        records = outcome.summary.records,
        skipped = outcome.summary.resources_skipped,
        "Audit complete"
    );

    Ok(())
}
