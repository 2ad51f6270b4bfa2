//! One audit run, from configuration to report file

use crate::auth::create_auth_provider;
use crate::config::AppConfig;
use crate::devops::DevOpsClient;
use crate::error::Result;
use crate::permissions::scope::plan_resources;
use crate::permissions::{
    AclFetcher, EngineOptions, GIT_REPOSITORIES_NAMESPACE, IdentityResolver, RepositoryFilter,
    ResourceLister, RunSummary, ScopeEngine,
};
use crate::report::{Report, write_report};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub output: PathBuf,
    pub summary: RunSummary,
}

/// Run the audit described by `config`.
///
/// Fails only on fatal errors: unusable credentials, an unreachable project
/// or repository listing, or a report that cannot be written. Everything
/// below resource level is recovered inside the engine.
pub async fn run_audit(config: &AppConfig) -> Result<AuditOutcome> {
    let filter = RepositoryFilter::new(&config.report.include, &config.report.exclude)?;

    let auth = create_auth_provider(&config.devops)
        .inspect_err(|e| error!(error = %e, "Failed to create auth provider"))?;
    let client = Arc::new(
        DevOpsClient::new(&config.devops, auth)
            .inspect_err(|e| error!(error = %e, "Failed to create Azure DevOps client"))?,
    );

    // First authenticated call; a rejected token stops the run here
    let project = client
        .project()
        .await
        .inspect_err(|e| error!(error = %e, "Cannot access project"))?;
    info!(project = %project.name, id = %project.id, "Connected to project");

    let repositories = client
        .repositories(&project.id)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to list repositories"))?;

    let resources = plan_resources(
        &project.id,
        &repositories,
        &filter,
        config.report.include_branches,
    );
    info!(
        repositories = repositories.len(),
        resources = resources.len(),
        "Planned resources"
    );

    let options = EngineOptions {
        expand_groups: config.report.expand_groups,
        pacing: Duration::from_millis(config.report.pacing_ms),
    };
    let mut engine = ScopeEngine::new(
        AclFetcher::new(client.clone(), GIT_REPOSITORIES_NAMESPACE),
        IdentityResolver::new(client.clone()),
        options,
    );
    let run = engine.run(&resources).await;

    let output = PathBuf::from(shellexpand::tilde(&config.report.output).as_ref());
    let report = Report {
        organization: &config.devops.organization_url,
        project: &project.name,
        summary: &run.summary,
        records: &run.records,
    };
    write_report(&output, config.report.format, &report)
        .inspect_err(|e| error!(error = %e, path = %output.display(), "Failed to write report"))?;

    Ok(AuditOutcome {
        output,
        summary: run.summary,
    })
}
