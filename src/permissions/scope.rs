//! Security scopes and the resources reported on
//!
//! Git permissions can be set at three levels. Each level has a security
//! token under the `repoV2` prefix:
//!
//! - project: `repoV2/{projectId}`
//! - repository: `repoV2/{projectId}/{repositoryId}`
//! - branch: `repoV2/{projectId}/{repositoryId}/refs/heads/{segments}`, where
//!   every path segment of the branch name is hex-encoded UTF-16LE.

use crate::error::DevOpsResult;
use crate::permissions::patterns::RepositoryFilter;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;
use tracing::debug;

const TOKEN_PREFIX: &str = "repoV2";
const HEADS_PREFIX: &str = "refs/heads/";

/// Scope level, ordered from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScopeKind {
    Branch,
    Repository,
    Project,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Branch => "Branch",
            ScopeKind::Repository => "Repository",
            ScopeKind::Project => "Project",
        };
        write!(f, "{}", name)
    }
}

/// One link of a scope chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub token: String,
}

impl Scope {
    pub fn project(project_id: &str) -> Self {
        Self {
            kind: ScopeKind::Project,
            token: project_token(project_id),
        }
    }

    pub fn repository(project_id: &str, repository_id: &str) -> Self {
        Self {
            kind: ScopeKind::Repository,
            token: repository_token(project_id, repository_id),
        }
    }

    pub fn branch(project_id: &str, repository_id: &str, branch: &str) -> Self {
        Self {
            kind: ScopeKind::Branch,
            token: branch_token(project_id, repository_id, branch),
        }
    }
}

/// Something permissions are reported for, with its scope chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub branch: Option<String>,
    /// Most specific first
    pub scopes: Vec<Scope>,
}

impl Resource {
    pub fn repository(project_id: &str, repository_id: &str, name: &str) -> Self {
        Self {
            id: repository_id.to_string(),
            name: name.to_string(),
            branch: None,
            scopes: vec![
                Scope::repository(project_id, repository_id),
                Scope::project(project_id),
            ],
        }
    }

    /// Branch of a repository, reported as `<repo>@<branch>`
    pub fn branch(project_id: &str, repository_id: &str, name: &str, branch: &str) -> Self {
        let branch = short_branch_name(branch);
        Self {
            id: repository_id.to_string(),
            name: format!("{}@{}", name, branch),
            branch: Some(branch.to_string()),
            scopes: vec![
                Scope::branch(project_id, repository_id, branch),
                Scope::repository(project_id, repository_id),
                Scope::project(project_id),
            ],
        }
    }
}

/// Project the report is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// Repository as listed by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub id: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub is_disabled: bool,
}

/// Lists what the report covers
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// The configured project; also the first authenticated call of a run
    async fn project(&self) -> DevOpsResult<ProjectRef>;

    async fn repositories(&self, project_id: &str) -> DevOpsResult<Vec<RepositoryRef>>;
}

pub fn project_token(project_id: &str) -> String {
    format!("{}/{}", TOKEN_PREFIX, project_id)
}

pub fn repository_token(project_id: &str, repository_id: &str) -> String {
    format!("{}/{}/{}", TOKEN_PREFIX, project_id, repository_id)
}

pub fn branch_token(project_id: &str, repository_id: &str, branch: &str) -> String {
    let encoded: Vec<String> = short_branch_name(branch)
        .split('/')
        .map(hex_utf16le)
        .collect();
    format!(
        "{}/{}{}",
        repository_token(project_id, repository_id),
        HEADS_PREFIX,
        encoded.join("/")
    )
}

/// `refs/heads/main` → `main`
pub fn short_branch_name(branch: &str) -> &str {
    branch.strip_prefix(HEADS_PREFIX).unwrap_or(branch)
}

fn hex_utf16le(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() * 4);
    for unit in segment.encode_utf16() {
        let [lo, hi] = unit.to_le_bytes();
        let _ = write!(out, "{:02x}{:02x}", lo, hi);
    }
    out
}

/// Resources to report, in listing order.
///
/// Disabled repositories and those rejected by `filter` are skipped. With
/// `include_branches`, a repository with a default branch is followed by a
/// branch resource for it.
pub fn plan_resources(
    project_id: &str,
    repositories: &[RepositoryRef],
    filter: &RepositoryFilter,
    include_branches: bool,
) -> Vec<Resource> {
    let mut resources = Vec::new();

    for repo in repositories {
        if repo.is_disabled {
            debug!(repository = %repo.name, "Skipping disabled repository");
            continue;
        }
        if !filter.admits(&repo.name) {
            debug!(repository = %repo.name, "Repository filtered out");
            continue;
        }

        resources.push(Resource::repository(project_id, &repo.id, &repo.name));

        if include_branches && let Some(branch) = &repo.default_branch {
            resources.push(Resource::branch(project_id, &repo.id, &repo.name, branch));
        }
    }

    resources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, default_branch: Option<&str>) -> RepositoryRef {
        RepositoryRef {
            id: format!("id-{}", name),
            name: name.to_string(),
            default_branch: default_branch.map(String::from),
            is_disabled: false,
        }
    }

    #[test]
    fn test_tokens() {
        assert_eq!(project_token("p"), "repoV2/p");
        assert_eq!(repository_token("p", "r"), "repoV2/p/r");
        assert_eq!(
            branch_token("p", "r", "refs/heads/main"),
            "repoV2/p/r/refs/heads/6d00610069006e00"
        );
    }

    #[test]
    fn test_branch_token_encodes_each_segment() {
        assert_eq!(
            branch_token("p", "r", "feature/x"),
            "repoV2/p/r/refs/heads/6600650061007400750072006500/7800"
        );
    }

    #[test]
    fn test_hex_utf16le_non_ascii() {
        assert_eq!(hex_utf16le("é"), "e900");
    }

    #[test]
    fn test_scope_kind_specificity_order() {
        assert!(ScopeKind::Branch < ScopeKind::Repository);
        assert!(ScopeKind::Repository < ScopeKind::Project);
    }

    #[test]
    fn test_branch_resource_chain() {
        let resource = Resource::branch("p", "r", "web", "refs/heads/main");
        assert_eq!(resource.name, "web@main");
        assert_eq!(resource.branch.as_deref(), Some("main"));
        let kinds: Vec<ScopeKind> = resource.scopes.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ScopeKind::Branch, ScopeKind::Repository, ScopeKind::Project]
        );
    }

    #[test]
    fn test_plan_resources() {
        let mut disabled = repo("old", Some("refs/heads/main"));
        disabled.is_disabled = true;
        let repos = vec![
            repo("web", Some("refs/heads/main")),
            repo("empty", None),
            disabled,
        ];

        let plain = plan_resources("p", &repos, &RepositoryFilter::default(), false);
        let names: Vec<&str> = plain.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["web", "empty"]);

        let with_branches = plan_resources("p", &repos, &RepositoryFilter::default(), true);
        let names: Vec<&str> = with_branches.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["web", "web@main", "empty"]);
    }

    #[test]
    fn test_plan_resources_applies_filter() {
        let filter = RepositoryFilter::new(&[], &["^legacy-".to_string()]).unwrap();
        let repos = vec![repo("web", None), repo("legacy-api", None)];

        let resources = plan_resources("p", &repos, &filter, false);

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "web");
    }
}
