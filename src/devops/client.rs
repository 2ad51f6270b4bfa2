//! Azure DevOps API client
//!
//! Typed HTTP client for the handful of REST endpoints the audit needs. It
//! implements the collaborator traits of [`crate::permissions`] so the engine
//! never sees HTTP.

use crate::auth::BoxedAuthProvider;
use crate::config::DevOpsConfig;
use crate::devops::types::{
    AccessControlListDto, GraphSubject, IdentityDto, ListResponse, Project, Repository,
};
use crate::error::{DevOpsError, DevOpsResult};
use crate::permissions::acl::AclSource;
use crate::permissions::identity::{Directory, Identity};
use crate::permissions::scope::{ProjectRef, RepositoryRef, ResourceLister};
use crate::util::QueryBuilder;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// Upper bound on how long a `Retry-After` header can stall a request
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Ceiling for the exponential backoff between retries
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Azure DevOps API client
pub struct DevOpsClient {
    http: Client,
    organization_url: String,
    directory_url: String,
    project: String,
    api_version: String,
    auth: BoxedAuthProvider,
    max_retries: u32,
}

impl DevOpsClient {
    /// Create a new client from configuration
    pub fn new(config: &DevOpsConfig, auth: BoxedAuthProvider) -> DevOpsResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(format!("repo-acl-audit/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DevOpsError::Request)?;

        debug!(
            organization = %config.organization_base(),
            directory = %config.directory_base(),
            auth = auth.auth_type(),
            "Created Azure DevOps client"
        );

        Ok(Self {
            http,
            organization_url: config.organization_base(),
            directory_url: config.directory_base(),
            project: config.project.clone(),
            api_version: config.api_version.clone(),
            auth,
            max_retries: config.max_retries,
        })
    }

    /// Graph endpoints are only published as previews
    fn graph_api_version(&self) -> String {
        format!("{}-preview.1", self.api_version)
    }

    /// Add authentication to a request
    async fn authenticate(&self, request: RequestBuilder) -> DevOpsResult<RequestBuilder> {
        let header = self.auth.get_auth_header().await.map_err(|e| {
            warn!(error = %e, "No usable credentials");
            DevOpsError::Unauthorized
        })?;

        Ok(request.header(header.header_name(), header.header_value()))
    }

    /// Execute a request with retries
    async fn execute(&self, request: RequestBuilder) -> DevOpsResult<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(attempt, last_error.as_ref());
                tokio::time::sleep(delay).await;
                debug!(attempt = attempt + 1, "Retrying request");
            }

            let req = request
                .try_clone()
                .ok_or_else(|| DevOpsError::InvalidResponse("Cannot clone request".to_string()))?;

            let result = match req.send().await {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(DevOpsError::Request(e)),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if is_retryable(&e) => {
                    warn!(error = %e, "Request failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DevOpsError::InvalidResponse("Unknown error".to_string())))
    }

    /// Handle API response
    async fn handle_response(&self, response: Response) -> DevOpsResult<Response> {
        let status = response.status();

        // A rejected PAT is redirected to the sign-in page, answered with 203
        if status.is_success() && status != StatusCode::NON_AUTHORITATIVE_INFORMATION {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(60);
            return Err(DevOpsError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        Err(DevOpsError::from_response(status.as_u16(), &body))
    }

    async fn send_get(&self, url: &str) -> DevOpsResult<Response> {
        let request = self.authenticate(self.http.get(url)).await?;
        self.execute(request).await
    }

    /// Make a GET request
    #[instrument(skip(self), fields(url = %url))]
    async fn get<T: DeserializeOwned>(&self, url: &str) -> DevOpsResult<T> {
        let response = self.send_get(url).await?;
        parse_json(response).await
    }

    /// Identities for a query on the identities endpoint; unknown entries are `None`
    async fn identities(&self, query: QueryBuilder) -> DevOpsResult<Vec<Option<IdentityDto>>> {
        let url = format!(
            "{}/_apis/identities{}",
            self.directory_url,
            query.api_version(&self.api_version).build()
        );
        let response: ListResponse<Option<IdentityDto>> = self.get(&url).await?;
        Ok(response.value)
    }

    /// Every subject of one graph collection (`users` or `groups`)
    #[instrument(skip(self))]
    async fn graph_subjects(&self, collection: &str) -> DevOpsResult<Vec<GraphSubject>> {
        let mut subjects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let query = QueryBuilder::new()
                .optional("continuationToken", continuation.as_deref())
                .api_version(&self.graph_api_version())
                .build();
            let url = format!("{}/_apis/graph/{}{}", self.directory_url, collection, query);

            let response = self.send_get(&url).await?;
            let next = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(String::from);

            let page: ListResponse<GraphSubject> = parse_json(response).await?;
            debug!(collection, page = page.value.len(), "Fetched graph page");
            subjects.extend(page.value);

            match next {
                Some(token) if continuation.as_deref() != Some(token.as_str()) => {
                    continuation = Some(token);
                }
                _ => break,
            }
        }

        Ok(subjects)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> DevOpsResult<T> {
    response
        .json()
        .await
        .map_err(|e| DevOpsError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Check if an error is retryable
fn is_retryable(error: &DevOpsError) -> bool {
    match error {
        DevOpsError::Request(e) => e.is_timeout() || e.is_connect(),
        DevOpsError::RateLimited { .. } => true,
        DevOpsError::Api { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Exponential backoff, stretched to honour `Retry-After`
fn retry_delay(attempt: u32, last_error: Option<&DevOpsError>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = Duration::from_millis(100u64.saturating_mul(2u64.saturating_pow(exponent)))
        .min(MAX_BACKOFF);
    match last_error {
        Some(DevOpsError::RateLimited { retry_after }) => {
            backoff.max(Duration::from_secs((*retry_after).min(MAX_RETRY_AFTER_SECS)))
        }
        _ => backoff,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Domain identity for an identities-endpoint record, keyed by the descriptor
/// it was requested under
fn identity_from_dto(descriptor: &str, dto: IdentityDto) -> Identity {
    let account = dto.account().map(String::from);
    let display_name = non_empty(dto.custom_display_name)
        .or_else(|| non_empty(dto.provider_display_name))
        .or(account)
        .unwrap_or_else(|| descriptor.to_string());

    let identity = if dto.is_container {
        Identity::group(descriptor, display_name)
    } else {
        Identity::user(descriptor, display_name)
    };
    identity.with_internal_id(dto.id)
}

fn identity_from_subject(subject: GraphSubject) -> Identity {
    let display_name = non_empty(subject.display_name)
        .or_else(|| non_empty(subject.principal_name))
        .or_else(|| non_empty(subject.mail_address))
        .unwrap_or_else(|| subject.descriptor.clone());

    match subject.subject_kind.as_deref() {
        Some(kind) if kind.eq_ignore_ascii_case("group") => {
            Identity::group(subject.descriptor, display_name)
        }
        _ => Identity::user(subject.descriptor, display_name),
    }
}

#[async_trait]
impl ResourceLister for DevOpsClient {
    async fn project(&self) -> DevOpsResult<ProjectRef> {
        let url = format!(
            "{}/_apis/projects/{}{}",
            self.organization_url,
            urlencoding::encode(&self.project),
            QueryBuilder::new().api_version(&self.api_version).build()
        );

        let project: Project = self.get(&url).await.map_err(|e| match e {
            DevOpsError::NotFound { .. } => DevOpsError::NotFound {
                resource: format!("project '{}'", self.project),
            },
            other => other,
        })?;

        Ok(ProjectRef {
            id: project.id,
            name: project.name,
        })
    }

    async fn repositories(&self, project_id: &str) -> DevOpsResult<Vec<RepositoryRef>> {
        let url = format!(
            "{}/{}/_apis/git/repositories{}",
            self.organization_url,
            urlencoding::encode(project_id),
            QueryBuilder::new().api_version(&self.api_version).build()
        );

        let response: ListResponse<Repository> = self.get(&url).await?;
        Ok(response
            .value
            .into_iter()
            .map(|repo| RepositoryRef {
                id: repo.id,
                name: repo.name,
                default_branch: repo.default_branch,
                is_disabled: repo.is_disabled,
            })
            .collect())
    }
}

#[async_trait]
impl AclSource for DevOpsClient {
    async fn access_control_lists(
        &self,
        namespace_id: &str,
        token: &str,
    ) -> DevOpsResult<Vec<AccessControlListDto>> {
        let query = QueryBuilder::new()
            .param("token", token)
            .param("includeExtendedInfo", true)
            .api_version(&self.api_version)
            .build();
        let url = format!(
            "{}/_apis/accesscontrollists/{}{}",
            self.organization_url, namespace_id, query
        );

        let response: ListResponse<AccessControlListDto> = self.get(&url).await?;
        Ok(response.value)
    }
}

#[async_trait]
impl Directory for DevOpsClient {
    async fn identity_by_descriptor(&self, descriptor: &str) -> DevOpsResult<Option<Identity>> {
        let query = QueryBuilder::new()
            .param("descriptors", descriptor)
            .param("queryMembership", "None");
        let found = self.identities(query).await?.into_iter().flatten().next();

        Ok(found.map(|dto| identity_from_dto(descriptor, dto)))
    }

    async fn list_identities(&self) -> DevOpsResult<Vec<Identity>> {
        let mut identities: Vec<Identity> = self
            .graph_subjects("users")
            .await?
            .into_iter()
            .map(identity_from_subject)
            .collect();
        identities.extend(
            self.graph_subjects("groups")
                .await?
                .into_iter()
                .map(identity_from_subject),
        );
        Ok(identities)
    }

    async fn member_descriptors(&self, group_id: &str) -> DevOpsResult<Vec<String>> {
        let query = QueryBuilder::new()
            .param("identityIds", group_id)
            .param("queryMembership", "Direct");
        let group = self.identities(query).await?.into_iter().flatten().next();

        Ok(group.map(|dto| dto.members).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dto(is_container: bool) -> IdentityDto {
        IdentityDto {
            id: "id-1".to_string(),
            descriptor: "Microsoft.TeamFoundation.Identity;S-1".to_string(),
            subject_descriptor: None,
            provider_display_name: Some("[Fabrikam]\\Contributors".to_string()),
            custom_display_name: None,
            is_container,
            is_active: Some(true),
            members: Vec::new(),
            properties: HashMap::new(),
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&DevOpsError::RateLimited { retry_after: 60 }));
        assert!(is_retryable(&DevOpsError::Api {
            status: 503,
            message: "Service unavailable".to_string()
        }));
        assert!(!is_retryable(&DevOpsError::Api {
            status: 400,
            message: "Bad request".to_string()
        }));
        assert!(!is_retryable(&DevOpsError::Unauthorized));
    }

    #[test]
    fn test_retry_delay() {
        assert_eq!(retry_delay(1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(3, None), Duration::from_millis(400));
        assert_eq!(retry_delay(8, None), MAX_BACKOFF);
        assert_eq!(retry_delay(66, None), MAX_BACKOFF);
        assert_eq!(retry_delay(u32::MAX, None), MAX_BACKOFF);
        assert_eq!(
            retry_delay(1, Some(&DevOpsError::RateLimited { retry_after: 2 })),
            Duration::from_secs(2)
        );
        assert_eq!(
            retry_delay(1, Some(&DevOpsError::RateLimited { retry_after: 3600 })),
            Duration::from_secs(MAX_RETRY_AFTER_SECS)
        );
    }

    #[test]
    fn test_identity_from_dto_group() {
        let identity = identity_from_dto("requested", dto(true));
        assert_eq!(identity.descriptor, "requested");
        assert_eq!(identity.display_name, "[Fabrikam]\\Contributors");
        assert_eq!(identity.kind, crate::permissions::IdentityKind::Group);
        assert_eq!(identity.internal_id.as_deref(), Some("id-1"));
    }

    #[test]
    fn test_identity_from_dto_prefers_custom_name() {
        let mut user = dto(false);
        user.custom_display_name = Some("Alice".to_string());
        let identity = identity_from_dto("d", user);
        assert_eq!(identity.display_name, "Alice");
        assert_eq!(identity.kind, crate::permissions::IdentityKind::User);
    }

    #[test]
    fn test_identity_from_subject() {
        let subject = GraphSubject {
            descriptor: "vssgp.abc".to_string(),
            display_name: None,
            principal_name: Some("[Fabrikam]\\Readers".to_string()),
            mail_address: None,
            subject_kind: Some("group".to_string()),
        };
        let identity = identity_from_subject(subject);
        assert_eq!(identity.display_name, "[Fabrikam]\\Readers");
        assert_eq!(identity.kind, crate::permissions::IdentityKind::Group);
        assert!(identity.internal_id.is_none());
    }
}
