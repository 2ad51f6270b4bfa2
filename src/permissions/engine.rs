//! Scope resolution engine
//!
//! Walks the scope chain of each resource from most to least specific,
//! evaluates every ACE bit by bit and emits one [`PermissionRecord`] per
//! (identity, permission) pair. The first scope to decide a pair wins; less
//! specific scopes never overwrite it, whatever their decision.

use crate::permissions::acl::AclFetcher;
use crate::permissions::catalog::{self, describe_mask};
use crate::permissions::identity::{Identity, IdentityKind, IdentityResolver};
use crate::permissions::record::PermissionRecord;
use crate::permissions::scope::{Resource, Scope};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

/// Tuning for one run
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Emit records for the user members of groups
    pub expand_groups: bool,
    /// Delay between resources
    pub pacing: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            expand_groups: true,
            pacing: Duration::ZERO,
        }
    }
}

/// Why a resource was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource '{0}' has no scopes")]
    EmptyChain(String),

    #[error("scope chain of '{0}' is not ordered from most to least specific")]
    UnorderedChain(String),
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub resources_processed: usize,
    pub resources_skipped: usize,
    pub records: usize,
    pub failed_scopes: usize,
    pub unresolved_identities: usize,
}

/// Output of [`ScopeEngine::run`]
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub records: Vec<PermissionRecord>,
    pub summary: RunSummary,
}

pub struct ScopeEngine {
    fetcher: AclFetcher,
    resolver: IdentityResolver,
    options: EngineOptions,
    failed_scopes: usize,
}

impl ScopeEngine {
    pub fn new(fetcher: AclFetcher, resolver: IdentityResolver, options: EngineOptions) -> Self {
        Self {
            fetcher,
            resolver,
            options,
            failed_scopes: 0,
        }
    }

    /// Process resources one after another.
    ///
    /// A resource that fails is logged and skipped; the rest still run.
    pub async fn run(&mut self, resources: &[Resource]) -> RunOutput {
        let mut output = RunOutput::default();

        for (index, resource) in resources.iter().enumerate() {
            if index > 0 && !self.options.pacing.is_zero() {
                tokio::time::sleep(self.options.pacing).await;
            }

            match self.resolve_resource(resource).await {
                Ok(records) => {
                    debug!(
                        resource = %resource.name,
                        records = records.len(),
                        "Resource resolved"
                    );
                    output.summary.resources_processed += 1;
                    output.records.extend(records);
                }
                Err(e) => {
                    warn!(resource = %resource.name, error = %e, "Skipping resource");
                    output.summary.resources_skipped += 1;
                }
            }
        }

        output.summary.records = output.records.len();
        output.summary.failed_scopes = self.failed_scopes;
        output.summary.unresolved_identities = self.resolver.cache().failed_count();

        info!(
            processed = output.summary.resources_processed,
            skipped = output.summary.resources_skipped,
            records = output.summary.records,
            failed_scopes = output.summary.failed_scopes,
            unresolved = output.summary.unresolved_identities,
            resolved = self.resolver.cache().resolved_count(),
            expanded_groups = self.resolver.cache().expanded_groups(),
            "Permission resolution finished"
        );

        output
    }

    /// Flatten the scope chain of one resource into records
    #[instrument(skip(self, resource), fields(resource = %resource.name))]
    pub async fn resolve_resource(
        &mut self,
        resource: &Resource,
    ) -> Result<Vec<PermissionRecord>, ResourceError> {
        check_chain(resource)?;

        let mut seen: HashSet<(String, &'static str)> = HashSet::new();
        let mut records = Vec::new();

        for (position, scope) in resource.scopes.iter().enumerate() {
            let is_direct = position == 0;
            self.resolve_scope(resource, scope, is_direct, &mut seen, &mut records)
                .await;
        }

        Ok(records)
    }

    async fn resolve_scope(
        &mut self,
        resource: &Resource,
        scope: &Scope,
        is_direct: bool,
        seen: &mut HashSet<(String, &'static str)>,
        records: &mut Vec<PermissionRecord>,
    ) {
        let fetch = self.fetcher.fetch_acl(&scope.token).await;
        if fetch.warning.is_some() {
            self.failed_scopes += 1;
        }
        debug!(
            scope = %scope.kind,
            token = %scope.token,
            entries = fetch.acl.entries.len(),
            inherits = fetch.acl.inherit_permissions,
            "Evaluating scope"
        );

        for ace in fetch.acl.entries.values() {
            let identity = self
                .resolver
                .resolve(&ace.descriptor)
                .await
                .unwrap_or_else(Identity::from);
            trace!(
                identity = %identity.display_name,
                allow = ?describe_mask(ace.allow),
                deny = ?describe_mask(ace.deny),
                "Evaluating entry"
            );
            let unknown = catalog::unknown_bits(ace.allow | ace.deny);
            if !unknown.is_empty() {
                debug!(
                    identity = %identity.display_name,
                    bits = ?unknown,
                    "Entry sets bits outside the catalog"
                );
            }

            for permission in catalog::all_bits() {
                let Some(access) = catalog::decide(ace.allow, ace.deny, permission.bit).access()
                else {
                    continue;
                };

                if !seen.insert((identity.descriptor.clone(), permission.name)) {
                    continue;
                }

                let record = PermissionRecord::direct(
                    resource,
                    &identity,
                    permission.name,
                    access,
                    ace,
                    scope.kind,
                    is_direct,
                );

                let expand = identity.kind == IdentityKind::Group && self.options.expand_groups;
                records.push(record);
                if !expand {
                    continue;
                }

                let group_index = records.len() - 1;
                for member in self.resolver.expand_members(&identity).await {
                    if seen.insert((member.descriptor.clone(), permission.name)) {
                        let member_record = PermissionRecord::member(&records[group_index], &member);
                        records.push(member_record);
                    }
                }
            }
        }
    }
}

fn check_chain(resource: &Resource) -> Result<(), ResourceError> {
    if resource.scopes.is_empty() {
        return Err(ResourceError::EmptyChain(resource.name.clone()));
    }
    if resource.scopes.windows(2).any(|w| w[0].kind >= w[1].kind) {
        return Err(ResourceError::UnorderedChain(resource.name.clone()));
    }
    Ok(())
}
