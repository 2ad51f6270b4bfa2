//! Identity resolution
//!
//! ACEs name principals by opaque descriptors. [`IdentityResolver`] turns a
//! descriptor into an [`Identity`] using, in order:
//!
//! 1. the descriptor matchers, pure functions that recognise formats carrying
//!    the principal name inline (no network call),
//! 2. a directory lookup by descriptor,
//! 3. an exact match against the directory's full user and group listing,
//!    fetched once per run.
//!
//! Results, including failures, are cached for the lifetime of the resolver.

use crate::error::{DevOpsResult, ResolutionFailure};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

const CLAIMS_PREFIX: &str = "Microsoft.IdentityModel.Claims.ClaimsIdentity;";
const BIND_PENDING_PREFIX: &str = "Microsoft.TeamFoundation.BindPendingIdentity;";
const TEAM_FOUNDATION_PREFIX: &str = "Microsoft.TeamFoundation.Identity;";

const UNKNOWN_NAME_CHARS: usize = 32;

/// Kind of security principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IdentityKind {
    User,
    Group,
    Unknown,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::User => "User",
            IdentityKind::Group => "Group",
            IdentityKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved security principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Descriptor as it appears in ACEs; the primary key
    pub descriptor: String,
    pub display_name: String,
    pub kind: IdentityKind,
    /// Directory id used for membership queries
    pub internal_id: Option<String>,
}

impl Identity {
    pub fn user(descriptor: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            display_name: display_name.into(),
            kind: IdentityKind::User,
            internal_id: None,
        }
    }

    pub fn group(descriptor: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            display_name: display_name.into(),
            kind: IdentityKind::Group,
            internal_id: None,
        }
    }

    /// Placeholder for a descriptor nothing could resolve
    pub fn unknown(descriptor: impl Into<String>) -> Self {
        let descriptor = descriptor.into();
        Self {
            display_name: unknown_display_name(&descriptor),
            descriptor,
            kind: IdentityKind::Unknown,
            internal_id: None,
        }
    }

    pub fn with_internal_id(mut self, id: impl Into<String>) -> Self {
        self.internal_id = Some(id.into());
        self
    }
}

impl From<ResolutionFailure> for Identity {
    fn from(failure: ResolutionFailure) -> Self {
        Identity::unknown(failure.descriptor)
    }
}

/// `Unknown (<first 32 chars of the descriptor>…)`
pub fn unknown_display_name(descriptor: &str) -> String {
    let mut chars = descriptor.chars();
    let head: String = chars.by_ref().take(UNKNOWN_NAME_CHARS).collect();
    if chars.next().is_some() {
        format!("Unknown ({}…)", head)
    } else {
        format!("Unknown ({})", head)
    }
}

/// Identity directory of the hosting service
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up one descriptor; `Ok(None)` when the directory does not know it
    async fn identity_by_descriptor(&self, descriptor: &str) -> DevOpsResult<Option<Identity>>;

    /// Every user and group of the organization
    async fn list_identities(&self) -> DevOpsResult<Vec<Identity>>;

    /// Descriptors of the direct members of the group with this internal id
    async fn member_descriptors(&self, group_id: &str) -> DevOpsResult<Vec<String>>;
}

/// A pure descriptor recogniser
pub type DescriptorMatcher = fn(&str) -> Option<Identity>;

/// Matchers tried before any directory call, in order
pub const DESCRIPTOR_MATCHERS: &[(&str, DescriptorMatcher)] = &[
    ("claims", match_claims_identity),
    ("bind-pending", match_bind_pending_identity),
];

/// `Microsoft.IdentityModel.Claims.ClaimsIdentity;<tenant>\<upn>` with an
/// email-like UPN names the user directly.
pub fn match_claims_identity(descriptor: &str) -> Option<Identity> {
    let claims = descriptor.strip_prefix(CLAIMS_PREFIX)?;
    let principal = principal_name(claims)?;
    Some(Identity::user(descriptor, principal))
}

/// Users granted access before their first sign-in. The directory has no
/// record of them yet, but the descriptor carries the UPN.
pub fn match_bind_pending_identity(descriptor: &str) -> Option<Identity> {
    let claims = descriptor.strip_prefix(BIND_PENDING_PREFIX)?;
    let principal = principal_name(claims)?;
    Some(Identity::user(descriptor, format!("{} (pending)", principal)))
}

fn principal_name(claims: &str) -> Option<&str> {
    let candidate = claims.rsplit('\\').next()?;
    is_email_like(candidate).then_some(candidate)
}

fn is_email_like(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

/// Keys under which a descriptor may appear in the directory listing.
///
/// Graph subjects carry `vssgp.<base64url(SID)>` descriptors for groups that
/// ACEs name as `Microsoft.TeamFoundation.Identity;<SID>`.
pub fn catalog_keys(descriptor: &str) -> Vec<String> {
    let mut keys = vec![descriptor.to_string()];
    if let Some(sid) = descriptor.strip_prefix(TEAM_FOUNDATION_PREFIX)
        && !sid.is_empty()
    {
        keys.push(format!("vssgp.{}", URL_SAFE_NO_PAD.encode(sid)));
    }
    keys
}

/// Per-run memo of everything the resolver learned
#[derive(Debug, Default)]
pub struct IdentityCache {
    /// `None` marks a descriptor that failed every strategy
    identities: HashMap<String, Option<Identity>>,
    /// Expanded user members keyed by group internal id
    members: HashMap<String, Vec<Identity>>,
    /// Directory listing keyed by descriptor, loaded on first use
    catalog: Option<HashMap<String, Identity>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved_count(&self) -> usize {
        self.identities.values().filter(|i| i.is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.identities.values().filter(|i| i.is_none()).count()
    }

    pub fn expanded_groups(&self) -> usize {
        self.members.len()
    }
}

/// Descriptor → identity resolution with group expansion
pub struct IdentityResolver {
    directory: Arc<dyn Directory>,
    cache: IdentityCache,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            cache: IdentityCache::new(),
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Resolve a descriptor, consulting the cache first
    pub async fn resolve(&mut self, descriptor: &str) -> Result<Identity, ResolutionFailure> {
        if let Some(cached) = self.cache.identities.get(descriptor) {
            return cached
                .clone()
                .ok_or_else(|| ResolutionFailure::new(descriptor));
        }

        let resolved = self.resolve_uncached(descriptor).await;
        if resolved.is_none() {
            debug!(descriptor, "Identity could not be resolved");
        }
        self.cache
            .identities
            .insert(descriptor.to_string(), resolved.clone());

        resolved.ok_or_else(|| ResolutionFailure::new(descriptor))
    }

    async fn resolve_uncached(&mut self, descriptor: &str) -> Option<Identity> {
        for (name, matcher) in DESCRIPTOR_MATCHERS {
            if let Some(identity) = matcher(descriptor) {
                trace!(descriptor, matcher = name, "Descriptor matched");
                return Some(identity);
            }
        }

        match self.directory.identity_by_descriptor(descriptor).await {
            Ok(Some(identity)) => return Some(identity),
            Ok(None) => trace!(descriptor, "Directory has no record for descriptor"),
            Err(e) => warn!(descriptor, error = %e, "Directory lookup failed"),
        }

        let catalog = self.catalog().await;
        catalog_keys(descriptor)
            .iter()
            .find_map(|key| catalog.get(key))
            .map(|found| Identity {
                descriptor: descriptor.to_string(),
                ..found.clone()
            })
    }

    async fn catalog(&mut self) -> &HashMap<String, Identity> {
        if self.cache.catalog.is_none() {
            let listing = match self.directory.list_identities().await {
                Ok(identities) => {
                    debug!(count = identities.len(), "Loaded identity catalog");
                    identities
                }
                Err(e) => {
                    warn!(error = %e, "Identity catalog unavailable, continuing without it");
                    Vec::new()
                }
            };
            let index = listing
                .into_iter()
                .map(|identity| (identity.descriptor.clone(), identity))
                .collect();
            self.cache.catalog = Some(index);
        }

        self.cache.catalog.get_or_insert_with(HashMap::new)
    }

    /// Transitive user members of a group.
    ///
    /// Walks nested groups with a worklist; a visited set of internal ids
    /// stops cycles. Nested groups are not part of the result. Members that
    /// cannot be resolved are returned as `Unknown` identities.
    pub async fn expand_members(&mut self, group: &Identity) -> Vec<Identity> {
        let Some(root) = group.internal_id.clone() else {
            debug!(group = %group.display_name, "Group has no directory id, not expanding");
            return Vec::new();
        };

        if let Some(cached) = self.cache.members.get(&root) {
            return cached.clone();
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<String> = VecDeque::from([root.clone()]);
        let mut members = Vec::new();

        while let Some(group_id) = pending.pop_front() {
            if !visited.insert(group_id.clone()) {
                trace!(group_id = %group_id, "Group already visited");
                continue;
            }

            let descriptors = match self.directory.member_descriptors(&group_id).await {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!(group_id = %group_id, error = %e, "Failed to list group members");
                    continue;
                }
            };

            for descriptor in descriptors {
                let member = self
                    .resolve(&descriptor)
                    .await
                    .unwrap_or_else(Identity::from);

                match member.kind {
                    IdentityKind::Group => match &member.internal_id {
                        Some(id) => pending.push_back(id.clone()),
                        None => debug!(
                            group = %member.display_name,
                            "Nested group has no directory id, not expanding"
                        ),
                    },
                    IdentityKind::User | IdentityKind::Unknown => {
                        if emitted.insert(member.descriptor.clone()) {
                            members.push(member);
                        }
                    }
                }
            }
        }

        debug!(
            group = %group.display_name,
            members = members.len(),
            groups_walked = visited.len(),
            "Expanded group"
        );
        self.cache.members.insert(root, members.clone());
        members
    }
}
