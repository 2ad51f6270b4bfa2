//! ACL fetching and validation
//!
//! The service returns ACEs as a dictionary keyed by descriptor with signed
//! 64-bit masks. They are validated here into [`AccessControlEntry`] values;
//! entries that cannot be represented are rejected with a log line.

use crate::devops::types::{AccessControlEntryDto, AccessControlListDto};
use crate::error::DevOpsResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One identity's allow/deny pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub descriptor: String,
    pub allow: u32,
    pub deny: u32,
    pub effective_allow: Option<u32>,
    pub effective_deny: Option<u32>,
}

impl AccessControlEntry {
    pub fn new(descriptor: impl Into<String>, allow: u32, deny: u32) -> Self {
        Self {
            descriptor: descriptor.into(),
            allow,
            deny,
            effective_allow: None,
            effective_deny: None,
        }
    }
}

/// Entries of one security token, ordered by descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControlList {
    pub token: String,
    pub inherit_permissions: bool,
    pub entries: BTreeMap<String, AccessControlEntry>,
}

impl AccessControlList {
    pub fn empty(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            inherit_permissions: true,
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate a wire ACL, returning it with the number of rejected entries
    pub fn from_dto(dto: AccessControlListDto) -> (Self, usize) {
        let mut entries = BTreeMap::new();
        let mut rejected = 0;

        for (key, ace) in dto.aces_dictionary {
            match parse_entry(&key, ace) {
                Ok(entry) => {
                    entries.insert(entry.descriptor.clone(), entry);
                }
                Err(reason) => {
                    warn!(token = %dto.token, key = %key, reason, "Rejected access control entry");
                    rejected += 1;
                }
            }
        }

        let acl = Self {
            token: dto.token,
            inherit_permissions: dto.inherit_permissions,
            entries,
        };
        (acl, rejected)
    }
}

fn parse_entry(key: &str, ace: AccessControlEntryDto) -> Result<AccessControlEntry, &'static str> {
    let descriptor = ace
        .descriptor
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| key.to_string());
    if descriptor.trim().is_empty() {
        return Err("empty descriptor");
    }

    let allow = mask(ace.allow).ok_or("allow mask out of range")?;
    let deny = mask(ace.deny).ok_or("deny mask out of range")?;

    let extended = ace.extended_info.unwrap_or_default();
    Ok(AccessControlEntry {
        descriptor,
        allow,
        deny,
        effective_allow: extended.effective_allow.and_then(mask),
        effective_deny: extended.effective_deny.and_then(mask),
    })
}

fn mask(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

/// Raw ACL access on the security service
#[async_trait]
pub trait AclSource: Send + Sync {
    async fn access_control_lists(
        &self,
        namespace_id: &str,
        token: &str,
    ) -> DevOpsResult<Vec<AccessControlListDto>>;
}

/// Result of fetching one scope
#[derive(Debug, Clone)]
pub struct AclFetch {
    pub acl: AccessControlList,
    /// Set when the scope could not be read and is treated as empty
    pub warning: Option<String>,
}

/// Fetches and validates the ACL of one token at a time
pub struct AclFetcher {
    source: Arc<dyn AclSource>,
    namespace_id: String,
}

impl AclFetcher {
    pub fn new(source: Arc<dyn AclSource>, namespace_id: impl Into<String>) -> Self {
        Self {
            source,
            namespace_id: namespace_id.into(),
        }
    }

    /// ACL for `token`; empty with a warning if the service call fails
    pub async fn fetch_acl(&self, token: &str) -> AclFetch {
        let lists = match self
            .source
            .access_control_lists(&self.namespace_id, token)
            .await
        {
            Ok(lists) => lists,
            Err(e) => {
                warn!(token, error = %e, "ACL fetch failed, treating scope as empty");
                return AclFetch {
                    acl: AccessControlList::empty(token),
                    warning: Some(e.to_string()),
                };
            }
        };

        let Some(dto) = lists
            .into_iter()
            .find(|acl| acl.token.eq_ignore_ascii_case(token))
        else {
            debug!(token, "No ACL set on scope");
            return AclFetch {
                acl: AccessControlList::empty(token),
                warning: None,
            };
        };

        let (acl, rejected) = AccessControlList::from_dto(dto);
        trace!(token, entries = acl.entries.len(), rejected, "Fetched ACL");
        AclFetch { acl, warning: None }
    }
}
