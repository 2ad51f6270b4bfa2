//! Permission records, the rows of the report

use crate::permissions::acl::AccessControlEntry;
use crate::permissions::identity::{Identity, IdentityKind};
use crate::permissions::scope::{Resource, ScopeKind};
use serde::Serialize;
use std::fmt;

/// Access decision carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Access {
    Allow,
    Deny,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Allow => write!(f, "Allow"),
            Access::Deny => write!(f, "Deny"),
        }
    }
}

/// One (resource, identity, permission) decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRecord {
    pub resource_name: String,
    pub resource_id: String,
    pub branch: Option<String>,
    pub identity_descriptor: String,
    pub identity_display_name: String,
    pub identity_kind: IdentityKind,
    pub permission: &'static str,
    pub access: Access,
    pub allow_mask: u32,
    pub deny_mask: u32,
    /// Effective masks reported by the service, when it sent them
    pub effective_allow_mask: Option<u32>,
    pub effective_deny_mask: Option<u32>,
    pub source_scope: ScopeKind,
    pub is_direct: bool,
    /// Group through which a member record was derived
    pub member_of: Option<String>,
}

impl PermissionRecord {
    /// Record for an identity named directly by an ACE
    pub fn direct(
        resource: &Resource,
        identity: &Identity,
        permission: &'static str,
        access: Access,
        ace: &AccessControlEntry,
        source_scope: ScopeKind,
        is_direct: bool,
    ) -> Self {
        Self {
            resource_name: resource.name.clone(),
            resource_id: resource.id.clone(),
            branch: resource.branch.clone(),
            identity_descriptor: identity.descriptor.clone(),
            identity_display_name: identity.display_name.clone(),
            identity_kind: identity.kind,
            permission,
            access,
            allow_mask: ace.allow,
            deny_mask: ace.deny,
            effective_allow_mask: ace.effective_allow,
            effective_deny_mask: ace.effective_deny,
            source_scope,
            is_direct,
            member_of: None,
        }
    }

    /// Record for a user reached through a group's grant.
    ///
    /// Copies the group record's decision and masks; never direct.
    pub fn member(group_record: &PermissionRecord, member: &Identity) -> Self {
        let group = group_record.identity_display_name.clone();
        Self {
            identity_descriptor: member.descriptor.clone(),
            identity_display_name: format!("{} (member of {})", member.display_name, group),
            identity_kind: member.kind,
            is_direct: false,
            member_of: Some(group),
            ..group_record.clone()
        }
    }

    /// Deduplication key within one report
    pub fn dedup_key(&self) -> (&str, &str, &str) {
        (
            self.resource_name.as_str(),
            self.identity_descriptor.as_str(),
            self.permission,
        )
    }
}
