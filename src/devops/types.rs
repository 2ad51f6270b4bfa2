//! Azure DevOps API response types
//!
//! These mirror the JSON the service returns. They are converted into the
//! domain types of [`crate::permissions`] at the client boundary, where
//! malformed values are rejected.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Envelope used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub count: Option<u64>,
    pub value: Vec<T>,
}

/// Team project
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Git repository
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    /// Full ref name, e.g. `refs/heads/main`; absent for empty repositories
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
}

/// Access control list for one security token
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlListDto {
    pub token: String,
    #[serde(default)]
    pub inherit_permissions: bool,
    /// Entries keyed by identity descriptor
    #[serde(default)]
    pub aces_dictionary: BTreeMap<String, AccessControlEntryDto>,
}

/// One access control entry as sent by the service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlEntryDto {
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub allow: i64,
    #[serde(default)]
    pub deny: i64,
    #[serde(default)]
    pub extended_info: Option<AceExtendedInfo>,
}

/// Inherited and effective masks, present with `includeExtendedInfo=true`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AceExtendedInfo {
    #[serde(default)]
    pub effective_allow: Option<i64>,
    #[serde(default)]
    pub effective_deny: Option<i64>,
    #[serde(default)]
    pub inherited_allow: Option<i64>,
    #[serde(default)]
    pub inherited_deny: Option<i64>,
}

/// Identity record from the identities endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    pub id: String,
    pub descriptor: String,
    #[serde(default)]
    pub subject_descriptor: Option<String>,
    #[serde(default)]
    pub provider_display_name: Option<String>,
    #[serde(default)]
    pub custom_display_name: Option<String>,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Direct member descriptors, filled when `queryMembership=Direct`
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl IdentityDto {
    /// Account name (usually the UPN) from the property bag
    pub fn account(&self) -> Option<&str> {
        self.properties
            .get("Account")
            .and_then(|p| p.value.as_ref())
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Typed property bag value (`{"$type": "...", "$value": ...}`)
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "$value", default)]
    pub value: Option<serde_json::Value>,
}

/// User or group from the graph endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSubject {
    pub descriptor: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub mail_address: Option<String>,
    /// `user` or `group`
    #[serde(default)]
    pub subject_kind: Option<String>,
}
