//! Permission catalog for the Git Repositories security namespace
//!
//! Each permission is a single bit. An ACE stores the bits it allows and the
//! bits it denies as two masks; [`decide`] evaluates one bit against them.

use crate::permissions::record::Access;

/// Security namespace id of Git repositories
pub const GIT_REPOSITORIES_NAMESPACE: &str = "2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87";

/// A named permission bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission {
    pub bit: u32,
    pub name: &'static str,
}

const fn permission(bit: u32, name: &'static str) -> Permission {
    Permission { bit, name }
}

/// Git Repositories namespace, ascending by bit.
///
/// `Administer` (1) is the legacy catch-all and stays distinct from
/// `Manage permissions` (8192); the namespace definition lists both.
static GIT_PERMISSIONS: &[Permission] = &[
    permission(1, "Administer"),
    permission(2, "Read"),
    permission(4, "Contribute"),
    permission(8, "Force push"),
    permission(16, "Create branch"),
    permission(32, "Create tag"),
    permission(64, "Manage notes"),
    permission(128, "Bypass policies when pushing"),
    permission(256, "Create repository"),
    permission(512, "Delete repository"),
    permission(1024, "Rename repository"),
    permission(2048, "Edit policies"),
    permission(4096, "Remove others' locks"),
    permission(8192, "Manage permissions"),
    permission(16384, "Contribute to pull requests"),
    permission(32768, "Bypass policies when completing pull requests"),
    permission(65536, "Advanced Security: view alerts"),
    permission(131072, "Advanced Security: manage and dismiss alerts"),
    permission(262144, "Advanced Security: manage settings"),
];

/// Outcome of evaluating one bit against an allow/deny pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    NotSet,
}

impl Decision {
    /// The report value, or `None` when the ACE says nothing about the bit
    pub fn access(self) -> Option<Access> {
        match self {
            Decision::Allow => Some(Access::Allow),
            Decision::Deny => Some(Access::Deny),
            Decision::NotSet => None,
        }
    }
}

/// Decide one permission bit. Deny wins over allow.
pub fn decide(allow: u32, deny: u32, bit: u32) -> Decision {
    if deny & bit == bit {
        Decision::Deny
    } else if allow & bit == bit {
        Decision::Allow
    } else {
        Decision::NotSet
    }
}

/// All permissions in ascending bit order
pub fn all_bits() -> &'static [Permission] {
    GIT_PERMISSIONS
}

/// Name of a single bit, if the catalog knows it
pub fn name_of(bit: u32) -> Option<&'static str> {
    GIT_PERMISSIONS
        .iter()
        .find(|p| p.bit == bit)
        .map(|p| p.name)
}

/// Bits set in `mask` that the catalog has no name for
pub fn unknown_bits(mask: u32) -> Vec<u32> {
    (0..u32::BITS)
        .map(|shift| 1u32 << shift)
        .filter(|bit| mask & bit != 0 && name_of(*bit).is_none())
        .collect()
}

/// Names of every catalog bit set in `mask`
pub fn describe_mask(mask: u32) -> Vec<&'static str> {
    GIT_PERMISSIONS
        .iter()
        .filter(|p| mask & p.bit == p.bit)
        .map(|p| p.name)
        .collect()
}
