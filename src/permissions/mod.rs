//! Permission resolution
//!
//! Turns the ACLs of a resource's scope chain into a flat, deduplicated list
//! of [`PermissionRecord`]s.
//!
//! # Components
//!
//! - [`catalog`]: permission bits and the allow/deny decision rule
//! - [`identity`]: descriptor resolution and group expansion
//! - [`acl`]: ACL fetching and validation
//! - [`scope`]: security tokens, scope chains and resource planning
//! - [`engine`]: the scope walk that produces records

pub mod acl;
pub mod catalog;
pub mod engine;
pub mod identity;
pub mod patterns;
pub mod record;
pub mod scope;

pub use acl::{AccessControlEntry, AccessControlList, AclFetch, AclFetcher, AclSource};
pub use catalog::{Decision, GIT_REPOSITORIES_NAMESPACE, Permission};
pub use engine::{EngineOptions, ResourceError, RunOutput, RunSummary, ScopeEngine};
pub use identity::{Directory, Identity, IdentityCache, IdentityKind, IdentityResolver};
pub use patterns::RepositoryFilter;
pub use record::{Access, PermissionRecord};
pub use scope::{ProjectRef, RepositoryRef, Resource, ResourceLister, Scope, ScopeKind};
