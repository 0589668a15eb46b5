//! Mount-scoped access decisions.

use serde::{Deserialize, Serialize};

use crate::principal::{Capability, Principal};
use crate::vfs::Mount;

/// Grant target matching every mount.
pub const ANY_MOUNT: &str = "*";

/// Decides whether a principal holds a capability on a mount.
pub trait AccessPolicy: Send + Sync {
    fn allows(&self, principal: &Principal, mount: &Mount, capability: Capability) -> bool;
}

/// Policy that allows everything. Useful for tests and single-user setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _principal: &Principal, _mount: &Mount, _capability: Capability) -> bool {
        true
    }
}

/// One configured grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Username the grant applies to.
    pub principal: String,
    /// Mount id, or [`ANY_MOUNT`].
    pub mount: String,
    pub capability: Capability,
}

impl Grant {
    pub fn new(
        principal: impl Into<String>,
        mount: impl Into<String>,
        capability: Capability,
    ) -> Self {
        Self {
            principal: principal.into(),
            mount: mount.into(),
            capability,
        }
    }

    fn covers(&self, principal: &Principal, mount: &Mount) -> bool {
        self.principal == principal.username
            && (self.mount == ANY_MOUNT || self.mount == mount.id.as_str())
    }
}

/// Policy built from a list of grants. Anything not granted is denied.
#[derive(Debug, Clone, Default)]
pub struct GrantPolicy {
    grants: Vec<Grant>,
}

impl GrantPolicy {
    pub fn new(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }
}

impl AccessPolicy for GrantPolicy {
    fn allows(&self, principal: &Principal, mount: &Mount, capability: Capability) -> bool {
        self.grants
            .iter()
            .any(|g| g.covers(principal, mount) && g.capability.satisfies(capability))
    }
}
