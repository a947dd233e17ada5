//! Role-based access checks.

use crate::models::auth::{Principal, Role};

/// A set of permitted roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    /// The empty set. Denies everyone.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(roles: impl IntoIterator<Item = Role>) -> Self {
        roles.into_iter().fold(Self::empty(), Self::with)
    }

    pub fn with(self, role: Role) -> Self {
        Self(self.0 | Self::bit(role))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & Self::bit(role) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn bit(role: Role) -> u8 {
        match role {
            Role::Secretary => 1,
            Role::Server => 1 << 1,
            Role::Coordinator => 1 << 2,
            Role::Beneficiary => 1 << 3,
        }
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::of(iter)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// No verified principal on the request.
    Unauthenticated,
    /// Principal present, role not permitted.
    Forbidden,
}

pub fn check_access(principal: Option<&Principal>, allowed: &RoleSet) -> Result<(), AccessDenied> {
    let principal = principal.ok_or(AccessDenied::Unauthenticated)?;
    if allowed.contains(principal.role) {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden)
    }
}
