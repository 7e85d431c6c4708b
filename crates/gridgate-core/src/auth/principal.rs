//! Principals and the role/permission model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Role for access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access; implicitly holds every permission.
    Admin,
    /// Can read all data and write lineups and projections.
    Analyst,
    /// Read-only access.
    User,
}

impl Role {
    /// Check if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Capabilities granted to this role.
    ///
    /// Consulted at verification time, never embedded in tokens, so a
    /// mapping change takes effect on the next request without reissuing
    /// credentials. Admin returns an empty slice: its checks short-circuit
    /// to `true` before the set is consulted.
    #[must_use]
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Self::Admin => &[],
            Self::Analyst => &[
                "read:games",
                "read:stats",
                "read:teams",
                "write:lineup",
                "write:projections",
            ],
            Self::User => &["read:games", "read:stats", "read:teams"],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Analyst => write!(f, "analyst"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "analyst" => Ok(Self::Analyst),
            "user" => Ok(Self::User),
            _ => Err(AuthError::Config(format!("Unknown role: {s}"))),
        }
    }
}

/// The authenticated identity attached to a request.
///
/// Constructed fresh on every successful verification and owned by the
/// request flow that created it; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Opaque identity string, unique per subject.
    pub id: String,
    /// Contact email. Never consulted for authorization.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Capability set derived from the role. Ignored for admin.
    pub permissions: HashSet<String>,
}

impl Principal {
    /// Build a principal, deriving its permission set from the role.
    #[must_use]
    pub fn from_role(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
            permissions: role.permissions().iter().map(ToString::to_string).collect(),
        }
    }

    /// Check whether this principal holds `permission`.
    ///
    /// Admin always passes; every other role passes iff the permission is
    /// in its derived set. No side effects.
    #[must_use]
    pub fn authorize(&self, permission: &str) -> bool {
        self.role.is_admin() || self.permissions.contains(permission)
    }

    /// Check if this principal is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
