use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use super::role::Role;

/// Identifier of an institute. Compared exactly and case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank tenant ID never identifies a real institute.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&TenantId> for Bson {
    fn from(id: &TenantId) -> Self {
        Bson::String(id.0.clone())
    }
}

/// Something owned by (at most) one tenant.
pub trait Tenanted {
    fn tenant_id(&self) -> Option<&TenantId>;
}

/// Retain only the items owned by exactly `tenant`.
pub fn scope_by_tenant<T, I>(tenant: &TenantId, items: I) -> Vec<T>
where
    T: Tenanted,
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .filter(|item| item.tenant_id() == Some(tenant))
        .collect()
}

/// The set of tenants whose data a user may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every tenant.
    Global,
    /// A single tenant.
    Tenant(TenantId),
}

impl Scope {
    /// The scope granted to a user with the given role and tenant.
    /// A non-global user without a tenant is scoped to the blank tenant, which
    /// owns nothing.
    pub fn for_user(role: Role, tenant: Option<&TenantId>) -> Self {
        match role {
            Role::GlobalAdmin => Self::Global,
            Role::LocalAdmin | Role::Voter => Self::Tenant(tenant.cloned().unwrap_or_default()),
        }
    }

    /// The tenant this scope is restricted to, if any.
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            Self::Global => None,
            Self::Tenant(tenant) => Some(tenant),
        }
    }

    /// May data owned by `tenant` be seen from this scope?
    pub fn permits(&self, tenant: &TenantId) -> bool {
        match self {
            Self::Global => true,
            Self::Tenant(own) => !own.is_blank() && own == tenant,
        }
    }

    /// Filter `items` down to those visible from this scope.
    pub fn filter<T, I>(&self, items: I) -> Vec<T>
    where
        T: Tenanted,
        I: IntoIterator<Item = T>,
    {
        match self {
            Self::Global => items.into_iter().collect(),
            Self::Tenant(tenant) if tenant.is_blank() => Vec::new(),
            Self::Tenant(tenant) => scope_by_tenant(tenant, items),
        }
    }
}
