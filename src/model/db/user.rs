use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        role::Role,
        tenant::{TenantId, Tenanted},
    },
    mongodb::Id,
};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    /// Unique login name.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Argon2 encoded hash of the password.
    pub password_hash: String,
    pub role: Role,
    /// The institute this user belongs to. Global admins usually have none.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

impl UserCore {
    /// Check whether the given password is correct.
    /// A malformed stored hash never matches.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

impl Tenanted for UserCore {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

impl Tenanted for User {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.user.tenant_id.as_ref()
    }
}
