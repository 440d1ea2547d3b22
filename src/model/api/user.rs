use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::{role::Role, tenant::TenantId},
    db::user::{NewUser, User},
};

/// Raw login credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A user to be created (or updated), with a plaintext password.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserSpec {
    pub username: String,
    /// Display name; defaults to the username.
    #[serde(default)]
    pub name: Option<String>,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

impl TryFrom<UserSpec> for NewUser {
    type Error = Error;

    /// Convert a [`UserSpec`] to a [`NewUser`] by hashing the password.
    /// This enforces that the username and password are non-empty.
    fn try_from(spec: UserSpec) -> Result<Self, Self::Error> {
        let username = spec.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::validation("Username must not be blank"));
        }
        if spec.password.is_empty() {
            return Err(Error::validation(format!(
                "Password of user '{username}' must not be empty"
            )));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(spec.password.as_bytes(), &salt, &Config::default())?;

        let name = spec
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| username.clone());
        let tenant_id = spec.tenant_id.filter(|tenant| !tenant.is_blank());
        Ok(Self {
            username,
            name,
            password_hash,
            role: spec.role,
            tenant_id,
        })
    }
}

/// An API-friendly user description, without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: ApiId,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            username: user.user.username,
            name: user.user.name,
            role: user.user.role,
            tenant_id: user.user.tenant_id,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_hashed() {
        let user: NewUser = UserSpec::voter_example().try_into().unwrap();
        assert_ne!(user.password_hash, "alicepassword");
        assert!(user.verify_password("alicepassword"));
        assert!(!user.verify_password("wrong"));
    }

    #[test]
    fn name_defaults_to_username() {
        let user: NewUser = UserSpec::local_admin_example().try_into().unwrap();
        assert_eq!(user.name, "inst1-admin");
        assert_eq!(user.tenant_id, Some("inst1".into()));
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut spec = UserSpec::voter_example();
        spec.username = "  ".into();
        assert!(matches!(
            NewUser::try_from(spec),
            Err(Error::Validation(_))
        ));
    }
}
