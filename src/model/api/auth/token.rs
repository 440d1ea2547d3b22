use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::{
        role::Role,
        tenant::{Scope, TenantId},
    },
    db::user::User,
    mongodb::Id,
};
use crate::store::Storage;

use super::rights::Rights;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user, admitted by the
/// rights class `R`.
///
/// This is the resolved identity every core operation is handed: who the user
/// is, what role they have, and which tenant they belong to.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    id: Id,
    #[serde(rename = "rol")]
    role: Role,
    #[serde(rename = "ten")]
    tenant_id: Option<TenantId>,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            tenant_id: user.tenant_id.clone(),
            phantom: PhantomData,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    /// The tenants whose polls and users this user may see.
    pub fn scope(&self) -> Scope {
        Scope::for_user(self.role, self.tenant_id.as_ref())
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Rights + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie, check that the user still exists,
    /// and that their current role is admitted by `R`.
    ///
    /// The returned token reflects the user as currently stored, not as they
    /// were when the cookie was issued. Fails with 401 if there is no valid
    /// session and 403 if the user lacks the rights.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = try_outcome!(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .ok_or_else(|| Error::Unauthorized("Not logged in".to_string()))
            .into_outcome(Status::Unauthorized));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config)
            .map_err(|e| Error::Unauthorized(format!("Invalid session: {e}")))
            .into_outcome(Status::Unauthorized));

        // Check the user actually exists, with the correct rights.
        // Unwrap is safe as `Storage` is always managed.
        let store = req.guard::<&State<Storage>>().await.unwrap();
        match store.user(token.id).await {
            Ok(Some(user)) if R::permits(user.role) => Outcome::Success(Self::new(&user)),
            Ok(Some(user)) => Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden(format!("Not permitted for role {}", user.role)),
            )),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("User {} no longer exists", token.id)),
            )),
            Err(e) => Outcome::Failure((Status::InternalServerError, e)),
        }
    }
}
