use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::api::{
        auth::{Anyone, AuthToken, AUTH_TOKEN_COOKIE},
        user::{Credentials, UserDescription},
    },
    store::Storage,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![login, whoami, logout]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
    store: Storage,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let user = store
        .user_by_username(credentials.username.trim())
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Unauthorized(
                "No user found with the provided username and password combination.".to_string(),
            )
        })?;

    info!("User '{}' logged in as {}", user.username, user.role);
    let token = AuthToken::<Anyone>::new(&user);
    cookies.add(token.into_cookie(config));

    Ok(Json(user.into()))
}

#[get("/auth")]
pub async fn whoami(token: AuthToken<Anyone>, store: Storage) -> Result<Json<UserDescription>> {
    let user = store
        .user(token.id())
        .await?
        .ok_or_else(|| Error::not_found(format!("User with ID '{}'", token.id())))?;
    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
