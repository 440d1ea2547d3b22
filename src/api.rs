use rocket::{
    http::Status,
    response::{self, Responder, Response},
    serde::json::Json,
    Catcher, Request, Route,
};

use crate::error::ErrorBody;

pub mod admin;
pub mod auth;
pub mod polls;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(polls::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Report every error status in the same JSON shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let error = status.reason().unwrap_or("Unknown error").to_string();
    (status, Json(ErrorBody { error }))
}

/// Wraps a response so that neither browsers nor proxies cache it.
pub struct NoStore<R>(pub R);

impl<'r, 'o: 'r, R: Responder<'r, 'o>> Responder<'r, 'o> for NoStore<R> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        Response::build_from(self.0.respond_to(req)?)
            .raw_header(
                "Cache-Control",
                "no-store, no-cache, must-revalidate, max-age=0",
            )
            .raw_header("Pragma", "no-cache")
            .ok()
    }
}
