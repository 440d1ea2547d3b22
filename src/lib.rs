#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::api::{catchers, routes};
use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod model;
pub mod results;
pub mod store;
pub mod vote;

pub use config::Config;

/// Assemble the server from `Rocket.toml` and `ROCKET_*` configuration.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", routes())
        .register("/", catchers())
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
}

/// Assemble the server around an existing store, with fixed test secrets.
#[cfg(test)]
pub(crate) fn rocket_for_storage(storage: store::Storage) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("jwt_secret", "a7c3f51e9b2d48d6a0e4c8b1f9d2e6a3"))
        .merge(("auth_ttl", 600))
        .merge(("log_level", "off"));
    rocket::custom(figment)
        .mount("/", routes())
        .register("/", catchers())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(storage)
}
