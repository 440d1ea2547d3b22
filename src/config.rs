use std::path::PathBuf;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::Result;
use crate::import::import_dir;
use crate::model::{api::user::UserSpec, common::role::Role, db::user::NewUser};
use crate::store::{MemoryStore, MongoStore, Storage, Store, Upserted};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which backend holds the application data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for the data store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    storage: StorageKind,
    /// Directory of CSV files imported on every launch.
    #[serde(default)]
    seed_dir: Option<PathBuf>,
    /// Username of the global admin created if none exists.
    #[serde(default)]
    admin_username: Option<String>,
    /// Name of the MongoDB database.
    #[serde(default = "default_database")]
    database: String,
    // secrets
    #[serde(default)]
    db_uri: Option<String>,
    #[serde(default)]
    admin_password: Option<String>,
}

/// A fairing that loads the store config, connects to the configured backend,
/// performs any setup necessary, and places a [`Storage`] into managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Construct the store.
        let storage = match config.storage {
            StorageKind::Memory => {
                info!("Using in-memory store, data will not survive a restart");
                Storage::new(MemoryStore::default())
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri.as_deref() else {
                    error!("`db_uri` must be set when `storage` is \"mongodb\"");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&config.database);
                // Ensures the required indexes exist.
                let store = match MongoStore::connect(&db).await {
                    Ok(store) => store,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                info!("...database connection online!");
                rocket = rocket.manage(client).manage(db);
                Storage::new(store)
            }
        };

        // Ensure there is at least one global admin, then load any seed data.
        if let Err(e) = prepare(&*storage, &config).await {
            error!("Failed to prepare store: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(storage);
        Ok(rocket)
    }
}

async fn prepare(store: &dyn Store, config: &StoreConfig) -> Result<()> {
    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            ensure_admin_exists(store, username, password).await?;
        }
        _ => warn!("No bootstrap admin configured"),
    }
    if let Some(dir) = &config.seed_dir {
        let report = import_dir(store, dir).await?;
        info!(
            "Seeded store from {}: {} created, {} skipped, {} failed",
            dir.display(),
            report.created,
            report.skipped,
            report.failed
        );
    }
    Ok(())
}

/// Create a global admin with the given credentials unless some global admin
/// already exists.
pub async fn ensure_admin_exists(
    store: &dyn Store,
    username: &str,
    password: &str,
) -> Result<()> {
    let users = store.users(None).await?;
    if users.iter().any(|user| user.role == Role::GlobalAdmin) {
        return Ok(());
    }

    let admin: NewUser = UserSpec {
        username: username.to_string(),
        name: None,
        password: password.to_string(),
        role: Role::GlobalAdmin,
        tenant_id: None,
    }
    .try_into()?;
    match store.upsert_user(&admin).await? {
        Upserted::Inserted(id) => info!("Created global admin '{username}' ({id})"),
        Upserted::Updated(id) => {
            warn!("Promoted existing user '{username}' ({id}) to global admin")
        }
    }
    Ok(())
}

fn default_database() -> String {
    "instapoll".to_string()
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn store_config_defaults() {
        let config: StoreConfig = Figment::new().extract().unwrap();
        assert_eq!(config.storage, StorageKind::Mongodb);
        assert!(config.db_uri.is_none());
        assert!(config.seed_dir.is_none());
        assert_eq!(config.database, "instapoll");

        let config: StoreConfig = Figment::new()
            .merge(("storage", "memory"))
            .merge(("seed_dir", "seed"))
            .extract()
            .unwrap();
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.seed_dir, Some(PathBuf::from("seed")));
    }

    #[rocket::async_test]
    async fn admin_is_created_once() {
        let store = MemoryStore::default();

        ensure_admin_exists(&store, "admin", "secret").await.unwrap();
        ensure_admin_exists(&store, "other", "secret").await.unwrap();

        let users = store.users(None).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert_eq!(users[0].role, Role::GlobalAdmin);
        assert!(users[0].verify_password("secret"));
    }
}
