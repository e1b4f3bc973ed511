use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use parking_lot::Mutex;
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::time::Duration as StdDuration,
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::ledger::{LedgerClient, LedgerSnapshot, LocalLedger};
use crate::model::{
    address::Address,
    auth::ChallengeStore,
    index::{Index, MemoryIndex, MongoIndex},
};
use crate::scheduled_task::PeriodicTask;
use crate::sync::{rebuild_index, AdminRosterSynchronizer};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    challenge_ttl: u32,
    auth_ttl: u32,
    ledger_timeout_ms: u64,
    #[serde(default)]
    admin_sync_interval: u64,
    #[serde(default)]
    index_rebuild_on_launch: bool,
    // secrets
    jwt_secret: String,
    jwt_key: String,
}

impl Config {
    /// Valid lifetime of an authentication challenge.
    pub fn challenge_ttl(&self) -> Duration {
        Duration::seconds(self.challenge_ttl.into())
    }

    /// Valid lifetime of session credentials.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Upper bound on every ledger call.
    pub fn ledger_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.ledger_timeout_ms)
    }

    /// Period of the background admin roster sync, if enabled.
    pub fn admin_sync_interval(&self) -> Option<StdDuration> {
        (self.admin_sync_interval > 0).then(|| StdDuration::from_secs(self.admin_sync_interval))
    }

    pub fn index_rebuild_on_launch(&self) -> bool {
        self.index_rebuild_on_launch
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Rotation tag embedded in every credential. Changing it revokes all sessions.
    pub fn jwt_key(&self) -> &str {
        &self.jwt_key
    }
}

/// A fairing that loads the application config and puts it, along with the
/// challenge store sized by it, in managed state.
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
        rocket = rocket
            .manage(ChallengeStore::new(config.challenge_ttl()))
            .manage(config);
        Ok(rocket)
    }
}

/// Configuration for the ledger.
#[derive(Deserialize)]
struct LedgerConfig {
    root_address: Address,
    root_email: String,
    ledger_snapshot: Option<PathBuf>,
}

/// The in-process ledger and where to persist it at shutdown.
struct LedgerPersistence {
    ledger: Arc<LocalLedger>,
    path: Option<PathBuf>,
}

/// A fairing that starts the local ledger, restoring it from a snapshot if one
/// is configured and present, and places a [`LedgerClient`] into managed state.
/// The snapshot is written back at shutdown.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let Some(timeout) = rocket.state::<Config>().map(Config::ledger_timeout) else {
            error!("Application config must be loaded before the ledger");
            return Err(rocket);
        };

        let ledger = match &config.ledger_snapshot {
            Some(path) if path.exists() => match LedgerSnapshot::load(path) {
                Ok(snapshot) => {
                    info!("Restored ledger from {}", path.display());
                    if snapshot.accounts().root() != config.root_address {
                        warn!(
                            "Snapshot root {} differs from configured root {}; keeping the snapshot's",
                            snapshot.accounts().root(),
                            config.root_address
                        );
                    }
                    LocalLedger::from_snapshot(snapshot)
                }
                Err(e) => {
                    error!("Failed to restore ledger: {e}");
                    return Err(rocket);
                }
            },
            _ => {
                info!("Starting a fresh ledger with root {}", config.root_address);
                LocalLedger::genesis(config.root_address, config.root_email)
            }
        };
        let ledger = Arc::new(ledger);

        rocket = rocket
            .manage(LedgerClient::new(ledger.clone(), timeout))
            .manage(LedgerPersistence {
                ledger,
                path: config.ledger_snapshot,
            });
        Ok(rocket)
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        let Some(persistence) = rocket.state::<LedgerPersistence>() else {
            return;
        };
        if let Some(path) = &persistence.path {
            match persistence.ledger.snapshot().save(path) {
                Ok(()) => info!("Saved ledger snapshot to {}", path.display()),
                Err(e) => error!("Failed to save ledger snapshot: {e}"),
            }
        }
    }
}

/// Configuration for the off-chain index.
#[derive(Deserialize)]
struct IndexConfig {
    // secrets
    db_uri: Option<String>,
}

/// A fairing that connects the off-chain index (MongoDB if configured, in-memory
/// otherwise), performs any setup necessary, and places an [`Index`] into managed state.
pub struct IndexFairing;

#[rocket::async_trait]
impl Fairing for IndexFairing {
    fn info(&self) -> Info {
        Info {
            name: "Off-chain index",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<IndexConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load index config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let index = match config.db_uri {
            Some(db_uri) => {
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());
                match MongoIndex::connect(db).await {
                    Ok(index) => {
                        info!("...database connection online!");
                        Index::new(index)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured, using an in-memory index");
                Index::new(MemoryIndex::default())
            }
        };

        let rebuild = rocket
            .state::<Config>()
            .map_or(false, Config::index_rebuild_on_launch);
        if rebuild {
            if let Some(ledger) = rocket.state::<LedgerClient>() {
                match rebuild_index(ledger, &index).await {
                    Ok(added) => info!("Rebuilt vote index, {added} record(s) added"),
                    Err(e) => error!("Failed to rebuild vote index: {e}"),
                }
            }
        }

        rocket = rocket.manage(index);
        Ok(rocket)
    }
}

/// Get the name of the database to use.
fn get_database_name() -> String {
    "chainvote".to_string()
}

/// A fairing that manages the [`AdminRosterSynchronizer`] and, if an interval is
/// configured, runs it periodically for the lifetime of the server.
#[derive(Default)]
pub struct SyncFairing {
    task: Mutex<Option<PeriodicTask>>,
}

#[rocket::async_trait]
impl Fairing for SyncFairing {
    fn info(&self) -> Info {
        Info {
            name: "Admin roster sync",
            kind: Kind::Ignite | Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (Some(ledger), Some(index)) = (rocket.state::<LedgerClient>(), rocket.state::<Index>())
        else {
            error!("Ledger and index must be available before the synchronizer");
            return Err(rocket);
        };
        let synchronizer = AdminRosterSynchronizer::new(ledger.clone(), index.clone());
        Ok(rocket.manage(synchronizer))
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(config), Some(synchronizer)) = (
            rocket.state::<Config>(),
            rocket.state::<AdminRosterSynchronizer>(),
        ) else {
            return;
        };
        let Some(interval) = config.admin_sync_interval() else {
            info!("Periodic admin roster sync disabled");
            return;
        };

        let synchronizer = synchronizer.clone();
        let task = PeriodicTask::new(interval, move || {
            let synchronizer = synchronizer.clone();
            async move {
                if let Err(e) = synchronizer.sync().await {
                    error!("Periodic admin roster sync failed: {e}");
                }
            }
        });
        info!("Admin roster sync scheduled every {}s", interval.as_secs());
        *self.task.lock() = Some(task);
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel().await;
        }
    }
}

/// Configuration used by tests, independent of any `Rocket.toml`.
#[cfg(test)]
pub fn test_figment() -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("challenge_ttl", 300))
        .merge(("auth_ttl", 3600))
        .merge(("ledger_timeout_ms", 2000))
        .merge(("admin_sync_interval", 0))
        .merge(("jwt_secret", "test jwt secret"))
        .merge(("jwt_key", "test-key-1"))
        .merge(("log_level", "off"))
}
