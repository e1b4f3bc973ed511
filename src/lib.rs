#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, IndexFairing, LedgerFairing, SyncFairing};
use crate::ledger::LedgerClient;
use crate::logging::LoggerFairing;
use crate::model::index::Index;

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod sync;

pub use config::Config;

/// Build the server, with its ledger and index configured from the figment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(LedgerFairing)
        .attach(IndexFairing)
        .attach(SyncFairing::default())
        .attach(LoggerFairing)
}

/// Build the server on top of `rocket` over an existing ledger and index.
pub fn rocket_with(rocket: Rocket<Build>, ledger: LedgerClient, index: Index) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .manage(ledger)
        .manage(index)
        .attach(ConfigFairing)
        .attach(SyncFairing::default())
        .attach(LoggerFairing)
}
