#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use config::{ConfigFairing, DatabaseFairing, MailFairing};
use logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod model;

pub use config::Config;

/// Assemble the server. Configuration, the database connection and the mail
/// client are all set up by fairings when the rocket ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(MailFairing)
        .mount("/api", api::routes())
        .register("/", api::catchers())
}

/// Connect to the database named in the debug profile.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name for one test.
#[cfg(test)]
fn database() -> String {
    config::get_database_name()
}

/// Build a rocket against a specific database, sending mail into `outbox`.
/// The outbox is also managed so tests can read what was sent.
#[cfg(test)]
async fn rocket_for_db_and_mailer(
    db_client: mongodb::Client,
    db_name: &str,
    mailer: mail::Mailer,
    outbox: mail::testing::Outbox,
) -> Rocket<Build> {
    use model::{
        db::user::ensure_owner_exists,
        mongodb::{ensure_indexes_exist, Coll},
    };

    let rocket = rocket::build();
    let config = rocket.figment().extract::<Config>().unwrap();
    let db = db_client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    ensure_owner_exists(&Coll::from_db(&db), &config).await.unwrap();

    rocket
        .attach(LoggerFairing)
        .manage(config)
        .manage(db_client)
        .manage(db)
        .manage(mailer)
        .manage(outbox)
        .mount("/api", api::routes())
        .register("/", api::catchers())
}
