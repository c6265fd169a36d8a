use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sesv2::{
    config::{Credentials, Region},
    Client as SesClient,
};
use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::mail::{Mailer, SesSender};
use crate::model::{
    db::user::ensure_owner_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    access_ttl: u32,
    refresh_ttl: u32,
    reset_password_ttl: u32,
    confirm_email_ttl: u32,
    poll_creation_cost: u32,
    owner_username: String,
    owner_email: String,
    // secrets
    jwt_secret: String,
    owner_password: String,
}

impl Config {
    /// Valid lifetime of access tokens.
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl.into())
    }

    /// Valid lifetime of refresh tokens.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl.into())
    }

    /// Valid lifetime of password reset tokens.
    pub fn reset_password_ttl(&self) -> Duration {
        Duration::seconds(self.reset_password_ttl.into())
    }

    /// Valid lifetime of email confirmation tokens.
    pub fn confirm_email_ttl(&self) -> Duration {
        Duration::seconds(self.confirm_email_ttl.into())
    }

    /// Points an unverified user pays to create a poll.
    pub fn poll_creation_cost(&self) -> i64 {
        self.poll_creation_cost.into()
    }

    pub fn owner_username(&self) -> &str {
        &self.owner_username
    }

    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }

    /// Initial password of the owner account, used only when it is created.
    pub fn owner_password(&self) -> &str {
        &self.owner_password
    }

    /// Secret key used to sign JWTs.
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

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
///
/// Must be attached after [`ConfigFairing`], since the owner account is
/// created from the application config.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        // Ensure there is an owner account.
        let app_config = match rocket.state::<Config>() {
            Some(config) => config,
            None => {
                error!("Application config must be loaded before the database");
                return Err(rocket);
            }
        };
        if let Err(e) = ensure_owner_exists(&Coll::from_db(&db), app_config).await {
            error!("Failed to create owner account: {e:?}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "quickpolls".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the AWS connection.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    mail_from: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the AWS config and places an SES-backed [`Mailer`]
/// into managed state.
pub struct MailFairing;

#[rocket::async_trait]
impl Fairing for MailFairing {
    fn info(&self) -> Info {
        Info {
            name: "AWS SES",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the connection.
        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = SesClient::new(&aws_config);
        info!("Loaded Amazon SES config, sending as {}", config.mail_from);

        // Manage the state.
        rocket = rocket.manage(Mailer::new(SesSender::new(client, config.mail_from)));
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                access_ttl: 900,
                refresh_ttl: 86400,
                reset_password_ttl: 3600,
                confirm_email_ttl: 3600,
                poll_creation_cost: 5,
                owner_username: "owner".to_string(),
                owner_email: "owner@example.com".to_string(),
                jwt_secret: "test-secret".to_string(),
                owner_password: "owner".to_string(),
            }
        }
    }
}
