use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    common::group::Group,
    mongodb::{Coll, Id},
};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub group: Group,
    pub points: i64,
    pub verified: bool,
    pub banned: bool,
    pub email_confirmed: bool,
    pub bio: Option<String>,
    pub avatar_filename: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a fresh user in the lowest group, hashing the password.
    pub fn new(username: String, email: String, password: &str) -> Result<Self> {
        Ok(Self {
            username,
            email,
            password_hash: hash_password(password)?,
            group: Group::User,
            points: 0,
            verified: false,
            banned: false,
            email_confirmed: false,
            bio: None,
            avatar_filename: None,
            created_at: Utc::now(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> Result<bool> {
        Ok(argon2::verify_encoded(&self.password_hash, password.as_ref())?)
    }
}

/// Hash a plaintext password with a random salt. The plaintext is never stored.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Argon2Config::default(),
    )?)
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure that an owner account exists, creating one from the configured
/// credentials if not.
pub async fn ensure_owner_exists(users: &Coll<NewUser>, config: &Config) -> Result<()> {
    let owners = users
        .count_documents(doc! { "group": Group::Owner }, None)
        .await?;
    if owners > 0 {
        debug!("Owner account already exists");
        return Ok(());
    }

    let mut owner = NewUser::new(
        config.owner_username().to_string(),
        config.owner_email().to_string(),
        config.owner_password(),
    )?;
    owner.group = Group::Owner;
    owner.verified = true;
    owner.email_confirmed = true;
    users.insert_one(&owner, None).await?;
    warn!(
        "Created owner account '{}'; change its password",
        config.owner_username()
    );
    Ok(())
}


#[cfg(test)]
pub use examples::EXAMPLE_PASSWORD;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_hashed() {
        let user = UserCore::new("bob".into(), "bob@example.com".into(), "hunter22").unwrap();
        assert_ne!(user.password_hash, "hunter22");
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(user.verify_password("hunter22").unwrap());
        assert!(!user.verify_password("hunter23").unwrap());
    }

    #[test]
    fn new_users_start_plain() {
        let user = UserCore::new("bob".into(), "bob@example.com".into(), "hunter22").unwrap();
        assert_eq!(user.group, Group::User);
        assert_eq!(user.points, 0);
        assert!(!user.verified && !user.banned && !user.email_confirmed);
    }

    #[test]
    fn salts_differ() {
        assert_ne!(
            hash_password("same").unwrap(),
            hash_password("same").unwrap()
        );
    }
}
