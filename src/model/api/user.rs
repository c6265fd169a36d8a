use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::model::{
    api::validation::validate_username,
    common::group::Group,
    db::user::{hash_password, User},
};

/// An API-friendly view of a user. Never includes the password hash; the
/// email is only included for the user themselves and for moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub group: Group,
    pub points: i64,
    pub verified: bool,
    pub banned: bool,
    pub email_confirmed: bool,
    pub bio: Option<String>,
    pub avatar_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserDescription {
    pub fn new(user: User, include_email: bool) -> Self {
        Self {
            id: user.id.to_hex(),
            email: include_email.then(|| user.user.email),
            username: user.user.username,
            group: user.user.group,
            points: user.user.points,
            verified: user.user.verified,
            banned: user.user.banned,
            email_confirmed: user.user.email_confirmed,
            bio: user.user.bio,
            avatar_filename: user.user.avatar_filename,
            created_at: user.user.created_at,
        }
    }
}

/// `PUT /users/<username>/profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(custom = "validate_username")]
    pub username: Option<String>,
    #[validate(length(max = 400, message = "Bio must be at most 400 characters."))]
    pub bio: Option<String>,
    #[validate(length(max = 255, message = "Avatar filename is too long."))]
    pub avatar_filename: Option<String>,
}

impl ProfileUpdate {
    /// The `$set` document for this update. An empty avatar filename means
    /// "leave the avatar alone", not "clear it".
    pub fn into_update(self) -> Document {
        let mut set = Document::new();
        if let Some(username) = self.username {
            set.insert("username", username);
        }
        if let Some(bio) = self.bio {
            set.insert("bio", bio);
        }
        if let Some(avatar) = self.avatar_filename.filter(|a| !a.is_empty()) {
            set.insert("avatar_filename", avatar);
        }
        set
    }
}

/// `PUT /users/<username>/email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailUpdate {
    #[validate(email(message = "Not a valid email address."))]
    pub email: String,
}

/// `PUT /users/<username>/change_password`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required."))]
    pub old_password: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters."))]
    pub new_password: String,
}

/// `PUT /users/<username>/change_group`. The rank is checked against the
/// known groups by the handler, so unknown ranks report `GroupNotFound`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangeGroupRequest {
    pub group: u8,
}

/// `PUT /users/<username>/change_points`: `action` is -1 or 1.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePointsRequest {
    pub action: i64,
    #[validate(range(max = 1_000_000, message = "Count is too large."))]
    pub count: u32,
}

/// `POST /users`: an admin creating an account directly.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUserRequest {
    #[validate(email(message = "Not a valid email address."))]
    pub email: String,
    #[validate(custom = "validate_username")]
    pub username: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters."))]
    pub password: String,
    pub group: Option<u8>,
    pub points: Option<i64>,
    pub verified: Option<bool>,
    pub email_confirmed: Option<bool>,
    #[validate(length(max = 400, message = "Bio must be at most 400 characters."))]
    pub bio: Option<String>,
}

/// `PUT /users/<username>`: an admin editing an account. Group changes go
/// through `change_group` so the rank rules apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AdminUserUpdate {
    #[validate(custom = "validate_username")]
    pub username: Option<String>,
    #[validate(email(message = "Not a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters."))]
    pub password: Option<String>,
    #[validate(length(max = 400, message = "Bio must be at most 400 characters."))]
    pub bio: Option<String>,
    pub points: Option<i64>,
    pub verified: Option<bool>,
    pub email_confirmed: Option<bool>,
}

impl AdminUserUpdate {
    /// The `$set` document for this update, hashing any new password.
    pub fn into_update(self) -> Result<Document> {
        let mut set = Document::new();
        if let Some(username) = self.username {
            set.insert("username", username);
        }
        if let Some(email) = self.email {
            set.insert("email", email);
        }
        if let Some(password) = self.password {
            set.insert("password_hash", hash_password(&password)?);
        }
        if let Some(bio) = self.bio {
            set.insert("bio", bio);
        }
        if let Some(points) = self.points {
            set.insert("points", points);
        }
        if let Some(verified) = self.verified {
            set.insert("verified", verified);
        }
        if let Some(email_confirmed) = self.email_confirmed {
            set.insert("email_confirmed", email_confirmed);
        }
        Ok(set)
    }
}

/// `POST /users/<username>/send_email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomEmailRequest {
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters."))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000, message = "Text must be 1-10000 characters."))]
    pub text: String,
}

/// Wrap a `$set` document into a full update, or `None` if there is
/// nothing to set.
pub fn set_update(set: Document) -> Option<Document> {
    (!set.is_empty()).then(|| doc! { "$set": set })
}
