use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core comment data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCore {
    pub text: String,
    /// Foreign Key user ID.
    pub user_id: Id,
    /// Foreign Key poll ID.
    pub poll_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CommentCore {
    pub fn new(text: String, user_id: Id, poll_id: Id) -> Self {
        Self {
            text,
            user_id,
            poll_id,
            created_at: Utc::now(),
        }
    }
}

/// A comment without an ID.
pub type NewComment = CommentCore;

/// A comment from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub comment: CommentCore,
}

impl Deref for Comment {
    type Target = CommentCore;

    fn deref(&self) -> &Self::Target {
        &self.comment
    }
}

impl DerefMut for Comment {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.comment
    }
}
