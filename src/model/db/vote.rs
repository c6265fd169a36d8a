use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core vote data, as stored in the database.
///
/// `poll_id` duplicates the option's poll so that the unique
/// (`user_id`, `poll_id`) index can enforce one vote per user per poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign Key user ID.
    pub user_id: Id,
    /// Foreign Key option ID.
    pub option_id: Id,
    /// Foreign Key poll ID.
    pub poll_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(user_id: Id, option_id: Id, poll_id: Id) -> Self {
        Self {
            user_id,
            option_id,
            poll_id,
            created_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
