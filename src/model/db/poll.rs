use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::{common::poll::PollState, mongodb::Id};

/// Core poll data, as stored in the database. Options live in their own
/// collection, keyed by `poll_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCore {
    pub title: String,
    pub description: String,
    /// Foreign Key user ID.
    pub author_id: Id,
    pub completed: bool,
    pub private: bool,
    /// Soft-delete flag; deleted polls are never physically removed.
    pub deleted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PollCore {
    /// A fresh, open poll.
    pub fn new(title: String, description: String, author_id: Id, private: bool) -> Self {
        Self {
            title,
            description,
            author_id,
            completed: false,
            private,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn state(&self) -> PollState {
        PollState::from_flags(self.completed, self.deleted)
    }
}

/// A poll from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Poll {
    /// Filter matching a poll by ID, provided it has not been soft-deleted.
    pub fn visible_filter(id: Id) -> Document {
        doc! {
            "_id": id,
            "deleted": false,
        }
    }
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl PollCore {
        pub fn example(author_id: Id) -> Self {
            Self::new(
                "Best pizza topping?".to_string(),
                "Settle this once and for all.".to_string(),
                author_id,
                false,
            )
        }
    }
}
