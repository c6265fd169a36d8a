use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core option data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionCore {
    pub title: String,
    /// Foreign Key poll ID.
    pub poll_id: Id,
}

/// An option from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub option: PollOptionCore,
}

impl Deref for PollOption {
    type Target = PollOptionCore;

    fn deref(&self) -> &Self::Target {
        &self.option
    }
}

impl DerefMut for PollOption {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.option
    }
}
