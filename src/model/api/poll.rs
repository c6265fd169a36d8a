use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::model::{
    common::poll::{
        PollState, MAX_DESCRIPTION_LENGTH, MAX_OPTIONS_COUNT, MAX_OPTION_TITLE_LENGTH,
        MAX_TITLE_LENGTH, MIN_OPTIONS_COUNT,
    },
    db::{poll::Poll, poll_option::PollOption},
};

/// One option of a [`PollSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub title: String,
}

/// `POST /polls`: everything needed to create a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PollSpec {
    #[validate(length(min = 1, max = "MAX_TITLE_LENGTH", message = "Title must be 1-100 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = "MAX_DESCRIPTION_LENGTH", message = "Description must be at most 2000 characters."))]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[validate(custom = "validate_options")]
    pub options: Vec<OptionSpec>,
}

/// A poll has 1 to 15 options, each titled with 1 to 100 characters.
fn validate_options(options: &[OptionSpec]) -> Result<(), ValidationError> {
    let count = options.len() as u64;
    if !(MIN_OPTIONS_COUNT..=MAX_OPTIONS_COUNT).contains(&count) {
        let mut error = ValidationError::new("length");
        error.message = Some("A poll must have 1-15 options.".into());
        return Err(error);
    }
    let bad_title = options.iter().any(|option| {
        let length = option.title.chars().count() as u64;
        length == 0 || length > MAX_OPTION_TITLE_LENGTH
    });
    if bad_title {
        let mut error = ValidationError::new("option_title");
        error.message = Some("Option titles must be 1-100 characters.".into());
        return Err(error);
    }
    Ok(())
}

/// `PUT /polls/<id>`: title, description and privacy only. Options are
/// fixed once the poll exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PollUpdate {
    #[validate(length(min = 1, max = "MAX_TITLE_LENGTH", message = "Title must be 1-100 characters."))]
    pub title: Option<String>,
    #[validate(length(max = "MAX_DESCRIPTION_LENGTH", message = "Description must be at most 2000 characters."))]
    pub description: Option<String>,
    pub private: Option<bool>,
}

impl PollUpdate {
    /// The `$set` document for this update.
    pub fn into_update(self) -> Document {
        let mut set = Document::new();
        if let Some(title) = self.title {
            set.insert("title", title);
        }
        if let Some(description) = self.description {
            set.insert("description", description);
        }
        if let Some(private) = self.private {
            set.insert("private", private);
        }
        set
    }
}

/// An option as the API reports it, with its current vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub id: String,
    pub title: String,
    pub votes: u64,
}

impl OptionDescription {
    pub fn new(option: PollOption, votes: u64) -> Self {
        Self {
            id: option.id.to_hex(),
            title: option.option.title,
            votes,
        }
    }
}

/// A poll as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author_id: String,
    pub state: PollState,
    pub completed: bool,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    pub options: Vec<OptionDescription>,
}

impl PollDescription {
    pub fn new(poll: Poll, options: Vec<OptionDescription>) -> Self {
        Self {
            id: poll.id.to_hex(),
            state: poll.state(),
            author_id: poll.author_id.to_hex(),
            completed: poll.poll.completed,
            private: poll.poll.private,
            created_at: poll.poll.created_at,
            title: poll.poll.title,
            description: poll.poll.description,
            options,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl PollSpec {
        pub fn example() -> Self {
            Self {
                title: "Best pizza topping?".to_string(),
                description: "Settle this once and for all.".to_string(),
                private: false,
                options: ["Pineapple", "Mushroom", "Pepperoni"]
                    .into_iter()
                    .map(|title| OptionSpec {
                        title: title.to_string(),
                    })
                    .collect(),
            }
        }

        pub fn private_example() -> Self {
            Self {
                title: "Secret ballot".to_string(),
                private: true,
                ..Self::example()
            }
        }
    }
}
