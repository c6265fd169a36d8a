use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LENGTH: u64 = 100;
pub const MAX_DESCRIPTION_LENGTH: u64 = 2000;
pub const MAX_OPTION_TITLE_LENGTH: u64 = 100;
pub const MIN_OPTIONS_COUNT: u64 = 1;
pub const MAX_OPTIONS_COUNT: u64 = 15;
pub const MAX_COMMENT_LENGTH: u64 = 400;

/// States in the poll lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Accepting votes.
    Open,
    /// Closed to votes; can be resumed.
    Completed,
    /// Soft-deleted. Terminal, and invisible to ordinary reads.
    Deleted,
}

impl PollState {
    /// Derive the state from the stored flags. `deleted` wins over `completed`.
    pub fn from_flags(completed: bool, deleted: bool) -> Self {
        match (completed, deleted) {
            (_, true) => Self::Deleted,
            (true, false) => Self::Completed,
            (false, false) => Self::Open,
        }
    }

    /// Can votes be cast in this state?
    pub fn accepts_votes(self) -> bool {
        self == Self::Open
    }
}
