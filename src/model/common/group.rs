use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::Error;

/// Role ranks, ordered from least to most privileged. Serialized as the
/// integer rank, both in the database and over the API.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Group {
    User = 1,
    Moderator = 2,
    Admin = 3,
    Owner = 4,
}

impl Group {
    /// The integer rank of this group.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Does this group strictly outrank the other?
    pub fn outranks(self, other: Group) -> bool {
        self > other
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::User
    }
}

impl TryFrom<u8> for Group {
    type Error = Error;

    fn try_from(rank: u8) -> Result<Self, Self::Error> {
        match rank {
            1 => Ok(Self::User),
            2 => Ok(Self::Moderator),
            3 => Ok(Self::Admin),
            4 => Ok(Self::Owner),
            _ => Err(Error::GroupNotFound),
        }
    }
}

impl From<Group> for Bson {
    fn from(group: Group) -> Self {
        Bson::Int32(group.rank().into())
    }
}

impl Display for Group {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::User => "user",
                Self::Moderator => "moderator",
                Self::Admin => "admin",
                Self::Owner => "owner",
            }
        )
    }
}
