//! Capability checks. Every rank comparison the API makes lives here.

use crate::error::{Error, Result};
use crate::model::{
    common::group::Group,
    db::user::{User, UserCore},
    mongodb::Id,
};

/// What a caller needs in order to reach an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Anyone, authenticated or not.
    Guest,
    /// Any authenticated, non-banned user.
    User,
    /// Rank Moderator or above.
    Moderator,
    /// Rank Admin or above.
    Admin,
}

impl Capability {
    /// The lowest group holding this capability, or `None` for guests.
    pub fn minimum_group(self) -> Option<Group> {
        match self {
            Self::Guest => None,
            Self::User => Some(Group::User),
            Self::Moderator => Some(Group::Moderator),
            Self::Admin => Some(Group::Admin),
        }
    }
}

/// Check that `actor` holds `capability`.
///
/// A banned user fails every authenticated check, regardless of rank.
pub fn authorize(actor: Option<&UserCore>, capability: Capability) -> Result<()> {
    let required = match capability.minimum_group() {
        None => return Ok(()),
        Some(group) => group,
    };
    let actor = actor.ok_or(Error::NoAuth)?;
    if actor.banned {
        return Err(Error::UserBanned);
    }
    if actor.group < required {
        return Err(Error::AccessDenied);
    }
    Ok(())
}

/// Acting on another user (ban, unban, delete, group change) requires
/// strictly outranking them.
pub fn authorize_moderation(actor: &UserCore, target: &UserCore) -> Result<()> {
    if actor.group.outranks(target.group) {
        Ok(())
    } else {
        Err(Error::AccessDenied)
    }
}

/// A group may only be granted by someone strictly above it.
pub fn authorize_group_grant(actor: &UserCore, new_group: Group) -> Result<()> {
    if actor.group.outranks(new_group) {
        Ok(())
    } else {
        Err(Error::GroupNotAllowed)
    }
}

/// Full group-change rule: the new group must be below the actor, and the
/// target's current group must be below the actor.
pub fn authorize_group_change(actor: &UserCore, target: &UserCore, new_group: Group) -> Result<()> {
    authorize_group_grant(actor, new_group)?;
    authorize_moderation(actor, target)
}

/// Poll and comment mutations are open to the author and to moderators.
pub fn authorize_author_or_moderator(actor: &User, author_id: Id) -> Result<()> {
    if actor.id == author_id || actor.group >= Group::Moderator {
        Ok(())
    } else {
        Err(Error::AccessDenied)
    }
}

/// Is `actor` the user called `username`, or a moderator?
pub fn is_self_or_moderator(actor: &UserCore, username: &str) -> bool {
    actor.username == username || actor.group >= Group::Moderator
}
