//! The voting and points engine. Everything that moves points or votes
//! around goes through here, inside a transaction where more than one
//! document changes.

use mongodb::{
    bson::doc,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, Database,
};

use crate::error::{Error, Result};
use crate::model::{
    api::poll::PollSpec,
    common::points::{Points, PointsAction},
    db::{
        poll::{Poll, PollCore},
        poll_option::{PollOption, PollOptionCore},
        user::User,
        vote::{NewVote, Vote},
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// How many times a vote is attempted when it races another vote by the
/// same user.
const VOTE_ATTEMPTS: u32 = 5;

/// What happened when a vote was cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub poll_id: Id,
    /// True if this was the user's first vote in the poll, and so earned
    /// points.
    pub first_vote: bool,
}

/// Cast `user_id`'s vote for `option_id`, replacing any earlier vote of
/// theirs in the same poll. Only a user's first vote in a poll earns points.
///
/// Two simultaneous votes by one user conflict inside MongoDB; the loser is
/// retried and then sees the winner's vote, so it replaces it instead of
/// earning points again.
pub async fn cast_vote(
    db_client: &Client,
    db: &Database,
    user_id: Id,
    option_id: Id,
) -> Result<VoteReceipt> {
    let mut attempt = 1;
    loop {
        match try_cast_vote(db_client, db, user_id, option_id).await {
            Err(Error::Db(err)) if attempt < VOTE_ATTEMPTS && is_vote_race(&err) => {
                debug!("Vote by user {user_id} raced another, retrying (attempt {attempt})");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// A write conflict with a concurrent transaction, or the one-vote-per-poll
/// index rejecting a concurrent first vote.
fn is_vote_race(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR) || is_duplicate_key_error(err)
}

async fn try_cast_vote(
    db_client: &Client,
    db: &Database,
    user_id: Id,
    option_id: Id,
) -> Result<VoteReceipt> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    // Resolve the option and its poll.
    let option = Coll::<PollOption>::from_db(db)
        .find_one_with_session(option_id.as_doc(), None, &mut session)
        .await?
        .ok_or(Error::OptionNotFound)?;
    let poll = Coll::<Poll>::from_db(db)
        .find_one_with_session(Poll::visible_filter(option.poll_id), None, &mut session)
        .await?
        .ok_or(Error::PollNotFound)?;
    if !poll.state().accepts_votes() {
        return Err(Error::PollCompleted);
    }

    // Replace any existing vote.
    let previous = Coll::<Vote>::from_db(db)
        .delete_many_with_session(
            doc! { "user_id": user_id, "poll_id": poll.id },
            None,
            &mut session,
        )
        .await?;
    let first_vote = previous.deleted_count == 0;
    if first_vote {
        Coll::<User>::from_db(db)
            .update_one_with_session(
                user_id.as_doc(),
                doc! { "$inc": { "points": Points::VOTE } },
                None,
                &mut session,
            )
            .await?;
    }

    // The unique (user_id, poll_id) index rejects a concurrent first vote
    // here rather than crediting it twice.
    Coll::<NewVote>::from_db(db)
        .insert_one_with_session(NewVote::new(user_id, option.id, poll.id), None, &mut session)
        .await?;

    session.commit_transaction().await?;
    debug!(
        "User {user_id} voted for option {option_id} in poll {} (first vote: {first_vote})",
        poll.id
    );

    Ok(VoteReceipt {
        poll_id: poll.id,
        first_vote,
    })
}

/// Create a poll and its options. Unverified authors pay `cost` points,
/// and the poll is only created if they can afford it.
///
/// `spec` must already be validated.
pub async fn create_poll(
    db_client: &Client,
    db: &Database,
    author: &User,
    spec: PollSpec,
    cost: i64,
) -> Result<(Poll, Vec<PollOption>)> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    if !author.verified {
        // Check and charge in one step, so the balance can't go negative.
        let charged = Coll::<User>::from_db(db)
            .update_one_with_session(
                doc! { "_id": author.id, "points": { "$gte": cost } },
                doc! { "$inc": { "points": -cost } },
                None,
                &mut session,
            )
            .await?;
        if charged.matched_count == 0 {
            return Err(Error::NotEnoughPoints);
        }
    }

    let poll = Poll {
        id: Id::new(),
        poll: PollCore::new(spec.title, spec.description, author.id, spec.private),
    };
    Coll::<Poll>::from_db(db)
        .insert_one_with_session(&poll, None, &mut session)
        .await?;

    let options = spec
        .options
        .into_iter()
        .map(|option| PollOption {
            id: Id::new(),
            option: PollOptionCore {
                title: option.title,
                poll_id: poll.id,
            },
        })
        .collect::<Vec<_>>();
    Coll::<PollOption>::from_db(db)
        .insert_many_with_session(&options, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    info!("User {} created poll {}", author.id, poll.id);

    Ok((poll, options))
}

/// Award or deduct `count` points. `action` must be 1 or -1.
pub async fn adjust_points(
    users: &Coll<User>,
    username: &str,
    action: i64,
    count: u32,
) -> Result<User> {
    let action = PointsAction::try_from(action)?;
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    users
        .find_one_and_update(
            doc! { "username": username },
            doc! { "$inc": { "points": action.delta(count) } },
            options,
        )
        .await?
        .ok_or(Error::UserNotFound)
}
