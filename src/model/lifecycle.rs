//! Poll lifecycle: lookups that respect soft deletion, and the state
//! changes open to a poll's author and to moderators.

use std::collections::HashMap;

use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::poll::{OptionDescription, PollDescription},
    common::access::authorize_author_or_moderator,
    db::{poll::Poll, poll_option::PollOption, user::User, vote::Vote},
    mongodb::{Coll, Id},
};

/// Get a poll that has not been soft-deleted.
pub async fn visible_poll(polls: &Coll<Poll>, poll_id: Id) -> Result<Poll> {
    polls
        .find_one(Poll::visible_filter(poll_id), None)
        .await?
        .ok_or(Error::PollNotFound)
}

/// Get a visible poll that `actor` is allowed to change.
pub async fn editable_poll(polls: &Coll<Poll>, actor: &User, poll_id: Id) -> Result<Poll> {
    let poll = visible_poll(polls, poll_id).await?;
    authorize_author_or_moderator(actor, poll.author_id)?;
    Ok(poll)
}

/// Apply `set` to a poll `actor` may change, returning the updated poll.
async fn set_fields(polls: &Coll<Poll>, actor: &User, poll_id: Id, set: Document) -> Result<Poll> {
    let mut poll = editable_poll(polls, actor, poll_id).await?;
    if !set.is_empty() {
        polls
            .update_one(Poll::visible_filter(poll_id), doc! { "$set": set }, None)
            .await?;
        poll = visible_poll(polls, poll_id).await?;
    }
    Ok(poll)
}

/// Close a poll to votes.
pub async fn complete(polls: &Coll<Poll>, actor: &User, poll_id: Id) -> Result<Poll> {
    let poll = set_fields(polls, actor, poll_id, doc! { "completed": true }).await?;
    info!("User {} completed poll {poll_id}", actor.id);
    Ok(poll)
}

/// Reopen a completed poll.
pub async fn resume(polls: &Coll<Poll>, actor: &User, poll_id: Id) -> Result<Poll> {
    let poll = set_fields(polls, actor, poll_id, doc! { "completed": false }).await?;
    info!("User {} resumed poll {poll_id}", actor.id);
    Ok(poll)
}

/// Soft-delete a poll. It disappears from every ordinary read.
pub async fn soft_delete(polls: &Coll<Poll>, actor: &User, poll_id: Id) -> Result<()> {
    editable_poll(polls, actor, poll_id).await?;
    polls
        .update_one(
            Poll::visible_filter(poll_id),
            doc! { "$set": { "deleted": true } },
            None,
        )
        .await?;
    info!("User {} deleted poll {poll_id}", actor.id);
    Ok(())
}

/// Change a poll's title, description or privacy.
pub async fn update(polls: &Coll<Poll>, actor: &User, poll_id: Id, set: Document) -> Result<Poll> {
    set_fields(polls, actor, poll_id, set).await
}

/// Describe a poll with its options and their vote counts.
pub async fn describe(db: &Database, poll: Poll) -> Result<PollDescription> {
    describe_all(db, vec![poll])
        .await?
        .pop()
        .ok_or(Error::Unknown)
}

/// Describe many polls, preserving order. Options and vote counts for the
/// whole batch are fetched with one query each.
pub async fn describe_all(db: &Database, polls: Vec<Poll>) -> Result<Vec<PollDescription>> {
    if polls.is_empty() {
        return Ok(Vec::new());
    }
    let poll_ids = polls.iter().map(|poll| poll.id).collect::<Vec<_>>();

    let options = Coll::<PollOption>::from_db(db)
        .find(
            doc! { "poll_id": { "$in": &poll_ids } },
            FindOptions::builder().sort(doc! { "_id": 1 }).build(),
        )
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let pipeline = [
        doc! { "$match": { "poll_id": { "$in": &poll_ids } } },
        doc! { "$group": { "_id": "$option_id", "votes": { "$sum": 1 } } },
    ];
    let mut votes = HashMap::new();
    let mut counts = Coll::<Vote>::from_db(db).aggregate(pipeline, None).await?;
    while let Some(count) = counts.try_next().await? {
        let option_id = Id::from(count.get_object_id("_id").map_err(|_| Error::Unknown)?);
        let total = match count.get("votes") {
            Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or_default(),
            Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or_default(),
            _ => 0,
        };
        votes.insert(option_id, total);
    }

    let mut by_poll: HashMap<Id, Vec<OptionDescription>> = HashMap::new();
    for option in options {
        let total = votes.get(&option.id).copied().unwrap_or_default();
        by_poll
            .entry(option.poll_id)
            .or_default()
            .push(OptionDescription::new(option, total));
    }

    Ok(polls
        .into_iter()
        .map(|poll| {
            let options = by_poll.remove(&poll.id).unwrap_or_default();
            PollDescription::new(poll, options)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        common::{group::Group, poll::PollState},
        db::{poll::PollCore, poll_option::PollOptionCore, vote::VoteCore},
    };

    async fn insert_poll(polls: &Coll<Poll>, author_id: Id) -> Poll {
        let poll = Poll {
            id: Id::new(),
            poll: PollCore::example(author_id),
        };
        polls.insert_one(&poll, None).await.unwrap();
        poll
    }

    #[backend_test]
    async fn lifecycle_transitions(polls: Coll<Poll>) {
        let author = User::example(Group::User);
        let poll = insert_poll(&polls, author.id).await;

        let completed = complete(&polls, &author, poll.id).await.unwrap();
        assert_eq!(completed.state(), PollState::Completed);
        let resumed = resume(&polls, &author, poll.id).await.unwrap();
        assert_eq!(resumed.state(), PollState::Open);

        soft_delete(&polls, &author, poll.id).await.unwrap();
        assert!(matches!(
            visible_poll(&polls, poll.id).await,
            Err(Error::PollNotFound)
        ));
        // Deletion is terminal.
        assert!(matches!(
            resume(&polls, &author, poll.id).await,
            Err(Error::PollNotFound)
        ));
        // The document itself survives.
        let stored = polls.find_one(poll.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.state(), PollState::Deleted);
    }

    #[backend_test]
    async fn only_author_or_moderator_may_change(polls: Coll<Poll>) {
        let author = User::example(Group::User);
        let stranger = User::example(Group::User);
        let moderator = User::example(Group::Moderator);
        let poll = insert_poll(&polls, author.id).await;

        assert!(matches!(
            complete(&polls, &stranger, poll.id).await,
            Err(Error::AccessDenied)
        ));
        assert!(matches!(
            soft_delete(&polls, &stranger, poll.id).await,
            Err(Error::AccessDenied)
        ));
        let updated = update(&polls, &moderator, poll.id, doc! { "title": "Renamed" })
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, poll.description);
    }

    #[backend_test]
    async fn description_counts_votes(db: Database, polls: Coll<Poll>) {
        let author = User::example(Group::User);
        let poll = insert_poll(&polls, author.id).await;
        let options = ["Yes", "No"]
            .into_iter()
            .map(|title| PollOption {
                id: Id::new(),
                option: PollOptionCore {
                    title: title.to_string(),
                    poll_id: poll.id,
                },
            })
            .collect::<Vec<_>>();
        Coll::<PollOption>::from_db(&db)
            .insert_many(&options, None)
            .await
            .unwrap();
        let votes = (0..3)
            .map(|_| Vote {
                id: Id::new(),
                vote: VoteCore::new(Id::new(), options[1].id, poll.id),
            })
            .collect::<Vec<_>>();
        Coll::<Vote>::from_db(&db)
            .insert_many(&votes, None)
            .await
            .unwrap();

        let description = describe(&db, poll).await.unwrap();
        assert_eq!(description.options.len(), 2);
        assert_eq!(description.options[0].title, "Yes");
        assert_eq!(description.options[0].votes, 0);
        assert_eq!(description.options[1].votes, 3);
    }

    #[backend_test]
    async fn batch_description_keeps_polls_apart(db: Database, polls: Coll<Poll>) {
        let author = User::example(Group::User);
        let first = insert_poll(&polls, author.id).await;
        let second = insert_poll(&polls, author.id).await;
        let empty = insert_poll(&polls, author.id).await;
        let options = [first.id, second.id]
            .into_iter()
            .map(|poll_id| PollOption {
                id: Id::new(),
                option: PollOptionCore {
                    title: "Only".to_string(),
                    poll_id,
                },
            })
            .collect::<Vec<_>>();
        Coll::<PollOption>::from_db(&db)
            .insert_many(&options, None)
            .await
            .unwrap();
        let votes = [(options[0].id, first.id), (options[1].id, second.id), (options[1].id, second.id)]
            .into_iter()
            .map(|(option_id, poll_id)| Vote {
                id: Id::new(),
                vote: VoteCore::new(Id::new(), option_id, poll_id),
            })
            .collect::<Vec<_>>();
        Coll::<Vote>::from_db(&db)
            .insert_many(&votes, None)
            .await
            .unwrap();

        let ids = [second.id, empty.id, first.id];
        let descriptions = describe_all(&db, vec![second, empty, first]).await.unwrap();
        assert_eq!(descriptions.len(), 3);
        for (description, id) in descriptions.iter().zip(ids) {
            assert_eq!(description.id, id.to_hex());
        }
        assert_eq!(descriptions[0].options[0].votes, 2);
        assert!(descriptions[1].options.is_empty());
        assert_eq!(descriptions[2].options[0].votes, 1);
        assert!(describe_all(&db, Vec::new()).await.unwrap().is_empty());
    }
}
