use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    comment::{Comment, NewComment},
    poll::Poll,
    poll_option::PollOption,
    user::{NewUser, User},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Database>>()
            .await
            .map(|db| Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Poll collections
const POLLS: &str = "polls";
impl MongoCollection for Poll {
    const NAME: &'static str = POLLS;
}

// Option collections
const OPTIONS: &str = "options";
impl MongoCollection for PollOption {
    const NAME: &'static str = OPTIONS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Comment collections
const COMMENTS: &str = "comments";
impl MongoCollection for Comment {
    const NAME: &'static str = COMMENTS;
}
impl MongoCollection for NewComment {
    const NAME: &'static str = COMMENTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection: usernames and emails are both unique.
    let username_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_indexes([username_index, email_index], None)
        .await?;

    // Poll collection.
    let author_index = IndexModel::builder()
        .keys(doc! {"author_id": 1, "created_at": -1})
        .build();
    Coll::<Poll>::from_db(db)
        .create_index(author_index, None)
        .await?;

    // Option collection.
    let option_index = IndexModel::builder().keys(doc! {"poll_id": 1}).build();
    Coll::<PollOption>::from_db(db)
        .create_index(option_index, None)
        .await?;

    // Vote collection: at most one vote per user per poll.
    let one_vote_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "poll_id": 1})
        .options(unique.clone())
        .build();
    let option_votes_index = IndexModel::builder().keys(doc! {"option_id": 1}).build();
    Coll::<Vote>::from_db(db)
        .create_indexes([one_vote_index, option_votes_index], None)
        .await?;

    // Comment collection.
    let comment_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "created_at": -1})
        .build();
    Coll::<Comment>::from_db(db)
        .create_index(comment_index, None)
        .await?;

    Ok(())
}
