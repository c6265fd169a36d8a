use mongodb::{bson::doc, Client, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{Authenticated, UserRights},
            pagination::PaginationRequest,
            poll::{PollSpec, PollUpdate},
            response::{success, success_with, Success},
            validation::validated,
        },
        db::poll::Poll,
        lifecycle::{self, describe, describe_all, visible_poll},
        mongodb::{Coll, Id},
        voting::{cast_vote, create_poll},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_polls,
        new_poll,
        get_poll,
        update_poll,
        delete_poll,
        vote,
        complete_poll,
        resume_poll,
    ]
}

/// Public listing: open and completed polls, newest first. Private polls
/// are only reachable by ID.
#[get("/polls?<pagination..>")]
async fn list_polls(
    pagination: PaginationRequest,
    polls: Coll<Poll>,
    db: &State<Database>,
) -> Result<Success> {
    let filter = doc! { "deleted": false, "private": false };
    let page = polls
        .find(filter.clone(), pagination.find_options(doc! { "created_at": -1, "_id": -1 }))
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    let total = polls.count_documents(filter, None).await?;
    let page = describe_all(db, page).await?;

    Ok(success_with("polls", pagination.to_paginated(total, page)))
}

#[post("/polls", data = "<spec>", format = "json")]
async fn new_poll(
    current: Authenticated<UserRights>,
    spec: Json<PollSpec>,
    db_client: &State<Client>,
    db: &State<Database>,
    config: &State<Config>,
) -> Result<Success> {
    let spec = validated(spec)?;
    let (poll, _) = create_poll(db_client, db, &current, spec, config.poll_creation_cost()).await?;
    Ok(success_with("poll", describe(db, poll).await?))
}

#[get("/polls/<poll_id>")]
async fn get_poll(poll_id: Id, polls: Coll<Poll>, db: &State<Database>) -> Result<Success> {
    let poll = visible_poll(&polls, poll_id).await?;
    Ok(success_with("poll", describe(db, poll).await?))
}

#[put("/polls/<poll_id>", data = "<update>", format = "json")]
async fn update_poll(
    current: Authenticated<UserRights>,
    poll_id: Id,
    update: Json<PollUpdate>,
    polls: Coll<Poll>,
    db: &State<Database>,
) -> Result<Success> {
    let update = validated(update)?;
    let poll = lifecycle::update(&polls, &current, poll_id, update.into_update()).await?;
    Ok(success_with("poll", describe(db, poll).await?))
}

#[delete("/polls/<poll_id>")]
async fn delete_poll(
    current: Authenticated<UserRights>,
    poll_id: Id,
    polls: Coll<Poll>,
) -> Result<Success> {
    lifecycle::soft_delete(&polls, &current, poll_id).await?;
    Ok(success())
}

#[post("/polls/vote/<option_id>")]
async fn vote(
    current: Authenticated<UserRights>,
    option_id: Id,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Success> {
    cast_vote(db_client, db, current.id, option_id).await?;
    Ok(success())
}

#[put("/polls/<poll_id>/complete")]
async fn complete_poll(
    current: Authenticated<UserRights>,
    poll_id: Id,
    polls: Coll<Poll>,
) -> Result<Success> {
    lifecycle::complete(&polls, &current, poll_id).await?;
    Ok(success())
}

#[put("/polls/<poll_id>/resume")]
async fn resume_poll(
    current: Authenticated<UserRights>,
    poll_id: Id,
    polls: Coll<Poll>,
) -> Result<Success> {
    lifecycle::resume(&polls, &current, poll_id).await?;
    Ok(success())
}
