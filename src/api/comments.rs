use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Authenticated, UserRights},
            comment::{CommentDescription, CommentSpec},
            pagination::PaginationRequest,
            response::{success, success_with, Success},
            validation::validated,
        },
        common::access::authorize_author_or_moderator,
        db::{
            comment::{Comment, NewComment},
            poll::Poll,
            user::User,
        },
        lifecycle::visible_poll,
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        new_comment,
        poll_comments,
        get_comment,
        update_comment,
        delete_comment
    ]
}

/// Get a comment whose poll is still visible.
async fn find_comment(comments: &Coll<Comment>, polls: &Coll<Poll>, comment_id: Id) -> Result<Comment> {
    let comment = comments
        .find_one(comment_id.as_doc(), None)
        .await?
        .ok_or(Error::CommentNotFound)?;
    match visible_poll(polls, comment.poll_id).await {
        Ok(_) => Ok(comment),
        Err(Error::PollNotFound) => Err(Error::CommentNotFound),
        Err(err) => Err(err),
    }
}

/// Get a comment `actor` may change.
async fn editable_comment(
    comments: &Coll<Comment>,
    polls: &Coll<Poll>,
    actor: &User,
    comment_id: Id,
) -> Result<Comment> {
    let comment = find_comment(comments, polls, comment_id).await?;
    authorize_author_or_moderator(actor, comment.user_id)?;
    Ok(comment)
}

// Ranked below `POST /polls/vote/<option_id>`, which has the same shape.
#[post("/polls/<poll_id>/comment", data = "<spec>", format = "json", rank = 2)]
async fn new_comment(
    current: Authenticated<UserRights>,
    poll_id: Id,
    spec: Json<CommentSpec>,
    comments: Coll<NewComment>,
    polls: Coll<Poll>,
) -> Result<Success> {
    let spec = validated(spec)?;
    visible_poll(&polls, poll_id).await?;

    let comment = NewComment::new(spec.text, current.id, poll_id);
    let id: Id = comments
        .insert_one(&comment, None)
        .await?
        .inserted_id
        .as_object_id()
        .ok_or(Error::Unknown)?
        .into();
    debug!("User {} commented on poll {poll_id}", current.id);

    let comment = Comment { id, comment };
    Ok(success_with("comment", CommentDescription::from(comment)))
}

#[get("/polls/<poll_id>/comments?<pagination..>")]
async fn poll_comments(
    poll_id: Id,
    pagination: PaginationRequest,
    comments: Coll<Comment>,
    polls: Coll<Poll>,
) -> Result<Success> {
    visible_poll(&polls, poll_id).await?;

    let filter = doc! { "poll_id": poll_id };
    let page = comments
        .find(filter.clone(), pagination.find_options(doc! { "created_at": -1, "_id": -1 }))
        .await?
        .map_ok(CommentDescription::from)
        .try_collect::<Vec<_>>()
        .await?;
    let total = comments.count_documents(filter, None).await?;

    Ok(success_with("comments", pagination.to_paginated(total, page)))
}

#[get("/comments/<comment_id>")]
async fn get_comment(comment_id: Id, comments: Coll<Comment>, polls: Coll<Poll>) -> Result<Success> {
    let comment = find_comment(&comments, &polls, comment_id).await?;
    Ok(success_with("comment", CommentDescription::from(comment)))
}

#[put("/comments/<comment_id>", data = "<spec>", format = "json")]
async fn update_comment(
    current: Authenticated<UserRights>,
    comment_id: Id,
    spec: Json<CommentSpec>,
    comments: Coll<Comment>,
    polls: Coll<Poll>,
) -> Result<Success> {
    let spec = validated(spec)?;
    let mut comment = editable_comment(&comments, &polls, &current, comment_id).await?;

    comments
        .update_one(
            comment_id.as_doc(),
            doc! { "$set": { "text": &spec.text } },
            None,
        )
        .await?;
    comment.text = spec.text;

    Ok(success_with("comment", CommentDescription::from(comment)))
}

#[delete("/comments/<comment_id>")]
async fn delete_comment(
    current: Authenticated<UserRights>,
    comment_id: Id,
    comments: Coll<Comment>,
    polls: Coll<Poll>,
) -> Result<Success> {
    editable_comment(&comments, &polls, &current, comment_id).await?;
    comments.delete_one(comment_id.as_doc(), None).await?;
    info!("User {} deleted comment {comment_id}", current.id);
    Ok(success())
}
