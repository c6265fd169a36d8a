use mongodb::{
    bson::{doc, Document},
    Client, Database,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    mail::{Email, Mailer},
    model::{
        api::{
            auth::{AdminRights, Authenticated, ModeratorRights, Token, UserRights},
            pagination::PaginationRequest,
            response::{success, success_with, Success},
            user::{
                set_update, AdminUserUpdate, ChangeGroupRequest, ChangePasswordRequest,
                ChangePointsRequest, CustomEmailRequest, EmailUpdate, NewUserRequest,
                ProfileUpdate, UserDescription,
            },
            validation::validated,
        },
        common::{
            access::{authorize_group_grant, authorize_moderation, is_self_or_moderator},
            group::Group,
        },
        db::{
            poll::Poll,
            user::{hash_password, User, UserCore},
            vote::Vote,
        },
        lifecycle::describe_all,
        mongodb::{Coll, Id},
        voting::adjust_points,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_users,
        create_user,
        get_user,
        update_user,
        delete_user,
        update_profile,
        update_email,
        change_password,
        verify,
        cancel_verification,
        ban,
        unban,
        change_group,
        change_points,
        user_polls,
        send_email,
    ]
}

/// Find a user by username.
async fn find_user(users: &Coll<User>, username: &str) -> Result<User> {
    users
        .find_one(doc! { "username": username }, None)
        .await?
        .ok_or(Error::UserNotFound)
}

/// Set fields on a user by username, failing if they don't exist.
async fn set_fields(users: &Coll<User>, username: &str, set: Document) -> Result<()> {
    let update = match set_update(set) {
        Some(update) => update,
        None => {
            find_user(users, username).await?;
            return Ok(());
        }
    };
    let result = users
        .update_one(doc! { "username": username }, update, None)
        .await
        .map_err(Error::user_write)?;
    if result.matched_count == 0 {
        return Err(Error::UserNotFound);
    }
    Ok(())
}

#[get("/users?<pagination..>")]
async fn list_users(
    _current: Authenticated<ModeratorRights>,
    pagination: PaginationRequest,
    users: Coll<User>,
) -> Result<Success> {
    let page = users
        .find(doc! {}, pagination.find_options(doc! { "created_at": -1, "_id": -1 }))
        .await?
        .map_ok(|user| UserDescription::new(user, true))
        .try_collect::<Vec<_>>()
        .await?;
    let total = users.count_documents(doc! {}, None).await?;
    Ok(success_with("users", pagination.to_paginated(total, page)))
}

#[post("/users", data = "<request>", format = "json")]
async fn create_user(
    current: Authenticated<AdminRights>,
    request: Json<NewUserRequest>,
    users: Coll<User>,
) -> Result<Success> {
    let request = validated(request)?;

    let mut user = UserCore::new(request.username, request.email, &request.password)?;
    if let Some(group) = request.group {
        let group = Group::try_from(group)?;
        authorize_group_grant(&current, group)?;
        user.group = group;
    }
    user.points = request.points.unwrap_or_default();
    user.verified = request.verified.unwrap_or_default();
    user.email_confirmed = request.email_confirmed.unwrap_or_default();
    user.bio = request.bio;

    let user = User {
        id: Id::new(),
        user,
    };
    users
        .insert_one(&user, None)
        .await
        .map_err(Error::user_write)?;
    info!("User {} created user {}", current.id, user.username);

    Ok(success_with("user", UserDescription::new(user, true)))
}

#[get("/users/<username>")]
async fn get_user(
    current: Option<Authenticated<UserRights>>,
    username: &str,
    users: Coll<User>,
) -> Result<Success> {
    let user = find_user(&users, username).await?;
    let include_email = current
        .map(|current| is_self_or_moderator(&current, username))
        .unwrap_or(false);
    Ok(success_with("user", UserDescription::new(user, include_email)))
}

#[put("/users/<username>", data = "<request>", format = "json")]
async fn update_user(
    current: Authenticated<AdminRights>,
    username: &str,
    request: Json<AdminUserUpdate>,
    users: Coll<User>,
) -> Result<Success> {
    let request = validated(request)?;

    let target = find_user(&users, username).await?;
    if target.id != current.id {
        authorize_moderation(&current, &target)?;
    }
    set_fields(&users, username, request.into_update()?).await?;

    Ok(success())
}

#[delete("/users/<username>")]
async fn delete_user(
    current: Authenticated<AdminRights>,
    username: &str,
    users: Coll<User>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<Success> {
    let target = find_user(&users, username).await?;
    authorize_moderation(&current, &target)?;

    // The user's votes go with them; their polls and comments stay.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        users
            .delete_one_with_session(target.id.as_doc(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(doc! { "user_id": target.id }, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }
    warn!("User {} deleted user {}", current.id, target.username);

    Ok(success())
}

#[put("/users/<username>/profile", data = "<request>", format = "json")]
async fn update_profile(
    current: Authenticated<UserRights>,
    username: &str,
    request: Json<ProfileUpdate>,
    users: Coll<User>,
) -> Result<Success> {
    if !is_self_or_moderator(&current, username) {
        return Err(Error::AccessDenied);
    }
    let request = validated(request)?;
    set_fields(&users, username, request.into_update()).await?;
    Ok(success())
}

#[put("/users/<username>/email", data = "<request>", format = "json")]
async fn update_email(
    current: Authenticated<UserRights>,
    username: &str,
    request: Json<EmailUpdate>,
    users: Coll<User>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<Success> {
    if current.username != username {
        return Err(Error::AccessDenied);
    }
    let request = validated(request)?;

    let set = doc! { "email": &request.email, "email_confirmed": false };
    set_fields(&users, username, set).await?;

    // Ask the user to confirm the new address.
    let mut user = current.user;
    user.email = request.email;
    let token = Token::email_confirmation(user.id, &user.email).encode(config);
    mailer
        .send_best_effort(Email::confirm_email(&user, &token))
        .await;

    Ok(success())
}

#[put("/users/<username>/change_password", data = "<request>", format = "json")]
async fn change_password(
    current: Authenticated<UserRights>,
    username: &str,
    request: Json<ChangePasswordRequest>,
    users: Coll<User>,
) -> Result<Success> {
    if current.username != username {
        return Err(Error::AccessDenied);
    }
    let request = validated(request)?;

    if !current.verify_password(&request.old_password)? {
        return Err(Error::WrongOldPassword);
    }
    let password_hash = hash_password(&request.new_password)?;
    set_fields(&users, username, doc! { "password_hash": password_hash }).await?;

    Ok(success())
}

#[put("/users/<username>/verify")]
async fn verify(
    _current: Authenticated<AdminRights>,
    username: &str,
    users: Coll<User>,
) -> Result<Success> {
    set_fields(&users, username, doc! { "verified": true }).await?;
    Ok(success())
}

#[put("/users/<username>/cancel_verification")]
async fn cancel_verification(
    _current: Authenticated<AdminRights>,
    username: &str,
    users: Coll<User>,
) -> Result<Success> {
    set_fields(&users, username, doc! { "verified": false }).await?;
    Ok(success())
}

/// Ban or unban a user the current moderator outranks.
async fn set_banned(
    current: &User,
    username: &str,
    users: &Coll<User>,
    banned: bool,
) -> Result<Success> {
    let target = find_user(users, username).await?;
    authorize_moderation(current, &target)?;
    set_fields(users, username, doc! { "banned": banned }).await?;
    info!(
        "User {} {} user {}",
        current.id,
        if banned { "banned" } else { "unbanned" },
        target.username
    );
    Ok(success())
}

#[put("/users/<username>/ban")]
async fn ban(
    current: Authenticated<ModeratorRights>,
    username: &str,
    users: Coll<User>,
) -> Result<Success> {
    set_banned(&current, username, &users, true).await
}

#[put("/users/<username>/unban")]
async fn unban(
    current: Authenticated<ModeratorRights>,
    username: &str,
    users: Coll<User>,
) -> Result<Success> {
    set_banned(&current, username, &users, false).await
}

#[put("/users/<username>/change_group", data = "<request>", format = "json")]
async fn change_group(
    current: Authenticated<AdminRights>,
    username: &str,
    request: Json<ChangeGroupRequest>,
    users: Coll<User>,
) -> Result<Success> {
    let request = validated(request)?;

    let group = Group::try_from(request.group)?;
    authorize_group_grant(&current, group)?;
    let target = find_user(&users, username).await?;
    authorize_moderation(&current, &target)?;

    set_fields(&users, username, doc! { "group": group }).await?;
    info!(
        "User {} moved user {} from {} to {group}",
        current.id, target.username, target.group
    );

    Ok(success())
}

#[put("/users/<username>/change_points", data = "<request>", format = "json")]
async fn change_points(
    _current: Authenticated<ModeratorRights>,
    username: &str,
    request: Json<ChangePointsRequest>,
    users: Coll<User>,
) -> Result<Success> {
    let request = validated(request)?;
    let user = adjust_points(&users, username, request.action, request.count).await?;
    Ok(success_with("points", user.points))
}

#[get("/users/<username>/polls?<pagination..>")]
async fn user_polls(
    current: Authenticated<UserRights>,
    username: &str,
    pagination: PaginationRequest,
    users: Coll<User>,
    polls: Coll<Poll>,
    db: &State<Database>,
) -> Result<Success> {
    if !is_self_or_moderator(&current, username) {
        return Err(Error::AccessDenied);
    }
    let author = find_user(&users, username).await?;

    let filter = doc! { "author_id": author.id, "deleted": false };
    let page = polls
        .find(filter.clone(), pagination.find_options(doc! { "created_at": -1, "_id": -1 }))
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    let total = polls.count_documents(filter, None).await?;
    let page = describe_all(db, page).await?;

    Ok(success_with("polls", pagination.to_paginated(total, page)))
}

#[post("/users/<username>/send_email", data = "<request>", format = "json")]
async fn send_email(
    _current: Authenticated<AdminRights>,
    username: &str,
    request: Json<CustomEmailRequest>,
    users: Coll<User>,
    mailer: &State<Mailer>,
) -> Result<Success> {
    let request = validated(request)?;
    let user = find_user(&users, username).await?;
    mailer
        .send(Email::custom(&user, request.subject, request.text))
        .await?;
    Ok(success())
}
