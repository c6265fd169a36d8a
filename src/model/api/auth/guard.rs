use std::{marker::PhantomData, ops::Deref};

use mongodb::Database;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::config::Config;
use crate::error::{Error, ErrorBody};
use crate::model::{
    common::access::{authorize, Capability},
    db::user::User,
    mongodb::{Coll, Id},
};

use super::token::{Token, TokenPurpose, AUTH_TOKEN_COOKIE};

/// A guard failure, remembered for the catcher so it can report the same
/// error envelope the guard decided on.
#[derive(Debug, Clone, Default)]
pub struct GuardFailure(pub Option<(Status, ErrorBody)>);

/// Record `err` for the catchers and fail the guard with it.
fn fail<S>(req: &Request<'_>, err: Error) -> Outcome<S, Error> {
    let status = err.status();
    let body = ErrorBody::from(&err);
    req.local_cache(|| GuardFailure(Some((status, body))));
    Outcome::Failure((status, err))
}

/// The raw token a request presents: an `Authorization: Bearer` header, or
/// failing that the session cookie.
fn presented_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .or_else(|| {
            req.cookies()
                .get(AUTH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

/// Marker types naming the capability an [`Authenticated`] guard requires.
pub trait Rights {
    const CAPABILITY: Capability;
}

/// Any signed-in, non-banned user.
pub struct UserRights;

impl Rights for UserRights {
    const CAPABILITY: Capability = Capability::User;
}

/// Moderators and above.
pub struct ModeratorRights;

impl Rights for ModeratorRights {
    const CAPABILITY: Capability = Capability::Moderator;
}

/// Admins and above.
pub struct AdminRights;

impl Rights for AdminRights {
    const CAPABILITY: Capability = Capability::Admin;
}

/// The current user, loaded fresh from the database and authorized for the
/// capability named by `R`.
///
/// Use `Option<Authenticated<UserRights>>` for endpoints that guests may
/// also reach.
pub struct Authenticated<R> {
    pub user: User,
    phantom: PhantomData<R>,
}

impl<R> Deref for Authenticated<R> {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for Authenticated<R>
where
    R: Rights + Send,
{
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await.succeeded() {
            Some(config) => config,
            None => return fail(req, Error::Unknown),
        };

        // Decode the access token.
        let token = match presented_token(req) {
            Some(token) => token,
            None => return fail(req, Error::NoAuth),
        };
        let token = match Token::decode(&token, TokenPurpose::Access, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected access token: {e}");
                return fail(req, Error::NoAuth);
            }
        };

        // Check the user actually exists, and load their current rights.
        let db = match req.guard::<&State<Database>>().await.succeeded() {
            Some(db) => db,
            None => return fail(req, Error::Unknown),
        };
        let user = match Coll::<User>::from_db(db)
            .find_one(token.user_id.as_doc(), None)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return fail(req, Error::NoAuth),
            Err(e) => return fail(req, e.into()),
        };

        if let Err(e) = authorize(Some(&user), R::CAPABILITY) {
            return fail(req, e);
        }

        Outcome::Success(Self {
            user,
            phantom: PhantomData,
        })
    }
}

/// A verified refresh token, presented as a bearer token.
pub struct RefreshToken {
    pub user_id: Id,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RefreshToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await.succeeded() {
            Some(config) => config,
            None => return fail(req, Error::Unknown),
        };
        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| Token::decode(token.trim(), TokenPurpose::Refresh, config));
        match token {
            Some(Ok(token)) => Outcome::Success(Self {
                user_id: token.user_id,
            }),
            _ => fail(req, Error::NoAuth),
        }
    }
}
