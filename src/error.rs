use std::collections::BTreeMap;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::model::mongodb::is_duplicate_key_error;

pub type Result<T> = std::result::Result<T, Error>;

/// Field name to list of problems with that field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Every failure the API can report. Each variant has a stable numeric code,
/// see [`Error::code`]; the codes are part of the wire contract.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown error.")]
    Unknown,
    #[error("Database error.")]
    Db(#[from] DbError),
    #[error("Unknown error.")]
    Jwt(#[from] JwtError),
    #[error("Unknown error.")]
    Argon2(#[from] Argon2Error),
    #[error("Invalid request.")]
    InvalidRequest(FieldErrors),
    #[error("Access denied.")]
    AccessDenied,
    #[error("You were banned.")]
    UserBanned,
    #[error("Not found.")]
    NotFound,
    #[error("You are not authorized.")]
    NoAuth,
    #[error("User not found.")]
    UserNotFound,
    #[error("User already exists.")]
    UserAlreadyExists,
    #[error("Wrong credentials.")]
    WrongCredentials,
    #[error("Old password is wrong.")]
    WrongOldPassword,
    #[error("Group not found.")]
    GroupNotFound,
    #[error("You cannot set this group.")]
    GroupNotAllowed,
    #[error("Action not recognized.")]
    UnknownAction,
    #[error("Email is already confirmed.")]
    EmailAlreadyConfirmed,
    #[error("Invalid reset password token.")]
    InvalidResetPasswordToken,
    #[error("Invalid email confirmation token.")]
    InvalidEmailConfirmationToken,
    #[error("Poll not found.")]
    PollNotFound,
    #[error("Poll has completed.")]
    PollCompleted,
    #[error("Not enough points.")]
    NotEnoughPoints,
    #[error("Option not found.")]
    OptionNotFound,
    #[error("Comment not found.")]
    CommentNotFound,
    #[error("Error while sending email.")]
    SendingEmail,
}

impl Error {
    /// The stable numeric sub-code reported in the `error.code` field.
    pub fn code(&self) -> u32 {
        match self {
            Self::Unknown | Self::Jwt(_) | Self::Argon2(_) => 1,
            Self::Db(_) => 2,
            Self::InvalidRequest(_) => 3,
            Self::AccessDenied => 4,
            Self::UserBanned => 5,
            Self::NotFound => 6,
            Self::NoAuth => 10,
            Self::UserNotFound => 100,
            Self::UserAlreadyExists => 101,
            Self::WrongCredentials => 102,
            Self::WrongOldPassword => 103,
            Self::GroupNotFound => 104,
            Self::GroupNotAllowed => 105,
            Self::UnknownAction => 106,
            Self::EmailAlreadyConfirmed => 107,
            Self::InvalidResetPasswordToken => 108,
            Self::InvalidEmailConfirmationToken => 109,
            Self::PollNotFound => 110,
            Self::PollCompleted => 111,
            Self::NotEnoughPoints => 119,
            Self::OptionNotFound => 120,
            Self::CommentNotFound => 130,
            Self::SendingEmail => 140,
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Unknown | Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::SendingEmail => {
                Status::InternalServerError
            }
            Self::InvalidRequest(_) => Status::BadRequest,
            Self::NoAuth => Status::Unauthorized,
            Self::AccessDenied
            | Self::UserBanned
            | Self::GroupNotAllowed
            | Self::EmailAlreadyConfirmed
            | Self::InvalidResetPasswordToken
            | Self::InvalidEmailConfirmationToken
            | Self::PollCompleted
            | Self::NotEnoughPoints => Status::Forbidden,
            Self::NotFound
            | Self::UserNotFound
            | Self::UserAlreadyExists
            | Self::WrongCredentials
            | Self::WrongOldPassword
            | Self::GroupNotFound
            | Self::UnknownAction
            | Self::PollNotFound
            | Self::OptionNotFound
            | Self::CommentNotFound => Status::NotFound,
        }
    }

    /// Translate a failed user write. A unique index clash on username or
    /// email means the user already exists.
    pub fn user_write(err: DbError) -> Self {
        if is_duplicate_key_error(&err) {
            Self::UserAlreadyExists
        } else {
            Self::Db(err)
        }
    }

    /// The generic error for a bare HTTP status, used by the catchers.
    pub fn for_status(status: Status) -> Self {
        match status.code {
            400 | 422 => Self::InvalidRequest(FieldErrors::new()),
            401 => Self::NoAuth,
            403 => Self::AccessDenied,
            404 => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::InvalidRequest(fields)
    }
}

/// The `error` object of the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// The full error envelope: `{"error": {"code": ..}, "message": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let fields = match err {
            Error::InvalidRequest(fields) if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        };
        Self {
            error: ErrorDetail {
                code: err.code(),
                fields,
            },
            message: err.to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match &self {
            Error::Db(e) => error!("Database failure: {e}"),
            Error::Jwt(e) => error!("Token encoding failure: {e}"),
            Error::Argon2(e) => error!("Password hashing failure: {e}"),
            _ if status.class().is_server_error() => error!("{self:?}"),
            _ => debug!("Request failed: {self:?}"),
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
