mod guard;
mod request;
mod token;

pub use guard::{
    AdminRights, Authenticated, GuardFailure, ModeratorRights, RefreshToken, Rights, UserRights,
};
pub use request::{
    ConfirmEmailRequest, EmailRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
pub use token::{AuthTokens, Token, TokenPurpose, AUTH_TOKEN_COOKIE};
