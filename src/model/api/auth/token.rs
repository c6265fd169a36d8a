use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{
    errors::{Error as JwtError, ErrorKind as JwtErrorKind},
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::http::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::mongodb::Id;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// What a token may be used for. Carried in the `aud` claim and checked on
/// decode, so a token issued for one flow is rejected by every other.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenPurpose {
    Access,
    Refresh,
    ResetPassword,
    ConfirmEmail,
}

impl TokenPurpose {
    fn audience(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::ResetPassword => "reset_password",
            Self::ConfirmEmail => "confirm_email",
        }
    }

    fn ttl(self, config: &Config) -> Duration {
        match self {
            Self::Access => config.access_ttl(),
            Self::Refresh => config.refresh_ttl(),
            Self::ResetPassword => config.reset_password_ttl(),
            Self::ConfirmEmail => config.confirm_email_ttl(),
        }
    }
}

/// Token claims: the user, the purpose, and the validity window.
#[derive(Serialize, Deserialize)]
struct Claims {
    /// Hex user ID.
    sub: String,
    aud: String,
    /// The address an email confirmation token confirms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(rename = "iat", with = "ts_seconds")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// A signed token for a specific user and purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub user_id: Id,
    pub purpose: TokenPurpose,
    /// Set only for [`TokenPurpose::ConfirmEmail`].
    pub email: Option<String>,
}

impl Token {
    pub fn new(user_id: Id, purpose: TokenPurpose) -> Self {
        Self {
            user_id,
            purpose,
            email: None,
        }
    }

    /// A token confirming that `email` belongs to the user. It stops working
    /// once the user's address changes.
    pub fn email_confirmation(user_id: Id, email: &str) -> Self {
        Self {
            user_id,
            purpose: TokenPurpose::ConfirmEmail,
            email: Some(email.to_string()),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Sign this token, expiring after the configured lifetime for its purpose.
    pub fn encode(&self, config: &Config) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: self.user_id.to_hex(),
            aud: self.purpose.audience().to_string(),
            email: self.email.clone(),
            issued_at: now,
            expire_at: now + self.purpose.ttl(config),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Verify and decode a token, requiring that it was issued for `purpose`.
    pub fn decode(token: &str, purpose: TokenPurpose, config: &Config) -> Result<Self, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[purpose.audience()]);
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &validation,
        )
        .map(|data: TokenData<Claims>| data.claims)?;
        let user_id = claims
            .sub
            .parse::<Id>()
            .map_err(|_| JwtError::from(JwtErrorKind::InvalidSubject))?;
        if purpose == TokenPurpose::ConfirmEmail && claims.email.is_none() {
            return Err(JwtErrorKind::InvalidToken.into());
        }
        Ok(Self {
            user_id,
            purpose,
            email: claims.email,
        })
    }

    /// Serialize an access token into the session cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let ttl = self.purpose.ttl(config);
        Cookie::build(AUTH_TOKEN_COOKIE, self.encode(config))
            .max_age(rocket::time::Duration::seconds(ttl.num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

/// The pair of tokens handed out on login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn for_user(user_id: Id, config: &Config) -> Self {
        Self {
            access_token: Token::new(user_id, TokenPurpose::Access).encode(config),
            refresh_token: Token::new(user_id, TokenPurpose::Refresh).encode(config),
        }
    }
}
