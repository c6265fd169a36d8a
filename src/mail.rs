//! Outgoing email. The API only sees [`Mailer`]; how messages leave the
//! process is up to the [`EmailSender`] it wraps.

use aws_sdk_sesv2::{
    types::{Body, Content, Destination, EmailContent, Message},
    Client as SesClient,
};

use crate::error::{Error, Result};
use crate::model::db::user::UserCore;

/// Boxed delivery failure from an [`EmailSender`].
pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(user: &UserCore, confirmation_token: &str) -> Self {
        Self {
            to: user.email.clone(),
            subject: "Welcome to QuickPolls".to_string(),
            body: format!(
                "Hi {},\n\nThanks for joining QuickPolls! Confirm your email with this token:\n\n{}\n",
                user.username, confirmation_token
            ),
        }
    }

    pub fn confirm_email(user: &UserCore, confirmation_token: &str) -> Self {
        Self {
            to: user.email.clone(),
            subject: "Confirm email".to_string(),
            body: format!(
                "Hi {},\n\nConfirm your email with this token:\n\n{}\n",
                user.username, confirmation_token
            ),
        }
    }

    pub fn reset_password(user: &UserCore, reset_token: &str) -> Self {
        Self {
            to: user.email.clone(),
            subject: "Reset password".to_string(),
            body: format!(
                "Hi {},\n\nReset your password with this token:\n\n{}\n\nIf you didn't ask for this, ignore this email.\n",
                user.username, reset_token
            ),
        }
    }

    pub fn custom(user: &UserCore, subject: String, text: String) -> Self {
        Self {
            to: user.email.clone(),
            subject,
            body: text,
        }
    }
}

/// Something that can deliver an [`Email`].
#[rocket::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> std::result::Result<(), SendError>;
}

/// Managed-state handle used by the endpoints to send mail.
pub struct Mailer {
    sender: Box<dyn EmailSender>,
}

impl Mailer {
    pub fn new(sender: impl EmailSender + 'static) -> Self {
        Self {
            sender: Box::new(sender),
        }
    }

    /// Send an email whose delivery the caller depends on.
    pub async fn send(&self, email: Email) -> Result<()> {
        self.sender.send(&email).await.map_err(|e| {
            error!("Failed to send '{}' email: {e}", email.subject);
            Error::SendingEmail
        })
    }

    /// Send a notification whose failure must not fail the request.
    pub async fn send_best_effort(&self, email: Email) {
        if let Err(e) = self.sender.send(&email).await {
            warn!("Failed to send '{}' email: {e}", email.subject);
        }
    }
}

/// Delivers mail through Amazon SES.
pub struct SesSender {
    client: SesClient,
    from: String,
}

impl SesSender {
    pub fn new(client: SesClient, from: String) -> Self {
        Self { client, from }
    }
}

#[rocket::async_trait]
impl EmailSender for SesSender {
    async fn send(&self, email: &Email) -> std::result::Result<(), SendError> {
        let subject = Content::builder()
            .data(&email.subject)
            .charset("UTF-8")
            .build()?;
        let text = Content::builder()
            .data(&email.body)
            .charset("UTF-8")
            .build()?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;
        debug!("Sent '{}' email", email.subject);
        Ok(())
    }
}

/// In-memory senders for tests.
#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every email instead of sending it. Clones share the same
    /// mailbox, so one can be handed to the [`Mailer`] and the other kept in
    /// managed state for inspection.
    #[derive(Clone, Default)]
    pub struct Outbox(Arc<Mutex<Vec<Email>>>);

    impl Outbox {
        pub fn sent(&self) -> Vec<Email> {
            self.0.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<Email> {
            self.0.lock().unwrap().last().cloned()
        }
    }

    #[rocket::async_trait]
    impl EmailSender for Outbox {
        async fn send(&self, email: &Email) -> std::result::Result<(), SendError> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Fails every delivery.
    pub struct Unreachable;

    #[rocket::async_trait]
    impl EmailSender for Unreachable {
        async fn send(&self, _email: &Email) -> std::result::Result<(), SendError> {
            Err("mail server unreachable".into())
        }
    }
}
