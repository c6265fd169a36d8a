use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::{common::poll::MAX_COMMENT_LENGTH, db::comment::Comment};

/// `POST /polls/<id>/comment` and `PUT /comments/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CommentSpec {
    #[validate(length(min = 1, max = "MAX_COMMENT_LENGTH", message = "Comment must be 1-400 characters."))]
    pub text: String,
}

/// A comment as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDescription {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub poll_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentDescription {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.to_hex(),
            user_id: comment.user_id.to_hex(),
            poll_id: comment.poll_id.to_hex(),
            created_at: comment.comment.created_at,
            text: comment.comment.text,
        }
    }
}
