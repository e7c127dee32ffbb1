use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_authz::{Principal, UserId};
use shelf_http::error::AppError;

use crate::modules::books::models::Book;
use crate::utils;

/// A user's written review of a book.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookReview {
    pub id: i64,
    #[serde(rename = "book")]
    pub book_id: i64,
    pub reviewed_by: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Client payload for a new review. Any `book` or `reviewed_by` sent along is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// A review ready to insert, bound to its book and reviewer.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub book_id: i64,
    pub reviewed_by: UserId,
    pub body: String,
}

impl NewReview {
    pub fn from_context(
        reviewer: &Principal,
        book: &Book,
        input: ReviewInput,
    ) -> Result<Self, AppError> {
        Ok(Self {
            book_id: book.id,
            reviewed_by: reviewer.user_id,
            body: utils::required_text("body", &input.body)?,
        })
    }
}
