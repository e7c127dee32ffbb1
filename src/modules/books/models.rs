use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_authz::{Principal, UserId};
use shelf_http::error::AppError;

use crate::modules::reviews::models::BookReview;
use crate::utils;

/// A book in the catalogue.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub featured: bool,
    /// Reference to the cover image; the file itself is stored elsewhere.
    pub cover: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Abbreviated representation used by the list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub featured: bool,
    pub cover: Option<String>,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            featured: book.featured,
            cover: book.cover,
        }
    }
}

/// Full representation used by every endpoint except the plain list.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub favorite_count: i64,
    pub reviews: Vec<BookReview>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// Body of `POST /books` and `PUT /books/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub cover: Option<String>,
}

/// Body of `PATCH /books/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub featured: Option<bool>,
    pub cover: Option<String>,
}

/// Validated book fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub featured: bool,
    pub cover: Option<String>,
}

impl TryFrom<BookInput> for NewBook {
    type Error = AppError;

    fn try_from(input: BookInput) -> Result<Self, Self::Error> {
        Ok(Self {
            title: utils::required_text("title", &input.title)?,
            author: utils::required_text("author", &input.author)?,
            description: input.description,
            featured: input.featured,
            cover: input.cover,
        })
    }
}

impl NewBook {
    /// Apply a partial update on top of an existing book.
    pub fn patched(book: Book, patch: BookPatch) -> Result<Self, AppError> {
        let title = match patch.title {
            Some(title) => utils::required_text("title", &title)?,
            None => book.title,
        };
        let author = match patch.author {
            Some(author) => utils::required_text("author", &author)?,
            None => book.author,
        };

        Ok(Self {
            title,
            author,
            description: patch.description.or(book.description),
            featured: patch.featured.unwrap_or(book.featured),
            cover: patch.cover.or(book.cover),
        })
    }
}

#[cfg(test)]
impl NewBook {
    pub fn titled(title: &str, author: &str) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            description: None,
            featured: false,
            cover: None,
        }
    }
}

/// How far a reader has got with a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReadingState {
    #[default]
    WantToRead,
    Reading,
    Read,
}

/// A reader's tracking entry for one book.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookRecord {
    pub id: i64,
    #[serde(rename = "reader")]
    pub reader_id: UserId,
    #[serde(rename = "book")]
    pub book_id: i64,
    pub reading_state: ReadingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client payload for records. Any `reader` or `book` sent along is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub reading_state: Option<ReadingState>,
}

/// A record ready to insert, bound to its reader and book.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBookRecord {
    pub reader_id: UserId,
    pub book_id: i64,
    pub reading_state: ReadingState,
}

impl NewBookRecord {
    pub fn from_context(reader: &Principal, book: &Book, input: RecordInput) -> Self {
        Self {
            reader_id: reader.user_id,
            book_id: book.id,
            reading_state: input.reading_state.unwrap_or_default(),
        }
    }
}
