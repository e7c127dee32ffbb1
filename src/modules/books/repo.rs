//! Book, reading record and favorite queries.
//!
//! Functions take any SQLite executor so handlers can run them on the pool or
//! inside a transaction.

use shelf_authz::UserId;
use sqlx::SqliteExecutor;

use super::models::{Book, BookDetail, BookRecord, NewBook, NewBookRecord, ReadingState};
use crate::modules::reviews;
use crate::utils;

/// All books, or those whose title contains `search` (case-insensitive),
/// ordered by title.
pub async fn list_books<'e, E>(executor: E, search: Option<&str>) -> sqlx::Result<Vec<Book>>
where
    E: SqliteExecutor<'e>,
{
    let needle = search.map(utils::fold_case);
    sqlx::query_as::<_, Book>(
        r#"
        SELECT * FROM books
        WHERE ? IS NULL OR instr(title_folded, ?) > 0
        ORDER BY title, id
        "#,
    )
    .bind(needle.as_deref())
    .bind(needle.as_deref())
    .fetch_all(executor)
    .await
}

pub async fn featured_books<'e, E>(executor: E) -> sqlx::Result<Vec<Book>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE featured ORDER BY title, id")
        .fetch_all(executor)
        .await
}

pub async fn favorite_books<'e, E>(executor: E, user_id: UserId) -> sqlx::Result<Vec<Book>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Book>(
        r#"
        SELECT b.* FROM books b
        JOIN book_favorites f ON f.book_id = b.id
        WHERE f.user_id = ?
        ORDER BY b.title, b.id
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn find_book<'e, E>(executor: E, id: i64) -> sqlx::Result<Option<Book>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_book<'e, E>(executor: E, book: &NewBook) -> sqlx::Result<Book>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Book>(
        r#"
        INSERT INTO books (title, title_folded, author, description, featured, cover)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&book.title)
    .bind(utils::fold_case(&book.title))
    .bind(&book.author)
    .bind(&book.description)
    .bind(book.featured)
    .bind(&book.cover)
    .fetch_one(executor)
    .await
}

/// Overwrite a book's fields; `None` if it does not exist.
pub async fn update_book<'e, E>(executor: E, id: i64, book: &NewBook) -> sqlx::Result<Option<Book>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Book>(
        r#"
        UPDATE books
        SET title = ?, title_folded = ?, author = ?, description = ?, featured = ?, cover = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&book.title)
    .bind(utils::fold_case(&book.title))
    .bind(&book.author)
    .bind(&book.description)
    .bind(book.featured)
    .bind(&book.cover)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn delete_book<'e, E>(executor: E, id: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Add `book_id` to the user's favorites. Returns `false` if it already was one.
pub async fn add_favorite<'e, E>(executor: E, user_id: UserId, book_id: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("INSERT OR IGNORE INTO book_favorites (user_id, book_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(book_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn favorite_count<'e, E>(executor: E, book_id: i64) -> sqlx::Result<i64>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM book_favorites WHERE book_id = ?")
        .bind(book_id)
        .fetch_one(executor)
        .await
}

/// Load the related rows that make up a book's detail representation.
pub async fn book_detail(pool: &sqlx::SqlitePool, book: Book) -> sqlx::Result<BookDetail> {
    let favorite_count = favorite_count(pool, book.id).await?;
    let reviews = reviews::repo::list_for_book(pool, book.id).await?;
    Ok(BookDetail {
        book,
        favorite_count,
        reviews,
    })
}

pub async fn book_details(pool: &sqlx::SqlitePool, books: Vec<Book>) -> sqlx::Result<Vec<BookDetail>> {
    let mut details = Vec::with_capacity(books.len());
    for book in books {
        details.push(book_detail(pool, book).await?);
    }
    Ok(details)
}

/// Records of one reader for one book. Other readers' rows are never fetched.
pub async fn list_records<'e, E>(
    executor: E,
    reader_id: UserId,
    book_id: i64,
) -> sqlx::Result<Vec<BookRecord>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookRecord>(
        "SELECT * FROM book_records WHERE reader_id = ? AND book_id = ? ORDER BY id",
    )
    .bind(reader_id)
    .bind(book_id)
    .fetch_all(executor)
    .await
}

/// A record by id, only if it belongs to `book_id`.
pub async fn find_record<'e, E>(
    executor: E,
    book_id: i64,
    record_id: i64,
) -> sqlx::Result<Option<BookRecord>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookRecord>("SELECT * FROM book_records WHERE id = ? AND book_id = ?")
        .bind(record_id)
        .bind(book_id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_record<'e, E>(executor: E, record: &NewBookRecord) -> sqlx::Result<BookRecord>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookRecord>(
        r#"
        INSERT INTO book_records (reader_id, book_id, reading_state)
        VALUES (?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(record.reader_id)
    .bind(record.book_id)
    .bind(record.reading_state)
    .fetch_one(executor)
    .await
}

pub async fn update_record_state<'e, E>(
    executor: E,
    record_id: i64,
    state: ReadingState,
) -> sqlx::Result<BookRecord>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookRecord>(
        r#"
        UPDATE book_records
        SET reading_state = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(state)
    .bind(record_id)
    .fetch_one(executor)
    .await
}

pub async fn delete_record<'e, E>(executor: E, record_id: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM book_records WHERE id = ?")
        .bind(record_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
