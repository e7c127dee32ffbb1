use sqlx::SqliteExecutor;

use super::models::{BookReview, NewReview};

pub async fn list_for_book<'e, E>(executor: E, book_id: i64) -> sqlx::Result<Vec<BookReview>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookReview>(
        "SELECT * FROM book_reviews WHERE book_id = ? ORDER BY created_at, id",
    )
    .bind(book_id)
    .fetch_all(executor)
    .await
}

pub async fn find_review<'e, E>(executor: E, id: i64) -> sqlx::Result<Option<BookReview>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookReview>("SELECT * FROM book_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_review<'e, E>(executor: E, review: &NewReview) -> sqlx::Result<BookReview>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookReview>(
        "INSERT INTO book_reviews (book_id, reviewed_by, body) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(review.book_id)
    .bind(review.reviewed_by)
    .bind(&review.body)
    .fetch_one(executor)
    .await
}

pub async fn delete_review<'e, E>(executor: E, id: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM book_reviews WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Full-text search over review bodies, best match first.
///
/// `query` must already be a well-formed FTS5 expression.
pub async fn search<'e, E>(executor: E, query: &str) -> sqlx::Result<Vec<BookReview>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, BookReview>(
        r#"
        SELECT r.*
        FROM book_reviews_fts
        JOIN book_reviews r ON r.id = book_reviews_fts.rowid
        WHERE book_reviews_fts MATCH ?
        ORDER BY bm25(book_reviews_fts), r.id
        "#,
    )
    .bind(query)
    .fetch_all(executor)
    .await
}
