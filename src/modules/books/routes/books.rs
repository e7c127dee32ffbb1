use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use shelf_authz::{Access, Identity, Policy};
use shelf_db::Database;
use shelf_http::error::AppError;

use super::book_not_found;
use crate::modules::books::models::{
    BookDetail, BookInput, BookPatch, BookQuery, BookSummary, NewBook,
};
use crate::modules::books::repo;

const BOOK_POLICY: Policy = Policy::AdminOrReadOnly;

const DUPLICATE_BOOK: &str =
    "Unique constraint violation: there is already a book with this title by this author.";

fn duplicate_book(err: sqlx::Error) -> AppError {
    if shelf_db::is_unique_violation(&err) {
        AppError::conflict(DUPLICATE_BOOK)
    } else {
        err.into()
    }
}

pub(super) async fn list_books(
    State(db): State<Database>,
    identity: Identity,
    Query(query): Query<BookQuery>,
) -> Result<Json<Vec<BookSummary>>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Read)?;
    let books = repo::list_books(db.pool(), query.search.as_deref()).await?;
    Ok(Json(books.into_iter().map(BookSummary::from).collect()))
}

pub(super) async fn featured_books(
    State(db): State<Database>,
    identity: Identity,
) -> Result<Json<Vec<BookDetail>>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Read)?;
    let books = repo::featured_books(db.pool()).await?;
    Ok(Json(repo::book_details(db.pool(), books).await?))
}

pub(super) async fn favorite_books(
    State(db): State<Database>,
    identity: Identity,
) -> Result<Json<Vec<BookDetail>>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Read)?;
    let user = identity.require()?;
    let books = repo::favorite_books(db.pool(), user.user_id).await?;
    Ok(Json(repo::book_details(db.pool(), books).await?))
}

pub(super) async fn get_book(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookDetail>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Read)?;
    let Path(book_id) = path?;
    let book = repo::find_book(db.pool(), book_id)
        .await?
        .ok_or_else(|| book_not_found(book_id))?;
    Ok(Json(repo::book_detail(db.pool(), book).await?))
}

pub(super) async fn create_book(
    State(db): State<Database>,
    identity: Identity,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookDetail>), AppError> {
    BOOK_POLICY.authorize(&identity, Access::Write)?;
    let Json(input) = payload?;
    let new_book = NewBook::try_from(input)?;

    let book = repo::insert_book(db.pool(), &new_book)
        .await
        .map_err(duplicate_book)?;

    tracing::info!(book_id = book.id, title = %book.title, "book created");
    Ok((StatusCode::CREATED, Json(repo::book_detail(db.pool(), book).await?)))
}

pub(super) async fn replace_book(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<BookDetail>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Write)?;
    let Path(book_id) = path?;
    let Json(input) = payload?;
    let new_book = NewBook::try_from(input)?;

    let book = repo::update_book(db.pool(), book_id, &new_book)
        .await
        .map_err(duplicate_book)?
        .ok_or_else(|| book_not_found(book_id))?;

    tracing::info!(book_id, "book replaced");
    Ok(Json(repo::book_detail(db.pool(), book).await?))
}

pub(super) async fn patch_book(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> Result<Json<BookDetail>, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Write)?;
    let Path(book_id) = path?;
    let Json(patch) = payload?;

    let mut tx = db.begin_immediate().await?;
    let current = repo::find_book(&mut *tx, book_id)
        .await?
        .ok_or_else(|| book_not_found(book_id))?;
    let merged = NewBook::patched(current, patch)?;
    let book = repo::update_book(&mut *tx, book_id, &merged)
        .await
        .map_err(duplicate_book)?
        .ok_or_else(|| book_not_found(book_id))?;
    tx.commit().await?;

    tracing::info!(book_id, "book updated");
    Ok(Json(repo::book_detail(db.pool(), book).await?))
}

pub(super) async fn delete_book(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    BOOK_POLICY.authorize(&identity, Access::Write)?;
    let Path(book_id) = path?;
    if !repo::delete_book(db.pool(), book_id).await? {
        return Err(book_not_found(book_id));
    }

    tracing::info!(book_id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}
