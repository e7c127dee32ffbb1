use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use shelf_authz::{Access, Identity, Policy};
use shelf_db::Database;
use shelf_http::error::AppError;

use super::book_not_found;
use crate::modules::books::models::BookDetail;
use crate::modules::books::repo;

/// Add the book to the caller's favorites. Repeating the call is harmless.
pub(super) async fn add_favorite(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<(StatusCode, Json<BookDetail>), AppError> {
    Policy::AuthenticatedOnly.authorize(&identity, Access::Write)?;
    let user = identity.require()?;
    let Path(book_id) = path?;

    let mut tx = db.begin_immediate().await?;
    let book = repo::find_book(&mut *tx, book_id)
        .await?
        .ok_or_else(|| book_not_found(book_id))?;
    let added = repo::add_favorite(&mut *tx, user.user_id, book.id).await?;
    tx.commit().await?;

    tracing::info!(book_id, user_id = user.user_id, added, "book favorited");
    Ok((StatusCode::CREATED, Json(repo::book_detail(db.pool(), book).await?)))
}
