use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use shelf_authz::{Access, Identity, Policy};
use shelf_db::Database;
use shelf_http::error::AppError;

use super::book_not_found;
use crate::modules::books::models::{BookRecord, NewBookRecord, RecordInput};
use crate::modules::books::repo;

const RECORD_POLICY: Policy = Policy::OwnerOnly;

const DUPLICATE_RECORD: &str =
    "Unique constraint violation: this user has already created a book record for this book.";

/// Load a record of `book_id` and check the caller owns it.
async fn owned_record(
    db: &Database,
    identity: &Identity,
    access: Access,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<BookRecord, AppError> {
    RECORD_POLICY.authorize(identity, access)?;
    let Path((book_id, record_id)) = path?;
    let record = repo::find_record(db.pool(), book_id, record_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("book record {record_id} not found")))?;
    RECORD_POLICY.authorize_object(identity, access, record.reader_id)?;
    Ok(record)
}

pub(super) async fn list_records(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<BookRecord>>, AppError> {
    RECORD_POLICY.authorize(&identity, Access::Read)?;
    let reader = identity.require()?;
    let Path(book_id) = path?;

    let records = repo::list_records(db.pool(), reader.user_id, book_id).await?;
    Ok(Json(records))
}

pub(super) async fn create_record(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookRecord>), AppError> {
    RECORD_POLICY.authorize(&identity, Access::Write)?;
    let reader = identity.require()?;
    let Path(book_id) = path?;
    let Json(input) = payload?;

    let mut tx = db.begin_immediate().await?;
    let book = repo::find_book(&mut *tx, book_id)
        .await?
        .ok_or_else(|| book_not_found(book_id))?;
    let new_record = NewBookRecord::from_context(reader, &book, input);
    let record = repo::insert_record(&mut *tx, &new_record)
        .await
        .map_err(|err| {
            if shelf_db::is_unique_violation(&err) {
                AppError::conflict(DUPLICATE_RECORD)
            } else {
                err.into()
            }
        })?;
    tx.commit().await?;

    tracing::info!(record_id = record.id, book_id, user_id = reader.user_id, "book record created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub(super) async fn get_record(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<BookRecord>, AppError> {
    let record = owned_record(&db, &identity, Access::Read, path).await?;
    Ok(Json(record))
}

/// Serves both PUT and PATCH; the only client-writable field is optional.
pub(super) async fn update_record(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<(i64, i64)>, PathRejection>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> Result<Json<BookRecord>, AppError> {
    let record = owned_record(&db, &identity, Access::Write, path).await?;
    let Json(input) = payload?;
    let state = input.reading_state.unwrap_or(record.reading_state);

    let record = repo::update_record_state(db.pool(), record.id, state).await?;
    tracing::info!(record_id = record.id, reading_state = ?record.reading_state, "book record updated");
    Ok(Json(record))
}

pub(super) async fn delete_record(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let record = owned_record(&db, &identity, Access::Write, path).await?;
    repo::delete_record(db.pool(), record.id).await?;

    tracing::info!(record_id = record.id, "book record deleted");
    Ok(StatusCode::NO_CONTENT)
}
