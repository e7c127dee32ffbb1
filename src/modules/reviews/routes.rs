use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shelf_authz::{Access, Identity, Policy};
use shelf_db::Database;
use shelf_http::error::AppError;

use super::models::{BookReview, NewReview, ReviewInput, SearchQuery};
use super::repo;
use crate::modules::books;
use crate::utils;

const REVIEW_POLICY: Policy = Policy::AuthenticatedOnly;

#[derive(Clone)]
pub struct ReviewsState {
    pub db: Database,
    pub delete_policy: Policy,
}

/// Flat review endpoints, mounted under `/api/book-reviews`.
pub fn router(state: ReviewsState) -> Router {
    Router::new()
        .route("/search", get(search_reviews))
        .route("/{review_id}", get(get_review).delete(delete_review))
        .with_state(state)
}

/// Review endpoints scoped to a book, merged into the books router.
pub fn book_scoped() -> Router<Database> {
    Router::new().route(
        "/{book_id}/reviews",
        get(list_book_reviews).post(create_book_review),
    )
}

async fn list_book_reviews(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<BookReview>>, AppError> {
    REVIEW_POLICY.authorize(&identity, Access::Read)?;
    let Path(book_id) = path?;
    let reviews = repo::list_for_book(db.pool(), book_id).await?;
    Ok(Json(reviews))
}

async fn create_book_review(
    State(db): State<Database>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookReview>), AppError> {
    REVIEW_POLICY.authorize(&identity, Access::Write)?;
    let reviewer = identity.require()?;
    let Path(book_id) = path?;
    let Json(input) = payload?;

    let mut tx = db.begin_immediate().await?;
    let book = books::repo::find_book(&mut *tx, book_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("book {book_id} not found")))?;
    let review = NewReview::from_context(reviewer, &book, input)?;
    let review = repo::insert_review(&mut *tx, &review).await?;
    tx.commit().await?;

    tracing::info!(review_id = review.id, book_id, user_id = reviewer.user_id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

async fn get_review(
    State(state): State<ReviewsState>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookReview>, AppError> {
    REVIEW_POLICY.authorize(&identity, Access::Read)?;
    let Path(review_id) = path?;
    let review = repo::find_review(state.db.pool(), review_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("review {review_id} not found")))?;
    Ok(Json(review))
}

async fn delete_review(
    State(state): State<ReviewsState>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    state.delete_policy.authorize(&identity, Access::Write)?;
    let Path(review_id) = path?;
    let review = repo::find_review(state.db.pool(), review_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("review {review_id} not found")))?;
    state
        .delete_policy
        .authorize_object(&identity, Access::Write, review.reviewed_by)?;

    repo::delete_review(state.db.pool(), review_id).await?;
    tracing::info!(review_id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// An absent or wordless term matches nothing.
async fn search_reviews(
    State(state): State<ReviewsState>,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<BookReview>>, AppError> {
    REVIEW_POLICY.authorize(&identity, Access::Read)?;
    let term = query.search.unwrap_or_default();
    let Some(fts) = utils::fts_query(&term) else {
        return Ok(Json(Vec::new()));
    };
    let reviews = repo::search(state.db.pool(), &fts).await?;
    Ok(Json(reviews))
}
