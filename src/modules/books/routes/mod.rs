//! Routing table for everything under `/api/books`.

mod books;
mod favorites;
mod records;

use axum::{routing::get, routing::post, Router};
use shelf_db::Database;
use shelf_http::error::AppError;

use crate::modules::reviews;

pub fn router(db: Database) -> Router {
    Router::new()
        .route("/", get(books::list_books).post(books::create_book))
        .route("/featured", get(books::featured_books))
        .route("/favorites", get(books::favorite_books))
        .route(
            "/{book_id}",
            get(books::get_book)
                .put(books::replace_book)
                .patch(books::patch_book)
                .delete(books::delete_book),
        )
        .route(
            "/{book_id}/book_records",
            get(records::list_records).post(records::create_record),
        )
        .route(
            "/{book_id}/book_records/{record_id}",
            get(records::get_record)
                .put(records::update_record)
                .patch(records::update_record)
                .delete(records::delete_record),
        )
        .route("/{book_id}/favorites", post(favorites::add_favorite))
        .merge(reviews::routes::book_scoped())
        .with_state(db)
}

fn book_not_found(book_id: i64) -> AppError {
    AppError::not_found(format!("book {book_id} not found"))
}
