//! Book reviews: flat detail/delete/search endpoints plus the book-scoped
//! list/create routes that the books module mounts.

pub mod models;
pub mod repo;
pub mod routes;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::modules::auth::middleware;

pub struct ReviewsModule;

impl ReviewsModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "book-reviews"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            delete_policy = ?ctx.settings.auth.review_delete,
            "reviews module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        let router = routes::router(routes::ReviewsState {
            db: ctx.db.clone(),
            delete_policy: ctx.settings.auth.review_delete,
        });
        middleware::authenticated(router, ctx)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let review_id = json!({
            "name": "review_id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer" }
        });

        Some(json!({
            "paths": {
                "/search": {
                    "get": {
                        "summary": "Full-text search over review bodies",
                        "description": "Matches reviews containing every word of the term. An empty term returns no results.",
                        "tags": ["Reviews"],
                        "parameters": [{
                            "name": "search",
                            "in": "query",
                            "required": false,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Matching reviews, best match first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/BookReview" }
                                        }
                                    }
                                }
                            },
                            "401": error("Authentication required")
                        }
                    }
                },
                "/{review_id}": {
                    "get": {
                        "summary": "Get a review",
                        "tags": ["Reviews"],
                        "parameters": [review_id.clone()],
                        "responses": {
                            "200": {
                                "description": "The review",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookReview" }
                                    }
                                }
                            },
                            "401": error("Authentication required"),
                            "404": error("Review not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a review",
                        "description": "Permission is governed by the `auth.review_delete` setting.",
                        "tags": ["Reviews"],
                        "parameters": [review_id],
                        "responses": {
                            "204": { "description": "Deleted" },
                            "401": error("Authentication required"),
                            "403": error("Not permitted to delete this review"),
                            "404": error("Review not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BookReview": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "book": { "type": "integer" },
                            "reviewed_by": { "type": "integer" },
                            "body": { "type": "string" },
                            "created_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "book", "reviewed_by", "body", "created_at"]
                    },
                    "ReviewInput": {
                        "type": "object",
                        "properties": {
                            "body": { "type": "string" }
                        },
                        "required": ["body"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![
            Migration {
                id: "001_book_reviews",
                up: r#"
                    CREATE TABLE book_reviews (
                        id          INTEGER PRIMARY KEY AUTOINCREMENT,
                        book_id     INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                        reviewed_by INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                        body        TEXT    NOT NULL CHECK (body <> ''),
                        created_at  TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                    );
                    CREATE INDEX book_reviews_book ON book_reviews (book_id);
                    "#,
            },
            Migration {
                id: "002_book_reviews_fts",
                up: r#"
                    CREATE VIRTUAL TABLE book_reviews_fts USING fts5(
                        body,
                        content = 'book_reviews',
                        content_rowid = 'id',
                        tokenize = 'porter unicode61'
                    );
                    CREATE TRIGGER book_reviews_fts_insert AFTER INSERT ON book_reviews BEGIN
                        INSERT INTO book_reviews_fts (rowid, body) VALUES (new.id, new.body);
                    END;
                    CREATE TRIGGER book_reviews_fts_delete AFTER DELETE ON book_reviews BEGIN
                        INSERT INTO book_reviews_fts (book_reviews_fts, rowid, body)
                        VALUES ('delete', old.id, old.body);
                    END;
                    CREATE TRIGGER book_reviews_fts_update AFTER UPDATE ON book_reviews BEGIN
                        INSERT INTO book_reviews_fts (book_reviews_fts, rowid, body)
                        VALUES ('delete', old.id, old.body);
                        INSERT INTO book_reviews_fts (rowid, body) VALUES (new.id, new.body);
                    END;
                    "#,
            },
        ]
    }
}

/// Create a new instance of the reviews module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(ReviewsModule::new())
}
