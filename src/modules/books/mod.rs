pub mod models;
pub mod repo;
pub mod routes;

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use shelf_kernel::{InitCtx, Migration, Module};

use crate::modules::auth::middleware;

/// Books, per-reader book records, book-scoped reviews and favorites
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        middleware::authenticated(routes::router(ctx.db.clone()), ctx)
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    title       TEXT    NOT NULL CHECK (title <> ''),
                    title_folded TEXT   NOT NULL,
                    author      TEXT    NOT NULL CHECK (author <> ''),
                    description TEXT,
                    featured    BOOLEAN NOT NULL DEFAULT 0,
                    cover       TEXT,
                    created_at  TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                    UNIQUE (title, author)
                );
                CREATE INDEX books_title ON books (title);

                CREATE TABLE book_records (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    reader_id     INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    book_id       INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    reading_state TEXT    NOT NULL DEFAULT 'want_to_read'
                        CHECK (reading_state IN ('want_to_read', 'reading', 'read')),
                    created_at    TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                    updated_at    TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                    UNIQUE (reader_id, book_id)
                );

                CREATE TABLE book_favorites (
                    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    book_id INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    PRIMARY KEY (user_id, book_id)
                );
                CREATE INDEX book_favorites_book ON book_favorites (book_id);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn json_body(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_body(json!({ "$ref": "#/components/schemas/ErrorResponse" }))
    })
}

fn conflict_response() -> Value {
    json!({
        "description": "Unique constraint violation",
        "content": json_body(json!({ "$ref": "#/components/schemas/ConflictResponse" }))
    })
}

fn ok_response(description: &str, schema: Value) -> Value {
    json!({ "description": description, "content": json_body(schema) })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn array_of(name: &str) -> Value {
    json!({ "type": "array", "items": schema_ref(name) })
}

fn path_param(name: &str) -> Value {
    json!({ "name": name, "in": "path", "required": true, "schema": { "type": "integer" } })
}

fn request_body(name: &str) -> Value {
    json!({ "required": true, "content": json_body(schema_ref(name)) })
}

fn openapi_fragment() -> Value {
    let book_id = path_param("book_id");
    let record_id = path_param("record_id");

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "description": "Ordered by title. `search` filters on a case-insensitive title substring.",
                    "tags": ["Books"],
                    "parameters": [{
                        "name": "search",
                        "in": "query",
                        "required": false,
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": ok_response("Books", array_of("BookSummary")),
                        "401": error_response("Authentication required")
                    }
                },
                "post": {
                    "summary": "Create a book (admin)",
                    "tags": ["Books"],
                    "requestBody": request_body("BookInput"),
                    "responses": {
                        "201": ok_response("Created", schema_ref("BookDetail")),
                        "400": conflict_response(),
                        "401": error_response("Authentication required"),
                        "403": error_response("Admin role required"),
                        "422": error_response("Validation error")
                    }
                }
            },
            "/featured": {
                "get": {
                    "summary": "Featured books",
                    "tags": ["Books"],
                    "responses": {
                        "200": ok_response("Featured books", array_of("BookDetail")),
                        "401": error_response("Authentication required")
                    }
                }
            },
            "/favorites": {
                "get": {
                    "summary": "Books the caller has favorited",
                    "tags": ["Books"],
                    "responses": {
                        "200": ok_response("Favorite books", array_of("BookDetail")),
                        "401": error_response("Authentication required")
                    }
                }
            },
            "/{book_id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [book_id.clone()],
                    "responses": {
                        "200": ok_response("The book", schema_ref("BookDetail")),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Replace a book (admin)",
                    "tags": ["Books"],
                    "parameters": [book_id.clone()],
                    "requestBody": request_body("BookInput"),
                    "responses": {
                        "200": ok_response("Updated", schema_ref("BookDetail")),
                        "400": conflict_response(),
                        "403": error_response("Admin role required"),
                        "404": error_response("Book not found")
                    }
                },
                "patch": {
                    "summary": "Update some fields of a book (admin)",
                    "tags": ["Books"],
                    "parameters": [book_id.clone()],
                    "requestBody": request_body("BookPatch"),
                    "responses": {
                        "200": ok_response("Updated", schema_ref("BookDetail")),
                        "400": conflict_response(),
                        "403": error_response("Admin role required"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book (admin)",
                    "tags": ["Books"],
                    "parameters": [book_id.clone()],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "403": error_response("Admin role required"),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/{book_id}/book_records": {
                "get": {
                    "summary": "The caller's records for a book",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone()],
                    "responses": {
                        "200": ok_response("Records", array_of("BookRecord")),
                        "401": error_response("Authentication required")
                    }
                },
                "post": {
                    "summary": "Start tracking a book",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone()],
                    "requestBody": request_body("RecordInput"),
                    "responses": {
                        "201": ok_response("Created", schema_ref("BookRecord")),
                        "400": conflict_response(),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/{book_id}/book_records/{record_id}": {
                "get": {
                    "summary": "Get one of the caller's records",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone(), record_id.clone()],
                    "responses": {
                        "200": ok_response("The record", schema_ref("BookRecord")),
                        "403": error_response("Not the record's reader"),
                        "404": error_response("Record not found")
                    }
                },
                "put": {
                    "summary": "Update a record",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone(), record_id.clone()],
                    "requestBody": request_body("RecordInput"),
                    "responses": {
                        "200": ok_response("Updated", schema_ref("BookRecord")),
                        "403": error_response("Not the record's reader"),
                        "404": error_response("Record not found")
                    }
                },
                "patch": {
                    "summary": "Update a record",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone(), record_id.clone()],
                    "requestBody": request_body("RecordInput"),
                    "responses": {
                        "200": ok_response("Updated", schema_ref("BookRecord")),
                        "403": error_response("Not the record's reader"),
                        "404": error_response("Record not found")
                    }
                },
                "delete": {
                    "summary": "Delete a record",
                    "tags": ["Book records"],
                    "parameters": [book_id.clone(), record_id],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "403": error_response("Not the record's reader"),
                        "404": error_response("Record not found")
                    }
                }
            },
            "/{book_id}/reviews": {
                "get": {
                    "summary": "Reviews of a book",
                    "tags": ["Reviews"],
                    "parameters": [book_id.clone()],
                    "responses": {
                        "200": ok_response("Reviews", array_of("BookReview"))
                    }
                },
                "post": {
                    "summary": "Review a book",
                    "tags": ["Reviews"],
                    "parameters": [book_id.clone()],
                    "requestBody": request_body("ReviewInput"),
                    "responses": {
                        "201": ok_response("Created", schema_ref("BookReview")),
                        "404": error_response("Book not found"),
                        "422": error_response("Validation error")
                    }
                }
            },
            "/{book_id}/favorites": {
                "post": {
                    "summary": "Add a book to the caller's favorites",
                    "tags": ["Books"],
                    "parameters": [book_id],
                    "responses": {
                        "201": ok_response("The favorited book", schema_ref("BookDetail")),
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "BookSummary": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "featured": { "type": "boolean" },
                        "cover": { "type": ["string", "null"] }
                    },
                    "required": ["id", "title", "author", "featured"]
                },
                "BookDetail": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "description": { "type": ["string", "null"] },
                        "featured": { "type": "boolean" },
                        "cover": { "type": ["string", "null"] },
                        "created_at": { "type": "string", "format": "date-time" },
                        "favorite_count": { "type": "integer" },
                        "reviews": array_of("BookReview")
                    },
                    "required": ["id", "title", "author", "featured", "created_at", "favorite_count", "reviews"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "description": { "type": "string" },
                        "featured": { "type": "boolean" },
                        "cover": { "type": "string" }
                    },
                    "required": ["title", "author"]
                },
                "BookPatch": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "description": { "type": "string" },
                        "featured": { "type": "boolean" },
                        "cover": { "type": "string" }
                    }
                },
                "ReadingState": {
                    "type": "string",
                    "enum": ["want_to_read", "reading", "read"]
                },
                "BookRecord": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "reader": { "type": "integer" },
                        "book": { "type": "integer" },
                        "reading_state": schema_ref("ReadingState"),
                        "created_at": { "type": "string", "format": "date-time" },
                        "updated_at": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "reader", "book", "reading_state", "created_at", "updated_at"]
                },
                "RecordInput": {
                    "type": "object",
                    "properties": {
                        "reading_state": schema_ref("ReadingState")
                    }
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
