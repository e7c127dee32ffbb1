use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shelf_app::modules::auth::repo as auth_repo;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    admin: String,
    alice: String,
    bob: String,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    async fn with_settings(settings: Settings) -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        Self::start(settings, db).await
    }

    /// Backed by a WAL database file with a multi-connection pool, so
    /// requests can genuinely run side by side.
    async fn on_disk(dir: &tempfile::TempDir) -> Self {
        let url = format!("sqlite://{}", dir.path().join("shelf.db").display());
        let db = Database::connect(&url, 4).await.unwrap();
        Self::start(Settings::default(), db).await
    }

    async fn start(settings: Settings, db: Database) -> Self {
        let ctx = InitCtx {
            settings: &settings,
            db: &db,
        };
        let registry = shelf_app::registry();
        let app = shelf_app::prepare(&registry, &ctx).await.unwrap();

        Self {
            app,
            admin: user_token(&db, "admin", true).await,
            alice: user_token(&db, "alice", false).await,
            bob: user_token(&db, "bob", false).await,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn create_book(&self, title: &str, author: &str) -> i64 {
        let (status, book) = self
            .post("/api/books", &self.admin, json!({"title": title, "author": author}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{book}");
        book["id"].as_i64().unwrap()
    }
}

async fn user_token(db: &Database, username: &str, is_admin: bool) -> String {
    let user = auth_repo::create_user(db.pool(), username, is_admin).await.unwrap();
    auth_repo::issue_token(db.pool(), user.id).await.unwrap()
}

fn titles(books: &Value) -> Vec<&str> {
    books
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn duplicate_book_is_a_conflict() {
    let app = TestApp::new().await;
    let body = json!({"title": "Dune", "author": "Frank Herbert", "featured": true});

    let (status, book) = app.post("/api/books", &app.admin, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["favorite_count"], 0);
    assert_eq!(book["reviews"], json!([]));

    let (status, error) = app.post("/api/books", &app.admin, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error,
        json!({"error": "Unique constraint violation: there is already a book with this title by this author."})
    );

    let (_, books) = app.get("/api/books", &app.admin).await;
    assert_eq!(books.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn renaming_onto_an_existing_book_is_a_conflict() {
    let app = TestApp::new().await;
    app.create_book("Dune", "Frank Herbert").await;
    let emma = app.create_book("Emma", "Frank Herbert").await;

    let (status, error) = app
        .send(
            Method::PATCH,
            &format!("/api/books/{emma}"),
            Some(app.admin.as_str()),
            Some(json!({"title": "Dune"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().starts_with("Unique constraint violation"));

    let (status, book) = app
        .send(
            Method::PATCH,
            &format!("/api/books/{emma}"),
            Some(app.admin.as_str()),
            Some(json!({"author": "Jane Austen", "featured": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Emma");
    assert_eq!(book["author"], "Jane Austen");
    assert_eq!(book["featured"], true);
}

#[tokio::test]
async fn blank_title_is_a_validation_error() {
    let app = TestApp::new().await;
    let (status, error) = app
        .post("/api/books", &app.admin, json!({"title": "  ", "author": "Anon"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], "validation_error");
}

#[tokio::test]
async fn title_search_is_case_insensitive_and_ordered() {
    let app = TestApp::new().await;
    app.create_book("Dune Messiah", "Frank Herbert").await;
    app.create_book("Emma", "Jane Austen").await;
    app.create_book("Children of Dune", "Frank Herbert").await;
    app.create_book("Dune", "Frank Herbert").await;

    let (status, books) = app.get("/api/books?search=DUNE", &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&books), vec!["Children of Dune", "Dune", "Dune Messiah"]);
    assert!(books[0].get("description").is_none());

    let (_, books) = app.get("/api/books", &app.alice).await;
    assert_eq!(
        titles(&books),
        vec!["Children of Dune", "Dune", "Dune Messiah", "Emma"]
    );

    let (_, books) = app.get("/api/books?search=%25", &app.alice).await;
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn non_admin_can_read_but_not_write_books() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;

    let (status, _) = app
        .post("/api/books", &app.alice, json!({"title": "Emma", "author": "Jane Austen"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/books/{dune}"), Some(app.alice.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/books", &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, book) = app.get(&format!("/api/books/{dune}"), &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["author"], "Frank Herbert");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/books/{dune}"), Some(app.admin.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/books/{dune}"), &app.alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_requests_are_unauthenticated() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;

    for uri in [
        "/api/books".to_string(),
        "/api/books/featured".to_string(),
        "/api/books/favorites".to_string(),
        format!("/api/books/{dune}"),
        format!("/api/books/{dune}/book_records"),
        format!("/api/books/{dune}/reviews"),
        "/api/book-reviews/search?search=desert".to_string(),
        "/api/auth/users/me".to_string(),
    ] {
        let (status, error) = app.send(Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(error["error"]["code"], "unauthorized", "{uri}");
    }

    let (status, _) = app
        .send(Method::POST, &format!("/api/books/{dune}/favorites"), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/books", "not-a-real-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_record_is_a_conflict() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let uri = format!("/api/books/{dune}/book_records");

    let (status, record) = app.post(&uri, &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["reading_state"], "want_to_read");
    assert_eq!(record["book"], dune);

    let (status, error) = app
        .post(&uri, &app.alice, json!({"reading_state": "reading"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error,
        json!({"error": "Unique constraint violation: this user has already created a book record for this book."})
    );

    let (status, _) = app.post(&uri, &app.bob, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn readers_only_see_their_own_records() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let uri = format!("/api/books/{dune}/book_records");

    let (_, alice_record) = app
        .post(&uri, &app.alice, json!({"reading_state": "reading"}))
        .await;
    let (_, bob_record) = app.post(&uri, &app.bob, json!({"reader": 1})).await;
    assert_ne!(bob_record["reader"], alice_record["reader"]);

    let (status, records) = app.get(&uri, &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], alice_record["id"]);

    let bob_uri = format!("{uri}/{}", bob_record["id"]);
    let (status, _) = app.get(&bob_uri, &app.alice).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::DELETE, &bob_uri, Some(app.alice.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, record) = app
        .send(
            Method::PATCH,
            &bob_uri,
            Some(app.bob.as_str()),
            Some(json!({"reading_state": "read"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["reading_state"], "read");
}

#[tokio::test]
async fn records_are_scoped_to_their_book() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let emma = app.create_book("Emma", "Jane Austen").await;

    let (_, record) = app
        .post(&format!("/api/books/{dune}/book_records"), &app.alice, json!({}))
        .await;

    let (status, _) = app
        .get(&format!("/api/books/{emma}/book_records/{}", record["id"]), &app.alice)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/books/9999/book_records", &app.alice, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favoriting_twice_keeps_one_favorite() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    app.create_book("Emma", "Jane Austen").await;
    let uri = format!("/api/books/{dune}/favorites");

    let (status, _) = app.post(&uri, &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, book) = app.post(&uri, &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["favorite_count"], 1);

    let (_, favorites) = app.get("/api/books/favorites", &app.alice).await;
    assert_eq!(titles(&favorites), vec!["Dune"]);
    let (_, favorites) = app.get("/api/books/favorites", &app.bob).await;
    assert_eq!(favorites, json!([]));

    let (status, _) = app.post("/api/books/9999/favorites", &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn featured_books_include_details() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post(
            "/api/books",
            &app.admin,
            json!({"title": "Dune", "author": "Frank Herbert", "featured": true, "description": "Spice"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    app.create_book("Emma", "Jane Austen").await;

    let (status, featured) = app.get("/api/books/featured", &app.bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&featured), vec!["Dune"]);
    assert_eq!(featured[0]["description"], "Spice");
    assert_eq!(featured[0]["favorite_count"], 0);
}

#[tokio::test]
async fn reviews_are_listed_embedded_and_searchable() {
    let app = TestApp::new().await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let emma = app.create_book("Emma", "Jane Austen").await;

    let (status, review) = app
        .post(
            &format!("/api/books/{dune}/reviews"),
            &app.alice,
            json!({"body": "A sweeping desert epic", "book": emma}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["book"], dune);
    app.post(
        &format!("/api/books/{emma}/reviews"),
        &app.bob,
        json!({"body": "Witty and romantic"}),
    )
    .await;

    let (_, reviews) = app.get(&format!("/api/books/{dune}/reviews"), &app.bob).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    let (_, book) = app.get(&format!("/api/books/{dune}"), &app.bob).await;
    assert_eq!(book["reviews"][0]["body"], "A sweeping desert epic");

    let (status, found) = app.get("/api/book-reviews/search?search=Deserts", &app.bob).await;
    assert_eq!(status, StatusCode::OK);
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], review["id"]);

    let (status, found) = app.get("/api/book-reviews/search?search=", &app.bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, json!([]));
    let (_, found) = app.get("/api/book-reviews/search", &app.bob).await;
    assert_eq!(found, json!([]));

    let (status, _) = app
        .post(&format!("/api/books/{dune}/reviews"), &app.bob, json!({"body": " "}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app
        .post("/api/books/9999/reviews", &app.bob, json!({"body": "Lost"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_deletion_follows_configured_policy() {
    let mut settings = Settings::default();
    settings.auth.review_delete = shelf_authz::Policy::OwnerOnly;
    let app = TestApp::with_settings(settings).await;
    let dune = app.create_book("Dune", "Frank Herbert").await;

    let (_, review) = app
        .post(&format!("/api/books/{dune}/reviews"), &app.alice, json!({"body": "Spice"}))
        .await;
    let uri = format!("/api/book-reviews/{}", review["id"]);

    let (status, _) = app.send(Method::DELETE, &uri, Some(app.bob.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, fetched) = app.get(&uri, &app.bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["body"], "Spice");

    let (status, _) = app.send(Method::DELETE, &uri, Some(app.alice.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &app.alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn current_user_and_logout() {
    let app = TestApp::new().await;

    let (status, me) = app.get("/api/auth/users/me", &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["is_admin"], false);

    let (status, _) = app
        .send(Method::POST, "/api/auth/token/logout", Some(app.alice.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/auth/users/me", &app.alice).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn openapi_document_lists_module_paths() {
    let app = TestApp::new().await;
    let (status, doc) = app
        .send(Method::GET, "/docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/books"));
    assert!(paths.contains_key("/api/books/{book_id}/book_records/{record_id}"));
    assert!(paths.contains_key("/api/book-reviews/search"));
    assert!(paths.contains_key("/api/auth/users/me"));
}

#[tokio::test]
async fn credentials_are_checked_before_the_body() {
    let app = TestApp::new().await;

    let (status, error) = app.send(Method::POST, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["error"]["code"], "unauthorized");

    let (status, _) = app
        .send(Method::POST, "/api/books", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::POST, "/api/books/1/reviews", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/books", &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, error) = app.post("/api/books", &app.admin, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], "validation_error");

    let (status, error) = app
        .send(Method::POST, "/api/books", Some(app.admin.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], "validation_error");
}

#[tokio::test]
async fn unparseable_ids_are_not_found() {
    let app = TestApp::new().await;

    for uri in [
        "/api/books/abc",
        "/api/books/abc/book_records",
        "/api/books/1/book_records/abc",
        "/api/book-reviews/abc",
    ] {
        let (status, error) = app.get(uri, &app.alice).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(error["error"]["code"], "not_found", "{uri}");
    }

    let (status, _) = app.send(Method::GET, "/api/books/abc", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn title_search_folds_non_ascii_case() {
    let app = TestApp::new().await;
    app.create_book("Über den Wolken", "Anon").await;
    app.create_book("ÉMILE", "Jean-Jacques Rousseau").await;
    app.create_book("Emma", "Jane Austen").await;

    let (status, books) = app.get("/api/books?search=%C3%BCber", &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&books), vec!["Über den Wolken"]);

    let (_, books) = app.get("/api/books?search=%C3%A9mile", &app.alice).await;
    assert_eq!(titles(&books), vec!["ÉMILE"]);
}

#[tokio::test]
async fn racing_record_creates_yield_one_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::on_disk(&dir).await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let uri = format!("/api/books/{dune}/book_records");

    let (first, second) = tokio::join!(
        app.post(&uri, &app.alice, json!({})),
        app.post(&uri, &app.alice, json!({"reading_state": "reading"})),
    );

    let mut statuses = [first.0.as_u16(), second.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [201, 400]);
    let conflict = if first.0 == StatusCode::BAD_REQUEST { first.1 } else { second.1 };
    assert!(conflict["error"]
        .as_str()
        .unwrap()
        .starts_with("Unique constraint violation"));

    let (_, records) = app.get(&uri, &app.alice).await;
    assert_eq!(records.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn racing_favorites_both_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::on_disk(&dir).await;
    let dune = app.create_book("Dune", "Frank Herbert").await;
    let uri = format!("/api/books/{dune}/favorites");

    let (first, second) = tokio::join!(
        app.post(&uri, &app.bob, json!({})),
        app.post(&uri, &app.bob, json!({})),
    );
    assert_eq!(first.0, StatusCode::CREATED);
    assert_eq!(second.0, StatusCode::CREATED);

    let (_, book) = app.get(&format!("/api/books/{dune}"), &app.bob).await;
    assert_eq!(book["favorite_count"], 1);
}
