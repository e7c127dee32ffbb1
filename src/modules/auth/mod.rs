//! Users, API tokens and request authentication.
//!
//! Tokens are provisioned by operators through `shelf-cli`; this module only
//! resolves them on incoming requests and lets a user inspect or revoke their
//! own credentials.

pub mod middleware;
pub mod models;
pub mod repo;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shelf_authz::Identity;
use shelf_db::Database;
use shelf_http::error::AppError;
use shelf_kernel::{InitCtx, Migration, Module};

use models::User;

pub struct AuthModule;

impl AuthModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            scheme = %ctx.settings.auth.token_scheme,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        let router = Router::new()
            .route("/users/me", get(current_user))
            .route("/token/logout", post(logout))
            .with_state(ctx.db.clone());

        middleware::authenticated(router, ctx)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/users/me": {
                    "get": {
                        "summary": "Current user",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {
                                "description": "The authenticated user",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/User" }
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or invalid token",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/token/logout": {
                    "post": {
                        "summary": "Revoke the caller's token",
                        "tags": ["Auth"],
                        "responses": {
                            "204": { "description": "Token revoked" },
                            "401": {
                                "description": "Missing or invalid token",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "username": { "type": "string" },
                            "is_admin": { "type": "boolean" },
                            "created_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "username", "is_admin", "created_at"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_users_tokens",
            up: r#"
                CREATE TABLE users (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    username   TEXT    NOT NULL UNIQUE CHECK (username <> ''),
                    is_admin   BOOLEAN NOT NULL DEFAULT 0,
                    created_at TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );
                CREATE TABLE auth_tokens (
                    key        TEXT    PRIMARY KEY,
                    user_id    INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
                    created_at TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );
                "#,
        }]
    }
}

async fn current_user(
    State(db): State<Database>,
    identity: Identity,
) -> Result<Json<User>, AppError> {
    let principal = identity.require()?;
    let user = repo::find_user(db.pool(), principal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user no longer exists"))?;
    Ok(Json(user))
}

async fn logout(State(db): State<Database>, identity: Identity) -> Result<StatusCode, AppError> {
    let principal = identity.require()?;
    repo::revoke_token(db.pool(), principal.user_id).await?;
    tracing::info!(user_id = principal.user_id, "token revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the auth module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthModule::new())
}
