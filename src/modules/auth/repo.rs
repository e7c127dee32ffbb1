//! User and token queries.

use shelf_authz::{Principal, UserId};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use super::models::User;

pub async fn create_user<'e, E>(executor: E, username: &str, is_admin: bool) -> sqlx::Result<User>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, is_admin) VALUES (?, ?) RETURNING id, username, is_admin, created_at",
    )
    .bind(username)
    .bind(is_admin)
    .fetch_one(executor)
    .await
}

pub async fn find_user<'e, E>(executor: E, id: UserId) -> sqlx::Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, User>("SELECT id, username, is_admin, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_user_by_username<'e, E>(executor: E, username: &str) -> sqlx::Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        "SELECT id, username, is_admin, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(executor)
    .await
}

/// The user's token, creating one if they have none.
pub async fn issue_token<'e, E>(executor: E, user_id: UserId) -> sqlx::Result<String>
where
    E: SqliteExecutor<'e>,
{
    let candidate = Uuid::new_v4().simple().to_string();
    sqlx::query_scalar(
        r#"
        INSERT INTO auth_tokens (key, user_id) VALUES (?, ?)
        ON CONFLICT (user_id) DO UPDATE SET user_id = excluded.user_id
        RETURNING key
        "#,
    )
    .bind(candidate)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

pub async fn revoke_token<'e, E>(executor: E, user_id: UserId) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn principal_for_token<'e, E>(executor: E, key: &str) -> sqlx::Result<Option<Principal>>
where
    E: SqliteExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.is_admin, u.created_at
        FROM auth_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    Ok(user.map(Principal::from))
}
