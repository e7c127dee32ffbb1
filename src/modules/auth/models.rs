use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_authz::{Principal, UserId};

/// An account that can authenticate against the API.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal {
            user_id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        }
    }
}
