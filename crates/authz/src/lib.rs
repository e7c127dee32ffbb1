//! Request identity and access policies.
//!
//! Authentication middleware attaches an [`Identity`] to each request; handlers
//! extract it and evaluate a [`Policy`] for the [`Access`] they are about to
//! perform, either against the collection ([`Policy::authorize`]) or against a
//! single owned row ([`Policy::authorize_object`]).

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type UserId = i64;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

/// Who is making the current request, if anyone.
#[derive(Debug, Clone, Default)]
pub struct Identity(Option<Principal>);

impl Identity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self(Some(principal))
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    /// The principal, or [`Denied::Unauthenticated`].
    pub fn require(&self) -> Result<&Principal, Denied> {
        self.principal().ok_or(Denied::Unauthenticated)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Whether an operation reads or mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn from_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            Access::Read
        } else {
            Access::Write
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("authentication credentials were not provided")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
}

/// Access rule evaluated per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    AllowAny,
    #[default]
    AuthenticatedOnly,
    AdminOrReadOnly,
    OwnerOrReadOnly,
    OwnerOnly,
}

impl Policy {
    /// Collection-level check, made before any row is loaded.
    pub fn authorize(self, identity: &Identity, access: Access) -> Result<(), Denied> {
        let principal = match self {
            Policy::AllowAny => return Ok(()),
            _ => identity.require()?,
        };

        if self == Policy::AdminOrReadOnly && access == Access::Write && !principal.is_admin {
            return self.deny(principal, "admin role required");
        }

        Ok(())
    }

    /// Row-level check against the row's owning user.
    pub fn authorize_object(
        self,
        identity: &Identity,
        access: Access,
        owner: UserId,
    ) -> Result<(), Denied> {
        self.authorize(identity, access)?;

        let Some(principal) = identity.principal() else {
            return Ok(());
        };
        let owns = principal.user_id == owner;

        match self {
            Policy::OwnerOnly if !owns => self.deny(principal, "only the owner may access this resource"),
            Policy::OwnerOrReadOnly if access == Access::Write && !owns => {
                self.deny(principal, "only the owner may modify this resource")
            }
            _ => Ok(()),
        }
    }

    fn deny(self, principal: &Principal, reason: &'static str) -> Result<(), Denied> {
        tracing::debug!(
            target: "shelf-authz",
            policy = ?self,
            user_id = principal.user_id,
            reason,
            "access denied"
        );
        Err(Denied::Forbidden(reason))
    }
}
