//! Token authentication for module routers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    Router,
};
use shelf_authz::Identity;
use shelf_db::Database;
use shelf_http::error::AppError;
use shelf_kernel::InitCtx;

use super::repo;

#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    scheme: Arc<str>,
}

impl Authenticator {
    pub fn new(ctx: &InitCtx<'_>) -> Self {
        Self {
            db: ctx.db.clone(),
            scheme: Arc::from(ctx.settings.auth.token_scheme.as_str()),
        }
    }
}

/// Wrap every route of `router` with token authentication.
pub fn authenticated<S>(router: Router<S>, ctx: &InitCtx<'_>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        Authenticator::new(ctx),
        authenticate,
    ))
}

/// Resolve the request's [`Identity`] from its `Authorization` header.
///
/// No header, or a different scheme, yields an anonymous identity and leaves
/// the decision to the handler's policy. A key that matches no token is
/// rejected outright.
pub async fn authenticate(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match token_from_headers(request.headers(), &auth.scheme) {
        None => Identity::anonymous(),
        Some(key) => {
            let principal = repo::principal_for_token(auth.db.pool(), &key)
                .await?
                .ok_or_else(|| AppError::unauthorized("invalid token"))?;
            tracing::debug!(user_id = principal.user_id, "request authenticated");
            Identity::authenticated(principal)
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn token_from_headers(headers: &HeaderMap, scheme: &str) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (given_scheme, key) = value.split_once(' ').unwrap_or((value, ""));
    if !given_scheme.eq_ignore_ascii_case(scheme) {
        return None;
    }
    Some(key.trim().to_string())
}
