//! Shelf application library
//!
//! Book catalogue, per-reader reading records, reviews with full-text search
//! and favorites, assembled from independent modules.

pub mod modules;
pub mod utils;

use anyhow::Context;
use axum::Router;
use shelf_kernel::{InitCtx, ModuleRegistry};

/// Registry holding every Shelf module in dependency order
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// Apply pending migrations, initialize modules and build the HTTP router
pub async fn prepare(registry: &ModuleRegistry, ctx: &InitCtx<'_>) -> anyhow::Result<Router> {
    let applied = ctx
        .db
        .apply_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "database schema up to date");

    registry.init_modules(ctx).await?;

    Ok(shelf_http::build_router(registry, ctx))
}
