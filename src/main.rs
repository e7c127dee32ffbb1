use anyhow::Context;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "shelf-app bootstrap starting"
    );

    let db = Database::connect(&settings.database.url, settings.database.max_connections).await?;
    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };

    let registry = shelf_app::registry();
    let app = shelf_app::prepare(&registry, &ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = shelf_http::start_server(app, &settings.server).await;

    registry.stop_modules().await?;
    db.close().await;
    served
}
