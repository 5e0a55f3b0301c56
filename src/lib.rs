//! Bookshelf application library
//!
//! Hosts the `books` module and the bootstrap sequence that wires settings,
//! the database pool, module lifecycle, and the HTTP server together.

pub mod modules;
pub mod utils;

use anyhow::Context;
use bookshelf_kernel::{settings::Settings, Database, InitCtx, ModuleRegistry};

/// Connect to the database and apply every module's schema.
pub async fn prepare(settings: &Settings) -> anyhow::Result<(Database, ModuleRegistry)> {
    let db = Database::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("failed to connect to {}", settings.database.url))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &db);

    db.apply_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply schema")?;

    Ok((db, registry))
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let (db, registry) = prepare(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = bookshelf_http::start_server(
        &registry,
        &settings,
        &db,
        bookshelf_http::shutdown_signal(),
    )
    .await;

    registry.stop_all().await?;
    db.close().await;
    tracing::info!("bookshelf shut down");

    served
}
