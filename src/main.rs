#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use five_s_audit::{
    api::{AppState, build_router},
    config::{
        Settings,
        catalog::{load_catalog, sample_catalog},
        database,
    },
    core::{catalog::import_if_empty, photo::LocalPhotoStore},
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings
    let settings = Settings::from_env()
        .inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!(
        "Settings loaded: database {}, uploads {:?}, reset {}",
        settings.database_url,
        settings.upload_dir,
        if settings.admin_passphrase.is_some() { "enabled" } else { "disabled" }
    );

    // 4. Initialize database
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Prepare the photo directory
    let photos = LocalPhotoStore::new(&settings.upload_dir);
    photos
        .ensure_ready()
        .await
        .inspect_err(|e| error!("Upload directory is not usable: {}", e))?;

    // 6. Seed the catalog on first start, falling back to the built-in sample
    let catalog = if settings.catalog_path.exists() {
        load_catalog(&settings.catalog_path)?
    } else {
        warn!(
            "Catalog file {:?} not found; using the built-in sample catalog",
            settings.catalog_path
        );
        sample_catalog()
    };
    if let Some(summary) = import_if_empty(&db, &photos, &catalog).await? {
        info!(
            "Seeded {} machines and {} questions ({} tokens in first cycle)",
            summary.machines, summary.questions, summary.tokens
        );
    }

    // 7. Serve
    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .inspect_err(|e| error!("Cannot bind {}: {}", settings.bind_address, e))?;
    info!("Listening on {}", settings.bind_address);

    let app = build_router(AppState::new(db, photos, settings));
    axum::serve(listener, app).await?;

    Ok(())
}
