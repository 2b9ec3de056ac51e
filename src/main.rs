//! Feederwatch - FR24 feeder watchdog dashboard and configuration service.

use feederwatch::config::{self, Bootstrap};
use feederwatch::db::Store;
use feederwatch::retention::RetentionManager;
use feederwatch::tz::{self, DisplayZone};
use feederwatch::web::Server;

use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let paths = Bootstrap::load();

    // Initialize logging; the document's log_level sets the default filter.
    let directive = format!("feederwatch={}", peek_log_level(&paths.config_path));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let document = config::load(Path::new(&paths.config_path));
    let zone = DisplayZone::resolve(&document.web.timezone);
    let port = u16::try_from(document.web.port).unwrap_or(6869);

    tracing::info!("Starting feederwatch on port {}...", port);
    tracing::info!("Using database at {}", paths.db_path);
    tracing::info!("Display timezone: {}", zone.name());

    let store = Store::new(&paths.db_path)?;
    tracing::info!("Database initialized successfully");

    // Canonicalize any legacy naive timestamps before serving.
    let report = tz::migrate(&store, zone.tz())?;
    if report.total() > 0 {
        tracing::info!(
            samples = report.samples_rewritten,
            events = report.events_rewritten,
            "migrated legacy timestamps to UTC"
        );
    }

    let config_path = PathBuf::from(&paths.config_path);
    let retention = RetentionManager::new(store.clone(), config_path.clone());
    retention.start();

    let server = Server::new(store, config_path, port);
    server.start().await?;

    Ok(())
}

/// Read `logging.log_level` before the subscriber exists.
///
/// The full load, with its warnings, happens once logging is up; this peek
/// only has to find a level to seed the filter with.
fn peek_log_level(config_path: &str) -> String {
    std::fs::read_to_string(config_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|doc| {
            doc.get("logging")
                .and_then(|l| l.get("log_level"))
                .and_then(|v| v.as_str())
                .map(str::to_lowercase)
        })
        .filter(|level| ["debug", "info", "warn", "error"].contains(&level.as_str()))
        .unwrap_or_else(|| "info".to_string())
}
