//! Process-level paths resolved before the configuration document exists.

use std::env;

/// Filesystem locations loaded from environment variables.
///
/// Everything else the daemon needs lives inside the configuration document;
/// these two paths are what it takes to find that document and the database.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    /// Path to the JSON configuration document (default: "config.json")
    pub config_path: String,
    /// Path to the SQLite database file (default: "feederwatch.db")
    pub db_path: String,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            config_path: "config.json".to_string(),
            db_path: "feederwatch.db".to_string(),
        }
    }
}

impl Bootstrap {
    /// Load paths from environment variables.
    ///
    /// Environment variables:
    /// - `FEEDERWATCH_CONFIG_PATH`: configuration document (default: "config.json")
    /// - `FEEDERWATCH_DB_PATH`: database file path (default: "feederwatch.db")
    pub fn load() -> Self {
        let mut paths = Self::default();

        if let Ok(config_path) = env::var("FEEDERWATCH_CONFIG_PATH") {
            paths.config_path = config_path;
        }

        if let Ok(db_path) = env::var("FEEDERWATCH_DB_PATH") {
            paths.db_path = db_path;
        }

        paths
    }
}
