use std::path::{Path, PathBuf};

use crate::reminders::{ReminderConfig, ReminderError};

/// Application-level constants
pub const APP_NAME: &str = "DoseReminder";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/DoseReminder/ on all platforms, falling back to the temp dir when no
/// home directory can be determined
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// SQLite database holding schedules and learner history
pub fn database_path() -> PathBuf {
    app_data_dir().join("reminders.db")
}

/// Optional JSON overrides for the engine constants
pub fn engine_config_path() -> PathBuf {
    app_data_dir().join("engine.json")
}

/// Log filter used when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "dose_reminder=info,warn"
}

/// Load engine configuration. A missing file means defaults; a file that
/// exists but does not parse or validate is an error.
pub fn load_engine_config(path: &Path) -> Result<ReminderConfig, ReminderError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No engine config file, using defaults");
        return Ok(ReminderConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| ReminderError::Config(format!("{}: {e}", path.display())))?;
    let config: ReminderConfig = serde_json::from_str(&raw)
        .map_err(|e| ReminderError::Config(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
