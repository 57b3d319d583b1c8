mod database;

pub use database::Database;

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/diakit[-dev]/` based on DIAKIT_ENV.
///
/// Set DIAKIT_ENV=dev to use the development data directory, or
/// DIAKIT_DATA_DIR to override the location entirely (used by tests).
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = if let Ok(dir) = std::env::var("DIAKIT_DATA_DIR") {
        PathBuf::from(dir)
    } else {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config");

        let env = std::env::var("DIAKIT_ENV").unwrap_or_else(|_| "production".to_string());

        if env == "dev" {
            base_dir.join("diakit-dev")
        } else {
            base_dir.join("diakit")
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| StorageError::DataDir(e.to_string()))?;
    Ok(dir)
}
