mod kv;
mod settings;

pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use settings::{Settings, SettingsStore, SETTINGS_KEY, SETTING_KEYS};

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Returns the directory holding `pomotimer.db`.
///
/// `POMOTIMER_DATA_DIR` wins if set. Otherwise `~/.config/pomotimer[-dev]/`,
/// with the `-dev` suffix when `POMOTIMER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("POMOTIMER_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("POMOTIMER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("pomotimer-dev")
            } else {
                base_dir.join("pomotimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Open the settings persisted in `<data_dir>/pomotimer.db`.
///
/// # Errors
/// Returns an error only if the database itself cannot be opened; a missing
/// or corrupt blob inside it is recovered by [`SettingsStore::load`].
pub fn open_settings() -> Result<SettingsStore> {
    Ok(SettingsStore::open(Box::new(SqliteKv::open()?)))
}
