use clap::Subcommand;
use pomotimer_core::error::Result;
use pomotimer_core::storage::SETTING_KEYS;
use pomotimer_core::{open_settings, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "workTime", "soundEnabled")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// List the accepted keys
    Keys,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<()> {
    let mut store = open_settings()?;

    match action {
        ConfigAction::Get { key } => match store.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(ConfigError::UnknownKey(key).into()),
        },
        ConfigAction::Set { key, value } => {
            store.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List => {
            let json = serde_json::to_string_pretty(store.settings())?;
            println!("{json}");
        }
        ConfigAction::Keys => {
            for key in SETTING_KEYS {
                println!("{key}");
            }
        }
        ConfigAction::Reset => {
            store.reset();
            println!("config reset to defaults");
        }
    }
    Ok(())
}
