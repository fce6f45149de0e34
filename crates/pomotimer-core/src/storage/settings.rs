//! User settings persisted as one JSON blob under [`SETTINGS_KEY`].
//!
//! The blob is a flat record:
//!
//! ```text
//! {"workTime":25,"shortBreakTime":5,"longBreakTime":15,
//!  "sessionsUntilLongBreak":4,"soundEnabled":true,"quoteEnabled":true}
//! ```
//!
//! Durations are minutes. Loading never fails: a missing blob, unparsable
//! text, or a bad field falls back to the built-in default and the
//! corrected blob is written back.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::kv::KvStore;
use crate::error::ConfigError;

/// Key of the settings blob in the key-value store.
pub const SETTINGS_KEY: &str = "pomodoroSettings";

/// Persisted field names, in blob order.
pub const SETTING_KEYS: [&str; 6] = [
    "workTime",
    "shortBreakTime",
    "longBreakTime",
    "sessionsUntilLongBreak",
    "soundEnabled",
    "quoteEnabled",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settings {
    #[serde(rename = "workTime")]
    pub work_minutes: u32,
    #[serde(rename = "shortBreakTime")]
    pub short_break_minutes: u32,
    #[serde(rename = "longBreakTime")]
    pub long_break_minutes: u32,
    #[serde(rename = "sessionsUntilLongBreak")]
    pub sessions_until_long_break: u32,
    #[serde(rename = "soundEnabled")]
    pub sound_enabled: bool,
    #[serde(rename = "quoteEnabled")]
    pub quote_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_until_long_break: 4,
            sound_enabled: true,
            quote_enabled: true,
        }
    }
}

impl Settings {
    /// Build settings from a parsed blob, field by field.
    ///
    /// Returns the settings and the number of fields that fell back to
    /// their default.
    fn from_record(record: &Map<String, Value>) -> (Self, usize) {
        let defaults = Self::default();
        let mut substituted = 0;

        let mut minutes = |key: &str, default: u32| match positive_int(record, key) {
            Some(v) => v,
            None => {
                substituted += 1;
                default
            }
        };
        let work_minutes = minutes("workTime", defaults.work_minutes);
        let short_break_minutes = minutes("shortBreakTime", defaults.short_break_minutes);
        let long_break_minutes = minutes("longBreakTime", defaults.long_break_minutes);
        let sessions_until_long_break =
            minutes("sessionsUntilLongBreak", defaults.sessions_until_long_break);

        let mut flag = |key: &str, default: bool| match record.get(key).and_then(Value::as_bool) {
            Some(v) => v,
            None => {
                substituted += 1;
                default
            }
        };
        let sound_enabled = flag("soundEnabled", defaults.sound_enabled);
        let quote_enabled = flag("quoteEnabled", defaults.quote_enabled);

        (
            Self {
                work_minutes,
                short_break_minutes,
                long_break_minutes,
                sessions_until_long_break,
                sound_enabled,
                quote_enabled,
            },
            substituted,
        )
    }
}

/// A positive whole number that fits in `u32`. Zero, negatives, fractions,
/// strings and nulls are all rejected.
fn positive_int(record: &Map<String, Value>, key: &str) -> Option<u32> {
    record
        .get(key)?
        .as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

/// Owns the live [`Settings`] and the backend they persist to.
///
/// Every mutation saves immediately. Save failures are logged and dropped,
/// so the in-memory values stay authoritative for the running process.
pub struct SettingsStore {
    kv: Box<dyn KvStore>,
    settings: Settings,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Wrap a backend and load the persisted settings from it.
    pub fn open(kv: Box<dyn KvStore>) -> Self {
        let mut store = Self {
            kv,
            settings: Settings::default(),
        };
        store.load();
        store
    }

    /// Re-read the blob from the backend.
    pub fn load(&mut self) {
        let raw = match self.kv.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no saved settings, writing defaults");
                self.reset();
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read settings, using defaults");
                self.reset();
                return;
            }
        };

        let record = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(record)) => record,
            Ok(other) => {
                warn!(blob = %other, "settings blob is not a record, using defaults");
                self.reset();
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to parse settings, using defaults");
                self.reset();
                return;
            }
        };

        let (settings, substituted) = Settings::from_record(&record);
        self.settings = settings;
        if substituted > 0 {
            debug!(substituted, "settings had missing or invalid fields, rewriting");
            self.save();
        }
    }

    /// Write the current values to the backend.
    pub fn save(&mut self) {
        let blob = match serde_json::to_string(&self.settings) {
            Ok(blob) => blob,
            Err(e) => {
                error!(error = %e, "failed to serialize settings");
                return;
            }
        };
        if let Err(e) = self.kv.set(SETTINGS_KEY, &blob) {
            error!(error = %e, "failed to save settings");
        }
    }

    /// Restore every field to its default and save.
    pub fn reset(&mut self) {
        self.settings = Settings::default();
        self.save();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    /// Give the backend back, e.g. to reopen it in a fresh store.
    pub fn into_kv(self) -> Box<dyn KvStore> {
        self.kv
    }

    // ── Setters ──────────────────────────────────────────────────────

    pub fn set_work_minutes(&mut self, minutes: u32) {
        self.settings.work_minutes = minutes;
        self.save();
    }

    pub fn set_short_break_minutes(&mut self, minutes: u32) {
        self.settings.short_break_minutes = minutes;
        self.save();
    }

    pub fn set_long_break_minutes(&mut self, minutes: u32) {
        self.settings.long_break_minutes = minutes;
        self.save();
    }

    pub fn set_sessions_until_long_break(&mut self, sessions: u32) {
        self.settings.sessions_until_long_break = sessions;
        self.save();
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.settings.sound_enabled = enabled;
        self.save();
    }

    pub fn set_quote_enabled(&mut self, enabled: bool) {
        self.settings.quote_enabled = enabled;
        self.save();
    }

    // ── Keyed access ─────────────────────────────────────────────────

    /// Get a setting as a string by its persisted key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self.settings).ok()?;
        json.get(key).map(Value::to_string)
    }

    /// Set a setting by its persisted key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the field's type. Nothing is changed in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "workTime" => self.set_work_minutes(parse_minutes(key, value)?),
            "shortBreakTime" => self.set_short_break_minutes(parse_minutes(key, value)?),
            "longBreakTime" => self.set_long_break_minutes(parse_minutes(key, value)?),
            "sessionsUntilLongBreak" => {
                self.set_sessions_until_long_break(parse_minutes(key, value)?)
            }
            "soundEnabled" => self.set_sound_enabled(parse_flag(key, value)?),
            "quoteEnabled" => self.set_quote_enabled(parse_flag(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_minutes(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("cannot parse '{value}' as a whole number"),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("cannot parse '{value}' as true/false"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::kv::MemoryKv;
    use proptest::prelude::*;

    /// Backend whose writes always fail; reads return the seeded value.
    struct ReadOnlyKv(Option<String>);

    impl KvStore for ReadOnlyKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.0.clone())
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Locked)
        }
    }

    /// Backend that cannot be read at all.
    struct BrokenKv;

    impl KvStore for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::QueryFailed("disk I/O error".into()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn blob(store: &SettingsStore) -> Value {
        let raw = store.kv().get(SETTINGS_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn missing_blob_writes_defaults() {
        let store = SettingsStore::open(Box::new(MemoryKv::new()));
        assert_eq!(*store.settings(), Settings::default());
        let saved = blob(&store);
        assert_eq!(saved["workTime"], 25);
        assert_eq!(saved["shortBreakTime"], 5);
        assert_eq!(saved["longBreakTime"], 15);
        assert_eq!(saved["sessionsUntilLongBreak"], 4);
        assert_eq!(saved["soundEnabled"], true);
    }

    #[test]
    fn corrupt_blob_falls_back_and_is_rewritten() {
        let kv = MemoryKv::with_entry(SETTINGS_KEY, "{not json at all");
        let store = SettingsStore::open(Box::new(kv));
        assert_eq!(*store.settings(), Settings::default());
        assert_eq!(blob(&store)["workTime"], 25);
    }

    #[test]
    fn non_record_blob_is_treated_as_corrupt() {
        let kv = MemoryKv::with_entry(SETTINGS_KEY, "null");
        let store = SettingsStore::open(Box::new(kv));
        assert_eq!(*store.settings(), Settings::default());
        assert!(blob(&store).is_object());
    }

    #[test]
    fn invalid_fields_fall_back_individually() {
        let kv = MemoryKv::with_entry(
            SETTINGS_KEY,
            r#"{"workTime":50,"shortBreakTime":0,"longBreakTime":"20","soundEnabled":false}"#,
        );
        let store = SettingsStore::open(Box::new(kv));
        let s = store.settings();
        assert_eq!(s.work_minutes, 50);
        assert_eq!(s.short_break_minutes, 5);
        assert_eq!(s.long_break_minutes, 15);
        assert_eq!(s.sessions_until_long_break, 4);
        assert!(!s.sound_enabled);
        assert!(s.quote_enabled);

        let saved = blob(&store);
        assert_eq!(saved["shortBreakTime"], 5);
        assert_eq!(saved["sessionsUntilLongBreak"], 4);
    }

    #[test]
    fn complete_blob_loads_as_saved() {
        let raw = r#"{"workTime":30,"shortBreakTime":6,"longBreakTime":20,"sessionsUntilLongBreak":3,"soundEnabled":true,"quoteEnabled":false}"#;
        let store = SettingsStore::open(Box::new(ReadOnlyKv(Some(raw.into()))));
        assert_eq!(store.settings().work_minutes, 30);
        assert_eq!(store.settings().sessions_until_long_break, 3);
        assert!(!store.settings().quote_enabled);
    }

    #[test]
    fn unreadable_backend_uses_defaults_and_saves() {
        let mut store = SettingsStore::open(Box::new(BrokenKv));
        assert_eq!(*store.settings(), Settings::default());
        store.set_work_minutes(40);
        assert_eq!(store.settings().work_minutes, 40);
    }

    #[test]
    fn write_failure_keeps_memory_authoritative() {
        let mut store = SettingsStore::open(Box::new(ReadOnlyKv(None)));
        store.set_long_break_minutes(30);
        store.set_sessions_until_long_break(2);
        assert_eq!(store.settings().long_break_minutes, 30);
        assert_eq!(store.settings().sessions_until_long_break, 2);
    }

    #[test]
    fn setters_persist_immediately() {
        let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
        store.set_work_minutes(45);
        store.set_quote_enabled(false);
        let saved = blob(&store);
        assert_eq!(saved["workTime"], 45);
        assert_eq!(saved["quoteEnabled"], false);
    }

    #[test]
    fn reset_restores_defaults_and_saves() {
        let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
        store.set_short_break_minutes(10);
        store.set_sound_enabled(false);
        store.reset();
        assert_eq!(*store.settings(), Settings::default());
        assert_eq!(blob(&store)["shortBreakTime"], 5);
    }

    #[test]
    fn keyed_get_and_set() {
        let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
        assert_eq!(store.get("workTime").as_deref(), Some("25"));
        assert_eq!(store.get("soundEnabled").as_deref(), Some("true"));
        assert!(store.get("colour").is_none());

        store.set("sessionsUntilLongBreak", "2").unwrap();
        store.set("soundEnabled", "false").unwrap();
        assert_eq!(store.settings().sessions_until_long_break, 2);
        assert!(!store.settings().sound_enabled);
        assert_eq!(blob(&store)["sessionsUntilLongBreak"], 2);
    }

    #[test]
    fn keyed_set_rejects_bad_input() {
        let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
        assert!(matches!(
            store.set("colour", "red"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            store.set("workTime", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set("quoteEnabled", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(*store.settings(), Settings::default());
    }

    #[test]
    fn every_key_is_gettable() {
        let store = SettingsStore::open(Box::new(MemoryKv::new()));
        for key in SETTING_KEYS {
            assert!(store.get(key).is_some(), "missing {key}");
        }
    }

    fn any_settings() -> impl Strategy<Value = Settings> {
        (1..=600u32, 1..=600u32, 1..=600u32, 1..=12u32, any::<bool>(), any::<bool>()).prop_map(
            |(work, short, long, sessions, sound, quote)| Settings {
                work_minutes: work,
                short_break_minutes: short,
                long_break_minutes: long,
                sessions_until_long_break: sessions,
                sound_enabled: sound,
                quote_enabled: quote,
            },
        )
    }

    proptest! {
        #[test]
        fn save_then_load_reproduces_values(settings in any_settings()) {
            let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
            store.set_work_minutes(settings.work_minutes);
            store.set_short_break_minutes(settings.short_break_minutes);
            store.set_long_break_minutes(settings.long_break_minutes);
            store.set_sessions_until_long_break(settings.sessions_until_long_break);
            store.set_sound_enabled(settings.sound_enabled);
            store.set_quote_enabled(settings.quote_enabled);
            store.save();

            let reopened = SettingsStore::open(store.into_kv());
            prop_assert_eq!(*reopened.settings(), settings);
        }
    }
}
