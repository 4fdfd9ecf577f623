//! Settings persistence
//!
//! Settings live in a flat JSON object on disk. Loading is a partial merge:
//! known keys override the defaults, unknown keys are ignored and missing or
//! mistyped keys keep their default value. Neither loading nor saving ever
//! fails towards the caller; problems are logged.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{split_prefixes, Settings};

/// File name used inside the settings directory
pub const SETTINGS_FILE_NAME: &str = "serial_reader_settings.json";

/// Default settings location: `<config dir>/weighlink/serial_reader_settings.json`,
/// falling back to the working directory when no config dir is known.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("weighlink"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILE_NAME)
}

/// Durable flat key-value store for [`Settings`]
#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    path: PathBuf,
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        Self::new(default_settings_path())
    }
}

impl ConfigurationStore {
    /// Create a store backed by the given file
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when the file is absent or corrupt
    pub fn load(&self) -> Settings {
        let mut settings = Settings::default();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Settings file not found, using defaults");
                return settings;
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Could not read settings, using defaults: {e}");
                return settings;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => {
                merge_flat(&mut settings, &map);
                info!(path = %self.path.display(), "Settings loaded");
            }
            Ok(other) => {
                warn!(
                    path = %self.path.display(),
                    "Settings file is not a JSON object (found {}), using defaults",
                    json_kind(&other)
                );
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Settings file is corrupt, using defaults: {e}");
            }
        }

        settings
    }

    /// Overwrite the settings file. Failures are logged, not returned.
    pub fn save(&self, settings: &Settings) {
        if let Err(e) = self.try_save(settings) {
            warn!(path = %self.path.display(), "Failed to save settings: {e}");
        } else {
            info!(path = %self.path.display(), "Settings saved");
        }
    }

    fn try_save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&Value::Object(to_flat(settings)))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, content)
    }
}

/// Flatten settings into the on-disk key set
pub fn to_flat(settings: &Settings) -> Map<String, Value> {
    let conn = &settings.connection;
    let parsing = &settings.parsing;
    let processing = &settings.processing;

    let value = json!({
        "port": conn.port,
        "baudrate": conn.baud_rate,
        "databits": conn.data_bits,
        "parity": conn.parity,
        "stopbits": conn.stop_bits,
        "flowcontrol": conn.flow_control,
        "enable_parsing": parsing.enabled,
        "start_of_text_ascii": parsing.start_delimiter,
        "end_of_text_ascii": parsing.end_delimiter,
        "start_prefixes": parsing.prefixes_joined(),
        "expected_data_length": parsing.expected_length,
        "trimming_mode": parsing.trimming_mode,
        "start_index": parsing.start_index,
        "remove_zeros": processing.remove_leading_zeros,
        "reverse_string": processing.reverse_output,
        "filter_digits": processing.filter_digits_only,
        "refresh_rate": settings.refresh_rate,
    });

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Apply every recognised key of `map` onto `settings`
pub fn merge_flat(settings: &mut Settings, map: &Map<String, Value>) {
    let conn = &mut settings.connection;
    merge_key(map, "port", &mut conn.port);
    merge_key(map, "baudrate", &mut conn.baud_rate);
    merge_key(map, "databits", &mut conn.data_bits);
    merge_key(map, "parity", &mut conn.parity);
    merge_key(map, "stopbits", &mut conn.stop_bits);
    merge_key(map, "flowcontrol", &mut conn.flow_control);

    let parsing = &mut settings.parsing;
    merge_key(map, "enable_parsing", &mut parsing.enabled);
    merge_key(map, "start_of_text_ascii", &mut parsing.start_delimiter);
    merge_key(map, "end_of_text_ascii", &mut parsing.end_delimiter);
    merge_key(map, "expected_data_length", &mut parsing.expected_length);
    merge_key(map, "trimming_mode", &mut parsing.trimming_mode);
    merge_key(map, "start_index", &mut parsing.start_index);

    let mut joined = parsing.prefixes_joined();
    merge_key(map, "start_prefixes", &mut joined);
    parsing.prefixes = split_prefixes(&joined);

    let processing = &mut settings.processing;
    merge_key(map, "remove_zeros", &mut processing.remove_leading_zeros);
    merge_key(map, "reverse_string", &mut processing.reverse_output);
    merge_key(map, "filter_digits", &mut processing.filter_digits_only);

    merge_key(map, "refresh_rate", &mut settings.refresh_rate);

    for key in map.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!("Ignoring unknown settings key '{}'", key);
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "port",
    "baudrate",
    "databits",
    "parity",
    "stopbits",
    "flowcontrol",
    "enable_parsing",
    "start_of_text_ascii",
    "end_of_text_ascii",
    "start_prefixes",
    "expected_data_length",
    "trimming_mode",
    "start_index",
    "remove_zeros",
    "reverse_string",
    "filter_digits",
    "refresh_rate",
];

fn merge_key<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, slot: &mut T) {
    let Some(raw) = map.get(key) else {
        return;
    };
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => *slot = value,
        Err(e) => warn!("Keeping default for settings key '{}': {}", key, e),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
