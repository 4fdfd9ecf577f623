//! Reader settings
//!
//! Typed connection, parsing and processing parameters for a weighing
//! indicator, plus the flat JSON store that persists them between sessions.

mod store;

pub use store::{default_settings_path, merge_flat, to_flat, ConfigurationStore, SETTINGS_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::device::{DEFAULT_BAUD_RATE, NO_PORTS_FOUND};

/// Serial parity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "None",
            Parity::Even => "Even",
            Parity::Odd => "Odd",
            Parity::Mark => "Mark",
            Parity::Space => "Space",
        };
        f.write_str(name)
    }
}

/// Number of data bits per character.
///
/// Persisted as the plain number (`7` or `8`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 7 data bits
    Seven,
    /// 8 data bits
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("unsupported data bits: {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Number of stop bits.
///
/// Persisted as a float (`1.0`, `1.5` or `2.0`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 1.5 stop bits
    OnePointFive,
    /// 2 stop bits
    Two,
}

impl TryFrom<f64> for StopBits {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(StopBits::One)
        } else if value == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if value == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(format!("unsupported stop bits: {}", value))
        }
    }
}

impl From<StopBits> for f64 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

/// Parameters used to open the serial link to the indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Bits per character
    pub data_bits: DataBits,
    /// Parity checking
    pub parity: Parity,
    /// Stop bits per character
    pub stop_bits: StopBits,
    /// Hardware (RTS/CTS) flow control
    pub flow_control: bool,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: NO_PORTS_FOUND.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: false,
        }
    }
}

/// How leading content is dropped from a frame before processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimmingMode {
    /// Keep the frame as is
    None,
    /// Start at the earliest configured prefix
    #[default]
    Prefix,
    /// Start at a fixed character index
    Index,
}

/// Framing and trimming parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// When false, buffered bytes are passed through as text without framing
    pub enabled: bool,
    /// Byte opening a frame
    pub start_delimiter: u8,
    /// Byte closing a frame
    pub end_delimiter: u8,
    /// How leading content is dropped
    pub trimming_mode: TrimmingMode,
    /// Markers searched for in prefix mode
    pub prefixes: Vec<String>,
    /// Character index used in index mode
    pub start_index: usize,
    /// Expected decoded length, 0 disables the check
    pub expected_length: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delimiter: b'[',
            end_delimiter: b']',
            trimming_mode: TrimmingMode::Prefix,
            prefixes: vec!["8".to_string(), "S".to_string()],
            start_index: 0,
            expected_length: 7,
        }
    }
}

impl ParsingConfig {
    /// Prefix list as stored in the settings file ("8,S")
    pub fn prefixes_joined(&self) -> String {
        self.prefixes.join(",")
    }

    /// Replace the prefix list from a comma-separated string, dropping blanks
    pub fn set_prefixes_from_str(&mut self, joined: &str) {
        self.prefixes = split_prefixes(joined);
    }
}

/// Split a comma-separated prefix list, trimming entries and dropping empty ones
pub fn split_prefixes(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Post-trimming text transforms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Strip zeros in front of the first significant digit
    pub remove_leading_zeros: bool,
    /// Reverse the character order, for indicators that send it backwards
    pub reverse_output: bool,
    /// Keep ASCII digits and the first decimal point only
    pub filter_digits_only: bool,
}

/// Display polling speed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshRate {
    /// Every 500 ms
    Slow,
    /// Every 100 ms
    #[default]
    Normal,
    /// Every 10 ms
    Speed,
}

impl RefreshRate {
    /// Interval between two `pump()` calls
    pub fn interval(self) -> Duration {
        match self {
            RefreshRate::Slow => Duration::from_millis(500),
            RefreshRate::Normal => Duration::from_millis(100),
            RefreshRate::Speed => Duration::from_millis(10),
        }
    }
}

/// Everything the reader persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Serial line settings
    pub connection: ConnectionParams,
    /// Framing and trimming
    pub parsing: ParsingConfig,
    /// Text transforms
    pub processing: ProcessingConfig,
    /// Display polling speed
    pub refresh_rate: RefreshRate,
}
