//! Frame content pipeline
//!
//! Order is fixed: trim → filter digits → remove leading zeros → reverse →
//! length check. Filtering first means the later steps only ever see a clean
//! numeric string.

use serde::Serialize;
use std::fmt;

use crate::settings::{ParsingConfig, ProcessingConfig, TrimmingMode};

/// Advisory raised while decoding a frame. The frame is still published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// Final text length differs from the configured expected length
    LengthMismatch {
        /// Decoded text
        text: String,
        /// Its length in characters
        actual: usize,
        /// Configured length
        expected: usize,
    },
    /// None of the configured prefixes occurs in the frame
    PrefixNotFound {
        /// Frame as received
        frame: String,
        /// Prefixes searched for
        prefixes: Vec<String>,
    },
    /// Configured start index lies outside the frame
    InvalidStartIndex {
        /// Frame as received
        frame: String,
        /// Configured start index
        index: usize,
    },
}

impl DecodeWarning {
    /// Stable identifier of the warning kind
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeWarning::LengthMismatch { .. } => "length_mismatch",
            DecodeWarning::PrefixNotFound { .. } => "prefix_not_found",
            DecodeWarning::InvalidStartIndex { .. } => "invalid_start_index",
        }
    }
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::LengthMismatch {
                text,
                actual,
                expected,
            } => write!(
                f,
                "Packet '{}' length ({}) != expected length ({})",
                text, actual, expected
            ),
            DecodeWarning::PrefixNotFound { frame, prefixes } => write!(
                f,
                "Packet '{}' does not contain any of the expected prefixes: {}. Processing original packet",
                frame,
                prefixes.join(", ")
            ),
            DecodeWarning::InvalidStartIndex { frame, index } => write!(
                f,
                "Invalid start index {} for packet '{}'. Processing original packet",
                index, frame
            ),
        }
    }
}

/// Result of decoding one raw frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedFrame {
    /// Text after trimming and processing
    pub text: String,
    /// Advisories raised on the way, in pipeline order
    pub warnings: Vec<DecodeWarning>,
}

impl DecodedFrame {
    /// Parse the text as a reading. Only finite numbers count.
    pub fn numeric_value(&self) -> Option<f64> {
        self.text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// Decode one raw frame. Always yields exactly one [`DecodedFrame`].
pub fn decode(raw: &str, parsing: &ParsingConfig, processing: &ProcessingConfig) -> DecodedFrame {
    let mut warnings = Vec::new();

    let trimmed = trim(raw, parsing, &mut warnings);
    let mut text = trimmed.to_string();

    if processing.filter_digits_only {
        text = filter_digits_only(&text);
    }
    if processing.remove_leading_zeros {
        text = remove_leading_zeros(&text);
    }
    if processing.reverse_output {
        text = text.chars().rev().collect();
    }

    let actual = text.chars().count();
    if parsing.expected_length > 0 && actual != parsing.expected_length {
        warnings.push(DecodeWarning::LengthMismatch {
            text: text.clone(),
            actual,
            expected: parsing.expected_length,
        });
    }

    DecodedFrame { text, warnings }
}

fn trim<'a>(raw: &'a str, parsing: &ParsingConfig, warnings: &mut Vec<DecodeWarning>) -> &'a str {
    match parsing.trimming_mode {
        TrimmingMode::None => raw,
        // An empty prefix list leaves prefix trimming switched off
        TrimmingMode::Prefix if parsing.prefixes.is_empty() => raw,
        TrimmingMode::Prefix => match earliest_prefix(raw, &parsing.prefixes) {
            Some(idx) => &raw[idx..],
            None => {
                warnings.push(DecodeWarning::PrefixNotFound {
                    frame: raw.to_string(),
                    prefixes: parsing.prefixes.clone(),
                });
                raw
            }
        },
        TrimmingMode::Index => match raw.char_indices().nth(parsing.start_index) {
            Some((byte_idx, _)) => &raw[byte_idx..],
            None => {
                warnings.push(DecodeWarning::InvalidStartIndex {
                    frame: raw.to_string(),
                    index: parsing.start_index,
                });
                raw
            }
        },
    }
}

/// Byte offset of the earliest prefix occurrence; equal offsets prefer the longer prefix
fn earliest_prefix(raw: &str, prefixes: &[String]) -> Option<usize> {
    prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .filter_map(|p| raw.find(p.as_str()).map(|idx| (idx, p.len())))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(idx, _)| idx)
}

/// Keep only ASCII digits and the first decimal point
pub fn filter_digits_only(text: &str) -> String {
    let mut seen_point = false;
    text.chars()
        .filter(|&c| {
            if c.is_ascii_digit() {
                true
            } else if c == '.' && !seen_point {
                seen_point = true;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Strip leading zeros from the integer part, keeping a lone "0" before a point
pub fn remove_leading_zeros(text: &str) -> String {
    match text.split_once('.') {
        Some(("0", fraction)) => format!("0.{}", fraction),
        Some((integer, fraction)) => format!("{}.{}", integer.trim_start_matches('0'), fraction),
        None => {
            let stripped = text.trim_start_matches('0');
            if stripped.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            }
        }
    }
}
