//! Delimiter-based frame extraction

use tracing::{trace, warn};

use crate::settings::ParsingConfig;

/// Accumulator size beyond which buffered bytes are considered line garbage
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Decode bytes as UTF-8, silently dropping invalid sequences
pub fn decode_text(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    // Truncated sequence at the very end
                    None => return out,
                }
            }
        }
    }
}

/// Stateful framer holding bytes that do not form a complete frame yet
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buffer: Vec<u8>,
}

impl FrameExtractor {
    /// Framer with an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `new_bytes` and return every frame completed by them, in order.
    ///
    /// With parsing disabled the whole accumulator is returned as one
    /// pseudo-frame and cleared.
    pub fn extract(&mut self, new_bytes: &[u8], config: &ParsingConfig) -> Vec<String> {
        self.buffer.extend_from_slice(new_bytes);

        if !config.enabled {
            if self.buffer.is_empty() {
                return Vec::new();
            }
            let text = decode_text(&self.buffer);
            self.buffer.clear();
            return vec![text];
        }

        let start_byte = config.start_delimiter;
        let end_byte = config.end_delimiter;
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_byte(&self.buffer, start_byte, 0) else {
                break;
            };
            match find_byte(&self.buffer, end_byte, start) {
                Some(end) if start < end => {
                    let frame = decode_text(&self.buffer[start + 1..end]);
                    trace!("Extracted frame '{}'", frame);
                    frames.push(frame);
                    self.buffer.drain(..=end);
                }
                _ => break,
            }
        }

        // Nothing ahead of the first start byte can become part of a frame
        if let Some(start) = find_byte(&self.buffer, start_byte, 0) {
            self.buffer.drain(..start);
        }
        if self.buffer.len() > MAX_PENDING_BYTES {
            warn!(
                "Discarding {} buffered bytes without a complete frame",
                self.buffer.len()
            );
            self.buffer.clear();
        }

        frames
    }

    /// Bytes carried over to the next call
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Forget any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ParsingConfig {
        ParsingConfig::default()
    }

    #[test]
    fn test_extracts_consecutive_frames() {
        let mut extractor = FrameExtractor::new();
        let frames = extractor.extract(b"[8ABC123]noise[S45]", &config());
        assert_eq!(frames, vec!["8ABC123", "S45"]);
        assert!(extractor.pending().is_empty());
    }

    #[test]
    fn test_dangling_start_is_deferred() {
        let mut extractor = FrameExtractor::new();
        let frames = extractor.extract(b"junk[8001", &config());
        assert!(frames.is_empty());
        assert_eq!(extractor.pending(), b"[8001");

        let frames = extractor.extract(b"234]", &config());
        assert_eq!(frames, vec!["8001234"]);
        assert!(extractor.pending().is_empty());
    }

    #[test]
    fn test_end_before_start_is_skipped() {
        let mut extractor = FrameExtractor::new();
        let frames = extractor.extract(b"12]34[56]", &config());
        assert_eq!(frames, vec!["56"]);
    }

    #[test]
    fn test_empty_frame() {
        let mut extractor = FrameExtractor::new();
        assert_eq!(extractor.extract(b"[]", &config()), vec![""]);
    }

    #[test]
    fn test_same_start_and_end_delimiter_never_frames() {
        let config = ParsingConfig {
            start_delimiter: b'|',
            end_delimiter: b'|',
            ..ParsingConfig::default()
        };
        let mut extractor = FrameExtractor::new();
        assert!(extractor.extract(b"|123|456|", &config).is_empty());
    }

    #[test]
    fn test_raw_mode_passes_buffer_through() {
        let config = ParsingConfig {
            enabled: false,
            ..ParsingConfig::default()
        };
        let mut extractor = FrameExtractor::new();
        assert_eq!(extractor.extract(b"[ST,GS 12.5kg]\r\n", &config), vec!["[ST,GS 12.5kg]\r\n"]);
        assert!(extractor.pending().is_empty());
        assert!(extractor.extract(b"", &config).is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let mut extractor = FrameExtractor::new();
        let frames = extractor.extract(b"[8\xff12\xc3]", &config());
        assert_eq!(frames, vec!["812"]);
        assert_eq!(decode_text(b"a\xe2\x82b"), "ab");
        assert_eq!(decode_text("é".as_bytes()), "é");
    }

    #[test]
    fn test_garbage_without_start_is_capped() {
        let mut extractor = FrameExtractor::new();
        let garbage = vec![b'x'; MAX_PENDING_BYTES + 1];
        assert!(extractor.extract(&garbage, &config()).is_empty());
        assert!(extractor.pending().is_empty());
    }

    #[test]
    fn test_reset_forgets_partial_frame() {
        let mut extractor = FrameExtractor::new();
        extractor.extract(b"[8000", &config());
        extractor.reset();
        assert!(extractor.extract(b"1]", &config()).is_empty());
    }
}
