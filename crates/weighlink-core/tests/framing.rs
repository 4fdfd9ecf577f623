use pretty_assertions::assert_eq;
use std::io::Read;
use weighlink_core::device::SimulatedIndicator;
use weighlink_core::framing::{decode, FrameExtractor};
use weighlink_core::settings::{ParsingConfig, ProcessingConfig, TrimmingMode};

const STREAM: &[u8] = b"\r\n]junk[8ABC123]noise[S45][][8001250]\x00tail[8";

fn parsing() -> ParsingConfig {
    ParsingConfig {
        expected_length: 0,
        ..ParsingConfig::default()
    }
}

fn extract_all(chunks: &[&[u8]], config: &ParsingConfig) -> (Vec<String>, Vec<u8>) {
    let mut extractor = FrameExtractor::new();
    let mut frames = Vec::new();
    for chunk in chunks {
        frames.extend(extractor.extract(chunk, config));
    }
    (frames, extractor.pending().to_vec())
}

#[test]
fn test_split_invariance_at_every_offset() {
    let config = parsing();
    let (whole, whole_pending) = extract_all(&[STREAM], &config);
    assert_eq!(whole, vec!["8ABC123", "S45", "", "8001250"]);
    assert_eq!(whole_pending, b"[8".to_vec());

    for split in 0..=STREAM.len() {
        let (head, tail) = STREAM.split_at(split);
        let (frames, pending) = extract_all(&[head, tail], &config);
        assert_eq!(frames, whole, "split at {split}");
        assert_eq!(pending, whole_pending, "split at {split}");
    }
}

#[test]
fn test_split_invariance_byte_by_byte() {
    let config = parsing();
    let chunks: Vec<&[u8]> = STREAM.chunks(1).collect();
    let (frames, _) = extract_all(&chunks, &config);
    assert_eq!(frames, extract_all(&[STREAM], &config).0);
}

#[test]
fn test_end_to_end_prefix_trimming() {
    let config = parsing();
    let mut extractor = FrameExtractor::new();
    let decoded: Vec<String> = extractor
        .extract(b"[8ABC123]noise[S45]", &config)
        .iter()
        .map(|raw| decode(raw, &config, &ProcessingConfig::default()))
        .inspect(|frame| assert!(frame.warnings.is_empty()))
        .map(|frame| frame.text)
        .collect();
    assert_eq!(decoded, vec!["8ABC123", "S45"]);
}

#[test]
fn test_start_without_end_waits_for_more_bytes() {
    let config = parsing();
    let mut extractor = FrameExtractor::new();
    assert!(extractor.extract(b"xx[80012", &config).is_empty());
    assert_eq!(extractor.pending(), b"[80012");
    assert_eq!(extractor.extract(b"50]", &config), vec!["8001250"]);
    assert!(extractor.pending().is_empty());
}

#[test]
fn test_raw_mode_publishes_verbatim() {
    let config = ParsingConfig {
        enabled: false,
        ..parsing()
    };
    let mut extractor = FrameExtractor::new();
    let frames = extractor.extract("ST,GS,+0012.5kg [ñ]".as_bytes(), &config);
    assert_eq!(frames, vec!["ST,GS,+0012.5kg [ñ]"]);
    assert!(extractor.pending().is_empty());
    assert!(extractor.extract(b"", &config).is_empty());
}

#[test]
fn test_custom_delimiters() {
    let config = ParsingConfig {
        start_delimiter: 0x02,
        end_delimiter: 0x03,
        ..parsing()
    };
    let mut extractor = FrameExtractor::new();
    assert_eq!(
        extractor.extract(b"\x02S 12.5\x03\r\n\x02S 12.6\x03", &config),
        vec!["S 12.5", "S 12.6"]
    );
}

#[test]
fn test_simulated_indicator_stream_decodes_to_weights() {
    let mut sim = SimulatedIndicator::seeded(42)
        .with_target_weight(12_480.0)
        .with_jitter(0.0)
        .with_noise(true);

    let config = ParsingConfig {
        trimming_mode: TrimmingMode::Index,
        start_index: 3,
        expected_length: 0,
        ..ParsingConfig::default()
    };
    let processing = ProcessingConfig {
        remove_leading_zeros: true,
        ..ProcessingConfig::default()
    };

    let mut extractor = FrameExtractor::new();
    let mut weights = Vec::new();
    let mut buf = [0u8; 16];
    for _ in 0..2_000 {
        let n = sim.read(&mut buf).unwrap();
        for raw in extractor.extract(&buf[..n], &config) {
            let decoded = decode(&raw, &config, &processing);
            assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
            weights.push(decoded.numeric_value().unwrap());
        }
    }

    assert!(weights.len() > 10);
    assert_eq!(weights.last().copied(), Some(12_480.0));
}
