//! Consumer-facing reading façade
//!
//! [`ReadingPublisher`] ties the device reader, the framer and the decoder
//! together. The caller drives it by calling [`ReadingPublisher::pump`] at the
//! configured refresh interval; every decoded frame, warning and connection
//! status change is pushed to subscribers as a [`ReadingEvent`].

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::device::{ByteChannel, ByteStreamReader, DeviceError};
use crate::framing::{decode, DecodeWarning, FrameExtractor};
use crate::settings::{ConnectionParams, ParsingConfig, ProcessingConfig, Settings};

/// Notification pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadingEvent {
    /// One decoded frame, in arrival order
    Frame {
        /// Decoded text
        text: String,
    },
    /// Connection or reading state change
    Status {
        /// Human-readable message
        message: String,
        /// Set for failures
        is_error: bool,
    },
    /// Advisory raised while decoding a frame
    Warning {
        /// The advisory
        warning: DecodeWarning,
    },
}

impl ReadingEvent {
    fn status(message: impl Into<String>) -> Self {
        ReadingEvent::Status {
            message: message.into(),
            is_error: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ReadingEvent::Status {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Turns the raw indicator byte stream into published readings
pub struct ReadingPublisher {
    reader: ByteStreamReader,
    extractor: FrameExtractor,
    parsing: ParsingConfig,
    processing: ProcessingConfig,
    latest_reading: f64,
    latest_text: Option<String>,
    subscribers: Vec<Sender<ReadingEvent>>,
    fault_tx: Sender<DeviceError>,
    fault_rx: Receiver<DeviceError>,
}

impl Default for ReadingPublisher {
    fn default() -> Self {
        Self::new(ParsingConfig::default(), ProcessingConfig::default())
    }
}

impl ReadingPublisher {
    /// Disconnected publisher using the given decoding settings
    pub fn new(parsing: ParsingConfig, processing: ProcessingConfig) -> Self {
        let (fault_tx, fault_rx) = mpsc::channel();
        Self {
            reader: ByteStreamReader::new(),
            extractor: FrameExtractor::new(),
            parsing,
            processing,
            latest_reading: 0.0,
            latest_text: None,
            subscribers: Vec::new(),
            fault_tx,
            fault_rx,
        }
    }

    /// Publisher using the parsing and processing parts of `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.parsing.clone(), settings.processing)
    }

    /// Register a new listener. Events published before this call are not replayed.
    pub fn subscribe(&mut self) -> Receiver<ReadingEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: ReadingEvent) {
        // Receivers that were dropped are forgotten
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Open the serial port. Connecting while connected keeps the current link.
    pub fn connect(&mut self, params: &ConnectionParams) -> Result<(), DeviceError> {
        if self.is_connected() {
            debug!("connect() while already connected to {:?}", self.reader.port_name());
            return Ok(());
        }

        match self.reader.open(params) {
            Ok(()) => {
                self.extractor.reset();
                self.publish(ReadingEvent::status(format!(
                    "Connected to {} at {} baud.",
                    params.port, params.baud_rate
                )));
                Ok(())
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", params.port, e);
                let message = match &e {
                    DeviceError::ConnectionFailed { port, .. } => {
                        format!("Failed to connect to {}.", port)
                    }
                    DeviceError::Unsupported(_) => format!("Invalid setting value: {}", e),
                    other => format!("Connection error: {}", other),
                };
                self.publish(ReadingEvent::error(message));
                Err(e)
            }
        }
    }

    /// Connect to an already-open byte source such as a [`SimulatedIndicator`](crate::device::SimulatedIndicator)
    pub fn connect_channel(&mut self, name: &str, channel: Box<dyn ByteChannel>) {
        if self.is_connected() {
            debug!("connect_channel() while already connected");
            return;
        }
        self.reader.open_channel(name, channel);
        self.extractor.reset();
        self.publish(ReadingEvent::status(format!("Connected to {}.", name)));
    }

    /// Stop reading and close the port
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        self.reader.close();
        self.extractor.reset();
        self.publish(ReadingEvent::status("Disconnected."));
    }

    /// Start the background read thread
    pub fn start_reading(&mut self) -> Result<(), DeviceError> {
        if !self.is_connected() {
            self.publish(ReadingEvent::error("Not connected to a serial port."));
            return Err(DeviceError::NotConnected);
        }
        if self.is_reading() {
            return Ok(());
        }

        // Faults left over from a previous run are stale
        while self.fault_rx.try_recv().is_ok() {}

        let fault_tx = self.fault_tx.clone();
        match self.reader.start(move |e| {
            let _ = fault_tx.send(e);
        }) {
            Ok(()) => {
                self.publish(ReadingEvent::status("Started reading data."));
                Ok(())
            }
            Err(e) => {
                self.publish(ReadingEvent::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stop the background read thread, keeping the port open
    pub fn stop_reading(&mut self) {
        if !self.is_reading() {
            return;
        }
        self.reader.stop();
        self.publish(ReadingEvent::status("Stopped reading data."));
    }

    /// A device is attached
    pub fn is_connected(&self) -> bool {
        self.reader.is_open()
    }

    /// False again once the read loop ends on a device fault
    pub fn is_reading(&self) -> bool {
        self.reader.is_running()
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Take every byte queued by the read thread without blocking
    pub fn drain(&mut self) -> Vec<u8> {
        self.reader.inbox().drain()
    }

    /// Drain, frame and decode pending bytes, publishing the results.
    ///
    /// Returns the number of frames published.
    pub fn pump(&mut self) -> usize {
        let bytes = self.drain();
        let frames = self.extractor.extract(&bytes, &self.parsing);

        for raw in &frames {
            let decoded = decode(raw, &self.parsing, &self.processing);

            for warning in decoded.warnings.iter().cloned() {
                warn!("{}", warning);
                self.publish(ReadingEvent::Warning { warning });
            }

            match decoded.numeric_value() {
                Some(value) => self.latest_reading = value,
                None => debug!("Frame '{}' is not numeric, keeping last reading", decoded.text),
            }
            self.latest_text = Some(decoded.text.clone());
            self.publish(ReadingEvent::Frame { text: decoded.text });
        }

        self.report_faults();
        frames.len()
    }

    fn report_faults(&mut self) {
        while let Ok(fault) = self.fault_rx.try_recv() {
            info!("Read loop stopped after device fault");
            self.publish(ReadingEvent::error(fault.to_string()));
        }
    }

    /// Most recent numeric reading, 0.0 until one arrives
    pub fn latest_reading(&self) -> f64 {
        self.latest_reading
    }

    /// Text of the most recent decoded frame, numeric or not
    pub fn latest_text(&self) -> Option<&str> {
        self.latest_text.as_deref()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Current framing and trimming parameters
    pub fn parsing(&self) -> &ParsingConfig {
        &self.parsing
    }

    /// Current post-trimming transforms
    pub fn processing(&self) -> &ProcessingConfig {
        &self.processing
    }

    /// Replace the framing and trimming parameters used by later pumps
    pub fn update_parsing(&mut self, parsing: ParsingConfig) {
        if parsing.start_delimiter == parsing.end_delimiter && parsing.enabled {
            warn!(
                "Start and end delimiter are both {}, no frame can be extracted",
                parsing.start_delimiter
            );
        }
        self.parsing = parsing;
        self.publish(ReadingEvent::status("Parsing parameters updated."));
    }

    /// Replace the post-trimming transforms used by later pumps
    pub fn update_processing(&mut self, processing: ProcessingConfig) {
        self.processing = processing;
        self.publish(ReadingEvent::status("Data processing settings updated."));
    }
}

impl Drop for ReadingPublisher {
    fn drop(&mut self) {
        self.reader.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Read};
    use std::thread;
    use std::time::{Duration, Instant};

    struct Replay {
        chunks: VecDeque<Vec<u8>>,
        fail_at_end: bool,
    }

    impl Replay {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                fail_at_end: false,
            }
        }
    }

    impl Read for Replay {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None if self.fail_at_end => Err(io::Error::new(ErrorKind::BrokenPipe, "cable pulled")),
                None => Ok(0),
            }
        }
    }

    impl ByteChannel for Replay {
        fn bytes_to_read(&mut self) -> io::Result<u32> {
            Ok(self.chunks.front().map_or(0, |c| c.len() as u32))
        }

        fn clear_input(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pump_until(publisher: &mut ReadingPublisher, frames: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut total = 0;
        while total < frames && Instant::now() < deadline {
            total += publisher.pump();
            thread::sleep(Duration::from_millis(5));
        }
        total
    }

    fn no_length_check() -> ParsingConfig {
        ParsingConfig {
            expected_length: 0,
            ..ParsingConfig::default()
        }
    }

    #[test]
    fn test_start_reading_requires_connection() {
        let mut publisher = ReadingPublisher::default();
        let events = publisher.subscribe();
        assert!(matches!(publisher.start_reading(), Err(DeviceError::NotConnected)));
        assert_eq!(
            events.try_recv().unwrap(),
            ReadingEvent::error("Not connected to a serial port.")
        );
    }

    #[test]
    fn test_connect_rejects_placeholder_port() {
        let mut publisher = ReadingPublisher::default();
        let events = publisher.subscribe();
        let result = publisher.connect(&ConnectionParams::default());
        assert!(matches!(result, Err(DeviceError::NoPortSelected)));
        assert!(!publisher.is_connected());
        match events.try_recv().unwrap() {
            ReadingEvent::Status { is_error, .. } => assert!(is_error),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_frames_and_reading_published() {
        let mut publisher = ReadingPublisher::new(no_length_check(), ProcessingConfig::default());
        let events = publisher.subscribe();
        publisher.connect_channel("replay", Box::new(Replay::new(&[b"[8001", b"250][S4", b"5]"])));
        publisher.start_reading().unwrap();

        assert_eq!(pump_until(&mut publisher, 2), 2);
        publisher.stop_reading();
        publisher.disconnect();

        let frames: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                ReadingEvent::Frame { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec!["8001250", "S45"]);
        // "S45" is not numeric, so the last good reading stays
        assert_eq!(publisher.latest_reading(), 8001250.0);
        assert_eq!(publisher.latest_text(), Some("S45"));
    }

    #[test]
    fn test_device_fault_becomes_error_status() {
        let mut device = Replay::new(&[b"[8000010]"]);
        device.fail_at_end = true;

        let mut publisher = ReadingPublisher::default();
        let events = publisher.subscribe();
        publisher.connect_channel("replay", Box::new(device));
        publisher.start_reading().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while publisher.is_reading() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        publisher.pump();

        let statuses: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                ReadingEvent::Status { message, is_error: true } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].contains("cable pulled"));
        assert!(!publisher.is_reading());
        assert!(publisher.is_connected());
        assert_eq!(publisher.latest_reading(), 8000010.0);
    }

    #[test]
    fn test_publish_without_subscriber_is_noop() {
        let mut publisher = ReadingPublisher::default();
        publisher.update_processing(ProcessingConfig {
            remove_leading_zeros: true,
            ..ProcessingConfig::default()
        });
        assert!(publisher.processing().remove_leading_zeros);

        let rx = publisher.subscribe();
        drop(rx);
        publisher.update_parsing(no_length_check());
        assert!(publisher.subscribers.is_empty());
    }
}
