//! # WeighLink Core Library
//!
//! Reads a weighing indicator over a serial link and turns its raw byte
//! stream into validated weight readings.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//!
//! This library provides:
//! - Serial port discovery and a background byte reader
//! - Delimiter-based frame extraction with carry-over between reads
//! - Configurable frame trimming, cleanup and length validation
//! - A publisher that pushes decoded frames, warnings and status to listeners
//! - Flat JSON settings persistence
//! - Tare/gross capture on weighing tickets
//! - A simulated indicator for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use weighlink_core::prelude::*;
//!
//! let store = ConfigurationStore::default();
//! let settings = store.load();
//!
//! let mut publisher = ReadingPublisher::from_settings(&settings);
//! let events = publisher.subscribe();
//! publisher.connect(&settings.connection)?;
//! publisher.start_reading()?;
//!
//! loop {
//!     publisher.pump();
//!     for event in events.try_iter() {
//!         println!("{:?}", event);
//!     }
//!     std::thread::sleep(settings.refresh_rate.interval());
//! }
//! ```

pub mod capture;
pub mod device;
pub mod framing;
pub mod publisher;
pub mod settings;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capture::{
        CaptureError, MemoryTransactionRepository, TicketStatus, TransactionRepository,
        WeighingCapture, WeighingTicket, WeightKind,
    };
    pub use crate::device::{list_ports, DeviceError, PortInfo, SimulatedIndicator};
    pub use crate::framing::{decode, DecodeWarning, DecodedFrame, FrameExtractor};
    pub use crate::publisher::{ReadingEvent, ReadingPublisher};
    pub use crate::settings::{
        ConfigurationStore, ConnectionParams, ParsingConfig, ProcessingConfig, RefreshRate,
        Settings, TrimmingMode,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
