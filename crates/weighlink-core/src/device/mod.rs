//! Weighing indicator I/O
//!
//! Opens the serial link to the indicator and moves incoming bytes from a
//! dedicated read thread into an inbox channel drained by the publisher.

mod channel;
mod error;
mod reader;
pub mod serial;
pub mod simulator;

pub use channel::{ByteChannel, SerialChannel};
pub use error::DeviceError;
pub use reader::{ByteStreamReader, Inbox};
pub use serial::{list_ports, open_port, port_names, preferred_port, PortInfo};
pub use simulator::SimulatedIndicator;

/// Default baud rate for weighing indicators
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Read timeout applied to the serial handle, bounds how long `stop()` can wait
pub const READ_TIMEOUT_MS: u64 = 100;

/// Chunk size requested when the device reports no pending byte count
pub const READ_CHUNK_SIZE: usize = 4096;

/// Placeholder shown when no serial port is available
pub const NO_PORTS_FOUND: &str = "No Ports Found";
