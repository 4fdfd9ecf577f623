//! Device errors

use thiserror::Error;

/// Errors raised while opening or reading a weighing indicator
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Port name is empty or the placeholder
    #[error("No serial port selected")]
    NoPortSelected,

    /// The OS refused to open or configure the port
    #[error("Failed to connect to {port}: {reason}")]
    ConnectionFailed {
        /// Port that was being opened
        port: String,
        /// Error reported by the serial layer
        reason: String,
    },

    /// Setting the serial layer cannot express
    #[error("Unsupported serial setting: {0}")]
    Unsupported(String),

    /// Operation needs an open device
    #[error("Not connected to a serial port")]
    NotConnected,

    /// Read or write failure on an open device
    #[error("Serial read error: {0}")]
    Io(#[from] std::io::Error),
}
