use serialport::SerialPort;
use std::io::{self, Read};

/// Byte source the read loop pulls from (a serial port, or a stand-in)
pub trait ByteChannel: Read + Send {
    /// Get number of bytes available to read
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Discard anything buffered but not yet read
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing ByteChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl ByteChannel for SerialChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
