//! Background byte reader
//!
//! One thread per open connection pulls bytes off the device and pushes each
//! non-empty chunk into the [`Inbox`]. The consumer drains the inbox from its
//! own thread; nothing else is shared between the two.

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{open_port, ByteChannel, DeviceError, SerialChannel, READ_CHUNK_SIZE};
use crate::settings::ConnectionParams;

/// Pause between reads when the device had nothing for us
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Upper bound on how long `stop()` waits for the read thread
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

type SharedChannel = Arc<Mutex<Box<dyn ByteChannel>>>;

/// Hand-off queue between the read thread and the consumer
pub struct Inbox {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl Default for Inbox {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Inbox {
    fn sender(&self) -> Sender<Vec<u8>> {
        self.tx.clone()
    }

    /// Pop and concatenate every queued chunk without blocking
    pub fn drain(&self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Drop everything queued so far
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// Owns the device connection and its read thread
pub struct ByteStreamReader {
    channel: Option<SharedChannel>,
    port_name: Option<String>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    inbox: Inbox,
}

impl Default for ByteStreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStreamReader {
    /// Reader with no device attached
    pub fn new() -> Self {
        Self {
            channel: None,
            port_name: None,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            inbox: Inbox::default(),
        }
    }

    /// Open the serial port described by `params`.
    ///
    /// Already being open is not an error; the existing connection is kept.
    pub fn open(&mut self, params: &ConnectionParams) -> Result<(), DeviceError> {
        if self.is_open() {
            info!("Port is already open");
            return Ok(());
        }
        let port = open_port(params)?;
        self.attach(params.port.clone(), Box::new(SerialChannel::new(port)));
        Ok(())
    }

    /// Use an already-open byte source instead of a serial port
    pub fn open_channel(&mut self, name: impl Into<String>, channel: Box<dyn ByteChannel>) {
        if self.is_open() {
            info!("Port is already open");
            return;
        }
        self.attach(name.into(), channel);
    }

    fn attach(&mut self, name: String, channel: Box<dyn ByteChannel>) {
        info!("Connected to {}", name);
        self.port_name = Some(name);
        self.channel = Some(Arc::new(Mutex::new(channel)));
    }

    /// Stop reading and release the device. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.stop();
        if self.channel.take().is_some() {
            info!(
                "Disconnected from {}",
                self.port_name.as_deref().unwrap_or("serial port")
            );
        }
        self.port_name = None;
    }

    /// True between a successful open and `close()`
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// True while the read thread is alive and has not hit a device fault
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Name of the attached device, if any
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Queue the read thread pushes chunks into
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Spawn the read thread.
    ///
    /// `on_error` runs on the read thread if the device fails; the loop ends
    /// right after and does not reconnect. Every loop gets its own running
    /// flag, so a loop that `stop()` gave up waiting on can never be revived
    /// by a later start.
    pub fn start<F>(&mut self, on_error: F) -> Result<(), DeviceError>
    where
        F: FnOnce(DeviceError) + Send + 'static,
    {
        let Some(channel) = self.channel.clone() else {
            return Err(DeviceError::NotConnected);
        };
        if self.is_running() {
            return Ok(());
        }
        // A previous loop that ended on its own still has a handle to reap
        if let Some(stale) = self.handle.take() {
            let _ = stale.join();
        }

        self.inbox.clear();
        if let Err(e) = lock_channel(&channel).clear_input() {
            warn!("Could not discard stale input: {}", e);
        }
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);
        let tx = self.inbox.sender();
        let spawned = thread::Builder::new()
            .name("weighlink-reader".to_string())
            .spawn(move || read_loop(channel, running, tx, on_error));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("Serial reading thread started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(DeviceError::Io(e))
            }
        }
    }

    /// Ask the read thread to finish and wait for it, bounded by a short timeout
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("Serial read thread panicked");
            }
        } else {
            warn!(
                "Serial read thread did not terminate within {}ms",
                JOIN_TIMEOUT.as_millis()
            );
        }
        info!("Serial reading thread stopped");
    }
}

impl Drop for ByteStreamReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_channel(channel: &SharedChannel) -> MutexGuard<'_, Box<dyn ByteChannel>> {
    // A panic on the read thread poisons the lock but leaves the port usable
    channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_available(channel: &mut dyn ByteChannel, buf: &mut Vec<u8>) -> io::Result<usize> {
    let pending = channel.bytes_to_read()? as usize;
    let want = if pending == 0 { READ_CHUNK_SIZE } else { pending };
    if buf.len() < want {
        buf.resize(want, 0);
    }
    channel.read(&mut buf[..want])
}

fn read_loop<F>(channel: SharedChannel, running: Arc<AtomicBool>, tx: Sender<Vec<u8>>, on_error: F)
where
    F: FnOnce(DeviceError),
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    while running.load(Ordering::Acquire) {
        let result = {
            let mut guard = lock_channel(&channel);
            read_available(&mut **guard, &mut buf)
        };

        match result {
            Ok(0) => thread::sleep(IDLE_SLEEP),
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    debug!("Inbox closed, ending read loop");
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                thread::sleep(IDLE_SLEEP);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                error!("Serial port error during read: {}", e);
                // Report before clearing the flag so a stopped loop always has its fault queued
                on_error(DeviceError::Io(e));
                running.store(false, Ordering::Release);
                return;
            }
        }
    }

    running.store(false, Ordering::Release);
}
