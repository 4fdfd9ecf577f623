//! Simulated weighing indicator
//!
//! Produces the same kind of byte stream a real indicator sends over RS-232
//! so the reader can be exercised without hardware. Each frame looks like
//! `[gs8001234]`: a status header, the `8` marker and a zero-padded weight in
//! kilograms. Frames can be separated by line noise and are handed out in
//! randomly sized chunks, so frames regularly straddle two reads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use super::ByteChannel;

const NOISE_BYTES: &[u8] = b"\r\n\x00?#~ ";

/// Software stand-in for a serial weighing indicator
pub struct SimulatedIndicator {
    rng: StdRng,
    pending: VecDeque<u8>,
    /// Weight the simulated load settles around (kg)
    target_weight: f64,
    /// Current displayed weight (kg)
    current_weight: f64,
    /// Maximum random deviation per frame (kg)
    jitter: f64,
    start_delimiter: u8,
    end_delimiter: u8,
    noise: bool,
    frame_interval: Duration,
    last_frame: Option<Instant>,
    frames_emitted: usize,
}

impl Default for SimulatedIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedIndicator {
    /// Indicator seeded from entropy, settling on an empty-truck weight
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic indicator for tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            pending: VecDeque::new(),
            target_weight: 12_480.0,
            current_weight: 0.0,
            jitter: 5.0,
            start_delimiter: b'[',
            end_delimiter: b']',
            noise: false,
            frame_interval: Duration::ZERO,
            last_frame: None,
            frames_emitted: 0,
        }
    }

    /// Weight the load settles around
    pub fn with_target_weight(mut self, kg: f64) -> Self {
        self.target_weight = kg.max(0.0);
        self
    }

    /// Largest random deviation per frame once settled
    pub fn with_jitter(mut self, kg: f64) -> Self {
        self.jitter = kg.abs();
        self
    }

    /// Bytes wrapped around each frame
    pub fn with_delimiters(mut self, start: u8, end: u8) -> Self {
        self.start_delimiter = start;
        self.end_delimiter = end;
        self
    }

    /// Interleave random junk bytes between frames
    pub fn with_noise(mut self, noise: bool) -> Self {
        self.noise = noise;
        self
    }

    /// Minimum time between two frames; zero emits a frame on every read
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Change the load on the platform (e.g., a truck driving on)
    pub fn set_target_weight(&mut self, kg: f64) {
        self.target_weight = kg.max(0.0);
    }

    /// Frames produced so far
    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    /// Weight carried by the most recent frame
    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    fn frame_due(&self) -> bool {
        match self.last_frame {
            None => true,
            Some(last) => last.elapsed() >= self.frame_interval,
        }
    }

    fn emit_frame(&mut self) {
        // Move halfway towards the target each frame, like a settling platform
        let delta = self.target_weight - self.current_weight;
        let wobble = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        let settled = (delta.abs() < 1.0).then_some(self.target_weight);
        self.current_weight = settled
            .unwrap_or(self.current_weight + delta / 2.0)
            .max(0.0);
        let shown = (self.current_weight + wobble).max(0.0).round() as u64;
        let header = if settled.is_some() { "gs" } else { "us" };

        if self.noise && self.rng.gen_bool(0.5) {
            let count = self.rng.gen_range(1..6);
            for _ in 0..count {
                let idx = self.rng.gen_range(0..NOISE_BYTES.len());
                self.pending.push_back(NOISE_BYTES[idx]);
            }
        }

        self.pending.push_back(self.start_delimiter);
        self.pending
            .extend(format!("{}8{:06}", header, shown.min(999_999)).bytes());
        self.pending.push_back(self.end_delimiter);

        self.frames_emitted += 1;
        self.last_frame = Some(Instant::now());
    }
}

impl Read for SimulatedIndicator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() && self.frame_due() {
            self.emit_frame();
        }
        if self.pending.is_empty() || buf.is_empty() {
            return Ok(0);
        }

        let max = self.pending.len().min(buf.len());
        let n = self.rng.gen_range(1..=max);
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl ByteChannel for SimulatedIndicator {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.pending.len() as u32)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }
}
