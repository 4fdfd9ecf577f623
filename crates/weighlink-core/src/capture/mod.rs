//! Tare/gross weight capture
//!
//! A ticket is weighed twice: once loaded (gross) and once empty (tare), in
//! either order. [`WeighingCapture`] takes the latest numeric reading from the
//! publisher into the right slot and keeps the net weight up to date.

mod repository;
mod ticket;

pub use repository::{MemoryTransactionRepository, RepositoryError, TransactionRepository};
pub use ticket::{TicketStatus, WeighingTicket};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

use ticket::round_kg;

/// Which of the two weighings a capture fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightKind {
    /// Empty vehicle, stored in the first slot
    Tare,
    /// Loaded vehicle, stored in the second slot
    Gross,
}

impl WeightKind {
    /// The other weighing of the pair
    pub fn opposite(self) -> Self {
        match self {
            WeightKind::Tare => WeightKind::Gross,
            WeightKind::Gross => WeightKind::Tare,
        }
    }
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightKind::Tare => f.write_str("Tare"),
            WeightKind::Gross => f.write_str("Gross"),
        }
    }
}

/// Errors raised by capture rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// No live reading to take the weight from
    #[error("Not connected to the weighing indicator")]
    NotConnected,

    /// The requested slot already holds a weight
    #[error("{0} weight already captured for this transaction")]
    AlreadyCaptured(WeightKind),

    /// Reading is not a positive finite weight
    #[error("Invalid weight value from serial: {0}")]
    InvalidReading(f64),

    /// Ticket has no vehicle number
    #[error("Vehicle number is required")]
    MissingVehicleNumber,

    /// Ticket was canceled
    #[error("Transaction is canceled")]
    Canceled,

    /// Ticket store failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Capture session for a single ticket
#[derive(Debug, Clone)]
pub struct WeighingCapture {
    ticket: WeighingTicket,
    suggested: WeightKind,
}

impl WeighingCapture {
    /// Start a fresh ticket, suggesting a tare weighing first
    pub fn new(vehicle_number: impl Into<String>) -> Self {
        Self {
            ticket: WeighingTicket::new(vehicle_number),
            suggested: WeightKind::Tare,
        }
    }

    /// Continue an existing ticket; the suggestion points at the missing slot
    pub fn from_ticket(ticket: WeighingTicket) -> Self {
        let suggested = if ticket.first_weight > 0.0 && ticket.second_weight == 0.0 {
            WeightKind::Gross
        } else {
            WeightKind::Tare
        };
        Self { ticket, suggested }
    }

    /// Load the newest pending ticket for a vehicle, if there is one
    pub fn resume_pending<R: TransactionRepository + ?Sized>(
        repo: &R,
        vehicle_number: &str,
    ) -> Result<Option<Self>, CaptureError> {
        let vehicle_number = vehicle_number.trim();
        if vehicle_number.is_empty() {
            return Err(CaptureError::MissingVehicleNumber);
        }
        let pending = repo.get_all_pending_by_vehicle_number(vehicle_number)?;
        if pending.len() > 1 {
            info!(
                "{} pending transactions for {}, resuming the newest",
                pending.len(),
                vehicle_number
            );
        }
        Ok(pending.into_iter().next().map(Self::from_ticket))
    }

    /// Ticket being filled
    pub fn ticket(&self) -> &WeighingTicket {
        &self.ticket
    }

    /// Weighing the operator should do next
    pub fn suggested_kind(&self) -> WeightKind {
        self.suggested
    }

    /// Current ticket status
    pub fn status(&self) -> TicketStatus {
        self.ticket.status
    }

    /// Record `reading` into the `kind` slot.
    ///
    /// On an empty ticket either slot may be filled. Once one weight is in,
    /// only a slot that is still zero can be filled. Returns the stored weight
    /// rounded to two decimals.
    pub fn capture(
        &mut self,
        kind: WeightKind,
        reading: f64,
        connected: bool,
    ) -> Result<f64, CaptureError> {
        if !connected {
            return Err(CaptureError::NotConnected);
        }
        if self.ticket.status == TicketStatus::Canceled {
            return Err(CaptureError::Canceled);
        }
        let weight = round_kg(reading);
        // A slot holding 0.0 counts as empty, so zero is never a valid capture
        if !weight.is_finite() || weight <= 0.0 {
            return Err(CaptureError::InvalidReading(reading));
        }

        let now = Utc::now();
        let first_capture = self.ticket.is_empty();

        match kind {
            WeightKind::Tare if self.ticket.first_weight == 0.0 => {
                self.ticket.first_weight = weight;
                self.ticket.first_weight_at = Some(now);
            }
            WeightKind::Gross if self.ticket.second_weight == 0.0 => {
                self.ticket.second_weight = weight;
                self.ticket.second_weight_at = Some(now);
            }
            _ => return Err(CaptureError::AlreadyCaptured(kind)),
        }

        // Only the opening weighing decides what comes next
        if first_capture {
            self.suggested = kind.opposite();
        }
        self.ticket.recalculate();
        info!(
            "{} weight {:.2} kg captured for {} ({})",
            kind, weight, self.ticket.vehicle_number, self.ticket.status
        );
        Ok(weight)
    }

    /// Insert or update the ticket in `repo`
    pub fn save<R: TransactionRepository + ?Sized>(&mut self, repo: &mut R) -> Result<(), CaptureError> {
        if self.ticket.vehicle_number.trim().is_empty() {
            return Err(CaptureError::MissingVehicleNumber);
        }
        match self.ticket.id {
            Some(_) => repo.update(&self.ticket)?,
            None => self.ticket = repo.add(self.ticket.clone())?,
        }
        Ok(())
    }

    /// Mark the ticket canceled; later captures are refused
    pub fn cancel(&mut self) {
        self.ticket.status = TicketStatus::Canceled;
        self.ticket.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_capture_suggests_opposite() {
        let mut capture = WeighingCapture::new("KA01");
        assert_eq!(capture.capture(WeightKind::Gross, 18_000.0, true), Ok(18_000.0));
        assert_eq!(capture.suggested_kind(), WeightKind::Tare);
        assert_eq!(capture.status(), TicketStatus::Pending);
    }

    #[test]
    fn test_second_capture_keeps_suggestion() {
        let mut capture = WeighingCapture::new("KA01");
        capture.capture(WeightKind::Tare, 7_000.0, true).unwrap();
        assert_eq!(capture.suggested_kind(), WeightKind::Gross);
        capture.capture(WeightKind::Gross, 18_000.0, true).unwrap();
        assert_eq!(capture.suggested_kind(), WeightKind::Gross);
    }

    #[test]
    fn test_second_capture_completes_ticket() {
        let mut capture = WeighingCapture::new("KA01");
        capture.capture(WeightKind::Tare, 7_000.0, true).unwrap();
        capture.capture(WeightKind::Gross, 18_000.456, true).unwrap();
        assert_eq!(capture.ticket().second_weight, 18_000.46);
        assert_eq!(capture.ticket().net_weight, 11_000.46);
        assert_eq!(capture.status(), TicketStatus::Completed);
    }

    #[test]
    fn test_filled_slot_is_not_overwritten() {
        let mut capture = WeighingCapture::new("KA01");
        capture.capture(WeightKind::Tare, 7_000.0, true).unwrap();
        assert_eq!(
            capture.capture(WeightKind::Tare, 7_100.0, true),
            Err(CaptureError::AlreadyCaptured(WeightKind::Tare))
        );
        assert_eq!(capture.ticket().first_weight, 7_000.0);
    }

    #[test]
    fn test_capture_needs_connection_and_valid_reading() {
        let mut capture = WeighingCapture::new("KA01");
        assert_eq!(
            capture.capture(WeightKind::Tare, 7_000.0, false),
            Err(CaptureError::NotConnected)
        );
        assert!(matches!(
            capture.capture(WeightKind::Tare, f64::NAN, true),
            Err(CaptureError::InvalidReading(_))
        ));
        assert_eq!(
            capture.capture(WeightKind::Tare, 0.0, true),
            Err(CaptureError::InvalidReading(0.0))
        );
        assert!(capture.ticket().is_empty());
    }

    #[test]
    fn test_canceled_ticket_refuses_capture() {
        let mut capture = WeighingCapture::new("KA01");
        capture.cancel();
        assert_eq!(
            capture.capture(WeightKind::Tare, 7_000.0, true),
            Err(CaptureError::Canceled)
        );
    }

    #[test]
    fn test_resume_suggests_missing_slot() {
        let mut ticket = WeighingTicket::new("KA01");
        ticket.first_weight = 7_000.0;
        ticket.recalculate();
        assert_eq!(WeighingCapture::from_ticket(ticket).suggested_kind(), WeightKind::Gross);
    }
}
