//! Weighing ticket model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a ticket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    /// One of the two weighings is still missing
    #[default]
    Pending,
    /// Both weights captured
    Completed,
    /// Voided by the operator
    Canceled,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Pending => f.write_str("Pending"),
            TicketStatus::Completed => f.write_str("Completed"),
            TicketStatus::Canceled => f.write_str("Canceled"),
        }
    }
}

/// One weighing transaction: a tare slot, a gross slot and the net result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingTicket {
    /// Assigned by the repository on insert
    pub id: Option<u64>,
    /// Stable identity, assigned on creation
    pub guid: Uuid,
    /// Registration of the weighed vehicle
    pub vehicle_number: String,
    /// Tare weight (kg), 0.0 while not captured
    pub first_weight: f64,
    /// When the tare weight was captured
    pub first_weight_at: Option<DateTime<Utc>>,
    /// Gross weight (kg), 0.0 while not captured
    pub second_weight: f64,
    /// When the gross weight was captured
    pub second_weight_at: Option<DateTime<Utc>>,
    /// Gross minus tare (kg), 0.0 until both are in
    pub net_weight: f64,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Free-text operator note
    #[serde(default)]
    pub remarks: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl WeighingTicket {
    /// Empty pending ticket for a vehicle
    pub fn new(vehicle_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            guid: Uuid::new_v4(),
            vehicle_number: vehicle_number.into(),
            first_weight: 0.0,
            first_weight_at: None,
            second_weight: 0.0,
            second_weight_at: None,
            net_weight: 0.0,
            status: TicketStatus::Pending,
            remarks: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Neither weight captured yet
    pub fn is_empty(&self) -> bool {
        self.first_weight == 0.0 && self.second_weight == 0.0
    }

    /// Recompute net weight and status from the two slots
    pub fn recalculate(&mut self) {
        let both = self.first_weight > 0.0 && self.second_weight > 0.0;
        self.net_weight = if both {
            round_kg((self.second_weight - self.first_weight).abs())
        } else {
            0.0
        };
        if self.status != TicketStatus::Canceled {
            self.status = if both {
                TicketStatus::Completed
            } else {
                TicketStatus::Pending
            };
        }
        self.updated_at = Utc::now();
    }
}

/// Round to the two decimals printed on a slip
pub(crate) fn round_kg(kg: f64) -> f64 {
    (kg * 100.0).round() / 100.0
}
