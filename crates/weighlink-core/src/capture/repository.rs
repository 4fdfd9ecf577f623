//! Ticket storage boundary

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::{TicketStatus, WeighingTicket};

/// Errors reported by a ticket store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// No ticket with this id
    #[error("Transaction {0} not found")]
    NotFound(u64),

    /// Ticket has no id yet, so it cannot be updated
    #[error("Transaction {0} has not been stored yet")]
    NotStored(Uuid),

    /// A ticket with the same guid is already stored
    #[error("Transaction {0} already exists")]
    Duplicate(Uuid),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Persistent store of weighing tickets.
///
/// Lists come back newest first.
pub trait TransactionRepository {
    /// Every stored ticket
    fn get_all(&self) -> Result<Vec<WeighingTicket>, RepositoryError>;

    /// Ticket with the given id
    fn get_by_id(&self, id: u64) -> Result<Option<WeighingTicket>, RepositoryError>;

    /// Ticket with the given guid
    fn get_by_guid(&self, guid: &Uuid) -> Result<Option<WeighingTicket>, RepositoryError>;

    /// Insert a ticket, returning it with its id assigned
    fn add(&mut self, ticket: WeighingTicket) -> Result<WeighingTicket, RepositoryError>;

    /// Overwrite a stored ticket, matched by id
    fn update(&mut self, ticket: &WeighingTicket) -> Result<(), RepositoryError>;

    /// Remove the ticket with the given id
    fn delete(&mut self, id: u64) -> Result<(), RepositoryError>;

    /// Pending tickets for a vehicle
    fn get_all_pending_by_vehicle_number(
        &self,
        vehicle_number: &str,
    ) -> Result<Vec<WeighingTicket>, RepositoryError>;

    /// Most recent completed ticket for a vehicle
    fn get_latest_completed_transaction(
        &self,
        vehicle_number: &str,
    ) -> Result<Option<WeighingTicket>, RepositoryError>;
}

/// Volatile ticket store for demos and tests
#[derive(Debug, Default)]
pub struct MemoryTransactionRepository {
    tickets: Vec<WeighingTicket>,
    next_id: u64,
}

impl MemoryTransactionRepository {
    /// Empty store; ids start at 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// No tickets stored
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

fn newest_first<'a>(iter: impl Iterator<Item = &'a WeighingTicket>) -> Vec<WeighingTicket> {
    let mut out: Vec<WeighingTicket> = iter.cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    out
}

impl TransactionRepository for MemoryTransactionRepository {
    fn get_all(&self) -> Result<Vec<WeighingTicket>, RepositoryError> {
        Ok(newest_first(self.tickets.iter()))
    }

    fn get_by_id(&self, id: u64) -> Result<Option<WeighingTicket>, RepositoryError> {
        Ok(self.tickets.iter().find(|t| t.id == Some(id)).cloned())
    }

    fn get_by_guid(&self, guid: &Uuid) -> Result<Option<WeighingTicket>, RepositoryError> {
        Ok(self.tickets.iter().find(|t| &t.guid == guid).cloned())
    }

    fn add(&mut self, mut ticket: WeighingTicket) -> Result<WeighingTicket, RepositoryError> {
        if self.tickets.iter().any(|t| t.guid == ticket.guid) {
            return Err(RepositoryError::Duplicate(ticket.guid));
        }
        self.next_id += 1;
        ticket.id = Some(self.next_id);
        debug!("Added transaction {} ({})", self.next_id, ticket.guid);
        self.tickets.push(ticket.clone());
        Ok(ticket)
    }

    fn update(&mut self, ticket: &WeighingTicket) -> Result<(), RepositoryError> {
        let id = ticket.id.ok_or(RepositoryError::NotStored(ticket.guid))?;
        let slot = self
            .tickets
            .iter_mut()
            .find(|t| t.id == Some(id))
            .ok_or(RepositoryError::NotFound(id))?;
        *slot = ticket.clone();
        debug!("Updated transaction {}", id);
        Ok(())
    }

    fn delete(&mut self, id: u64) -> Result<(), RepositoryError> {
        let before = self.tickets.len();
        self.tickets.retain(|t| t.id != Some(id));
        if self.tickets.len() == before {
            return Err(RepositoryError::NotFound(id));
        }
        debug!("Deleted transaction {}", id);
        Ok(())
    }

    fn get_all_pending_by_vehicle_number(
        &self,
        vehicle_number: &str,
    ) -> Result<Vec<WeighingTicket>, RepositoryError> {
        Ok(newest_first(self.tickets.iter().filter(|t| {
            t.vehicle_number == vehicle_number && t.status == TicketStatus::Pending
        })))
    }

    fn get_latest_completed_transaction(
        &self,
        vehicle_number: &str,
    ) -> Result<Option<WeighingTicket>, RepositoryError> {
        Ok(newest_first(self.tickets.iter().filter(|t| {
            t.vehicle_number == vehicle_number && t.status == TicketStatus::Completed
        }))
        .into_iter()
        .next())
    }
}
