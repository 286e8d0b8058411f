//! Ticket and lot persistence seam.
//!
//! [`ParkingStore`] is what the desk and resolver need from a backing store.
//! [`crate::storage::Storage`] implements it on `SQLite`; [`MemoryStore`]
//! keeps everything in maps and is handy for tests and demos.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::fee::Money;
use crate::lot::{Space, SpaceStatus, Zone};
use crate::ticket::{Ticket, TicketId, TicketState};

/// Storage operations needed to run check-in and checkout.
pub trait ParkingStore {
    /// Look up a space by id. The status reflects open tickets.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn space(&self, id: &str) -> Result<Option<Space>>;

    /// Look up a zone by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn zone(&self, code: &str) -> Result<Option<Zone>>;

    /// Look up a ticket by exact id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn ticket(&self, id: &str) -> Result<Option<Ticket>>;

    /// Persist a newly opened ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken, the space already has an open
    /// ticket, or the backing store fails.
    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()>;

    /// Record a checkout.
    ///
    /// Returns `false` without changing anything if the ticket does not exist
    /// or is already closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn close_ticket(
        &mut self,
        id: &TicketId,
        check_out_time: DateTime<Utc>,
        fee: Money,
    ) -> Result<bool>;
}

/// In-memory [`ParkingStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    zones: HashMap<String, Zone>,
    spaces: BTreeMap<String, Space>,
    tickets: BTreeMap<TicketId, Ticket>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the demo lot.
    #[must_use]
    pub fn with_demo_lot() -> Self {
        let (zones, spaces) = crate::lot::demo_lot();
        let mut store = Self::new();
        for zone in zones {
            store.add_zone(zone);
        }
        for space in spaces {
            store.add_space(space);
        }
        store
    }

    /// Add or replace a zone.
    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.code.clone(), zone);
    }

    /// Add or replace a space.
    pub fn add_space(&mut self, space: Space) {
        self.spaces.insert(space.id.clone(), space);
    }

    /// All spaces with their effective status, ordered by id.
    #[must_use]
    pub fn spaces(&self) -> Vec<Space> {
        self.spaces
            .values()
            .map(|space| self.effective(space.clone()))
            .collect()
    }

    fn open_ticket_for_space(&self, space_id: &str) -> Option<&Ticket> {
        self.tickets
            .values()
            .find(|t| t.is_open() && t.space() == space_id)
    }

    fn effective(&self, mut space: Space) -> Space {
        if self.open_ticket_for_space(&space.id).is_some() {
            space.status = SpaceStatus::Occupied;
        }
        space
    }
}

impl ParkingStore for MemoryStore {
    fn space(&self, id: &str) -> Result<Option<Space>> {
        Ok(self.spaces.get(id).cloned().map(|s| self.effective(s)))
    }

    fn zone(&self, code: &str) -> Result<Option<Zone>> {
        Ok(self.zones.get(code).cloned())
    }

    fn ticket(&self, id: &str) -> Result<Option<Ticket>> {
        Ok(self.tickets.get(&TicketId::new(id)).cloned())
    }

    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        if self.tickets.contains_key(ticket.id()) {
            return Err(Error::internal(format!(
                "duplicate ticket id {}",
                ticket.id()
            )));
        }
        if let Some(open) = self.open_ticket_for_space(ticket.space()) {
            return Err(Error::SpaceUnavailable {
                space_id: ticket.space().to_string(),
                status: format!("occupied by {}", open.id()),
            });
        }
        self.tickets.insert(ticket.id().clone(), ticket.clone());
        Ok(())
    }

    fn close_ticket(
        &mut self,
        id: &TicketId,
        check_out_time: DateTime<Utc>,
        fee: Money,
    ) -> Result<bool> {
        match self.tickets.get_mut(id) {
            Some(ticket) if matches!(ticket.state(), TicketState::Open) => {
                ticket.close(check_out_time, fee)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Vehicle;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ticket(id: &str, space: &str) -> Ticket {
        Ticket::open(
            TicketId::new(id),
            Vehicle {
                plate: "ABC123".to_string(),
                owner_name: "Ana".to_string(),
                model: "Golf".to_string(),
            },
            space,
            t0(),
        )
    }

    #[test]
    fn test_demo_lot_loaded() {
        let store = MemoryStore::with_demo_lot();
        assert_eq!(store.spaces().len(), 9);
        assert_eq!(
            store.zone("A").unwrap().unwrap().hourly_rate,
            Some(Money::from_cents(500))
        );
    }

    #[test]
    fn test_open_ticket_marks_space_occupied() {
        let mut store = MemoryStore::with_demo_lot();
        store.insert_ticket(&ticket("TKT1", "A1")).unwrap();

        let space = store.space("A1").unwrap().unwrap();
        assert_eq!(space.status, SpaceStatus::Occupied);
    }

    #[test]
    fn test_insert_rejects_second_open_ticket_on_space() {
        let mut store = MemoryStore::with_demo_lot();
        store.insert_ticket(&ticket("TKT1", "A1")).unwrap();

        let err = store.insert_ticket(&ticket("TKT2", "A1")).unwrap_err();
        assert!(matches!(err, Error::SpaceUnavailable { .. }));
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut store = MemoryStore::with_demo_lot();
        store.insert_ticket(&ticket("TKT1", "A1")).unwrap();
        assert!(store.insert_ticket(&ticket("TKT1", "B1")).is_err());
    }

    #[test]
    fn test_close_ticket_once() {
        let mut store = MemoryStore::with_demo_lot();
        store.insert_ticket(&ticket("TKT1", "A1")).unwrap();
        let id = TicketId::new("TKT1");

        let out = t0() + Duration::hours(1);
        assert!(store.close_ticket(&id, out, Money::from_cents(500)).unwrap());
        assert!(!store
            .close_ticket(&id, out + Duration::hours(1), Money::from_cents(900))
            .unwrap());

        let stored = store.ticket("TKT1").unwrap().unwrap();
        assert_eq!(stored.check_out_time(), Some(out));
        assert_eq!(
            store.space("A1").unwrap().unwrap().status,
            SpaceStatus::Available
        );
    }

    #[test]
    fn test_close_unknown_ticket() {
        let mut store = MemoryStore::new();
        assert!(!store
            .close_ticket(&TicketId::new("NOPE"), t0(), Money::ZERO)
            .unwrap());
    }
}
