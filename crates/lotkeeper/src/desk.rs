//! The attendant's desk: check vehicles in, price stays, check them out.
//!
//! [`ParkingDesk`] ties the fee schedule and plate rule to a
//! [`ParkingStore`]. Every operation takes `now` explicitly so callers (and
//! tests) control the clock.

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fee::{billed_hours, FeeSchedule, Money};
use crate::resolver;
use crate::store::ParkingStore;
use crate::ticket::{CheckInRequest, Ticket, TicketId, TicketState, Vehicle};

/// How many ids to try before giving up on a collision streak.
const MAX_ID_ATTEMPTS: u32 = 8;

/// Sub-second digits kept for ticket timestamps; stored times have the same precision.
const TIMESTAMP_DIGITS: u16 = 6;

/// Price of a stay as of a given time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// The ticket priced.
    pub ticket_id: TicketId,
    /// Space the vehicle is in.
    pub space: String,
    /// When the stay began.
    pub check_in_time: DateTime<Utc>,
    /// End of the priced interval: `now` for open tickets, the checkout for closed ones.
    pub until: DateTime<Utc>,
    /// Started hours in the interval.
    pub billed_hours: u64,
    /// Rate applied per hour. Not reported for closed tickets, whose zone
    /// rate may have changed since the fee was charged.
    pub hourly_rate: Option<Money>,
    /// Amount owed (or charged, if closed).
    pub fee: Money,
    /// Whether the ticket is already closed.
    pub closed: bool,
}

/// Check-in, pricing and checkout over a [`ParkingStore`].
#[derive(Debug)]
pub struct ParkingDesk<S> {
    store: S,
    fees: FeeSchedule,
    plate_rule: Option<Regex>,
}

impl<S: ParkingStore> ParkingDesk<S> {
    /// Create a desk with an explicit fee schedule and optional plate rule.
    #[must_use]
    pub fn new(store: S, fees: FeeSchedule, plate_rule: Option<Regex>) -> Self {
        Self {
            store,
            fees,
            plate_rule,
        }
    }

    /// Create a desk using the fee schedule and plate pattern from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured plate pattern is invalid.
    pub fn from_config(store: S, config: &Config) -> Result<Self> {
        Ok(Self::new(store, config.fee_schedule(), config.plate_regex()?))
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check a vehicle into a space.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if a field is blank or the plate does not
    ///   match the plate rule
    /// - [`Error::SpaceNotFound`] if the space does not exist
    /// - [`Error::SpaceUnavailable`] if the space is not available
    /// - storage errors
    pub fn check_in(&mut self, request: &CheckInRequest, now: DateTime<Utc>) -> Result<Ticket> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(Error::invalid_input(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let plate = request.normalized_plate();
        if let Some(rule) = &self.plate_rule {
            if !rule.is_match(&plate) {
                return Err(Error::invalid_input(format!(
                    "license plate {plate} is not in a recognized format"
                )));
            }
        }
        let now = now.trunc_subsecs(TIMESTAMP_DIGITS);

        let space_id = request.space.trim();
        let space = self
            .store
            .space(space_id)?
            .ok_or_else(|| Error::space_not_found(space_id))?;
        if !space.is_available() {
            return Err(Error::SpaceUnavailable {
                space_id: space.id,
                status: space.status.to_string(),
            });
        }

        let id = self.fresh_ticket_id(&plate, space_id, now)?;
        let ticket = Ticket::open(
            id,
            Vehicle {
                plate,
                owner_name: request.owner_name.trim().to_string(),
                model: request.model.trim().to_string(),
            },
            space_id,
            now,
        );
        self.store.insert_ticket(&ticket)?;

        info!(
            "Checked in {} to space {} with ticket {}",
            ticket.plate(),
            ticket.space(),
            ticket.id()
        );
        Ok(ticket)
    }

    /// Find a ticket by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if no ticket matches.
    pub fn find(&self, ticket_id: &str) -> Result<Ticket> {
        resolver::find_ticket(&self.store, ticket_id)
    }

    /// Find the ticket behind a scanned QR payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unreadable payload or
    /// [`Error::TicketNotFound`] if no ticket matches.
    pub fn resolve_scan(&self, payload: &str) -> Result<Ticket> {
        resolver::resolve_scan(&self.store, payload)
    }

    /// Price a ticket without closing it.
    ///
    /// Closed tickets report the fee that was charged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if no ticket matches.
    pub fn quote(&self, ticket_id: &str, now: DateTime<Utc>) -> Result<Quote> {
        let ticket = self.find(ticket_id)?;

        let quote = match *ticket.state() {
            TicketState::Closed {
                check_out_time,
                fee,
            } => Quote {
                ticket_id: ticket.id().clone(),
                space: ticket.space().to_string(),
                check_in_time: ticket.check_in_time(),
                until: check_out_time,
                billed_hours: billed_hours(ticket.check_in_time(), check_out_time),
                hourly_rate: None,
                fee,
                closed: true,
            },
            TicketState::Open => {
                let schedule = self.schedule_for(ticket.space())?;
                Quote {
                    ticket_id: ticket.id().clone(),
                    space: ticket.space().to_string(),
                    check_in_time: ticket.check_in_time(),
                    until: now,
                    billed_hours: billed_hours(ticket.check_in_time(), now),
                    hourly_rate: Some(schedule.hourly_rate),
                    fee: schedule.fee(ticket.check_in_time(), now),
                    closed: false,
                }
            }
        };
        Ok(quote)
    }

    /// Check a vehicle out, charging the fee for its stay.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if no ticket matches
    /// - [`Error::AlreadyClosed`] if the ticket was checked out before; the
    ///   stored checkout is not changed
    /// - storage errors
    pub fn check_out(&mut self, ticket_id: &str, now: DateTime<Utc>) -> Result<Ticket> {
        let mut ticket = self.find(ticket_id)?;
        if let Some(checked_out_at) = ticket.check_out_time() {
            return Err(Error::AlreadyClosed {
                ticket_id: ticket.id().to_string(),
                checked_out_at,
            });
        }

        let now = now.trunc_subsecs(TIMESTAMP_DIGITS);
        let fee = self.schedule_for(ticket.space())?.fee(ticket.check_in_time(), now);
        if !self.store.close_ticket(ticket.id(), now, fee)? {
            // Closed between our read and the update.
            let current = self.find(ticket_id)?;
            return match current.check_out_time() {
                Some(checked_out_at) => Err(Error::AlreadyClosed {
                    ticket_id: current.id().to_string(),
                    checked_out_at,
                }),
                None => Err(Error::internal(format!(
                    "ticket {ticket_id} is open but could not be closed"
                ))),
            };
        }
        ticket.close(now, fee)?;

        info!(
            "Checked out {} from space {} (ticket {}, fee {})",
            ticket.plate(),
            ticket.space(),
            ticket.id(),
            fee
        );
        Ok(ticket)
    }

    /// Fee schedule for a space: its zone's rate if set, else the default.
    fn schedule_for(&self, space_id: &str) -> Result<FeeSchedule> {
        let Some(space) = self.store.space(space_id)? else {
            warn!("Space {} not found, pricing at default rate", space_id);
            return Ok(self.fees);
        };
        let rate = self
            .store
            .zone(&space.zone)?
            .and_then(|zone| zone.hourly_rate);
        Ok(match rate {
            Some(rate) => self.fees.with_hourly_rate(rate),
            None => self.fees,
        })
    }

    fn fresh_ticket_id(&self, plate: &str, space: &str, now: DateTime<Utc>) -> Result<TicketId> {
        for sequence in 0..MAX_ID_ATTEMPTS {
            let id = TicketId::generate(plate, space, now, sequence);
            if self.store.ticket(id.as_str())?.is_none() {
                return Ok(id);
            }
            debug!("Ticket id {} already taken, retrying", id);
        }
        Err(Error::internal(format!(
            "could not generate a unique ticket id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::{Space, SpaceKind, SpaceStatus, Zone};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// A lot with one zone at the default rate.
    fn flat_rate_desk() -> ParkingDesk<MemoryStore> {
        let mut store = MemoryStore::new();
        store.add_zone(Zone::new("A"));
        for id in ["A1", "A2"] {
            store.add_space(Space::new(id, "A", SpaceKind::Covered));
        }
        store.add_space(Space::new("A3", "A", SpaceKind::Covered).with_status(SpaceStatus::Reserved));
        ParkingDesk::from_config(store, &Config::default()).unwrap()
    }

    fn request(plate: &str, space: &str) -> CheckInRequest {
        CheckInRequest {
            plate: plate.to_string(),
            owner_name: "Jordan Lee".to_string(),
            model: "Civic".to_string(),
            space: space.to_string(),
        }
    }

    #[test]
    fn test_check_in_creates_open_ticket() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request(" abc123 ", "A1"), t0()).unwrap();

        assert!(ticket.is_open());
        assert_eq!(ticket.plate(), "ABC123");
        assert_eq!(ticket.space(), "A1");
        assert_eq!(ticket.check_in_time(), t0());
        assert!(ticket.id().as_str().starts_with("TKT"));
        assert_eq!(desk.find(ticket.id().as_str()).unwrap(), ticket);
    }

    #[test]
    fn test_check_in_missing_fields() {
        let mut desk = flat_rate_desk();
        let mut req = request("ABC123", "A1");
        req.owner_name = String::new();
        req.space = "  ".to_string();

        let err = desk.check_in(&req, t0()).unwrap_err();
        assert!(err.is_invalid_input());
        let msg = err.to_string();
        assert!(msg.contains("owner name"));
        assert!(msg.contains("space"));
    }

    #[test]
    fn test_check_in_accepts_free_text_plates() {
        let mut desk = flat_rate_desk();
        for (plate, expected) in [
            ("ab.123", "AB.123"),
            ("Müller 1", "MÜLLER 1"),
            ("cd-123-xy-abcde", "CD-123-XY-ABCDE"),
            ("東京 500", "東京 500"),
        ] {
            let ticket = desk.check_in(&request(plate, "A1"), t0()).unwrap();
            assert_eq!(ticket.plate(), expected);
            desk.check_out(ticket.id().as_str(), t0()).unwrap();
        }
    }

    #[test]
    fn test_check_in_enforces_configured_plate_pattern() {
        let mut config = Config::default();
        config.lot.plate_pattern = Some(r"^[A-Z0-9]{2,8}$".to_string());
        let mut desk = ParkingDesk::from_config(MemoryStore::with_demo_lot(), &config).unwrap();

        let err = desk.check_in(&request("ABC/123", "A1"), t0()).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(desk.check_in(&request("abc123", "A1"), t0()).is_ok());
    }

    #[test]
    fn test_returned_tickets_match_stored_records() {
        let mut storage = crate::storage::Storage::open_in_memory().unwrap();
        storage.seed_demo_lot().unwrap();
        let mut desk = ParkingDesk::from_config(storage, &Config::default()).unwrap();
        let arrival = t0() + Duration::nanoseconds(123_456_789);

        let ticket = desk.check_in(&request("ABC123", "A1"), arrival).unwrap();
        assert_eq!(desk.find(ticket.id().as_str()).unwrap(), ticket);
        assert_eq!(
            ticket.check_in_time(),
            t0() + Duration::microseconds(123_456)
        );

        let closed = desk
            .check_out(ticket.id().as_str(), arrival + Duration::nanoseconds(3_600_000_000_999))
            .unwrap();
        assert_eq!(desk.find(ticket.id().as_str()).unwrap(), closed);
    }

    #[test]
    fn test_check_in_unknown_space() {
        let mut desk = flat_rate_desk();
        let err = desk.check_in(&request("ABC123", "Z9"), t0()).unwrap_err();
        assert!(matches!(err, Error::SpaceNotFound { .. }));
    }

    #[test]
    fn test_check_in_reserved_space() {
        let mut desk = flat_rate_desk();
        let err = desk.check_in(&request("ABC123", "A3"), t0()).unwrap_err();
        match err {
            Error::SpaceUnavailable { space_id, status } => {
                assert_eq!(space_id, "A3");
                assert_eq!(status, "reserved");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_occupied_space_cannot_be_checked_into_until_checkout() {
        let mut desk = flat_rate_desk();
        let first = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();

        let err = desk
            .check_in(&request("XYZ789", "A1"), t0() + Duration::minutes(5))
            .unwrap_err();
        assert!(matches!(err, Error::SpaceUnavailable { .. }));

        desk.check_out(first.id().as_str(), t0() + Duration::hours(1))
            .unwrap();
        assert!(desk
            .check_in(&request("XYZ789", "A1"), t0() + Duration::hours(2))
            .is_ok());
    }

    #[test]
    fn test_same_vehicle_same_instant_gets_distinct_ids() {
        let mut desk = flat_rate_desk();
        let a = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();
        desk.check_out(a.id().as_str(), t0()).unwrap();
        let b = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_check_out_charges_fee() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();
        let out = t0() + Duration::hours(3) + Duration::minutes(5);

        let closed = desk.check_out(ticket.id().as_str(), out).unwrap();
        assert_eq!(closed.check_out_time(), Some(out));
        assert_eq!(closed.fee(), Some(Money::from_cents(800)));
    }

    #[test]
    fn test_second_check_out_rejected_and_time_unchanged() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();
        let first_out = t0() + Duration::minutes(30);
        desk.check_out(ticket.id().as_str(), first_out).unwrap();

        let err = desk
            .check_out(ticket.id().as_str(), t0() + Duration::hours(9))
            .unwrap_err();
        match err {
            Error::AlreadyClosed { checked_out_at, .. } => assert_eq!(checked_out_at, first_out),
            other => panic!("unexpected error: {other}"),
        }

        let stored = desk.find(ticket.id().as_str()).unwrap();
        assert_eq!(stored.check_out_time(), Some(first_out));
        assert_eq!(stored.fee(), Some(Money::from_cents(200)));
    }

    #[test]
    fn test_check_out_unknown_ticket() {
        let mut desk = flat_rate_desk();
        assert!(desk.check_out("TKT404", t0()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_zone_rate_overrides_default() {
        let mut desk = ParkingDesk::from_config(MemoryStore::with_demo_lot(), &Config::default())
            .unwrap();
        let ticket = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();

        let quote = desk
            .quote(ticket.id().as_str(), t0() + Duration::minutes(90))
            .unwrap();
        assert_eq!(quote.hourly_rate, Some(Money::from_cents(500)));
        assert_eq!(quote.billed_hours, 2);
        assert_eq!(quote.fee, Money::from_cents(1000));
        assert!(!quote.closed);
    }

    #[test]
    fn test_quote_does_not_close() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();

        desk.quote(ticket.id().as_str(), t0() + Duration::hours(2))
            .unwrap();
        assert!(desk.find(ticket.id().as_str()).unwrap().is_open());
    }

    #[test]
    fn test_quote_closed_ticket_reports_charged_fee() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request("ABC123", "A1"), t0()).unwrap();
        let out = t0() + Duration::hours(2);
        desk.check_out(ticket.id().as_str(), out).unwrap();

        let quote = desk
            .quote(ticket.id().as_str(), t0() + Duration::days(3))
            .unwrap();
        assert!(quote.closed);
        assert_eq!(quote.until, out);
        assert_eq!(quote.fee, Money::from_cents(400));
        assert_eq!(quote.billed_hours, 2);
        assert!(quote.hourly_rate.is_none());
    }

    #[test]
    fn test_resolve_scan_of_issued_ticket() {
        let mut desk = flat_rate_desk();
        let ticket = desk.check_in(&request("ABC123", "A2"), t0()).unwrap();
        let payload = serde_json::to_string(&ticket.scan_payload()).unwrap();

        assert_eq!(desk.resolve_scan(&payload).unwrap(), ticket);
    }
}
