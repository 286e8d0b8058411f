//! Tickets: one vehicle's stay in one space, from check-in to checkout.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fee::Money;

/// Prefix of every generated ticket id.
const TICKET_ID_PREFIX: &str = "TKT";

/// Number of hash characters after the prefix.
const TICKET_ID_HASH_LEN: usize = 10;

/// Opaque ticket identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from the check-in details.
    ///
    /// `sequence` is bumped by the caller to get a different id when the
    /// first one collides.
    #[must_use]
    pub fn generate(plate: &str, space: &str, at: DateTime<Utc>, sequence: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(plate.as_bytes());
        hasher.update(&[0]);
        hasher.update(space.as_bytes());
        hasher.update(&[0]);
        hasher.update(&at.timestamp_micros().to_le_bytes());
        hasher.update(&sequence.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!(
            "{TICKET_ID_PREFIX}{}",
            hex.as_str()[..TICKET_ID_HASH_LEN].to_ascii_uppercase()
        ))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TicketState {
    /// The vehicle is still parked.
    Open,
    /// The vehicle has left and the fee was charged.
    Closed {
        /// When the vehicle was checked out.
        check_out_time: DateTime<Utc>,
        /// Amount charged at checkout.
        fee: Money,
    },
}

/// Vehicle and owner details captured at check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// License plate, uppercase.
    pub plate: String,
    /// Name of the owner.
    pub owner_name: String,
    /// Make/model as typed by the attendant.
    pub model: String,
}

/// A record of one stay.
///
/// The id, vehicle, space and check-in time are fixed at creation. The state
/// moves from open to closed once, through [`Ticket::close`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    vehicle: Vehicle,
    space: String,
    check_in_time: DateTime<Utc>,
    #[serde(flatten)]
    state: TicketState,
}

impl Ticket {
    /// Create an open ticket.
    #[must_use]
    pub fn open(
        id: TicketId,
        vehicle: Vehicle,
        space: impl Into<String>,
        check_in_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            vehicle,
            space: space.into(),
            check_in_time,
            state: TicketState::Open,
        }
    }

    /// Rebuild a ticket from stored fields.
    pub(crate) fn restore(
        id: TicketId,
        vehicle: Vehicle,
        space: String,
        check_in_time: DateTime<Utc>,
        state: TicketState,
    ) -> Self {
        Self {
            id,
            vehicle,
            space,
            check_in_time,
            state,
        }
    }

    /// The ticket id.
    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.id
    }

    /// Vehicle details.
    #[must_use]
    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// License plate.
    #[must_use]
    pub fn plate(&self) -> &str {
        &self.vehicle.plate
    }

    /// Id of the assigned space.
    #[must_use]
    pub fn space(&self) -> &str {
        &self.space
    }

    /// When the vehicle checked in.
    #[must_use]
    pub fn check_in_time(&self) -> DateTime<Utc> {
        self.check_in_time
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &TicketState {
        &self.state
    }

    /// Whether the vehicle is still parked.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, TicketState::Open)
    }

    /// When the vehicle checked out, if it has.
    #[must_use]
    pub fn check_out_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TicketState::Open => None,
            TicketState::Closed { check_out_time, .. } => Some(check_out_time),
        }
    }

    /// The fee charged at checkout, if closed.
    #[must_use]
    pub fn fee(&self) -> Option<Money> {
        match self.state {
            TicketState::Open => None,
            TicketState::Closed { fee, .. } => Some(fee),
        }
    }

    /// Length of the stay, for closed tickets.
    #[must_use]
    pub fn stay(&self) -> Option<Duration> {
        self.check_out_time().map(|out| out - self.check_in_time)
    }

    /// Close the ticket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the ticket was closed before; the
    /// recorded checkout is left untouched.
    pub fn close(&mut self, check_out_time: DateTime<Utc>, fee: Money) -> Result<()> {
        if let TicketState::Closed {
            check_out_time: previous,
            ..
        } = self.state
        {
            return Err(Error::AlreadyClosed {
                ticket_id: self.id.to_string(),
                checked_out_at: previous,
            });
        }
        self.state = TicketState::Closed {
            check_out_time,
            fee,
        };
        Ok(())
    }

    /// The payload encoded in the ticket's QR code.
    #[must_use]
    pub fn scan_payload(&self) -> ScanPayload {
        ScanPayload {
            ticket_id: self.id.to_string(),
            plate: Some(self.vehicle.plate.clone()),
            owner_name: Some(self.vehicle.owner_name.clone()),
            model: Some(self.vehicle.model.clone()),
            space: Some(self.space.clone()),
            check_in_time: Some(self.check_in_time),
        }
    }
}

/// Fields an attendant fills in to check a vehicle in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckInRequest {
    /// License plate as typed.
    pub plate: String,
    /// Owner name.
    pub owner_name: String,
    /// Vehicle make/model.
    pub model: String,
    /// Requested space id.
    pub space: String,
}

impl CheckInRequest {
    /// Names of required fields that are empty or whitespace.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("plate", &self.plate),
            ("owner name", &self.owner_name),
            ("model", &self.model),
            ("space", &self.space),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Plate trimmed and uppercased.
    #[must_use]
    pub fn normalized_plate(&self) -> String {
        self.plate.trim().to_uppercase()
    }
}

/// Contents of a ticket QR code.
///
/// Only `ticket_id` is needed to find the ticket; the rest is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPayload {
    /// The ticket id.
    pub ticket_id: String,
    /// License plate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    /// Owner name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    /// Vehicle model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Space id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    /// Check-in time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<DateTime<Utc>>,
}

/// What happened in an [`Activity`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A vehicle arrived.
    CheckIn,
    /// A vehicle left.
    CheckOut,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckIn => write!(f, "check-in"),
            Self::CheckOut => write!(f, "check-out"),
        }
    }
}

/// One check-in or checkout event, for activity feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Arrival or departure.
    pub kind: ActivityKind,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// The ticket involved.
    pub ticket_id: TicketId,
    /// License plate.
    pub plate: String,
    /// Space id.
    pub space: String,
    /// Zone code of the space.
    pub zone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            plate: "ABC123".to_string(),
            owner_name: "Jordan Lee".to_string(),
            model: "Civic".to_string(),
        }
    }

    #[test]
    fn test_generate_id_shape() {
        let id = TicketId::generate("ABC123", "A1", t0(), 0);
        assert!(id.as_str().starts_with("TKT"));
        assert_eq!(id.as_str().len(), 3 + 10);
        assert!(id.as_str()[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_id_varies_with_sequence() {
        let a = TicketId::generate("ABC123", "A1", t0(), 0);
        let b = TicketId::generate("ABC123", "A1", t0(), 1);
        assert_ne!(a, b);
        assert_eq!(a, TicketId::generate("ABC123", "A1", t0(), 0));
    }

    #[test]
    fn test_open_ticket_accessors() {
        let ticket = Ticket::open(TicketId::new("TKT1"), vehicle(), "A1", t0());
        assert!(ticket.is_open());
        assert_eq!(ticket.plate(), "ABC123");
        assert_eq!(ticket.space(), "A1");
        assert!(ticket.check_out_time().is_none());
        assert!(ticket.fee().is_none());
        assert!(ticket.stay().is_none());
    }

    #[test]
    fn test_close_once() {
        let mut ticket = Ticket::open(TicketId::new("TKT1"), vehicle(), "A1", t0());
        let out = t0() + Duration::hours(2);
        ticket.close(out, Money::from_cents(400)).unwrap();

        assert!(!ticket.is_open());
        assert_eq!(ticket.check_out_time(), Some(out));
        assert_eq!(ticket.fee(), Some(Money::from_cents(400)));
        assert_eq!(ticket.stay(), Some(Duration::hours(2)));
    }

    #[test]
    fn test_second_close_is_rejected_and_keeps_first_checkout() {
        let mut ticket = Ticket::open(TicketId::new("TKT1"), vehicle(), "A1", t0());
        let first = t0() + Duration::hours(1);
        ticket.close(first, Money::from_cents(200)).unwrap();

        let err = ticket
            .close(t0() + Duration::hours(5), Money::from_cents(1000))
            .unwrap_err();
        assert!(err.is_already_closed());
        assert_eq!(ticket.check_out_time(), Some(first));
        assert_eq!(ticket.fee(), Some(Money::from_cents(200)));
    }

    #[test]
    fn test_missing_fields() {
        let request = CheckInRequest {
            plate: "  ".to_string(),
            owner_name: "Sam".to_string(),
            model: String::new(),
            space: "B1".to_string(),
        };
        assert_eq!(request.missing_fields(), vec!["plate", "model"]);
        assert!(CheckInRequest::default().missing_fields().len() == 4);
    }

    #[test]
    fn test_normalized_plate() {
        let request = CheckInRequest {
            plate: " abc 123 ".to_string(),
            ..CheckInRequest::default()
        };
        assert_eq!(request.normalized_plate(), "ABC 123");
    }

    #[test]
    fn test_scan_payload_json_uses_camel_case() {
        let ticket = Ticket::open(TicketId::new("TKT123456"), vehicle(), "A1", t0());
        let json = serde_json::to_string(&ticket.scan_payload()).unwrap();
        assert!(json.contains("\"ticketId\":\"TKT123456\""));
        assert!(json.contains("\"ownerName\""));
        assert!(json.contains("\"checkInTime\""));
    }

    #[test]
    fn test_ticket_serializes_state_tag() {
        let mut ticket = Ticket::open(TicketId::new("TKT1"), vehicle(), "A1", t0());
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["state"], "open");

        ticket
            .close(t0() + Duration::hours(1), Money::from_cents(200))
            .unwrap();
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["state"], "closed");
        assert_eq!(json["fee"], 200);
    }
}
