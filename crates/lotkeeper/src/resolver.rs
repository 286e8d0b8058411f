//! Ticket lookup by identifier or by scanned QR payload.

use tracing::debug;

use crate::error::{Error, Result};
use crate::store::ParkingStore;
use crate::ticket::{ScanPayload, Ticket};

/// Find a ticket by exact, case-sensitive id.
///
/// # Errors
///
/// Returns [`Error::TicketNotFound`] when no ticket has this id, or a storage
/// error if the lookup itself fails.
pub fn find_ticket<S: ParkingStore + ?Sized>(store: &S, ticket_id: &str) -> Result<Ticket> {
    debug!("Looking up ticket {}", ticket_id);
    store
        .ticket(ticket_id)?
        .ok_or_else(|| Error::ticket_not_found(ticket_id))
}

/// Extract the ticket id from a scanned payload.
///
/// Accepts the JSON object printed on tickets at check-in, or a bare id.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty payload, JSON that is not a
/// ticket payload, or a payload with a blank ticket id.
pub fn scanned_ticket_id(payload: &str) -> Result<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(Error::invalid_input("scan payload is empty"));
    }

    if payload.starts_with('{') {
        let parsed: ScanPayload = serde_json::from_str(payload)
            .map_err(|e| Error::invalid_input(format!("unreadable scan payload: {e}")))?;
        let id = parsed.ticket_id.trim();
        if id.is_empty() {
            return Err(Error::invalid_input("scan payload has no ticket id"));
        }
        return Ok(id.to_string());
    }

    if payload.chars().any(char::is_whitespace) {
        return Err(Error::invalid_input(format!(
            "scan payload is not a ticket id: {payload}"
        )));
    }
    Ok(payload.to_string())
}

/// Find the ticket referenced by a scanned payload.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the payload cannot be read and
/// [`Error::TicketNotFound`] if it names an unknown ticket.
pub fn resolve_scan<S: ParkingStore + ?Sized>(store: &S, payload: &str) -> Result<Ticket> {
    let ticket_id = scanned_ticket_id(payload)?;
    find_ticket(store, &ticket_id)
}
