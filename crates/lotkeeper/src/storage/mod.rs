//! Storage layer for lotkeeper.
//!
//! This module provides `SQLite`-based persistent storage for the lot layout
//! and the ticket ledger. Tickets are never deleted; closed tickets feed
//! reports and activity listings.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fee::Money;
use crate::lot::{next_space_ids, Space, SpaceKind, SpaceStatus, Zone};
use crate::store::ParkingStore;
use crate::ticket::{Activity, ActivityKind, Ticket, TicketId, TicketState, Vehicle};

/// Columns selected for every ticket query, in `row_to_ticket` order.
const TICKET_COLUMNS: &str = "id, plate, owner_name, vehicle_model, space_id, \
                              check_in_time, check_out_time, fee_cents";

/// Space columns with the status resolved against open tickets.
const SPACE_SELECT: &str = r"
SELECT s.id, s.zone, s.kind,
       CASE WHEN t.id IS NULL THEN s.status ELSE 'occupied' END,
       s.description
FROM spaces s
LEFT JOIN tickets t ON t.space_id = s.id AND t.check_out_time IS NULL
";

/// Persistent storage for zones, spaces and tickets.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Lot layout ===

    /// Get a zone by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_zone(&self, code: &str) -> Result<Option<Zone>> {
        let zone = self
            .conn
            .query_row(
                "SELECT code, name, hourly_rate_cents FROM zones WHERE code = ?1",
                [code],
                Self::row_to_zone,
            )
            .optional()?;
        Ok(zone)
    }

    /// All zones, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn zones(&self) -> Result<Vec<Zone>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, name, hourly_rate_cents FROM zones ORDER BY code")?;
        let zones = stmt
            .query_map([], Self::row_to_zone)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(zones)
    }

    /// Add `count` available spaces to a zone, numbered after its existing spaces.
    ///
    /// The zone is created, or its name and rate updated, in the same
    /// transaction, so a rejected call leaves the lot unchanged.
    /// Returns the created spaces.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero or the database operation fails.
    pub fn add_spaces(
        &mut self,
        zone: &Zone,
        count: usize,
        kind: SpaceKind,
        description: Option<&str>,
    ) -> Result<Vec<Space>> {
        if count == 0 {
            return Err(Error::invalid_input("number of spaces must be at least 1"));
        }

        let existing: Vec<String> = self
            .spaces(Some(zone.code.as_str()))?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let ids = next_space_ids(&zone.code, existing.iter().map(String::as_str), count);
        let rate = zone.hourly_rate.map(|r| to_db_cents(r.cents())).transpose()?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r"
            INSERT INTO zones (code, name, hourly_rate_cents) VALUES (?1, ?2, ?3)
            ON CONFLICT(code) DO UPDATE SET name = excluded.name,
                                            hourly_rate_cents = excluded.hourly_rate_cents
            ",
            params![zone.code, zone.name, rate],
        )?;
        let mut created = Vec::with_capacity(ids.len());
        for id in ids {
            tx.execute(
                "INSERT INTO spaces (id, zone, kind, status, description) VALUES (?1, ?2, ?3, 'available', ?4)",
                params![id, zone.code, kind.to_string(), description],
            )?;
            let mut space = Space::new(id, zone.code.as_str(), kind);
            space.description = description.map(str::to_string);
            created.push(space);
        }
        tx.commit()?;

        info!("Added {} {} spaces to zone {}", created.len(), kind, zone.code);
        Ok(created)
    }

    /// Load the demo zones and spaces, skipping any that already exist.
    ///
    /// Returns the number of spaces inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn seed_demo_lot(&mut self) -> Result<usize> {
        let (zones, spaces) = crate::lot::demo_lot();
        let tx = self.conn.transaction()?;
        for zone in &zones {
            let rate = zone.hourly_rate.map(|r| to_db_cents(r.cents())).transpose()?;
            tx.execute(
                "INSERT OR IGNORE INTO zones (code, name, hourly_rate_cents) VALUES (?1, ?2, ?3)",
                params![zone.code, zone.name, rate],
            )?;
        }
        let mut inserted = 0;
        for space in &spaces {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO spaces (id, zone, kind, status) VALUES (?1, ?2, ?3, ?4)",
                params![
                    space.id,
                    space.zone,
                    space.kind.to_string(),
                    space.status.to_string()
                ],
            )?;
        }
        tx.commit()?;

        info!("Seeded demo lot ({} new spaces)", inserted);
        Ok(inserted)
    }

    /// Get a space with its effective status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_space(&self, id: &str) -> Result<Option<Space>> {
        let sql = format!("{SPACE_SELECT} WHERE s.id = ?1");
        let space = self
            .conn
            .query_row(&sql, [id], Self::row_to_space)
            .optional()?;
        Ok(space)
    }

    /// Spaces with their effective status, optionally limited to one zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn spaces(&self, zone: Option<&str>) -> Result<Vec<Space>> {
        let sql = format!(
            "{SPACE_SELECT} WHERE (?1 IS NULL OR s.zone = ?1) ORDER BY s.zone, length(s.id), s.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let spaces = stmt
            .query_map([zone], Self::row_to_space)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(spaces)
    }

    /// Set the administrative status of a space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for `occupied` (which only check-in
    /// sets), [`Error::SpaceNotFound`] for an unknown space, or a database error.
    pub fn set_space_status(&self, id: &str, status: SpaceStatus) -> Result<()> {
        if !status.is_administrative() {
            return Err(Error::invalid_input(
                "occupied is set by check-in, not by hand",
            ));
        }
        let affected = self.conn.execute(
            "UPDATE spaces SET status = ?2 WHERE id = ?1",
            params![id, status.to_string()],
        )?;
        if affected == 0 {
            return Err(Error::space_not_found(id));
        }
        info!("Space {} set to {}", id, status);
        Ok(())
    }

    // === Tickets ===

    /// Persist a new open ticket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpaceUnavailable`] if the space already has an open
    /// ticket, or a database error (including a duplicate id).
    pub fn add_ticket(&self, ticket: &Ticket) -> Result<()> {
        if let Some(open) = self.open_ticket_for_space(ticket.space())? {
            return Err(Error::SpaceUnavailable {
                space_id: ticket.space().to_string(),
                status: format!("occupied by {}", open.id()),
            });
        }

        let (check_out, fee) = match ticket.state() {
            TicketState::Open => (None, None),
            TicketState::Closed {
                check_out_time,
                fee,
            } => (Some(to_db_time(*check_out_time)), Some(to_db_cents(fee.cents())?)),
        };

        let vehicle = ticket.vehicle();
        self.conn.execute(
            r"
            INSERT INTO tickets (id, plate, owner_name, vehicle_model, space_id,
                                 check_in_time, check_out_time, fee_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                ticket.id().as_str(),
                vehicle.plate,
                vehicle.owner_name,
                vehicle.model,
                ticket.space(),
                to_db_time(ticket.check_in_time()),
                check_out,
                fee,
            ],
        )?;
        debug!("Inserted ticket {}", ticket.id());
        Ok(())
    }

    /// Get a ticket by exact id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");
        let ticket = self
            .conn
            .query_row(&sql, [id], Self::row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    /// The open ticket on a space, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn open_ticket_for_space(&self, space_id: &str) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE space_id = ?1 AND check_out_time IS NULL"
        );
        let ticket = self
            .conn
            .query_row(&sql, [space_id], Self::row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    /// Record a checkout if the ticket is still open.
    ///
    /// Returns `true` if the ticket was closed by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_checkout(
        &self,
        id: &TicketId,
        check_out_time: DateTime<Utc>,
        fee: Money,
    ) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE tickets SET check_out_time = ?2, fee_cents = ?3
            WHERE id = ?1 AND check_out_time IS NULL
            ",
            params![
                id.as_str(),
                to_db_time(check_out_time),
                to_db_cents(fee.cents())?
            ],
        )?;
        Ok(affected > 0)
    }

    /// Tickets checked in within `[since, until]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tickets_checked_in_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let sql = format!(
            r"
            SELECT {TICKET_COLUMNS} FROM tickets
            WHERE check_in_time >= ?1 AND check_in_time <= ?2
            ORDER BY check_in_time
            "
        );
        self.query_tickets(&sql, params![to_db_time(since), to_db_time(until)])
    }

    /// Tickets checked out within `[since, until]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tickets_closed_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let sql = format!(
            r"
            SELECT {TICKET_COLUMNS} FROM tickets
            WHERE check_out_time IS NOT NULL AND check_out_time >= ?1 AND check_out_time <= ?2
            ORDER BY check_out_time
            "
        );
        self.query_tickets(&sql, params![to_db_time(since), to_db_time(until)])
    }

    /// Tickets for a plate, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tickets_for_plate(&self, plate: &str, limit: usize) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE plate = ?1 ORDER BY check_in_time DESC LIMIT ?2"
        );
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_tickets(&sql, params![plate.trim().to_uppercase(), limit_i64])
    }

    /// Latest check-in and checkout events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT kind, at, ticket_id, plate, space_id, zone FROM (
                SELECT 'check_in' AS kind, t.check_in_time AS at, t.id AS ticket_id,
                       t.plate, t.space_id, s.zone
                FROM tickets t JOIN spaces s ON s.id = t.space_id
                UNION ALL
                SELECT 'check_out', t.check_out_time, t.id, t.plate, t.space_id, s.zone
                FROM tickets t JOIN spaces s ON s.id = t.space_id
                WHERE t.check_out_time IS NOT NULL
            )
            ORDER BY at DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let activity = stmt
            .query_map([limit_i64], |row| {
                let kind: String = row.get(0)?;
                Ok(Activity {
                    kind: if kind == "check_out" {
                        ActivityKind::CheckOut
                    } else {
                        ActivityKind::CheckIn
                    },
                    at: parse_db_time(&row.get::<_, String>(1)?, 1)?,
                    ticket_id: TicketId::new(row.get::<_, String>(2)?),
                    plate: row.get(3)?,
                    space: row.get(4)?,
                    zone: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(activity)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_tickets, open_tickets): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(*) - COUNT(check_out_time) FROM tickets",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_spaces: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM spaces", [], |row| row.get(0))?;

        let oldest: Option<String> = self
            .conn
            .query_row("SELECT MIN(check_in_time) FROM tickets", [], |row| row.get(0))?;
        let newest: Option<String> = self
            .conn
            .query_row("SELECT MAX(check_in_time) FROM tickets", [], |row| row.get(0))?;

        let oldest_check_in = oldest.and_then(|s| parse_db_time(&s, 0).ok());
        let newest_check_in = newest.and_then(|s| parse_db_time(&s, 0).ok());

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_tickets,
            open_tickets,
            total_spaces,
            oldest_check_in,
            newest_check_in,
            db_size_bytes,
        })
    }

    fn query_tickets(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tickets = stmt
            .query_map(params, Self::row_to_ticket)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    fn row_to_zone(row: &rusqlite::Row) -> rusqlite::Result<Zone> {
        let rate: Option<i64> = row.get(2)?;
        Ok(Zone {
            code: row.get(0)?,
            name: row.get(1)?,
            hourly_rate: rate
                .map(|cents| from_db_cents(cents, 2))
                .transpose()?
                .map(Money::from_cents),
        })
    }

    fn row_to_space(row: &rusqlite::Row) -> rusqlite::Result<Space> {
        let id: String = row.get(0)?;
        let kind_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;

        let kind = kind_str.parse().unwrap_or_else(|_| {
            warn!("Unknown space kind {} on {}, treating as uncovered", kind_str, id);
            SpaceKind::Uncovered
        });
        let status = status_str.parse().unwrap_or_else(|_| {
            warn!("Unknown space status {} on {}, treating as maintenance", status_str, id);
            SpaceStatus::Maintenance
        });

        Ok(Space {
            id,
            zone: row.get(1)?,
            kind,
            status,
            description: row.get(4)?,
        })
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: String = row.get(0)?;
        let vehicle = Vehicle {
            plate: row.get(1)?,
            owner_name: row.get(2)?,
            model: row.get(3)?,
        };
        let space: String = row.get(4)?;
        let check_in_time = parse_db_time(&row.get::<_, String>(5)?, 5)?;
        let check_out: Option<String> = row.get(6)?;
        let fee_cents: Option<i64> = row.get(7)?;

        let state = match check_out {
            None => TicketState::Open,
            Some(out) => {
                let fee = match fee_cents {
                    Some(cents) => Money::from_cents(from_db_cents(cents, 7)?),
                    None => {
                        warn!("Closed ticket {} has no fee recorded", id);
                        Money::ZERO
                    }
                };
                TicketState::Closed {
                    check_out_time: parse_db_time(&out, 6)?,
                    fee,
                }
            }
        };

        Ok(Ticket::restore(
            TicketId::new(id),
            vehicle,
            space,
            check_in_time,
            state,
        ))
    }
}

impl ParkingStore for Storage {
    fn space(&self, id: &str) -> Result<Option<Space>> {
        self.get_space(id)
    }

    fn zone(&self, code: &str) -> Result<Option<Zone>> {
        self.get_zone(code)
    }

    fn ticket(&self, id: &str) -> Result<Option<Ticket>> {
        self.get_ticket(id)
    }

    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.add_ticket(ticket)
    }

    fn close_ticket(
        &mut self,
        id: &TicketId,
        check_out_time: DateTime<Utc>,
        fee: Money,
    ) -> Result<bool> {
        self.record_checkout(id, check_out_time, fee)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Tickets ever issued.
    pub total_tickets: i64,
    /// Tickets still open.
    pub open_tickets: i64,
    /// Spaces in the lot.
    pub total_spaces: i64,
    /// Earliest check-in on record.
    pub oldest_check_in: Option<DateTime<Utc>>,
    /// Latest check-in on record.
    pub newest_check_in: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Fixed-width RFC 3339 so text comparison orders like time.
fn to_db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn to_db_cents(cents: u64) -> Result<i64> {
    i64::try_from(cents).map_err(|_| Error::invalid_input(format!("amount too large: {cents}")))
}

fn from_db_cents(cents: i64, column: usize) -> rusqlite::Result<u64> {
    u64::try_from(cents)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}
