//! `lotkeeper` - Parking lot ticketing
//!
//! This library checks vehicles in and out of a parking lot, prices stays by
//! the started hour, resolves tickets from ids or scanned QR payloads, and
//! keeps a persistent ticket ledger for occupancy and revenue reports.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod desk;
pub mod error;
pub mod fee;
pub mod logging;
pub mod lot;
pub mod report;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod ticket;

pub use config::Config;
pub use desk::{ParkingDesk, Quote};
pub use error::{Error, Result};
pub use fee::{calculate_fee, FeeSchedule, Money};
pub use logging::init_logging;
pub use lot::{OccupancyStats, Space, SpaceKind, SpaceStatus, Zone};
pub use report::{build_report, Report, ReportPeriod};
pub use resolver::{find_ticket, resolve_scan};
pub use storage::{Storage, StorageStats};
pub use store::{MemoryStore, ParkingStore};
pub use ticket::{Activity, CheckInRequest, Ticket, TicketId, TicketState, Vehicle};
