//! Error types for lotkeeper.
//!
//! This module defines all error types used throughout the lotkeeper crate.
//! Domain failures (unknown ticket, bad check-in input, double checkout) are
//! ordinary variants so callers can match on them and decide what to show.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The main error type for lotkeeper operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Ticket Errors ===
    /// No ticket matches the given identifier.
    #[error("ticket not found: {ticket_id}")]
    TicketNotFound {
        /// The identifier that was looked up.
        ticket_id: String,
    },

    /// Required input was missing or malformed.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// The ticket was already checked out.
    #[error("ticket {ticket_id} was already checked out at {checked_out_at}")]
    AlreadyClosed {
        /// The ticket that was already closed.
        ticket_id: String,
        /// When the original checkout happened.
        checked_out_at: DateTime<Utc>,
    },

    // === Lot Errors ===
    /// No space matches the given identifier.
    #[error("parking space not found: {space_id}")]
    SpaceNotFound {
        /// The space identifier that was looked up.
        space_id: String,
    },

    /// The space exists but cannot take a vehicle right now.
    #[error("parking space {space_id} is not available (currently {status})")]
    SpaceUnavailable {
        /// The requested space.
        space_id: String,
        /// The space's current status.
        status: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for lotkeeper operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a ticket-not-found error.
    #[must_use]
    pub fn ticket_not_found(ticket_id: impl Into<String>) -> Self {
        Self::TicketNotFound {
            ticket_id: ticket_id.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a space-not-found error.
    #[must_use]
    pub fn space_not_found(space_id: impl Into<String>) -> Self {
        Self::SpaceNotFound {
            space_id: space_id.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the ticket does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TicketNotFound { .. })
    }

    /// Check if this error is caused by bad caller input.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this error is a rejected second checkout.
    #[must_use]
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed { .. })
    }
}
