//! `SQLite` schema definitions for lotkeeper.

/// SQL statement to create the zones table.
pub const CREATE_ZONES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS zones (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    hourly_rate_cents INTEGER
)
";

/// SQL statement to create the spaces table.
///
/// `status` holds the administrative status only; occupancy comes from open tickets.
pub const CREATE_SPACES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS spaces (
    id TEXT PRIMARY KEY,
    zone TEXT NOT NULL REFERENCES zones(code),
    kind TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'available',
    description TEXT
)
";

/// SQL statement to create the tickets table.
pub const CREATE_TICKETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tickets (
    id TEXT PRIMARY KEY,
    plate TEXT NOT NULL,
    owner_name TEXT NOT NULL,
    vehicle_model TEXT NOT NULL,
    space_id TEXT NOT NULL REFERENCES spaces(id),
    check_in_time TEXT NOT NULL,
    check_out_time TEXT,
    fee_cents INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// At most one open ticket per space.
pub const CREATE_OPEN_SPACE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_open_space
ON tickets(space_id) WHERE check_out_time IS NULL
";

/// SQL statement to create an index on check-in time for period queries.
pub const CREATE_CHECK_IN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_check_in ON tickets(check_in_time DESC)
";

/// SQL statement to create an index on checkout time for revenue queries.
pub const CREATE_CHECK_OUT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_check_out ON tickets(check_out_time DESC)
";

/// SQL statement to create an index on plate for vehicle history.
pub const CREATE_PLATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_plate ON tickets(plate)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ZONES_TABLE,
    CREATE_SPACES_TABLE,
    CREATE_TICKETS_TABLE,
    CREATE_OPEN_SPACE_INDEX,
    CREATE_CHECK_IN_INDEX,
    CREATE_CHECK_OUT_INDEX,
    CREATE_PLATE_INDEX,
    CREATE_METADATA_TABLE,
];
