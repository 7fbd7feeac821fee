//! `SQLite` schema definitions for adsblogger.
//!
//! Table and column names match databases written by earlier releases of
//! the logger, so an existing `adsb-logger.db` can be opened as is.

/// SQL statement to create the flights table.
pub const CREATE_AIRCRAFT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft (
    id TEXT PRIMARY KEY,
    time INTEGER,
    date TEXT,
    hex TEXT,
    registration TEXT,
    type TEXT,
    flight TEXT
)
";

/// SQL statement to create the records table.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    value REAL,
    id_aircraft TEXT,
    time INTEGER,
    date TEXT,
    hex TEXT,
    registration TEXT,
    type TEXT,
    flight TEXT
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create an index on flight start time.
pub const CREATE_AIRCRAFT_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_aircraft_time ON aircraft(time DESC)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_AIRCRAFT_TABLE,
    CREATE_RECORDS_TABLE,
    CREATE_METADATA_TABLE,
];
