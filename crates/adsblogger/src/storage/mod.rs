//! Storage layer for adsblogger.
//!
//! This module provides `SQLite`-based persistent storage for finished
//! flights and for the record values, keyed so that repeated writes of the
//! same flight or record replace the earlier row.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::DateTime;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flight::{Clock, Flight, Identity};
use crate::metrics::{MetricKey, Metrics};
use crate::records::{record_id, Direction, Record, RecordHolder};

/// What a single write did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was inserted.
    Inserted,
    /// A row with the same key but a different payload was replaced.
    Replaced,
    /// A row with the same key and payload already existed.
    Unchanged,
    /// Nothing to write (a record that was never set).
    Skipped,
}

/// Storage engine for flights and records.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Upserting finished flights and record holders
/// - Reading back recently started flights and all records
/// - Read-only access for inspection while the daemon is writing
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

type FlightRow = (
    Clock,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

type RecordRow = (
    Option<f64>,
    Option<String>,
    Option<Clock>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

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

        // WAL lets read-only inspection run beside the writing daemon
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Open an existing database for reading only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be opened.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| Error::DatabaseOpen {
                path: path.clone(),
                source,
            })?;
        debug!("Opened database read-only at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
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

    /// Write a flight, replacing any row with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn write_flight(&self, flight: &Flight) -> Result<WriteOutcome> {
        let id = flight.key();
        let identity = &flight.identity;
        let payload: FlightRow = (
            flight.start,
            identity.hex.clone(),
            identity.registration.clone(),
            identity.aircraft_type.clone(),
            identity.callsign.clone(),
        );

        let existing: Option<FlightRow> = self
            .conn
            .query_row(
                "SELECT time, hex, registration, type, flight FROM aircraft WHERE id = ?1",
                [&id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let outcome = match existing {
            Some(row) if row == payload => return Ok(WriteOutcome::Unchanged),
            Some(row) => {
                warn!(
                    "Flight {} already stored with different data {:?}, replacing",
                    id, row
                );
                WriteOutcome::Replaced
            }
            None => WriteOutcome::Inserted,
        };

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO aircraft (id, time, date, hex, registration, type, flight)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                id,
                flight.start,
                date_string(flight.start),
                identity.hex,
                identity.registration,
                identity.aircraft_type,
                identity.callsign,
            ],
        )?;

        debug!("Stored flight {} ({})", id, identity);
        Ok(outcome)
    }

    /// Write the current holder of a record, replacing the stored one.
    ///
    /// Records that were never set are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn write_record(&self, record: &Record) -> Result<WriteOutcome> {
        let Some(holder) = &record.holder else {
            return Ok(WriteOutcome::Skipped);
        };
        let id = record.id();
        let identity = &holder.identity;
        let payload: RecordRow = (
            Some(holder.value),
            record.flight_key(),
            Some(holder.timestamp),
            identity.hex.clone(),
            identity.registration.clone(),
            identity.aircraft_type.clone(),
            identity.callsign.clone(),
        );

        let existing: Option<RecordRow> = self
            .conn
            .query_row(
                r"
                SELECT value, id_aircraft, time, hex, registration, type, flight
                FROM records WHERE id = ?1
                ",
                [&id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let outcome = match existing {
            Some(row) if row == payload => return Ok(WriteOutcome::Unchanged),
            Some(_) => WriteOutcome::Replaced,
            None => WriteOutcome::Inserted,
        };

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO records
                (id, value, id_aircraft, time, date, hex, registration, type, flight)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                id,
                holder.value,
                record.flight_key(),
                holder.timestamp,
                date_string(holder.timestamp),
                identity.hex,
                identity.registration,
                identity.aircraft_type,
                identity.callsign,
            ],
        )?;

        debug!("Wrote {} record with value {} to database", id, holder.value);
        Ok(outcome)
    }

    /// Get flights that started at or after `since`.
    ///
    /// Stored flights carry no end time, so `end` equals `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_flights(&self, since: Clock) -> Result<Vec<Flight>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT time, hex, registration, type, flight
            FROM aircraft WHERE time >= ?1 ORDER BY time ASC
            ",
        )?;

        let flights = stmt
            .query_map([since], Self::row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flights)
    }

    /// Get the most recently started flights, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_flights(&self, limit: usize) -> Result<Vec<Flight>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT time, hex, registration, type, flight
            FROM aircraft ORDER BY time DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let flights = stmt
            .query_map([limit_i64], Self::row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flights)
    }

    /// Get every record, one per metric and direction.
    ///
    /// Records missing from the store, or stored without a value, are
    /// returned empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_records(&self) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT value, id_aircraft, time, hex, registration, type, flight
            FROM records WHERE id = ?1
            ",
        )?;

        let mut records = Vec::with_capacity(MetricKey::ALL.len() * Direction::ALL.len());
        let mut found = 0;
        for key in MetricKey::ALL {
            for direction in Direction::ALL {
                let id = record_id(key, direction);
                let row: Option<RecordRow> = stmt
                    .query_row([&id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })
                    .optional()?;

                let holder = row.and_then(Self::row_to_holder);
                if holder.is_some() {
                    found += 1;
                } else {
                    debug!("Record for {} not available in database", id);
                }
                records.push(Record {
                    key,
                    direction,
                    holder,
                    persisted: true,
                });
            }
        }

        info!("Read {} records from database", found);
        Ok(records)
    }

    /// Count stored flights.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flight_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM aircraft", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_flights = self.flight_count()?;

        let (oldest_flight, newest_flight): (Option<Clock>, Option<Clock>) = self
            .conn
            .query_row("SELECT MIN(time), MAX(time) FROM aircraft", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;

        let records_set: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE value IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_flights,
            records_set,
            oldest_flight,
            newest_flight,
            db_size_bytes,
        })
    }

    fn row_to_flight(row: &rusqlite::Row) -> rusqlite::Result<Flight> {
        let start: Clock = row.get(0)?;
        let identity = Identity {
            hex: row.get(1)?,
            registration: row.get(2)?,
            aircraft_type: row.get(3)?,
            callsign: row.get(4)?,
        };
        Ok(Flight::observed(identity, Metrics::default(), start))
    }

    fn row_to_holder(row: RecordRow) -> Option<RecordHolder> {
        let (value, flight_key, time, hex, registration, aircraft_type, callsign) = row;
        let value = value?;
        let timestamp = time.unwrap_or(0);
        let flight_start = flight_key
            .as_deref()
            .and_then(|key| key.split_once('_'))
            .and_then(|(start, _)| start.parse().ok())
            .unwrap_or(timestamp);

        Some(RecordHolder {
            value,
            identity: Identity {
                hex,
                callsign,
                registration,
                aircraft_type,
            },
            flight_start,
            timestamp,
        })
    }
}

/// UTC calendar date of a feed clock value, as stored in the `date` columns.
#[must_use]
pub fn date_string(clock: Clock) -> String {
    DateTime::from_timestamp(clock, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of flights stored.
    pub total_flights: i64,
    /// Number of records that hold a value.
    pub records_set: i64,
    /// Start time of the oldest flight.
    pub oldest_flight: Option<Clock>,
    /// Start time of the newest flight.
    pub newest_flight: Option<Clock>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
