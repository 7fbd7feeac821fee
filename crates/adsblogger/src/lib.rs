//! `adsblogger` - Log flights and all-time records from an ADS-B receiver
//!
//! This library polls the `aircraft.json` feed published by readsb / tar1090,
//! groups individual sightings into flights, keeps the most extreme value of
//! every metric ever seen, and persists both to `SQLite`.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod flight;
pub mod logging;
pub mod metrics;
pub mod records;
pub mod service;
pub mod storage;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use feed::{FeedSource, Snapshot};
pub use flight::{Clock, Flight, Identity, IdentityField};
pub use logging::init_logging;
pub use metrics::{MetricKey, Metrics};
pub use records::{Direction, Record, RecordEvent, RecordSet};
pub use service::ShutdownHandle;
pub use storage::{Storage, StorageStats, WriteOutcome};
pub use tracker::{FlushReport, ShutdownReport, TickOutcome, Tracker};
