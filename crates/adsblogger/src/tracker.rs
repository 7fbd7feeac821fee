//! Flight tracking state.
//!
//! The [`Tracker`] turns feed snapshots into tracked flights and records.
//! Each call to [`Tracker::process`] is one tick: stale check, matching,
//! record checking, then the status line and the store flush when their
//! timers are due. Timers run on the feed clock, not on wall time.

use tracing::{debug, info, trace, warn};

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::feed::Snapshot;
use crate::flight::{Clock, Flight};
use crate::records::{Record, RecordEvent, RecordSet};
use crate::storage::{Storage, WriteOutcome};

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// The snapshot clock did not advance; nothing else happened.
    pub stale: bool,
    /// Observations in the snapshot.
    pub observations: usize,
    /// Observations merged into a tracked flight.
    pub matched: usize,
    /// Observations that became new tracked flights.
    pub created: usize,
    /// Flights restored from the store on the first accepted snapshot.
    pub restored: usize,
    /// Records set by this snapshot.
    pub record_events: Vec<RecordEvent>,
    /// The status line was logged.
    pub status: bool,
    /// Present when the flush timer was due.
    pub flush: Option<FlushReport>,
}

impl TickOutcome {
    fn stale() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }
}

/// Result of writing records and evicting finished flights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records written to the store.
    pub records_written: usize,
    /// Flights removed from the tracked set.
    pub flights_evicted: usize,
    /// Writes that failed and were skipped.
    pub failures: usize,
}

/// Result of the termination sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Records written to the store.
    pub records_written: usize,
    /// Tracked flights written to the store.
    pub flights_written: usize,
    /// Writes that failed and were skipped.
    pub failures: usize,
}

/// In-memory tracking state backed by the store.
#[derive(Debug)]
pub struct Tracker {
    config: TrackingConfig,
    storage: Storage,
    flights: Vec<Flight>,
    records: RecordSet,
    last_clock: Option<Clock>,
    last_status: Option<Clock>,
    last_flush: Option<Clock>,
    restored: bool,
}

impl Tracker {
    /// Create a tracker, loading the current records from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    pub fn new(config: TrackingConfig, storage: Storage) -> Result<Self> {
        let records = RecordSet::from_records(storage.all_records()?);
        debug!(
            "Tracker ready with {} of {} records set",
            records.set_count(),
            records.len()
        );

        Ok(Self {
            config,
            storage,
            flights: Vec::new(),
            records,
            last_clock: None,
            last_status: None,
            last_flush: None,
            restored: false,
        })
    }

    /// Currently tracked flights, oldest first.
    #[must_use]
    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Current records.
    #[must_use]
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Clock of the last accepted snapshot.
    #[must_use]
    pub fn last_clock(&self) -> Option<Clock> {
        self.last_clock
    }

    /// The backing store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run one tick on a freshly fetched snapshot.
    pub fn process(&mut self, snapshot: Snapshot) -> TickOutcome {
        let now = snapshot.now;
        if let Some(last) = self.last_clock {
            if now <= last {
                trace!("Snapshot clock {} did not advance past {}", now, last);
                return TickOutcome::stale();
            }
        }
        self.last_clock = Some(now);

        let mut outcome = TickOutcome {
            observations: snapshot.observations.len(),
            ..TickOutcome::default()
        };

        if !self.restored {
            outcome.restored = self.restore(now);
        }

        let observations = self.match_observations(snapshot.observations, now, &mut outcome);

        for observation in observations.iter().filter(|o| !o.metrics.is_empty()) {
            outcome
                .record_events
                .extend(self.records.check_and_update(observation));
        }

        if is_due(self.last_status, now, self.config.status_interval()) {
            self.last_status = Some(now);
            outcome.status = true;
            info!(
                "{} aircraft in feed, {} flights tracked",
                outcome.observations,
                self.flights.len()
            );
        }

        if is_due(self.last_flush, now, self.config.flush_interval()) {
            self.last_flush = Some(now);
            outcome.flush = Some(self.flush(now));
        }

        outcome
    }

    /// Merge every observation into the newest compatible tracked flight
    /// that started inside the window, or track it as a new flight.
    ///
    /// Returns the observations with their identities backfilled and their
    /// start set to that of the flight they joined.
    fn match_observations(
        &mut self,
        observations: Vec<Flight>,
        now: Clock,
        outcome: &mut TickOutcome,
    ) -> Vec<Flight> {
        let window = self.config.uniqueness_window();
        let mut checked = Vec::with_capacity(observations.len());

        for mut observation in observations {
            let candidate = self
                .flights
                .iter_mut()
                .rev()
                .find(|flight| {
                    flight.is_within_window(now, window) && flight.is_same_flight(&observation)
                });

            if let Some(flight) = candidate {
                flight.merge(&mut observation, &self.config.always_overwrite);
                // Record holders refer to the tracked flight's store key.
                observation.start = flight.start;
                outcome.matched += 1;
            } else {
                if observation.identity.is_unknown() {
                    trace!("New flight without identifying fields");
                } else {
                    trace!("New flight {}", observation.identity);
                }
                self.flights.push(observation.clone());
                outcome.created += 1;
            }
            checked.push(observation);
        }

        checked
    }

    /// Pick up flights stored within the window before a restart.
    fn restore(&mut self, now: Clock) -> usize {
        self.restored = true;
        let since = now.saturating_sub(self.config.uniqueness_window());
        match self.storage.recent_flights(since) {
            Ok(stored) => {
                let count = stored.len();
                if count > 0 {
                    info!("Restored {} recent flights from database", count);
                }
                // Stored flights are older than anything seen this run.
                let mut flights = stored;
                flights.append(&mut self.flights);
                self.flights = flights;
                count
            }
            Err(e) => {
                warn!("Could not restore recent flights: {}", e);
                0
            }
        }
    }

    /// Write changed records, then evict and store flights that started
    /// before the window ending at `now`.
    pub fn flush(&mut self, now: Clock) -> FlushReport {
        let mut report = FlushReport::default();

        let pending: Vec<Record> = self.records.unpersisted().cloned().collect();
        for record in &pending {
            if self.write_record(record) {
                self.records.mark_persisted(record.key, record.direction);
                report.records_written += 1;
            } else {
                report.failures += 1;
            }
        }

        let window = self.config.uniqueness_window();
        let (finished, tracked): (Vec<Flight>, Vec<Flight>) = std::mem::take(&mut self.flights)
            .into_iter()
            .partition(|flight| !flight.is_within_window(now, window));
        self.flights = tracked;

        for flight in &finished {
            if !self.write_flight(flight) {
                report.failures += 1;
            }
        }
        report.flights_evicted = finished.len();

        info!(
            "Flushed {} records and {} finished flights to database, {} flights still tracked",
            report.records_written,
            report.flights_evicted,
            self.flights.len()
        );
        report
    }

    /// Termination sequence: store changed records and every tracked
    /// flight, whatever its age, then release the store.
    pub fn shutdown(mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        let pending: Vec<Record> = self.records.unpersisted().cloned().collect();
        for record in &pending {
            if self.write_record(record) {
                self.records.mark_persisted(record.key, record.direction);
                report.records_written += 1;
            } else {
                report.failures += 1;
            }
        }

        for flight in &self.flights {
            if self.write_flight(flight) {
                report.flights_written += 1;
            } else {
                report.failures += 1;
            }
        }

        info!(
            "Stored {} records and {} tracked flights on shutdown",
            report.records_written, report.flights_written
        );
        report
    }

    fn write_record(&self, record: &Record) -> bool {
        match self.storage.write_record(record) {
            Ok(outcome) => {
                trace!("Record {}: {:?}", record.id(), outcome);
                true
            }
            Err(e) => {
                warn!("Could not write record {}: {}", record.id(), e);
                false
            }
        }
    }

    fn write_flight(&self, flight: &Flight) -> bool {
        match self.storage.write_flight(flight) {
            Ok(WriteOutcome::Replaced) => {
                debug!("Flight {} replaced a stored row", flight.key());
                true
            }
            Ok(_) => true,
            Err(e) if e.is_constraint_violation() => {
                warn!("Key collision writing flight {}, skipped: {}", flight.key(), e);
                false
            }
            Err(e) => {
                warn!("Could not write flight {}: {}", flight.key(), e);
                false
            }
        }
    }
}

fn is_due(last: Option<Clock>, now: Clock, interval: Clock) -> bool {
    last.map_or(true, |last| now.saturating_sub(last) >= interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::Identity;
    use crate::metrics::{MetricKey, Metrics};
    use crate::records::{Direction, RecordHolder};

    fn tracker() -> Tracker {
        crate::logging::init_test_logging();
        Tracker::new(TrackingConfig::default(), Storage::open_in_memory().unwrap()).unwrap()
    }

    fn aircraft(hex: &str, alt: Option<f64>, now: Clock) -> Flight {
        let metrics = Metrics {
            alt_baro: alt,
            ..Metrics::default()
        };
        Flight::observed(Identity::with_hex(hex), metrics, now)
    }

    fn snapshot(now: Clock, observations: Vec<Flight>) -> Snapshot {
        Snapshot { now, observations }
    }

    fn alt_record(tracker: &Tracker, direction: Direction) -> &Record {
        tracker.records().get(MetricKey::AltBaro, direction).unwrap()
    }

    #[test]
    fn test_first_observation_creates_flight_and_records() {
        let mut tracker = tracker();
        let outcome = tracker.process(snapshot(
            1_000,
            vec![aircraft("A1B2C3", Some(35_000.0), 1_000)],
        ));

        assert!(!outcome.stale);
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.matched, 0);
        assert_eq!(tracker.flights().len(), 1);

        let max = alt_record(&tracker, Direction::Max);
        assert_eq!(max.value(), Some(35_000.0));
        let holder = max.holder.as_ref().unwrap();
        assert_eq!(holder.identity.hex.as_deref(), Some("A1B2C3"));
    }

    #[test]
    fn test_follow_up_observation_merges_and_raises_record() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", Some(35_000.0), 1_000)]));
        let outcome =
            tracker.process(snapshot(1_010, vec![aircraft("A1B2C3", Some(36_000.0), 1_010)]));

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.created, 0);
        assert_eq!(tracker.flights().len(), 1);
        assert_eq!(tracker.flights()[0].start, 1_000);
        assert_eq!(tracker.flights()[0].end, 1_010);

        assert_eq!(alt_record(&tracker, Direction::Max).value(), Some(36_000.0));
        assert_eq!(alt_record(&tracker, Direction::Min).value(), Some(35_000.0));
        assert_eq!(outcome.record_events.len(), 1);
    }

    #[test]
    fn test_tie_does_not_rewrite_record() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", Some(35_000.0), 1_000)]));
        tracker.process(snapshot(1_010, vec![aircraft("A1B2C3", Some(36_000.0), 1_010)]));
        let outcome =
            tracker.process(snapshot(1_020, vec![aircraft("A1B2C3", Some(36_000.0), 1_020)]));

        assert!(outcome.record_events.is_empty());
        let holder = alt_record(&tracker, Direction::Max).holder.as_ref().unwrap();
        assert_eq!(holder.timestamp, 1_010);
    }

    #[test]
    fn test_aged_flight_is_stored_and_not_merged_again() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", Some(35_000.0), 1_000)]));

        let report = tracker.flush(4_601);
        assert_eq!(report.flights_evicted, 1);
        assert!(tracker.flights().is_empty());
        let stored = tracker.storage().recent_flights(0).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key(), "1000_A1B2C3");

        let outcome =
            tracker.process(snapshot(4_602, vec![aircraft("A1B2C3", Some(1_000.0), 4_602)]));
        assert_eq!(outcome.created, 1);
        assert_eq!(tracker.flights()[0].start, 4_602);
    }

    #[test]
    fn test_eviction_boundary() {
        let mut tracker = tracker();
        tracker.process(snapshot(
            1_000,
            vec![aircraft("AAAAAA", None, 999), aircraft("BBBBBB", None, 1_000)],
        ));
        let report = tracker.flush(4_600);
        assert_eq!(report.flights_evicted, 1);
        assert_eq!(tracker.flights().len(), 1);
        assert_eq!(tracker.flights()[0].identity.hex.as_deref(), Some("BBBBBB"));
    }

    #[test]
    fn test_match_respects_window() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", None, 1_000)]));

        // Exactly at the boundary still matches.
        let outcome = tracker.process(snapshot(4_600, vec![aircraft("A1B2C3", None, 4_600)]));
        assert_eq!(outcome.matched, 1);

        // One second later the old flight is out of the window.
        let outcome = tracker.process(snapshot(4_601, vec![aircraft("A1B2C3", None, 4_601)]));
        assert_eq!(outcome.created, 1);
    }

    #[test]
    fn test_stale_snapshot_is_skipped() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", Some(1.0), 1_000)]));

        for now in [1_000, 999] {
            let outcome =
                tracker.process(snapshot(now, vec![aircraft("D4E5F6", Some(99_999.0), now)]));
            assert!(outcome.stale);
            assert!(outcome.record_events.is_empty());
            assert!(outcome.flush.is_none());
        }
        assert_eq!(tracker.flights().len(), 1);
        assert_eq!(tracker.last_clock(), Some(1_000));
        assert_eq!(alt_record(&tracker, Direction::Max).value(), Some(1.0));
    }

    #[test]
    fn test_unmatched_observation_still_sets_record() {
        let mut tracker = tracker();
        tracker.process(snapshot(1_000, vec![aircraft("AAAAAA", Some(30_000.0), 1_000)]));
        let outcome =
            tracker.process(snapshot(1_001, vec![aircraft("BBBBBB", Some(41_000.0), 1_001)]));

        assert_eq!(outcome.created, 1);
        let holder = alt_record(&tracker, Direction::Max).holder.as_ref().unwrap();
        assert_eq!(holder.identity.hex.as_deref(), Some("BBBBBB"));
        assert_eq!(holder.flight_start, 1_001);
    }

    #[test]
    fn test_newest_compatible_flight_is_preferred() {
        let mut tracker = tracker();
        let mut first = Identity::with_hex("A1B2C3");
        first.callsign = Some("AAA100".to_string());
        let mut second = Identity::with_hex("A1B2C3");
        second.callsign = Some("BBB200".to_string());

        tracker.process(snapshot(
            1_000,
            vec![
                Flight::observed(first, Metrics::default(), 1_000),
                Flight::observed(second, Metrics::default(), 1_000),
            ],
        ));
        assert_eq!(tracker.flights().len(), 2);

        tracker.process(snapshot(1_050, vec![aircraft("A1B2C3", None, 1_050)]));
        assert_eq!(tracker.flights().len(), 2);
        assert_eq!(tracker.flights()[0].end, 1_000);
        assert_eq!(tracker.flights()[1].end, 1_050);
    }

    #[test]
    fn test_record_holder_gets_backfilled_identity() {
        let mut tracker = tracker();
        let mut identity = Identity::with_hex("A1B2C3");
        identity.registration = Some("D-AIAB".to_string());
        tracker.process(snapshot(
            1_000,
            vec![Flight::observed(identity, Metrics::default(), 1_000)],
        ));

        tracker.process(snapshot(1_010, vec![aircraft("A1B2C3", Some(12_000.0), 1_010)]));

        let holder = alt_record(&tracker, Direction::Max).holder.as_ref().unwrap();
        assert_eq!(holder.identity.registration.as_deref(), Some("D-AIAB"));
        assert_eq!(holder.flight_start, 1_000);
    }

    #[test]
    fn test_flush_timer_runs_on_feed_clock() {
        let mut tracker = tracker();
        let outcome = tracker.process(snapshot(1_000, vec![aircraft("A1B2C3", Some(1.0), 1_000)]));
        let first = outcome.flush.unwrap();
        assert_eq!(first.records_written, 2);

        let outcome = tracker.process(snapshot(1_010, vec![aircraft("A1B2C3", Some(2.0), 1_010)]));
        assert!(outcome.flush.is_none());
        assert_eq!(tracker.records().unpersisted().count(), 1);

        let outcome = tracker.process(snapshot(1_900, vec![]));
        assert_eq!(outcome.flush.unwrap().records_written, 1);
        assert_eq!(tracker.records().unpersisted().count(), 0);
    }

    #[test]
    fn test_records_loaded_from_store() {
        let storage = Storage::open_in_memory().unwrap();
        let record = Record {
            key: MetricKey::Gs,
            direction: Direction::Max,
            holder: Some(RecordHolder {
                value: 640.0,
                identity: Identity::with_hex("A1B2C3"),
                flight_start: 10,
                timestamp: 20,
            }),
            persisted: false,
        };
        storage.write_record(&record).unwrap();

        let tracker = Tracker::new(TrackingConfig::default(), storage).unwrap();
        let loaded = tracker.records().get(MetricKey::Gs, Direction::Max).unwrap();
        assert_eq!(loaded.value(), Some(640.0));
        assert!(loaded.persisted);
        assert_eq!(tracker.records().len(), MetricKey::ALL.len() * 2);
    }

    #[test]
    fn test_recent_flights_restored_on_first_snapshot() {
        let storage = Storage::open_in_memory().unwrap();
        storage.write_flight(&aircraft("A1B2C3", None, 500)).unwrap();
        storage.write_flight(&aircraft("OLD000", None, 100)).unwrap();

        let mut tracker = Tracker::new(TrackingConfig::default(), storage).unwrap();
        let outcome = tracker.process(snapshot(4_000, vec![aircraft("A1B2C3", None, 4_000)]));

        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.matched, 1);
        assert_eq!(tracker.flights().len(), 1);
        assert_eq!(tracker.flights()[0].start, 500);
        assert_eq!(tracker.flights()[0].end, 4_000);

        let outcome = tracker.process(snapshot(4_010, vec![]));
        assert_eq!(outcome.restored, 0);
    }

    #[test]
    fn test_shutdown_stores_everything() {
        let path = std::env::temp_dir().join(format!(
            "adsblogger_tracker_test_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut tracker =
            Tracker::new(TrackingConfig::default(), Storage::open(&path).unwrap()).unwrap();
        tracker.process(snapshot(1_000, vec![aircraft("AAAAAA", Some(10.0), 1_000)]));
        tracker.process(snapshot(1_010, vec![aircraft("BBBBBB", Some(20.0), 1_010)]));

        let report = tracker.shutdown();
        assert_eq!(report.flights_written, 2);
        assert_eq!(report.records_written, 1);
        assert_eq!(report.failures, 0);

        let reader = Storage::open_read_only(&path).unwrap();
        assert_eq!(reader.flight_count().unwrap(), 2);
        let records = reader.all_records().unwrap();
        let max = records
            .iter()
            .find(|r| r.key == MetricKey::AltBaro && r.direction == Direction::Max)
            .unwrap();
        assert_eq!(max.value(), Some(20.0));

        drop(reader);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_failed_writes_are_skipped() {
        let path = std::env::temp_dir().join(format!(
            "adsblogger_tracker_failed_writes_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        drop(Storage::open(&path).unwrap());

        let read_only = Storage::open_read_only(&path).unwrap();
        let mut tracker = Tracker::new(TrackingConfig::default(), read_only).unwrap();

        let outcome = tracker.process(snapshot(
            1_000,
            vec![
                aircraft("AAAAAA", Some(10.0), 1_000),
                aircraft("BBBBBB", Some(20.0), 1_000),
            ],
        ));
        assert_eq!(
            outcome.flush,
            Some(FlushReport {
                records_written: 0,
                flights_evicted: 0,
                failures: 2,
            })
        );

        // Aged flights leave memory even when their write fails.
        let report = tracker.flush(10_000);
        assert_eq!(
            report,
            FlushReport {
                records_written: 0,
                flights_evicted: 2,
                failures: 4,
            }
        );
        assert!(tracker.flights().is_empty());
        assert_eq!(tracker.records().unpersisted().count(), 2);

        let report = tracker.shutdown();
        assert_eq!(report.records_written, 0);
        assert_eq!(report.flights_written, 0);
        assert_eq!(report.failures, 2);

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_status_line_timer() {
        let mut tracker = tracker();
        assert!(tracker.process(snapshot(1_000, vec![])).status);
        assert!(!tracker.process(snapshot(1_010, vec![])).status);
        assert!(!tracker.process(snapshot(1_179, vec![])).status);
        assert!(tracker.process(snapshot(1_180, vec![])).status);

        // Stale snapshots never log.
        assert!(!tracker.process(snapshot(1_180, vec![])).status);
    }

    #[test]
    fn test_observation_without_metrics_is_tracked_only() {
        let mut tracker = tracker();
        let anonymous = Flight::observed(Identity::default(), Metrics::default(), 1_000);
        let outcome = tracker.process(snapshot(
            1_000,
            vec![anonymous, aircraft("A1B2C3", None, 1_000)],
        ));

        assert_eq!(outcome.observations, 2);
        assert_eq!(outcome.matched + outcome.created, 2);
        assert!(outcome.record_events.is_empty());
        assert_eq!(tracker.records().set_count(), 0);
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(None, 0, 900));
        assert!(!is_due(Some(100), 999, 900));
        assert!(is_due(Some(100), 1_000, 900));
    }
}
