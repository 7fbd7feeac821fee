//! Record tracking: the most extreme value ever seen for each metric.
//!
//! There is exactly one [`Record`] per metric and [`Direction`]. A record
//! starts without a holder, takes the first finite reading as its baseline,
//! and after that only changes on a strict improvement, so the earliest
//! holder keeps a tied record.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::flight::{flight_key, Clock, Flight, Identity};
use crate::metrics::MetricKey;

/// Whether a record tracks the largest or the smallest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Largest value wins.
    Max,
    /// Smallest value wins.
    Min,
}

impl Direction {
    /// Both directions, in storage order.
    pub const ALL: [Direction; 2] = [Self::Max, Self::Min];

    /// Suffix used in record keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Whether `candidate` strictly beats `best` in this direction.
    #[must_use]
    pub fn improves(self, candidate: f64, best: f64) -> bool {
        match self {
            Self::Max => candidate > best,
            Self::Min => candidate < best,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flight holding a record, as it was when the record was set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHolder {
    /// The record value.
    pub value: f64,
    /// Identity of the holding flight.
    pub identity: Identity,
    /// Start of the holding flight, used for its store key.
    pub flight_start: Clock,
    /// Feed clock of the observation that set the record.
    pub timestamp: Clock,
}

/// The extreme value of one metric in one direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The metric this record tracks.
    pub key: MetricKey,
    /// Max or min.
    pub direction: Direction,
    /// Current holder, `None` until the metric is first observed.
    pub holder: Option<RecordHolder>,
    /// Whether the current holder has been written to the store.
    pub persisted: bool,
}

impl Record {
    /// A record that has never been set.
    #[must_use]
    pub fn empty(key: MetricKey, direction: Direction) -> Self {
        Self {
            key,
            direction,
            holder: None,
            persisted: true,
        }
    }

    /// Store key of this record: `"{metric}_{max|min}"`.
    #[must_use]
    pub fn id(&self) -> String {
        record_id(self.key, self.direction)
    }

    /// Current value, if any.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.holder.as_ref().map(|h| h.value)
    }

    /// Store key of the holding flight.
    #[must_use]
    pub fn flight_key(&self) -> Option<String> {
        self.holder
            .as_ref()
            .map(|h| flight_key(h.flight_start, h.identity.hex.as_deref()))
    }

    /// Whether `value` would replace the current holder.
    ///
    /// Non-finite values never qualify. Any finite value qualifies against
    /// an empty record.
    #[must_use]
    pub fn qualifies(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match &self.holder {
            None => true,
            Some(holder) => self.direction.improves(value, holder.value),
        }
    }
}

/// Format a record key from its parts.
#[must_use]
pub fn record_id(key: MetricKey, direction: Direction) -> String {
    format!("{}_{}", key.as_str(), direction.as_str())
}

/// Notification that an observation set a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    /// The metric.
    pub key: MetricKey,
    /// Max or min.
    pub direction: Direction,
    /// The new record value.
    pub value: f64,
    /// The value it replaced, if the record was set before.
    pub previous: Option<f64>,
    /// Identity of the new holder.
    pub identity: Identity,
    /// Feed clock of the observation.
    pub timestamp: Clock,
}

/// All records, one per metric and direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSet {
    /// A set of empty records.
    #[must_use]
    pub fn new() -> Self {
        let records = MetricKey::ALL
            .into_iter()
            .flat_map(|key| {
                Direction::ALL
                    .into_iter()
                    .map(move |direction| Record::empty(key, direction))
            })
            .collect();
        Self { records }
    }

    /// Build the set from stored records.
    ///
    /// Missing pairs are filled with empty records and duplicates keep the
    /// first occurrence, so the set always holds one record per pair.
    #[must_use]
    pub fn from_records(stored: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        let mut seen = Vec::new();
        for record in stored {
            let pair = (record.key, record.direction);
            if seen.contains(&pair) {
                continue;
            }
            seen.push(pair);
            if let Some(slot) = set.get_mut(record.key, record.direction) {
                *slot = record;
            }
        }
        set
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, key: MetricKey, direction: Direction) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.key == key && r.direction == direction)
    }

    fn get_mut(&mut self, key: MetricKey, direction: Direction) -> Option<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.key == key && r.direction == direction)
    }

    /// Iterate over every record.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that have a holder.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.records.iter().filter(|r| r.holder.is_some()).count()
    }

    /// Records whose holder changed since they were last written.
    pub fn unpersisted(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| !r.persisted)
    }

    /// Mark a record as written to the store.
    pub fn mark_persisted(&mut self, key: MetricKey, direction: Direction) {
        if let Some(record) = self.get_mut(key, direction) {
            record.persisted = true;
        }
    }

    /// Compare an observation against every record and take over the ones
    /// it improves.
    ///
    /// The observation's `end` is used as the record timestamp.
    pub fn check_and_update(&mut self, observation: &Flight) -> Vec<RecordEvent> {
        let mut events = Vec::new();
        for (key, value) in observation.metrics.present() {
            for direction in Direction::ALL {
                let Some(record) = self.get_mut(key, direction) else {
                    continue;
                };
                if !record.qualifies(value) {
                    continue;
                }

                let previous = record.value();
                record.holder = Some(RecordHolder {
                    value,
                    identity: observation.identity.clone(),
                    flight_start: observation.start,
                    timestamp: observation.end,
                });
                record.persisted = false;

                info!(
                    "{} set new record for {} {}: {} ({})",
                    observation
                        .identity
                        .registration
                        .as_deref()
                        .unwrap_or("unknown registration"),
                    direction,
                    key,
                    value,
                    observation.identity,
                );
                events.push(RecordEvent {
                    key,
                    direction,
                    value,
                    previous,
                    identity: observation.identity.clone(),
                    timestamp: observation.end,
                });
            }
        }
        events
    }
}
