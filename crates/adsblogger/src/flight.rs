//! Flights and the identity rules that decide when two sightings are the same.
//!
//! A [`Flight`] is either a single observation decoded from one snapshot, or
//! the accumulation of several observations that were matched together.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;

/// Feed clock value in whole seconds since the Unix epoch.
pub type Clock = i64;

/// The fields that identify an aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    /// ICAO 24-bit transponder address.
    Hex,
    /// Flight number or callsign.
    Callsign,
    /// Aircraft registration.
    Registration,
    /// ICAO aircraft type designator.
    AircraftType,
}

impl IdentityField {
    /// Every identity field.
    pub const ALL: [IdentityField; 4] = [
        Self::Hex,
        Self::Callsign,
        Self::Registration,
        Self::AircraftType,
    ];
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex => write!(f, "hex"),
            Self::Callsign => write!(f, "callsign"),
            Self::Registration => write!(f, "registration"),
            Self::AircraftType => write!(f, "aircraft_type"),
        }
    }
}

/// Identity of an aircraft. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// ICAO 24-bit transponder address.
    pub hex: Option<String>,
    /// Flight number or callsign.
    pub callsign: Option<String>,
    /// Aircraft registration.
    pub registration: Option<String>,
    /// ICAO aircraft type designator.
    pub aircraft_type: Option<String>,
}

impl Identity {
    /// Identity with only a transponder address.
    #[must_use]
    pub fn with_hex(hex: impl Into<String>) -> Self {
        Self {
            hex: Some(hex.into()),
            ..Self::default()
        }
    }

    /// Get an identity field.
    #[must_use]
    pub fn get(&self, field: IdentityField) -> Option<&str> {
        match field {
            IdentityField::Hex => self.hex.as_deref(),
            IdentityField::Callsign => self.callsign.as_deref(),
            IdentityField::Registration => self.registration.as_deref(),
            IdentityField::AircraftType => self.aircraft_type.as_deref(),
        }
    }

    fn slot_mut(&mut self, field: IdentityField) -> &mut Option<String> {
        match field {
            IdentityField::Hex => &mut self.hex,
            IdentityField::Callsign => &mut self.callsign,
            IdentityField::Registration => &mut self.registration,
            IdentityField::AircraftType => &mut self.aircraft_type,
        }
    }

    /// Whether every identity field is unknown.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        IdentityField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Whether two identities can belong to the same aircraft.
    ///
    /// A field only disagrees when both sides know it and the values differ.
    #[must_use]
    pub fn is_compatible(&self, other: &Identity) -> bool {
        IdentityField::ALL
            .iter()
            .all(|field| match (self.get(*field), other.get(*field)) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hex: {}, Reg: {}, Type: {}, Flight: {}",
            self.hex.as_deref().unwrap_or("-"),
            self.registration.as_deref().unwrap_or("-"),
            self.aircraft_type.as_deref().unwrap_or("-"),
            self.callsign.as_deref().unwrap_or("-"),
        )
    }
}

/// One observation, or a tracked flight built from several.
#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    /// Who the aircraft is.
    pub identity: Identity,
    /// Latest known physical state.
    pub metrics: Metrics,
    /// Feed clock of the first sighting.
    pub start: Clock,
    /// Feed clock of the latest sighting.
    pub end: Clock,
}

impl Flight {
    /// A single sighting at `clock`.
    #[must_use]
    pub fn observed(identity: Identity, metrics: Metrics, clock: Clock) -> Self {
        Self {
            identity,
            metrics,
            start: clock,
            end: clock,
        }
    }

    /// Store key of this flight: `"{start}_{hex}"`.
    ///
    /// An unknown hex renders as `None`, the spelling used by existing
    /// databases.
    #[must_use]
    pub fn key(&self) -> String {
        flight_key(self.start, self.identity.hex.as_deref())
    }

    /// Whether `other` is the same physical flight as `self`.
    #[must_use]
    pub fn is_same_flight(&self, other: &Flight) -> bool {
        self.identity.is_compatible(&other.identity)
    }

    /// Whether the flight started inside the trailing window ending at `now`.
    #[must_use]
    pub fn is_within_window(&self, now: Clock, window: Clock) -> bool {
        self.start >= now - window
    }

    /// Fold a newer observation into this flight.
    ///
    /// Identity gaps are filled in both directions so that `observation`
    /// also carries the full identity afterwards. Fields listed in
    /// `always_overwrite` take the observation's value whenever it has one.
    /// Metrics are not merged: the live set becomes the observation's
    /// reading as is.
    pub fn merge(&mut self, observation: &mut Flight, always_overwrite: &[IdentityField]) {
        for field in IdentityField::ALL {
            let ours = self.identity.slot_mut(field);
            let theirs = observation.identity.slot_mut(field);
            match (ours.is_some(), theirs.is_some()) {
                (false, true) => ours.clone_from(theirs),
                (true, false) => theirs.clone_from(ours),
                _ => {}
            }
        }

        for field in always_overwrite {
            if let Some(value) = observation.identity.get(*field) {
                *self.identity.slot_mut(*field) = Some(value.to_string());
            }
        }

        self.start = self.start.min(observation.start);
        self.end = self.end.max(observation.end);

        self.metrics = observation.metrics;
    }
}

/// Format a flight key from its parts.
#[must_use]
pub fn flight_key(start: Clock, hex: Option<&str>) -> String {
    format!("{start}_{}", hex.unwrap_or("None"))
}
