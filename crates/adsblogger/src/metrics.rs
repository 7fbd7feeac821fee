//! Metric vector describing the physical state of one observation.
//!
//! Every metric is optional: the feed omits fields it has not decoded, and
//! an absent value is "unset", never zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The metrics tracked for every observation.
///
/// The string form is the feed-native field name, which is also the prefix
/// of the record keys in the store (`alt_baro_max`, `gs_min`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Barometric altitude in feet.
    AltBaro,
    /// Geometric (GNSS) altitude in feet.
    AltGeom,
    /// Ground speed in knots.
    Gs,
    /// Indicated airspeed in knots.
    Ias,
    /// Mach number.
    Mach,
    /// Roll angle in degrees, negative is left.
    Roll,
    /// Barometric vertical rate in feet per minute.
    BaroRate,
    /// Geometric vertical rate in feet per minute.
    GeomRate,
    /// Received signal strength in dBFS.
    Rssi,
    /// Wind speed in knots.
    Ws,
    /// Outside air temperature in degrees Celsius.
    Oat,
    /// Distance from the receiver in nautical miles.
    RDst,
}

impl MetricKey {
    /// Every metric key, in storage order.
    pub const ALL: [MetricKey; 12] = [
        Self::AltBaro,
        Self::AltGeom,
        Self::Gs,
        Self::Ias,
        Self::Mach,
        Self::Roll,
        Self::BaroRate,
        Self::GeomRate,
        Self::Rssi,
        Self::Ws,
        Self::Oat,
        Self::RDst,
    ];

    /// The feed-native field name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AltBaro => "alt_baro",
            Self::AltGeom => "alt_geom",
            Self::Gs => "gs",
            Self::Ias => "ias",
            Self::Mach => "mach",
            Self::Roll => "roll",
            Self::BaroRate => "baro_rate",
            Self::GeomRate => "geom_rate",
            Self::Rssi => "rssi",
            Self::Ws => "ws",
            Self::Oat => "oat",
            Self::RDst => "r_dst",
        }
    }

    /// A human readable label for reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AltBaro => "Altitude (baro, ft)",
            Self::AltGeom => "Altitude (geom, ft)",
            Self::Gs => "Ground speed (kt)",
            Self::Ias => "Indicated airspeed (kt)",
            Self::Mach => "Mach",
            Self::Roll => "Roll (deg)",
            Self::BaroRate => "Vertical rate (baro, ft/min)",
            Self::GeomRate => "Vertical rate (geom, ft/min)",
            Self::Rssi => "Signal strength (dBFS)",
            Self::Ws => "Wind speed (kt)",
            Self::Oat => "Outside air temp (C)",
            Self::RDst => "Distance (nm)",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::internal(format!("unknown metric key: {s}")))
    }
}

/// The set of metric values for one observation or flight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    /// Barometric altitude.
    pub alt_baro: Option<f64>,
    /// Geometric altitude.
    pub alt_geom: Option<f64>,
    /// Ground speed.
    pub gs: Option<f64>,
    /// Indicated airspeed.
    pub ias: Option<f64>,
    /// Mach number.
    pub mach: Option<f64>,
    /// Roll angle.
    pub roll: Option<f64>,
    /// Barometric vertical rate.
    pub baro_rate: Option<f64>,
    /// Geometric vertical rate.
    pub geom_rate: Option<f64>,
    /// Signal strength.
    pub rssi: Option<f64>,
    /// Wind speed.
    pub ws: Option<f64>,
    /// Outside air temperature.
    pub oat: Option<f64>,
    /// Distance from the receiver.
    pub r_dst: Option<f64>,
}

impl Metrics {
    /// Get the value for a metric.
    #[must_use]
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        *self.slot(key)
    }

    /// Set or clear the value for a metric.
    pub fn set(&mut self, key: MetricKey, value: Option<f64>) {
        *self.slot_mut(key) = value;
    }

    /// Fill every absent field from `other`.
    ///
    /// Fields that already hold a value are left untouched.
    pub fn merge_from(&mut self, other: &Metrics) {
        for key in MetricKey::ALL {
            let slot = self.slot_mut(key);
            if slot.is_none() {
                *slot = other.get(key);
            }
        }
    }

    /// Whether no metric holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        MetricKey::ALL.iter().all(|key| self.get(*key).is_none())
    }

    /// Iterate over the metrics that hold a value.
    pub fn present(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        MetricKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
    }

    fn slot(&self, key: MetricKey) -> &Option<f64> {
        match key {
            MetricKey::AltBaro => &self.alt_baro,
            MetricKey::AltGeom => &self.alt_geom,
            MetricKey::Gs => &self.gs,
            MetricKey::Ias => &self.ias,
            MetricKey::Mach => &self.mach,
            MetricKey::Roll => &self.roll,
            MetricKey::BaroRate => &self.baro_rate,
            MetricKey::GeomRate => &self.geom_rate,
            MetricKey::Rssi => &self.rssi,
            MetricKey::Ws => &self.ws,
            MetricKey::Oat => &self.oat,
            MetricKey::RDst => &self.r_dst,
        }
    }

    fn slot_mut(&mut self, key: MetricKey) -> &mut Option<f64> {
        match key {
            MetricKey::AltBaro => &mut self.alt_baro,
            MetricKey::AltGeom => &mut self.alt_geom,
            MetricKey::Gs => &mut self.gs,
            MetricKey::Ias => &mut self.ias,
            MetricKey::Mach => &mut self.mach,
            MetricKey::Roll => &mut self.roll,
            MetricKey::BaroRate => &mut self.baro_rate,
            MetricKey::GeomRate => &mut self.geom_rate,
            MetricKey::Rssi => &mut self.rssi,
            MetricKey::Ws => &mut self.ws,
            MetricKey::Oat => &mut self.oat,
            MetricKey::RDst => &mut self.r_dst,
        }
    }
}
