//! Domain model for daily van assignment.
//!
//! # Overview
//!
//! Models one operating day of a delivery station:
//! - [`Driver`]s confirmed to work a date, carrying the shift used for
//!   display ordering
//! - [`Vehicle`]s with a drivability projection and a display status
//! - [`Assignment`]s, the `(driver, vehicle, date)` triples that are the
//!   unit of persistence
//! - [`RosterDate`], the backend's day-granular wire date
//!
//! # Design
//!
//! All per-date uniqueness rules live on the collections that hold
//! assignments, not here; these types are plain data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format for calendar days, e.g. `"Sun Oct 20 2024"`.
///
/// The backend keys its records by this exact string. It is not ISO-8601 and
/// must be reproduced byte-for-byte: a mismatched rendering does not fail, it
/// silently matches nothing.
pub const DATE_WIRE_FORMAT: &str = "%a %b %d %Y";

/// A calendar day in the backend's wire format.
///
/// Comparisons are by day; there is no time component. The serde
/// representation is the wire string, so a `RosterDate` can be embedded in
/// paths, query strings, and JSON bodies without further formatting.
///
/// # Examples
///
/// ```
/// use van_assignment::domain::RosterDate;
///
/// let day: RosterDate = "Sun Oct 20 2024".parse().unwrap();
/// assert_eq!(day.to_string(), "Sun Oct 20 2024");
/// assert_eq!(day.pred().to_string(), "Sat Oct 19 2024");
///
/// // Single-digit days are zero-padded on the wire.
/// let padded: RosterDate = "Sat Oct 05 2024".parse().unwrap();
/// assert_eq!(padded.to_string(), "Sat Oct 05 2024");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosterDate(NaiveDate);

impl RosterDate {
    /// Creates a roster date from a calendar day.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Creates a roster date from year/month/day, `None` if out of range.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The underlying calendar day.
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// The previous calendar day.
    ///
    /// Saturates at the calendar origin, which no operating day reaches.
    pub fn pred(&self) -> Self {
        self.0.pred_opt().map(Self).unwrap_or(*self)
    }
}

impl std::fmt::Display for RosterDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DATE_WIRE_FORMAT))
    }
}

impl std::str::FromStr for RosterDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DATE_WIRE_FORMAT).map(Self)
    }
}

impl From<NaiveDate> for RosterDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for RosterDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RosterDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A driver confirmed to work a date.
///
/// Produced by the availability resolver from the HR availability workflow;
/// read-only to this engine. `shift_id` is the shift the confirmation was
/// made for and drives display ordering only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shift_id: String,
}

impl Driver {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shift_id: String::new(),
        }
    }

    /// Sets the shift the confirmation was made for.
    pub fn with_shift(mut self, shift_id: impl Into<String>) -> Self {
        self.shift_id = shift_id.into();
        self
    }
}

/// Display status of a vehicle, joined from the backend's status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatus {
    pub label: String,
    pub color: String,
}

impl VehicleStatus {
    /// Fallback when an issue's status id does not resolve.
    pub fn unknown() -> Self {
        Self {
            label: "Unknown".to_string(),
            color: "#9e9e9e".to_string(),
        }
    }
}

impl Default for VehicleStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A fleet unit.
///
/// `drivable` is a projection, not stored state: true iff an open issue
/// report references the vehicle with `drivable == true`. The status is
/// display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    /// Fleet number or label shown to dispatchers, e.g. `"V-12"`.
    pub number: String,
    pub drivable: bool,
    #[serde(default)]
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn new(id: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            drivable: false,
            status: VehicleStatus::unknown(),
        }
    }

    pub fn with_drivable(mut self, drivable: bool) -> Self {
        self.drivable = drivable;
        self
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = status;
        self
    }
}

/// A `(driver, vehicle, date)` pairing.
///
/// For a fixed date, both the driver and the vehicle appear in at most one
/// assignment. Created by the manual controller or the auto-assign pass,
/// superseded by a later upsert for the same `(driver, date)`, removed by
/// explicit unassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub driver_id: String,
    pub vehicle_id: String,
    pub date: RosterDate,
}

impl Assignment {
    pub fn new(
        driver_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        date: RosterDate,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            vehicle_id: vehicle_id.into(),
            date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oct(day: u32) -> RosterDate {
        RosterDate::from_ymd(2024, 10, day).unwrap()
    }

    #[test]
    fn test_wire_format_round_trip() {
        let day = oct(20);
        assert_eq!(day.to_string(), "Sun Oct 20 2024");
        assert_eq!("Sun Oct 20 2024".parse::<RosterDate>().unwrap(), day);
    }

    #[test]
    fn test_wire_format_zero_pads_day() {
        let day = oct(5);
        assert_eq!(day.to_string(), "Sat Oct 05 2024");
    }

    #[test]
    fn test_wire_format_rejects_mismatched_weekday() {
        // Oct 20 2024 is a Sunday; a wrong weekday must not parse into a
        // different key.
        assert!("Mon Oct 20 2024".parse::<RosterDate>().is_err());
    }

    #[test]
    fn test_pred_crosses_month_boundary() {
        let first = RosterDate::from_ymd(2024, 11, 1).unwrap();
        assert_eq!(first.pred(), RosterDate::from_ymd(2024, 10, 31).unwrap());
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let day = oct(20);
        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(json, "\"Sun Oct 20 2024\"");
        let back: RosterDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day);
    }

    #[test]
    fn test_vehicle_status_defaults_to_unknown() {
        let vehicle = Vehicle::new("v1", "V-01");
        assert_eq!(vehicle.status.label, "Unknown");
        assert!(!vehicle.drivable);
    }
}
