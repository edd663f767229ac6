//! Greedy auto-assignment of vans to drivers with previous-day affinity.
//!
//! Drivers tend to prefer "their" van, so the pass first tries to give each
//! unassigned driver the vehicle they drove the previous day, and only then
//! falls back to the first vehicle still free. This is a deliberate UX
//! heuristic, not an optimality claim: there is no bipartite matching here,
//! ties fall to stable input order, and a driver whose turn comes after the
//! fleet runs dry simply stays unassigned.

use std::collections::{HashMap, HashSet};

use crate::domain::{Assignment, Driver, RosterDate, Vehicle};

/// Terminal state of an auto-assign pass. Informational, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAssignOutcome {
    /// New pairings were produced; `unassigned` drivers were left over after
    /// the fleet ran out.
    Assigned { created: usize, unassigned: usize },
    /// Every confirmed driver already had a vehicle.
    AllDriversAssigned,
    /// No drivable vehicle was free to begin with.
    NoVehiclesAvailable,
}

impl AutoAssignOutcome {
    /// Dispatcher-facing status line.
    pub fn message(&self) -> String {
        match self {
            Self::Assigned {
                created,
                unassigned: 0,
            } => format!("assigned {created} driver(s)"),
            Self::Assigned { created, unassigned } => {
                format!("assigned {created} driver(s), {unassigned} left without a vehicle")
            }
            Self::AllDriversAssigned => "all drivers are already assigned".to_string(),
            Self::NoVehiclesAvailable => "no vehicles available".to_string(),
        }
    }
}

/// Computes new pairings for `date` between drivers and vehicles not yet in
/// `existing`.
///
/// `previous` maps driver id to the vehicle id they held on `date - 1`; the
/// caller builds it from the store and substitutes an empty map when that
/// read fails, degrading the pass to pure first-available order.
///
/// The returned pairs are session state only; nothing is persisted here.
/// Drivers are processed in the order given; no reordering, no fairness
/// policy. Total for any input: empty sets produce an empty result and an
/// informational outcome.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use van_assignment::autoassign::auto_assign;
/// use van_assignment::domain::{Driver, RosterDate, Vehicle};
///
/// let date = RosterDate::from_ymd(2024, 10, 21).unwrap();
/// let drivers = vec![Driver::new("a", "Amy"), Driver::new("b", "Beth")];
/// let vehicles = vec![
///     Vehicle::new("v1", "V-01").with_drivable(true),
///     Vehicle::new("v2", "V-02").with_drivable(true),
/// ];
/// let previous = HashMap::from([("a".to_string(), "v2".to_string())]);
///
/// let (pairs, _) = auto_assign(date, &drivers, &vehicles, &[], &previous);
/// // Amy keeps her van from yesterday, Beth takes the first one left.
/// assert_eq!(pairs[0].vehicle_id, "v2");
/// assert_eq!(pairs[1].vehicle_id, "v1");
/// ```
pub fn auto_assign(
    date: RosterDate,
    confirmed_drivers: &[Driver],
    drivable_vehicles: &[Vehicle],
    existing: &[Assignment],
    previous: &HashMap<String, String>,
) -> (Vec<Assignment>, AutoAssignOutcome) {
    let assigned_drivers: HashSet<&str> =
        existing.iter().map(|a| a.driver_id.as_str()).collect();
    let taken_vehicles: HashSet<&str> =
        existing.iter().map(|a| a.vehicle_id.as_str()).collect();

    let unassigned_drivers: Vec<&Driver> = confirmed_drivers
        .iter()
        .filter(|driver| !assigned_drivers.contains(driver.id.as_str()))
        .collect();
    if unassigned_drivers.is_empty() {
        return (Vec::new(), AutoAssignOutcome::AllDriversAssigned);
    }

    let mut available_vehicles: Vec<&Vehicle> = drivable_vehicles
        .iter()
        .filter(|vehicle| !taken_vehicles.contains(vehicle.id.as_str()))
        .collect();
    if available_vehicles.is_empty() {
        return (Vec::new(), AutoAssignOutcome::NoVehiclesAvailable);
    }

    let mut created = Vec::new();
    for driver in &unassigned_drivers {
        let preferred = previous
            .get(&driver.id)
            .and_then(|prev| available_vehicles.iter().position(|v| v.id == *prev));

        let slot = match preferred {
            Some(index) => Some(index),
            None if available_vehicles.is_empty() => None,
            None => Some(0),
        };

        if let Some(index) = slot {
            let vehicle = available_vehicles.remove(index);
            created.push(Assignment::new(&driver.id, &vehicle.id, date));
        }
    }

    let outcome = AutoAssignOutcome::Assigned {
        created: created.len(),
        unassigned: unassigned_drivers.len() - created.len(),
    };
    (created, outcome)
}
