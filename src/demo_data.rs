//! Demo data generators for the van assignment engine.
//!
//! Seeds an [`InMemoryBackend`] with a plausible station: a mostly-confirmed
//! roster, a mostly-drivable fleet, and a slice of previous-day assignments
//! so the affinity pass has something to prefer.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::InMemoryBackend;
use crate::domain::RosterDate;
use crate::dto::{AvailabilityDto, ReportIssueDto, StatusDto, VanAssignmentDto, VehicleDto};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                driver_count: 8,
                vehicle_count: 6,
                confirmed_ratio: 0.8,
                drivable_ratio: 0.85,
                carryover_ratio: 0.6,
            },
            DemoData::Large => DemoDataParameters {
                driver_count: 40,
                vehicle_count: 30,
                confirmed_ratio: 0.75,
                drivable_ratio: 0.85,
                carryover_ratio: 0.6,
            },
        }
    }
}

struct DemoDataParameters {
    driver_count: usize,
    vehicle_count: usize,
    /// Share of the roster whose availability decision is confirmed.
    confirmed_ratio: f64,
    /// Share of the fleet with a drivable issue report.
    drivable_ratio: f64,
    /// Share of yesterday's drivers who already drove "their" van.
    carryover_ratio: f64,
}

const SHIFTS: &[&str] = &["1-morning", "2-day", "3-evening"];

const STATUSES: &[(&str, &str, &str)] = &[
    ("st-ready", "Road ready", "#2e7d32"),
    ("st-tires", "Tires worn", "#f9a825"),
    ("st-inspection", "Inspection due", "#ef6c00"),
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bram", "Cleo", "Dev", "Edie", "Finn", "Gwen", "Hank", "Iris", "Jude",
];
const LAST_NAMES: &[&str] = &[
    "Archer", "Bell", "Cruz", "Dunn", "Eads", "Frey", "Gale", "Hale", "Ivers", "Joly",
];

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Seeds `backend` with a demo station for `date`.
///
/// Deterministic for a given preset: the generator is seeded, so repeated
/// runs produce the same roster, fleet, and carryover.
pub fn seed(backend: &InMemoryBackend, demo: DemoData, date: RosterDate) {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let names = generate_name_permutations(&mut rng);

    // Roster for the day: mostly confirmed, the rest still pending.
    let availability: Vec<AvailabilityDto> = (0..params.driver_count)
        .map(|i| AvailabilityDto {
            employee_id: format!("drv-{i:03}"),
            employee_name: names[i % names.len()].clone(),
            presence: if rng.gen_bool(params.confirmed_ratio) {
                "confirmed".to_string()
            } else {
                "pending".to_string()
            },
            shift_id: SHIFTS[i % SHIFTS.len()].to_string(),
        })
        .collect();
    backend.seed_availability(date, availability);

    // Fleet: every van has one open issue report carrying drivability and a
    // status from the table.
    let vehicles: Vec<VehicleDto> = (0..params.vehicle_count)
        .map(|i| VehicleDto {
            id: format!("van-{i:03}"),
            van_number: format!("V-{:02}", i + 1),
        })
        .collect();
    let issues: Vec<ReportIssueDto> = vehicles
        .iter()
        .map(|v| {
            let (status_id, _, _) = STATUSES[rng.gen_range(0..STATUSES.len())];
            ReportIssueDto {
                van_id: v.id.clone(),
                status_id: status_id.to_string(),
                drivable: rng.gen_bool(params.drivable_ratio),
            }
        })
        .collect();
    backend.seed_vehicles(vehicles);
    backend.seed_report_issues(issues);
    backend.seed_statuses(
        STATUSES
            .iter()
            .map(|(id, name, color)| StatusDto {
                id: (*id).to_string(),
                name: (*name).to_string(),
                color: (*color).to_string(),
            })
            .collect(),
    );

    // Yesterday's assignments: driver i drove van i, for a share of the
    // pairs. Index pairing keeps both uniqueness invariants by construction.
    let yesterday = date.pred();
    for i in 0..params.driver_count.min(params.vehicle_count) {
        if rng.gen_bool(params.carryover_ratio) {
            backend.seed_assignment(VanAssignmentDto {
                employee_id: format!("drv-{i:03}"),
                van_id: format!("van-{i:03}"),
                date: yesterday,
                status_id: "st-ready".to_string(),
            });
        }
    }
}

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}
