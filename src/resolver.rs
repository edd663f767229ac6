//! Read-only projections of the backend: who can drive, what can be driven.
//!
//! Both resolvers follow the same degradation policy: a failed fetch is
//! logged and collapses to an empty list. An empty roster or fleet is a
//! valid, if degraded, state for the rest of the engine, never a reason to
//! abort a session.

use std::collections::HashMap;

use tracing::warn;

use crate::backend::Backend;
use crate::domain::{Driver, RosterDate, Vehicle, VehicleStatus};
use crate::dto::AvailabilityDto;

/// Availability decision value that marks a driver as working the date.
pub const PRESENCE_CONFIRMED: &str = "confirmed";

/// Drivers confirmed to work `date`, sorted by shift then name for display.
///
/// The shift ordering established here is the only ordering later stages
/// rely on; the auto-assign pass consumes drivers in exactly this order.
pub async fn resolve_confirmed_drivers<B: Backend + ?Sized>(
    backend: &B,
    dsp_code: &str,
    date: RosterDate,
) -> Vec<Driver> {
    let rows = match backend.confirmed_availability(dsp_code, date).await {
        Ok(rows) => rows,
        Err(error) => {
            warn!(%date, %error, "availability fetch failed, treating roster as empty");
            return Vec::new();
        }
    };

    let mut drivers: Vec<Driver> = rows
        .into_iter()
        .filter(|row| row.presence == PRESENCE_CONFIRMED)
        .map(AvailabilityDto::into_driver)
        .collect();

    drivers.sort_by(|a, b| a.shift_id.cmp(&b.shift_id).then_with(|| a.name.cmp(&b.name)));
    drivers
}

/// Vehicles currently drivable, annotated with their display status.
///
/// A vehicle qualifies when at least one issue report flags it
/// `drivable == true`; the report's status id is joined against the status
/// table, falling back to [`VehicleStatus::unknown`] when it does not
/// resolve. The three reads are independent and issued concurrently.
///
/// Vehicles are not date-scoped on the backend; the date parameter keeps the
/// call site's scoping and feeds the degradation log.
pub async fn resolve_drivable_vehicles<B: Backend + ?Sized>(
    backend: &B,
    dsp_code: &str,
    date: RosterDate,
) -> Vec<Vehicle> {
    let (vehicles, issues, statuses) = tokio::join!(
        backend.all_vehicles(dsp_code),
        backend.all_report_issues(dsp_code),
        backend.all_statuses(dsp_code),
    );

    let vehicles = vehicles.unwrap_or_else(|error| {
        warn!(%date, %error, "vehicle fetch failed, treating fleet as empty");
        Vec::new()
    });
    let issues = issues.unwrap_or_else(|error| {
        warn!(%date, %error, "issue report fetch failed, no vehicle is drivable");
        Vec::new()
    });
    let statuses = statuses.unwrap_or_else(|error| {
        warn!(%date, %error, "status fetch failed, statuses degrade to Unknown");
        Vec::new()
    });

    let status_by_id: HashMap<String, VehicleStatus> = statuses
        .into_iter()
        .map(|status| (status.id.clone(), status.into_status()))
        .collect();

    let drivable_status_by_van: HashMap<String, String> = issues
        .into_iter()
        .filter(|issue| issue.drivable)
        .map(|issue| (issue.van_id, issue.status_id))
        .collect();

    vehicles
        .into_iter()
        .filter_map(|dto| {
            let status_id = drivable_status_by_van.get(&dto.id)?;
            let status = status_by_id
                .get(status_id)
                .cloned()
                .unwrap_or_else(VehicleStatus::unknown);
            Some(dto.into_vehicle().with_drivable(true).with_status(status))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::dto::{ReportIssueDto, StatusDto, VehicleDto};

    const DSP: &str = "DLV1";

    fn oct(day: u32) -> RosterDate {
        RosterDate::from_ymd(2024, 10, day).unwrap()
    }

    fn availability(id: &str, name: &str, presence: &str, shift: &str) -> AvailabilityDto {
        AvailabilityDto {
            employee_id: id.to_string(),
            employee_name: name.to_string(),
            presence: presence.to_string(),
            shift_id: shift.to_string(),
        }
    }

    #[tokio::test]
    async fn test_only_confirmed_drivers_survive() {
        let backend = InMemoryBackend::new();
        backend.seed_availability(
            oct(21),
            vec![
                availability("d1", "Amy Cole", "confirmed", "morning"),
                availability("d2", "Dan Fox", "pending", "morning"),
                availability("d3", "Beth Green", "confirmed", "evening"),
            ],
        );

        let drivers = resolve_confirmed_drivers(&backend, DSP, oct(21)).await;
        let ids: Vec<&str> = drivers.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d3", "d1"]);
    }

    #[tokio::test]
    async fn test_drivers_sorted_by_shift_then_name() {
        let backend = InMemoryBackend::new();
        backend.seed_availability(
            oct(21),
            vec![
                availability("d1", "Hugo Watt", "confirmed", "morning"),
                availability("d2", "Amy Cole", "confirmed", "morning"),
                availability("d3", "Ivy Poe", "confirmed", "day"),
            ],
        );

        let drivers = resolve_confirmed_drivers(&backend, DSP, oct(21)).await;
        let names: Vec<&str> = drivers.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Ivy Poe", "Amy Cole", "Hugo Watt"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_empty_roster() {
        let backend = InMemoryBackend::new();
        backend.seed_availability(
            oct(21),
            vec![availability("d1", "Amy Cole", "confirmed", "morning")],
        );
        backend.set_fail_reads(true);

        let drivers = resolve_confirmed_drivers(&backend, DSP, oct(21)).await;
        assert!(drivers.is_empty());
    }

    #[tokio::test]
    async fn test_drivable_requires_flagged_issue_report() {
        let backend = InMemoryBackend::new();
        backend.seed_vehicles(vec![
            VehicleDto {
                id: "v1".to_string(),
                van_number: "V-01".to_string(),
            },
            VehicleDto {
                id: "v2".to_string(),
                van_number: "V-02".to_string(),
            },
            VehicleDto {
                id: "v3".to_string(),
                van_number: "V-03".to_string(),
            },
        ]);
        backend.seed_report_issues(vec![
            ReportIssueDto {
                van_id: "v1".to_string(),
                status_id: "ok".to_string(),
                drivable: true,
            },
            ReportIssueDto {
                van_id: "v2".to_string(),
                status_id: "shop".to_string(),
                drivable: false,
            },
        ]);
        backend.seed_statuses(vec![StatusDto {
            id: "ok".to_string(),
            name: "Road ready".to_string(),
            color: "#2e7d32".to_string(),
        }]);

        let vehicles = resolve_drivable_vehicles(&backend, DSP, oct(21)).await;
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].id, "v1");
        assert!(vehicles[0].drivable);
        assert_eq!(vehicles[0].status.label, "Road ready");
    }

    #[tokio::test]
    async fn test_unresolved_status_falls_back_to_unknown() {
        let backend = InMemoryBackend::new();
        backend.seed_vehicles(vec![VehicleDto {
            id: "v1".to_string(),
            van_number: "V-01".to_string(),
        }]);
        backend.seed_report_issues(vec![ReportIssueDto {
            van_id: "v1".to_string(),
            status_id: "missing".to_string(),
            drivable: true,
        }]);

        let vehicles = resolve_drivable_vehicles(&backend, DSP, oct(21)).await;
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].status, VehicleStatus::unknown());
    }

    #[tokio::test]
    async fn test_fleet_fetch_failure_yields_empty_fleet() {
        let backend = InMemoryBackend::new();
        backend.set_fail_reads(true);
        let vehicles = resolve_drivable_vehicles(&backend, DSP, oct(21)).await;
        assert!(vehicles.is_empty());
    }
}
