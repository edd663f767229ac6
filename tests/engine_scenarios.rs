//! End-to-end scenarios through resolvers, session, heuristic, and store.

use std::sync::Arc;

use van_assignment::autoassign::{auto_assign, AutoAssignOutcome};
use van_assignment::backend::InMemoryBackend;
use van_assignment::controller::SelectionController;
use van_assignment::domain::RosterDate;
use van_assignment::dto::{AvailabilityDto, ReportIssueDto, StatusDto, VanAssignmentDto, VehicleDto};
use van_assignment::session::RosterSession;
use van_assignment::store::AssignmentStore;

const DSP: &str = "DLV1";

fn oct(day: u32) -> RosterDate {
    RosterDate::from_ymd(2024, 10, day).unwrap()
}

fn confirmed(id: &str, name: &str, shift: &str) -> AvailabilityDto {
    AvailabilityDto {
        employee_id: id.to_string(),
        employee_name: name.to_string(),
        presence: "confirmed".to_string(),
        shift_id: shift.to_string(),
    }
}

fn drivable_van(id: &str, number: &str) -> (VehicleDto, ReportIssueDto) {
    (
        VehicleDto {
            id: id.to_string(),
            van_number: number.to_string(),
        },
        ReportIssueDto {
            van_id: id.to_string(),
            status_id: "st-ready".to_string(),
            drivable: true,
        },
    )
}

/// Backend with drivers A, B, C confirmed for Oct 21, vans V1 and V2
/// drivable, and A driving V2 the day before.
fn station() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_availability(
        oct(21),
        vec![
            confirmed("a", "Ada Archer", "1-morning"),
            confirmed("b", "Bram Bell", "2-day"),
            confirmed("c", "Cleo Cruz", "3-evening"),
        ],
    );

    let (vans, issues): (Vec<_>, Vec<_>) = [drivable_van("v1", "V-01"), drivable_van("v2", "V-02")]
        .into_iter()
        .unzip();
    backend.seed_vehicles(vans);
    backend.seed_report_issues(issues);
    backend.seed_statuses(vec![StatusDto {
        id: "st-ready".to_string(),
        name: "Road ready".to_string(),
        color: "#2e7d32".to_string(),
    }]);

    backend.seed_assignment(VanAssignmentDto {
        employee_id: "a".to_string(),
        van_id: "v2".to_string(),
        date: oct(20),
        status_id: "st-ready".to_string(),
    });
    backend
}

fn store(backend: &Arc<InMemoryBackend>) -> AssignmentStore<InMemoryBackend> {
    AssignmentStore::new(backend.clone(), DSP, "st-ready")
}

async fn confirm_all(
    store: &AssignmentStore<InMemoryBackend>,
    session: &mut RosterSession,
) -> usize {
    let pending = session.pending().to_vec();
    let mut persisted = 0;
    for pair in pending {
        let assignment = store
            .upsert(&pair.driver_id, &pair.vehicle_id, pair.date)
            .await
            .expect("confirm should persist cleanly");
        session.mark_confirmed(assignment);
        persisted += 1;
    }
    persisted
}

#[tokio::test]
async fn test_auto_assign_prefers_yesterdays_van_then_exhausts() {
    let backend = station();
    let store = store(&backend);

    let mut session = RosterSession::load(backend.as_ref(), &store, DSP, oct(21)).await;
    assert_eq!(session.drivers().len(), 3);
    assert_eq!(session.vehicles().len(), 2);
    assert!(session.confirmed().is_empty());

    let previous = store.previous_day_map(oct(21)).await;
    let (pairs, outcome) = auto_assign(
        oct(21),
        session.drivers(),
        session.vehicles(),
        &session.assignments(),
        &previous,
    );

    let got: Vec<(&str, &str)> = pairs
        .iter()
        .map(|p| (p.driver_id.as_str(), p.vehicle_id.as_str()))
        .collect();
    assert_eq!(got, vec![("a", "v2"), ("b", "v1")]);
    assert_eq!(
        outcome,
        AutoAssignOutcome::Assigned {
            created: 2,
            unassigned: 1
        }
    );

    session.stage_all(pairs);
    assert_eq!(confirm_all(&store, &mut session).await, 2);

    // The backend now holds exactly the two pairings.
    let persisted = store.get(oct(21)).await.unwrap();
    assert_eq!(persisted.len(), 2);

    // A second pass over a reloaded session has nothing left to hand out.
    let reloaded = RosterSession::load(backend.as_ref(), &store, DSP, oct(21)).await;
    let previous = store.previous_day_map(oct(21)).await;
    let (pairs, outcome) = auto_assign(
        oct(21),
        reloaded.drivers(),
        reloaded.vehicles(),
        &reloaded.assignments(),
        &previous,
    );
    assert!(pairs.is_empty());
    assert_eq!(outcome, AutoAssignOutcome::NoVehiclesAvailable);
}

#[tokio::test]
async fn test_uniqueness_survives_manual_auto_and_persist_mix() {
    let backend = station();
    let store = store(&backend);

    let mut session = RosterSession::load(backend.as_ref(), &store, DSP, oct(21)).await;
    let mut controller = SelectionController::new();

    // Manual pairing first: C takes V1.
    controller.select_driver(&mut session, "c");
    controller
        .select_vehicle(&mut session, "v1")
        .expect("v1 is free");

    // Auto-assign fills in around it.
    let previous = store.previous_day_map(oct(21)).await;
    let (pairs, _) = auto_assign(
        oct(21),
        session.drivers(),
        session.vehicles(),
        &session.assignments(),
        &previous,
    );
    session.stage_all(pairs);
    confirm_all(&store, &mut session).await;

    let persisted = store.get(oct(21)).await.unwrap();
    assert_eq!(persisted.len(), 2);

    let mut drivers: Vec<&str> = persisted.iter().map(|a| a.driver_id.as_str()).collect();
    let mut vehicles: Vec<&str> = persisted.iter().map(|a| a.vehicle_id.as_str()).collect();
    drivers.sort();
    vehicles.sort();
    drivers.dedup();
    vehicles.dedup();
    assert_eq!(drivers.len(), persisted.len());
    assert_eq!(vehicles.len(), persisted.len());

    // A kept their van through the affinity pass despite C grabbing V1.
    assert!(persisted
        .iter()
        .any(|a| a.driver_id == "a" && a.vehicle_id == "v2"));
    assert!(persisted
        .iter()
        .any(|a| a.driver_id == "c" && a.vehicle_id == "v1"));
}

#[tokio::test]
async fn test_unassign_frees_vehicle_for_next_pass() {
    let backend = station();
    let store = store(&backend);

    let mut session = RosterSession::load(backend.as_ref(), &store, DSP, oct(21)).await;
    let previous = store.previous_day_map(oct(21)).await;
    let (pairs, _) = auto_assign(
        oct(21),
        session.drivers(),
        session.vehicles(),
        &session.assignments(),
        &previous,
    );
    session.stage_all(pairs);
    confirm_all(&store, &mut session).await;

    // Hold gesture on B releases V1.
    store.delete("b", oct(21)).await.unwrap();
    session.remove_driver("b");
    assert_eq!(store.get(oct(21)).await.unwrap().len(), 1);

    // V1 is back in play. B is still confirmed and comes before C in shift
    // order, so the next pass hands V1 straight back to B.
    let previous = store.previous_day_map(oct(21)).await;
    let (pairs, _) = auto_assign(
        oct(21),
        session.drivers(),
        session.vehicles(),
        &session.assignments(),
        &previous,
    );
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].driver_id, "b");
    assert_eq!(pairs[0].vehicle_id, "v1");
}

#[tokio::test]
async fn test_degraded_backend_loads_empty_editable_session() {
    let backend = station();
    backend.set_fail_reads(true);
    let store = store(&backend);

    let session = RosterSession::load(backend.as_ref(), &store, DSP, oct(21)).await;
    assert!(session.drivers().is_empty());
    assert!(session.vehicles().is_empty());
    assert!(session.confirmed().is_empty());

    // Auto-assign over the degraded session terminates informationally.
    let (pairs, outcome) = auto_assign(
        oct(21),
        session.drivers(),
        session.vehicles(),
        &session.assignments(),
        &std::collections::HashMap::new(),
    );
    assert!(pairs.is_empty());
    assert_eq!(outcome, AutoAssignOutcome::AllDriversAssigned);
}
