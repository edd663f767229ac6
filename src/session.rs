//! Per-date editing session over the assignment set.
//!
//! The session makes the write phases explicit: `confirmed` mirrors what the
//! backend has persisted, `pending` holds edits that exist only in memory
//! until the dispatcher confirms. Every mutation validates the per-date
//! uniqueness invariants against the union of both phases, so an invalid
//! pairing can never become pending in the first place.
//!
//! A session is owned by whoever loaded it; there is no cross-session
//! coordination for the same date. The `busy` flag serializes auto-assign
//! and confirm within one session; it is a UI guard, not a lock.

use thiserror::Error;
use tracing::warn;

use crate::backend::Backend;
use crate::domain::{Assignment, Driver, RosterDate, Vehicle};
use crate::resolver;
use crate::store::AssignmentStore;

/// Errors raised by in-session mutations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The vehicle is already paired with a different driver on this date,
    /// in either phase.
    #[error("vehicle {vehicle_id} is already assigned on {date}")]
    VehicleTaken {
        vehicle_id: String,
        date: RosterDate,
    },

    /// An auto-assign or confirm is already in flight for this session.
    #[error("another operation is in flight for this session")]
    Busy,
}

/// One dispatcher's working state for one date.
pub struct RosterSession {
    date: RosterDate,
    drivers: Vec<Driver>,
    vehicles: Vec<Vehicle>,
    confirmed: Vec<Assignment>,
    pending: Vec<Assignment>,
    busy: bool,
}

impl RosterSession {
    pub fn new(
        date: RosterDate,
        drivers: Vec<Driver>,
        vehicles: Vec<Vehicle>,
        confirmed: Vec<Assignment>,
    ) -> Self {
        Self {
            date,
            drivers,
            vehicles,
            confirmed,
            pending: Vec::new(),
            busy: false,
        }
    }

    /// Loads a session for `date`: roster and fleet resolve concurrently,
    /// then the persisted assignments come in. Every read degrades to empty
    /// on failure, so an unreachable backend yields an empty, editable day.
    pub async fn load<B: Backend>(
        backend: &B,
        store: &AssignmentStore<B>,
        dsp_code: &str,
        date: RosterDate,
    ) -> Self {
        let (drivers, vehicles) = tokio::join!(
            resolver::resolve_confirmed_drivers(backend, dsp_code, date),
            resolver::resolve_drivable_vehicles(backend, dsp_code, date),
        );

        let confirmed = match store.get(date).await {
            Ok(assignments) => assignments,
            Err(error) => {
                warn!(%date, %error, "assignment fetch failed, starting from empty");
                Vec::new()
            }
        };

        Self::new(date, drivers, vehicles, confirmed)
    }

    pub fn date(&self) -> RosterDate {
        self.date
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn confirmed(&self) -> &[Assignment] {
        &self.confirmed
    }

    pub fn pending(&self) -> &[Assignment] {
        &self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claims the busy flag for an auto-assign or confirm.
    pub fn begin_busy(&mut self) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        self.busy = true;
        Ok(())
    }

    pub fn end_busy(&mut self) {
        self.busy = false;
    }

    /// The merged per-driver view: pending edits shadow confirmed records.
    pub fn assignments(&self) -> Vec<Assignment> {
        let mut merged: Vec<Assignment> = self
            .confirmed
            .iter()
            .filter(|a| !self.pending.iter().any(|p| p.driver_id == a.driver_id))
            .cloned()
            .collect();
        merged.extend(self.pending.iter().cloned());
        merged
    }

    /// The vehicle the driver holds in the merged view, if any.
    pub fn vehicle_of(&self, driver_id: &str) -> Option<String> {
        self.assignments()
            .into_iter()
            .find(|a| a.driver_id == driver_id)
            .map(|a| a.vehicle_id)
    }

    fn vehicle_taken_by_other(&self, vehicle_id: &str, driver_id: &str) -> bool {
        self.assignments()
            .iter()
            .any(|a| a.vehicle_id == vehicle_id && a.driver_id != driver_id)
    }

    /// Stages a pairing for this date.
    ///
    /// Re-pairing a driver replaces their pending entry (or shadows their
    /// confirmed one); staging the pairing a driver already holds is a
    /// no-op.
    pub fn stage(
        &mut self,
        driver_id: &str,
        vehicle_id: &str,
    ) -> Result<Assignment, SessionError> {
        if self.vehicle_taken_by_other(vehicle_id, driver_id) {
            return Err(SessionError::VehicleTaken {
                vehicle_id: vehicle_id.to_string(),
                date: self.date,
            });
        }

        let assignment = Assignment::new(driver_id, vehicle_id, self.date);
        if self.vehicle_of(driver_id).as_deref() == Some(vehicle_id) {
            return Ok(assignment);
        }

        match self.pending.iter_mut().find(|p| p.driver_id == driver_id) {
            Some(entry) => entry.vehicle_id = vehicle_id.to_string(),
            None => self.pending.push(assignment.clone()),
        }
        Ok(assignment)
    }

    /// Stages the output of an auto-assign pass.
    ///
    /// The pairs were computed against this session's merged view, so each
    /// one must still be free; anything that is not gets dropped with a
    /// warning rather than corrupting the invariant.
    pub fn stage_all(&mut self, pairs: Vec<Assignment>) {
        for pair in pairs {
            if let Err(error) = self.stage(&pair.driver_id, &pair.vehicle_id) {
                warn!(%error, driver = %pair.driver_id, "dropping stale auto-assign pair");
            }
        }
    }

    /// Discards the pending edit for a driver, if any.
    pub fn remove_pending(&mut self, driver_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.driver_id != driver_id);
        self.pending.len() != before
    }

    /// True when the driver has a persisted assignment for this date.
    pub fn has_confirmed(&self, driver_id: &str) -> bool {
        self.confirmed.iter().any(|a| a.driver_id == driver_id)
    }

    /// Drops the driver from both phases, after the backend delete went
    /// through.
    pub fn remove_driver(&mut self, driver_id: &str) {
        self.pending.retain(|p| p.driver_id != driver_id);
        self.confirmed.retain(|a| a.driver_id != driver_id);
    }

    /// Moves one pairing from pending to confirmed, after the backend
    /// acknowledged the upsert.
    pub fn mark_confirmed(&mut self, assignment: Assignment) {
        self.pending.retain(|p| p.driver_id != assignment.driver_id);
        match self
            .confirmed
            .iter_mut()
            .find(|a| a.driver_id == assignment.driver_id)
        {
            Some(entry) => entry.vehicle_id = assignment.vehicle_id,
            None => self.confirmed.push(assignment),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn oct(day: u32) -> RosterDate {
        RosterDate::from_ymd(2024, 10, day).unwrap()
    }

    fn session_with(confirmed: Vec<Assignment>) -> RosterSession {
        RosterSession::new(oct(21), Vec::new(), Vec::new(), confirmed)
    }

    #[test]
    fn test_stage_rejects_vehicle_held_by_confirmed_driver() {
        let mut session = session_with(vec![Assignment::new("d1", "v1", oct(21))]);
        let err = session.stage("d2", "v1").unwrap_err();
        assert!(matches!(err, SessionError::VehicleTaken { .. }));
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_stage_rejects_vehicle_held_by_pending_driver() {
        let mut session = session_with(Vec::new());
        session.stage("d1", "v1").unwrap();
        assert!(session.stage("d2", "v1").is_err());
    }

    #[test]
    fn test_repair_replaces_pending_entry() {
        let mut session = session_with(Vec::new());
        session.stage("d1", "v1").unwrap();
        session.stage("d1", "v2").unwrap();

        assert_eq!(session.pending().len(), 1);
        assert_eq!(session.vehicle_of("d1").unwrap(), "v2");
        // v1 is free again for someone else.
        session.stage("d2", "v1").unwrap();
    }

    #[test]
    fn test_pending_shadows_confirmed_in_merged_view() {
        let mut session = session_with(vec![Assignment::new("d1", "v1", oct(21))]);
        session.stage("d1", "v2").unwrap();

        let merged = session.assignments();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].vehicle_id, "v2");
        // The confirmed phase still remembers the persisted pairing.
        assert_eq!(session.confirmed()[0].vehicle_id, "v1");
    }

    #[test]
    fn test_staging_current_pairing_is_noop() {
        let mut session = session_with(vec![Assignment::new("d1", "v1", oct(21))]);
        session.stage("d1", "v1").unwrap();
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_mark_confirmed_moves_phase() {
        let mut session = session_with(Vec::new());
        let staged = session.stage("d1", "v1").unwrap();
        session.mark_confirmed(staged);

        assert!(session.pending().is_empty());
        assert_eq!(session.confirmed().len(), 1);
        assert!(session.has_confirmed("d1"));
    }

    #[test]
    fn test_busy_flag_is_exclusive() {
        let mut session = session_with(Vec::new());
        session.begin_busy().unwrap();
        assert!(matches!(session.begin_busy(), Err(SessionError::Busy)));
        session.end_busy();
        session.begin_busy().unwrap();
    }

    #[test]
    fn test_uniqueness_holds_across_phases() {
        let mut session = session_with(vec![
            Assignment::new("d1", "v1", oct(21)),
            Assignment::new("d2", "v2", oct(21)),
        ]);
        session.stage("d3", "v3").unwrap();
        session.stage("d1", "v4").unwrap();

        let merged = session.assignments();
        let mut vehicles: Vec<&str> = merged.iter().map(|a| a.vehicle_id.as_str()).collect();
        let mut drivers: Vec<&str> = merged.iter().map(|a| a.driver_id.as_str()).collect();
        vehicles.sort();
        vehicles.dedup();
        drivers.sort();
        drivers.dedup();
        assert_eq!(vehicles.len(), merged.len());
        assert_eq!(drivers.len(), merged.len());
    }

    #[test]
    fn test_remove_driver_clears_both_phases() {
        let mut session = session_with(vec![Assignment::new("d1", "v1", oct(21))]);
        session.stage("d1", "v2").unwrap();
        session.remove_driver("d1");

        assert!(session.assignments().is_empty());
        assert!(!session.has_confirmed("d1"));
    }
}
