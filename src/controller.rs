//! Manual assignment controller.
//!
//! Drives the dispatcher's tap sequence: pick a driver, pick a vehicle,
//! pairing staged. At most one driver is pending at a time. Tapping the
//! pending driver again cancels, and also discards that driver's staged
//! pairing if one exists. Picking a vehicle while nobody is pending does
//! nothing. A hold on an assigned driver removes the assignment outside this
//! controller; [`SelectionController::reset`] returns the machine to idle
//! afterwards.

use crate::domain::Assignment;
use crate::session::{RosterSession, SessionError};

/// Result of a driver tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSelection {
    /// The driver is now pending a vehicle choice.
    Pending { driver_id: String },
    /// The pending driver was tapped again: selection cancelled, any staged
    /// pairing for them discarded.
    Cancelled {
        driver_id: String,
        dropped_pending: bool,
    },
}

/// Result of a vehicle tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleSelection {
    /// The pending driver was paired with the vehicle.
    Paired(Assignment),
    /// No driver was pending; the tap is a no-op.
    NoDriverPending,
}

/// The Idle / DriverSelected state machine of one session.
#[derive(Debug, Default)]
pub struct SelectionController {
    pending_driver: Option<String>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The driver currently awaiting a vehicle, if any.
    pub fn pending_driver(&self) -> Option<&str> {
        self.pending_driver.as_deref()
    }

    /// Handles a tap on a driver row.
    pub fn select_driver(
        &mut self,
        session: &mut RosterSession,
        driver_id: &str,
    ) -> DriverSelection {
        match self.pending_driver.take() {
            Some(pending) if pending == driver_id => {
                let dropped_pending = session.remove_pending(driver_id);
                DriverSelection::Cancelled {
                    driver_id: pending,
                    dropped_pending,
                }
            }
            _ => {
                // A different pending driver is simply superseded.
                self.pending_driver = Some(driver_id.to_string());
                DriverSelection::Pending {
                    driver_id: driver_id.to_string(),
                }
            }
        }
    }

    /// Handles a tap on a vehicle row.
    ///
    /// On success the machine returns to idle. On a conflict the pending
    /// driver stays selected so the dispatcher can pick another vehicle.
    pub fn select_vehicle(
        &mut self,
        session: &mut RosterSession,
        vehicle_id: &str,
    ) -> Result<VehicleSelection, SessionError> {
        let Some(driver_id) = self.pending_driver.clone() else {
            return Ok(VehicleSelection::NoDriverPending);
        };

        match session.stage(&driver_id, vehicle_id) {
            Ok(assignment) => {
                self.pending_driver = None;
                Ok(VehicleSelection::Paired(assignment))
            }
            Err(error) => Err(error),
        }
    }

    /// Returns to idle, e.g. after a hold removed an assignment.
    pub fn reset(&mut self) {
        self.pending_driver = None;
    }
}
