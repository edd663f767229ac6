//! Persistence of assignments through the backend.
//!
//! The store is the only writer. It re-queries the date's assignments before
//! every upsert to decide create-vs-update and to reject conflicts before
//! anything is written. That read-then-write sequence is racy when two
//! dispatchers edit the same date; the deployment assumes one editor per
//! date, and this module does not pretend otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::backend::{Backend, BackendError};
use crate::domain::{Assignment, RosterDate};
use crate::dto::{CreateAssignmentRequest, UpdateAssignmentRequest, VanAssignmentDto};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The vehicle is already held by another driver on that date. Nothing
    /// was written.
    #[error("vehicle {vehicle_id} is already assigned on {date}")]
    Conflict {
        vehicle_id: String,
        date: RosterDate,
    },

    /// A backend call failed. Local state was not changed past what the
    /// backend confirmed; the caller may retry.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

/// CRUD over persisted `(driver, vehicle, date)` triples.
pub struct AssignmentStore<B> {
    backend: Arc<B>,
    dsp_code: String,
    /// Opaque status id stamped on writes; the engine never interprets it.
    status_id: String,
}

impl<B: Backend> AssignmentStore<B> {
    pub fn new(backend: Arc<B>, dsp_code: impl Into<String>, status_id: impl Into<String>) -> Self {
        Self {
            backend,
            dsp_code: dsp_code.into(),
            status_id: status_id.into(),
        }
    }

    /// All persisted assignments for `date`.
    ///
    /// Errors propagate; whether an empty substitute is acceptable is the
    /// caller's call (session loads degrade, upsert prechecks must not).
    pub async fn get(&self, date: RosterDate) -> Result<Vec<Assignment>, StoreError> {
        let rows = self
            .backend
            .assignments_for_date(&self.dsp_code, date)
            .await
            .map_err(|source| StoreError::Backend {
                operation: "load assignments",
                source,
            })?;
        Ok(rows.into_iter().map(VanAssignmentDto::into_assignment).collect())
    }

    /// Creates or re-pairs the assignment for `(driver_id, date)`.
    ///
    /// Rejects with [`StoreError::Conflict`] before any write when the
    /// vehicle is held by a different driver. An upsert to the vehicle the
    /// driver already has is a no-op.
    pub async fn upsert(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        date: RosterDate,
    ) -> Result<Assignment, StoreError> {
        let existing = self
            .backend
            .assignments_for_date(&self.dsp_code, date)
            .await
            .map_err(|source| StoreError::Backend {
                operation: "load assignments",
                source,
            })?;

        let taken_by_other = existing
            .iter()
            .any(|row| row.van_id == vehicle_id && row.employee_id != driver_id);
        if taken_by_other {
            return Err(StoreError::Conflict {
                vehicle_id: vehicle_id.to_string(),
                date,
            });
        }

        match existing.iter().find(|row| row.employee_id == driver_id) {
            Some(row) if row.van_id == vehicle_id => {}
            Some(_) => {
                let request = UpdateAssignmentRequest {
                    van_id: vehicle_id.to_string(),
                    status_id: self.status_id.clone(),
                };
                self.backend
                    .update_assignment(date, driver_id, &request)
                    .await
                    .map_err(|source| StoreError::Backend {
                        operation: "update assignment",
                        source,
                    })?;
            }
            None => {
                let request = CreateAssignmentRequest {
                    employee_id: driver_id.to_string(),
                    van_id: vehicle_id.to_string(),
                    date,
                    status_id: self.status_id.clone(),
                    dsp_code: self.dsp_code.clone(),
                };
                self.backend
                    .create_assignment(&request)
                    .await
                    .map_err(|source| StoreError::Backend {
                        operation: "create assignment",
                        source,
                    })?;
            }
        }

        Ok(Assignment::new(driver_id, vehicle_id, date))
    }

    /// The day before `date`, projected to `driver -> vehicle`.
    ///
    /// This is the auto-assign pass's one read beyond the session itself. A
    /// failure here degrades to an empty map: the pass runs without affinity
    /// instead of failing.
    pub async fn previous_day_map(&self, date: RosterDate) -> HashMap<String, String> {
        match self.get(date.pred()).await {
            Ok(rows) => rows
                .into_iter()
                .map(|a| (a.driver_id, a.vehicle_id))
                .collect(),
            Err(error) => {
                warn!(%date, %error, "previous-day fetch failed, assigning without affinity");
                HashMap::new()
            }
        }
    }

    /// Removes the assignment for `(driver_id, date)` if present.
    ///
    /// An absent record is a no-op, not an error. A backend 404 counts as
    /// absent: someone else already removed it.
    pub async fn delete(&self, driver_id: &str, date: RosterDate) -> Result<(), StoreError> {
        match self
            .backend
            .delete_assignment(&self.dsp_code, driver_id, date)
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::Status { status: 404, .. }) => Ok(()),
            Err(source) => Err(StoreError::Backend {
                operation: "delete assignment",
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn oct(day: u32) -> RosterDate {
        RosterDate::from_ymd(2024, 10, day).unwrap()
    }

    fn store(backend: &Arc<InMemoryBackend>) -> AssignmentStore<InMemoryBackend> {
        AssignmentStore::new(backend.clone(), "DLV1", "active")
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);

        store.upsert("d1", "v1", oct(20)).await.unwrap();
        store.upsert("d1", "v2", oct(20)).await.unwrap();

        let assignments = store.get(oct(20)).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].vehicle_id, "v2");
    }

    #[tokio::test]
    async fn test_upsert_same_vehicle_is_noop() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);

        store.upsert("d1", "v1", oct(20)).await.unwrap();
        let again = store.upsert("d1", "v1", oct(20)).await.unwrap();
        assert_eq!(again.vehicle_id, "v1");
        assert_eq!(store.get(oct(20)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_vehicle_held_by_other_driver() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);

        store.upsert("d1", "v1", oct(20)).await.unwrap();
        let err = store.upsert("d2", "v1", oct(20)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // The rejected write left the table untouched.
        let assignments = store.get(oct(20)).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].driver_id, "d1");
    }

    #[tokio::test]
    async fn test_per_date_isolation() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);

        store.upsert("d1", "v1", oct(20)).await.unwrap();
        store.upsert("d2", "v1", oct(21)).await.unwrap();

        assert_eq!(store.get(oct(20)).await.unwrap().len(), 1);
        assert_eq!(store.get(oct(21)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_empty() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);

        store.upsert("d1", "v1", oct(20)).await.unwrap();
        store.delete("d1", oct(20)).await.unwrap();
        assert!(store.get(oct(20)).await.unwrap().is_empty());

        // Deleting again is still fine.
        store.delete("d1", oct(20)).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_propagates_read_failure_without_writing() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store(&backend);
        backend.set_fail_reads(true);

        let err = store.upsert("d1", "v1", oct(20)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend {
                operation: "load assignments",
                ..
            }
        ));

        backend.set_fail_reads(false);
        assert!(store.get(oct(20)).await.unwrap().is_empty());
    }
}
