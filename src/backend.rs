//! Backend access for the fleet REST API.
//!
//! [`Backend`] is the seam between the engine and the remote system:
//! [`HttpBackend`] speaks the real wire protocol, [`InMemoryBackend`] backs
//! tests and demo mode with the same observable semantics (per-date
//! uniqueness on the assignment table included, so conflict handling can be
//! exercised honestly).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Url;
use thiserror::Error;

use crate::domain::RosterDate;
use crate::dto::{
    AvailabilityDto, CreateAssignmentRequest, ReportIssueDto, StatusDto,
    UpdateAssignmentRequest, VanAssignmentDto, VehicleDto,
};

/// Errors crossing the backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{operation}: transport error: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: backend returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("{operation}: could not decode response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },

    #[error("{operation}: invalid backend URL")]
    BadUrl { operation: &'static str },
}

impl BackendError {
    /// True for responses that mean "the backend rejected this write as a
    /// duplicate", as opposed to transport trouble.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }
}

/// The eight backend operations the engine consumes.
///
/// All reads and writes are scoped by the operator's `dsp_code`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn confirmed_availability(
        &self,
        dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<AvailabilityDto>, BackendError>;

    async fn all_vehicles(&self, dsp_code: &str) -> Result<Vec<VehicleDto>, BackendError>;

    async fn all_report_issues(&self, dsp_code: &str)
        -> Result<Vec<ReportIssueDto>, BackendError>;

    async fn all_statuses(&self, dsp_code: &str) -> Result<Vec<StatusDto>, BackendError>;

    async fn assignments_for_date(
        &self,
        dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<VanAssignmentDto>, BackendError>;

    async fn create_assignment(
        &self,
        request: &CreateAssignmentRequest,
    ) -> Result<(), BackendError>;

    async fn update_assignment(
        &self,
        date: RosterDate,
        employee_id: &str,
        request: &UpdateAssignmentRequest,
    ) -> Result<(), BackendError>;

    async fn delete_assignment(
        &self,
        dsp_code: &str,
        employee_id: &str,
        date: RosterDate,
    ) -> Result<(), BackendError>;
}

// ============================================================================
// HTTP backend
// ============================================================================

/// Backend over the real fleet REST API.
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Creates a backend rooted at `base_url`, e.g. `https://api.example.com`.
    pub fn new(base_url: Url) -> Self {
        Self {
            base: base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Builds `base / segments..`, percent-encoding each segment.
    ///
    /// The roster date wire string contains spaces; pushing it as a path
    /// segment keeps the decoded path byte-identical to what the backend
    /// keys on.
    fn url(&self, operation: &'static str, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::BadUrl { operation })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Request { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                operation,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| BackendError::Decode {
            operation,
            detail: e.to_string(),
        })
    }

    async fn expect_success(
        operation: &'static str,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<(), BackendError> {
        let response = response.map_err(|source| BackendError::Request { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn confirmed_availability(
        &self,
        dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<AvailabilityDto>, BackendError> {
        const OP: &str = "confirmed-by-day";
        let mut url = self.url(OP, &["disponibilites", "presence", "confirmed-by-day"])?;
        url.query_pairs_mut()
            .append_pair("selectedDay", &date.to_string())
            .append_pair("dsp_code", dsp_code);
        self.get_json(OP, url).await
    }

    async fn all_vehicles(&self, dsp_code: &str) -> Result<Vec<VehicleDto>, BackendError> {
        const OP: &str = "vehicles/all";
        let mut url = self.url(OP, &["vehicles", "all"])?;
        url.query_pairs_mut().append_pair("dsp_code", dsp_code);
        self.get_json(OP, url).await
    }

    async fn all_report_issues(
        &self,
        dsp_code: &str,
    ) -> Result<Vec<ReportIssueDto>, BackendError> {
        const OP: &str = "reportIssues/all";
        let mut url = self.url(OP, &["reportIssues", "all"])?;
        url.query_pairs_mut().append_pair("dsp_code", dsp_code);
        self.get_json(OP, url).await
    }

    async fn all_statuses(&self, dsp_code: &str) -> Result<Vec<StatusDto>, BackendError> {
        const OP: &str = "statuses/all";
        let mut url = self.url(OP, &["statuses", "all"])?;
        url.query_pairs_mut().append_pair("dsp_code", dsp_code);
        self.get_json(OP, url).await
    }

    async fn assignments_for_date(
        &self,
        dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<VanAssignmentDto>, BackendError> {
        const OP: &str = "vanAssignments/date";
        let mut url = self.url(OP, &["vanAssignments", "date", &date.to_string()])?;
        url.query_pairs_mut().append_pair("dsp_code", dsp_code);
        self.get_json(OP, url).await
    }

    async fn create_assignment(
        &self,
        request: &CreateAssignmentRequest,
    ) -> Result<(), BackendError> {
        const OP: &str = "vanAssignments/create";
        let url = self.url(OP, &["vanAssignments", "create"])?;
        Self::expect_success(OP, self.client.post(url).json(request).send().await).await
    }

    async fn update_assignment(
        &self,
        date: RosterDate,
        employee_id: &str,
        request: &UpdateAssignmentRequest,
    ) -> Result<(), BackendError> {
        const OP: &str = "vanAssignments/assignments";
        let url = self.url(
            OP,
            &["vanAssignments", "assignments", &date.to_string(), employee_id],
        )?;
        Self::expect_success(OP, self.client.put(url).json(request).send().await).await
    }

    async fn delete_assignment(
        &self,
        dsp_code: &str,
        employee_id: &str,
        date: RosterDate,
    ) -> Result<(), BackendError> {
        const OP: &str = "vanAssignments/delete";
        let mut url = self.url(
            OP,
            &["vanAssignments", "delete", employee_id, &date.to_string()],
        )?;
        url.query_pairs_mut().append_pair("dsp_code", dsp_code);
        Self::expect_success(OP, self.client.delete(url).send().await).await
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-process backend for tests and demo mode.
///
/// Single-tenant: the `dsp_code` parameter is accepted and ignored. The
/// assignment table enforces the same per-date uniqueness the real backend
/// does, answering duplicate writes with HTTP-shaped 409 errors. `fail_reads`
/// makes every read error, for exercising the degraded-read paths.
#[derive(Default)]
pub struct InMemoryBackend {
    availability: RwLock<HashMap<RosterDate, Vec<AvailabilityDto>>>,
    vehicles: RwLock<Vec<VehicleDto>>,
    issues: RwLock<Vec<ReportIssueDto>>,
    statuses: RwLock<Vec<StatusDto>>,
    assignments: RwLock<HashMap<RosterDate, Vec<VanAssignmentDto>>>,
    fail_reads: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read fail, as an unreachable backend would.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn seed_availability(&self, date: RosterDate, rows: Vec<AvailabilityDto>) {
        self.availability.write().insert(date, rows);
    }

    pub fn seed_vehicles(&self, rows: Vec<VehicleDto>) {
        *self.vehicles.write() = rows;
    }

    pub fn seed_report_issues(&self, rows: Vec<ReportIssueDto>) {
        *self.issues.write() = rows;
    }

    pub fn seed_statuses(&self, rows: Vec<StatusDto>) {
        *self.statuses.write() = rows;
    }

    /// Inserts an assignment row directly, bypassing uniqueness checks.
    /// Intended for seeding historical days.
    pub fn seed_assignment(&self, row: VanAssignmentDto) {
        self.assignments.write().entry(row.date).or_default().push(row);
    }

    fn read_guard(&self, operation: &'static str) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(BackendError::Status {
                operation,
                status: 503,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn confirmed_availability(
        &self,
        _dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<AvailabilityDto>, BackendError> {
        self.read_guard("confirmed-by-day")?;
        Ok(self
            .availability
            .read()
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn all_vehicles(&self, _dsp_code: &str) -> Result<Vec<VehicleDto>, BackendError> {
        self.read_guard("vehicles/all")?;
        Ok(self.vehicles.read().clone())
    }

    async fn all_report_issues(
        &self,
        _dsp_code: &str,
    ) -> Result<Vec<ReportIssueDto>, BackendError> {
        self.read_guard("reportIssues/all")?;
        Ok(self.issues.read().clone())
    }

    async fn all_statuses(&self, _dsp_code: &str) -> Result<Vec<StatusDto>, BackendError> {
        self.read_guard("statuses/all")?;
        Ok(self.statuses.read().clone())
    }

    async fn assignments_for_date(
        &self,
        _dsp_code: &str,
        date: RosterDate,
    ) -> Result<Vec<VanAssignmentDto>, BackendError> {
        self.read_guard("vanAssignments/date")?;
        Ok(self
            .assignments
            .read()
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_assignment(
        &self,
        request: &CreateAssignmentRequest,
    ) -> Result<(), BackendError> {
        const OP: &str = "vanAssignments/create";
        let mut table = self.assignments.write();
        let rows = table.entry(request.date).or_default();

        let duplicate = rows.iter().any(|row| {
            row.employee_id == request.employee_id || row.van_id == request.van_id
        });
        if duplicate {
            return Err(BackendError::Status {
                operation: OP,
                status: 409,
            });
        }

        rows.push(VanAssignmentDto {
            employee_id: request.employee_id.clone(),
            van_id: request.van_id.clone(),
            date: request.date,
            status_id: request.status_id.clone(),
        });
        Ok(())
    }

    async fn update_assignment(
        &self,
        date: RosterDate,
        employee_id: &str,
        request: &UpdateAssignmentRequest,
    ) -> Result<(), BackendError> {
        const OP: &str = "vanAssignments/assignments";
        let mut table = self.assignments.write();
        let rows = table.entry(date).or_default();

        let taken_by_other = rows
            .iter()
            .any(|row| row.van_id == request.van_id && row.employee_id != employee_id);
        if taken_by_other {
            return Err(BackendError::Status {
                operation: OP,
                status: 409,
            });
        }

        match rows.iter_mut().find(|row| row.employee_id == employee_id) {
            Some(row) => {
                row.van_id = request.van_id.clone();
                row.status_id = request.status_id.clone();
                Ok(())
            }
            None => Err(BackendError::Status {
                operation: OP,
                status: 404,
            }),
        }
    }

    async fn delete_assignment(
        &self,
        _dsp_code: &str,
        employee_id: &str,
        date: RosterDate,
    ) -> Result<(), BackendError> {
        let mut table = self.assignments.write();
        if let Some(rows) = table.get_mut(&date) {
            rows.retain(|row| row.employee_id != employee_id);
        }
        Ok(())
    }
}
