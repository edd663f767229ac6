//! Wire DTOs for the fleet backend's REST payloads.
//!
//! Field names mirror the backend JSON exactly. Everything is camelCase
//! except `dsp_code`, which the backend takes snake-cased in bodies and
//! query strings alike.

use serde::{Deserialize, Serialize};

use crate::domain::{Assignment, Driver, RosterDate, Vehicle, VehicleStatus};

/// One row of `/disponibilites/presence/confirmed-by-day`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDto {
    pub employee_id: String,
    #[serde(default)]
    pub employee_name: String,
    /// Dispatcher decision for the day, `"confirmed"` when accepted.
    #[serde(default)]
    pub presence: String,
    #[serde(default)]
    pub shift_id: String,
}

impl AvailabilityDto {
    pub fn into_driver(self) -> Driver {
        Driver {
            id: self.employee_id,
            name: self.employee_name,
            shift_id: self.shift_id,
        }
    }
}

/// One row of `/vehicles/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub id: String,
    #[serde(default)]
    pub van_number: String,
}

impl VehicleDto {
    pub fn into_vehicle(self) -> Vehicle {
        Vehicle::new(self.id, self.van_number)
    }
}

/// One row of `/reportIssues/all`.
///
/// An open issue report is what carries a vehicle's drivability and current
/// status; vehicles without one are not offered for assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIssueDto {
    pub van_id: String,
    #[serde(default)]
    pub status_id: String,
    #[serde(default)]
    pub drivable: bool,
}

/// One row of `/statuses/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl StatusDto {
    pub fn into_status(self) -> VehicleStatus {
        VehicleStatus {
            label: self.name,
            color: self.color,
        }
    }
}

/// One row of `/vanAssignments/date/<date>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VanAssignmentDto {
    pub employee_id: String,
    pub van_id: String,
    pub date: RosterDate,
    #[serde(default)]
    pub status_id: String,
}

impl VanAssignmentDto {
    pub fn into_assignment(self) -> Assignment {
        Assignment {
            driver_id: self.employee_id,
            vehicle_id: self.van_id,
            date: self.date,
        }
    }
}

/// Body of `POST /vanAssignments/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub employee_id: String,
    pub van_id: String,
    pub date: RosterDate,
    pub status_id: String,
    #[serde(rename = "dsp_code")]
    pub dsp_code: String,
}

/// Body of `PUT /vanAssignments/assignments/<date>/<employeeId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    pub van_id: String,
    pub status_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_keeps_snake_cased_dsp_code() {
        let body = CreateAssignmentRequest {
            employee_id: "d1".to_string(),
            van_id: "v1".to_string(),
            date: RosterDate::from_ymd(2024, 10, 20).unwrap(),
            status_id: "s1".to_string(),
            dsp_code: "DLV1".to_string(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["employeeId"], "d1");
        assert_eq!(json["vanId"], "v1");
        assert_eq!(json["date"], "Sun Oct 20 2024");
        assert_eq!(json["dsp_code"], "DLV1");
        assert!(json.get("dspCode").is_none());
    }

    #[test]
    fn test_assignment_row_maps_to_domain() {
        let row: VanAssignmentDto = serde_json::from_str(
            r#"{"employeeId":"d1","vanId":"v2","date":"Sun Oct 20 2024","statusId":"s1"}"#,
        )
        .unwrap();

        let assignment = row.into_assignment();
        assert_eq!(assignment.driver_id, "d1");
        assert_eq!(assignment.vehicle_id, "v2");
        assert_eq!(assignment.date.to_string(), "Sun Oct 20 2024");
    }
}
