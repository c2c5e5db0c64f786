use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AttendanceId, EmployeeId, HolidayId, LeaveDayType, LeaveId, LeaveStatus, LeaveType,
    LogAction,
};

/// Envelope of a list endpoint. Paginated collections answer with
/// `{results, count}`, the rest with `{results}` or a bare array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Paginated { results: Vec<T>, count: u64 },
    Results { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    pub fn into_parts(self) -> (Vec<T>, u64) {
        match self {
            ListResponse::Paginated { results, count } => (results, count),
            ListResponse::Results { results } | ListResponse::Bare(results) => {
                let count = results.len() as u64;
                (results, count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub relationship_status: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub date_of_joining: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Changes to a profile. Unset or blank fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub relationship_status: Option<String>,
    pub department: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Form fields to send, in a fixed order, skipping blanks.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("gender", &self.gender),
            ("relationship_status", &self.relationship_status),
            ("department", &self.department),
            ("dob", &self.dob),
            ("phone_number", &self.phone_number),
            ("address", &self.address),
            ("bio", &self.bio),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leave {
    pub id: LeaveId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[serde(default)]
    pub status: LeaveStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub leave_day_type: LeaveDayType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLeave {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub leave_day_type: LeaveDayType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaveDetails {
    #[serde(default)]
    pub remaining_paid_leave: f64,
    #[serde(default)]
    pub remaining_unpaid_leave: f64,
    #[serde(default)]
    pub remaining_casual_leave: f64,
    #[serde(default)]
    pub remaining_sick_leave: f64,
    #[serde(default)]
    pub total_approved_leaves: f64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Totals the attendance report repeats on every row of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    #[serde(default)]
    pub total_present_days: Option<serde_json::Value>,
    #[serde(default)]
    pub total_office_hours: Option<serde_json::Value>,
    #[serde(default)]
    pub total_working_hours: Option<serde_json::Value>,
    #[serde(default)]
    pub total_late_days: Option<serde_json::Value>,
    #[serde(default)]
    pub total_half_days: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub date: NaiveDate,
    #[serde(default)]
    pub entry_time: Option<String>,
    #[serde(default)]
    pub exit_time: Option<String>,
    #[serde(default)]
    pub total_break_hours: Option<serde_json::Value>,
    #[serde(default)]
    pub net_working_hours: Option<serde_json::Value>,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: HolidayId,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Birthday {
    pub id: EmployeeId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakPeriod {
    #[serde(default)]
    pub break_in: Option<String>,
    #[serde(default)]
    pub break_out: Option<String>,
}

/// One day of the signed-in employee's check-in log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub breaks: Vec<BreakPeriod>,
    #[serde(default)]
    pub check_out: Option<String>,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl DailyLog {
    /// Actions the latest log allows next. With no log yet only check-in is open.
    pub fn available_actions(logs: &[DailyLog]) -> Vec<LogAction> {
        let Some(latest) = logs.last() else {
            return vec![LogAction::CheckIn];
        };
        if !is_set(&latest.check_in) {
            return vec![LogAction::CheckIn];
        }
        if is_set(&latest.check_out) {
            return Vec::new();
        }
        match latest.breaks.last() {
            Some(open) if !is_set(&open.break_out) => vec![LogAction::BreakOut],
            _ => vec![LogAction::BreakIn, LogAction::CheckOut],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_response_accepts_every_envelope() {
        let paginated: ListResponse<i64> =
            serde_json::from_value(json!({"count": 13, "next": null, "results": [1, 2]}))
                .expect("paginated");
        assert_eq!(paginated.into_parts(), (vec![1, 2], 13));

        let results: ListResponse<i64> =
            serde_json::from_value(json!({"results": [1, 2, 3]})).expect("results");
        assert_eq!(results.into_parts(), (vec![1, 2, 3], 3));

        let bare: ListResponse<i64> = serde_json::from_value(json!([4])).expect("bare");
        assert_eq!(bare.into_parts(), (vec![4], 1));
    }

    #[test]
    fn leave_reads_backend_field_names() {
        let leave: Leave = serde_json::from_value(json!({
            "id": 7,
            "date": "2024-03-01",
            "type": "Sick",
            "status": "Approved",
            "reason": "flu",
            "leave_day_type": "Half_Day",
        }))
        .expect("leave");
        assert_eq!(leave.leave_type, LeaveType::Sick);
        assert_eq!(leave.status, LeaveStatus::Approved);
        assert_eq!(leave.leave_day_type, LeaveDayType::HalfDay);
    }

    #[test]
    fn attendance_row_carries_report_totals() {
        let row: AttendanceRecord = serde_json::from_value(json!({
            "id": 1,
            "date": "2024-03-04",
            "entry_time": "09:12",
            "total_present_days": 18,
            "total_late_days": 2,
        }))
        .expect("attendance");
        assert_eq!(row.summary.total_present_days, Some(json!(18)));
        assert!(row.exit_time.is_none());
    }

    #[test]
    fn profile_update_skips_blank_fields() {
        let update = ProfileUpdate {
            first_name: Some("Asha".into()),
            email: Some("   ".into()),
            bio: Some(" runs the payroll team ".into()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            update.fields(),
            vec![("first_name", "Asha"), ("bio", "runs the payroll team")]
        );
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn daily_log_opens_the_next_action() {
        let logs: Vec<DailyLog> = serde_json::from_value(json!([
            { "checkIn": "2024-03-04T09:02:00Z", "breaks": [], "checkOut": "2024-03-04T18:00:00Z" },
            { "checkIn": "2024-03-05T09:10:00Z", "breaks": [{ "breakIn": "2024-03-05T13:00:00Z" }] },
        ]))
        .expect("logs");
        assert_eq!(DailyLog::available_actions(&logs), vec![LogAction::BreakOut]);
        assert_eq!(DailyLog::available_actions(&logs[..1]), Vec::<LogAction>::new());
        assert_eq!(DailyLog::available_actions(&[]), vec![LogAction::CheckIn]);

        let back = DailyLog {
            check_in: Some("09:00".into()),
            breaks: vec![BreakPeriod {
                break_in: Some("13:00".into()),
                break_out: Some("13:30".into()),
            }],
            check_out: Some(String::new()),
        };
        assert_eq!(
            DailyLog::available_actions(&[back]),
            vec![LogAction::BreakIn, LogAction::CheckOut]
        );
    }

    #[test]
    fn login_response_uses_camel_case() {
        let login: LoginResponse = serde_json::from_value(json!({
            "access": "a",
            "userId": 9,
            "firstName": "Ravi",
        }))
        .expect("login");
        assert_eq!(login.user_id, Some(9));
        assert_eq!(login.first_name.as_deref(), Some("Ravi"));
        assert!(login.refresh.is_none());
    }
}
