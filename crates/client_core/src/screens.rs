//! Record-specific actions layered on the generic list view.

use chrono::NaiveDate;
use serde_json::Value;
use shared::{
    domain::{EmployeeId, HolidayId, LeaveId, LeaveStatus},
    protocol::{Employee, Holiday, Leave, NewLeave},
};

use crate::{
    error::ActionError,
    list_view::ListView,
    transport::{FilePart, MultipartForm, RequestBody},
};

impl ListView<Leave> {
    pub async fn approve(&self, id: LeaveId) -> Result<Option<Leave>, ActionError> {
        self.review(id, LeaveStatus::Approved).await
    }

    pub async fn reject(&self, id: LeaveId) -> Result<Option<Leave>, ActionError> {
        self.review(id, LeaveStatus::Rejected).await
    }

    /// Approve and Reject are one-way; a reviewed leave cannot be reviewed again.
    async fn review(
        &self,
        id: LeaveId,
        status: LeaveStatus,
    ) -> Result<Option<Leave>, ActionError> {
        if let Some(leave) = self.cached(&id.into()).await {
            if !leave.status.allows_review() {
                return Err(ActionError::NotAllowed(format!(
                    "leave {id} is already {}",
                    leave.status
                )));
            }
        }
        let verb = match status {
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Pending => "updated",
        };
        self.set_flag_with_message(
            &id.into(),
            "status",
            Value::from(status.as_str()),
            format!("Leave {verb} successfully"),
        )
        .await
    }

    pub async fn apply(&self, leave: &NewLeave) -> Result<Option<Leave>, ActionError> {
        let body = serde_json::to_value(leave)
            .map_err(|e| ActionError::UnexpectedResponse(format!("leave did not serialize: {e}")))?;
        self.create(RequestBody::Json(body)).await
    }
}

impl ListView<Employee> {
    pub async fn promote_to_hr(&self, id: EmployeeId) -> Result<Option<Employee>, ActionError> {
        if let Some(employee) = self.cached(&id.into()).await {
            if employee.is_staff {
                return Err(ActionError::NotAllowed(format!(
                    "{} is already HR",
                    employee.full_name()
                )));
            }
        }
        self.set_flag_with_message(
            &id.into(),
            "is_staff",
            Value::Bool(true),
            "Employee promoted to HR successfully".to_string(),
        )
        .await
    }
}

impl ListView<Holiday> {
    pub async fn add_holiday(
        &self,
        name: &str,
        date: NaiveDate,
        image: Option<FilePart>,
    ) -> Result<Option<Holiday>, ActionError> {
        let mut form = MultipartForm::new()
            .text("name", name)
            .text("date", date.format("%Y-%m-%d").to_string());
        if let Some(image) = image {
            form = form.file(image);
        }
        self.create(RequestBody::Multipart(form)).await
    }

    /// Renames or moves a holiday; `image` replaces its picture.
    pub async fn edit_holiday(
        &self,
        id: HolidayId,
        name: Option<&str>,
        date: Option<NaiveDate>,
        image: Option<FilePart>,
    ) -> Result<Holiday, ActionError> {
        self.edit(
            &id.into(),
            |holiday| {
                if let Some(name) = name {
                    holiday.name = name.to_string();
                }
                if let Some(date) = date {
                    holiday.date = date;
                }
            },
            image.into_iter().collect(),
        )
        .await
    }

    pub async fn delete_holiday(&self, id: HolidayId) -> Result<Option<Holiday>, ActionError> {
        if !self.begin_delete(id.into()).await {
            return Err(ActionError::busy(Some(&id.into())));
        }
        self.confirm_delete().await
    }
}

/// Whether the approve/reject controls render for a leave row.
pub fn shows_review_controls(leave: &Leave, is_admin: bool) -> bool {
    is_admin && leave.status.allows_review()
}
