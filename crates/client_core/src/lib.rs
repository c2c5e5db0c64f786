use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    domain::{EmployeeId, LogAction, Role},
    protocol::{
        AttendanceRecord, Birthday, ChangePasswordRequest, DailyLog, Employee, Holiday, Leave,
        LeaveDetails, ProfileUpdate,
    },
};
use tracing::{info, warn};
use url::Url;

pub mod collection;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod list_view;
pub mod pagination;
pub mod record;
pub mod screens;
pub mod session;
pub mod transport;
pub mod view_state;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use collection::{Collection, Reconcile};
pub use error::{ActionError, AuthError, FetchError, SessionError, TransportError};
pub use fetcher::{Loaded, Page};
pub use filter::{AttendanceRange, Filter};
pub use list_view::{FetchOutcome, ListView, ViewEvent, ViewSnapshot};
pub use pagination::{total_pages_for, PaginationController, DEFAULT_PAGE_SIZE};
pub use record::Record;
pub use session::{Session, SessionContext, SessionStore};
pub use transport::{
    CollectionTransport, FilePart, HttpTransport, Method, MultipartForm, RequestBody,
};
pub use view_state::{ActionSlot, Draft, ViewState};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub page_size: u32,
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Entry point for an HRMS screen set: owns the session and hands out one
/// list view per collection.
pub struct HrmsClient {
    transport: Arc<HttpTransport>,
    session: Arc<SessionContext>,
    options: ClientOptions,
}

impl HrmsClient {
    pub fn new(api_url: Url, options: ClientOptions) -> Result<Self, TransportError> {
        let session = Arc::new(SessionContext::default());
        let transport = HttpTransport::new(api_url, session.clone(), options.request_timeout)?;
        Ok(Self {
            transport: Arc::new(transport),
            session,
            options,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn api_url(&self) -> &Url {
        self.transport.base_url()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Arc<Session>, AuthError> {
        let session =
            session::login(self.transport.http(), self.transport.base_url(), username, password)
                .await?;
        Ok(self.session.replace(session).await)
    }

    pub async fn restore(&self, session: Session) -> Arc<Session> {
        info!(username = %session.username, "restored session");
        self.session.replace(session).await
    }

    pub async fn logout(&self) {
        self.session.clear().await;
    }

    fn transport(&self) -> Arc<dyn CollectionTransport> {
        self.transport.clone()
    }

    pub fn view<R: Record>(&self, collection: Collection) -> Arc<ListView<R>> {
        self.view_with_filter(collection, Filter::new())
    }

    pub fn view_with_filter<R: Record>(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Arc<ListView<R>> {
        let collection = if collection.is_paginated() {
            collection.with_page_size(self.options.page_size)
        } else {
            collection
        };
        ListView::with_filter(collection, self.transport(), filter)
    }

    /// Admins review every leave; employees page through their own.
    pub async fn leaves(&self) -> Arc<ListView<Leave>> {
        if self.session.is_admin().await {
            self.view(Collection::all_leaves())
        } else {
            self.view(Collection::leaves())
        }
    }

    pub fn employees(&self, search: &str) -> Arc<ListView<Employee>> {
        self.view_with_filter(Collection::employees(), Filter::search(search))
    }

    pub fn attendance_report(&self, range: AttendanceRange) -> Arc<ListView<AttendanceRecord>> {
        self.view_with_filter(Collection::attendance_report(), range.to_filter())
    }

    pub fn holidays(&self) -> Arc<ListView<Holiday>> {
        self.view(Collection::holidays())
    }

    pub fn birthdays(&self) -> Arc<ListView<Birthday>> {
        self.view(Collection::birthdays())
    }

    /// Remaining leave balances of the signed-in employee.
    pub async fn leave_details(&self) -> Result<LeaveDetails, FetchError> {
        self.get_one("leave-details/", "leave details").await
    }

    pub async fn current_user(&self) -> Result<Employee, FetchError> {
        self.get_one("auth/user/", "current user").await
    }

    /// Re-reads the signed-in user and takes the role from its staff flag,
    /// which outranks the role string the login returned.
    pub async fn refresh_role(&self) -> Result<Arc<Session>, FetchError> {
        let mut session = (*self.session.require().await?).clone();
        let user = self.current_user().await?;
        session.role = Role::from_is_staff(user.is_staff);
        session.user_id.get_or_insert(user.id.0);
        Ok(self.session.replace(session).await)
    }

    pub async fn profile(&self, id: EmployeeId) -> Result<Employee, FetchError> {
        self.get_one(&format!("profile/{id}/"), "profile").await
    }

    /// Profile of the signed-in user, resolving the id through `auth/user/`
    /// when the session does not carry one.
    pub async fn my_profile(&self) -> Result<Employee, FetchError> {
        let id = self.my_id().await?;
        self.profile(id).await
    }

    pub async fn my_id(&self) -> Result<EmployeeId, FetchError> {
        match self.session.require().await?.user_id {
            Some(id) => Ok(EmployeeId(id)),
            None => Ok(self.current_user().await?.id),
        }
    }

    /// Fails with `NotAllowed` unless the session may edit `id`.
    pub async fn ensure_can_manage(&self, id: EmployeeId) -> Result<(), ActionError> {
        let session = self.session.require().await?;
        if session.can_manage(id) {
            Ok(())
        } else {
            Err(ActionError::NotAllowed(
                "You do not have permission to edit this employee.".to_string(),
            ))
        }
    }

    /// Sends the non-blank fields of `update`, plus a new photo when given.
    pub async fn update_profile(
        &self,
        id: EmployeeId,
        update: &ProfileUpdate,
        photo: Option<FilePart>,
    ) -> Result<Option<Employee>, ActionError> {
        self.ensure_can_manage(id).await?;
        if update.is_empty() && photo.is_none() {
            return Err(ActionError::NotAllowed("nothing to update".to_string()));
        }
        let mut form = MultipartForm::new();
        for (name, value) in update.fields() {
            form = form.text(name, value);
        }
        if let Some(photo) = photo {
            form = form.file(photo);
        }
        let echo = self
            .transport
            .send(Method::Put, &format!("profile/{id}/"), RequestBody::Multipart(form))
            .await
            .map_err(|err| {
                warn!(%id, error = %err, "profile update failed");
                ActionError::from_transport("update profile", err)
            })?;
        info!(%id, "profile updated");
        Ok(serde_json::from_value(echo).ok())
    }

    pub async fn daily_logs(&self) -> Result<Vec<DailyLog>, FetchError> {
        self.get_one("employeeDailyLogs/", "daily logs").await
    }

    /// Posts a clock action the latest log allows, then returns the logs again.
    pub async fn log_action(&self, action: LogAction) -> Result<Vec<DailyLog>, ActionError> {
        let logs = self.daily_logs().await.map_err(fetch_to_action)?;
        if !DailyLog::available_actions(&logs).contains(&action) {
            return Err(ActionError::NotAllowed(format!(
                "{action} is not available right now"
            )));
        }
        self.transport
            .send(Method::Post, &action.path(), RequestBody::Json(json!({})))
            .await
            .map_err(|err| {
                warn!(%action, error = %err, "clock action failed");
                ActionError::from_transport(action.as_str(), err)
            })?;
        info!(%action, "clock action recorded");
        self.daily_logs().await.map_err(fetch_to_action)
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<String, ActionError> {
        if request.new_password != request.confirm_password {
            let mut field_errors = BTreeMap::new();
            field_errors.insert(
                "confirm_password".to_string(),
                vec!["New password and confirm password do not match.".to_string()],
            );
            return Err(ActionError::Rejected {
                message: "New password and confirm password do not match.".to_string(),
                field_errors,
            });
        }
        let body = serde_json::to_value(request).map_err(|e| {
            ActionError::UnexpectedResponse(format!("password change did not serialize: {e}"))
        })?;
        let echo = self
            .transport
            .send(Method::Put, "changepassword/", RequestBody::Json(body))
            .await
            .map_err(|err| ActionError::from_transport("change password", err))?;
        info!("password changed");
        Ok(match echo.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => "Password changed successfully".to_string(),
        })
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, noun: &str) -> Result<T, FetchError> {
        self.session.require().await?;
        let raw = self
            .transport
            .get(path, &[])
            .await
            .map_err(|err| FetchError::from_transport(noun, err))?;
        serde_json::from_value(raw)
            .map_err(|e| FetchError::from_transport(noun, TransportError::Decode(e.to_string())))
    }
}

fn fetch_to_action(err: FetchError) -> ActionError {
    match err {
        FetchError::Auth(err) => ActionError::Auth(err),
        other => ActionError::Rejected {
            message: other.message(),
            field_errors: BTreeMap::new(),
        },
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
