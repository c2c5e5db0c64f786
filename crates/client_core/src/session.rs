use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{EmployeeId, Role},
    protocol::{LoginRequest, LoginResponse},
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::error::{AuthError, SessionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub username: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl Session {
    pub fn from_login(response: LoginResponse) -> Self {
        let role = match response.role.as_deref() {
            Some(role)
                if role.eq_ignore_ascii_case("admin")
                    || role.eq_ignore_ascii_case("hr")
                    || role.eq_ignore_ascii_case("staff") =>
            {
                Role::Admin
            }
            _ => Role::Employee,
        };
        Self {
            access_token: response.access,
            refresh_token: response.refresh,
            username: response.username,
            user_id: response.user_id,
            role,
            first_name: response.first_name,
            last_name: response.last_name,
            profile: response.profile,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins manage everyone; an employee only manages their own profile.
    pub fn can_manage(&self, employee_id: EmployeeId) -> bool {
        self.is_admin() || self.user_id == Some(employee_id.0)
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

/// Holds the signed-in session. Every operation reads one immutable snapshot.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionContext {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            current: RwLock::new(session.map(Arc::new)),
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }

    pub async fn require(&self) -> Result<Arc<Session>, AuthError> {
        self.snapshot()
            .await
            .ok_or_else(|| AuthError::new("not signed in"))
    }

    pub async fn replace(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().await = Some(session.clone());
        session
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    pub async fn is_admin(&self) -> bool {
        self.snapshot().await.is_some_and(|s| s.is_admin())
    }
}

/// JSON file holding the last signed-in session between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Session>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub async fn login(
    http: &Client,
    api_url: &Url,
    username: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let endpoint = api_url
        .join("login/")
        .map_err(|e| AuthError::new(format!("invalid api url: {e}")))?;
    let response = http
        .post(endpoint)
        .json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .map_err(|e| AuthError::new(format!("login request failed: {e}")))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
        warn!(username, status = status.as_u16(), "login rejected");
        return Err(AuthError::new("Invalid username or password"));
    }
    if !status.is_success() {
        warn!(username, status = status.as_u16(), "login failed");
        return Err(AuthError::new(format!(
            "login failed with status {}",
            status.as_u16()
        )));
    }

    let body: LoginResponse = response
        .json()
        .await
        .map_err(|e| AuthError::new(format!("malformed login response: {e}")))?;
    let mut session = Session::from_login(body);
    if session.username.is_empty() {
        session.username = username.to_string();
    }
    info!(username = %session.username, admin = session.is_admin(), "signed in");
    Ok(session)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
