use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde_json::Value;
use shared::error::ApiError;
use tracing::debug;
use url::Url;

use crate::{error::TransportError, session::SessionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Put,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub text: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    /// Flattens the scalar fields of a JSON object into text parts.
    /// Nulls, nested values and fields replaced by a file part are skipped.
    pub fn from_fields(fields: &Value, files: Vec<FilePart>) -> Self {
        let mut form = Self::new();
        if let Value::Object(map) = fields {
            for (name, value) in map {
                if files.iter().any(|f| &f.field == name) {
                    continue;
                }
                let text = match value {
                    Value::String(text) => text.clone(),
                    Value::Bool(flag) => flag.to_string(),
                    Value::Number(number) => number.to_string(),
                    _ => continue,
                };
                form.text.push((name.clone(), text));
            }
        }
        form.files = files;
        form
    }

    fn into_form(self) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, value) in self.text {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)
                .map_err(|e| TransportError::InvalidRequest(format!("bad mime type: {e}")))?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            RequestBody::Multipart(_) => None,
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

/// Remote collection endpoint. Paths are relative to the API root, e.g. `leave/` or `employees/7/`.
#[async_trait]
pub trait CollectionTransport: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, TransportError>;
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
    session: Arc<SessionContext>,
}

impl HttpTransport {
    pub fn new(
        base_url: Url,
        session: Arc<SessionContext>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base_url, session))
    }

    pub fn with_client(http: Client, base_url: Url, session: Arc<SessionContext>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            session,
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest(format!("invalid path '{path}': {e}")))
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.snapshot().await {
            Some(session) => request.bearer_auth(&session.access_token),
            None => request,
        }
    }
}

#[async_trait]
impl CollectionTransport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
        let url = self.endpoint(path)?;
        debug!(%url, params = query.len(), "GET");
        let request = self.authorize(self.http.get(url).query(query)).await;
        read_response(request.send().await?).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Value, TransportError> {
        let url = self.endpoint(path)?;
        debug!(%url, method = method.as_str(), "mutation");
        let request = match method {
            Method::Post => self.http.post(url),
            Method::Put => self.http.put(url),
            Method::Patch => self.http.patch(url),
        };
        let request = match body {
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form.into_form()?),
        };
        let request = self.authorize(request).await;
        read_response(request.send().await?).await
    }
}

async fn read_response(response: Response) -> Result<Value, TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(TransportError::Unauthorized(
            ApiError::from_response(status.as_u16(), &body).message,
        ));
    }
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        return Err(TransportError::Validation(ApiError::from_response(
            status.as_u16(),
            &body,
        )));
    }
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            message: ApiError::from_response(status.as_u16(), &body).message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
}

/// `Url::join` drops the last segment unless the base ends with `/`.
pub fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
