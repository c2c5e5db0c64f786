//! Scripted in-memory transport shared by the view tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::{
    error::TransportError,
    transport::{CollectionTransport, Method, RequestBody},
};

struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    response: Result<Value, TransportError>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub method: Option<Method>,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RecordedRequest {
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref().and_then(RequestBody::as_json)
    }
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    gets: Mutex<VecDeque<Scripted>>,
    sends: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_get(&self, response: Result<Value, TransportError>) {
        self.gets.lock().await.push_back(Scripted {
            gate: None,
            response,
        });
    }

    /// The response is held back until the returned sender fires.
    pub async fn push_get_gated(
        &self,
        response: Result<Value, TransportError>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gets.lock().await.push_back(Scripted {
            gate: Some(rx),
            response,
        });
        tx
    }

    pub async fn push_send(&self, response: Result<Value, TransportError>) {
        self.sends.lock().await.push_back(Scripted {
            gate: None,
            response,
        });
    }

    pub async fn push_send_gated(
        &self,
        response: Result<Value, TransportError>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.sends.lock().await.push_back(Scripted {
            gate: Some(rx),
            response,
        });
        tx
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn gets(&self) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.is_none())
            .collect()
    }

    pub async fn sends(&self) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.is_some())
            .collect()
    }

    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..1000 {
            if self.requests.lock().await.len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("transport never saw {count} requests");
    }

    async fn answer(
        &self,
        queue: &Mutex<VecDeque<Scripted>>,
        request: RecordedRequest,
    ) -> Result<Value, TransportError> {
        let scripted = queue.lock().await.pop_front();
        self.requests.lock().await.push(request);
        let Some(scripted) = scripted else {
            return Err(TransportError::Network("no scripted response".to_string()));
        };
        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }
        scripted.response
    }
}

#[async_trait]
impl CollectionTransport for FakeTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
        let request = RecordedRequest {
            method: None,
            path: path.to_string(),
            query: query.to_vec(),
            body: None,
        };
        self.answer(&self.gets, request).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Value, TransportError> {
        let request = RecordedRequest {
            method: Some(method),
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body),
        };
        self.answer(&self.sends, request).await
    }
}

pub(crate) fn leave_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "date": "2024-03-01",
        "type": "Casual",
        "status": status,
        "reason": format!("reason {id}"),
        "leave_day_type": "Full_Day",
    })
}

pub(crate) fn leave_page(ids: std::ops::RangeInclusive<i64>, count: u64) -> Value {
    let results: Vec<Value> = ids.map(|id| leave_json(id, "Pending")).collect();
    json!({ "results": results, "count": count })
}

pub(crate) fn employee_json(id: i64, first_name: &str, is_staff: bool) -> Value {
    json!({
        "id": id,
        "username": first_name.to_ascii_lowercase(),
        "first_name": first_name,
        "last_name": "Patel",
        "email": format!("{}@example.com", first_name.to_ascii_lowercase()),
        "department": "Engineering",
        "is_staff": is_staff,
    })
}
