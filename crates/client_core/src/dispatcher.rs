use std::{
    collections::HashSet,
    marker::PhantomData,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::{json, Map, Value};
use shared::domain::RecordKey;
use tracing::{info, warn};

use crate::{
    collection::{Collection, Reconcile},
    error::ActionError,
    record::{merge_fields, Record},
    transport::{CollectionTransport, Method, RequestBody},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SubmitTarget {
    New,
    Existing(RecordKey),
}

/// Releases its submit lock when dropped, whichever way the submission ends.
pub struct SubmitGuard {
    target: SubmitTarget,
    in_flight: Arc<Mutex<HashSet<SubmitTarget>>>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.target);
    }
}

/// Result of a successful mutation: the record as it now stands and how the
/// caller should reconcile its cached page.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<R> {
    pub record: Option<R>,
    pub reconcile: Reconcile,
}

pub struct ActionDispatcher<R> {
    transport: Arc<dyn CollectionTransport>,
    collection: Collection,
    in_flight: Arc<Mutex<HashSet<SubmitTarget>>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> ActionDispatcher<R> {
    pub fn new(collection: Collection, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            transport,
            collection,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn lock(&self, target: SubmitTarget) -> Result<SubmitGuard, ActionError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(target.clone()) {
            let key = match &target {
                SubmitTarget::New => None,
                SubmitTarget::Existing(key) => Some(key),
            };
            return Err(ActionError::busy(key));
        }
        Ok(SubmitGuard {
            target,
            in_flight: self.in_flight.clone(),
        })
    }

    pub async fn create(&self, body: RequestBody) -> Result<Mutation<R>, ActionError> {
        let noun = self.collection.noun();
        let _guard = self.lock(SubmitTarget::New)?;
        let echo = self
            .transport
            .send(Method::Post, self.collection.list_path(), body)
            .await
            .map_err(|err| {
                warn!(collection = noun, error = %err, "create failed");
                ActionError::from_transport(&format!("create {noun}"), err)
            })?;

        let record = serde_json::from_value::<R>(echo).ok();
        info!(
            collection = noun,
            key = ?record.as_ref().map(|r| r.key()),
            "created record"
        );
        Ok(Mutation {
            record,
            reconcile: self.collection.after_create(),
        })
    }

    /// Full replace of the record at `key`. `cached` is the row the view holds,
    /// used when the server answers without echoing the record.
    pub async fn update(
        &self,
        key: &RecordKey,
        body: RequestBody,
        cached: Option<&R>,
    ) -> Result<Mutation<R>, ActionError> {
        let noun = self.collection.noun();
        let verb = format!("update {noun}");
        let _guard = self.lock(SubmitTarget::Existing(key.clone()))?;
        let sent = body.as_json().cloned();
        let echo = self
            .transport
            .send(Method::Put, &self.collection.item_path(key), body)
            .await
            .map_err(|err| {
                warn!(collection = noun, %key, error = %err, "update failed");
                ActionError::from_transport(&verb, err)
            })?;

        let record = resolve_record(cached, sent.as_ref(), echo);
        info!(collection = noun, %key, "updated record");
        Ok(Mutation {
            record,
            reconcile: self.collection.after_update(),
        })
    }

    /// Single-field mutation: soft delete (`is_deleted`), promotion (`is_staff`)
    /// or a status transition (`status`).
    pub async fn set_flag(
        &self,
        key: &RecordKey,
        flag: &str,
        value: Value,
        cached: Option<&R>,
    ) -> Result<Mutation<R>, ActionError> {
        let noun = self.collection.noun();
        let context = self.collection.flag_context_fields();
        // A full-replace PUT without the identifying fields would blank them.
        if !context.is_empty() && cached.is_none() {
            return Err(ActionError::NotAllowed(format!(
                "{noun} {key} is not loaded; reload the list and try again"
            )));
        }
        let _guard = self.lock(SubmitTarget::Existing(key.clone()))?;

        let mut payload = Map::new();
        if let Some(cached) = cached {
            if let Ok(Value::Object(fields)) = serde_json::to_value(cached) {
                for name in context {
                    if let Some(value) = fields.get(name) {
                        payload.insert(name.clone(), value.clone());
                    }
                }
            }
        }
        payload.insert(flag.to_string(), value);
        let payload = Value::Object(payload);

        let method = self.collection.flag_method(flag);
        let echo = self
            .transport
            .send(
                method,
                &self.collection.item_path(key),
                RequestBody::Json(payload.clone()),
            )
            .await
            .map_err(|err| {
                warn!(collection = noun, %key, flag, error = %err, "flag change failed");
                ActionError::from_transport(&format!("update {noun}"), err)
            })?;

        let record = resolve_record(cached, Some(&payload), echo);
        info!(collection = noun, %key, flag, method = method.as_str(), "flag changed");
        Ok(Mutation {
            record,
            reconcile: self.collection.after_flag(flag),
        })
    }
}

/// Server echo if it is a full record, otherwise the cached row with the sent
/// payload and any partial echo merged over it.
fn resolve_record<R: Record>(
    cached: Option<&R>,
    sent: Option<&Value>,
    echo: Value,
) -> Option<R> {
    if let Ok(record) = serde_json::from_value::<R>(echo.clone()) {
        return Some(record);
    }
    // Row not cached and the echo is not a full record.
    let cached = cached?;
    let sent = sent.cloned().unwrap_or_else(|| json!({}));
    match merge_fields(cached, &[&sent, &echo]) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(error = %err, "could not merge mutation into cached record; keeping cached copy");
            Some(cached.clone())
        }
    }
}
