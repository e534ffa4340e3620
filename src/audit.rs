//! Audit records for actions that touch an account: signup, login, order submission, and
//! limit-order settlement. Emitted through an [`AuditSink`] so tests can capture them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::error::ExchangeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    /// Refused for a reason the caller can act on (funds, credentials, input).
    Rejected,
    /// The store or the server failed.
    Error,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, ExchangeError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) if e.is_rejection() => Outcome::Rejected,
            Err(_) => Outcome::Error,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub username: String,
    pub action: &'static str,
    /// Order or instrument details, when the action has any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub outcome: Outcome,
}

impl AuditEvent {
    pub fn now(
        username: impl Into<String>,
        action: &'static str,
        detail: Option<serde_json::Value>,
        outcome: Outcome,
    ) -> Self {
        Self {
            at: Utc::now(),
            username: username.into(),
            action,
            detail,
            outcome,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent);
}

/// Logs each event as JSON under the `audit` target, so it can be routed with `RUST_LOG=audit=info`.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!(target: "audit", "{}", json),
            Err(e) => log::warn!(target: "audit", "unserializable event action={} error={}", event.action, e),
        }
    }
}

/// Captures events for assertions. Clones share one buffer.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
