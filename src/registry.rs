//! In-memory record of bridged calls
//!
//! Detached exchanges have no caller left to report to, so their progress and
//! failures are kept here for operators. Bounded: the oldest record is evicted
//! once `limit` calls are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Step of the detached exchange a call is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStage {
    /// Publishing the AI voice track on Session B
    AwaitingAiTrack,
    /// Offer sent to the AI endpoint
    AwaitingAiAnswer,
    /// Pushing the AI answer into Session B
    AwaitingRenegotiation,
    /// Subscribing Session A to the AI voice
    RelayingAiAudio,
    /// Subscribing Session B to the user's microphone
    RelayingUserAudio,
    Connected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub session_a: String,
    pub session_b: String,
    pub stage: ExchangeStage,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn is_finished(&self) -> bool {
        self.failed || self.stage == ExchangeStage::Connected
    }
}

#[derive(Default)]
struct Calls {
    records: HashMap<String, CallRecord>,
    order: VecDeque<String>,
}

/// Shared handle to the call records
#[derive(Clone)]
pub struct CallRegistry {
    calls: Arc<RwLock<Calls>>,
    limit: usize,
}

impl CallRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            calls: Arc::new(RwLock::new(Calls::default())),
            limit: limit.max(1),
        }
    }

    /// Record a call whose sessions are both bootstrapped
    pub async fn register(&self, call_id: &str, session_a: &str, session_b: &str) {
        let now = Utc::now();
        let mut calls = self.calls.write().await;

        while calls.order.len() >= self.limit {
            match calls.order.pop_front() {
                Some(oldest) => {
                    calls.records.remove(&oldest);
                }
                None => break,
            }
        }

        calls.order.push_back(call_id.to_string());
        calls.records.insert(
            call_id.to_string(),
            CallRecord {
                call_id: call_id.to_string(),
                session_a: session_a.to_string(),
                session_b: session_b.to_string(),
                stage: ExchangeStage::AwaitingAiTrack,
                failed: false,
                error: None,
                started_at: now,
                updated_at: now,
            },
        );
    }

    /// Move a call to `stage`. Returns false if the call is unknown.
    pub async fn advance(&self, call_id: &str, stage: ExchangeStage) -> bool {
        let mut calls = self.calls.write().await;
        match calls.records.get_mut(call_id) {
            Some(record) => {
                record.stage = stage;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Mark a call failed at its current stage
    pub async fn fail(&self, call_id: &str, error: impl Into<String>) -> bool {
        let mut calls = self.calls.write().await;
        match calls.records.get_mut(call_id) {
            Some(record) => {
                record.failed = true;
                record.error = Some(error.into());
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, call_id: &str) -> Option<CallRecord> {
        self.calls.read().await.records.get(call_id).cloned()
    }

    /// All records, newest first
    pub async fn list(&self) -> Vec<CallRecord> {
        let calls = self.calls.read().await;
        calls
            .order
            .iter()
            .rev()
            .filter_map(|id| calls.records.get(id).cloned())
            .collect()
    }
}
