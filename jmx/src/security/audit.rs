//! Audit trail of externally triggered MBean operations.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// How a guarded call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Succeeded,
    Rejected { reason: String },
    Failed { error: String },
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub identity: String,
    pub operation: String,
    pub outcome: OperationOutcome,
}

impl AuditEntry {
    pub fn new(
        identity: impl Into<String>,
        operation: impl Into<String>,
        outcome: OperationOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            identity: identity.into(),
            operation: operation.into(),
            outcome,
        }
    }
}

/// Bounded ring of audit entries; the oldest entry is dropped when full.
#[derive(Debug)]
pub struct OperationAuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl Default for OperationAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationAuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn record_operation(&self, identity: &str, operation: &str, outcome: OperationOutcome) {
        self.record(AuditEntry::new(identity, operation, outcome));
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn for_identity(&self, identity: &str, limit: usize) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.identity == identity)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
