// ABOUTME: Persisted record of one resource's last successful reconciliation.
// ABOUTME: Properties and output are stored as JSON so any handler's types round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Phase;
use crate::types::{ResourceId, ResourceType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    /// Declared properties at the last successful create/update.
    pub properties: serde_json::Value,
    /// Output committed by the handler.
    pub output: serde_json::Value,
    /// Phase of the last successful invocation (create or update).
    pub phase: Phase,
    /// Registration position at creation, monotonic across runs of a scope.
    /// Updates keep it.
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
}

/// Sort records so that the earliest registered comes first.
pub(crate) fn sort_by_sequence(records: &mut [StateRecord]) {
    records.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
}
