// ABOUTME: Sequential deletion of stored records, used for orphans and full destroys.
// ABOUTME: Per-resource failures are recorded and skipped; misuse and store errors abort the sweep.

use serde::Serialize;

use crate::state::{StateRecord, StateStore};
use crate::types::{ResourceId, ScopeId};

use super::error::{ReconcileError, SweepFailure};
use super::registry::Registry;

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResult {
    /// Deleted resources, in deletion order.
    pub destroyed: Vec<ResourceId>,
    /// Resources that could not be deleted; their records remain.
    pub failed: Vec<SweepFailure>,
}

impl SweepResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete `records` one at a time, in the order given.
///
/// Each record is deleted through the handler registered for its type. The
/// next deletion starts only after the previous one finished.
pub(crate) async fn sweep(
    registry: &Registry,
    store: &dyn StateStore,
    scope: &ScopeId,
    records: impl IntoIterator<Item = StateRecord>,
) -> Result<SweepResult, ReconcileError> {
    let mut result = SweepResult::default();

    for record in records {
        let outcome = match registry.lookup(&record.resource_type) {
            Some(handler) => {
                tracing::info!(
                    scope = %scope,
                    resource = %record.id,
                    resource_type = %record.resource_type,
                    "Deleting resource"
                );
                handler.destroy(store, scope, &record).await
            }
            None => Err(ReconcileError::UnknownType {
                id: record.id.clone(),
                resource_type: record.resource_type.clone(),
            }),
        };

        match outcome {
            Ok(()) => result.destroyed.push(record.id),
            Err(e) if e.is_per_resource_failure() => {
                tracing::warn!(resource = %record.id, "Delete failed, continuing: {}", e);
                result.failed.push(SweepFailure {
                    id: record.id,
                    resource_type: record.resource_type,
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}
