use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::{AuditQuery, AuditRecord};

/// Trait for audit record storage backends. Implementations must be
/// `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a single audit record.
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError>;

    /// Persist a batch of audit records at once.
    async fn record_batch(&self, entries: Vec<AuditRecord>) -> Result<(), AuditError> {
        for entry in entries {
            self.record(entry).await?;
        }
        Ok(())
    }

    /// Query records, most recent first, with filters and a bounded limit.
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn AuditStore) {}
}
