use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::error::AuditError;
use crate::record::{AuditQuery, AuditRecord};
use crate::store::AuditStore;

/// Buffered, batch-flushing audit sink (spec.md §4.10: "Writes are buffered
/// and flushed in batches; on sink backpressure the router degrades
/// gracefully by dropping the event with an explicit `audit-unavailable`
/// return, never proceeding silently").
///
/// Records are pushed onto a bounded channel drained by a background task
/// that flushes every `batch_size` records or `flush_interval`, whichever
/// comes first. When the channel is full, [`AuditSink::record`] returns
/// `AuditError::Unavailable` immediately rather than blocking the caller.
pub struct AuditSink {
    sender: mpsc::Sender<AuditRecord>,
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditSink {
    #[must_use]
    pub fn spawn(channel_capacity: usize, batch_size: usize, flush_interval: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AuditRecord>(channel_capacity);
        let records: Arc<Mutex<Vec<AuditRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let store = records.clone();

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = tokio::time::interval(flush_interval);
            loop {
                tokio::select! {
                    maybe_record = receiver.recv() => {
                        match maybe_record {
                            Some(record) => {
                                batch.push(record);
                                if batch.len() >= batch_size {
                                    flush(&store, &mut batch).await;
                                }
                            }
                            None => {
                                flush(&store, &mut batch).await;
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            flush(&store, &mut batch).await;
                        }
                    }
                }
            }
        });

        Self { sender, records }
    }
}

async fn flush(store: &Arc<Mutex<Vec<AuditRecord>>>, batch: &mut Vec<AuditRecord>) {
    if batch.is_empty() {
        return;
    }
    debug!(count = batch.len(), "flushing audit batch");
    store.lock().await.extend(batch.drain(..));
}

#[async_trait]
impl AuditStore for AuditSink {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        self.sender.try_send(entry).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                warn!("audit sink backpressure, dropping event");
                AuditError::Unavailable
            }
            mpsc::error::TrySendError::Closed(_) => AuditError::Unavailable,
        })
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self.records.lock().await;
        let mut matched: Vec<AuditRecord> = records
            .iter()
            .rev()
            .filter(|r| {
                query
                    .community_id
                    .as_deref()
                    .is_none_or(|c| r.community_id == c)
                    && query.event_id.as_deref().is_none_or(|e| r.event_id == e)
                    && query.decision.is_none_or(|d| r.decision == d)
                    && query.from.is_none_or(|from| r.recorded_at >= from)
                    && query.to.is_none_or(|to| r.recorded_at <= to)
            })
            .cloned()
            .collect();
        matched.truncate(query.effective_limit());
        Ok(matched)
    }
}
