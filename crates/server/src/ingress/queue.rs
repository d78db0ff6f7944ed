use async_trait::async_trait;

use super::InboundEvent;

/// The durable-queue intake path (spec.md §4.1: events may arrive over a
/// message queue as well as synchronous HTTP). No message-broker client is
/// wired into this deployment; this trait documents the seam a consumer
/// would plug into -- pull a batch, hand each to the same conversion and
/// dispatch path the HTTP handler uses, then ack.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Pull the next batch of raw payloads, already JSON-deserialized into
    /// the wire shape. An empty vec means "nothing ready right now".
    async fn poll(&self) -> Result<Vec<InboundEvent>, String>;

    /// Acknowledge successful processing of a batch so the broker does not
    /// redeliver it.
    async fn ack(&self, processed: usize) -> Result<(), String>;
}
