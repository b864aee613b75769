pub mod redis_queue;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::job::JobMessage;

/// Opaque handle to one claimed queue entry. Carried through `ack`/
/// `extend_lease`/`dead_letter` so the adapter can identify the
/// stream+consumer-group entry without the rest of the pipeline knowing
/// anything about Redis (component L, spec.md §4.10).
#[derive(Debug, Clone)]
pub struct Lease {
    pub entry_id: String,
    pub delivery_count: u32,
}

/// Queue abstraction the worker loop drives: one message at a time per
/// worker, acked iff the state machine reached a terminal outcome for the
/// job (spec.md §4.10). Transient failures are handled by leaving the
/// message unacked so the broker's own redelivery takes over; persistent
/// failures (bad JSON, unknown ids) are surfaced through `dead_letter`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn receive(&self) -> PipelineResult<Option<(JobMessage, Lease)>>;
    async fn ack(&self, lease: &Lease) -> PipelineResult<()>;
    async fn extend_lease(&self, lease: &Lease) -> PipelineResult<()>;
    async fn dead_letter(&self, lease: &Lease, reason: &str) -> PipelineResult<()>;
}
