use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimOptions, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};

use crate::error::{PipelineError, PipelineResult};
use crate::models::job::JobMessage;
use crate::queue::{JobQueue, Lease};

const PAYLOAD_FIELD: &str = "payload";

/// Component L (spec.md §4.10): Redis streams + consumer groups
/// (`XREADGROUP`/`XACK`/`XCLAIM`), grounded in the retrieval pack's
/// `dashflow-redis` crate use of the `redis` crate with the
/// `tokio-comp`/`connection-manager` features. One message claimed at a
/// time per worker; a background lease-renewal task (mirroring the
/// teacher's `jobs/sync_scheduler.rs` `tokio::spawn` + `time::interval`
/// shape) keeps a long module assembly's claim alive.
pub struct RedisStreamQueue {
    conn: ConnectionManager,
    stream_key: String,
    group: String,
    consumer: String,
    dead_letter_stream: String,
    lease_ttl: Duration,
}

impl RedisStreamQueue {
    pub async fn connect(
        redis_url: &str,
        stream_key: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        lease_ttl: Duration,
    ) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("failed to parse redis url")?;
        let mut conn = ConnectionManager::new(client).await.context("failed to connect to redis")?;

        let stream_key = stream_key.into();
        let group = group.into();
        let dead_letter_stream = format!("{stream_key}.dead_letter");

        let create: std::result::Result<(), RedisError> = conn.xgroup_create_mkstream(&stream_key, &group, "0").await;
        if let Err(e) = create {
            if !e.to_string().contains("BUSYGROUP") {
                return Err(e).context("failed to create consumer group");
            }
        }

        Ok(Self {
            conn,
            stream_key,
            group,
            consumer: consumer.into(),
            dead_letter_stream,
            lease_ttl,
        })
    }

    /// Mirrors `SyncScheduler::start` (`jobs/sync_scheduler.rs`): a
    /// `tokio::spawn`ed `time::interval` loop, here re-claiming a single
    /// in-flight entry for itself every `lease_ttl / 2` to reset Redis's
    /// idle-time clock on it while the worker is still healthy.
    pub fn spawn_lease_renewal(self: &Arc<Self>, lease: Lease) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        let renew_every = self.lease_ttl / 2;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(renew_every);
            loop {
                interval.tick().await;
                if let Err(e) = queue.extend_lease(&lease).await {
                    warn!("redis_queue: lease renewal failed for {}: {e}", lease.entry_id);
                }
            }
        })
    }
}

#[async_trait]
impl JobQueue for RedisStreamQueue {
    async fn receive(&self) -> PipelineResult<Option<(JobMessage, Lease)>> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default().group(&self.group, &self.consumer).count(1).block(5_000);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.stream_key], &[">"], &opts)
            .await
            .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!(e)))?;

        let Some(stream) = reply.keys.into_iter().next() else {
            return Ok(None);
        };
        let Some(entry) = stream.ids.into_iter().next() else {
            return Ok(None);
        };

        let lease = Lease { entry_id: entry.id, delivery_count: 1 };

        let raw: Option<String> = entry.map.get(PAYLOAD_FIELD).and_then(|v| redis::from_redis_value::<String>(v).ok());

        let raw = match raw {
            Some(raw) => raw,
            None => {
                let reason = format!("entry {} missing payload field", lease.entry_id);
                warn!("redis_queue: {reason}");
                self.dead_letter(&lease, &reason).await?;
                return Ok(None);
            }
        };

        let message: JobMessage = match serde_json::from_str(&raw) {
            Ok(message) => message,
            Err(e) => {
                let reason = format!("malformed job message: {e}");
                warn!("redis_queue: {reason}");
                self.dead_letter(&lease, &reason).await?;
                return Ok(None);
            }
        };

        Ok(Some((message, lease)))
    }

    async fn ack(&self, lease: &Lease) -> PipelineResult<()> {
        let mut conn = self.conn.clone();
        conn.xack(&self.stream_key, &self.group, &[&lease.entry_id])
            .await
            .map_err(|e: RedisError| PipelineError::Infrastructure(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn extend_lease(&self, lease: &Lease) -> PipelineResult<()> {
        let mut conn = self.conn.clone();
        let opts = StreamClaimOptions::default();
        let _: redis::streams::StreamClaimReply = conn
            .xclaim_options(
                &self.stream_key,
                &self.group,
                &self.consumer,
                self.lease_ttl.as_millis() as usize,
                &[&lease.entry_id],
                opts,
            )
            .await
            .map_err(|e: RedisError| PipelineError::Infrastructure(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> PipelineResult<()> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.dead_letter_stream, "*", &[("entry_id", lease.entry_id.as_str()), ("reason", reason)])
            .await
            .map_err(|e: RedisError| PipelineError::Infrastructure(anyhow::anyhow!(e)))?;

        self.ack(lease).await?;
        info!("redis_queue: dead-lettered {} ({reason})", lease.entry_id);
        Ok(())
    }
}
