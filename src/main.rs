use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use lessonforge_core::app_state::AppState;
use lessonforge_core::config::Config;
use lessonforge_core::error::PipelineError;
use lessonforge_core::orchestrator::HandleOutcome;
use lessonforge_core::queue::redis_queue::RedisStreamQueue;
use lessonforge_core::queue::JobQueue;

/// Lesson-content generation worker: consumes `JobMessage`s off a Redis
/// stream and drives each one through the module orchestrator's state
/// machine (spec.md §4.9/§4.10).
#[derive(Parser, Debug)]
#[command(name = "lessonforge-worker", version, about)]
struct Cli {
    /// Redis connection string for the job queue.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Stream key new `JobMessage`s are published to.
    #[arg(long, env = "QUEUE_STREAM_KEY", default_value = "lessonforge:jobs")]
    stream_key: String,

    /// Consumer group name; all workers in a deployment share one group.
    #[arg(long, env = "QUEUE_GROUP", default_value = "lessonforge-workers")]
    group: String,

    /// Process at most one message, then exit. Useful for smoke tests.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::load()?;
    info!("lessonforge-worker starting, worker_concurrency={}", config.worker_concurrency);

    let pool = lessonforge_core::db::init_pool().await?;
    let state = AppState::new(pool, config.clone());

    let consumer_name = format!("worker-{}", std::process::id());
    let queue = Arc::new(
        RedisStreamQueue::connect(
            &cli.redis_url,
            cli.stream_key,
            cli.group,
            consumer_name,
            Duration::from_secs(config.module_assembly_deadline_s),
        )
        .await?,
    );

    let shutdown_grace = Duration::from_secs(config.shutdown_grace_period_s);

    // `worker_concurrency` messages are processed in parallel per process
    // (spec.md §6); each task runs its own receive/handle/ack loop against
    // the shared queue and connection pool.
    let concurrency = config.worker_concurrency.max(1);
    let mut tasks = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let queue = queue.clone();
        let state = state.clone();
        tasks.push(tokio::spawn(run(queue, state, cli.once, shutdown_grace)));
    }

    for task in tasks {
        task.await??;
    }
    Ok(())
}

async fn run(queue: Arc<RedisStreamQueue>, state: AppState, once: bool, shutdown_grace: Duration) -> anyhow::Result<()> {
    let mut shutting_down = false;

    loop {
        if shutting_down {
            break;
        }

        tokio::select! {
            received = queue.receive() => {
                match received {
                    Ok(Some((message, lease))) => {
                        let renewal = queue.spawn_lease_renewal(lease.clone());
                        let outcome = state.orchestrator.handle(message).await;
                        renewal.abort();

                        match outcome {
                            Ok(HandleOutcome::Acked) => {
                                if let Err(e) = queue.ack(&lease).await {
                                    error!("main: failed to ack {}: {e}", lease.entry_id);
                                }
                            }
                            Ok(HandleOutcome::DeadLettered(reason)) => {
                                if let Err(e) = queue.dead_letter(&lease, &reason).await {
                                    error!("main: failed to dead-letter {}: {e}", lease.entry_id);
                                }
                            }
                            Err(PipelineError::Database(e)) => {
                                warn!("main: infrastructure error, leaving {} for redelivery: {e}", lease.entry_id);
                            }
                            Err(PipelineError::Infrastructure(e)) => {
                                warn!("main: infrastructure error, leaving {} for redelivery: {e}", lease.entry_id);
                            }
                            Err(e) => {
                                // Anything other than Database/Infrastructure is
                                // module/lesson-scoped (error.rs's own taxonomy):
                                // recovered within the job, so the message is
                                // still acked rather than redelivered forever.
                                error!("main: module-level failure handling {}: {e}", lease.entry_id);
                                if let Err(dl_err) = queue.dead_letter(&lease, &e.to_string()).await {
                                    error!("main: failed to dead-letter {}: {dl_err}", lease.entry_id);
                                }
                            }
                        }

                        if once {
                            break;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        error!("main: queue receive failed: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("main: shutdown signal received, draining within {:?}", shutdown_grace);
                shutting_down = true;
            }
        }
    }

    Ok(())
}
