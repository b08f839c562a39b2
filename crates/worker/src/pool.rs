//! Worker pool.
//!
//! `concurrency` loops claim stage tasks from the durable queue and hand
//! them to the [`Orchestrator`]. A separate sweep loop re-dispatches
//! projects that stalled between a commit and the next enqueue.

use std::sync::Arc;
use std::time::Duration;

use applaude_pipeline::Orchestrator;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

pub struct WorkerPool {
    orchestrator: Arc<Orchestrator>,
    concurrency: usize,
    poll_interval: Duration,
    sweep_interval: Duration,
    idle_grace: Duration,
}

impl WorkerPool {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &WorkerConfig) -> Self {
        Self {
            orchestrator,
            concurrency: config.concurrency.max(1),
            poll_interval: config.poll_interval,
            sweep_interval: config.sweep_interval,
            idle_grace: config.idle_grace,
        }
    }

    /// Run until `cancel` fires. In-flight tasks finish before their loop
    /// exits.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            concurrency = self.concurrency,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker pool started",
        );

        let mut loops = JoinSet::new();
        for worker in 0..self.concurrency {
            loops.spawn(task_loop(
                worker,
                Arc::clone(&self.orchestrator),
                self.poll_interval,
                cancel.clone(),
            ));
        }
        loops.spawn(sweep_loop(
            Arc::clone(&self.orchestrator),
            self.sweep_interval,
            self.idle_grace,
            cancel.clone(),
        ));

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker loop panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn task_loop(
    worker: usize,
    orchestrator: Arc<Orchestrator>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        match orchestrator.claim_and_process().await {
            Ok(Some(outcome)) => {
                tracing::debug!(worker, outcome = ?outcome, "Task settled");
                continue;
            }
            Ok(None) => {}
            Err(e) => tracing::error!(worker, error = %e, "Task processing failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
    tracing::debug!(worker, "Task loop stopped");
}

async fn sweep_loop(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    grace: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = orchestrator.redispatch_idle(grace).await {
                    tracing::error!(error = %e, "Idle sweep failed");
                }
            }
        }
    }
    tracing::debug!("Sweep loop stopped");
}
