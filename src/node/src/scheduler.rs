//! Height-gated round scheduling
//!
//! Four independent tasks poll the ledger height on a wall-clock tick and run
//! their round once the height has advanced by their interval. Every task
//! checks the cancellation token on each tick; a round already in progress
//! runs to completion so persistence is never interrupted halfway.

use crate::validator::Validator;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tracks when a task last ran, in height units
#[derive(Debug, Clone)]
pub struct HeightGate {
    interval: u64,
    last_run: Option<u64>,
}

impl HeightGate {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// Whether the task should run at `height`
    ///
    /// A gate that never ran is always due.
    pub fn due(&self, height: u64) -> bool {
        match self.last_run {
            None => true,
            Some(last) => height.saturating_sub(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, height: u64) {
        self.last_run = Some(height);
    }

    pub fn last_run(&self) -> Option<u64> {
        self.last_run
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Sync,
    Ping,
    Query,
    Weights,
}

impl Task {
    fn name(self) -> &'static str {
        match self {
            Task::Sync => "sync",
            Task::Ping => "ping",
            Task::Query => "query",
            Task::Weights => "weights",
        }
    }
}

/// Drives the validator's rounds until cancelled
pub struct RoundScheduler {
    validator: Arc<Validator>,
    shutdown: CancellationToken,
}

impl RoundScheduler {
    pub fn new(validator: Arc<Validator>, shutdown: CancellationToken) -> Self {
        Self { validator, shutdown }
    }

    /// Token that stops every task
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn all tasks and wait for them to exit
    pub async fn run(self) {
        let schedule = self.validator.config().schedule.clone();
        let tick = Duration::from_millis(schedule.tick_ms);

        let handles: Vec<JoinHandle<()>> = [
            (Task::Sync, schedule.sync_interval),
            (Task::Ping, schedule.ping_interval),
            (Task::Query, schedule.query_interval),
            (Task::Weights, schedule.weights_interval),
        ]
        .into_iter()
        .map(|(task, interval)| {
            tokio::spawn(run_task(
                task,
                HeightGate::new(interval),
                tick,
                self.validator.clone(),
                self.shutdown.clone(),
            ))
        })
        .collect();

        info!("Round scheduler started with {:?} tick", tick);
        for handle in futures::future::join_all(handles).await {
            if let Err(e) = handle {
                error!("Scheduler task panicked: {}", e);
            }
        }
        info!("Round scheduler stopped");
    }
}

async fn run_task(
    task: Task,
    mut gate: HeightGate,
    tick: Duration,
    validator: Arc<Validator>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("{} task shutting down", task.name());
                return;
            }
            _ = interval.tick() => {}
        }

        let height = match validator.current_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!("{} task: {:#}", task.name(), e);
                continue;
            }
        };
        if !gate.due(height) {
            continue;
        }

        let result = match task {
            Task::Sync => validator.sync_round().await.map(|_| ()),
            Task::Ping => {
                validator.ping_round(height).await;
                Ok(())
            }
            Task::Query => validator.query_round(height).await.map(|_| ()),
            Task::Weights => validator.weights_round(&shutdown).await.map(|_| ()),
        };

        // A failed round is retried on the next tick rather than the next interval
        match result {
            Ok(()) => gate.mark(height),
            Err(e) => error!("{} round at height {} failed: {:#}", task.name(), height, e),
        }
    }
}
