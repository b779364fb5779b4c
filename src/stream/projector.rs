//! Balance Projector
//!
//! Animates a stream's balance between indexer refreshes. Each projector owns
//! a periodic task that recomputes the projected balance from the current
//! checkpoint and publishes it through a watch channel.

use super::checkpoint::StreamCheckpoint;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lower bound for the redraw interval
pub const MIN_TICK_INTERVAL_MS: u64 = 16;

/// Source of "now" for projections
pub trait Clock: Send + Sync {
    /// Current time in Unix milliseconds
    fn now_ms(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for replays and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward, saturating at `i64::MAX`
    pub fn advance(&self, by: Duration) {
        let by_ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let _ = self
            .now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by_ms))
            });
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Configuration for balance projection
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// Minimum time between two recomputations
    pub tick_interval_ms: u64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

impl ProjectorConfig {
    /// Redraw interval, never below [`MIN_TICK_INTERVAL_MS`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_TICK_INTERVAL_MS))
    }
}

/// Starts projection loops that share a clock and cadence
#[derive(Clone)]
pub struct BalanceProjector {
    clock: Arc<dyn Clock>,
    config: ProjectorConfig,
}

impl BalanceProjector {
    /// Create a projector driven by the system clock
    pub fn new(config: ProjectorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a projector driven by a custom clock
    pub fn with_clock(config: ProjectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self { clock, config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Start animating `checkpoint`
    ///
    /// Must be called from within a tokio runtime. The loop runs until the
    /// returned handle is stopped or dropped.
    pub fn start(&self, checkpoint: StreamCheckpoint) -> ProjectorHandle {
        let (checkpoint_tx, checkpoint_rx) = watch::channel(checkpoint);
        let (balance_tx, balance_rx) = watch::channel(checkpoint.balance_at(self.clock.now_ms()));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_projection(
            Arc::clone(&self.clock),
            self.config.tick_interval(),
            checkpoint_rx,
            balance_tx,
            cancel.clone(),
        ));

        ProjectorHandle {
            checkpoint_tx,
            balance_rx,
            cancel,
            task: Some(task),
        }
    }
}

impl Default for BalanceProjector {
    fn default() -> Self {
        Self::new(ProjectorConfig::default())
    }
}

async fn run_projection(
    clock: Arc<dyn Clock>,
    tick: Duration,
    mut checkpoint_rx: watch::Receiver<StreamCheckpoint>,
    balance_tx: watch::Sender<u128>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let checkpoint = *checkpoint_rx.borrow_and_update();
        let balance = checkpoint.balance_at(clock.now_ms());
        balance_tx.send_if_modified(|current| {
            if *current == balance {
                return false;
            }
            *current = balance;
            true
        });

        if checkpoint.is_flowing() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = checkpoint_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }
        } else {
            // Constant balance: park until a new checkpoint arrives
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = checkpoint_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::trace!("Balance projection stopped");
}

/// Handle to a running projection loop
///
/// Dropping the handle cancels the loop.
pub struct ProjectorHandle {
    checkpoint_tx: watch::Sender<StreamCheckpoint>,
    balance_rx: watch::Receiver<u128>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProjectorHandle {
    /// Latest projected balance
    pub fn balance(&self) -> u128 {
        *self.balance_rx.borrow()
    }

    /// Receiver notified whenever the displayed balance changes
    pub fn subscribe(&self) -> watch::Receiver<u128> {
        self.balance_rx.clone()
    }

    /// Checkpoint currently being projected
    pub fn checkpoint(&self) -> StreamCheckpoint {
        *self.checkpoint_tx.borrow()
    }

    /// Replace the checkpoint; the loop recomputes without waiting for a tick
    pub fn replace(&self, checkpoint: StreamCheckpoint) {
        self.checkpoint_tx.send_replace(checkpoint);
    }

    /// Cancel the projection loop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the loop and wait for its task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Projection task ended abnormally");
            }
        }
    }
}

impl Drop for ProjectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
