//! Readiness / status-wait bridge
//!
//! A step that changed remote state usually has to block until the remote
//! side settles, while keeping its progress line alive. Two activities run
//! side by side on the same runtime:
//!
//! - a background [`StatusWatch`] task that observes the tracked
//!   applications and pushes snapshots into a bounded channel;
//! - the foreground [`wait_until`] loop that drains the channel into the
//!   progress sink and polls the terminal condition until it holds, fails,
//!   or the timeout expires.
//!
//! Whatever the outcome, the background task is aborted and awaited before
//! `wait_until` returns. Snapshots are informational only, so no ordering is
//! assumed between a snapshot and the terminal check.

use crate::error::WaitError;
use crate::progress::ProgressSink;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Produces human readable status snapshots for the progress line
#[async_trait]
pub trait StatusObserver: Send + Sync + 'static {
    /// Current status, or `None` when nothing can be said right now
    async fn observe(&self) -> Option<String>;
}

/// Timing of a wait
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Hard wall-clock budget
    pub timeout: Duration,

    /// Delay between two evaluations of the terminal condition
    pub poll_interval: Duration,

    /// Delay between two background observations
    pub refresh_interval: Duration,
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1200),
            poll_interval: Duration::from_secs(2),
            refresh_interval: Duration::from_millis(500),
        }
    }
}

/// Background observation task paired with its bounded channel
///
/// Dropping the watch aborts the task, so a cancelled wait never leaves a
/// poller behind.
pub struct StatusWatch {
    handle: Option<JoinHandle<()>>,
    receiver: mpsc::Receiver<String>,
}

impl StatusWatch {
    /// Start observing. `capacity` is the number of tracked applications;
    /// snapshots produced while the channel is full are dropped.
    pub fn spawn(observer: Arc<dyn StatusObserver>, capacity: usize, interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            while !sender.is_closed() {
                if let Some(snapshot) = observer.observe().await {
                    if let Err(TrySendError::Closed(_)) = sender.try_send(snapshot) {
                        break;
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self {
            handle: Some(handle),
            receiver,
        }
    }

    /// Abort the observation task and wait until the runtime confirms it.
    pub async fn shutdown(mut self) {
        self.receiver.close();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if !handle.is_finished() {
            handle.abort();
        }
        match handle.await {
            Ok(()) => tracing::debug!("Status watch finished"),
            Err(e) if e.is_cancelled() => tracing::debug!("Status watch cancelled"),
            Err(e) => tracing::warn!("Status watch ended abnormally: {}", e),
        }
    }
}

impl Drop for StatusWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Block until `check` yields a value, fails, or `options.timeout` expires.
///
/// `check` returns `Ok(Some(_))` when the terminal condition holds,
/// `Ok(None)` to keep waiting and `Err(WaitError::Failed)` to give up.
/// Snapshots from `watch` are forwarded to `progress` meanwhile. The watch is
/// shut down before returning on every path, and aborted if the returned
/// future is dropped early.
pub async fn wait_until<T, F, Fut>(
    mut watch: StatusWatch,
    progress: &dyn ProgressSink,
    options: &WaitOptions,
    what: &str,
    check: F,
) -> Result<T, WaitError>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, WaitError>> + Send,
{
    let outcome = poll_until(&mut watch.receiver, progress, options, what, check).await;
    watch.shutdown().await;
    outcome
}

async fn poll_until<T, F, Fut>(
    receiver: &mut mpsc::Receiver<String>,
    progress: &dyn ProgressSink,
    options: &WaitOptions,
    what: &str,
    mut check: F,
) -> Result<T, WaitError>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, WaitError>> + Send,
{
    let polling = async {
        let mut ticker = tokio::time::interval(options.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                Some(snapshot) = receiver.recv() => progress.update(&snapshot),
                _ = ticker.tick() => {
                    match check().await {
                        Ok(Some(value)) => return Ok::<T, WaitError>(value),
                        Ok(None) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    };

    match tokio::time::timeout(options.timeout, polling).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::debug!("Timed out waiting for {}", what);
            Err(WaitError::Timeout {
                what: what.to_string(),
                after: options.timeout,
            })
        }
    }
}
