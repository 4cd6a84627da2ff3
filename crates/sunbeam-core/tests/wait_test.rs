use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sunbeam_core::{
    RecordingProgress, StatusObserver, StatusWatch, WaitError, WaitOptions, wait_until,
};

/// Observer that counts how often it was asked for a snapshot
struct CountingObserver {
    observed: AtomicUsize,
}

impl CountingObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            observed: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StatusObserver for CountingObserver {
    async fn observe(&self) -> Option<String> {
        let n = self.observed.fetch_add(1, Ordering::SeqCst);
        Some(format!("masakari: waiting ({})", n))
    }
}

/// Observer that never has anything to report
struct SilentObserver {
    observed: AtomicUsize,
}

#[async_trait]
impl StatusObserver for SilentObserver {
    async fn observe(&self) -> Option<String> {
        self.observed.fetch_add(1, Ordering::SeqCst);
        None
    }
}

fn options(timeout_secs: u64) -> WaitOptions {
    WaitOptions {
        timeout: Duration::from_secs(timeout_secs),
        poll_interval: Duration::from_millis(100),
        refresh_interval: Duration::from_millis(50),
    }
}

fn watch(observer: &Arc<CountingObserver>, opts: &WaitOptions) -> StatusWatch {
    StatusWatch::spawn(observer.clone(), 2, opts.refresh_interval)
}

#[tokio::test(start_paused = true)]
async fn test_wait_succeeds_and_cancels_observer() {
    let observer = CountingObserver::new();
    let opts = options(10);
    let progress = RecordingProgress::new();
    let polls = AtomicUsize::new(0);

    let value = wait_until(watch(&observer, &opts), &progress, &opts, "masakari", || {
        let n = polls.fetch_add(1, Ordering::SeqCst);
        async move { Ok((n >= 3).then_some("active")) }
    })
    .await
    .unwrap();

    assert_eq!(value, "active");
    // The background task (and its clone of the observer) is gone.
    assert_eq!(Arc::strong_count(&observer), 1);
    assert!(observer.observed.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_is_distinct_and_cancels_observer() {
    let observer = CountingObserver::new();
    let opts = options(1);
    let progress = RecordingProgress::new();

    let err = wait_until(watch(&observer, &opts), &progress, &opts, "grafana-agent", || async {
        Ok::<Option<()>, WaitError>(None)
    })
    .await
    .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(
        err.to_string(),
        "Timed out after 1.0s while waiting for grafana-agent"
    );
    assert_eq!(Arc::strong_count(&observer), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_failure_is_not_a_timeout() {
    let observer = CountingObserver::new();
    let opts = options(10);
    let progress = RecordingProgress::new();

    let err = wait_until(watch(&observer, &opts), &progress, &opts, "consul", || async {
        Err::<Option<()>, _>(WaitError::Failed(
            "Unit consul-client-management/0 is in error state".to_string(),
        ))
    })
    .await
    .unwrap_err();

    assert!(!err.is_timeout());
    assert!(err.to_string().contains("error state"));
    assert_eq!(Arc::strong_count(&observer), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_reach_progress_sink() {
    let observer = CountingObserver::new();
    let opts = options(10);
    let progress = RecordingProgress::new();
    let polls = AtomicUsize::new(0);

    wait_until(watch(&observer, &opts), &progress, &opts, "masakari", || {
        let n = polls.fetch_add(1, Ordering::SeqCst);
        async move { Ok((n >= 20).then_some(())) }
    })
    .await
    .unwrap();

    assert!(!progress.updates().is_empty());
    assert!(progress.updates()[0].starts_with("masakari: waiting"));
}

#[tokio::test(start_paused = true)]
async fn test_silent_observer_timeout() {
    let observer = Arc::new(SilentObserver {
        observed: AtomicUsize::new(0),
    });
    let opts = options(2);
    let progress = RecordingProgress::new();
    let watch = StatusWatch::spawn(observer.clone(), 1, opts.refresh_interval);

    let err = wait_until(watch, &progress, &opts, "observability model", || async {
        Ok::<Option<()>, WaitError>(None)
    })
    .await
    .unwrap_err();

    assert_eq!(
        err,
        WaitError::Timeout {
            what: "observability model".to_string(),
            after: Duration::from_secs(2),
        }
    );
    assert!(progress.updates().is_empty());
    assert_eq!(Arc::strong_count(&observer), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_stops_observer() {
    let observer = Arc::new(SilentObserver {
        observed: AtomicUsize::new(0),
    });
    let opts = options(10);
    let progress = RecordingProgress::new();
    let watch = StatusWatch::spawn(observer.clone(), 1, opts.refresh_interval);

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        wait_until(watch, &progress, &opts, "nova", || async {
            Ok::<Option<()>, WaitError>(None)
        }),
    )
    .await;
    assert!(cancelled.is_err());

    let before = observer.observed.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(observer.observed.load(Ordering::SeqCst), before);
    assert_eq!(Arc::strong_count(&observer), 1);
}
