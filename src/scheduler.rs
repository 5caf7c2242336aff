// scheduler.rs
//
// Owns the set of StreamProbes and drives periodic check cycles with
// bounded concurrency and retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{error, info, warn};

use crate::stream::{StreamId, StreamProbe};

pub struct Scheduler {
    probes: RwLock<HashMap<(String, String), Arc<StreamProbe>>>,
    client: reqwest::Client,
    check_interval: Duration,
    sample_duration: Duration,
    min_keyframes: usize,
    max_concurrent: usize,
    max_retries: u32,
    per_attempt_deadline: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        client: reqwest::Client,
        check_interval: Duration,
        sample_duration: Duration,
        min_keyframes: usize,
        max_concurrent: usize,
        max_retries: u32,
        per_attempt_deadline: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            probes: RwLock::new(HashMap::new()),
            client,
            check_interval,
            sample_duration,
            min_keyframes,
            max_concurrent,
            max_retries,
            per_attempt_deadline,
            shutdown_tx,
        }
    }

    /// Registers a probe. Call before `run`; no dynamic add/remove is
    /// supported once the scheduler loop is running.
    pub async fn register(&self, id: impl Into<String>, url: impl Into<String>, project: impl Into<String>) {
        let stream_id = StreamId::new(project, id, url);
        let key = stream_id.key();
        let probe = Arc::new(StreamProbe::new(
            stream_id,
            self.client.clone(),
            self.sample_duration,
            self.min_keyframes,
        ));
        self.probes.write().await.insert(key, probe);
    }

    pub async fn probe_count(&self) -> usize {
        self.probes.read().await.len()
    }

    /// A consistent snapshot of the probe set taken under a read lock,
    /// released before any I/O runs against the returned handles.
    pub async fn probes(&self) -> Vec<Arc<StreamProbe>> {
        self.probes.read().await.values().cloned().collect()
    }

    /// Requests the main loop to stop at the next tick boundary. Idempotent:
    /// calling this any number of times just keeps the shutdown flag set.
    /// Does not abort an in-flight cycle.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Runs check cycles on a fixed period until `stop` is called. An
    /// initial cycle starts immediately, before the first tick. Cycles are
    /// *not* waited on across ticks: an overlapping slow cycle does not
    /// delay the next tick.
    pub async fn run(self: Arc<Self>) {
        info!(
            check_interval_secs = self.check_interval.as_secs(),
            max_concurrent = self.max_concurrent,
            max_retries = self.max_retries,
            "starting scheduler"
        );

        let mut shutdown = self.shutdown_tx.subscribe();

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_cycle().await });

        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.tick().await; // first tick fires immediately; already handled above

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = self.clone();
                    tokio::spawn(async move { scheduler.run_cycle().await });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One full pass over every registered probe.
    async fn run_cycle(&self) {
        let probes = self.probes().await;
        info!(stream_count = probes.len(), "starting check cycle");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(probes.len());

        for probe in probes {
            let semaphore = semaphore.clone();
            let max_retries = self.max_retries;
            let deadline = self.per_attempt_deadline;
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                check_with_retry(&probe, max_retries, deadline).await;
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(?e, "probe task panicked");
            }
        }

        info!("check cycle complete");
    }
}

/// Retries an attempt up to `max_retries` times with linear backoff
/// (`2*k` seconds before attempt `k`), marking the probe failed on
/// exhaustion.
pub(crate) async fn check_with_retry(probe: &StreamProbe, max_retries: u32, deadline: Duration) {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_secs(2 * attempt as u64);
            info!(
                stream_id = %probe.stream_id.id,
                attempt,
                backoff_secs = backoff.as_secs(),
                "waiting before retry"
            );
            tokio::time::sleep(backoff).await;
        }

        match probe.check(deadline).await {
            Ok(()) => return,
            Err(e) => {
                warn!(stream_id = %probe.stream_id.id, attempt = attempt + 1, error = %e, "check failed");
                last_err = Some(e);
            }
        }
    }

    probe.mark_failed().await;
    if let Some(e) = last_err {
        error!(stream_id = %probe.stream_id.id, error = %e, "exhausted retries, marking probe failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_builds_one_probe_per_stream_and_is_idempotent_by_key() {
        let scheduler = Scheduler::new(
            reqwest::Client::new(),
            Duration::from_secs(30),
            Duration::from_secs(10),
            2,
            4,
            1,
            Duration::from_secs(15),
        );

        scheduler.register("s1", "https://example.com/a.flv", "proj").await;
        scheduler.register("s2", "https://example.com/b.flv", "proj").await;
        assert_eq!(scheduler.probe_count().await, 2);

        // Re-registering the same (project, url) replaces, not duplicates.
        scheduler.register("s1-renamed", "https://example.com/a.flv", "proj").await;
        assert_eq!(scheduler.probe_count().await, 2);
    }

    #[tokio::test]
    async fn check_with_retry_marks_failed_after_exhausting_retries() {
        let probe = StreamProbe::new(
            StreamId::new("proj", "bad", "http://127.0.0.1:0/unreachable.flv"),
            reqwest::Client::new(),
            Duration::from_millis(10),
            2,
        );

        check_with_retry(&probe, 0, Duration::from_millis(50)).await;

        let m = probe.snapshot().await;
        assert!(!m.healthy);
        assert_eq!(m.consecutive_fails, 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_run_exits_at_next_tick_boundary() {
        let scheduler = Arc::new(Scheduler::new(
            reqwest::Client::new(),
            Duration::from_millis(20),
            Duration::from_millis(10),
            2,
            4,
            0,
            Duration::from_millis(50),
        ));

        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        scheduler.stop();
        scheduler.stop(); // idempotent: a second call must not panic or hang

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run() must exit at the next tick boundary after stop()")
            .expect("scheduler task must not panic");
    }
}
