//! Interval scheduler for pipeline runs.
//!
//! An explicit poll loop rather than a cron layer: run immediately on
//! start, then every `interval` thereafter, checking the clock once per
//! `poll_interval`. Runs execute on their own task; if one is still in
//! flight when the next slot arrives, the slot is skipped and logged
//! rather than queued, so runs never overlap and never pile up.

use crate::pipeline::ScrapingPipeline;
use chrono::{DateTime, Duration as Interval, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Time source. Injected so tick behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What a single poll-loop tick decided to do.
#[derive(Debug)]
pub enum TickOutcome {
    /// Not due yet.
    Idle,
    /// A run was started on its own task.
    Started(JoinHandle<()>),
    /// Due, but the previous run is still in flight.
    Skipped,
}

pub struct Scheduler<C: Clock = SystemClock> {
    pipeline: Arc<ScrapingPipeline>,
    interval: Interval,
    poll_interval: Duration,
    clock: C,
    running: Arc<AtomicBool>,
}

impl Scheduler<SystemClock> {
    pub fn new(pipeline: Arc<ScrapingPipeline>, interval: Interval, poll_interval: Duration) -> Self {
        Self::with_clock(pipeline, interval, poll_interval, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(
        pipeline: Arc<ScrapingPipeline>,
        interval: Interval,
        poll_interval: Duration,
        clock: C,
    ) -> Self {
        Self {
            pipeline,
            interval,
            poll_interval,
            clock,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One poll-loop step. Starts a run when `next_run` has passed and no
    /// run is in flight, advancing `next_run` by one interval either way.
    pub fn tick(&self, next_run: &mut DateTime<Utc>) -> TickOutcome {
        let now = self.clock.now();
        if now < *next_run {
            return TickOutcome::Idle;
        }
        *next_run = now + self.interval;

        // swap doubles as the lock: only one tick can see `false`
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(
                next_run = %next_run,
                "Previous run still in progress; skipping this slot"
            );
            return TickOutcome::Skipped;
        }

        info!(next_run = %next_run, "Starting scheduled run");
        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let handle = tokio::spawn(async move {
            if let Err(e) = pipeline.run().await {
                error!(error = %e, "Scheduled run failed");
            }
            running.store(false, Ordering::SeqCst);
        });
        TickOutcome::Started(handle)
    }

    /// Run immediately, then on every interval, forever.
    pub async fn run_forever(&self) {
        info!(
            interval_hours = self.interval.num_hours(),
            poll_secs = self.poll_interval.as_secs(),
            "Scheduler started"
        );
        let mut next_run = self.clock.now();
        loop {
            self.tick(&mut next_run);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::ResultSink;
    use std::sync::Mutex;

    /// Clock whose `now` is set by the test.
    struct FakeClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        fn advance(&self, by: Interval) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn empty_pipeline(dir: &std::path::Path) -> Arc<ScrapingPipeline> {
        Arc::new(ScrapingPipeline::new(Vec::new(), ResultSink::new(dir)))
    }

    fn scheduler<'a>(
        clock: &'a FakeClock,
        dir: &std::path::Path,
    ) -> Scheduler<&'a FakeClock> {
        Scheduler::with_clock(
            empty_pipeline(dir),
            Interval::hours(6),
            Duration::from_secs(60),
            clock,
        )
    }

    #[tokio::test]
    async fn test_first_tick_runs_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(Utc::now());
        let scheduler = scheduler(&clock, tmp.path());

        let mut next_run = clock.now.lock().unwrap().clone();
        match scheduler.tick(&mut next_run) {
            TickOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected immediate run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tick_is_idle_until_interval_elapses() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(Utc::now());
        let scheduler = scheduler(&clock, tmp.path());

        let mut next_run = clock.now.lock().unwrap().clone();
        match scheduler.tick(&mut next_run) {
            TickOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected run, got {other:?}"),
        }

        // five hours later: not due
        clock.advance(Interval::hours(5));
        assert!(matches!(scheduler.tick(&mut next_run), TickOutcome::Idle));

        // past the six hour mark: due again
        clock.advance(Interval::hours(2));
        match scheduler.tick(&mut next_run) {
            TickOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected second run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_due_slot_is_skipped_while_run_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(Utc::now());
        let scheduler = scheduler(&clock, tmp.path());

        // simulate an in-flight run
        scheduler.running.store(true, Ordering::SeqCst);

        let mut next_run = clock.now.lock().unwrap().clone();
        let before = next_run;
        assert!(matches!(scheduler.tick(&mut next_run), TickOutcome::Skipped));
        // the slot still advances; the stalled run is not queued behind
        assert!(next_run > before);

        // once the flag clears, the next due tick runs normally
        scheduler.running.store(false, Ordering::SeqCst);
        clock.advance(Interval::hours(7));
        match scheduler.tick(&mut next_run) {
            TickOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected run after flag cleared, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completed_run_clears_running_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(Utc::now());
        let scheduler = scheduler(&clock, tmp.path());

        let mut next_run = clock.now.lock().unwrap().clone();
        match scheduler.tick(&mut next_run) {
            TickOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected run, got {other:?}"),
        }
        assert!(!scheduler.running.load(Ordering::SeqCst));
    }
}
