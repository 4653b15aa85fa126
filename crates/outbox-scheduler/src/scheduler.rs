//! Timer registry implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::SchedulerError;

/// Type alias for the future a timer runs when it fires.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A live, cancellable timer.
struct ArmedTimer {
    handle: JoinHandle<()>,
    due_at: DateTime<Utc>,
}

/// Timer registry mapping job names to live timers.
///
/// Constructed once at startup and injected into the orchestrator.
/// Invariant: at most one live timer per job name at any instant. The
/// timer task removes its own entry (under the registry lock) before
/// running its body; a cancel that finds the entry still present aborts
/// the timer, so fire and cancel can never both proceed.
pub struct Scheduler {
    registry: Arc<Mutex<HashMap<String, ArmedTimer>>>,
}

impl Scheduler {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm a timer that runs `task` at `due_at`.
    ///
    /// Fails if a timer is already armed under `job_name`. A `due_at`
    /// in the past fires on the next tick of the runtime.
    pub async fn arm(
        &self,
        job_name: &str,
        due_at: DateTime<Utc>,
        task: TimerTask,
    ) -> Result<(), SchedulerError> {
        let mut registry = self.registry.lock().await;
        if registry.contains_key(job_name) {
            return Err(SchedulerError::DuplicateJobName(job_name.to_string()));
        }
        Self::arm_locked(&mut registry, &self.registry, job_name, due_at, task);
        Ok(())
    }

    /// Cancel and deregister the timer under `job_name`.
    ///
    /// Returns whether a live timer existed. Cancelling an unknown name
    /// is a no-op, not an error.
    pub async fn cancel(&self, job_name: &str) -> bool {
        match self.registry.lock().await.remove(job_name) {
            Some(timer) => {
                // The timer hasn't deregistered itself yet, so it is
                // either still sleeping or waiting on this lock. Abort
                // wins either way.
                timer.handle.abort();
                debug!(job_name, "cancelled timer");
                true
            }
            None => false,
        }
    }

    /// Atomically replace the live timer under `job_name` with a new
    /// one at `new_due_at`. The name stays stable so external
    /// references remain valid.
    ///
    /// Returns false and arms nothing when no timer is live under the
    /// name: either the name was never armed, or its timer has already
    /// deregistered itself and is firing. The caller decides what that
    /// means.
    pub async fn rearm(&self, job_name: &str, new_due_at: DateTime<Utc>, task: TimerTask) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.remove(job_name) {
            Some(timer) => {
                timer.handle.abort();
                Self::arm_locked(&mut registry, &self.registry, job_name, new_due_at, task);
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer. Called on shutdown.
    pub async fn shutdown_and_cancel_all(&self) {
        let mut registry = self.registry.lock().await;
        let count = registry.len();
        for (_, timer) in registry.drain() {
            timer.handle.abort();
        }
        info!(count, "cancelled all armed timers");
    }

    /// Whether a live timer exists under `job_name`.
    pub async fn is_armed(&self, job_name: &str) -> bool {
        self.registry.lock().await.contains_key(job_name)
    }

    /// Number of live timers.
    pub async fn armed_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Due time of the timer under `job_name`, if armed.
    pub async fn due_at(&self, job_name: &str) -> Option<DateTime<Utc>> {
        self.registry.lock().await.get(job_name).map(|t| t.due_at)
    }

    fn arm_locked(
        registry: &mut HashMap<String, ArmedTimer>,
        shared: &Arc<Mutex<HashMap<String, ArmedTimer>>>,
        job_name: &str,
        due_at: DateTime<Utc>,
        task: TimerTask,
    ) {
        let name = job_name.to_string();
        let shared = Arc::clone(shared);

        let handle = tokio::spawn(async move {
            let delay = (due_at - Utc::now()).to_std().unwrap_or_default();
            sleep(delay).await;

            // Deregister before running the body. If the entry is gone
            // a cancel or rearm won the race and this fire must abort
            // without side effects.
            if shared.lock().await.remove(&name).is_none() {
                debug!(job_name = %name, "timer superseded before firing");
                return;
            }

            debug!(job_name = %name, "timer fired");
            task.await;
        });

        registry.insert(
            job_name.to_string(),
            ArmedTimer { handle, due_at },
        );
        debug!(job_name, due_at = %due_at, "armed timer");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_task(counter: Arc<AtomicUsize>) -> TimerTask {
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        // Paused-clock tests auto-advance past pending sleeps; this
        // gives spawned timer tasks a chance to run to completion.
        sleep(Duration::from_secs(120)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn arm_fires_once() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler
            .arm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(2),
                counting_task(Arc::clone(&fired)),
            )
            .await
            .unwrap();
        assert!(scheduler.is_armed("job-1").await);

        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed("job-1").await);
        assert_eq!(scheduler.armed_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_name_rejected() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let due = Utc::now() + ChronoDuration::hours(1);

        scheduler
            .arm("job-1", due, counting_task(Arc::clone(&fired)))
            .await
            .unwrap();

        let err = scheduler
            .arm("job-1", due, counting_task(Arc::clone(&fired)))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJobName(name) if name == "job-1"));
        assert_eq!(scheduler.armed_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler
            .arm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(5),
                counting_task(Arc::clone(&fired)),
            )
            .await
            .unwrap();

        assert!(scheduler.cancel("job-1").await);
        assert!(!scheduler.is_armed("job-1").await);

        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_unknown_is_noop() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.cancel("missing").await);
        // Second cancel of a real job is also a no-op.
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler
            .arm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(5),
                counting_task(fired),
            )
            .await
            .unwrap();
        assert!(scheduler.cancel("job-1").await);
        assert!(!scheduler.cancel("job-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_fires_at_new_time_only() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler
            .arm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(2),
                counting_task(Arc::clone(&first)),
            )
            .await
            .unwrap();

        let replaced = scheduler
            .rearm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(30),
                counting_task(Arc::clone(&second)),
            )
            .await;
        assert!(replaced);
        assert_eq!(scheduler.armed_count().await, 1);

        settle().await;

        // Only the rearmed task ran, and exactly once.
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed("job-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_without_live_timer_arms_nothing() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let replaced = scheduler
            .rearm(
                "job-1",
                Utc::now() + ChronoDuration::seconds(1),
                counting_task(Arc::clone(&fired)),
            )
            .await;
        assert!(!replaced);
        assert!(!scheduler.is_armed("job-1").await);

        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_fires_immediately() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler
            .arm(
                "job-1",
                Utc::now() - ChronoDuration::seconds(30),
                counting_task(Arc::clone(&fired)),
            )
            .await
            .unwrap();

        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            scheduler
                .arm(
                    &format!("job-{i}"),
                    Utc::now() + ChronoDuration::seconds(10),
                    counting_task(Arc::clone(&fired)),
                )
                .await
                .unwrap();
        }
        assert_eq!(scheduler.armed_count().await, 5);

        scheduler.shutdown_and_cancel_all().await;
        assert_eq!(scheduler.armed_count().await, 0);

        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn due_at_reflects_rearm() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let t1 = Utc::now() + ChronoDuration::hours(1);
        let t2 = Utc::now() + ChronoDuration::hours(2);

        scheduler
            .arm("job-1", t1, counting_task(Arc::clone(&fired)))
            .await
            .unwrap();
        assert_eq!(scheduler.due_at("job-1").await, Some(t1));

        scheduler
            .rearm("job-1", t2, counting_task(Arc::clone(&fired)))
            .await;
        assert_eq!(scheduler.due_at("job-1").await, Some(t2));
    }
}
