use std::time::Duration;
use tokio::runtime::Handle;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay.
///
/// Components never sleep themselves; they hand deferred work to a scheduler so tests
/// can drive time by hand.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler backed by the tokio timer.
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Scheduler, Task};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Records tasks instead of running them.
    #[derive(Default)]
    pub struct ManualScheduler {
        pending: Mutex<Vec<(Duration, Task)>>,
    }

    impl ManualScheduler {
        pub fn pending(&self) -> Vec<Duration> {
            self.pending.lock().iter().map(|(delay, _)| *delay).collect()
        }

        /// Run every recorded task in scheduling order.
        pub fn run_all(&self) {
            let tasks = std::mem::take(&mut *self.pending.lock());
            for (_, task) in tasks {
                task();
            }
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&self, delay: Duration, task: Task) {
            self.pending.lock().push((delay, task));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_runs_after_delay() {
        let scheduler = TokioScheduler::current();
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        scheduler.schedule(
            Duration::from_millis(500),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
