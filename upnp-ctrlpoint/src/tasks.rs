//! Background task ownership.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owns every background task the engine spawns.
///
/// Stopping aborts all outstanding work unconditionally; nothing spawned
/// after that point runs. Finished handles are pruned opportunistically on
/// each spawn.
pub struct TaskManager {
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawn a unit of work; a no-op after [`TaskManager::abort_all`].
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let handle = tokio::spawn(fut);
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
    }

    /// Spawn a unit of work after a delay.
    pub fn spawn_after<F>(&self, delay: Duration, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
    }

    /// Abort every outstanding task and refuse further spawns.
    pub fn abort_all(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Ok(mut handles) = self.handles.lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_spawn_after_runs_after_delay() {
        let tasks = TaskManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        tasks.spawn_after(Duration::from_secs(1), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all_cancels_pending_work() {
        let tasks = TaskManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        tasks.spawn_after(Duration::from_secs(1), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tasks.abort_all();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // spawns after stop never run
        let c = counter.clone();
        tasks.spawn(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(tasks.is_stopped());
    }
}
