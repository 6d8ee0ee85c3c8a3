//! Cancellable background task handle
//!
//! Every armed reminder runs as one tokio task owned by a `RecurringTask`.
//! The task is aborted by `stop()` or when the handle is dropped, so a
//! forgotten handle can never keep firing.

use std::future::Future;

use tokio::task::JoinHandle;

pub struct RecurringTask {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl RecurringTask {
    /// Spawn `task` on the current runtime
    pub fn spawn<F>(name: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(task = %name, "Starting background task");
        Self {
            name,
            handle: Some(tokio::spawn(task)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until stopped or the task returns by itself
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(task = %self.name, "Stopped background task");
        }
    }
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RecurringTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ticker(counter: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut task = RecurringTask::spawn("ticker", ticker(counter.clone()));

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(task.is_running());

        task.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        drop(RecurringTask::spawn("ticker", ticker(counter.clone())));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
