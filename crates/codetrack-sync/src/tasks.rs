//! Background task ownership
//!
//! Every long-running task the engine spawns is owned by a [`TaskRegistry`]
//! held by the component that started it. Shutting the registry down (or
//! dropping its last handle) cancels all of them.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct RegistryInner {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RegistryInner {
    fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owner of cancellable background tasks.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            inner: Arc::new(RegistryInner {
                shutdown_tx,
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn `fut` on the current Tokio runtime; it stops at shutdown.
    pub fn spawn_cancellable<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            tracing::debug!(task = name, "Registry already shut down; not spawning");
            return;
        }
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    tracing::debug!(task = name, "Background task cancelled");
                }
                _ = fut => {
                    tracing::debug!(task = name, "Background task finished");
                }
            }
        });

        let mut handles = self.inner.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks that have not finished yet.
    pub fn active(&self) -> usize {
        self.inner
            .handles
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Cancel every task. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("active", &self.active())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_cancels_pending_tasks() {
        let registry = TaskRegistry::new();
        registry.spawn_cancellable("forever", futures::future::pending());
        tokio::task::yield_now().await;
        assert_eq!(registry.active(), 1);

        registry.shutdown();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(registry.active(), 0);
        assert!(registry.is_shut_down());
    }

    #[tokio::test]
    async fn spawning_after_shutdown_is_refused() {
        let registry = TaskRegistry::new();
        registry.shutdown();
        assert!(registry.is_shut_down());

        registry.spawn_cancellable("late", futures::future::pending());
        assert_eq!(registry.active(), 0);
    }
}
