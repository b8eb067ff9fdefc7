//! Persistence trait for the task list, plus the lock that serializes access.

use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::Mutex, tracing::warn};

use crate::{Result, types::ScheduledTask};

/// Whole-list persistence backend.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Read every persisted task in insertion order. Missing or corrupt
    /// backing data is reset to an empty list rather than reported.
    async fn load(&self) -> Vec<ScheduledTask>;

    /// Replace the persisted list.
    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()>;

    /// Exclusive access to the backing data for the lifetime of the guard,
    /// across processes if the backend is shared. `None` when the backend
    /// is private to this process.
    async fn lock(&self) -> Result<Option<StoreGuard>> {
        Ok(None)
    }
}

/// Releases a [`TaskStore::lock`] when dropped.
pub struct StoreGuard {
    _held: Box<dyn Send + Sync>,
}

impl StoreGuard {
    pub fn new(held: impl Send + Sync + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

/// Serializes every load-mutate-save cycle on a [`TaskStore`].
///
/// Both the scheduler loop and the management operations go through
/// [`TaskBook::update`], so a task added between the loop's load and save is
/// never overwritten. The in-process mutex is taken first, then the store's
/// own lock, so other processes sharing the backend are excluded too.
pub struct TaskBook {
    store: Arc<dyn TaskStore>,
    lock: Mutex<()>,
}

impl TaskBook {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Snapshot of the current list.
    pub async fn read(&self) -> Vec<ScheduledTask> {
        let _guard = self.lock.lock().await;
        let _store_guard = match self.store.lock().await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "failed to lock task store, reading unlocked");
                None
            },
        };
        self.store.load().await
    }

    /// Load, apply `f`, and save while holding the lock.
    ///
    /// `f` returns `Err` to abort without saving; the store is left untouched.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<ScheduledTask>) -> Result<T> + Send,
        T: Send,
    {
        self.update_if_changed(|tasks| f(tasks).map(|out| (out, true)))
            .await
    }

    /// Like [`TaskBook::update`], but only saves when `f` reports a change.
    pub async fn update_if_changed<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<ScheduledTask>) -> Result<(T, bool)> + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;
        let _store_guard = self.store.lock().await?;
        let mut tasks = self.store.load().await;
        let (out, changed) = f(&mut tasks)?;
        if changed {
            self.store.save(&tasks).await?;
        }
        Ok(out)
    }
}
