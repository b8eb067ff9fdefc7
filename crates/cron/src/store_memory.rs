//! In-memory store for testing.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{Error, Result, store::TaskStore, types::ScheduledTask};

/// In-memory store backed by a `Vec`. No persistence, used in tests.
pub struct InMemoryStore {
    tasks: Mutex<Vec<ScheduledTask>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    pub fn with_tasks(tasks: Vec<ScheduledTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn load(&self) -> Vec<ScheduledTask> {
        let tasks = self.snapshot();
        // Give other tasks a chance to interleave between load and save.
        tokio::task::yield_now().await;
        tasks
    }

    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("injected save failure")));
        }
        *self.tasks.lock().unwrap_or_else(|e| e.into_inner()) = tasks.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::parse::parse_run_time};

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = InMemoryStore::new();
        let task = ScheduledTask::once("a", parse_run_time("01.01.2099 08:00:00").unwrap());
        store.save(std::slice::from_ref(&task)).await.unwrap();
        assert_eq!(store.load().await, vec![task]);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryStore::new();
        store.set_fail_saves(true);
        assert!(store.save(&[]).await.is_err());
        assert_eq!(store.save_count(), 0);
    }
}
