//! JSON file-backed task store with atomic writes.
//!
//! Writers in any process serialize on an advisory lock held on
//! `<file>.lock` (see [`TaskStore::lock`]).

use std::{
    ffi::OsString,
    fs::OpenOptions,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use {
    async_trait::async_trait,
    fd_lock::RwLock,
    serde::Serialize,
    serde_json::{Value, ser::PrettyFormatter},
    tokio::{fs, sync::oneshot},
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    store::{StoreGuard, TaskStore},
    types::ScheduledTask,
};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// File-backed store. All tasks live in a single JSON array.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Unique per process and per write.
    fn temp_path(&self) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        with_suffix(&self.path, &format!(".{}.{seq}.tmp", std::process::id()))
    }

    /// Atomic write: copy the current file to `.bak`, write a temp file, then
    /// rename it over the target. The target path always holds a complete list.
    async fn atomic_write(&self, tasks: &[ScheduledTask]) -> Result<()> {
        self.ensure_parent().await?;
        let json = encode(tasks)?;
        let tmp = self.temp_path();

        if let Err(e) = fs::write(&tmp, &json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = with_suffix(&self.path, ".bak");
            if let Err(e) = fs::copy(&self.path, &bak).await {
                warn!(path = %bak.display(), error = %e, "failed to back up task file");
            }
        }

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Contents of `.bak` when the task file itself is gone, restored in place.
    async fn restore_backup(&self) -> Option<String> {
        let bak = with_suffix(&self.path, ".bak");
        let data = fs::read_to_string(&bak).await.ok()?;
        warn!(
            path = %self.path.display(),
            backup = %bak.display(),
            "task file missing, restoring from backup"
        );
        if let Err(e) = fs::copy(&bak, &self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to restore task file");
        }
        Some(data)
    }

    /// Move unreadable content aside and start over with an empty list.
    async fn reset(&self, reason: &str) {
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let corrupt = with_suffix(&self.path, ".corrupt");
            match fs::rename(&self.path, &corrupt).await {
                Ok(()) => warn!(
                    path = %self.path.display(),
                    moved_to = %corrupt.display(),
                    reason,
                    "task file unreadable, resetting to empty"
                ),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    reason,
                    "task file unreadable and could not be moved aside"
                ),
            }
        }
        if let Err(e) = self.atomic_write(&[]).await {
            warn!(path = %self.path.display(), error = %e, "failed to initialize task file");
        }
    }
}

/// Four-space indented JSON, matching files written by earlier deployments.
fn encode(tasks: &[ScheduledTask]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    tasks.serialize(&mut ser)?;
    Ok(buf)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl TaskStore for FileStore {
    async fn load(&self) -> Vec<ScheduledTask> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => match self.restore_backup().await {
                Some(data) => data,
                None => {
                    debug!(path = %self.path.display(), "task file missing, creating empty list");
                    if let Err(e) = self.atomic_write(&[]).await {
                        warn!(path = %self.path.display(), error = %e, "failed to initialize task file");
                    }
                    return Vec::new();
                },
            },
            Err(e) => {
                self.reset(&e.to_string()).await;
                return Vec::new();
            },
        };

        if data.trim().is_empty() {
            self.reset("empty file").await;
            return Vec::new();
        }

        let records: Vec<Value> = match serde_json::from_str(&data) {
            Ok(records) => records,
            Err(e) => {
                self.reset(&e.to_string()).await;
                return Vec::new();
            },
        };

        records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(index, error = %e, "dropping invalid task record");
                    None
                },
            })
            .collect()
    }

    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        self.atomic_write(tasks).await
    }

    /// `flock`-style write lock on `<file>.lock`, held by a blocking-pool
    /// thread until the returned guard is dropped.
    async fn lock(&self) -> Result<Option<StoreGuard>> {
        self.ensure_parent().await?;
        let lock_path = with_suffix(&self.path, ".lock");
        let (acquired_tx, acquired_rx) = oneshot::channel::<std::io::Result<()>>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let thread_path = lock_path.clone();
        tokio::task::spawn_blocking(move || {
            let file = match OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&thread_path)
            {
                Ok(file) => file,
                Err(e) => {
                    let _ = acquired_tx.send(Err(e));
                    return;
                },
            };
            let mut lock = RwLock::new(file);
            match lock.write() {
                Ok(_held) => {
                    // Held until the guard drops; skipped if the waiter is gone.
                    if acquired_tx.send(Ok(())).is_ok() {
                        let _ = release_rx.blocking_recv();
                    }
                },
                Err(e) => {
                    let _ = acquired_tx.send(Err(e));
                },
            }
        });

        match acquired_rx.await {
            Ok(Ok(())) => Ok(Some(StoreGuard::new(release_tx))),
            Ok(Err(e)) => Err(Error::external(
                format!("failed to lock {}", lock_path.display()),
                e,
            )),
            Err(_) => Err(Error::message("task file lock thread exited")),
        }
    }
}
