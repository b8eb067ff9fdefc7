//! Task scheduler: timer loop, due-task claiming, delivery, management operations.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    chrono::{Local, NaiveDateTime, TimeDelta, Utc},
    chrono_tz::Tz,
    tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, Result,
    delivery::{Delivery, DeliveryStatus},
    parse::{format_run_time, parse_run_time},
    schedule::{CronExpr, Due, evaluate, truncate_to_minute},
    store::{TaskBook, TaskStore},
    types::{SchedulerStatus, ScheduledTask, TaskKind},
};

/// Default time between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Drop one-shot tasks that are later than this instead of firing them.
    /// `None` fires late tasks whenever they are next seen.
    pub misfire_grace: Option<Duration>,
    /// Wall-clock zone for run times and cron fields. `None` uses system local time.
    pub timezone: Option<Tz>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            misfire_grace: None,
            timezone: None,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Prompts handed to delivery, in store order.
    pub fired: Vec<String>,
    pub delivered: usize,
    pub failed: usize,
    /// One-shot tasks dropped past their grace window.
    pub expired: usize,
    /// Tasks left in the store after the claim.
    pub retained: usize,
}

/// Identity of a recurring task for per-minute dedupe. The ordinal separates
/// identical prompt/expression pairs.
type FireKey = (String, String, usize);

/// How long a recurring task's last fired minute is remembered. Longer than
/// any daylight-saving shift, so a repeated wall-clock hour does not refire.
const FIRED_MEMORY_HOURS: i64 = 2;

struct TimerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// The task scheduler.
pub struct TaskScheduler {
    book: TaskBook,
    delivery: Arc<dyn Delivery>,
    config: SchedulerConfig,
    /// Last local minute each recurring task fired in.
    fired: Mutex<HashMap<FireKey, NaiveDateTime>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl TaskScheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        delivery: Arc<dyn Delivery>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            book: TaskBook::new(store),
            delivery,
            config,
            fired: Mutex::new(HashMap::new()),
            timer: Mutex::new(None),
        })
    }

    /// Spawn the timer loop. The first tick runs immediately.
    pub async fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            warn!("scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let svc = Arc::clone(self);
        let loop_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            svc.timer_loop(loop_cancel).await;
        });
        *timer = Some(TimerHandle { cancel, join });
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "scheduler started"
        );
    }

    /// Stop the timer loop, letting an in-flight tick finish.
    pub async fn stop(&self) {
        let handle = self.timer.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.join.await {
            error!(error = %e, "scheduler loop panicked");
        }
        info!("scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.timer.lock().await.is_some()
    }

    /// Current wall-clock time in the configured zone.
    pub fn now(&self) -> NaiveDateTime {
        match self.config.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }

    /// Run one tick at the current time.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(self.now()).await
    }

    /// Run one tick as if the wall clock read `now`.
    ///
    /// Due tasks are claimed and the remaining set persisted under the store
    /// lock; delivery happens after the lock is released. If the claim cannot
    /// be persisted nothing is delivered.
    pub async fn tick_at(&self, now: NaiveDateTime) -> TickReport {
        let minute = truncate_to_minute(now);
        let grace = self.config.misfire_grace;

        let mut fired = self.fired.lock().await;
        let horizon = minute - TimeDelta::hours(FIRED_MEMORY_HOURS);
        fired.retain(|_, at| *at > horizon);

        let claim = self
            .book
            .update_if_changed(|tasks| {
                let mut due = Vec::new();
                let mut newly_fired = Vec::new();
                let mut expired = 0;
                let mut ordinals: HashMap<(String, String), usize> = HashMap::new();
                let before = tasks.len();

                tasks.retain(|task| match (&task.kind, evaluate(task, now, grace)) {
                    (_, Due::Wait) => true,
                    (TaskKind::OneShot { fire_at }, Due::Expired) => {
                        warn!(
                            prompt = %task.prompt,
                            scheduled = %format_run_time(fire_at),
                            "one-time task missed its grace window, dropping"
                        );
                        expired += 1;
                        false
                    },
                    (TaskKind::OneShot { .. }, Due::Fire) => {
                        due.push(task.prompt.clone());
                        false
                    },
                    (TaskKind::Recurring { schedule }, _) => {
                        let pair = (task.prompt.clone(), schedule.as_str().to_string());
                        let ordinal = ordinals.entry(pair.clone()).or_default();
                        let key = (pair.0, pair.1, *ordinal);
                        *ordinal += 1;
                        // `>=` also covers a clock that stepped back (DST fall-back).
                        if fired.get(&key).is_some_and(|last| *last >= minute) {
                            debug!(prompt = %task.prompt, "recurring task already fired this minute");
                        } else {
                            due.push(task.prompt.clone());
                            newly_fired.push(key);
                        }
                        true
                    },
                });

                let changed = tasks.len() != before;
                Ok(((due, newly_fired, expired, tasks.len()), changed))
            })
            .await;

        let (due, newly_fired, expired, retained) = match claim {
            Ok(claim) => claim,
            Err(e) => {
                error!(error = %e, "failed to persist task list, skipping deliveries this tick");
                return TickReport::default();
            },
        };
        for key in newly_fired {
            fired.insert(key, minute);
        }
        drop(fired);

        let mut report = TickReport {
            expired,
            retained,
            ..TickReport::default()
        };
        for prompt in due {
            info!(prompt = %prompt, "executing scheduled task");
            match self.delivery.deliver(&prompt).await {
                DeliveryStatus::Delivered => report.delivered += 1,
                DeliveryStatus::Failed => report.failed += 1,
            }
            report.fired.push(prompt);
        }
        report
    }

    /// Append a one-time task. `run_time` must be `DD.MM.YYYY HH:MM:SS`.
    pub async fn add_once(&self, prompt: &str, run_time: &str) -> Result<ScheduledTask> {
        validate_prompt(prompt)?;
        let fire_at = parse_run_time(run_time)?;
        if fire_at <= self.now() {
            debug!(run_time, "one-time task is already due, it fires on the next tick");
        }
        let task = ScheduledTask::once(prompt, fire_at);
        self.append(task).await
    }

    /// Append a recurring task with a 5-field crontab expression.
    pub async fn add_recurring(&self, prompt: &str, cron_expr: &str) -> Result<ScheduledTask> {
        validate_prompt(prompt)?;
        let schedule = CronExpr::parse(cron_expr)?;
        let task = ScheduledTask::recurring(prompt, schedule);
        self.append(task).await
    }

    async fn append(&self, task: ScheduledTask) -> Result<ScheduledTask> {
        let added = task.clone();
        self.book
            .update(move |tasks| {
                tasks.push(task);
                Ok(())
            })
            .await?;
        info!(task = %added, "task added");
        Ok(added)
    }

    /// All tasks in store order.
    pub async fn list(&self) -> Vec<ScheduledTask> {
        self.book.read().await
    }

    /// Remove the task at 1-based `index`.
    pub async fn delete(&self, index: usize) -> Result<ScheduledTask> {
        let removed = self
            .book
            .update(move |tasks| {
                let count = tasks.len();
                if index == 0 || index > count {
                    return Err(Error::IndexOutOfRange { index, count });
                }
                Ok(tasks.remove(index - 1))
            })
            .await?;
        info!(index, task = %removed, "task removed");
        Ok(removed)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.is_running().await;
        let tasks = self.list().await;
        let now = self.now();
        let one_shot_count = tasks.iter().filter(|t| t.is_one_shot()).count();
        let next_run = tasks
            .iter()
            .filter_map(|t| match &t.kind {
                TaskKind::OneShot { fire_at } => Some(*fire_at),
                TaskKind::Recurring { schedule } => schedule.next_after(now),
            })
            .min();

        SchedulerStatus {
            running,
            task_count: tasks.len(),
            one_shot_count,
            recurring_count: tasks.len() - one_shot_count,
            next_run: next_run.map(|at| format_run_time(&at)),
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    async fn timer_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {},
            }
            let report = self.tick().await;
            if report.fired.is_empty() && report.expired == 0 {
                debug!(retained = report.retained, "scheduler tick");
            } else {
                info!(
                    delivered = report.delivered,
                    failed = report.failed,
                    expired = report.expired,
                    retained = report.retained,
                    "scheduler tick"
                );
            }
        }
        debug!("scheduler loop exited");
    }
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(Error::EmptyPrompt);
    }
    Ok(())
}
