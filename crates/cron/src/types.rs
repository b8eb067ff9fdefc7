//! Core data types for scheduled tasks.

use std::fmt;

use {
    chrono::NaiveDateTime,
    serde::{Deserialize, Serialize},
};

use crate::{
    Error,
    parse::{format_run_time, parse_run_time},
    schedule::CronExpr,
};

/// How a task is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Fire once at a local wall-clock time, then discard.
    OneShot { fire_at: NaiveDateTime },
    /// Fire on every minute matching the crontab expression until deleted.
    Recurring { schedule: CronExpr },
}

/// A unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub struct ScheduledTask {
    /// Instruction delivered verbatim to the endpoint.
    pub prompt: String,
    pub kind: TaskKind,
}

impl ScheduledTask {
    pub fn once(prompt: impl Into<String>, fire_at: NaiveDateTime) -> Self {
        Self {
            prompt: prompt.into(),
            kind: TaskKind::OneShot { fire_at },
        }
    }

    pub fn recurring(prompt: impl Into<String>, schedule: CronExpr) -> Self {
        Self {
            prompt: prompt.into(),
            kind: TaskKind::Recurring { schedule },
        }
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self.kind, TaskKind::OneShot { .. })
    }
}

impl fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TaskKind::OneShot { fire_at } => {
                write!(f, "[One-time] {} at {}", self.prompt, format_run_time(fire_at))
            },
            TaskKind::Recurring { schedule } => {
                write!(f, "[CRON] {} ({})", self.prompt, schedule)
            },
        }
    }
}

/// Scheduler status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub task_count: usize,
    pub one_shot_count: usize,
    pub recurring_count: usize,
    /// Earliest upcoming run, `DD.MM.YYYY HH:MM:SS`.
    pub next_run: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Once,
    Cron,
}

/// On-disk shape of a task: `{"prompt", "type", "time"?, "cron"?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub prompt: String,
    #[serde(rename = "type", alias = "kind")]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
}

impl TryFrom<TaskRecord> for ScheduledTask {
    type Error = Error;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let kind = match record.record_type {
            RecordType::Once => {
                let time = record
                    .time
                    .ok_or_else(|| Error::message("one-time task is missing `time`"))?;
                TaskKind::OneShot {
                    fire_at: parse_run_time(&time)?,
                }
            },
            RecordType::Cron => {
                let expr = record
                    .cron
                    .ok_or_else(|| Error::message("cron task is missing `cron`"))?;
                TaskKind::Recurring {
                    schedule: CronExpr::parse(&expr)?,
                }
            },
        };
        Ok(Self {
            prompt: record.prompt,
            kind,
        })
    }
}

impl From<ScheduledTask> for TaskRecord {
    fn from(task: ScheduledTask) -> Self {
        match task.kind {
            TaskKind::OneShot { fire_at } => Self {
                prompt: task.prompt,
                record_type: RecordType::Once,
                time: Some(format_run_time(&fire_at)),
                cron: None,
            },
            TaskKind::Recurring { schedule } => Self {
                prompt: task.prompt,
                record_type: RecordType::Cron,
                time: None,
                cron: Some(schedule.as_str().to_string()),
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn test_once_serializes_to_record() {
        let task = ScheduledTask::once(
            "water plants",
            parse_run_time("01.01.2099 08:00:00").unwrap(),
        );
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({ "prompt": "water plants", "type": "once", "time": "01.01.2099 08:00:00" })
        );
    }

    #[test]
    fn test_cron_serializes_to_record() {
        let task = ScheduledTask::recurring("lights", CronExpr::parse("0 18 * * *").unwrap());
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({ "prompt": "lights", "type": "cron", "cron": "0 18 * * *" })
        );
    }

    #[test]
    fn test_kind_alias_accepted() {
        let task: ScheduledTask = serde_json::from_value(json!({
            "prompt": "lights",
            "kind": "cron",
            "cron": "0 18 * * *"
        }))
        .unwrap();
        assert!(!task.is_one_shot());
    }

    #[test]
    fn test_invalid_time_rejected() {
        let result: Result<ScheduledTask, _> = serde_json::from_value(json!({
            "prompt": "x",
            "type": "once",
            "time": "tomorrow"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_cron_rejected() {
        let result: Result<ScheduledTask, _> =
            serde_json::from_value(json!({ "prompt": "x", "type": "cron" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<ScheduledTask, _> = serde_json::from_value(json!({
            "prompt": "x",
            "type": "interval",
            "seconds": 10
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_serialization() {
        let status = SchedulerStatus {
            running: true,
            task_count: 3,
            one_shot_count: 1,
            recurring_count: 2,
            next_run: None,
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["taskCount"], 3);
        assert_eq!(v["recurringCount"], 2);
    }

    #[test]
    fn test_display() {
        let once = ScheduledTask::once("a", parse_run_time("02.03.2031 04:05:06").unwrap());
        assert_eq!(once.to_string(), "[One-time] a at 02.03.2031 04:05:06");
        let cron = ScheduledTask::recurring("b", CronExpr::parse("*/5 * * * *").unwrap());
        assert_eq!(cron.to_string(), "[CRON] b (*/5 * * * *)");
    }
}
