//! Task management tools backed by [`TaskScheduler`].
//!
//! Outcomes a caller can act on (bad date, bad cron, bad index) come back as
//! `Ok` strings; only malformed parameters and storage failures are errors.

use std::sync::Arc;

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    serde_json::{Value, json},
    tasklane_cron::{
        Error as CronError,
        parse::{RUN_TIME_FORMAT_HINT, format_run_time},
        service::TaskScheduler,
        types::{ScheduledTask, TaskKind},
    },
};

use crate::registry::{AgentTool, ToolRegistry};

/// Register every task management tool on `registry`.
pub fn register_scheduler_tools(registry: &mut ToolRegistry, scheduler: &Arc<TaskScheduler>) {
    registry.register(Box::new(AddScheduledTaskTool::new(Arc::clone(scheduler))));
    registry.register(Box::new(AddCronTaskTool::new(Arc::clone(scheduler))));
    registry.register(Box::new(ListScheduledTasksTool::new(Arc::clone(scheduler))));
    registry.register(Box::new(DeleteScheduledTaskTool::new(Arc::clone(scheduler))));
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing '{name}' parameter"))
}

/// Accepts an integer or a numeric string.
fn int_param(params: &Value, name: &str) -> Result<i64> {
    match params.get(name) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("'{name}' must be an integer")),
        Some(Value::String(raw)) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("'{name}' must be an integer")),
        Some(_) => bail!("'{name}' must be an integer"),
        None => bail!("missing '{name}' parameter"),
    }
}

/// Render a validation error as the message returned to the caller, or hand
/// the error back if it is not one.
fn validation_message(err: CronError) -> Result<String> {
    match err {
        CronError::InvalidRunTime { .. } => {
            Ok(format!("Invalid datetime format. Use '{RUN_TIME_FORMAT_HINT}'"))
        },
        CronError::InvalidCron { reason, .. } => Ok(format!("Invalid CRON expression: {reason}")),
        CronError::EmptyPrompt => Ok("Prompt cannot be empty.".to_string()),
        other => Err(other.into()),
    }
}

/// Render the numbered task listing.
pub fn format_task_list(tasks: &[ScheduledTask]) -> String {
    if tasks.is_empty() {
        return "No scheduled tasks.".to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {task}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn prompt_schema() -> Value {
    json!({
        "type": "string",
        "description": "The instruction delivered to the webhook when the task fires"
    })
}

// ── add_scheduled_task ──────────────────────────────────────────────────────

pub struct AddScheduledTaskTool {
    scheduler: Arc<TaskScheduler>,
}

impl AddScheduledTaskTool {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for AddScheduledTaskTool {
    fn name(&self) -> &str {
        "add_scheduled_task"
    }

    fn description(&self) -> &str {
        "Schedule a task to run once at a specific local date and time \
         (format 'DD.MM.YYYY HH:MM:SS'). Times in the past fire on the next tick."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": prompt_schema(),
                "run_time": {
                    "type": "string",
                    "description": "Execution time, e.g. '01.01.2099 08:00:00'"
                }
            },
            "required": ["prompt", "run_time"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let prompt = str_param(&params, "prompt")?;
        let run_time = str_param(&params, "run_time")?;

        let message = match self.scheduler.add_once(prompt, run_time).await {
            Ok(task) => match task.kind {
                TaskKind::OneShot { fire_at } => format!(
                    "One-time task added: '{}' at {}",
                    task.prompt,
                    format_run_time(&fire_at)
                ),
                TaskKind::Recurring { .. } => bail!("scheduler returned a recurring task"),
            },
            Err(e) => validation_message(e)?,
        };
        Ok(Value::String(message))
    }
}

// ── add_cron_task ───────────────────────────────────────────────────────────

pub struct AddCronTaskTool {
    scheduler: Arc<TaskScheduler>,
}

impl AddCronTaskTool {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for AddCronTaskTool {
    fn name(&self) -> &str {
        "add_cron_task"
    }

    fn description(&self) -> &str {
        "Schedule a recurring task with a 5-field CRON expression \
         (minute hour day-of-month month day-of-week), e.g. '0 18 * * *' for every day at 18:00."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": prompt_schema(),
                "cron_expr": {
                    "type": "string",
                    "description": "CRON expression, e.g. '0 7 * * 1-5'"
                }
            },
            "required": ["prompt", "cron_expr"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let prompt = str_param(&params, "prompt")?;
        let cron_expr = str_param(&params, "cron_expr")?;

        let message = match self.scheduler.add_recurring(prompt, cron_expr).await {
            Ok(task) => match task.kind {
                TaskKind::Recurring { schedule } => {
                    format!("CRON task added: '{}' ({schedule})", task.prompt)
                },
                TaskKind::OneShot { .. } => bail!("scheduler returned a one-time task"),
            },
            Err(e) => validation_message(e)?,
        };
        Ok(Value::String(message))
    }
}

// ── list_scheduled_tasks ────────────────────────────────────────────────────

pub struct ListScheduledTasksTool {
    scheduler: Arc<TaskScheduler>,
}

impl ListScheduledTasksTool {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for ListScheduledTasksTool {
    fn name(&self) -> &str {
        "list_scheduled_tasks"
    }

    fn description(&self) -> &str {
        "List all scheduled tasks as a numbered list. The numbers are used by delete_scheduled_task."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<Value> {
        let tasks = self.scheduler.list().await;
        Ok(Value::String(format_task_list(&tasks)))
    }
}

// ── delete_scheduled_task ───────────────────────────────────────────────────

pub struct DeleteScheduledTaskTool {
    scheduler: Arc<TaskScheduler>,
}

impl DeleteScheduledTaskTool {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for DeleteScheduledTaskTool {
    fn name(&self) -> &str {
        "delete_scheduled_task"
    }

    fn description(&self) -> &str {
        "Delete a scheduled task by its 1-based number from list_scheduled_tasks."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_number": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Task number as shown by list_scheduled_tasks"
                }
            },
            "required": ["task_number"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let requested = int_param(&params, "task_number")?;
        let index = usize::try_from(requested).unwrap_or(0);

        let message = match self.scheduler.delete(index).await {
            Ok(removed) => format!("Removed task: {removed}"),
            Err(CronError::IndexOutOfRange { count: 0, .. }) => {
                format!("Invalid task number {requested}. No scheduled tasks.")
            },
            Err(CronError::IndexOutOfRange { count, .. }) => {
                format!("Invalid task number {requested}. Choose a number between 1 and {count}.")
            },
            Err(e) => return Err(e.into()),
        };
        Ok(Value::String(message))
    }
}
