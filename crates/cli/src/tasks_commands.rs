//! Manage the persisted task list without running the server.
//!
//! These commands share the file store with a running `serve`, but only the
//! in-process lock guards each edit.

use std::sync::Arc;

use {anyhow::Result, clap::Subcommand};

use {tasklane_cron::service::TaskScheduler, tasklane_tools::scheduler::format_task_list};

#[derive(Subcommand)]
pub enum TaskAction {
    /// List scheduled tasks, numbered from 1.
    List,
    /// Add a one-time task.
    Add {
        /// Text to deliver when the task fires.
        prompt: String,
        /// Local run time, `DD.MM.YYYY HH:MM:SS`.
        run_time: String,
    },
    /// Add a recurring task driven by a five-field cron expression.
    Cron {
        prompt: String,
        /// e.g. "0 9 * * 1-5".
        cron_expr: String,
    },
    /// Delete a task by its list number.
    Delete { number: usize },
    /// Show scheduler status for the task file.
    Status,
}

pub async fn handle_tasks(action: TaskAction, scheduler: &Arc<TaskScheduler>) -> Result<()> {
    println!("{}", run(action, scheduler).await?);
    Ok(())
}

async fn run(action: TaskAction, scheduler: &Arc<TaskScheduler>) -> Result<String> {
    let out = match action {
        TaskAction::List => format_task_list(&scheduler.list().await),
        TaskAction::Add { prompt, run_time } => {
            let task = scheduler.add_once(&prompt, &run_time).await?;
            format!("Added: {task}")
        },
        TaskAction::Cron { prompt, cron_expr } => {
            let task = scheduler.add_recurring(&prompt, &cron_expr).await?;
            format!("Added: {task}")
        },
        TaskAction::Delete { number } => {
            let task = scheduler.delete(number).await?;
            format!("Removed task: {task}")
        },
        TaskAction::Status => serde_json::to_string_pretty(&scheduler.status().await)?,
    };
    Ok(out)
}
