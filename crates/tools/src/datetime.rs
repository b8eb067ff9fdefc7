//! `get_current_datetime` tool: the scheduler's wall clock in run-time format,
//! so callers can compute `run_time` values for `add_scheduled_task`.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    serde_json::{Value, json},
    tasklane_cron::{parse::format_run_time, service::TaskScheduler},
};

use crate::registry::AgentTool;

pub struct CurrentDatetimeTool {
    scheduler: Arc<TaskScheduler>,
}

impl CurrentDatetimeTool {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for CurrentDatetimeTool {
    fn name(&self) -> &str {
        "get_current_datetime"
    }

    fn description(&self) -> &str {
        "Return the current local date and time formatted as 'DD.MM.YYYY HH:MM:SS'."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<Value> {
        Ok(Value::String(format_run_time(&self.scheduler.now())))
    }
}
