//! Tools exposed by the tool host.
//!
//! Tools: scheduled task add/list/delete and the current datetime helper.

use std::sync::Arc;

use tasklane_cron::service::TaskScheduler;

pub mod datetime;
pub mod registry;
pub mod scheduler;

pub use registry::{AgentTool, ToolRegistry};

/// Registry with every built-in tool wired to `scheduler`.
pub fn default_registry(scheduler: &Arc<TaskScheduler>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    scheduler::register_scheduler_tools(&mut registry, scheduler);
    registry.register(Box::new(datetime::CurrentDatetimeTool::new(Arc::clone(
        scheduler,
    ))));
    registry
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        tasklane_cron::{
            delivery::{Delivery, DeliveryStatus},
            service::SchedulerConfig,
            store_memory::InMemoryStore,
        },
    };

    struct NoopDelivery;

    #[async_trait]
    impl Delivery for NoopDelivery {
        async fn deliver(&self, _prompt: &str) -> DeliveryStatus {
            DeliveryStatus::Delivered
        }
    }

    #[test]
    fn default_registry_has_all_tools() {
        let scheduler = TaskScheduler::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NoopDelivery),
            SchedulerConfig::default(),
        );
        let registry = default_registry(&scheduler);
        assert_eq!(registry.tool_names(), vec![
            "add_cron_task",
            "add_scheduled_task",
            "delete_scheduled_task",
            "get_current_datetime",
            "list_scheduled_tasks",
        ]);
    }
}
