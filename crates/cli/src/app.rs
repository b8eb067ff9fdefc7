//! Builds the scheduler from the effective configuration.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    tracing::{error, warn},
};

use {
    tasklane_config::{
        Severity, TasklaneConfig,
        validate::{self, check_config},
    },
    tasklane_cron::{
        delivery::WebhookDelivery,
        parse::parse_timezone,
        service::{SchedulerConfig, TaskScheduler},
        store_file::FileStore,
    },
};

/// Load config from disk, then apply environment overrides.
pub fn load_effective_config(config_dir: Option<&std::path::Path>) -> TasklaneConfig {
    let config = tasklane_config::discover_and_load(config_dir);
    tasklane_config::apply_env_overrides(config)
}

/// Diagnostic categories that mean the config file was not applied as written.
const FILE_ERROR_CATEGORIES: &[&str] = &["syntax", "type-error", "unknown-field"];

/// Fail if the discovered config file would not be applied as written: the
/// loader falls back to defaults on syntax and type errors, and ignores
/// unknown keys.
pub fn check_config_file(config_dir: Option<&std::path::Path>) -> Result<()> {
    let result = validate::validate(None, config_dir);
    let mut errors = 0;
    for d in result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error && FILE_ERROR_CATEGORIES.contains(&d.category))
    {
        errors += 1;
        error!(path = %d.path, "{}", d.message);
    }
    if errors > 0 {
        let file = result
            .config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "config file".into());
        anyhow::bail!("{file} has {errors} error(s); run `tasklane config check`");
    }
    Ok(())
}

/// Log semantic diagnostics for the effective config and fail on errors.
pub fn check_effective_config(config: &TasklaneConfig) -> Result<()> {
    let mut diagnostics = Vec::new();
    check_config(config, &mut diagnostics);

    let mut errors = 0;
    for d in &diagnostics {
        match d.severity {
            Severity::Error => {
                errors += 1;
                error!(path = %d.path, "{}", d.message);
            },
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => {},
        }
    }
    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s); run `tasklane config check`");
    }
    Ok(())
}

/// Translate config values into scheduler settings.
pub fn scheduler_config(config: &TasklaneConfig) -> Result<SchedulerConfig> {
    let timezone = config
        .scheduler
        .timezone
        .as_deref()
        .map(parse_timezone)
        .transpose()?;
    Ok(SchedulerConfig {
        poll_interval: Duration::from_secs(config.scheduler.poll_interval_secs.max(1)),
        misfire_grace: config.scheduler.misfire_grace_secs.map(Duration::from_secs),
        timezone,
    })
}

/// File-backed scheduler delivering to the configured webhook.
pub fn build_scheduler(config: &TasklaneConfig) -> Result<Arc<TaskScheduler>> {
    let store = Arc::new(FileStore::new(config.tasks_file()));
    let delivery = WebhookDelivery::new(
        config.delivery.url().map(str::to_string),
        Duration::from_secs(config.delivery.timeout_secs),
        config.delivery.payload_field.clone(),
    )
    .context("failed to set up webhook delivery")?;
    Ok(TaskScheduler::new(
        store,
        Arc::new(delivery),
        scheduler_config(config)?,
    ))
}
