//! Configuration loading, validation, env substitution, and env overrides.
//!
//! Config files: `tasklane.toml`, `tasklane.yaml`, or `tasklane.json`
//! Searched in `./` then `~/.config/tasklane/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config,
    },
    schema::{DeliveryConfig, SchedulerConfig, ServerConfig, TasklaneConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
