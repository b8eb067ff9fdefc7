//! Scheduled task delivery: one-time and crontab-style recurring tasks.
//!
//! Tasks persist as a JSON array (see [`store_file::FileStore`]). A polling
//! [`service::TaskScheduler`] claims due tasks under a store-wide lock and
//! POSTs their prompts to a webhook via [`delivery::WebhookDelivery`].

pub mod delivery;
pub mod error;
pub mod parse;
pub mod schedule;
pub mod service;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod types;

pub use error::{Error, Result};
