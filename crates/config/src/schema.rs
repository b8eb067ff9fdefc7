/// Config schema types (server, scheduler, delivery).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TasklaneConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub delivery: DeliveryConfig,
}

/// Tool host HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on. Defaults to 8080.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Scheduler loop and task file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Task file path. Defaults to `<data_dir>/tasks.json`.
    pub tasks_file: Option<PathBuf>,
    /// Seconds between ticks.
    pub poll_interval_secs: u64,
    /// One-time tasks later than this are dropped instead of fired.
    /// Unset fires late tasks immediately.
    pub misfire_grace_secs: Option<u64>,
    /// IANA timezone for run times and cron fields, e.g. "Europe/Berlin".
    /// Unset uses the system local time.
    pub timezone: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tasks_file: None,
            poll_interval_secs: 30,
            misfire_grace_secs: None,
            timezone: None,
        }
    }
}

/// Webhook endpoint that receives due task prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Webhook URL. Often embeds a token, so it is kept out of debug output.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<Secret<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// JSON field carrying the prompt in the request body.
    pub payload_field: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
            payload_field: "prompt".into(),
        }
    }
}

impl DeliveryConfig {
    /// The configured URL, if any and non-blank.
    pub fn url(&self) -> Option<&str> {
        self.url
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|u| !u.trim().is_empty())
    }
}

impl TasklaneConfig {
    /// Effective task file path.
    pub fn tasks_file(&self) -> PathBuf {
        self.scheduler
            .tasks_file
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("tasks.json"))
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = TasklaneConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.scheduler.poll_interval_secs, 30);
        assert!(cfg.scheduler.misfire_grace_secs.is_none());
        assert_eq!(cfg.delivery.timeout_secs, 10);
        assert_eq!(cfg.delivery.payload_field, "prompt");
        assert!(cfg.delivery.url().is_none());
        assert!(cfg.tasks_file().ends_with("tasks.json"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: TasklaneConfig = toml::from_str(
            r#"
[scheduler]
tasks_file = "/var/lib/tasklane/tasks.json"

[delivery]
url = "http://hooks.local/webhook/abc"
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.scheduler.poll_interval_secs, 30);
        assert_eq!(cfg.tasks_file(), PathBuf::from("/var/lib/tasklane/tasks.json"));
        assert_eq!(cfg.delivery.url(), Some("http://hooks.local/webhook/abc"));
    }

    #[test]
    fn url_redacted_in_debug_but_serialized() {
        let cfg: TasklaneConfig = toml::from_str(
            r#"
[delivery]
url = "http://hooks.local/webhook/secret-token"
"#,
        )
        .unwrap();
        assert!(!format!("{cfg:?}").contains("secret-token"));
        let out = toml::to_string(&cfg).unwrap();
        assert!(out.contains("secret-token"));
    }

    #[test]
    fn blank_url_treated_as_unset() {
        let cfg: TasklaneConfig = toml::from_str("[delivery]\nurl = \"  \"\n").unwrap();
        assert!(cfg.delivery.url().is_none());
    }
}
