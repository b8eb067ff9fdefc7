use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::TasklaneConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "tasklane.toml",
    "tasklane.yaml",
    "tasklane.yml",
    "tasklane.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<TasklaneConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./tasklane.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/tasklane.{toml,yaml,yml,json}`, where `config_dir` is
///    `config_dir_override` or the user-global `~/.config/tasklane/`
///
/// Returns `TasklaneConfig::default()` if no config file is found.
pub fn discover_and_load(config_dir_override: Option<&Path>) -> TasklaneConfig {
    if let Some(path) = find_config_file(config_dir_override) {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    TasklaneConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file(config_dir_override: Option<&Path>) -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir_override
        .map(Path::to_path_buf)
        .or_else(config_dir)?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/tasklane/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tasklane").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory (`~/.local/share/tasklane/`), or `.` when
/// no home directory can be determined.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "tasklane")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Recognized variables: `TRIGGER_WEBHOOK_URL`, `TASKLANE_TASKS_FILE`,
/// `TASKLANE_POLL_INTERVAL_SECS`, `TASKLANE_MISFIRE_GRACE_SECS`,
/// `TASKLANE_TIMEZONE`. Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides(config: TasklaneConfig) -> TasklaneConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: TasklaneConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> TasklaneConfig {
    if let Some(url) = lookup("TRIGGER_WEBHOOK_URL") {
        config.delivery.url = Some(Secret::new(url));
    }
    if let Some(path) = lookup("TASKLANE_TASKS_FILE") {
        config.scheduler.tasks_file = Some(PathBuf::from(path));
    }
    if let Some(secs) = parse_secs(&lookup, "TASKLANE_POLL_INTERVAL_SECS") {
        config.scheduler.poll_interval_secs = secs;
    }
    if let Some(secs) = parse_secs(&lookup, "TASKLANE_MISFIRE_GRACE_SECS") {
        config.scheduler.misfire_grace_secs = Some(secs);
    }
    if let Some(tz) = lookup("TASKLANE_TIMEZONE") {
        config.scheduler.timezone = Some(tz);
    }
    config
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "ignoring invalid env override");
            None
        },
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<TasklaneConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap, tempfile::TempDir};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn loads_each_format() {
        let tmp = TempDir::new().unwrap();
        let cases = [
            ("tasklane.toml", "[server]\nport = 9000\n"),
            ("tasklane.yaml", "server:\n  port: 9000\n"),
            ("tasklane.json", r#"{"server": {"port": 9000}}"#),
        ];
        for (name, body) in cases {
            let path = tmp.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert_eq!(cfg.server.port, 9000, "{name}");
        }
    }

    #[test]
    fn unsupported_extension_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tasklane.ini");
        std::fs::write(&path, "port=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn finds_config_in_override_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("tasklane.yaml"),
            "scheduler:\n  poll_interval_secs: 5\n",
        )
        .unwrap();

        let found = find_config_file(Some(tmp.path())).unwrap();
        assert_eq!(found, tmp.path().join("tasklane.yaml"));
        let cfg = discover_and_load(Some(tmp.path()));
        assert_eq!(cfg.scheduler.poll_interval_secs, 5);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("tasklane.toml"), "[server\nport = ").unwrap();
        let cfg = discover_and_load(Some(tmp.path()));
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn env_overrides_applied() {
        let lookup = lookup_from(&[
            ("TRIGGER_WEBHOOK_URL", "http://hooks.local/x"),
            ("TASKLANE_TASKS_FILE", "/tmp/tasks.json"),
            ("TASKLANE_POLL_INTERVAL_SECS", "15"),
            ("TASKLANE_MISFIRE_GRACE_SECS", "300"),
            ("TASKLANE_TIMEZONE", "Europe/Berlin"),
        ]);
        let cfg = apply_env_overrides_with(TasklaneConfig::default(), lookup);
        assert_eq!(cfg.delivery.url(), Some("http://hooks.local/x"));
        assert_eq!(cfg.tasks_file(), PathBuf::from("/tmp/tasks.json"));
        assert_eq!(cfg.scheduler.poll_interval_secs, 15);
        assert_eq!(cfg.scheduler.misfire_grace_secs, Some(300));
        assert_eq!(cfg.scheduler.timezone.as_deref(), Some("Europe/Berlin"));
    }

    #[test]
    fn invalid_env_number_ignored() {
        let lookup = lookup_from(&[("TASKLANE_POLL_INTERVAL_SECS", "soon")]);
        let cfg = apply_env_overrides_with(TasklaneConfig::default(), lookup);
        assert_eq!(cfg.scheduler.poll_interval_secs, 30);
    }

    #[test]
    fn env_substitution_in_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tasklane.toml");
        // PATH is set in every test environment.
        std::fs::write(&path, "[scheduler]\ntimezone = \"${PATH}\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.scheduler.timezone, std::env::var("PATH").ok());
    }
}
