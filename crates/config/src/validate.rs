//! Configuration validation engine.
//!
//! Validates config files against the known schema, detects
//! unknown/misspelled fields, and reports settings that would break the
//! scheduler or silently drop tasks.

use std::{collections::HashMap, path::Path};

use crate::schema::TasklaneConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "scheduler",
    /// "delivery", "server", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "scheduler.timezone"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Represents the expected shape of the configuration schema.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar value: stop recursion.
    Leaf,
}

/// Build the full schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "server",
            Struct(HashMap::from([("bind", Leaf), ("port", Leaf)])),
        ),
        (
            "scheduler",
            Struct(HashMap::from([
                ("tasks_file", Leaf),
                ("poll_interval_secs", Leaf),
                ("misfire_grace_secs", Leaf),
                ("timezone", Leaf),
            ])),
        ),
        (
            "delivery",
            Struct(HashMap::from([
                ("url", Leaf),
                ("timeout_secs", Leaf),
                ("payload_field", Leaf),
            ])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Find the best match for `needle` among `candidates` using Levenshtein
/// distance. Returns `Some(best)` if the distance is <= `max_distance`.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>, config_dir_override: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(config_dir_override),
    };

    let Some(ref actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        )];
        check_config(&TasklaneConfig::default(), &mut diagnostics);
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let format = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml");
    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let content = crate::env_subst::substitute_env(&content);
            let mut result = validate_str(&content, format);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate config text in the given format (`toml`, `yaml`/`yml`, `json`)
/// without file-system side effects.
#[must_use]
pub fn validate_str(raw: &str, format: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax: parse into a format-neutral tree
    let value = match parse_value(raw, format) {
        Ok(v) => v,
        Err(message) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "syntax", "", message));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields: walk the tree against KnownKeys
    let schema = build_schema_map();
    check_unknown_fields(&value, &schema, "", &mut diagnostics);

    // 3. Type check, then semantic checks on the parsed config
    match serde_json::from_value::<TasklaneConfig>(value) {
        Ok(config) => check_config(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn parse_value(raw: &str, format: &str) -> Result<serde_json::Value, String> {
    match format {
        "toml" => {
            let v: toml::Value =
                toml::from_str(raw).map_err(|e| format!("TOML syntax error: {e}"))?;
            serde_json::to_value(v).map_err(|e| e.to_string())
        },
        "yaml" | "yml" => {
            // An empty YAML document parses as null; treat it as an empty config.
            let v: Option<serde_yaml::Value> =
                serde_yaml::from_str(raw).map_err(|e| format!("YAML syntax error: {e}"))?;
            match v {
                Some(v) => serde_json::to_value(v).map_err(|e| e.to_string()),
                None => Ok(serde_json::Value::Object(serde_json::Map::new())),
            }
        },
        "json" => serde_json::from_str(raw).map_err(|e| format!("JSON syntax error: {e}")),
        other => Err(format!("unsupported config format: .{other}")),
    }
}

/// Walk the value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        // Leaf or type mismatch: stop recursion (type errors caught later)
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            "at top level "
        } else {
            ""
        };
        let msg = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
            None => format!("unknown field {level}"),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            msg.trim(),
        ));
    }
}

/// Semantic checks on a parsed config. Run on the effective config at
/// startup as well, since environment overrides bypass file validation.
pub fn check_config(config: &TasklaneConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.server.port == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "server",
            "server.port",
            "port 0 binds a random available port",
        ));
    }

    let scheduler = &config.scheduler;
    if scheduler.poll_interval_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "scheduler",
            "scheduler.poll_interval_secs",
            "poll interval must be at least 1 second",
        ));
    } else if scheduler.poll_interval_secs > 60 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "scheduler",
            "scheduler.poll_interval_secs",
            "poll interval above 60 seconds skips minutes; recurring tasks may not fire",
        ));
    }

    if let Some(grace) = scheduler.misfire_grace_secs
        && grace < scheduler.poll_interval_secs
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "scheduler",
            "scheduler.misfire_grace_secs",
            format!(
                "grace window ({grace}s) is shorter than the poll interval ({}s); \
                 one-time tasks may expire before a tick sees them",
                scheduler.poll_interval_secs
            ),
        ));
    }

    if let Some(ref tz) = scheduler.timezone
        && tz.parse::<chrono_tz::Tz>().is_err()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "scheduler",
            "scheduler.timezone",
            format!("unknown timezone \"{tz}\" (expected an IANA name like \"Europe/Berlin\")"),
        ));
    }

    let delivery = &config.delivery;
    match delivery.url() {
        None => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "delivery",
            "delivery.url",
            "no webhook URL configured (set delivery.url or TRIGGER_WEBHOOK_URL); due tasks will be dropped",
        )),
        Some(raw) => match url::Url::parse(raw) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {},
            Ok(u) => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "delivery",
                "delivery.url",
                format!("unsupported URL scheme \"{}\"", u.scheme()),
            )),
            Err(e) => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "delivery",
                "delivery.url",
                format!("invalid URL: {e}"),
            )),
        },
    }

    if delivery.timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "delivery",
            "delivery.timeout_secs",
            "timeout must be at least 1 second",
        ));
    }

    if delivery.payload_field.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "delivery",
            "delivery.payload_field",
            "payload field name cannot be empty",
        ));
    }
}
