use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use tasklane_config::{
    Diagnostic, ValidationResult,
    validate::{self, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the path of the config file that would be loaded.
    Path,
}

pub fn handle_config(action: ConfigAction, config_dir: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let result = validate::validate(None, config_dir);
            eprint!("{}", render_report(&result, verbose, true));
            if result.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        },
        ConfigAction::Path => {
            match tasklane_config::find_config_file(config_dir) {
                Some(path) => println!("{}", path.display()),
                None => eprintln!("No config file found."),
            }
            Ok(())
        },
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let (code, label) = match severity {
        Severity::Error => ("31", "error"),
        Severity::Warning => ("33", "warning"),
        Severity::Info => ("36", "info"),
    };
    if color {
        format!("\x1b[1;{code}m{label}\x1b[0m")
    } else {
        label.to_string()
    }
}

fn render_line(d: &Diagnostic, color: bool) -> String {
    let label = severity_label(d.severity, color);
    if d.path.is_empty() {
        format!("  {label} {}\n", d.message)
    } else {
        format!("  {label} {}: {}\n", d.path, d.message)
    }
}

fn render_report(result: &ValidationResult, verbose: bool, color: bool) -> String {
    let mut out = match result.config_path {
        Some(ref path) => format!("Checking {}\n\n", path.display()),
        None => "No config file found; checking defaults.\n\n".to_string(),
    };

    let lines: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(|d| render_line(d, color))
        .collect();
    if !lines.is_empty() {
        out.extend(lines);
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        out.push_str(&format!("{errors} error(s), {warnings} warning(s)\n"));
    }
    out
}
