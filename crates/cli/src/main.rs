mod app;
mod config_commands;
mod tasks_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tasklane", about = "Tasklane: scheduled prompts delivered to a webhook")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Custom config directory (overrides default ~/.config/tasklane/).
    #[arg(long, global = true, env = "TASKLANE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Task file path (overrides config value).
    #[arg(long, global = true)]
    tasks_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the tool host (default when no subcommand is provided).
    Serve,
    /// Inspect or edit the task list.
    Tasks {
        #[command(subcommand)]
        action: tasks_commands::TaskAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown requested");
}

/// Effective config with the `--tasks-file` override applied.
fn effective_config(
    config_dir: Option<&Path>,
    tasks_file: Option<PathBuf>,
) -> tasklane_config::TasklaneConfig {
    let mut config = app::load_effective_config(config_dir);
    if let Some(path) = tasks_file {
        config.scheduler.tasks_file = Some(path);
    }
    config
}

async fn serve(
    config: tasklane_config::TasklaneConfig,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    app::check_effective_config(&config)?;

    let scheduler = app::build_scheduler(&config)?;
    scheduler.start().await;
    let status = scheduler.status().await;
    info!(
        tasks_file = %config.tasks_file().display(),
        tasks = status.task_count,
        one_shot = status.one_shot_count,
        recurring = status.recurring_count,
        next_run = status.next_run.as_deref().unwrap_or("-"),
        "scheduler running"
    );

    let bind = bind.unwrap_or(config.server.bind);
    let port = port.unwrap_or(config.server.port);
    let registry = tasklane_tools::default_registry(&scheduler);

    let served =
        tasklane_gateway::server::start_gateway(&bind, port, registry, shutdown_signal()).await;
    scheduler.stop().await;
    served
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let Cli {
        command,
        bind,
        port,
        config_dir,
        tasks_file,
        ..
    } = cli;

    match command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "tasklane starting");
            app::check_config_file(config_dir.as_deref())?;
            let config = effective_config(config_dir.as_deref(), tasks_file);
            serve(config, bind, port).await
        },
        Some(Commands::Tasks { action }) => {
            app::check_config_file(config_dir.as_deref())?;
            let config = effective_config(config_dir.as_deref(), tasks_file);
            let scheduler = app::build_scheduler(&config)?;
            tasks_commands::handle_tasks(action, &scheduler).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, config_dir.as_deref())
        },
    }
}
