use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use todod::{
    config::ServerConfig,
    rest,
    storage::Storage,
    tasks::{Filter, TaskDraft},
    AppContext,
};

#[derive(Parser)]
#[command(
    name = "todod",
    about = "Self-contained to-do list server: REST API + embedded web client",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port
    #[arg(long, env = "TODOD_PORT")]
    port: Option<u16>,

    /// Data directory for the SQLite database and config.toml
    #[arg(long, env = "TODOD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TODOD_LOG")]
    log: Option<String>,

    /// Bind address for the HTTP server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TODOD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TODOD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Suppress progress and informational output.
    ///
    /// Errors are still printed to stderr. JSON output (--json flags) is
    /// unaffected. Use this flag when piping output to other tools.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server (default when no subcommand given).
    ///
    /// Runs migrations, then serves the REST API and the browser client in
    /// the foreground.
    ///
    /// Examples:
    ///   todod serve
    ///   todod
    Serve,
    /// Manage tasks from the command line.
    ///
    /// Operates directly on the task database — no server required.
    ///
    /// Examples:
    ///   todod tasks list --filter active
    ///   todod tasks add --title "Buy milk"
    ///   todod tasks done <id>
    ///   todod tasks rm <id>
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
}

#[derive(Subcommand)]
enum TasksAction {
    /// List tasks, optionally filtered by completion.
    ///
    /// Prints a formatted table. Use --json for machine-readable output
    /// suitable for piping to other tools.
    ///
    /// Examples:
    ///   todod tasks list
    ///   todod tasks list --filter completed
    ///   todod tasks list --json
    List {
        /// Completion filter: all, active, or completed
        #[arg(long, short, default_value_t = Filter::All)]
        filter: Filter,
        /// Output as JSON array (for piping)
        #[arg(long)]
        json: bool,
    },
    /// Add a new task.
    ///
    /// Examples:
    ///   todod tasks add --title "Buy milk"
    ///   todod tasks add --title "Call the bank" --description "before Friday"
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Mark a task completed.
    ///
    /// Examples:
    ///   todod tasks done 4f7c0d2e-…
    Done {
        /// Task id
        id: String,
    },
    /// Remove a task permanently.
    ///
    /// Examples:
    ///   todod tasks rm 4f7c0d2e-…
    Rm {
        /// Task id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let quiet = args.quiet;
    match args.command {
        Some(Command::Tasks { action }) => {
            // CLI commands skip the TOML layer for logging: they run and
            // exit, so only the flag/env level matters.
            let log_level = args.log.as_deref().unwrap_or("info").to_owned();
            let log_format =
                std::env::var("TODOD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
            let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);
            run_tasks(action, args.data_dir, quiet).await?;
        }
        None | Some(Command::Serve) => {
            // Config before logging: the `log` and `log_format` keys in
            // config.toml feed the subscriber the same way the CLI flag
            // and env vars do (CLI/env win, then TOML, then defaults).
            let config = Arc::new(ServerConfig::new(
                args.port,
                args.data_dir,
                args.log,
                args.bind_address,
            ));
            let _file_guard =
                setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);
            run_server(config).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("todod.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ── Panic hook + crash log ────────────────────────────────────────────────────

/// Install a custom panic hook that writes panic info + backtrace to `{data_dir}/crash.log`.
///
/// The crash log is checked and removed on the next startup (`check_crash_log`).
fn install_panic_hook(data_dir: std::path::PathBuf) {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Call the original hook first (prints to stderr).
        original(info);

        let crash_path = data_dir.join("crash.log");
        let msg = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        let backtrace = std::backtrace::Backtrace::capture();
        let content = format!(
            "todod panic at {location}\n\
             message: {msg}\n\
             version: {}\n\
             backtrace:\n{backtrace:#}\n",
            env!("CARGO_PKG_VERSION")
        );

        // Best-effort write — if this fails, we can't do much.
        let _ = std::fs::write(&crash_path, &content);
    }));
}

/// Check for a crash log from the previous run, log it at error level, then delete it.
///
/// Called early in `run_server()` after logging is initialized.
fn check_crash_log(data_dir: &std::path::Path) {
    let crash_path = data_dir.join("crash.log");
    match std::fs::read_to_string(&crash_path) {
        Ok(content) => {
            tracing::error!(
                crash_report = %content.trim(),
                "previous run ended with a panic — see crash report above"
            );
            let _ = std::fs::remove_file(&crash_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(err = %e, "could not read crash.log");
        }
    }
}

// ── todod serve ───────────────────────────────────────────────────────────────

async fn run_server(config: Arc<ServerConfig>) -> Result<()> {
    install_panic_hook(config.data_dir.clone());
    check_crash_log(&config.data_dir);

    // Opening storage runs migrations, so the schema is current before the
    // listener binds.
    let storage = Arc::new(
        Storage::new_with_slow_query(
            &config.data_dir,
            config.observability.slow_query_threshold_ms,
        )
        .await
        .context("failed to open the task database")?,
    );

    let ctx = Arc::new(AppContext::new(config, storage));
    rest::start_rest_server(ctx).await
}

// ── todod tasks ───────────────────────────────────────────────────────────────

/// Open the task DB for CLI commands (no server — just storage access).
async fn open_task_store(data_dir: Option<std::path::PathBuf>) -> Result<Storage> {
    let config = ServerConfig::new(None, data_dir, Some("error".to_string()), None);
    Storage::new(&config.data_dir).await
}

async fn run_tasks(
    action: TasksAction,
    data_dir: Option<std::path::PathBuf>,
    quiet: bool,
) -> Result<()> {
    let store = open_task_store(data_dir).await?;

    match action {
        TasksAction::List { filter, json } => {
            let tasks = filter.apply(&store.list_tasks().await?);
            if json {
                println!("{}", serde_json::to_string(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!("{:<36}  {:<9}  TITLE", "ID", "STATUS");
                println!("{}", "-".repeat(72));
                for t in &tasks {
                    let status = if t.is_completed { "done" } else { "active" };
                    println!("{:<36}  {status:<9}  {}", t.id, t.title);
                }
                println!("\n{} task(s)", tasks.len());
            }
        }

        TasksAction::Add { title, description } => {
            let task = store
                .insert_task(TaskDraft {
                    title,
                    description,
                    ..Default::default()
                })
                .await?;
            if !quiet {
                println!("Added: {} — {}", task.id, task.title);
            }
        }

        TasksAction::Done { id } => {
            let mut task = store
                .get_task(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("task not found: {id}"))?;
            task.is_completed = true;
            store.update_task(&id, &task).await?;
            if !quiet {
                println!("Done: {} — {}", task.id, task.title);
            }
        }

        TasksAction::Rm { id } => {
            store.delete_task(&id).await?;
            if !quiet {
                println!("Removed: {id}");
            }
        }
    }

    Ok(())
}
