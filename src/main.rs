use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use wardend::config::WardenConfig;
use wardend::events::FileOperation;
use wardend::orchestrator::SecurityOrchestrator;

#[derive(Parser)]
#[command(
    name = "wardend",
    about = "Warden — security isolation daemon for multi-project automation",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for audit log, quarantine, forensics, and backups
    #[arg(long, env = "WARDEND_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to the TOML config file (default: {data_dir}/warden.toml)
    #[arg(long, env = "WARDEND_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WARDEND_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "WARDEND_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Emit structured JSON logs instead of the human-readable format
    #[arg(long, env = "WARDEND_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the warden in the foreground (default when no subcommand given).
    ///
    /// Seeds the framework boundaries, starts filesystem monitoring and the
    /// verification/threat/posture timers, and runs until interrupted.
    ///
    /// Examples:
    ///   wardend serve
    ///   wardend
    Serve,
    /// Print the comprehensive security report as JSON and exit.
    ///
    /// Examples:
    ///   wardend report
    Report,
    /// Validate a single path through the access gate and print the verdict.
    ///
    /// Examples:
    ///   wardend check ../../../etc/passwd --project demo
    ///   wardend check src/main.rs --project demo --operation read
    Check {
        /// The path to validate (raw, as an agent would supply it)
        path: String,
        /// Project identity the access is attributed to
        #[arg(long)]
        project: String,
        /// Operation being gated: read or write
        #[arg(long, default_value = "write")]
        operation: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = if args.json_logs { "json" } else { "pretty" };
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), log_format);

    // Flag beats file beats built-in default for the data dir; the config
    // file location itself defaults under whichever data dir is in effect.
    let config_path = match (&args.config, &args.data_dir) {
        (Some(c), _) => c.clone(),
        (None, Some(d)) => d.join("warden.toml"),
        (None, None) => WardenConfig::default().data_dir.join("warden.toml"),
    };
    let config = WardenConfig::load_with_overrides(&config_path, args.data_dir)?;

    match args.command {
        None | Some(Command::Serve) => run_serve(config).await,
        Some(Command::Report) => run_report(config).await,
        Some(Command::Check {
            path,
            project,
            operation,
        }) => run_check(config, &path, &project, &operation).await,
    }
}

async fn run_serve(config: WardenConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let orch = SecurityOrchestrator::new(config);
    orch.start().await?;
    info!("wardend running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    orch.stop().await;
    Ok(())
}

async fn run_report(config: WardenConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let data_dir = config.data_dir.clone();
    let orch = SecurityOrchestrator::new(config);
    orch.engine.seed(&data_dir).await?;
    let report = orch.export_comprehensive_security_report().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_check(
    config: WardenConfig,
    path: &str,
    project: &str,
    operation: &str,
) -> Result<()> {
    let operation = match operation {
        "read" => FileOperation::Read,
        "write" => FileOperation::Write,
        other => anyhow::bail!("unknown operation '{other}' (expected read or write)"),
    };
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let orch = SecurityOrchestrator::new(config);
    // The current directory stands in as the project sandbox for one-shot
    // checks.
    let cwd = std::env::current_dir()?;
    orch.pathguard.register_root(project, &cwd).await;
    let verdict = orch.pathguard.validate(path, Some(project), operation).await;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    std::process::exit(if verdict.is_safe { 0 } else { 1 });
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
            .unwrap_or_else(|| std::ffi::OsStr::new("wardend.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
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
