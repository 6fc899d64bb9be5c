/*!
 * Outage CLI - runs the outage detection agent
 *
 * Reads bus messages as JSON lines from a file or stdin and writes outage
 * alerts as JSON lines to a file or stdout. Diagnostics go to stderr or
 * the configured log file.
 */

use clap::{Parser, ValueEnum};
use outage::{
    config::{AgentConfig, LogLevel},
    error::{AgentError, Result, EXIT_SUCCESS},
    logging, JsonLinesSink, OutageAgent, SystemClock,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "outage")]
#[command(version, about = "Detect monitored devices that stopped reporting metrics", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// TTL for newly tracked assets in seconds (alerts fire after twice this)
    #[arg(long = "default-ttl", value_name = "SECS")]
    default_ttl: Option<u64>,

    /// Seconds between dead-asset sweeps
    #[arg(long = "sweep-interval", value_name = "SECS")]
    sweep_interval: Option<u64>,

    /// Read bus messages from FILE instead of stdin
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,

    /// Append alerts to FILE instead of stdout
    #[arg(short = 'a', long = "alerts", value_name = "FILE")]
    alerts: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write logs to FILE (JSON) instead of stderr
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose output (debug logging and per-asset cache tracing)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    config.validate()?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

/// Merge the configuration file with command line overrides
fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match cli.config {
        Some(ref path) => AgentConfig::from_file(path)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?,
        None => AgentConfig::default(),
    };

    if let Some(ttl) = cli.default_ttl {
        config.default_ttl_sec = ttl;
    }
    if let Some(interval) = cli.sweep_interval {
        config.sweep_interval_secs = interval;
    }
    if cli.input.is_some() {
        config.input = cli.input.clone();
    }
    if cli.alerts.is_some() {
        config.alerts_output = cli.alerts.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    Ok(config)
}

async fn open_input(config: &AgentConfig) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    Ok(match config.input {
        Some(ref path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

async fn open_alerts(config: &AgentConfig) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    Ok(match config.alerts_output {
        Some(ref path) => Box::new(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?,
        ),
        None => Box::new(tokio::io::stdout()),
    })
}

async fn serve(config: AgentConfig) -> Result<()> {
    let input = open_input(&config).await?;
    let sink = JsonLinesSink::new(open_alerts(&config).await?);
    let mut agent = OutageAgent::new(&config, sink, SystemClock)?;

    tokio::select! {
        result = agent.run(input) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }

    info!("Outage agent stopped: {}", agent.stats().summary());
    Ok(())
}
