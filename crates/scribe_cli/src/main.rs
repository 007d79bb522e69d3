mod commands;
mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;
use scribe_core::QueueConfig;
use tracing::info;

use crate::output::Output;

#[derive(Parser)]
#[command(name = "scribe-cli")]
#[command(about = "Scribe media queue tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the queue with synthetic bursts of uploads
    Simulate(commands::simulate::SimulateArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Save the effective configuration to a file
    Save {
        /// Output file path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scribe")
        .join("logs");
    let _guard = init_logging(&log_dir, cli.debug);

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join("scribe-cli.log")
    );

    let config = load_config(cli.config.as_deref()).await?;
    let output = Output::new();

    match &cli.command {
        Commands::Simulate(args) => commands::simulate::run(config, args, &output).await?,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config, &output)?,
            ConfigCommands::Save { path } => commands::config::save(&config, path, &output).await?,
        },
    }

    Ok(())
}

/// Terminal plus daily rolling file logging. The returned guard flushes the
/// file writer on drop.
fn init_logging(log_dir: &Path, debug: bool) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_appender::rolling;
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all(log_dir).ok();

    let file_appender = rolling::daily(log_dir, "scribe-cli.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if debug {
        EnvFilter::new("scribe_core=debug,scribe_cli=debug,info")
    } else {
        EnvFilter::new("scribe_core=info,scribe_cli=info,warn")
    };

    let terminal_layer = if debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(EnvFilter::new("scribe_core=debug,scribe_cli=debug,info")))
        .init();

    guard
}

/// Explicit path, then the per-user config directory, then built-in defaults.
async fn load_config(explicit: Option<&Path>) -> Result<QueueConfig> {
    if let Some(path) = explicit {
        info!("Loading config from: {:?}", path);
        return Ok(QueueConfig::load_from_file(path).await?);
    }

    if let Some(path) = dirs::config_dir().map(|dir| dir.join("scribe").join("queue.toml")) {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!("Loading config from: {:?}", path);
            return Ok(QueueConfig::load_from_file(&path).await?);
        }
    }

    info!("No config file found, using defaults");
    Ok(QueueConfig::default())
}
