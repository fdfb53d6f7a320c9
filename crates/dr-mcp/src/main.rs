use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dr_core::{Query, Reasoner};
use dr_providers::DeepSeekProvider;

mod config;
mod server;
mod setup;

use config::Config;
use server::ReasonServer;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: every SSE chunk and fragment
    Trace,
    /// Verbose: request shape, skipped frames
    Debug,
    /// Standard: one line per tool call
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "deep-reason")]
#[command(author, version, about = "DeepSeek R1 reasoning trace as an MCP tool", long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/deep-reason/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format) instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,
    /// Reason about a single question and print the result
    Ask {
        /// The question to reason about
        #[arg(short, long)]
        question: String,

        /// Optional background context
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Show the effective configuration (API key masked)
    Config,
    /// Write a starter config file to ~/.config/deep-reason
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    // stdout carries the MCP transport, so logs never go there
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter()));

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Setup writes the config file, so it runs before any is loaded
    match &cli.command {
        Some(Commands::Setup) => setup::run(),
        Some(Commands::Ask { question, context }) => {
            let config = load_config(&cli)?;
            ask_mode(&config, question, context.clone()).await
        }
        Some(Commands::Config) => show_config(&load_config(&cli)?),
        Some(Commands::Serve) | None => serve_mode(&load_config(&cli)?).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    config::load_dotenv();
    Config::load(cli.config.as_deref())
}

fn build_reasoner(config: &Config) -> Reasoner {
    if !config.has_api_key() {
        warn!(
            "No API key configured; set {} or api_key in the config file",
            config::API_KEY_ENV
        );
    }

    let provider = DeepSeekProvider::new(config.api_key.clone().unwrap_or_default())
        .with_base_url(&config.base_url)
        .with_default_model(&config.model)
        .with_timeouts(config.request_timeout(), config.connect_timeout());

    let mut reasoner = Reasoner::new(Arc::new(provider))
        .with_format_style(config.format)
        .with_template(config.prompt_template)
        .with_model(&config.model);
    if let Some(temperature) = config.request_temperature() {
        reasoner = reasoner.with_temperature(temperature);
    }
    reasoner
}

async fn serve_mode(config: &Config) -> Result<()> {
    let reasoner = build_reasoner(config);
    info!(
        model = %config.model,
        format = reasoner.formatter_name(),
        timeout_secs = config.request_timeout_secs,
        "Starting deep-reason MCP server on stdio"
    );

    let server = ReasonServer::new(Arc::new(reasoner));
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport)
        .await
        .context("Failed to start MCP server")?;
    service.waiting().await?;

    info!("MCP client disconnected, shutting down");
    Ok(())
}

async fn ask_mode(config: &Config, question: &str, context: Option<String>) -> Result<()> {
    let reasoner = build_reasoner(config);
    let query = Query {
        context,
        question: question.to_string(),
    };
    let output = reasoner.reason(&query).await;
    println!("{}", output);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::config_path()?;
    println!("# Config file: {}", path.display());
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["deep-reason"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["deep-reason", "setup"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Setup)));

        let cli = Cli::try_parse_from(["deep-reason", "--debug", "ask", "-q", "Why?", "-c", "ctx"])
            .unwrap();
        assert!(cli.debug);
        match cli.command {
            Some(Commands::Ask { question, context }) => {
                assert_eq!(question, "Why?");
                assert_eq!(context.as_deref(), Some("ctx"));
            }
            _ => panic!("expected ask"),
        }
    }
}
