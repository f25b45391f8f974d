//! CLI entrypoint for model-council
//!
//! Wires the layers together with dependency injection and exposes the
//! offline `simulate` command plus configuration inspection.

mod output;
mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use council_application::ports::event_sink::{EventSink, NoEventSink};
use council_application::{NegotiateUseCase, NegotiationInput};
use council_infrastructure::{
    ConfigLoader, FileConfig, JsonlEventSink, LexicalSimilarity, OfflineFallbackSynthesizer,
    ReconsiderationPromptBuilder,
};
use output::ConsoleFormatter;
use scenario::Scenario;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-council", version, about = "Multi-model council consensus runner")]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mirror logs into this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted scenario through the real negotiation loop, offline
    Simulate {
        /// Scenario TOML: members, round-0 answers, scripted rounds
        #[arg(long)]
        scenario: PathBuf,

        /// Config file overriding the default consensus parameters
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "full")]
        output: OutputFormat,
    },
    /// Print the merged configuration
    Config {
        /// List the config sources instead of the merged values
        #[arg(long)]
        sources: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Full,
    Json,
}

fn init_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    if let Some(path) = &cli.log_file {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .context("--log-file must name a file")?
            .to_os_string();
        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        Ok(None)
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FileConfig> {
    ConfigLoader::load(path).map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))
}

async fn simulate(
    scenario_path: &PathBuf,
    config_path: Option<&PathBuf>,
    output: OutputFormat,
) -> Result<()> {
    let file_config = load_config(config_path)?;
    let consensus = file_config
        .consensus()
        .context("invalid consensus configuration")?;

    let scenario = Scenario::load(scenario_path)?;
    info!(
        members = scenario.members.len(),
        rounds = scenario.rounds.len(),
        "replaying scenario"
    );

    // === Dependency Injection ===
    // Offline stack: scripted providers, lexical similarity, deterministic
    // fallback synthesis.
    let sink: Arc<dyn EventSink> = file_config
        .logging
        .event_log
        .as_ref()
        .and_then(JsonlEventSink::new)
        .map(|s| Arc::new(s) as Arc<dyn EventSink>)
        .unwrap_or_else(|| Arc::new(NoEventSink));

    let use_case = NegotiateUseCase::new(
        Arc::new(scenario.gateway()),
        Arc::new(LexicalSimilarity),
        Arc::new(ReconsiderationPromptBuilder::new()),
        Arc::new(OfflineFallbackSynthesizer::new()),
    )
    .with_event_sink(sink);

    let input = NegotiationInput::new(
        scenario.request(),
        scenario.initial_thread(),
        scenario.council(),
        consensus,
    );
    let outcome = use_case.synthesize(input).await?;

    let rendered = match output {
        OutputFormat::Full => ConsoleFormatter::format(&outcome),
        OutputFormat::Json => ConsoleFormatter::format_json(&outcome)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn show_config(sources: bool, config_path: Option<&PathBuf>) -> Result<()> {
    if sources {
        ConfigLoader::print_config_sources();
        return Ok(());
    }
    let file_config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&file_config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    match &cli.command {
        Commands::Simulate {
            scenario,
            config,
            output,
        } => simulate(scenario, config.as_ref(), *output).await,
        Commands::Config { sources, config } => show_config(*sources, config.as_ref()),
    }
}
