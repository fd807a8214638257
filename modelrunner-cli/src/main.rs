//! # modelrunner CLI
//!
//! Resolves the model endpoint the same way agents do and lets you look at it.
//!
//! Usage:
//!   modelrunner [show] [--json]
//!   modelrunner env
//!   modelrunner exec -- <command> [args...]
//!   modelrunner probe
//!   modelrunner chat [--hosted | --local] [--stream] <prompt>...
//!
//! Examples:
//!   eval "$(modelrunner env)"
//!   modelrunner exec -- python agent.py
//!   DOCKER_MODEL_RUNNER=http://example:9999/v1 modelrunner show --json
//!   modelrunner -v chat "Create a card component with image, title, and description"

use clap::{ArgAction, Parser, Subcommand};
use modelrunner_config::{
    container, env, mask_secret, EndpointResolver, EnvSnapshot, EnvSource, ProcessEnv, Prober,
    RunnerConfig, SearchSettings, TcpProber,
};
use modelrunner_error::{Error, Result};
use modelrunner_llm::{
    ChatMessage, CompletionRequest, LlmProvider, OpenAIProvider, ProviderConfig, ProviderKind,
    StreamChunk,
};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Responses longer than this are cut when printed
const DISPLAY_LIMIT: usize = 1000;

#[derive(Parser)]
#[command(name = "modelrunner")]
#[command(author, version, about = "Container-aware model endpoint resolution")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// TCP connect timeout per container candidate, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    probe_timeout_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration (default)
    Show {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print shell `export` lines for OPENAI_API_KEY / OPENAI_API_BASE
    Env,
    /// Run a command with OPENAI_API_KEY / OPENAI_API_BASE set
    Exec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Show container signals and which candidates accept connections
    Probe,
    /// Send one prompt to the resolved endpoint
    Chat {
        /// Force the hosted Gemini model (requires GOOGLE_API_KEY)
        #[arg(long, conflicts_with = "local")]
        hosted: bool,

        /// Force the local model even when GOOGLE_API_KEY is set
        #[arg(long)]
        local: bool,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<usize>,

        /// Do not truncate long responses
        #[arg(long)]
        full: bool,

        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cut `text` to `max_chars` characters, marking the cut.
fn truncate_response(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n... [truncated] ...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Single-quote for POSIX shells
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

async fn resolve(probe_timeout: Duration) -> RunnerConfig {
    EndpointResolver::new(ProcessEnv, TcpProber::new(probe_timeout))
        .resolve()
        .await
}

fn show(config: &RunnerConfig, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(&config.summary()).map_err(|e| {
            Error::unexpected("failed to render configuration")
                .with_operation("cli::show")
                .set_source(e)
        })?;
        println!("{}", text);
        return Ok(());
    }

    let summary = config.summary();
    println!("Model Runner Configuration:");
    println!("   API Base: {} ({})", config.api_base(), config.source());
    println!("   Model: {}", config.model_name());
    println!("   API Key: {}", summary["api_key"].as_str().unwrap_or_default());
    println!("   Running in container: {}", config.in_container());
    match config.google_api_key() {
        Some(_) => println!(
            "   Hosted model: available ({})",
            config.google_cloud_location()
        ),
        None => println!("   Hosted model: unavailable (GOOGLE_API_KEY not set)"),
    }
    Ok(())
}

fn print_env(config: &RunnerConfig) {
    for (key, value) in config.exported_env() {
        println!("export {}={}", key, shell_quote(&value));
    }
}

/// Run `command` with the exported env; returns the child's exit code.
fn exec(config: &RunnerConfig, command: &[String]) -> Result<u8> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::invalid_argument("no command given").with_operation("cli::exec"))?;

    let mut child = std::process::Command::new(program);
    child.args(args);
    config.apply_to_command(&mut child);

    let status = child.status().map_err(|e| {
        Error::from(e)
            .with_operation("cli::exec")
            .with_context("program", program.clone())
    })?;

    // killed by a signal: report generic failure
    Ok(status.code().map(|code| code.clamp(0, 255) as u8).unwrap_or(1))
}

async fn probe(probe_timeout: Duration) {
    let snapshot = EnvSnapshot::capture(&ProcessEnv, &container::sentinel_paths());
    println!("Environment:");
    for line in describe_env(&snapshot) {
        println!("  {}", line);
    }

    let signals = container::detect(&snapshot);
    if signals.is_empty() {
        println!("Container signals: none");
    } else {
        let names: Vec<String> = signals.iter().map(|s| s.to_string()).collect();
        println!("Container signals: {}", names.join(", "));
    }

    let prober = TcpProber::new(probe_timeout);
    let resolver = EndpointResolver::new(&snapshot, prober);
    println!("Candidates:");
    for endpoint in resolver.candidates() {
        let state = if prober.is_reachable(endpoint).await {
            "reachable"
        } else {
            "unreachable"
        };
        println!("  {:<11} {}", state, endpoint);
    }
    let fallback = modelrunner_config::LOCALHOST_ENDPOINT;
    let state = if prober.is_reachable(fallback).await {
        "reachable"
    } else {
        "unreachable"
    };
    println!("Fallback:\n  {:<11} {}", state, fallback);
}

/// `KEY=value` for each consumed variable that is set, secrets masked
fn describe_env(source: &impl EnvSource) -> Vec<String> {
    env::CONSUMED_VARS
        .iter()
        .filter_map(|key| {
            let value = source.var(key)?;
            let shown = match *key {
                env::OPENAI_API_KEY | env::GOOGLE_API_KEY => mask_secret(&value),
                _ => value,
            };
            Some(format!("{}={}", key, shown))
        })
        .collect()
}

/// Which model `chat` talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Hosted when GOOGLE_API_KEY is set, local otherwise
    Auto,
    Local,
    Hosted,
}

impl Backend {
    fn from_flags(hosted: bool, local: bool) -> Self {
        match (hosted, local) {
            (true, _) => Backend::Hosted,
            (_, true) => Backend::Local,
            _ => Backend::Auto,
        }
    }
}

struct ChatOptions {
    backend: Backend,
    stream: bool,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    full: bool,
}

fn build_provider(config: &RunnerConfig, options: &ChatOptions) -> Result<OpenAIProvider> {
    let selected = match options.backend {
        Backend::Hosted => SearchSettings::Hosted(config.hosted_settings()?),
        Backend::Local => SearchSettings::Local(config.model_settings()),
        Backend::Auto => config.search_settings(),
    };

    let provider_config = match selected {
        SearchSettings::Hosted(settings) => ProviderConfig::hosted(&settings),
        SearchSettings::Local(mut settings) => {
            if let Some(temperature) = options.temperature {
                settings = settings.with_temperature(temperature);
            }
            if let Some(max_tokens) = options.max_tokens {
                settings = settings.with_max_tokens(max_tokens);
            }
            ProviderConfig::from_settings(&settings)
        }
    };
    OpenAIProvider::new(provider_config)
}

async fn chat(config: &RunnerConfig, prompt: &str, options: ChatOptions) -> Result<()> {
    let provider = build_provider(config, &options)?;
    tracing::info!(
        provider = provider.name(),
        model = provider.default_model(),
        "processing query: {}",
        truncate_response(prompt, 50)
    );

    let mut request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
    if provider.config().kind == ProviderKind::Hosted {
        if let Some(temperature) = options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
    }

    println!("\n{} ({}):", provider.name(), provider.default_model());
    println!("{}", "-".repeat(50));

    if options.stream {
        let mut receiver = provider.stream(request).await?;
        let mut stdout = std::io::stdout();
        while let Some(chunk) = receiver.next().await {
            match chunk {
                StreamChunk::Text(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                StreamChunk::Done { .. } => break,
                StreamChunk::Error(e) => {
                    return Err(Error::network_failed(e).with_operation("cli::chat"));
                }
            }
        }
        println!();
        return Ok(());
    }

    let response = provider.complete(request).await?;
    let text = response.content.unwrap_or_default();
    tracing::info!("{}: {} characters", provider.name(), text.chars().count());

    if options.full {
        println!("{}", text);
    } else {
        println!("{}", truncate_response(&text, DISPLAY_LIMIT));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let probe_timeout = Duration::from_millis(cli.probe_timeout_ms);

    match cli.command.unwrap_or(Commands::Show { json: false }) {
        Commands::Show { json } => {
            let config = resolve(probe_timeout).await;
            show(&config, json)?;
        }
        Commands::Env => {
            let config = resolve(probe_timeout).await;
            print_env(&config);
        }
        Commands::Exec { command } => {
            let config = resolve(probe_timeout).await;
            return exec(&config, &command).map(ExitCode::from);
        }
        Commands::Probe => probe(probe_timeout).await,
        Commands::Chat {
            hosted,
            local,
            stream,
            temperature,
            max_tokens,
            full,
            prompt,
        } => {
            let config = resolve(probe_timeout).await;
            let options = ChatOptions {
                backend: Backend::from_flags(hosted, local),
                stream,
                temperature,
                max_tokens,
                full,
            };
            chat(&config, &prompt.join(" "), options).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
