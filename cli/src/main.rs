//! CLI entrypoint for llm-council
//!
//! Wires configuration, provider clients, the registry, and the store
//! together, then runs one council turn and prints its event stream as
//! newline-delimited JSON on stdout. Diagnostics go to stderr and the
//! log file, never the event stream.

use anyhow::{Result, bail};
use clap::Parser;
use council_application::{
    ConversationStore, CouncilRequest, ModelClient, ModelRegistry, RunCouncilUseCase,
};
use council_domain::CouncilEvent;
use council_infrastructure::{
    ConfigLoader, FileConfig, JsonFileStore, MemoryConversationStore, OpenAiClient,
    OpenRouterClient, Severity,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "llm-council",
    version,
    about = "Ask a council of LLMs: parallel opinions, peer review, chairman synthesis"
)]
struct Cli {
    /// The question to put to the council
    question: Option<String>,

    /// Continue an existing conversation
    #[arg(short = 'c', long = "conversation")]
    conversation: Option<String>,

    /// Councilor model id (repeatable); overrides the configured default
    #[arg(short = 'm', long = "model")]
    model: Vec<String>,

    /// Path to a config file (in addition to discovery)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore all config files and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Show config file locations and exit
    #[arg(long)]
    show_config: bool,

    /// Conversation store path (overrides [storage].path)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Keep conversations in memory only; nothing is written to disk
    #[arg(long, conflicts_with = "store")]
    ephemeral: bool,

    /// List known models and exit
    #[arg(long)]
    list_models: bool,

    /// List stored conversations and exit
    #[arg(long)]
    list_conversations: bool,

    /// Delete a conversation and exit
    #[arg(long, value_name = "ID")]
    delete: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable file logging
    #[arg(long)]
    no_log_file: bool,
}

/// Format timestamps using local time (via chrono).
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Resolve the log directory path.
///
/// Priority: CLI `--log-dir` → `dirs::data_dir()/llm-council/logs/` → `.llm-council/logs/`
fn resolve_log_dir(override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path {
        return path.to_path_buf();
    }
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("llm-council").join("logs");
    }
    PathBuf::from(".llm-council").join("logs")
}

/// Initialize multi-layer logging (stderr console + optional file).
///
/// The console layer writes to stderr so stdout stays a clean NDJSON
/// event stream. Returns the worker guard that must be held for file
/// log flushing.
fn init_logging(verbose: u8, log_dir_override: Option<&Path>, no_log_file: bool) -> Option<WorkerGuard> {
    let console_filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let console_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    if no_log_file {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let log_dir = resolve_log_dir(log_dir_override);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "Warning: Could not create log directory {}: {}",
            log_dir.display(),
            e
        );
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let log_filename = format!(
        "council-{}-{}.log",
        chrono::Local::now().format("%Y-%m-%dT%H-%M-%S"),
        std::process::id()
    );
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = match verbose {
        0..=2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let file_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_dir.join(&log_filename).display());
    Some(guard)
}

/// Build the provider clients named by the config. Providers without
/// credentials are skipped with a warning.
fn build_clients(config: &FileConfig) -> HashMap<String, Arc<dyn ModelClient>> {
    let per_call_timeout = Duration::from_millis(config.limits.per_call_timeout_ms);
    let mut clients: HashMap<String, Arc<dyn ModelClient>> = HashMap::new();

    if let Some(openai) = OpenAiClient::try_new(&config.providers.openai, per_call_timeout) {
        clients.insert("openai".to_string(), Arc::new(openai));
    }
    if let Some(openrouter) =
        OpenRouterClient::try_new(&config.providers.openrouter, per_call_timeout)
    {
        clients.insert("openrouter".to_string(), Arc::new(openrouter));
    }

    clients
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --show-config flag
    if cli.show_config {
        println!("Configuration sources (lowest to highest priority):");
        println!("  built-in defaults");
        if let Some(path) = ConfigLoader::global_config_path() {
            let state = if path.exists() { "found" } else { "absent" };
            println!("  global:  {} ({})", path.display(), state);
        }
        match ConfigLoader::project_config_path() {
            Some(path) => println!("  project: {} (found)", path.display()),
            None => println!("  project: ./council.toml or ./.council.toml (absent)"),
        }
        return Ok(());
    }

    // Load configuration (respecting --no-config flag)
    let (config, config_issues): (FileConfig, Vec<_>) = if cli.no_config {
        let config = ConfigLoader::load_defaults();
        let issues = config.validate();
        (config, issues)
    } else {
        match ConfigLoader::load(cli.config.as_ref()) {
            Ok(loaded) => {
                eprintln!("config: {}", loaded.describe_sources());
                (loaded.config, loaded.issues)
            }
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                let config = ConfigLoader::load_defaults();
                let issues = config.validate();
                (config, issues)
            }
        }
    };

    for issue in &config_issues {
        match issue.severity {
            Severity::Warning => eprintln!("Warning: {}", issue.message),
            Severity::Error => eprintln!("Error: {}", issue.message),
        }
    }
    if FileConfig::has_errors(&config_issues) {
        bail!("Invalid configuration");
    }

    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref(), cli.no_log_file);
    info!("Starting llm-council");

    // === Dependency Injection ===
    let clients = build_clients(&config);

    let mut descriptors = config.to_descriptors();
    descriptors.retain(|descriptor| {
        let available = clients.contains_key(&descriptor.provider_tag);
        if !available {
            eprintln!(
                "Warning: model {} disabled ({} provider unavailable)",
                descriptor.id, descriptor.provider_tag
            );
        }
        available
    });
    let registry = Arc::new(ModelRegistry::new(descriptors, clients)?);

    let store: Arc<dyn ConversationStore> = if cli.ephemeral {
        Arc::new(MemoryConversationStore::new())
    } else {
        let store_path = cli
            .store
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.storage.path));
        Arc::new(JsonFileStore::open(&store_path).await?)
    };

    // Maintenance commands
    if cli.list_models {
        for descriptor in registry.list_all() {
            println!(
                "{:<45} {:<25} {:<12}{}",
                descriptor.id,
                descriptor.display_name,
                descriptor.provider_tag,
                if descriptor.is_chairman { " [chairman]" } else { "" }
            );
        }
        return Ok(());
    }
    if cli.list_conversations {
        for conversation in store.list().await? {
            println!(
                "{}  messages={} turns={} updated={}",
                conversation.id,
                conversation.messages.len(),
                conversation.turns.len(),
                conversation.updated_at
            );
        }
        return Ok(());
    }
    if let Some(id) = &cli.delete {
        store.delete(id).await?;
        eprintln!("deleted {}", id);
        return Ok(());
    }

    let Some(question) = cli.question else {
        bail!("no question provided (see --help)");
    };

    let council_config = config.to_council_config();
    council_config.validate()?;
    let use_case = RunCouncilUseCase::new(registry, store, council_config);

    let mut request = CouncilRequest::new(question);
    if let Some(id) = cli.conversation {
        request = request.with_conversation_id(id);
    }
    if !cli.model.is_empty() {
        request = request.with_selected_models(cli.model.clone());
    }

    let mut run = use_case.start(request).await?;
    // The conversation id is metadata, not an event: stderr, like an
    // HTTP layer would use a header.
    eprintln!("conversation: {}", run.conversation_id());

    // Ctrl+C cancels the turn; the stream just ends.
    let interrupt = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted. Cancelling council turn...");
            interrupt.cancel();
        }
    });

    let cancelled = run.cancellation_token();
    let mut stdout = std::io::stdout();
    let mut terminal_error: Option<String> = None;
    while let Some(event) = run.next_event().await {
        if let CouncilEvent::Error {
            content,
            model_id: None,
        } = &event
        {
            terminal_error = Some(content.clone());
        }
        let line = event.to_json_line()?;
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
    }

    if cancelled.is_cancelled() && terminal_error.is_none() {
        eprintln!("Cancelled.");
        return Ok(());
    }
    if let Some(reason) = terminal_error {
        bail!("council turn failed: {}", reason);
    }
    Ok(())
}
