//! Kernel Transcript CLI
//!
//! Replays a JSON-lines stream of kernel messages and UI commands through the
//! transcript engine and prints the resulting transcript.

use clap::{Parser, ValueEnum};
use kernel_transcript::config::{transcript_home, TranscriptConfig};
use kernel_transcript::snapshot::SnapshotStore;
use kernel_transcript::{Event, HistoryItem, Transcript, TranscriptState};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How many saved sessions to keep around
const KEEP_SESSIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Kernel Transcript - derive a session transcript from kernel messages
#[derive(Parser, Debug)]
#[command(name = "kernel-transcript")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (defaults to <home>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines event file (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output format for the final transcript
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Start from a saved session snapshot
    #[arg(long)]
    resume: Option<String>,

    /// Save the final transcript under this session id
    #[arg(long)]
    save: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let home = transcript_home()?;
    let config_path = cli.config.clone().unwrap_or_else(|| home.join("config.toml"));
    let config = TranscriptConfig::load(&config_path)?;
    debug!("Config: {:?}", config);

    let needs_store = cli.resume.is_some() || cli.save.is_some();
    let store = if needs_store {
        Some(SnapshotStore::new(&home).await?)
    } else {
        None
    };

    let mut state = TranscriptState::new(&config);
    if let (Some(store), Some(session_id)) = (&store, &cli.resume) {
        match store.load(session_id).await? {
            Some(snapshot) => {
                info!("Resuming session {} ({} items)", session_id, snapshot.items.len());
                state = TranscriptState::restore(snapshot, &config);
            }
            None => warn!("No saved session {}, starting fresh", session_id),
        }
    }

    let transcript = Transcript::new();
    state = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            replay(&transcript, state, BufReader::new(file)).await?
        }
        None => replay(&transcript, state, BufReader::new(tokio::io::stdin())).await?,
    };

    if let (Some(store), Some(session_id)) = (&store, &cli.save) {
        save_session(store, session_id, &state).await?;
        info!("Saved session {}", session_id);
    }

    let mut stdout = io::stdout().lock();
    match cli.format {
        OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string_pretty(&state)?)?,
        OutputFormat::Text => {
            for item in &state.items {
                writeln!(stdout, "{}", describe(item))?;
            }
        }
    }
    stdout.flush()?;

    Ok(())
}

/// Apply every event line in order. Bad lines are logged and skipped.
async fn replay<R>(
    transcript: &Transcript,
    mut state: TranscriptState,
    reader: R,
) -> anyhow::Result<TranscriptState>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0;
    let mut applied = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match Event::from_json_line(line_no, &line) {
            Ok(event) => {
                state = transcript.apply(&state, &event);
                applied += 1;
            }
            Err(e) => warn!("{}", e),
        }
    }
    info!("Applied {} of {} events", applied, line_no);
    Ok(state)
}

/// One-line plain text rendering of a history item
fn describe(item: &HistoryItem) -> String {
    match item {
        HistoryItem::Text { source, html } => format!("[{}] {}", source, html),
        HistoryItem::Annotation { data } => format!("[annotation] {}", data),
        HistoryItem::PythonError { name, value, .. } => format!("[error] {}: {}", name, value),
        HistoryItem::PageBreak => "----".to_string(),
        HistoryItem::Autocomplete { matches } => format!("[autocomplete] {}", matches.join(" ")),
    }
}

/// Save a session, then prune old ones. A failed prune leaves the save in place.
async fn save_session(store: &SnapshotStore, session_id: &str, state: &TranscriptState) -> anyhow::Result<()> {
    store.save(session_id, state).await?;
    if let Err(e) = store.cleanup(KEEP_SESSIONS).await {
        warn!("Failed to clean up old sessions: {}", e);
    }
    Ok(())
}
