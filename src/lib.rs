//! Kernel Transcript
//!
//! A deterministic state engine for the transcript of an interactive
//! code-execution session. It consumes kernel protocol messages and local
//! UI commands and derives:
//! - an ordered history of display items
//! - the set of in-flight execution requests
//! - session attributes (font size, working directory, prompt labels)

pub mod actives;
pub mod command;
pub mod command_line;
pub mod config;
pub mod execution;
pub mod history;
pub mod markup;
pub mod protocol;
pub mod reducer;
pub mod snapshot;
pub mod state;

pub use command::{Command, ExecuteRequest, PromptCommand, PromptEdit};
pub use config::TranscriptConfig;
pub use history::{HistoryItem, HistoryLog};
pub use protocol::{Event, KernelMessage, MessageEnvelope};
pub use reducer::Transcript;
pub use state::TranscriptState;

/// Result type for transcript operations
pub type Result<T> = std::result::Result<T, TranscriptError>;

/// Errors raised at the edges of the engine (parsing, config, persistence).
///
/// State transitions themselves never fail.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Invalid event on line {line}: {reason}")]
    InvalidEvent { line: usize, reason: String },

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
