//! The transcript state document.

use crate::actives::{ActiveRequests, ResponseRegistry};
use crate::command_line::CommandLineState;
use crate::config::TranscriptConfig;
use crate::history::HistoryLog;
use crate::snapshot::TranscriptSnapshot;
use serde::{Deserialize, Serialize};

/// Scalar session attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAttributes {
    pub font_size: Option<f64>,
    pub cwd: Option<String>,
    pub prompt_label: Option<String>,
    pub continue_label: Option<String>,
}

impl SessionAttributes {
    pub fn from_config(config: &TranscriptConfig) -> Self {
        Self {
            font_size: config.font_size,
            cwd: config.cwd.clone(),
            prompt_label: config.prompt_label.clone(),
            continue_label: config.continue_label.clone(),
        }
    }
}

/// Root value owned by the transcript engine.
///
/// Treated as immutable between transitions: every transition yields a new
/// value, and clones share the history log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptState {
    pub items: HistoryLog,
    pub actives: ActiveRequests,
    /// `None` when correlation is disabled for this viewer
    pub responses: Option<ResponseRegistry>,
    #[serde(flatten)]
    pub session: SessionAttributes,
    pub command_line: CommandLineState,
}

impl TranscriptState {
    pub fn new(config: &TranscriptConfig) -> Self {
        Self {
            items: HistoryLog::new(),
            actives: ActiveRequests::new(),
            responses: config.correlate_responses.then(ResponseRegistry::new),
            session: SessionAttributes::from_config(config),
            command_line: CommandLineState::new(),
        }
    }

    /// Rebuild a session from a saved snapshot.
    ///
    /// Nothing is in flight after a restore, so `actives` starts empty and
    /// `responses` starts as configured.
    pub fn restore(snapshot: TranscriptSnapshot, config: &TranscriptConfig) -> Self {
        let mut state = Self::new(config);
        state.items = HistoryLog::from_items(snapshot.items);
        if snapshot.font_size.is_some() {
            state.session.font_size = snapshot.font_size;
        }
        if snapshot.cwd.is_some() {
            state.session.cwd = snapshot.cwd;
        }
        state
    }

    /// Whether kernel messages for `request_id` concern this viewer
    pub fn is_tracked(&self, request_id: &str) -> bool {
        self.responses
            .as_ref()
            .is_some_and(|responses| responses.contains(request_id))
    }
}
