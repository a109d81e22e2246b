//! Transcript reducer
//!
//! Every event is either a kernel message envelope, routed by its message
//! type, or a direct command. Each handler takes the previous state by value
//! and returns the next one; nothing shared with an earlier snapshot is
//! mutated in place.

use crate::actives::ErrorRecord;
use crate::command::{Command, ExecuteRequest, PromptCommand, FONT_SIZE};
use crate::command_line;
use crate::execution::{ExecutionLifecycle, Passthrough};
use crate::history::HistoryItem;
use crate::markup::{HtmlMarkup, MarkupRenderer};
use crate::protocol::{execution_states, plain_text, Event, KernelMessage, MessageEnvelope};
use crate::state::TranscriptState;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

/// Source tag used for echoed input when the message names none
pub const STDIN: &str = "stdin";

pub const INTERRUPT_FAILED: &str = "Unable to interrupt terminal";
pub const RESTARTING: &str = "restarting terminal...";
pub const RESTART_FAILED: &str = "Unable to restart terminal";
pub const RESTART_DONE: &str = "done";

/// The transcript engine: the reducer plus its external collaborators.
pub struct Transcript {
    markup: Box<dyn MarkupRenderer>,
    lifecycle: Box<dyn ExecutionLifecycle>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            markup: Box::new(HtmlMarkup),
            lifecycle: Box::new(Passthrough),
        }
    }

    pub fn with_markup(mut self, markup: impl MarkupRenderer + 'static) -> Self {
        self.markup = Box::new(markup);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: impl ExecutionLifecycle + 'static) -> Self {
        self.lifecycle = Box::new(lifecycle);
        self
    }

    /// Full transition: the core first, then the command line on the result.
    pub fn apply(&self, state: &TranscriptState, event: &Event) -> TranscriptState {
        let mut next = self.reduce_core(state.clone(), event);
        let line = std::mem::take(&mut next.command_line);
        next.command_line = command_line::reduce(&next, line, event);
        next
    }

    /// Apply a batch of events in delivery order.
    pub fn apply_all<'a, I>(&self, state: &TranscriptState, events: I) -> TranscriptState
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events
            .into_iter()
            .fold(state.clone(), |state, event| self.apply(&state, event))
    }

    /// Core transition only, without the command line.
    pub fn reduce_core(&self, state: TranscriptState, event: &Event) -> TranscriptState {
        match event {
            Event::Message(envelope) => self.route_message(state, envelope),
            Event::Command(command) => self.handle_command(state, command),
        }
    }

    // ── Message router ─────────────────────────────────────────

    fn route_message(&self, state: TranscriptState, envelope: &MessageEnvelope) -> TranscriptState {
        let Some(request_id) = envelope.request_id() else {
            trace!("Ignoring {} without parent request", envelope.msg_type);
            return state;
        };
        if !state.is_tracked(request_id) {
            trace!("Ignoring {} for foreign request {}", envelope.msg_type, request_id);
            return state;
        }

        match envelope.kind() {
            KernelMessage::DisplayData { data } => self.on_display_data(state, data),
            KernelMessage::Error {
                ename,
                evalue,
                traceback,
            } => self.on_error(state, request_id, ename, evalue, traceback),
            KernelMessage::ExecuteInput { code, name } => self.on_execute_input(state, &code, name),
            KernelMessage::ExecuteResult { data } => self.on_execute_result(state, data),
            // Acknowledgement only
            KernelMessage::ExecuteReply => state,
            KernelMessage::Status { execution_state } => {
                self.on_status(state, request_id, execution_state.as_deref())
            }
            KernelMessage::Stream { name, text } => self.on_stream(state, name, &text),
            KernelMessage::Unknown(msg_type) => {
                debug!("Ignoring unknown message type {}", msg_type);
                state
            }
        }
    }

    fn on_display_data(&self, mut state: TranscriptState, data: Option<Value>) -> TranscriptState {
        if let Some(data) = data {
            state.items = state.items.append(HistoryItem::Annotation { data });
        }
        state
    }

    /// `traceback` must be non-empty.
    fn on_error(
        &self,
        mut state: TranscriptState,
        request_id: &str,
        name: String,
        value: String,
        traceback: Vec<String>,
    ) -> TranscriptState {
        let mut converter = self.markup.traceback_converter();
        let stacktrace = traceback
            .iter()
            .map(|line| converter.convert_line(line))
            .collect();

        state.actives = state.actives.record_error(
            request_id,
            ErrorRecord(name.clone(), value.clone(), traceback.clone()),
        );
        state.items = state.items.append(HistoryItem::PythonError {
            name,
            value,
            traceback,
            stacktrace,
        });
        state
    }

    fn on_execute_input(
        &self,
        mut state: TranscriptState,
        code: &str,
        name: Option<String>,
    ) -> TranscriptState {
        let source = prefix_prompt(
            code,
            state.session.prompt_label.as_deref(),
            state.session.continue_label.as_deref(),
        );
        let html = self.markup.render_text(&source);
        let origin = name.unwrap_or_else(|| STDIN.to_string());
        state.items = state.items.append(HistoryItem::text(origin, html));
        state
    }

    fn on_execute_result(&self, mut state: TranscriptState, data: Option<Value>) -> TranscriptState {
        let Some(data) = data else {
            return state;
        };
        let item = match plain_text(&data) {
            Some(text) => HistoryItem::stdout(self.markup.render_text(text)),
            None => HistoryItem::Annotation { data },
        };
        state.items = state.items.append(item);
        state
    }

    fn on_status(
        &self,
        mut state: TranscriptState,
        request_id: &str,
        execution_state: Option<&str>,
    ) -> TranscriptState {
        state.actives = if execution_state == Some(execution_states::BUSY) {
            state.actives.begin(request_id)
        } else {
            state.actives.finish(request_id)
        };
        state.items = state.items.append(HistoryItem::PageBreak);
        state
    }

    fn on_stream(&self, mut state: TranscriptState, name: String, text: &str) -> TranscriptState {
        let html = self.markup.render_text(text);
        state.items = state.items.append(HistoryItem::text(name, html));
        state
    }

    // ── Direct commands ────────────────────────────────────────

    fn handle_command(&self, mut state: TranscriptState, command: &Command) -> TranscriptState {
        match command {
            Command::Execute { payload } => self.on_execute(state, payload),
            Command::Executed { payload } => {
                if let Some(responses) = state.responses.take() {
                    state.responses = Some(responses.register(payload));
                }
                state
            }
            Command::ChangePreference { key, value } => change_preference(state, key, value),
            Command::WorkingDirectoryChanged { cwd } => {
                if let Some(cwd) = cwd {
                    state.session.cwd = Some(cwd.clone());
                }
                state
            }
            Command::Interrupting => state,
            Command::Interrupted { .. } => {
                if let Some(reason) = command.failure() {
                    error!("Failed to interrupt kernel: {}", reason);
                    state.items = state.items.append(HistoryItem::stderr(INTERRUPT_FAILED));
                }
                state
            }
            Command::Restarting => {
                state.items = state.items.append(HistoryItem::stdout(RESTARTING));
                state
            }
            Command::Restarted { .. } => {
                let item = match command.failure() {
                    Some(reason) => {
                        error!("Failed to restart kernel: {}", reason);
                        HistoryItem::stderr(RESTART_FAILED)
                    }
                    None => HistoryItem::stdout(RESTART_DONE),
                };
                state.items = state.items.append(item);
                state
            }
            Command::Clear => {
                state.items = Default::default();
                state
            }
            Command::Autocomplete { matches } => {
                state.items = state.items.replace_overlay(matches.clone());
                state
            }
            Command::ClearAutocomplete => clear_autocomplete(state),
            Command::PromptCommand { payload } => on_prompt_command(state, payload),
        }
    }

    fn on_execute(&self, state: TranscriptState, request: &ExecuteRequest) -> TranscriptState {
        self.lifecycle.submitted(state, request)
    }
}

fn clear_autocomplete(mut state: TranscriptState) -> TranscriptState {
    state.items = state.items.without_overlay();
    state
}

fn on_prompt_command(state: TranscriptState, payload: &PromptCommand) -> TranscriptState {
    if payload.clear_autocomplete {
        clear_autocomplete(state)
    } else {
        state
    }
}

fn change_preference(mut state: TranscriptState, key: &str, value: &Value) -> TranscriptState {
    match key {
        FONT_SIZE => match coerce_number(value) {
            Some(size) => state.session.font_size = Some(size),
            None => warn!("Ignoring non-numeric font size {}", value),
        },
        other => debug!("Ignoring unknown preference {}", other),
    }
    state
}

/// Numbers pass through; numeric strings are parsed.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Prefix each line of `code` with the prompt decoration.
///
/// The first line gets `prompt`; following lines get `continuation`, or
/// `prompt` again when no continuation label is set. Without a prompt the
/// code is returned as is.
pub fn prefix_prompt(code: &str, prompt: Option<&str>, continuation: Option<&str>) -> String {
    let Some(prompt) = prompt else {
        return code.to_string();
    };
    let continuation = continuation.unwrap_or(prompt);
    code.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let label = if i == 0 { prompt } else { continuation };
            format!("{}{}", label, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
