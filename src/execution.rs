//! Execution-lifecycle helper invoked when the user submits code.

use crate::command::ExecuteRequest;
use crate::state::TranscriptState;
use tracing::debug;

/// Derives state for "a new execution was submitted".
///
/// The host decides what that means (echo the input, mark the prompt
/// busy, ...); the reducer only calls it.
pub trait ExecutionLifecycle: Send + Sync {
    fn submitted(&self, state: TranscriptState, request: &ExecuteRequest) -> TranscriptState;
}

/// Leaves the transcript untouched; the kernel echoes input via `execute_input`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ExecutionLifecycle for Passthrough {
    fn submitted(&self, state: TranscriptState, request: &ExecuteRequest) -> TranscriptState {
        debug!(
            "Execution submitted ({} bytes, silent={})",
            request.code.len(),
            request.silent
        );
        state
    }
}

impl<F> ExecutionLifecycle for F
where
    F: Fn(TranscriptState, &ExecuteRequest) -> TranscriptState + Send + Sync,
{
    fn submitted(&self, state: TranscriptState, request: &ExecuteRequest) -> TranscriptState {
        self(state, request)
    }
}
