//! Embedded command-line state
//!
//! An independent reducer for the prompt line. It runs after the transcript
//! core on every event and sees the post-core state, so overlay changes made
//! by the core in the same cycle are already visible here.
//!
//! Note: `cursor` is a CHARACTER index, not a byte index, so multi-byte
//! input (e.g. CJK) edits correctly.

use crate::command::{Command, PromptEdit};
use crate::history::HistoryItem;
use crate::protocol::Event;
use crate::state::TranscriptState;
use serde::{Deserialize, Serialize};

/// Prompt line editor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineState {
    /// Current input buffer
    pub buffer: String,
    /// Cursor position in buffer (character index)
    pub cursor: usize,
    /// Previously submitted code
    pub history: Vec<String>,
    /// Current history index (-1 means current input)
    pub history_index: isize,
    /// Saved current input when browsing history
    pub saved_input: String,
    /// Candidates of the visible autocomplete overlay
    pub completions: Vec<String>,
}

impl Default for CommandLineState {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLineState {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: -1,
            saved_input: String::new(),
            completions: Vec::new(),
        }
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }

    fn insert_str(&mut self, text: &str) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.insert_str(byte_idx, text);
        self.cursor += text.chars().count();
    }

    fn remove_char_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.remove_char_at_cursor();
        }
    }

    fn remove_char_at_cursor(&mut self) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        if let Some(ch) = self.buffer[byte_idx..].chars().next() {
            self.buffer
                .replace_range(byte_idx..byte_idx + ch.len_utf8(), "");
        }
    }

    fn set_buffer(&mut self, content: &str) {
        self.buffer = content.to_string();
        self.cursor = self.char_count();
    }

    /// Character index where the word before the cursor starts
    fn word_start(&self) -> usize {
        let chars: Vec<char> = self.buffer.chars().take(self.cursor).collect();
        chars
            .iter()
            .rposition(|c| c.is_whitespace() || "()[]{},;=".contains(*c))
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    fn complete(&mut self, index: usize) {
        let Some(candidate) = self.completions.get(index).cloned() else {
            return;
        };
        let start = self.char_to_byte_index(self.word_start());
        let end = self.char_to_byte_index(self.cursor);
        self.buffer.replace_range(start..end, &candidate);
        self.cursor = self.buffer[..start].chars().count() + candidate.chars().count();
        self.completions.clear();
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }

        if self.history_index == -1 {
            self.saved_input = self.buffer.clone();
        }

        if self.history_index < self.history.len() as isize - 1 {
            self.history_index += 1;
            let idx = self.history.len() - 1 - self.history_index as usize;
            let entry = self.history[idx].clone();
            self.set_buffer(&entry);
        }
    }

    fn history_next(&mut self) {
        if self.history_index > 0 {
            self.history_index -= 1;
            let idx = self.history.len() - 1 - self.history_index as usize;
            let entry = self.history[idx].clone();
            self.set_buffer(&entry);
        } else if self.history_index == 0 {
            self.history_index = -1;
            let saved = std::mem::take(&mut self.saved_input);
            self.set_buffer(&saved);
        }
    }

    fn submit(&mut self, code: &str) {
        if !code.is_empty() && self.history.last().map(String::as_str) != Some(code) {
            self.history.push(code.to_string());
        }
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = -1;
        self.saved_input.clear();
    }

    fn apply_edit(&mut self, edit: &PromptEdit) {
        match edit {
            PromptEdit::Insert(text) => self.insert_str(text),
            PromptEdit::Backspace => self.remove_char_before_cursor(),
            PromptEdit::Delete => self.remove_char_at_cursor(),
            PromptEdit::CursorLeft => self.cursor = self.cursor.saturating_sub(1),
            PromptEdit::CursorRight => {
                if self.cursor < self.char_count() {
                    self.cursor += 1;
                }
            }
            PromptEdit::CursorHome => self.cursor = 0,
            PromptEdit::CursorEnd => self.cursor = self.char_count(),
            PromptEdit::HistoryPrev => self.history_prev(),
            PromptEdit::HistoryNext => self.history_next(),
            PromptEdit::Set(text) => self.set_buffer(text),
            PromptEdit::Clear => {
                self.buffer.clear();
                self.cursor = 0;
            }
            PromptEdit::Complete(index) => self.complete(*index),
        }
    }
}

/// Command-line transition, applied to the post-core transcript.
pub fn reduce(
    transcript: &TranscriptState,
    mut line: CommandLineState,
    event: &Event,
) -> CommandLineState {
    // Completion candidates live exactly as long as the overlay they came from
    if !transcript.items.has_overlay() {
        line.completions.clear();
    }

    let Event::Command(command) = event else {
        return line;
    };
    match command {
        Command::PromptCommand { payload } => {
            if let Some(edit) = &payload.edit {
                line.apply_edit(edit);
            }
        }
        Command::Execute { payload } => line.submit(&payload.code),
        Command::Autocomplete { .. } => {
            if let Some(HistoryItem::Autocomplete { matches }) = transcript.items.last() {
                line.completions = matches.clone();
            }
        }
        _ => {}
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ExecuteRequest, PromptCommand};
    use crate::config::TranscriptConfig;

    fn edit(edit: PromptEdit) -> Event {
        Event::Command(Command::PromptCommand {
            payload: PromptCommand {
                clear_autocomplete: false,
                edit: Some(edit),
            },
        })
    }

    fn run(events: &[Event]) -> CommandLineState {
        let transcript = TranscriptState::new(&TranscriptConfig::new());
        events.iter().fold(CommandLineState::new(), |line, event| {
            reduce(&transcript, line, event)
        })
    }

    #[test]
    fn test_insert_ascii() {
        let line = run(&[edit(PromptEdit::Insert("h".into())), edit(PromptEdit::Insert("i".into()))]);
        assert_eq!(line.buffer, "hi");
        assert_eq!(line.cursor, 2);
    }

    #[test]
    fn test_insert_unicode() {
        let line = run(&[edit(PromptEdit::Insert("\u{4f60}\u{597d}".into()))]);
        assert_eq!(line.buffer, "\u{4f60}\u{597d}");
        assert_eq!(line.cursor, 2);
        assert_eq!(line.char_count(), 2);
    }

    #[test]
    fn test_backspace_unicode() {
        let line = run(&[
            edit(PromptEdit::Insert("\u{4f60}\u{597d}".into())),
            edit(PromptEdit::Backspace),
        ]);
        assert_eq!(line.buffer, "\u{4f60}");
        assert_eq!(line.cursor, 1);
    }

    #[test]
    fn test_cursor_movement_and_delete() {
        let line = run(&[
            edit(PromptEdit::Insert("abc".into())),
            edit(PromptEdit::CursorHome),
            edit(PromptEdit::CursorRight),
            edit(PromptEdit::Delete),
            edit(PromptEdit::CursorLeft),
            edit(PromptEdit::CursorLeft),
        ]);
        assert_eq!(line.buffer, "ac");
        assert_eq!(line.cursor, 0);
    }

    #[test]
    fn test_execute_pushes_history() {
        let submit = |code: &str| {
            Event::Command(Command::Execute {
                payload: ExecuteRequest {
                    code: code.to_string(),
                    silent: false,
                },
            })
        };
        let line = run(&[
            edit(PromptEdit::Insert("x = 1".into())),
            submit("x = 1"),
            submit("y = 2"),
            edit(PromptEdit::Insert("draft".into())),
            edit(PromptEdit::HistoryPrev),
        ]);
        assert_eq!(line.history, vec!["x = 1".to_string(), "y = 2".to_string()]);
        assert_eq!(line.buffer, "y = 2");

        let line = run(&[
            submit("x = 1"),
            edit(PromptEdit::Insert("draft".into())),
            edit(PromptEdit::HistoryPrev),
            edit(PromptEdit::HistoryNext),
        ]);
        assert_eq!(line.buffer, "draft");
        assert_eq!(line.cursor, 5);
    }

    #[test]
    fn test_completions_follow_overlay() {
        let overlay = TranscriptState {
            items: crate::history::HistoryLog::new().append(HistoryItem::Autocomplete {
                matches: vec!["print".to_string()],
            }),
            ..TranscriptState::new(&TranscriptConfig::new())
        };
        let autocomplete = Event::Command(Command::Autocomplete {
            matches: vec!["print".to_string()],
        });

        let line = reduce(&overlay, CommandLineState::new(), &autocomplete);
        assert_eq!(line.completions, vec!["print".to_string()]);

        let line = reduce(&overlay, line, &edit(PromptEdit::CursorEnd));
        assert_eq!(line.completions, vec!["print".to_string()]);

        let cleared = TranscriptState::new(&TranscriptConfig::new());
        let line = reduce(&cleared, line, &Event::Command(Command::ClearAutocomplete));
        assert!(line.completions.is_empty());
    }

    #[test]
    fn test_complete_replaces_word() {
        let mut line = CommandLineState::new();
        line.set_buffer("x = pri");
        line.completions = vec!["print".to_string(), "prior".to_string()];
        line.apply_edit(&PromptEdit::Complete(0));
        assert_eq!(line.buffer, "x = print");
        assert_eq!(line.cursor, 9);
        assert!(line.completions.is_empty());
    }

    #[test]
    fn test_complete_out_of_range_is_noop() {
        let mut line = CommandLineState::new();
        line.set_buffer("pri");
        line.apply_edit(&PromptEdit::Complete(3));
        assert_eq!(line.buffer, "pri");
    }
}
