//! Direct commands issued by the surrounding UI rather than the kernel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Preference key recognized by `changePreference`
pub const FONT_SIZE: &str = "fontSize";

/// Local UI command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// New execution submitted by the user
    Execute {
        #[serde(default)]
        payload: ExecuteRequest,
    },
    /// Request id of a submitted execution, enables routing for it
    Executed { payload: String },
    ChangePreference {
        key: String,
        #[serde(default)]
        value: Value,
    },
    WorkingDirectoryChanged {
        #[serde(default)]
        cwd: Option<String>,
    },
    Interrupting,
    Interrupted {
        #[serde(default)]
        error: Option<Value>,
    },
    Restarting,
    Restarted {
        #[serde(default)]
        error: Option<Value>,
    },
    Clear,
    Autocomplete {
        #[serde(default)]
        matches: Vec<String>,
    },
    ClearAutocomplete,
    PromptCommand {
        #[serde(default)]
        payload: PromptCommand,
    },
}

impl Command {
    /// Failure reported by `interrupted`/`restarted`, if any.
    ///
    /// `null` and `false` mean success; strings are kept as the message;
    /// anything else is rendered as JSON.
    pub fn failure(&self) -> Option<String> {
        let error = match self {
            Command::Interrupted { error } | Command::Restarted { error } => error.as_ref()?,
            _ => return None,
        };
        match error {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some("unknown error".to_string()),
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Code submitted for execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub silent: bool,
}

/// Command forwarded from the prompt line editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCommand {
    /// The user started typing: drop any visible suggestions
    #[serde(default)]
    pub clear_autocomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<PromptEdit>,
}

/// Editing operations understood by the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum PromptEdit {
    Insert(String),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    HistoryPrev,
    HistoryNext,
    Set(String),
    Clear,
    /// Replace the word before the cursor with the n-th completion
    Complete(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(json!({ "type": "executed", "payload": "5" })),
            Command::Executed {
                payload: "5".to_string()
            }
        );
        assert_eq!(
            parse(json!({ "type": "workingDirectoryChanged" })),
            Command::WorkingDirectoryChanged { cwd: None }
        );
        assert_eq!(
            parse(json!({ "type": "autocomplete", "matches": ["abs", "all"] })),
            Command::Autocomplete {
                matches: vec!["abs".to_string(), "all".to_string()]
            }
        );
        assert_eq!(
            parse(json!({ "type": "execute", "payload": { "code": "1+1" } })),
            Command::Execute {
                payload: ExecuteRequest {
                    code: "1+1".to_string(),
                    silent: false
                }
            }
        );
    }

    #[test]
    fn test_parse_prompt_command() {
        let cmd = parse(json!({
            "type": "promptCommand",
            "payload": { "clearAutocomplete": true, "edit": { "op": "insert", "value": "x" } }
        }));
        assert_eq!(
            cmd,
            Command::PromptCommand {
                payload: PromptCommand {
                    clear_autocomplete: true,
                    edit: Some(PromptEdit::Insert("x".to_string())),
                }
            }
        );

        let cmd = parse(json!({ "type": "promptCommand", "payload": { "edit": { "op": "historyPrev" } } }));
        assert_eq!(
            cmd,
            Command::PromptCommand {
                payload: PromptCommand {
                    clear_autocomplete: false,
                    edit: Some(PromptEdit::HistoryPrev),
                }
            }
        );
    }

    #[test]
    fn test_failure_normalization() {
        assert_eq!(parse(json!({ "type": "interrupted" })).failure(), None);
        assert_eq!(parse(json!({ "type": "interrupted", "error": null })).failure(), None);
        assert_eq!(parse(json!({ "type": "restarted", "error": false })).failure(), None);
        assert_eq!(
            parse(json!({ "type": "restarted", "error": "kernel died" })).failure(),
            Some("kernel died".to_string())
        );
        assert!(parse(json!({ "type": "interrupted", "error": true })).failure().is_some());
        assert!(parse(json!({ "type": "interrupted", "error": { "code": 1 } }))
            .failure()
            .is_some());
        assert_eq!(Command::Clear.failure(), None);
    }
}
