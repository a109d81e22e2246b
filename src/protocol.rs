//! Protocol definitions for kernel messages
//!
//! This is the subset of the kernel messaging protocol the transcript reacts to.

use crate::command::Command;
use crate::{Result, TranscriptError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kernel message types
pub mod msg_types {
    pub const DISPLAY_DATA: &str = "display_data";
    pub const ERROR: &str = "error";
    pub const EXECUTE_INPUT: &str = "execute_input";
    pub const EXECUTE_RESULT: &str = "execute_result";
    pub const EXECUTE_REPLY: &str = "execute_reply";
    pub const STATUS: &str = "status";
    pub const STREAM: &str = "stream";
}

/// Execution states reported by `status` messages
pub mod execution_states {
    pub const BUSY: &str = "busy";
    pub const IDLE: &str = "idle";
}

/// MIME type preferred when rendering execution results
pub const TEXT_PLAIN: &str = "text/plain";

/// Header of the request a message replies to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
}

/// Outer wrapper around a kernel message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub msg_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parent_header: ParentHeader,
    #[serde(default)]
    pub content: Value,
}

/// Kernels send `null` for headers they do not fill in
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A kernel message lifted out of its envelope, one variant per known type.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelMessage {
    DisplayData {
        data: Option<Value>,
    },
    /// `traceback` must be non-empty; producers are responsible for it.
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    ExecuteInput {
        code: String,
        name: Option<String>,
    },
    ExecuteResult {
        data: Option<Value>,
    },
    ExecuteReply,
    Status {
        execution_state: Option<String>,
    },
    Stream {
        name: String,
        text: String,
    },
    Unknown(String),
}

impl MessageEnvelope {
    pub fn new(msg_type: impl Into<String>, request_id: impl Into<String>, content: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            parent_header: ParentHeader {
                msg_id: Some(request_id.into()),
            },
            content,
        }
    }

    /// Id of the request this message replies to
    pub fn request_id(&self) -> Option<&str> {
        self.parent_header.msg_id.as_deref()
    }

    /// Decode the content according to `msg_type`.
    pub fn kind(&self) -> KernelMessage {
        let content = &self.content;
        match self.msg_type.as_str() {
            msg_types::DISPLAY_DATA => KernelMessage::DisplayData {
                data: content_value(content, "data"),
            },
            msg_types::ERROR => KernelMessage::Error {
                ename: content_str(content, "ename").unwrap_or_default(),
                evalue: content_str(content, "evalue").unwrap_or_default(),
                traceback: content_lines(content, "traceback"),
            },
            msg_types::EXECUTE_INPUT => KernelMessage::ExecuteInput {
                code: content_str(content, "code").unwrap_or_default(),
                name: content_str(content, "name"),
            },
            msg_types::EXECUTE_RESULT => KernelMessage::ExecuteResult {
                data: content_value(content, "data"),
            },
            msg_types::EXECUTE_REPLY => KernelMessage::ExecuteReply,
            msg_types::STATUS => KernelMessage::Status {
                execution_state: content_str(content, "execution_state"),
            },
            msg_types::STREAM => KernelMessage::Stream {
                name: content_str(content, "name").unwrap_or_default(),
                text: content_str(content, "text").unwrap_or_default(),
            },
            other => KernelMessage::Unknown(other.to_string()),
        }
    }
}

fn content_str(content: &Value, key: &str) -> Option<String> {
    content.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn content_value(content: &Value, key: &str) -> Option<Value> {
    content.get(key).filter(|v| !v.is_null()).cloned()
}

fn content_lines(content: &Value, key: &str) -> Vec<String> {
    content
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|line| line.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract the `text/plain` representation from a MIME bundle
pub fn plain_text(data: &Value) -> Option<&str> {
    data.get(TEXT_PLAIN).and_then(|v| v.as_str())
}

/// Anything the transcript can be driven by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Message(MessageEnvelope),
    Command(Command),
}

impl Event {
    /// Parse one JSON line. Lines with `msg_type` are kernel messages,
    /// everything else must be a command tagged by `type`.
    pub fn from_json_line(line_no: usize, line: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(line).map_err(|e| TranscriptError::InvalidEvent {
            line: line_no,
            reason: e.to_string(),
        })?;
        Self::from_json(line_no, json)
    }

    pub fn from_json(line_no: usize, json: Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| TranscriptError::InvalidEvent {
            line: line_no,
            reason: e.to_string(),
        };
        if json.get("msg_type").is_some() {
            serde_json::from_value(json).map(Event::Message).map_err(invalid)
        } else {
            serde_json::from_value(json).map(Event::Command).map_err(invalid)
        }
    }
}

/// Build a MIME bundle holding only plain text
pub fn plain_bundle(text: &str) -> Value {
    let mut bundle = Map::new();
    bundle.insert(TEXT_PLAIN.to_string(), Value::String(text.to_string()));
    Value::Object(bundle)
}
