// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing for GitHub Copilot chat session logs.
//!
//! This module deserializes the session log format VS Code writes for
//! Copilot chat: a list of requests, each pairing one user message with
//! the assistant's full response stream. The response stream is a loose,
//! `kind`-tagged sequence of records; this module resolves every record
//! into the closed [`ResponseEvent`] type exactly once, so the rest of
//! the crate never inspects raw JSON.
//!
//! # Format Overview
//!
//! A session log contains:
//! - A `requests` array of user/assistant exchanges
//! - Each exchange carries a `requestId`, the user `message`, and a
//!   `response` array of events (text fragments, reasoning traces, tool
//!   invocations, file edits, inline references, UI markers)
//!
//! Missing or oddly-shaped fields degrade to defaults; only malformed
//! JSON is an error.
//!
//! # Example
//!
//! ```
//! use chat2md::parser::parse_chat;
//!
//! let json = r#"{
//!     "requests": [{
//!         "requestId": "request_d3adb33f",
//!         "message": { "text": "Hello" },
//!         "response": [{ "value": "Hi there!" }]
//!     }]
//! }"#;
//!
//! let chat = parse_chat(json).unwrap();
//! assert_eq!(chat.requests.len(), 1);
//! assert_eq!(chat.requests[0].request_id, "request_d3adb33f");
//! ```

use serde::Deserialize;
use snafu::prelude::*;

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// The root structure of a chat session log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatLog {
    /// The sequence of user/assistant exchanges, in conversation order.
    #[serde(default)]
    pub requests: Vec<Request>,
}

/// A single user/assistant exchange in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Opaque identifier for this request. The first request's id doubles
    /// as the session marker used to detect log replacement.
    pub request_id: String,

    /// The user's message that initiated this exchange.
    pub message: Message,

    /// The assistant's response stream, in emission order.
    pub response: Vec<ResponseEvent>,
}

/// A user message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Message {
    /// The text content of the user's message.
    #[serde(default)]
    pub text: String,
}

/// One event in an assistant's response stream.
///
/// The wire format discriminates events with an optional `kind` string;
/// records without a `kind` are plain text fragments. Every recognized
/// kind gets its own variant, UI-only marker kinds collapse into
/// [`ResponseEvent::Ignored`], and anything else lands in
/// [`ResponseEvent::Unknown`] so unrecognized content with a payload is
/// never silently lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// A plain text fragment (no `kind`, or `kind: "text"`).
    Text {
        /// The raw fragment text. May be empty.
        value: String,
    },

    /// An inline reference to a file or symbol, part of running prose.
    InlineReference {
        /// Display name attached to the reference record itself.
        name: Option<String>,
        /// The resolved reference target.
        target: InlineTarget,
    },

    /// A reasoning trace emitted while the assistant worked.
    Thinking(Thinking),

    /// Announcement that a tool is about to run; names the tool.
    PrepareToolInvocation {
        /// The tool's display name, when provided.
        tool_name: Option<String>,
    },

    /// A completed tool invocation with its recorded details.
    ToolInvocation(ToolInvocation),

    /// Associates the following edit body with a file path.
    CodeblockUri {
        /// The file path, when provided.
        path: Option<String>,
    },

    /// A group of text edits applied to the previously associated file.
    TextEditGroup {
        /// The individual edit texts, in application order.
        edits: Vec<String>,
    },

    /// A UI-only marker kind (progress, confirmation, elicitation, and
    /// similar signals) with no transcript content.
    Ignored,

    /// An unrecognized kind.
    Unknown {
        /// The record's `value` field, when it is a string.
        value: Option<String>,
    },
}

/// The target of an inline reference, resolved at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineTarget {
    /// A workspace symbol (function, type, ...), optionally with a source
    /// location.
    Symbol {
        /// The symbol's own name, when present on the nested record.
        name: Option<String>,
        /// Source file path from the symbol's location.
        path: Option<String>,
        /// 1-based line number from the symbol's location.
        line: Option<u64>,
    },

    /// A plain file reference.
    File {
        /// The referenced file path, when present.
        path: Option<String>,
    },

    /// The nested reference was not a structured object.
    Opaque,
}

/// A reasoning trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thinking {
    /// The reasoning text. May be empty.
    pub value: String,
    /// A short title generated for this trace, when present.
    pub title: Option<String>,
}

/// Recorded details of a completed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// The tool's display name, when recorded on the invocation itself.
    pub tool_name: Option<String>,
    /// The human-readable invocation message (plain string on the wire,
    /// or an object whose `value` holds the string).
    pub invocation_message: Option<String>,
    /// Tool-specific payload, for the payload kinds that carry transcript
    /// content.
    pub payload: Option<ToolPayload>,
}

/// Tool-specific payload attached to an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPayload {
    /// A terminal command execution.
    Terminal {
        /// The command line as originally issued.
        command: Option<String>,
        /// Captured command output, possibly containing ANSI escapes.
        output: Option<String>,
        /// Execution timestamp in milliseconds since the Unix epoch.
        timestamp: Option<i64>,
    },

    /// A todo-list state update.
    TodoList {
        /// The todo items after the update.
        items: Vec<TodoItem>,
    },
}

/// One entry of a todo-list payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItem {
    /// The item's status label (e.g. "completed", "in-progress").
    pub status: String,
    /// The item's title.
    pub title: String,
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let request_id = get_string(&value, &["requestId"]).unwrap_or_default();

        let message = value
            .get("message")
            .and_then(|m| serde_json::from_value(m.clone()).ok())
            .unwrap_or_default();

        let response = value
            .get("response")
            .and_then(|r| serde_json::from_value(r.clone()).ok())
            .unwrap_or_default();

        Ok(Self {
            request_id,
            message,
            response,
        })
    }
}

impl<'de> Deserialize<'de> for ResponseEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(kind_value) = value.get("kind") else {
            // No "kind" field: a bare text fragment, or an unrecognized
            // record with no usable payload.
            return Ok(match get_str(&value, &["value"]) {
                Some(text) => Self::Text {
                    value: text.to_owned(),
                },
                None => Self::Unknown { value: None },
            });
        };

        let Some(kind) = kind_value.as_str() else {
            return Ok(Self::Unknown {
                value: get_string(&value, &["value"]),
            });
        };

        Ok(match kind {
            "text" => Self::Text {
                value: get_string(&value, &["value"]).unwrap_or_default(),
            },
            "inlineReference" => Self::InlineReference {
                name: get_string(&value, &["name"]),
                target: extract_inline_target(&value),
            },
            "thinking" => Self::Thinking(Thinking {
                value: get_string(&value, &["value"]).unwrap_or_default(),
                title: get_string(&value, &["generatedTitle"]),
            }),
            "prepareToolInvocation" => Self::PrepareToolInvocation {
                tool_name: get_string(&value, &["toolName"]),
            },
            "toolInvocationSerialized" => Self::ToolInvocation(extract_tool_invocation(&value)),
            "codeblockUri" => Self::CodeblockUri {
                path: get_string(&value, &["uri", "path"]),
            },
            "textEditGroup" => Self::TextEditGroup {
                edits: extract_edits(&value),
            },
            "mcpServersStarting" | "undoStop" | "progressTaskSerialized"
            | "elicitationSerialized" | "confirmation" | "agent" => Self::Ignored,
            _ => Self::Unknown {
                value: get_string(&value, &["value"]),
            },
        })
    }
}

/// Resolves the nested `inlineReference` object into an [`InlineTarget`].
fn extract_inline_target(value: &serde_json::Value) -> InlineTarget {
    let Some(inner) = value.get("inlineReference") else {
        return InlineTarget::File { path: None };
    };

    if !inner.is_object() {
        return InlineTarget::Opaque;
    }

    if inner.get("kind").is_some() {
        // Symbol reference. The location may be absent or an empty stub,
        // in which case both path and line come back as None.
        InlineTarget::Symbol {
            name: get_string(inner, &["name"]),
            path: get_string(inner, &["location", "uri", "path"]),
            line: get_u64(inner, &["location", "range", "startLineNumber"])
                .filter(|&line| line != 0),
        }
    } else {
        InlineTarget::File {
            path: get_string(inner, &["path"]),
        }
    }
}

/// Extracts the fields of a `toolInvocationSerialized` record.
fn extract_tool_invocation(value: &serde_json::Value) -> ToolInvocation {
    let invocation_message = match value.get("invocationMessage") {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(other) => get_string(other, &["value"]),
        None => None,
    };

    ToolInvocation {
        tool_name: get_string(value, &["toolName"]),
        invocation_message,
        payload: value.get("toolSpecificData").and_then(extract_tool_payload),
    }
}

/// Extracts a recognized `toolSpecificData` payload, if any.
fn extract_tool_payload(data: &serde_json::Value) -> Option<ToolPayload> {
    match get_str(data, &["kind"])? {
        "terminal" => Some(ToolPayload::Terminal {
            command: get_string(data, &["commandLine", "original"]),
            output: get_string(data, &["terminalCommandOutput", "text"]),
            timestamp: data
                .get("terminalCommandState")
                .and_then(|state| state.get("timestamp"))
                .and_then(serde_json::Value::as_i64),
        }),
        "todoList" => Some(ToolPayload::TodoList {
            items: extract_todo_items(data),
        }),
        _ => None,
    }
}

/// Extracts the entries of a todo-list payload.
fn extract_todo_items(data: &serde_json::Value) -> Vec<TodoItem> {
    data.get("todoList")
        .and_then(|t| t.as_array())
        .into_iter()
        .flatten()
        .map(|todo| TodoItem {
            status: get_string(todo, &["status"]).unwrap_or_else(|| "unknown".to_owned()),
            title: get_string(todo, &["title"]).unwrap_or_default(),
        })
        .collect()
}

/// Navigates a JSON path and returns the string value at the end.
///
/// # Arguments
///
/// * `value` - The root JSON value to navigate from
/// * `path` - A sequence of keys to follow through the JSON structure
fn get_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

/// Like [`get_str`] but for unsigned integer leaves.
fn get_u64(value: &serde_json::Value, path: &[&str]) -> Option<u64> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_u64()
}

/// Extracts edit texts from the nested edits array structure.
///
/// The JSON format nests edits as: `edits: [[{text: "..."}], [{text: "..."}]]`
fn extract_edits(value: &serde_json::Value) -> Vec<String> {
    value
        .get("edits")
        .and_then(|e| e.as_array())
        .into_iter()
        .flatten()
        .filter_map(|group| group.as_array())
        .flatten()
        .filter_map(|edit| edit.get("text")?.as_str())
        .map(str::to_owned)
        .collect()
}

/// Parses a JSON string into a [`ChatLog`] structure.
///
/// This is the main entry point for parsing chat session logs.
///
/// # Arguments
///
/// * `json_str` - The raw JSON content of a session log file
///
/// # Errors
///
/// Returns an error if the JSON is malformed. Structural surprises inside
/// a well-formed document (missing fields, unexpected types) degrade to
/// defaults instead of failing.
///
/// # Example
///
/// ```
/// use chat2md::parser::parse_chat;
///
/// let chat = parse_chat(r#"{ "requests": [] }"#).unwrap();
/// assert!(chat.requests.is_empty());
/// ```
pub fn parse_chat(json_str: &str) -> Result<ChatLog, ParseError> {
    serde_json::from_str(json_str).context(JsonSnafu)
}
