// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Classification of raw response events into typed segments.
//!
//! The response stream interleaves prose fragments, inline references,
//! reasoning traces, tool invocations, and edit records. [`classify`]
//! walks one turn's events in a single pass, merging consecutive prose
//! (plain text and inline references) into one [`Segment::Text`] and
//! passing everything structural through in order. The renderer then only
//! has to deal with a short, typed segment list.
//!
//! # Example
//!
//! ```
//! use chat2md::classify::{classify, Segment};
//! use chat2md::parser::parse_chat;
//! use chat2md::paths::PathResolver;
//!
//! let chat = parse_chat(r#"{
//!     "requests": [{
//!         "requestId": "request_1",
//!         "message": { "text": "Hi" },
//!         "response": [
//!             { "value": "Two " },
//!             { "value": "fragments." }
//!         ]
//!     }]
//! }"#).unwrap();
//!
//! let resolver = PathResolver::without_root();
//! let segments = classify(&chat.requests[0].response, &resolver);
//! assert_eq!(segments, vec![Segment::Text("Two fragments.".to_owned())]);
//! ```

use std::path::Path;

use crate::parser::{InlineTarget, ResponseEvent, Thinking, ToolInvocation};
use crate::paths::PathResolver;

/// A classified unit of an assistant response.
///
/// Structural segments borrow their payloads from the source events; only
/// merged prose is owned, since it is assembled from several events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Merged prose: consecutive text fragments and formatted inline
    /// references. Never directly adjacent to another `Text` segment.
    Text(String),

    /// A reasoning trace, buffered by the renderer.
    Thinking(&'a Thinking),

    /// Announcement of an upcoming tool run.
    PrepareTool {
        /// The announced tool name, when present.
        tool_name: Option<&'a str>,
    },

    /// A completed tool invocation.
    ToolInvocation(&'a ToolInvocation),

    /// File-path context for a following edit body.
    CodeblockUri {
        /// The raw (not yet relativized) path, when present.
        path: Option<&'a str>,
    },

    /// An edit body applied to the most recent codeblock-uri path.
    TextEditGroup {
        /// The edit texts, in application order.
        edits: &'a [String],
    },
}

/// Classifies one turn's response events into ordered segments.
///
/// Scanning rules, in event order:
/// - plain text is buffered, unless it trims to nothing or to a lone
///   code-fence marker;
/// - inline references are formatted (see [`format_inline_reference`])
///   and buffered as prose;
/// - structural events (thinking, tool prepare/invocation, codeblock-uri,
///   edit group) flush the buffer as one `Text` segment, then pass
///   through;
/// - UI marker events are consumed silently, without flushing;
/// - unknown events contribute their string value to the buffer when they
///   have one, so unrecognized content is never dropped.
///
/// The buffer is flushed once more at end of stream.
#[must_use]
pub fn classify<'a>(events: &'a [ResponseEvent], resolver: &PathResolver) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut pending = String::new();

    for event in events {
        match event {
            ResponseEvent::Text { value } => {
                let trimmed = value.trim();
                if !trimmed.is_empty() && trimmed != "```" {
                    pending.push_str(value);
                }
            }
            ResponseEvent::InlineReference { name, target } => {
                pending.push_str(&format_inline_reference(name.as_deref(), target, resolver));
            }
            ResponseEvent::Thinking(thinking) => {
                flush_pending(&mut segments, &mut pending);
                segments.push(Segment::Thinking(thinking));
            }
            ResponseEvent::PrepareToolInvocation { tool_name } => {
                flush_pending(&mut segments, &mut pending);
                segments.push(Segment::PrepareTool {
                    tool_name: tool_name.as_deref(),
                });
            }
            ResponseEvent::ToolInvocation(call) => {
                flush_pending(&mut segments, &mut pending);
                segments.push(Segment::ToolInvocation(call));
            }
            ResponseEvent::CodeblockUri { path } => {
                flush_pending(&mut segments, &mut pending);
                segments.push(Segment::CodeblockUri {
                    path: path.as_deref(),
                });
            }
            ResponseEvent::TextEditGroup { edits } => {
                flush_pending(&mut segments, &mut pending);
                segments.push(Segment::TextEditGroup { edits });
            }
            ResponseEvent::Ignored => {}
            ResponseEvent::Unknown { value } => {
                if let Some(value) = value
                    && !value.is_empty()
                {
                    pending.push_str(value);
                }
            }
        }
    }

    flush_pending(&mut segments, &mut pending);
    segments
}

fn flush_pending(segments: &mut Vec<Segment<'_>>, pending: &mut String) {
    if !pending.is_empty() {
        segments.push(Segment::Text(std::mem::take(pending)));
    }
}

/// Formats an inline reference as Markdown prose.
///
/// Symbol references with a source location become a code span plus a
/// `basename:line` (or `basename`) link; plain file references become a
/// link labeled with the reference name or the path's basename. When no
/// usable target exists the name is shown as a bare code span, never an
/// inferred link.
#[must_use]
pub fn format_inline_reference(
    name: Option<&str>,
    target: &InlineTarget,
    resolver: &PathResolver,
) -> String {
    match target {
        InlineTarget::Opaque => bare_span(name.unwrap_or_default()),
        InlineTarget::Symbol {
            name: symbol_name,
            path,
            line,
        } => {
            let symbol = symbol_name.as_deref().or(name).unwrap_or_default();
            match (path.as_deref().filter(|p| !p.is_empty()), line) {
                (Some(path), Some(line)) => format!(
                    "`{symbol}` ([{base}:{line}]({rel}#L{line}))",
                    base = basename(path),
                    rel = resolver.relativize(path),
                ),
                (Some(path), None) => format!(
                    "`{symbol}` ([{base}]({rel}))",
                    base = basename(path),
                    rel = resolver.relativize(path),
                ),
                (None, _) => bare_span(symbol),
            }
        }
        InlineTarget::File { path } => match path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => {
                let display = name.filter(|n| !n.is_empty()).unwrap_or_else(|| basename(path));
                format!("[{display}]({})", resolver.relativize(path))
            }
            None => bare_span(name.unwrap_or_default()),
        },
    }
}

fn bare_span(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!("`{name}`")
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ToolPayload;

    fn text(value: &str) -> ResponseEvent {
        ResponseEvent::Text {
            value: value.to_owned(),
        }
    }

    fn resolver() -> PathResolver {
        PathResolver::with_root("/work/project")
    }

    #[test]
    fn empty_events_yield_no_segments() {
        assert!(classify(&[], &resolver()).is_empty());
    }

    #[test]
    fn consecutive_text_events_merge_in_order() {
        let events = [text("Hello "), text("wide "), text("world.")];
        let segments = classify(&events, &resolver());

        assert_eq!(segments, vec![Segment::Text("Hello wide world.".to_owned())]);
    }

    #[test]
    fn blank_and_lone_fence_fragments_are_dropped() {
        let events = [text("   "), text("```"), text("  ```  "), text("real")];
        let segments = classify(&events, &resolver());

        assert_eq!(segments, vec![Segment::Text("real".to_owned())]);
    }

    #[test]
    fn labeled_fence_fragments_are_kept() {
        let events = [text("```rust\n"), text("let x = 1;")];
        let segments = classify(&events, &resolver());

        assert_eq!(
            segments,
            vec![Segment::Text("```rust\nlet x = 1;".to_owned())]
        );
    }

    #[test]
    fn inline_reference_merges_with_surrounding_text() {
        let events = [
            text("See "),
            ResponseEvent::InlineReference {
                name: Some("main.rs".to_owned()),
                target: InlineTarget::File {
                    path: Some("/work/project/src/main.rs".to_owned()),
                },
            },
            text(" for details."),
        ];
        let segments = classify(&events, &resolver());

        assert_eq!(
            segments,
            vec![Segment::Text(
                "See [main.rs](src/main.rs) for details.".to_owned()
            )]
        );
    }

    #[test]
    fn thinking_flushes_pending_text_first() {
        let thinking = Thinking {
            value: "hmm".to_owned(),
            title: None,
        };
        let events = [
            text("before"),
            ResponseEvent::Thinking(thinking.clone()),
            text("after"),
        ];
        let segments = classify(&events, &resolver());

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("before".to_owned()));
        assert_eq!(segments[1], Segment::Thinking(&thinking));
        assert_eq!(segments[2], Segment::Text("after".to_owned()));
    }

    #[test]
    fn tool_invocation_does_not_absorb_prose() {
        let call = ToolInvocation {
            tool_name: Some("Read File".to_owned()),
            invocation_message: None,
            payload: None,
        };
        let events = [
            text("first"),
            ResponseEvent::ToolInvocation(call.clone()),
            text("second"),
        ];
        let segments = classify(&events, &resolver());

        assert_eq!(
            segments,
            vec![
                Segment::Text("first".to_owned()),
                Segment::ToolInvocation(&call),
                Segment::Text("second".to_owned()),
            ]
        );
    }

    #[test]
    fn ignored_events_do_not_split_text() {
        let events = [text("one "), ResponseEvent::Ignored, text("two")];
        let segments = classify(&events, &resolver());

        assert_eq!(segments, vec![Segment::Text("one two".to_owned())]);
    }

    #[test]
    fn unknown_event_value_joins_the_buffer() {
        let events = [
            text("kept: "),
            ResponseEvent::Unknown {
                value: Some("mystery".to_owned()),
            },
            ResponseEvent::Unknown { value: None },
        ];
        let segments = classify(&events, &resolver());

        assert_eq!(segments, vec![Segment::Text("kept: mystery".to_owned())]);
    }

    #[test]
    fn structural_events_preserve_relative_order() {
        let events = [
            ResponseEvent::PrepareToolInvocation {
                tool_name: Some("Read File".to_owned()),
            },
            ResponseEvent::CodeblockUri {
                path: Some("/work/project/src/lib.rs".to_owned()),
            },
            ResponseEvent::TextEditGroup {
                edits: vec!["x".to_owned()],
            },
        ];
        let segments = classify(&events, &resolver());

        assert!(matches!(segments[0], Segment::PrepareTool { .. }));
        assert!(matches!(segments[1], Segment::CodeblockUri { .. }));
        assert!(matches!(segments[2], Segment::TextEditGroup { .. }));
    }

    #[test]
    fn terminal_payload_rides_through_classification() {
        let call = ToolInvocation {
            tool_name: Some("Run in Terminal".to_owned()),
            invocation_message: None,
            payload: Some(ToolPayload::Terminal {
                command: Some("ls".to_owned()),
                output: None,
                timestamp: None,
            }),
        };
        let events = [ResponseEvent::ToolInvocation(call.clone())];
        let segments = classify(&events, &resolver());

        assert_eq!(segments, vec![Segment::ToolInvocation(&call)]);
    }

    #[test]
    fn formats_symbol_reference_with_location() {
        let target = InlineTarget::Symbol {
            name: Some("parse_chat".to_owned()),
            path: Some("/work/project/src/parser.rs".to_owned()),
            line: Some(42),
        };
        assert_eq!(
            format_inline_reference(None, &target, &resolver()),
            "`parse_chat` ([parser.rs:42](src/parser.rs#L42))"
        );
    }

    #[test]
    fn formats_symbol_reference_without_line() {
        let target = InlineTarget::Symbol {
            name: Some("Renderer".to_owned()),
            path: Some("/work/project/src/renderer.rs".to_owned()),
            line: None,
        };
        assert_eq!(
            format_inline_reference(None, &target, &resolver()),
            "`Renderer` ([renderer.rs](src/renderer.rs))"
        );
    }

    #[test]
    fn symbol_without_location_falls_back_to_bare_span() {
        let target = InlineTarget::Symbol {
            name: None,
            path: None,
            line: Some(3),
        };
        assert_eq!(
            format_inline_reference(Some("Thing"), &target, &resolver()),
            "`Thing`"
        );
    }

    #[test]
    fn formats_file_reference_with_name_label() {
        let target = InlineTarget::File {
            path: Some("/work/project/docs/notes.md".to_owned()),
        };
        assert_eq!(
            format_inline_reference(Some("notes"), &target, &resolver()),
            "[notes](docs/notes.md)"
        );
    }

    #[test]
    fn file_reference_without_name_uses_basename() {
        let target = InlineTarget::File {
            path: Some("/work/project/docs/notes.md".to_owned()),
        };
        assert_eq!(
            format_inline_reference(None, &target, &resolver()),
            "[notes.md](docs/notes.md)"
        );
    }

    #[test]
    fn file_reference_without_path_is_a_bare_span() {
        let target = InlineTarget::File { path: None };
        assert_eq!(
            format_inline_reference(Some("mystery"), &target, &resolver()),
            "`mystery`"
        );
    }

    #[test]
    fn opaque_reference_without_name_renders_nothing() {
        assert_eq!(
            format_inline_reference(None, &InlineTarget::Opaque, &resolver()),
            ""
        );
    }
}
