// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering of classified turn groups.
//!
//! One call to [`render_group`] produces the full transcript for one
//! turn group: a `# Turn N` header, `## User` and `## Assistant`
//! sections per turn, and a horizontal rule after each turn. The
//! assistant section is built by walking the turn's segments while
//! holding a small amount of per-turn state: buffered reasoning traces,
//! the tool name announced by a prepare event, and the file path
//! recorded by the most recent codeblock-uri event.
//!
//! [`RenderOptions`] selects between the three output styles: the
//! default agent preset (flat Markdown, reasoning in a fenced block,
//! edit bodies hidden), the human preset (collapsible `<details>`
//! blocks), and the fullout preset (flat with full edit bodies).
//!
//! # Example
//!
//! ```
//! use chat2md::classify::classify;
//! use chat2md::group::group_turns;
//! use chat2md::parser::parse_chat;
//! use chat2md::paths::PathResolver;
//! use chat2md::renderer::{RenderOptions, render_group};
//!
//! let chat = parse_chat(r#"{
//!     "requests": [{
//!         "requestId": "request_1",
//!         "message": { "text": "Hello" },
//!         "response": [{ "value": "Hi there!" }]
//!     }]
//! }"#).unwrap();
//!
//! let resolver = PathResolver::without_root();
//! let groups = group_turns(&chat.requests);
//! let segments: Vec<_> = groups[0]
//!     .turns
//!     .iter()
//!     .map(|turn| classify(&turn.request.response, &resolver))
//!     .collect();
//!
//! let markdown = render_group(&groups[0], &segments, &resolver, &RenderOptions::default());
//! assert!(markdown.starts_with("# Turn 1"));
//! assert!(markdown.contains("Hi there!"));
//! ```

use std::fmt::Write;
use std::path::Path;
use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use crate::classify::Segment;
use crate::group::{Turn, TurnGroup};
use crate::parser::{Thinking, ToolInvocation, ToolPayload};
use crate::paths::PathResolver;

/// ANSI CSI sequences (colors, cursor movement) and OSC sequences
/// (terminal titles) as they appear in captured terminal output.
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").unwrap());

/// `Reading [](uri), lines N to M` invocation messages; the line range
/// is optional.
static READ_CREATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Reading|Creating) \[\]\((.*?)\)(?:, lines (\d+) to (\d+))?").unwrap()
});

/// Markdown-style empty link wrapping a file URI: `[](file://...)`.
static LINKED_FILE_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\]\(file://([^)]+)\)").unwrap());

/// A bare file URI anywhere in a message.
static BARE_FILE_URI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"file://(\S+)").unwrap());

/// Path-like tokens worth backticking in otherwise plain invocation
/// messages. The backtick captures around the token let the replacement
/// leave alone paths that are already inside inline code.
static PATH_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(`?)((?:\*\*?|/)[A-Za-z0-9_\-./*{}]+\.(?:cpp|hpp|h|py|md|txt)(?:#L?\d+-?\d*)?)(`?)",
    )
    .unwrap()
});

const TURN_SEPARATOR: &str = "========================================";
const TERMINAL_HEAD_LINES: usize = 5;
const TERMINAL_TAIL_LINES: usize = 5;

/// Configuration options for transcript rendering.
///
/// Built once per run from a mode preset, then passed by reference to
/// [`render_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Replace edit bodies with a one-line `Editing File` marker.
    pub suppress_edit_bodies: bool,

    /// Emit captured terminal output in full instead of keeping only the
    /// first and last few lines.
    pub show_full_terminal_output: bool,

    /// Use collapsible HTML `<details>` blocks for reasoning traces and
    /// edit bodies instead of flat Markdown.
    pub use_foldable_blocks: bool,
}

impl RenderOptions {
    /// The default preset: flat Markdown, edit bodies hidden, terminal
    /// output truncated.
    #[must_use]
    pub const fn agent() -> Self {
        Self {
            suppress_edit_bodies: true,
            show_full_terminal_output: false,
            use_foldable_blocks: false,
        }
    }

    /// Collapsible rendering for reading in an editor or browser; edit
    /// bodies stay hidden.
    #[must_use]
    pub const fn human() -> Self {
        Self {
            use_foldable_blocks: true,
            ..Self::agent()
        }
    }

    /// Flat rendering with full edit bodies.
    #[must_use]
    pub const fn fullout() -> Self {
        Self {
            suppress_edit_bodies: false,
            ..Self::agent()
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::agent()
    }
}

/// Per-turn accumulator state threaded through the segment walk.
#[derive(Default)]
struct TurnState<'a> {
    /// Reasoning traces waiting to be flushed as one block.
    thinking: Vec<&'a Thinking>,
    /// Tool name announced by the latest prepare event, consumed by the
    /// next serialized invocation.
    pending_tool: Option<&'a str>,
    /// Relativized path recorded by the latest codeblock-uri event,
    /// consumed by the next edit body.
    edit_path: Option<String>,
}

/// Renders one turn group as a Markdown document.
///
/// `segments` holds the classified segments for each turn of `group`, in
/// the same order: one entry per turn, as produced by
/// [`classify`](crate::classify::classify) over that turn's response
/// events.
#[must_use]
pub fn render_group(
    group: &TurnGroup<'_>,
    segments: &[Vec<Segment<'_>>],
    resolver: &PathResolver,
    options: &RenderOptions,
) -> String {
    let mut out = String::new();

    for (index, (turn, turn_segments)) in group.turns.iter().zip(segments).enumerate() {
        if index > 0 {
            write!(out, "\n{TURN_SEPARATOR}\n\n").unwrap();
        }
        render_turn(&mut out, turn, turn_segments, resolver, options);
    }

    out
}

fn render_turn(
    out: &mut String,
    turn: &Turn<'_>,
    segments: &[Segment<'_>],
    resolver: &PathResolver,
    options: &RenderOptions,
) {
    writeln!(out, "# Turn {}\n", turn.number).unwrap();
    writeln!(out, "## User\n").unwrap();
    writeln!(out, "{}\n", turn.request.message.text).unwrap();
    writeln!(out, "## Assistant\n").unwrap();

    let mut state = TurnState::default();

    for segment in segments {
        if let Segment::Thinking(thinking) = segment {
            state.thinking.push(thinking);
            continue;
        }
        flush_thinking(out, &mut state.thinking, options);

        match segment {
            Segment::Thinking(_) => {}
            Segment::Text(text) => {
                let cleaned = strip_ansi(text);
                if !cleaned.trim().is_empty() {
                    writeln!(out, "{cleaned}\n").unwrap();
                }
            }
            Segment::PrepareTool { tool_name } => {
                state.pending_tool = *tool_name;
            }
            Segment::ToolInvocation(call) => {
                render_tool_call(out, &mut state, call, resolver, options);
            }
            Segment::CodeblockUri { path } => {
                state.edit_path = Some(match path.filter(|p| !p.is_empty()) {
                    Some(path) => resolver.relativize(path),
                    None => "Unknown File".to_owned(),
                });
            }
            Segment::TextEditGroup { edits } => {
                render_edit_group(out, &mut state, edits, options);
            }
        }
    }

    flush_thinking(out, &mut state.thinking, options);
    out.push_str("---\n\n");
}

fn render_tool_call(
    out: &mut String,
    state: &mut TurnState<'_>,
    call: &ToolInvocation,
    resolver: &PathResolver,
    options: &RenderOptions,
) {
    if options.use_foldable_blocks
        && let Some(ToolPayload::Terminal {
            timestamp: Some(timestamp),
            ..
        }) = &call.payload
        && let Some(when) = DateTime::from_timestamp_millis(*timestamp)
    {
        writeln!(out, "> **Time:** {}\n", when.format("%Y-%m-%d %H:%M:%S")).unwrap();
    }

    let message = call.invocation_message.as_deref().unwrap_or_default();
    let tool_name = resolve_tool_name(call.tool_name.as_deref(), state.pending_tool, message);

    // A patch invocation's action line duplicates the edit marker that
    // follows it, so it is dropped whenever edit bodies are suppressed.
    let is_patch_tool = tool_name.contains("Apply Patch") || message.contains("Apply Patch");
    if !(is_patch_tool && options.suppress_edit_bodies) && !message.is_empty() {
        writeln!(
            out,
            "> **Action:** {}\n",
            clean_action_message(message, resolver)
        )
        .unwrap();
    }

    match &call.payload {
        Some(ToolPayload::Terminal {
            command, output, ..
        }) => {
            if let Some(command) = command.as_deref().filter(|c| !c.is_empty()) {
                writeln!(out, "Command:\n```bash\n{command}\n```").unwrap();
            }
            if let Some(output) = output.as_deref().filter(|o| !o.is_empty()) {
                let mut cleaned = strip_ansi(output);
                if !options.show_full_terminal_output {
                    cleaned = truncate_output(&cleaned, TERMINAL_HEAD_LINES, TERMINAL_TAIL_LINES);
                }
                writeln!(out, "Output:\n```bash\n{cleaned}\n```\n").unwrap();
            }
        }
        Some(ToolPayload::TodoList { items }) => {
            out.push_str("**Todo List Updated:**\n");
            for item in items {
                writeln!(out, "- [{}] {}", item.status, item.title).unwrap();
            }
            out.push('\n');
        }
        None => {}
    }

    state.pending_tool = None;
}

fn render_edit_group(
    out: &mut String,
    state: &mut TurnState<'_>,
    edits: &[String],
    options: &RenderOptions,
) {
    let display = state
        .edit_path
        .take()
        .unwrap_or_else(|| "Code Block".to_owned());

    if options.suppress_edit_bodies {
        writeln!(out, "> **Editing File:** `{display}`\n").unwrap();
        return;
    }

    let language = fence_language(&display);
    let mut body = String::new();
    for edit in edits {
        body.push_str(edit);
        body.push('\n');
    }

    if options.use_foldable_blocks {
        write!(
            out,
            "\n<details>\n<summary>Editing File: <code>{display}</code></summary>\n\n```{language}\n{body}```\n\n</details>\n\n"
        )
        .unwrap();
    } else {
        write!(
            out,
            "**Editing File:** `{display}`\n\n```{language}\n{body}```\n\n"
        )
        .unwrap();
    }
}

/// Renders and clears the buffered reasoning traces.
///
/// The block gets one summary title: the most recent trace's generated
/// title, else a bold leading line from a trace body, else "Thinking
/// Process". Each trace becomes a section headed by its own bold leading
/// line or generated title, with duplicated header lines and surrounding
/// blank lines removed. Traces with empty bodies contribute nothing; if
/// every trace is empty, no block is emitted at all.
fn flush_thinking(out: &mut String, buffer: &mut Vec<&Thinking>, options: &RenderOptions) {
    if buffer.is_empty() {
        return;
    }
    let items = std::mem::take(buffer);

    let mut main_title = None;
    for item in items.iter().rev() {
        let title = item.title.clone().filter(|t| !t.is_empty()).or_else(|| {
            bold_inner(item.value.trim().split('\n').next().unwrap_or("").trim())
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
        });
        if title.is_some() {
            main_title = title;
            break;
        }
    }
    let main_title = main_title.unwrap_or_else(|| "Thinking Process".to_owned());

    let mut sections: Vec<String> = Vec::new();
    for item in &items {
        let value = item.value.trim();
        if value.is_empty() {
            continue;
        }
        let lines: Vec<&str> = value.split('\n').collect();

        let mut header = String::new();
        let mut body: Vec<&str> = if let Some(inner) = bold_inner(lines[0].trim()) {
            header = inner.to_owned();
            lines[1..].to_vec()
        } else {
            if let Some(title) = item.title.as_deref().filter(|t| !t.is_empty()) {
                header = title.to_owned();
            }
            lines
        };

        if !body.is_empty() && !header.is_empty() {
            let lead = body[0].trim();
            if lead == header || lead == format!("**{header}**") {
                body.remove(0);
            }
        }
        while body.first().is_some_and(|line| line.trim().is_empty()) {
            body.remove(0);
        }
        while body.last().is_some_and(|line| line.trim().is_empty()) {
            body.pop();
        }

        let mut section = String::new();
        if options.use_foldable_blocks {
            if !header.is_empty() {
                write!(section, "> **{header}**\n>\n").unwrap();
            }
            if !body.is_empty() {
                section.push_str("> ");
                section.push_str(&body.join("\n> "));
            }
        } else {
            if !header.is_empty() {
                write!(section, "**{header}**\n\n").unwrap();
            }
            section.push_str(&body.join("\n"));
        }
        if !section.is_empty() {
            sections.push(section);
        }
    }

    if sections.is_empty() {
        return;
    }

    if options.use_foldable_blocks {
        write!(
            out,
            "\n<details>\n<summary>{main_title}</summary>\n\n{}\n\n</details>\n\n",
            sections.join("\n>\n")
        )
        .unwrap();
    } else {
        write!(out, "\n```thinking\n{}\n```\n\n", sections.join("\n\n")).unwrap();
    }
}

/// Extracts the text between a leading and trailing `**`, trimmed.
fn bold_inner(line: &str) -> Option<&str> {
    line.strip_prefix("**")
        .and_then(|rest| rest.strip_suffix("**"))
        .map(str::trim)
}

/// Picks the effective tool name for a serialized invocation.
///
/// Empty names count as absent. When nothing names the tool but the
/// invocation message reads `Using <name>`, the remainder of the message
/// (quotes trimmed) is taken as the name.
fn resolve_tool_name(own: Option<&str>, pending: Option<&str>, message: &str) -> String {
    let name = own
        .filter(|n| !n.is_empty())
        .or_else(|| pending.filter(|n| !n.is_empty()))
        .unwrap_or("Unknown Tool");

    if name == "Unknown Tool"
        && let Some(rest) = message.strip_prefix("Using ")
    {
        return rest.trim_matches('"').to_owned();
    }
    name.to_owned()
}

/// Rewrites an invocation message into readable prose.
///
/// Recognized shapes, tried in order: a read/create message with a
/// bracketed URI (and optional line range, which becomes a `#LN-LM`
/// anchor); any other message carrying a bracketed or bare file URI; a
/// plain message mentioning source-file paths, which are backticked and
/// relativized in place. Anything else passes through unchanged.
fn clean_action_message(message: &str, resolver: &PathResolver) -> String {
    if let Some(caps) = READ_CREATE_RE.captures(message) {
        let verb = &caps[1];
        let uri = &caps[2];
        let mut path = uri.strip_prefix("file://").unwrap_or(uri).to_owned();
        if let (Some(start), Some(end)) = (caps.get(3), caps.get(4)) {
            if let Some(pos) = path.find('#') {
                path.truncate(pos);
            }
            write!(path, "#L{}-L{}", start.as_str(), end.as_str()).unwrap();
        }
        return format!("{verb} `{}`", resolver.relativize(&path));
    }

    if message.contains("[]")
        && let Some(path) = extract_file_uri(message)
    {
        let rel = resolver.relativize(path);
        let replaced = message.replace(&format!("[](file://{path})"), &format!("`{rel}`"));
        if replaced == message {
            return format!("{message} (`{rel}`)");
        }
        return replaced;
    }

    if message.contains('/')
        && (message.contains(".cpp")
            || message.contains(".hpp")
            || message.contains(".h")
            || message.contains(".py"))
    {
        return PATH_TOKEN_RE
            .replace_all(message, |caps: &regex::Captures<'_>| {
                if !caps[1].is_empty() || !caps[3].is_empty() {
                    return caps[0].to_owned();
                }
                let token = &caps[2];
                if token.starts_with("**") {
                    format!("`{token}`")
                } else {
                    format!("`{}`", resolver.relativize(token))
                }
            })
            .into_owned();
    }

    message.to_owned()
}

/// Finds the first file URI in `text`, preferring the bracketed-link
/// form over a bare URI.
fn extract_file_uri(text: &str) -> Option<&str> {
    LINKED_FILE_URI_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .or_else(|| BARE_FILE_URI_RE.captures(text).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

/// Removes ANSI escape sequences from captured terminal text.
fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Keeps the first `head` and last `tail` lines of `text`, replacing the
/// middle with a one-line omission marker. Text short enough that the
/// marker would not save space (at most `head + tail + 2` lines) is
/// returned unchanged.
fn truncate_output(text: &str, head: usize, tail: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= head + tail + 2 {
        return text.to_owned();
    }

    let omitted = lines.len() - head - tail;
    let marker = format!("... ({omitted} lines omitted) ...");

    let mut parts: Vec<&str> = lines[..head].to_vec();
    parts.push(&marker);
    parts.extend_from_slice(&lines[lines.len() - tail..]);
    parts.join("\n")
}

/// Maps an edit path's extension to a fence language tag. Unknown
/// extensions (and non-path labels) get an untagged fence.
fn fence_language(path: &str) -> &'static str {
    let clean = path.split('#').next().unwrap_or(path);
    match Path::new(clean)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
    {
        "rs" => "rust",
        "py" => "python",
        "c" | "h" | "cc" | "hh" | "cpp" | "hpp" => "cpp",
        "js" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "sh" | "bash" => "bash",
        "md" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" => "html",
        "css" => "css",
        _ => "",
    }
}
