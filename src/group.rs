// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Grouping of conversational turns by continuation detection.
//!
//! A session frequently contains turns whose user message is nothing but
//! "keep going" — either the literal word `continue` or the editor's
//! `@agent Continue: "Continue to iterate?"` prompt. Those turns belong
//! to the same logical interaction as the turn before them, so transcripts
//! merge them into one output file. [`group_turns`] performs that
//! partition; [`is_continuation`] is the signal test itself.
//!
//! # Example
//!
//! ```
//! use chat2md::group::is_continuation;
//!
//! assert!(is_continuation("Continue"));
//! assert!(is_continuation("  CONTINUE  "));
//! assert!(!is_continuation("Continue please"));
//! ```

use crate::parser::Request;

/// The continuation prompt VS Code inserts when asking to keep iterating.
const ITERATE_PROMPT: &str = r#"@agent Continue: "Continue to iterate?""#;

/// One conversational turn: a request plus its 1-based position in the
/// session.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    /// 1-based position in the source request sequence.
    pub number: usize,
    /// The underlying request (user message and response events).
    pub request: &'a Request,
}

/// A maximal run of consecutive turns forming one logical interaction.
#[derive(Debug, Clone)]
pub struct TurnGroup<'a> {
    /// The member turns, in conversation order. Never empty.
    pub turns: Vec<Turn<'a>>,
}

impl TurnGroup<'_> {
    /// The group's turn-number label, used in output filenames: `"3"` for
    /// a single turn, `"6-7-8"` for a merged run.
    #[must_use]
    pub fn label(&self) -> String {
        self.turns
            .iter()
            .map(|turn| turn.number.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Returns true when `text` is a continuation signal: the trimmed message
/// equals `continue` case-insensitively, or contains the editor's iterate
/// prompt anywhere. Empty messages are never continuations.
#[must_use]
pub fn is_continuation(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.eq_ignore_ascii_case("continue") || trimmed.contains(ITERATE_PROMPT)
}

/// Partitions requests into turn groups, preserving order.
///
/// The first turn opens a group; each later turn joins the current group
/// when its user message is a continuation signal and opens a new group
/// otherwise. Every turn lands in exactly one group.
#[must_use]
pub fn group_turns(requests: &[Request]) -> Vec<TurnGroup<'_>> {
    let mut groups = Vec::new();
    let mut current: Vec<Turn<'_>> = Vec::new();

    for (index, request) in requests.iter().enumerate() {
        let turn = Turn {
            number: index + 1,
            request,
        };
        if !current.is_empty() && !is_continuation(&request.message.text) {
            groups.push(TurnGroup {
                turns: std::mem::take(&mut current),
            });
        }
        current.push(turn);
    }

    if !current.is_empty() {
        groups.push(TurnGroup { turns: current });
    }
    groups
}
