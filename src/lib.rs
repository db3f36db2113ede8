// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert GitHub Copilot chat session logs to per-turn Markdown
//! transcripts.
//!
//! This crate turns the JSON session logs written by agent-style chat
//! sessions into one Markdown file per turn group, preserving the
//! assistant's prose, reasoning traces, tool activity, and file edits.
//!
//! # Overview
//!
//! A session log is a list of requests, each holding the user's message
//! and the stream of response events the assistant produced. This crate:
//!
//! 1. Parses the JSON into typed requests and response events
//! 2. Classifies each turn's events into ordered renderable segments
//! 3. Groups turns so auto-continuations stay with their real prompt
//! 4. Renders every turn group as its own Markdown transcript
//!
//! The [`convert`] module ties the stages together with session
//! tracking: rerunning on a grown log overwrites the affected turn
//! files in place, while a new session archives the stale ones first.
//!
//! # Example
//!
//! ```no_run
//! use chat2md::convert::{self, Conversion};
//! use chat2md::renderer::RenderOptions;
//!
//! let job = Conversion {
//!     input: "chat.json".into(),
//!     output: "chat.md".into(),
//!     options: RenderOptions::human(),
//!     quiet: false,
//! };
//!
//! convert::run(&job).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and type definitions for session logs
//! - [`classify`]: response events to ordered renderable segments
//! - [`group`]: continuation detection and turn grouping
//! - [`paths`]: workspace root detection and path relativization
//! - [`renderer`]: Markdown generation with configurable output styles
//! - [`session`]: session sidecar and turn-file archival
//! - [`convert`]: the end-to-end conversion pipeline

#![deny(missing_docs)]

pub mod classify;
pub mod convert;
pub mod group;
pub mod parser;
pub mod paths;
pub mod renderer;
pub mod session;
