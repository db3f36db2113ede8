// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! End-to-end conversion of one chat session log.
//!
//! [`run`] drives the whole pipeline: read and parse the input, derive
//! the output layout, archive stale turn files when the session
//! identifier changed, then classify, group, and render each turn group
//! into its own Markdown file.
//!
//! Only an unusable input, an unusable output path, or a failed turn
//! file write abort the run. The side work around it (output directory
//! creation, sidecar, archive) warns and carries on.

use std::fs;
use std::path::PathBuf;

use snafu::prelude::*;

use crate::classify::classify;
use crate::group::group_turns;
use crate::parser::{self, ParseError};
use crate::paths::PathResolver;
use crate::renderer::{RenderOptions, render_group};
use crate::session::{self, OutputLayout};

/// One conversion job.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Chat session JSON to read.
    pub input: PathBuf,
    /// Output path whose directory, stem, and extension anchor all turn
    /// files of this conversion.
    pub output: PathBuf,
    /// Rendering style.
    pub options: RenderOptions,
    /// Suppress progress messages.
    pub quiet: bool,
}

/// Errors that abort a conversion.
#[derive(Debug, Snafu)]
pub enum ConvertError {
    /// The input file could not be read.
    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadInput {
        /// The input file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The input file is not a chat session log.
    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseInput {
        /// The input file that could not be parsed.
        path: PathBuf,
        /// The underlying parse error.
        source: ParseError,
    },

    /// The output path has no usable file stem.
    #[snafu(display("invalid output path {}: no file stem", path.display()))]
    InvalidOutput {
        /// The unusable output path.
        path: PathBuf,
    },

    /// A turn file could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteTurnFile {
        /// The turn file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Runs a conversion end to end.
///
/// Writes one Markdown file per turn group next to the requested output
/// path and records the session identifier in the sidecar. A log with no
/// requests writes nothing and succeeds.
pub fn run(job: &Conversion) -> Result<(), ConvertError> {
    let json = fs::read_to_string(&job.input).context(ReadInputSnafu { path: &job.input })?;
    let chat = parser::parse_chat(&json).context(ParseInputSnafu { path: &job.input })?;

    let layout = OutputLayout::new(&job.output).context(InvalidOutputSnafu { path: &job.output })?;
    if let Err(e) = fs::create_dir_all(&layout.dir) {
        eprintln!(
            "Warning: could not create output directory {}: {e}",
            layout.dir.display()
        );
    }

    let resolver = PathResolver::detect(&layout.dir);
    if !job.quiet {
        match resolver.root() {
            Some(root) => eprintln!("Detected workspace root: {}", root.display()),
            None => eprintln!("No workspace root detected; paths are kept verbatim"),
        }
    }

    if chat.requests.is_empty() {
        eprintln!("No requests found in chat data");
        return Ok(());
    }

    let session_id = chat.requests[0].request_id.as_str();
    if let Some(previous) = session::read_marker(&layout)
        && previous != session_id
    {
        if !job.quiet {
            eprintln!("New session detected! Archiving old turn files...");
        }
        session::archive_turn_files(&layout, job.quiet);
    }
    session::save_marker(&layout, session_id);

    let groups = group_turns(&chat.requests);
    for group in &groups {
        let segments: Vec<_> = group
            .turns
            .iter()
            .map(|turn| classify(&turn.request.response, &resolver))
            .collect();
        let markdown = render_group(group, &segments, &resolver, &job.options);

        let path = layout.turn_file(&group.label());
        fs::write(&path, &markdown).context(WriteTurnFileSnafu { path: &path })?;
        if !job.quiet {
            eprintln!("Wrote {}", path.display());
        }
    }

    if !job.quiet {
        eprintln!("Converted {} turn group(s)", groups.len());
    }
    Ok(())
}
