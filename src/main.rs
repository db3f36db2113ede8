// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chat2md.
//!
//! This binary provides the `chat2md` command for converting chat
//! session JSON logs into per-turn Markdown transcripts.

use chat2md::{convert, renderer};
use lexopt::prelude::*;
use snafu::prelude::*;
use std::path::PathBuf;

/// Which rendering preset was requested.
#[derive(Clone, Copy)]
enum Mode {
    Agent,
    Human,
    Fullout,
}

struct Cli {
    input: PathBuf,
    output: PathBuf,
    options: renderer::RenderOptions,
    quiet: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("{source}"))]
    Convert { source: convert::ConvertError },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert GitHub Copilot chat session logs to per-turn Markdown transcripts

Usage: {name} [OPTIONS] <INPUT> [OUTPUT]

Arguments:
  <INPUT>   Chat session JSON file
  [OUTPUT]  Output Markdown path (default: <INPUT> with a .md extension)

Modes (mutually exclusive, default: --agent):
      --agent            Flat Markdown, reasoning in code blocks, edit bodies hidden
      --human            Collapsible HTML blocks, edit bodies hidden
      --fullout          Flat Markdown with full edit bodies

Options:
      --full-terminal    Do not truncate captured terminal output
      --fold             Legacy: collapsible blocks (ignored with a mode flag)
      --no-edit-patch    Legacy: hide edit bodies (ignored with a mode flag)
  -q, --quiet            Suppress progress messages
  -h, --help             Print help
  -V, --version          Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn set_mode(mode: &mut Option<Mode>, which: Mode) -> Result<(), lexopt::Error> {
    if mode.is_some() {
        return Err("only one of --agent, --human, --fullout may be given".into());
    }
    *mode = Some(which);
    Ok(())
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut mode: Option<Mode> = None;
    let mut full_terminal = false;
    let mut fold = false;
    let mut no_edit_patch = false;
    let mut quiet = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Long("agent") => set_mode(&mut mode, Mode::Agent)?,
            Long("human") => set_mode(&mut mode, Mode::Human)?,
            Long("fullout") => set_mode(&mut mode, Mode::Fullout)?,
            Long("full-terminal" | "fullterminal") => full_terminal = true,
            Long("fold") => fold = true,
            Long("no-edit-patch" | "noeditpatch") => no_edit_patch = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) if input.is_none() => input = Some(val.parse()?),
            Value(val) if output.is_none() => output = Some(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    let input = input.ok_or("missing required argument: <INPUT>")?;
    let output = output.unwrap_or_else(|| input.with_extension("md"));

    let mut options = match mode {
        Some(Mode::Agent) | None => renderer::RenderOptions::agent(),
        Some(Mode::Human) => renderer::RenderOptions::human(),
        Some(Mode::Fullout) => renderer::RenderOptions::fullout(),
    };
    // Legacy flags only shape the output when no mode preset was chosen.
    if mode.is_none() {
        if fold {
            options.use_foldable_blocks = true;
        }
        if no_edit_patch {
            options.suppress_edit_bodies = true;
        }
    }
    options.show_full_terminal_output = full_terminal;

    Ok(Cli {
        input,
        output,
        options,
        quiet,
    })
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;

    let job = convert::Conversion {
        input: cli.input,
        output: cli.output,
        options: cli.options,
        quiet: cli.quiet,
    };
    convert::run(&job).context(ConvertSnafu)?;

    Ok(())
}
