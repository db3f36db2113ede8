// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Session tracking and turn-file archival.
//!
//! Turn files for one chat share an output directory with a `.session`
//! sidecar holding the identifier of the session they came from. When a
//! later run sees a different identifier, the stale turn files are moved
//! into a timestamped `archive_*` subdirectory before new ones are
//! written. Everything here is best effort: a sidecar or archive that
//! cannot be written produces a warning, never a failed conversion.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use walkdir::WalkDir;

/// Where one conversion's turn files, session sidecar, and archives
/// live, derived from the requested output path.
///
/// An output path of `notes/chat.md` yields turn files like
/// `notes/chat_turn_1-2.md` and the sidecar `notes/chat.session`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Directory receiving turn files and archives.
    pub dir: PathBuf,
    /// Base name shared by all files of this conversion.
    pub stem: String,
    /// Turn-file extension including the leading dot.
    pub ext: String,
}

impl OutputLayout {
    /// Derives the layout from an output path.
    ///
    /// Returns `None` when the path has no usable file stem (for example
    /// `/` or `..`). A missing extension defaults to `.md`; a missing
    /// parent means the current directory.
    #[must_use]
    pub fn new(output: &Path) -> Option<Self> {
        let stem = output.file_stem()?.to_str()?.to_owned();
        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .map_or_else(|| ".md".to_owned(), |e| format!(".{e}"));
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Some(Self { dir, stem, ext })
    }

    /// Path of the turn file for a group label such as `3` or `1-2`.
    #[must_use]
    pub fn turn_file(&self, label: &str) -> PathBuf {
        self.dir
            .join(format!("{}_turn_{label}{}", self.stem, self.ext))
    }

    /// Path of the session sidecar.
    #[must_use]
    pub fn marker_file(&self) -> PathBuf {
        self.dir.join(format!("{}.session", self.stem))
    }
}

/// Reads the session identifier recorded by a previous run.
///
/// A missing, unreadable, or empty sidecar all mean no previous session.
#[must_use]
pub fn read_marker(layout: &OutputLayout) -> Option<String> {
    let contents = fs::read_to_string(layout.marker_file()).ok()?;
    let id = contents.trim();
    if id.is_empty() {
        return None;
    }
    Some(id.to_owned())
}

/// Records `session_id` in the sidecar, warning on failure.
pub fn save_marker(layout: &OutputLayout, session_id: &str) {
    if let Err(e) = fs::write(layout.marker_file(), session_id) {
        eprintln!("Warning: could not save session file: {e}");
    }
}

/// Moves this conversion's existing turn files into a timestamped
/// `archive_*` subdirectory.
///
/// The archive directory is only created when there is something to
/// move. Files that cannot be moved are warned about and left in place.
pub fn archive_turn_files(layout: &OutputLayout, quiet: bool) {
    let prefix = format!("{}_turn_", layout.stem);
    let turn_files: Vec<PathBuf> = WalkDir::new(&layout.dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(&layout.ext))
        })
        .map(|entry| entry.into_path())
        .collect();

    if turn_files.is_empty() {
        return;
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let archive_dir = layout.dir.join(format!("archive_{stamp}"));
    if let Err(e) = fs::create_dir_all(&archive_dir) {
        eprintln!("Warning: could not create archive directory: {e}");
        return;
    }

    for path in &turn_files {
        let Some(name) = path.file_name() else {
            continue;
        };
        match fs::rename(path, archive_dir.join(name)) {
            Ok(()) => {
                if !quiet {
                    eprintln!("  Archived {}", name.to_string_lossy());
                }
            }
            Err(e) => {
                eprintln!("Warning: could not archive {}: {e}", name.to_string_lossy());
            }
        }
    }

    if !quiet {
        eprintln!(
            "Archived {} turn file(s) to {}",
            turn_files.len(),
            archive_dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout_in(dir: &Path) -> OutputLayout {
        OutputLayout::new(&dir.join("chat.md")).unwrap()
    }

    fn archive_dirs(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("archive_"))
            })
            .map(|entry| entry.path())
            .collect()
    }

    #[test]
    fn layout_names_turn_and_marker_files() {
        let layout = OutputLayout::new(Path::new("notes/chat.md")).unwrap();

        assert_eq!(layout.turn_file("1-2"), Path::new("notes/chat_turn_1-2.md"));
        assert_eq!(layout.turn_file("7"), Path::new("notes/chat_turn_7.md"));
        assert_eq!(layout.marker_file(), Path::new("notes/chat.session"));
    }

    #[test]
    fn layout_defaults_extension_and_directory() {
        let layout = OutputLayout::new(Path::new("chat")).unwrap();

        assert_eq!(layout.ext, ".md");
        assert_eq!(layout.turn_file("1"), Path::new("./chat_turn_1.md"));
    }

    #[test]
    fn layout_keeps_non_markdown_extension() {
        let layout = OutputLayout::new(Path::new("out/log.txt")).unwrap();

        assert_eq!(layout.ext, ".txt");
        assert_eq!(layout.turn_file("2"), Path::new("out/log_turn_2.txt"));
    }

    #[test]
    fn layout_rejects_output_without_a_stem() {
        assert!(OutputLayout::new(Path::new("/")).is_none());
    }

    #[test]
    fn marker_roundtrip() {
        let dir = tempdir().unwrap();
        let layout = layout_in(dir.path());

        save_marker(&layout, "request_abc");
        assert_eq!(read_marker(&layout), Some("request_abc".to_owned()));
    }

    #[test]
    fn marker_read_trims_whitespace() {
        let dir = tempdir().unwrap();
        let layout = layout_in(dir.path());

        fs::write(layout.marker_file(), "request_abc\n").unwrap();
        assert_eq!(read_marker(&layout), Some("request_abc".to_owned()));
    }

    #[test]
    fn missing_or_empty_marker_reads_none() {
        let dir = tempdir().unwrap();
        let layout = layout_in(dir.path());

        assert_eq!(read_marker(&layout), None);

        fs::write(layout.marker_file(), "  \n").unwrap();
        assert_eq!(read_marker(&layout), None);
    }

    #[test]
    fn archives_only_matching_turn_files() {
        let dir = tempdir().unwrap();
        let layout = layout_in(dir.path());

        fs::write(dir.path().join("chat_turn_1.md"), "one").unwrap();
        fs::write(dir.path().join("chat_turn_2-3.md"), "two").unwrap();
        fs::write(dir.path().join("chat.md"), "summary").unwrap();
        fs::write(dir.path().join("other_turn_1.md"), "other").unwrap();
        fs::write(dir.path().join("chat_turn_9.txt"), "wrong ext").unwrap();

        archive_turn_files(&layout, true);

        assert!(!dir.path().join("chat_turn_1.md").exists());
        assert!(!dir.path().join("chat_turn_2-3.md").exists());
        assert!(dir.path().join("chat.md").exists());
        assert!(dir.path().join("other_turn_1.md").exists());
        assert!(dir.path().join("chat_turn_9.txt").exists());

        let archives = archive_dirs(dir.path());
        assert_eq!(archives.len(), 1);
        assert!(archives[0].join("chat_turn_1.md").exists());
        assert!(archives[0].join("chat_turn_2-3.md").exists());
    }

    #[test]
    fn archive_skips_directory_creation_when_nothing_matches() {
        let dir = tempdir().unwrap();
        let layout = layout_in(dir.path());

        fs::write(dir.path().join("chat.md"), "summary").unwrap();

        archive_turn_files(&layout, true);

        assert!(archive_dirs(dir.path()).is_empty());
    }
}
