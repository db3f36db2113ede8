// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Project-root detection and path relativization.
//!
//! Session logs record absolute file paths. Rendered transcripts are much
//! more readable with workspace-relative paths, so a [`PathResolver`] is
//! detected once per conversion and passed by reference to everything that
//! formats paths. A resolver without a root passes paths through
//! unchanged, which keeps rendering total even outside a repository.
//!
//! # Example
//!
//! ```
//! use chat2md::paths::PathResolver;
//!
//! let resolver = PathResolver::with_root("/work/project");
//! assert_eq!(resolver.relativize("/work/project/src/main.rs#L5"), "src/main.rs#L5");
//! assert_eq!(resolver.relativize("/elsewhere/note.md"), "/elsewhere/note.md");
//! ```

use std::path::{Path, PathBuf};

/// Relativizes absolute paths against a detected project root.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    root: Option<PathBuf>,
}

impl PathResolver {
    /// Detects the project root by walking up from `start` looking for a
    /// `.git` entry. The first directory containing one becomes the root;
    /// if none is found, the resolver passes paths through unchanged.
    #[must_use]
    pub fn detect(start: &Path) -> Self {
        let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
        let root = start
            .ancestors()
            .find(|candidate| candidate.join(".git").exists())
            .map(Path::to_path_buf);
        Self { root }
    }

    /// Creates a resolver with a known root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Creates a resolver that leaves every path unchanged.
    #[must_use]
    pub const fn without_root() -> Self {
        Self { root: None }
    }

    /// The detected project root, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Rewrites `path` relative to the project root when it lies under it.
    ///
    /// A trailing `#...` anchor (line fragment) is split off before the
    /// prefix check and reattached afterwards. Paths outside the root, or
    /// any path when no root was detected, come back unchanged.
    #[must_use]
    pub fn relativize(&self, path: &str) -> String {
        let Some(root) = &self.root else {
            return path.to_owned();
        };
        if path.is_empty() {
            return path.to_owned();
        }

        let (clean, suffix) = match path.rsplit_once('#') {
            Some((clean, anchor)) => (clean, Some(anchor)),
            None => (path, None),
        };

        match Path::new(clean).strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => {
                let mut result = rel.to_string_lossy().into_owned();
                if let Some(anchor) = suffix {
                    result.push('#');
                    result.push_str(anchor);
                }
                result
            }
            _ => path.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_root_passes_through() {
        let resolver = PathResolver::without_root();
        assert_eq!(resolver.relativize("/a/b/c.rs"), "/a/b/c.rs");
    }

    #[test]
    fn relativizes_paths_under_root() {
        let resolver = PathResolver::with_root("/work/project");
        assert_eq!(
            resolver.relativize("/work/project/src/main.rs"),
            "src/main.rs"
        );
    }

    #[test]
    fn paths_outside_root_unchanged() {
        let resolver = PathResolver::with_root("/work/project");
        assert_eq!(resolver.relativize("/tmp/scratch.rs"), "/tmp/scratch.rs");
    }

    #[test]
    fn sibling_prefix_is_not_treated_as_inside() {
        let resolver = PathResolver::with_root("/work/app");
        assert_eq!(
            resolver.relativize("/work/app2/src/main.rs"),
            "/work/app2/src/main.rs"
        );
    }

    #[test]
    fn anchor_suffix_is_preserved() {
        let resolver = PathResolver::with_root("/work/project");
        assert_eq!(
            resolver.relativize("/work/project/src/lib.rs#L10-L20"),
            "src/lib.rs#L10-L20"
        );
    }

    #[test]
    fn empty_path_unchanged() {
        let resolver = PathResolver::with_root("/work/project");
        assert_eq!(resolver.relativize(""), "");
    }

    #[test]
    fn root_itself_unchanged() {
        let resolver = PathResolver::with_root("/work/project");
        assert_eq!(resolver.relativize("/work/project"), "/work/project");
    }

    #[test]
    fn detects_git_directory_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        let nested = root.join("docs").join("chats");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(&nested).unwrap();

        let resolver = PathResolver::detect(&nested);
        assert_eq!(resolver.root(), Some(root.as_path()));
    }

    #[test]
    fn detects_git_file_for_worktrees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("worktree");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(".git"), "gitdir: ../repo/.git/worktrees/x").unwrap();

        let resolver = PathResolver::detect(&root);
        assert_eq!(resolver.root(), Some(root.as_path()));
    }
}
