//! Storage backends for the virtual file system
//!
//! A backend implements four primitive operations (list, load, write,
//! exists). Line-addressed reads, exact-match edits, glob, and grep are
//! provided methods layered on the primitives so every variant shares one
//! semantics.
//!
//! ## Variants
//! - `MemoryBackend` - ephemeral, lives with the owning stack
//! - `KeyedBackend` - durable SQLite store, survives across runs
//! - `DirectoryBackend` - a real directory tree rooted at a path
//! - `CompositeBackend` - routes by longest path prefix to delegates

mod composite;
mod directory;
mod keyed;
mod memory;
pub mod truncation;

pub use composite::{CompositeBackend, CompositeBuilder};
pub use directory::DirectoryBackend;
pub use keyed::KeyedBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use truncation::truncate_lines;

/// Maximum characters kept per line on read. Longer lines are cut and
/// marked so the truncation is visible to the caller.
pub const MAX_LINE_LEN: usize = 2000;

/// Errors surfaced by storage operations.
///
/// All of these are recoverable from the model's point of view: the tool
/// layer wraps them into structured failure results rather than aborting.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("no match for {0:?} in file")]
    NoMatch(String),

    #[error("found {count} matches of {target:?}, expected exactly 1 (pass replace_all=true to replace every occurrence)")]
    AmbiguousMatch { target: String, count: usize },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("backend I/O failure: {0}")]
    Io(String),
}

impl FsError {
    /// Stable error code for the tool-result envelope.
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "not_found",
            FsError::NoMatch(_) => "no_match",
            FsError::AmbiguousMatch { .. } => "ambiguous_match",
            FsError::InvalidPath(_) => "invalid_path",
            FsError::InvalidPattern(_) => "invalid_pattern",
            FsError::Io(_) => "io_error",
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for FsError {
    fn from(err: rusqlite::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// A line window returned by `read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadWindow {
    pub content: String,
    pub total_lines: usize,
    pub lines_returned: usize,
    /// 1-based line number of the first returned line
    pub start_line: usize,
    /// Number of lines that were cut at `MAX_LINE_LEN`
    pub truncated_lines: usize,
}

/// Result of a successful edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub new_content: String,
    pub replacements: usize,
}

/// A single grep hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    pub path: String,
    /// 1-based
    pub line_number: usize,
    pub line: String,
}

/// The storage contract every backend variant satisfies.
///
/// Backends are `Send + Sync`; writes to the same path serialize inside
/// each implementation, concurrent reads are safe.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Paths under `prefix`, lexicographically ordered. An unmatched
    /// prefix yields an empty list, not an error.
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>>;

    /// Full file content. `NotFound` if the path is absent.
    async fn load(&self, path: &str) -> FsResult<String>;

    /// Create or wholly overwrite the file at `path`.
    async fn write(&self, path: &str, content: &str) -> FsResult<()>;

    async fn exists(&self, path: &str) -> FsResult<bool>;

    /// Read a 1-based line window. An offset past end-of-file returns an
    /// empty window; over-long lines are cut with a visible marker.
    async fn read(&self, path: &str, offset: usize, limit: Option<usize>) -> FsResult<ReadWindow> {
        let content = self.load(path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let start = offset.max(1) - 1;
        if start >= total_lines {
            return Ok(ReadWindow {
                content: String::new(),
                total_lines,
                lines_returned: 0,
                start_line: offset.max(1),
                truncated_lines: 0,
            });
        }
        let end = match limit {
            Some(n) => (start + n).min(total_lines),
            None => total_lines,
        };

        let (text, truncated_lines) = truncate_lines(&lines[start..end], MAX_LINE_LEN);
        Ok(ReadWindow {
            content: text,
            total_lines,
            lines_returned: end - start,
            start_line: start + 1,
            truncated_lines,
        })
    }

    /// Replace `old` with `new`. Requires exactly one occurrence unless
    /// `replace_all`; the file is left untouched on any failure.
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> FsResult<EditOutcome> {
        if old.is_empty() {
            return Err(FsError::NoMatch(old.to_string()));
        }
        let content = self.load(path).await?;
        let count = content.matches(old).count();
        if count == 0 {
            return Err(FsError::NoMatch(old.to_string()));
        }
        if count > 1 && !replace_all {
            return Err(FsError::AmbiguousMatch {
                target: old.to_string(),
                count,
            });
        }

        let new_content = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        self.write(path, &new_content).await?;
        Ok(EditOutcome {
            new_content,
            replacements: if replace_all { count } else { 1 },
        })
    }

    /// Shell-style glob (`*`, `?`, `**`) over full paths, lexicographic.
    async fn glob(&self, pattern: &str) -> FsResult<Vec<String>> {
        let pattern =
            Pattern::new(pattern).map_err(|e| FsError::InvalidPattern(e.to_string()))?;
        let mut paths: Vec<String> = self
            .list("")
            .await?
            .into_iter()
            .filter(|p| pattern.matches(p))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Regex search over every line under `prefix`. Patterns that fail to
    /// parse as a regex fall back to a literal-text search.
    async fn grep(&self, pattern: &str, prefix: &str) -> FsResult<Vec<GrepMatch>> {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(_) => Regex::new(&regex::escape(pattern))
                .map_err(|e| FsError::InvalidPattern(e.to_string()))?,
        };

        let mut matches = Vec::new();
        for path in self.list(prefix).await? {
            let content = self.load(&path).await?;
            for (idx, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(GrepMatch {
                        path: path.clone(),
                        line_number: idx + 1,
                        line: line.to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_window_basics() {
        let be = MemoryBackend::new();
        be.write("notes.txt", "one\ntwo\nthree\nfour").await.unwrap();

        let w = be.read("notes.txt", 2, Some(2)).await.unwrap();
        assert_eq!(w.content, "two\nthree");
        assert_eq!(w.start_line, 2);
        assert_eq!(w.lines_returned, 2);
        assert_eq!(w.total_lines, 4);
    }

    #[tokio::test]
    async fn read_offset_past_eof_is_empty_not_error() {
        let be = MemoryBackend::new();
        be.write("a.txt", "only line").await.unwrap();

        let w = be.read("a.txt", 50, None).await.unwrap();
        assert_eq!(w.lines_returned, 0);
        assert_eq!(w.content, "");
    }

    #[tokio::test]
    async fn read_marks_truncated_lines() {
        let be = MemoryBackend::new();
        let long = "x".repeat(MAX_LINE_LEN + 100);
        be.write("big.txt", &long).await.unwrap();

        let w = be.read("big.txt", 1, None).await.unwrap();
        assert_eq!(w.truncated_lines, 1);
        assert!(w.content.ends_with("[truncated]"));
    }

    #[tokio::test]
    async fn edit_requires_unique_match() {
        let be = MemoryBackend::new();
        be.write("f.txt", "foo bar foo").await.unwrap();

        let err = be.edit("f.txt", "foo", "baz", false).await.unwrap_err();
        assert!(matches!(err, FsError::AmbiguousMatch { count: 2, .. }));
        // file unchanged on failure
        assert_eq!(be.load("f.txt").await.unwrap(), "foo bar foo");

        let out = be.edit("f.txt", "bar", "qux", false).await.unwrap();
        assert_eq!(out.new_content, "foo qux foo");
        assert_eq!(out.replacements, 1);
    }

    #[tokio::test]
    async fn edit_replace_all() {
        let be = MemoryBackend::new();
        be.write("f.txt", "a-a-a").await.unwrap();

        let out = be.edit("f.txt", "a", "b", true).await.unwrap();
        assert_eq!(out.new_content, "b-b-b");
        assert_eq!(out.replacements, 3);
    }

    #[tokio::test]
    async fn edit_no_match_and_missing_file() {
        let be = MemoryBackend::new();
        be.write("f.txt", "hello").await.unwrap();

        assert!(matches!(
            be.edit("f.txt", "absent", "x", false).await.unwrap_err(),
            FsError::NoMatch(_)
        ));
        assert!(matches!(
            be.edit("nope.txt", "a", "b", false).await.unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn glob_is_lexicographic() {
        let be = MemoryBackend::new();
        be.write("b.md", "").await.unwrap();
        be.write("a.md", "").await.unwrap();
        be.write("c.txt", "").await.unwrap();

        let hits = be.glob("*.md").await.unwrap();
        assert_eq!(hits, vec!["a.md".to_string(), "b.md".to_string()]);
    }

    #[tokio::test]
    async fn grep_reports_line_numbers() {
        let be = MemoryBackend::new();
        be.write("n.txt", "alpha\nbeta\nTODO: x").await.unwrap();

        let hits = be.grep("TODO", "").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line_number, 3);
        assert_eq!(hits[0].line, "TODO: x");
    }

    #[tokio::test]
    async fn grep_falls_back_to_literal_on_bad_regex() {
        let be = MemoryBackend::new();
        be.write("n.txt", "price is (5 dollars").await.unwrap();

        // "(5" fails to parse as a regex and falls back to literal text
        let hits = be.grep("(5", "").await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
