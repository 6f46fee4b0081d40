//! Path filtering using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter orchestrates path matching logic
//! - Encapsulates the rules for include/exclude pattern evaluation
//! - Decides which source files a directory walk yields
//! - Handles .cstyleignore file discovery and parsing

use crate::domain::violations::{StyleError, StyleResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages path filtering using .gitignore-style patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    /// Include/exclude patterns, later patterns win
    patterns: Vec<FilterPattern>,
    /// Whether to process ignore files
    process_ignore_files: bool,
    /// Name of ignore files to process
    ignore_filename: String,
    /// Extensions (without dot) of files yielded by `find_files`; empty means all
    extensions: Vec<String>,
}

/// A single path filter pattern
#[derive(Debug, Clone)]
struct FilterPattern {
    pattern: glob::Pattern,
    /// Re-includes matching paths (written with a leading `!`)
    is_include: bool,
    /// Original pattern string, without the `!`
    original: String,
}

impl FilterPattern {
    fn parse(line: &str) -> Result<Self, glob::PatternError> {
        let (is_include, pattern_str) = match line.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, line),
        };
        let glob_source = pattern_str.trim_end_matches('/').trim_start_matches('/');
        Ok(Self {
            pattern: glob::Pattern::new(glob_source)?,
            is_include,
            original: pattern_str.to_string(),
        })
    }
}

impl PathFilter {
    /// Create a new path filter with the given patterns
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> StyleResult<Self> {
        let mut filter_patterns = Vec::new();

        for pattern_str in patterns {
            let pattern = FilterPattern::parse(&pattern_str)
                .map_err(|e| StyleError::pattern(format!("Invalid pattern '{pattern_str}': {e}")))?;
            filter_patterns.push(pattern);
        }

        Ok(Self {
            patterns: filter_patterns,
            process_ignore_files: ignore_filename.is_some(),
            ignore_filename: ignore_filename.unwrap_or_else(|| ".cstyleignore".to_string()),
            extensions: Vec::new(),
        })
    }

    /// Create a default path filter with sensible exclusions for C projects
    pub fn with_defaults() -> StyleResult<Self> {
        Ok(Self::new(
            vec![
                "**/.git/".to_string(),
                "**/build/".to_string(),
                "**/third_party/".to_string(),
                "**/*.generated.*".to_string(),
            ],
            Some(".cstyleignore".to_string()),
        )?
        .with_extensions(["c", "h"]))
    }

    /// Restrict directory walks to files with these extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Whether a file name carries one of the configured extensions
    pub fn has_source_extension<P: AsRef<Path>>(&self, path: P) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.as_ref()
            .extension()
            .map(|e| self.extensions.iter().any(|wanted| e.to_string_lossy().eq_ignore_ascii_case(wanted)))
            .unwrap_or(false)
    }

    /// Check if a path should be checked based on all patterns and ignore files
    pub fn should_analyze<P: AsRef<Path>>(&self, path: P) -> StyleResult<bool> {
        let path = path.as_ref();

        // Start with default: include all files
        let mut should_include = true;

        // Apply patterns in order (like .gitignore)
        for pattern in &self.patterns {
            if self.pattern_matches_path(pattern, path) {
                should_include = pattern.is_include;
            }
        }

        if !should_include {
            return Ok(false);
        }

        if self.process_ignore_files && self.is_ignored_by_files(path)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Check if path is ignored by ignore files in its ancestor directories
    fn is_ignored_by_files<P: AsRef<Path>>(&self, path: P) -> StyleResult<bool> {
        let path = path.as_ref();
        let mut current_dir = path.parent();
        let mut is_ignored = false;

        while let Some(dir) = current_dir {
            let ignore_file = dir.join(&self.ignore_filename);

            if ignore_file.is_file() {
                let patterns = self.load_ignore_file(&ignore_file)?;

                if let Ok(relative_path) = path.strip_prefix(dir) {
                    for pattern in patterns {
                        if self.pattern_matches_path(&pattern, relative_path) {
                            is_ignored = !pattern.is_include;
                        }
                    }
                }
            }

            current_dir = dir.parent();
        }

        Ok(is_ignored)
    }

    /// Load patterns from an ignore file
    fn load_ignore_file<P: AsRef<Path>>(&self, path: P) -> StyleResult<Vec<FilterPattern>> {
        let content = fs::read_to_string(&path).map_err(|e| {
            StyleError::config(format!(
                "Failed to read ignore file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut patterns = Vec::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match FilterPattern::parse(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    tracing::warn!(
                        "Invalid pattern '{}' in {}: {}",
                        line,
                        path.as_ref().display(),
                        e
                    );
                }
            }
        }

        Ok(patterns)
    }

    /// Get all source files that should be checked in a directory tree, in path order
    pub fn find_files<P: AsRef<Path>>(&self, root: P) -> StyleResult<Vec<PathBuf>> {
        let root = root.as_ref();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            // excluded directories are pruned instead of walked
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || self.should_analyze(entry.path()).unwrap_or(true)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_file()
                && self.has_source_extension(path)
                && self.should_analyze(path)?
            {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Filter a list of paths to only those that should be checked
    pub fn filter_paths<P: AsRef<Path>>(&self, paths: &[P]) -> StyleResult<Vec<PathBuf>> {
        let mut filtered = Vec::new();

        for path in paths {
            if self.should_analyze(path)? {
                filtered.push(path.as_ref().to_path_buf());
            }
        }

        Ok(filtered)
    }

    /// Add a pattern to the filter
    pub fn add_pattern(&mut self, pattern: String) -> StyleResult<()> {
        let parsed = FilterPattern::parse(&pattern)
            .map_err(|e| StyleError::pattern(format!("Invalid pattern '{pattern}': {e}")))?;
        self.patterns.push(parsed);
        Ok(())
    }

    /// Describe which patterns match a path
    pub fn debug_patterns<P: AsRef<Path>>(&self, path: P) -> Vec<String> {
        let path = path.as_ref();

        self.patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                format!(
                    "Pattern {}: {}{} -> {}",
                    i,
                    if pattern.is_include { "!" } else { "" },
                    pattern.original,
                    if self.pattern_matches_path(pattern, path) { "MATCH" } else { "no match" }
                )
            })
            .collect()
    }

    /// Check if a pattern matches a path using .gitignore-style rules
    fn pattern_matches_path(&self, pattern: &FilterPattern, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        // Directory pattern: only directories, or files below a matching directory
        if pattern.original.ends_with('/') {
            if path.is_dir() && pattern.pattern.matches(&path_str) {
                return true;
            }
            return path
                .ancestors()
                .skip(1)
                .any(|ancestor| pattern.pattern.matches(&ancestor.to_string_lossy()));
        }

        if pattern.original.contains('/') {
            return pattern.pattern.matches(&path_str);
        }

        // No slash: match the file name only
        path.file_name()
            .map(|filename| pattern.pattern.matches(&filename.to_string_lossy()))
            .unwrap_or(false)
    }
}
