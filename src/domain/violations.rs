//! Core domain models for convention violations and check results
//!
//! Architecture: Rich Domain Models - Violations are values with behavior, not just data
//! - Violations locate themselves, render their own display line and carry suggestions
//! - CheckReport acts as an aggregate root managing the violations of one checking run
//! - Reports carry no timestamps so identical inputs always produce identical reports

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Severity levels for convention violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational notes about style
    Info,
    /// Deviations that should be fixed
    Warning,
    /// Deviations that must be fixed
    Error,
}

impl Severity {
    /// Whether this severity level is considered blocking by CI integrations
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parse a severity name (case insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "info" | "note" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A single deviation from a convention at a specific source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Identifier of the rule that produced this violation
    pub rule_id: String,
    /// Severity level of this violation
    pub severity: Severity,
    /// File path where the violation was found
    pub file_path: PathBuf,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Rendered, human-readable description
    pub message: String,
    /// The source line the violation points into
    pub context: Option<String>,
    /// Suggested fix (if available)
    pub suggested_fix: Option<String>,
}

impl Violation {
    /// Create a new violation positioned at the start of the file
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        file_path: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file_path,
            line: 1,
            column: 1,
            message: message.into(),
            context: None,
            suggested_fix: None,
        }
    }

    /// Set line and column position
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Add source code context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggested fix
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    /// Whether this violation is blocking
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// Format the violation as a single `path:line:col: [rule] message` line
    pub fn format_display(&self) -> String {
        format!(
            "{}:{}:{}: [{}] {}",
            self.file_path.display(),
            self.line,
            self.column,
            self.rule_id,
            self.message
        )
    }
}

/// Summary statistics for a check report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    /// Total number of files checked
    pub total_files: usize,
    /// Number of violations by severity level
    pub violations_by_severity: ViolationCounts,
}

/// Count of violations by severity level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl ViolationCounts {
    /// Total number of violations across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Whether there are any blocking violations
    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    /// Add a violation to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Render the counts as `N errors, N warnings, N info`
    pub fn describe(&self) -> String {
        format!(
            "{} error{}, {} warning{}, {} info",
            self.error,
            if self.error == 1 { "" } else { "s" },
            self.warning,
            if self.warning == 1 { "" } else { "s" },
            self.info
        )
    }
}

/// Complete report of one checking run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// All violations, sorted by file, line and column once finalized
    pub violations: Vec<Violation>,
    /// Summary statistics
    pub summary: CheckSummary,
    /// Fingerprint of the rule set used for this run
    pub config_fingerprint: Option<String>,
}

impl CheckReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a violation to the report
    pub fn add_violation(&mut self, violation: Violation) {
        self.summary.violations_by_severity.add(violation.severity);
        self.violations.push(violation);
    }

    /// Whether the report contains any violations
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether the report contains blocking violations (errors)
    pub fn has_errors(&self) -> bool {
        self.summary.violations_by_severity.has_blocking()
    }

    /// Process exit code for this report: zero only when nothing was found
    pub fn exit_code(&self) -> i32 {
        if self.has_violations() {
            1
        } else {
            0
        }
    }

    /// Violations grouped by source file, in path order
    pub fn by_file(&self) -> BTreeMap<&Path, Vec<&Violation>> {
        let mut grouped: BTreeMap<&Path, Vec<&Violation>> = BTreeMap::new();
        for violation in &self.violations {
            grouped.entry(violation.file_path.as_path()).or_default().push(violation);
        }
        grouped
    }

    /// Violations of a single file
    pub fn violations_for<P: AsRef<Path>>(&self, path: P) -> Vec<&Violation> {
        let path = path.as_ref();
        self.violations.iter().filter(|v| v.file_path == path).collect()
    }

    /// Set the number of files checked
    pub fn set_files_checked(&mut self, count: usize) {
        self.summary.total_files = count;
    }

    /// Set the configuration fingerprint
    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Sort violations by file, line and column.
    ///
    /// The sort is stable, so violations at the same position keep the order
    /// in which the evaluator produced them.
    pub fn sort_violations(&mut self) {
        self.violations.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.column.cmp(&b.column))
        });
    }
}

/// Error types that can occur while checking
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    /// Rule or configuration definitions are duplicated or malformed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed lexical input
    #[error("Scan error at {line}:{column}: {message}")]
    Scan { line: u32, column: u32, message: String },

    /// Glob or regex pattern compilation failed
    #[error("Pattern error: {message}")]
    Pattern { message: String },

    /// Checking failed for a specific file
    #[error("Analysis error in {file}: {message}")]
    Analysis { file: String, message: String },

    /// Cache operation failed
    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl StyleError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a pattern error
    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern { message: message.into() }
    }

    /// Create an analysis error
    pub fn analysis(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis { file: file.into(), message: message.into() }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache { message: message.into() }
    }
}

/// Result type for checker operations
pub type StyleResult<T> = Result<T, StyleError>;
