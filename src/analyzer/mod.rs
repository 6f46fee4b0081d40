//! Main checking orchestrator for cstyle-guardian
//!
//! Architecture: Domain Services - Analyzer orchestrates complete checking runs
//! - Coordinates path filtering, scanning, rule evaluation and result aggregation
//! - Provides clean interface for checking single files or directory trees
//! - One unit of work per file; a failing file never stops the others

pub mod c;

use crate::analyzer::c::CAnalyzer;
use crate::config::StyleConfig;
use crate::domain::violations::{CheckReport, StyleError, StyleResult, Violation};
use crate::patterns::PathFilter;
use crate::rules::{RegistryStats, RuleRegistry};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main analyzer that orchestrates the entire checking process
pub struct Analyzer {
    /// Configuration for this analyzer
    config: StyleConfig,
    /// Rules in force, shared read-only with every worker
    registry: Arc<RuleRegistry>,
    /// Path filter for determining which files to check
    path_filter: PathFilter,
    /// C-specific analyzer
    c_analyzer: CAnalyzer,
}

/// Options for customizing checking behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to use parallel processing
    pub parallel: bool,
    /// Maximum number of files to check
    pub max_files: Option<usize>,
    /// Abort on the first unreadable file instead of reporting it
    pub fail_fast: bool,
    /// Additional paths to exclude (temporary)
    pub exclude_patterns: Vec<String>,
    /// Whether to ignore .cstyleignore files
    pub ignore_ignore_files: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_files: None,
            fail_fast: false,
            exclude_patterns: Vec::new(),
            ignore_ignore_files: false,
        }
    }
}

impl Analyzer {
    /// Create a new analyzer with the given configuration
    pub fn new(config: StyleConfig) -> StyleResult<Self> {
        config.validate()?;
        let registry = Arc::new(RuleRegistry::from_config(&config)?);

        let path_filter = Self::build_filter(&config, config.ignore_file.clone())?;
        let c_analyzer = CAnalyzer::with_extensions(Arc::clone(&registry), &config.extensions);

        Ok(Self { config, registry, path_filter, c_analyzer })
    }

    /// Create an analyzer with default configuration
    pub fn with_defaults() -> StyleResult<Self> {
        Self::new(StyleConfig::default())
    }

    fn build_filter(config: &StyleConfig, ignore_file: Option<String>) -> StyleResult<PathFilter> {
        let ignore_file = ignore_file.filter(|name| !name.is_empty());
        Ok(PathFilter::new(config.exclude_paths.clone(), ignore_file)
            .map_err(|e| StyleError::config(format!("Failed to create path filter: {e}")))?
            .with_extensions(&config.extensions))
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Check a single file; unreadable files are an error
    pub fn analyze_file<P: AsRef<Path>>(&self, file_path: P) -> StyleResult<Vec<Violation>> {
        let file_path = file_path.as_ref();

        let bytes = fs::read(file_path)?;
        let content = String::from_utf8_lossy(&bytes);

        self.c_analyzer.analyze(file_path, &content)
    }

    /// Check a single file, turning a read failure into an `io-error` violation
    pub fn check_file(&self, file_path: &Path, options: &AnalysisOptions) -> StyleResult<Vec<Violation>> {
        match self.analyze_file(file_path) {
            Err(StyleError::Io { source }) if !options.fail_fast => {
                tracing::warn!("Cannot read {}: {}", file_path.display(), source);
                Ok(vec![self.registry.io_violation(file_path, &source)])
            }
            Err(StyleError::Io { source }) => Err(StyleError::analysis(
                file_path.display().to_string(),
                format!("Failed to read file: {source}"),
            )),
            other => other,
        }
    }

    /// Expand paths into the sorted, de-duplicated list of files to check
    pub fn discover_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> StyleResult<Vec<PathBuf>> {
        let filter = if options.ignore_ignore_files || !options.exclude_patterns.is_empty() {
            let ignore_file =
                if options.ignore_ignore_files { None } else { self.config.ignore_file.clone() };
            let mut filter = Self::build_filter(&self.config, ignore_file)?;
            for pattern in &options.exclude_patterns {
                filter.add_pattern(pattern.clone())?;
            }
            filter
        } else {
            self.path_filter.clone()
        };

        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();

            if path.is_dir() {
                files.extend(filter.find_files(path)?);
            } else if !path.exists() || self.c_analyzer.handles_file(path) {
                // missing files are kept so they are reported as unreadable
                if filter.should_analyze(path)? {
                    files.push(path.to_path_buf());
                }
            } else {
                tracing::warn!("Skipping {}: not a C source or header", path.display());
            }
        }

        files.sort();
        files.dedup();

        if let Some(max_files) = options.max_files {
            files.truncate(max_files);
        }

        tracing::debug!(files = files.len(), "discovered files");
        Ok(files)
    }

    /// Check a list of files, in parallel when requested, keeping file order
    pub fn analyze_files(&self, files: &[PathBuf], options: &AnalysisOptions) -> StyleResult<Vec<Violation>> {
        let results: Vec<StyleResult<Vec<Violation>>> = if options.parallel && files.len() > 1 {
            files.par_iter().map(|file_path| self.check_file(file_path, options)).collect()
        } else {
            files.iter().map(|file_path| self.check_file(file_path, options)).collect()
        };

        let mut all_violations = Vec::new();
        for result in results {
            all_violations.extend(result?);
        }
        Ok(all_violations)
    }

    /// Check files and directories and return a complete report
    pub fn analyze_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> StyleResult<CheckReport> {
        let files = self.discover_files(paths, options)?;
        let violations = self.analyze_files(&files, options)?;
        Ok(self.build_report(violations, files.len()))
    }

    /// Check a directory tree and return a report
    pub fn analyze_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> StyleResult<CheckReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }

    /// Assemble the final, sorted report
    pub fn build_report(&self, violations: Vec<Violation>, files_checked: usize) -> CheckReport {
        let mut report = CheckReport::new();
        for violation in violations {
            report.add_violation(violation);
        }

        report.set_files_checked(files_checked);
        report.set_config_fingerprint(self.rules_fingerprint());
        report.sort_violations();

        tracing::info!(
            files = files_checked,
            violations = report.violations.len(),
            "check finished"
        );
        report
    }

    /// Fingerprint of the effective rule set, for cache validation
    pub fn rules_fingerprint(&self) -> String {
        self.registry.fingerprint().to_string()
    }

    /// Get statistics about the registered rules
    pub fn rule_stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}

/// Trait for language-specific file analyzers
pub trait FileAnalyzer {
    /// Analyze a file and return violations
    fn analyze(&self, file_path: &Path, content: &str) -> StyleResult<Vec<Violation>>;

    /// Check if this analyzer handles the given file type
    fn handles_file(&self, file_path: &Path) -> bool;
}
