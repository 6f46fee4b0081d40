//! cstyle-guardian - Naming and layout convention checking for C sources
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from infrastructure concerns
//! - Scanner, rules and reporter meet only through tokens and violations
//! - Checking runs are deterministic: same sources and rules, same report

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod domain;
pub mod patterns;
pub mod report;
pub mod rules;
pub mod scanner;

// Re-export main types for convenient access
pub use domain::tokens::{Construct, Token, TokenKind};
pub use domain::violations::{
    CheckReport, CheckSummary, Severity, StyleError, StyleResult, Violation, ViolationCounts,
};

pub use config::{ConfigBuilder, MatcherSpec, RuleDefinition, RuleSet, StyleConfig};

pub use analyzer::{AnalysisOptions, Analyzer};

pub use report::{parse_structured, OutputFormat, ReportFormatter, ReportOptions, StructuredRecord};

pub use cache::{CacheStatistics, FileCache};

pub use rules::{RegistryStats, RuleEvaluator, RuleRegistry};

pub use scanner::Scanner;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main checker providing high-level checking operations
pub struct StyleGuard {
    analyzer: Arc<Analyzer>,
    cache: Option<FileCache>,
    report_formatter: ReportFormatter,
}

/// Options for one checking run
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Whether to reuse results of unchanged files from the cache
    pub use_cache: bool,
    /// Output format for results
    pub output_format: OutputFormat,
    /// Report options
    pub report_options: ReportOptions,
    /// Analysis options
    pub analysis_options: AnalysisOptions,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            output_format: OutputFormat::Text,
            report_options: ReportOptions::default(),
            analysis_options: AnalysisOptions::default(),
        }
    }
}

impl StyleGuard {
    /// Create a checker with the given configuration
    pub fn new_with_config(config: StyleConfig) -> StyleResult<Self> {
        let analyzer = Arc::new(Analyzer::new(config)?);
        let report_formatter = ReportFormatter::default();

        Ok(Self { analyzer, cache: None, report_formatter })
    }

    /// Create a checker with default configuration
    pub fn new() -> StyleResult<Self> {
        Self::new_with_config(StyleConfig::default())
    }

    /// Create a checker loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> StyleResult<Self> {
        let config = StyleConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Create a checker from the configuration file found in `root`, or the defaults
    pub fn discover<P: AsRef<Path>>(root: P) -> StyleResult<Self> {
        match StyleConfig::discover(root) {
            Some(path) => {
                tracing::debug!(config = %path.display(), "using discovered configuration");
                Self::from_config_file(path)
            }
            None => Self::new(),
        }
    }

    /// Enable caching with the specified cache file
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_path: P) -> StyleResult<Self> {
        let mut cache = FileCache::new(cache_path);
        cache.load()?;
        cache.set_config_fingerprint(self.analyzer.rules_fingerprint());
        self.cache = Some(cache);
        Ok(self)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Check files and directories with default options
    pub async fn check<P: AsRef<Path>>(&mut self, paths: Vec<P>) -> StyleResult<CheckReport> {
        self.check_with_options(paths, &CheckOptions::default()).await
    }

    /// Check files and directories on the blocking thread pool
    pub async fn check_with_options<P: AsRef<Path>>(
        &mut self,
        paths: Vec<P>,
        options: &CheckOptions,
    ) -> StyleResult<CheckReport> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let analyzer = Arc::clone(&self.analyzer);
        let options = options.clone();
        let mut cache = self.cache.take();

        let joined = tokio::task::spawn_blocking(move || {
            let cache_ref = if options.use_cache { cache.as_mut() } else { None };
            let report = run_check(&analyzer, cache_ref, &paths, &options.analysis_options);
            (report, cache)
        })
        .await;

        match joined {
            Ok((report, cache)) => {
                self.cache = cache;
                report
            }
            Err(e) => Err(StyleError::analysis("<worker>", format!("Checking task failed: {e}"))),
        }
    }

    /// Check files and directories on the calling thread
    pub fn check_paths<P: AsRef<Path>>(&mut self, paths: &[P], options: &CheckOptions) -> StyleResult<CheckReport> {
        let cache = if options.use_cache { self.cache.as_mut() } else { None };
        run_check(&self.analyzer, cache, paths, &options.analysis_options)
    }

    /// Check a single file
    pub fn check_file<P: AsRef<Path>>(&self, file_path: P) -> StyleResult<CheckReport> {
        let file_path = file_path.as_ref();
        let violations = self.analyzer.check_file(file_path, &AnalysisOptions::default())?;
        Ok(self.analyzer.build_report(violations, 1))
    }

    /// Check source text as if it were stored at `path`
    pub fn check_source<P: AsRef<Path>>(&self, path: P, source: &str) -> CheckReport {
        let path = path.as_ref();
        let evaluator = RuleEvaluator::new(Arc::clone(self.analyzer.registry()));
        self.analyzer.build_report(evaluator.evaluate_source(path, source), 1)
    }

    /// Check entire directory tree
    pub fn check_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> StyleResult<CheckReport> {
        self.analyzer.analyze_directory(root, options)
    }

    /// Format a check report for output
    pub fn format_report(&self, report: &CheckReport, format: OutputFormat) -> StyleResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// Get statistics about the registered rules
    pub fn rule_statistics(&self) -> RegistryStats {
        self.analyzer.rule_stats()
    }

    /// Get cache statistics (if caching is enabled)
    pub fn cache_statistics(&self) -> Option<CacheStatistics> {
        self.cache.as_ref().map(|c| c.statistics())
    }

    /// Clear cache (if enabled)
    pub fn clear_cache(&mut self) -> StyleResult<()> {
        if let Some(cache) = &mut self.cache {
            cache.clear()?;
        }
        Ok(())
    }

    /// Save cache to disk (if enabled and modified)
    pub fn save_cache(&mut self) -> StyleResult<()> {
        if let Some(cache) = &mut self.cache {
            cache.save()?;
        }
        Ok(())
    }

    /// Cleanup cache by removing entries for non-existent files
    pub fn cleanup_cache(&mut self) -> StyleResult<Option<usize>> {
        if let Some(cache) = &mut self.cache { Ok(Some(cache.cleanup()?)) } else { Ok(None) }
    }
}

/// One checking run, reusing cached results of unchanged files
fn run_check<P: AsRef<Path>>(
    analyzer: &Analyzer,
    cache: Option<&mut FileCache>,
    paths: &[P],
    options: &AnalysisOptions,
) -> StyleResult<CheckReport> {
    let files = analyzer.discover_files(paths, options)?;

    let Some(cache) = cache else {
        let violations = analyzer.analyze_files(&files, options)?;
        return Ok(analyzer.build_report(violations, files.len()));
    };

    let fingerprint = analyzer.rules_fingerprint();
    let mut violations = Vec::new();
    let mut stale = Vec::new();

    for file_path in &files {
        match cache.cached_violations(file_path, &fingerprint) {
            Ok(Some(cached)) => violations.extend(cached),
            Ok(None) => stale.push(file_path.clone()),
            Err(e) => {
                tracing::debug!("Cache lookup failed for {}: {}", file_path.display(), e);
                stale.push(file_path.clone());
            }
        }
    }
    tracing::debug!(cached = files.len() - stale.len(), stale = stale.len(), "cache lookup finished");

    let fresh = analyzer.analyze_files(&stale, options)?;

    let mut by_file: BTreeMap<&Path, Vec<Violation>> =
        stale.iter().map(|file_path| (file_path.as_path(), Vec::new())).collect();
    for violation in &fresh {
        if let Some(entry) = by_file.get_mut(violation.file_path.as_path()) {
            entry.push(violation.clone());
        }
    }
    for (file_path, file_violations) in by_file {
        // unreadable files are retried on the next run
        if file_violations.iter().any(|v| v.rule_id == rules::IO_ERROR) {
            continue;
        }
        if let Err(e) = cache.update_entry(file_path, &file_violations, &fingerprint) {
            tracing::warn!("Failed to update cache for {}: {}", file_path.display(), e);
        }
    }

    violations.extend(fresh);
    Ok(analyzer.build_report(violations, files.len()))
}

/// Convenience function to create a checker with default settings
pub fn create_guard() -> StyleResult<StyleGuard> {
    StyleGuard::new()
}

/// Convenience function to check files with default settings
pub async fn check_files<P: AsRef<Path>>(files: Vec<P>) -> StyleResult<CheckReport> {
    let mut guard = StyleGuard::new()?;
    guard.check(files).await
}

/// Convenience function to check a directory with default settings
pub fn check_directory<P: AsRef<Path>>(directory: P) -> StyleResult<CheckReport> {
    let guard = StyleGuard::new()?;
    guard.check_directory(directory, &AnalysisOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const WELL_FORMED_HEADER: &str = "\
#ifndef __APP_LOG_H__
#define __APP_LOG_H__

#include <stdio.h>

#define APP_LOG_MAX_LEN 128

typedef enum LogLevel {
    LOG_LEVEL_DEBUG,
    LOG_LEVEL_ERROR
} LogLevel_t;

typedef struct LogEntry {
    int lineCount;
    char strText[APP_LOG_MAX_LEN];
} LogEntry_t;

void appLogWrite(const char *strMessage);

#endif
";

    const WELL_FORMED_SOURCE: &str = "\
#include <stdio.h>
#include <string.h>

#include \"app_log.h\"

static int entryTotal = 0;

static void flushBuffer(void)
{
    fflush(stdout);
}

void appLogWrite(const char *strMessage)
{
    if (strMessage != NULL) {
        printf(\"%s\\n\", strMessage);
        entryTotal++;
    }
    flushBuffer();
}
";

    fn write_project(root: &Path) -> StyleResult<()> {
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/app_log.h"), WELL_FORMED_HEADER)?;
        fs::write(root.join("src/app_log.c"), WELL_FORMED_SOURCE)?;
        fs::write(
            root.join("src/device.c"),
            "#include <curl/curl.h>\n#include <stdio.h>\n\nint runningDevice;\nchar name[16];\n",
        )?;
        fs::write(root.join("src/net.h"), "void netInit(void);\n")?;
        Ok(())
    }

    #[test]
    fn test_guard_creation() {
        let guard = StyleGuard::new().unwrap();
        let stats = guard.rule_statistics();

        assert!(stats.enabled_rules > 0);
        assert!(guard.cache_statistics().is_none());
    }

    #[test]
    fn test_well_formed_files_have_no_violations() {
        let guard = StyleGuard::new().unwrap();

        let header = guard.check_source("src/app_log.h", WELL_FORMED_HEADER);
        assert_eq!(header.violations, Vec::new());

        let source = guard.check_source("src/app_log.c", WELL_FORMED_SOURCE);
        assert_eq!(source.violations, Vec::new());
        assert_eq!(source.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_check_reports_expected_violations() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path())?;

        let mut guard = StyleGuard::new()?;
        let report = guard.check(vec![temp_dir.path()]).await?;

        assert_eq!(report.summary.total_files, 4);
        assert_eq!(report.exit_code(), 1);

        let ids: Vec<_> = report.violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["include.order", "variable.verb-led", "variable.string-hint", "header.guard"]
        );
        let order = &report.violations[0];
        assert!(order.file_path.ends_with("src/device.c"));
        assert_eq!(order.line, 2);
        assert!(report.violations_for(temp_dir.path().join("src/app_log.c")).is_empty());
        Ok(())
    }

    #[test]
    fn test_reports_are_deterministic() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path())?;
        let formatter = ReportFormatter::new(ReportOptions { use_colors: false, ..Default::default() });

        let first = check_directory(temp_dir.path())?;
        let second = check_directory(temp_dir.path())?;

        for format in [OutputFormat::Text, OutputFormat::Structured] {
            assert_eq!(formatter.format_report(&first, format)?, formatter.format_report(&second, format)?);
        }
        Ok(())
    }

    #[test]
    fn test_structured_round_trip() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path())?;
        let report = check_directory(temp_dir.path())?;
        let guard = StyleGuard::new()?;

        let text = guard.format_report(&report, OutputFormat::Text)?;
        let records = parse_structured(&guard.format_report(&report, OutputFormat::Structured)?)?;

        assert_eq!(records.len(), text.lines().count() - 1);
        assert_eq!(records.len(), report.violations.len());
        Ok(())
    }

    #[test]
    fn test_cached_run_matches_fresh_run() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_project(root)?;
        let cache_path = root.join(".cstyle/cache.json");
        let options = CheckOptions::default();

        let mut guard = StyleGuard::new()?.with_cache(&cache_path)?;
        let fresh = guard.check_paths(&[root], &options)?;
        guard.save_cache()?;

        let mut reloaded = StyleGuard::new()?.with_cache(&cache_path)?;
        let cached = reloaded.check_paths(&[root], &options)?;

        assert_eq!(fresh, cached);
        let stats = reloaded.cache_statistics().unwrap();
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.cache_hits, 4);
        Ok(())
    }

    #[test]
    fn test_check_single_file() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("device.c");
        fs::write(&test_file, "int runningDevice;\n")?;

        let report = StyleGuard::new()?.check_file(&test_file)?;

        assert_eq!(report.summary.total_files, 1);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].rule_id, "variable.verb-led");
        Ok(())
    }

    #[tokio::test]
    async fn test_convenience_functions() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let clean = temp_dir.path().join("clean.c");
        fs::write(&clean, "int deviceCount;\n")?;

        let guard = create_guard()?;
        assert!(guard.rule_statistics().enabled_rules > 0);

        let report = check_files(vec![&clean]).await?;
        assert_eq!(report.summary.total_files, 1);
        assert!(!report.has_violations());
        Ok(())
    }
}
