//! cstyle-guardian CLI - Command-line interface for C convention checking
//!
//! Architecture: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like terminal output, logging setup and process exit codes
//! - Exit status: 0 clean, 1 violations found, 2 configuration or usage error

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cstyle_guardian::cache::DEFAULT_CACHE_PATH;
use cstyle_guardian::{
    AnalysisOptions, CheckOptions, Construct, FileCache, OutputFormat, ReportFormatter, ReportOptions,
    RuleRegistry, Severity, StyleConfig, StyleError, StyleGuard,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// cstyle-guardian - naming and layout conventions for C sources
#[derive(Parser)]
#[command(name = "cstyle-guardian")]
#[command(version)]
#[command(about = "Checks C sources and headers against a naming and layout style guide")]
#[command(
    long_about = "cstyle-guardian scans .c and .h files and reports every deviation from the configured naming and layout conventions, one line per violation, followed by a severity summary."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files for convention violations
    Check {
        /// Paths to check (files or directories)
        paths: Vec<PathBuf>,

        /// Output format (defaults to the configured format, then text)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormatArg>,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of violations to report
        #[arg(long)]
        max_violations: Option<usize>,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Ignore .cstyleignore files
        #[arg(long)]
        no_ignore: bool,

        /// Disable parallel processing
        #[arg(long)]
        no_parallel: bool,

        /// Abort on the first unreadable file
        #[arg(long)]
        fail_fast: bool,

        /// Reuse results of unchanged files
        #[arg(long)]
        cache: bool,

        /// Custom cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Watch for file changes and run checks automatically
    Watch {
        /// Path to watch (defaults to current directory)
        path: Option<PathBuf>,

        /// File patterns to watch (glob patterns)
        #[arg(short, long, action = clap::ArgAction::Append)]
        pattern: Vec<String>,

        /// Debounce delay in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },

    /// Manage the result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// List registered rules
    Rules {
        /// Show only enabled rules
        #[arg(long)]
        enabled_only: bool,

        /// Filter by construct (variable, function, macro, ...)
        #[arg(long)]
        construct: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache statistics
    Stats {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Clear the cache
    Clear {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Clean up stale cache entries
    Cleanup {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq, Debug)]
enum OutputFormatArg {
    Text,
    Structured,
    Human,
    Sarif,
    Junit,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Structured => OutputFormat::Structured,
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Settings of one `check` invocation
struct CheckArgs {
    paths: Vec<PathBuf>,
    format: Option<OutputFormatArg>,
    severity: Option<SeverityArg>,
    max_violations: Option<usize>,
    exclude: Vec<String>,
    no_ignore: bool,
    no_parallel: bool,
    fail_fast: bool,
    cache: bool,
    cache_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    }
}

async fn run_command(cli: Cli) -> Result<i32> {
    let use_colors = !cli.no_color;
    match cli.command {
        Commands::Check {
            paths,
            format,
            severity,
            max_violations,
            exclude,
            no_ignore,
            no_parallel,
            fail_fast,
            cache,
            cache_file,
        } => {
            let args = CheckArgs {
                paths,
                format,
                severity,
                max_violations,
                exclude,
                no_ignore,
                no_parallel,
                fail_fast,
                cache,
                cache_file,
            };
            run_check(cli.config, args, use_colors).await
        }
        Commands::Watch { path, pattern, delay } => run_watch(cli.config, path, pattern, delay, use_colors).await,
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Explain { rule_id } => run_explain(cli.config, &rule_id),
        Commands::Cache { action } => run_cache_command(action),
        Commands::Rules { enabled_only, construct } => run_list_rules(cli.config, enabled_only, construct),
    }
}

/// Load the given configuration file, or the one found in the working directory
fn load_config(config_path: Option<&Path>) -> Result<StyleConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => StyleConfig::discover("."),
    };

    match path {
        Some(path) => {
            tracing::debug!(config = %path.display(), "loading configuration");
            StyleConfig::load_from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(StyleConfig::default()),
    }
}

fn resolve_format(config: &StyleConfig, format: Option<OutputFormatArg>) -> Result<OutputFormat> {
    if let Some(format) = format {
        return Ok(format.into());
    }
    match config.output_format.as_deref() {
        Some(name) => match OutputFormat::parse(name) {
            Some(format) => Ok(format),
            None => bail!(
                "Unknown output format '{}' in configuration (expected one of: {})",
                name,
                OutputFormat::all_formats().join(", ")
            ),
        },
        None => Ok(OutputFormat::Text),
    }
}

async fn run_check(config_path: Option<PathBuf>, args: CheckArgs, use_colors: bool) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let format = resolve_format(&config, args.format)?;

    let report_options = ReportOptions {
        use_colors: use_colors && cfg!(feature = "colors"),
        max_violations: args.max_violations,
        min_severity: args.severity.map(Severity::from),
        ..Default::default()
    };

    let mut guard = StyleGuard::new_with_config(config)
        .context("Invalid configuration")?
        .with_report_formatter(ReportFormatter::new(report_options.clone()));

    if args.cache {
        let cache_path = args.cache_file.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));
        guard = guard.with_cache(&cache_path).context("Failed to open cache")?;
    }

    let paths = if args.paths.is_empty() { vec![PathBuf::from(".")] } else { args.paths };

    let options = CheckOptions {
        use_cache: args.cache,
        output_format: format,
        report_options,
        analysis_options: AnalysisOptions {
            parallel: !args.no_parallel,
            fail_fast: args.fail_fast,
            exclude_patterns: args.exclude,
            ignore_ignore_files: args.no_ignore,
            ..Default::default()
        },
    };

    let report = guard.check_with_options(paths, &options).await?;

    let formatted = guard.format_report(&report, options.output_format)?;
    print!("{formatted}");

    if args.cache {
        if let Some(stats) = guard.cache_statistics() {
            tracing::info!("{}", stats.format_display());
        }
        guard.save_cache().context("Failed to save cache")?;
    }

    Ok(report.exit_code())
}

async fn run_watch(
    config_path: Option<PathBuf>,
    path: Option<PathBuf>,
    patterns: Vec<String>,
    delay_ms: u64,
    use_colors: bool,
) -> Result<i32> {
    use notify::{Event, RecursiveMode, Result as NotifyResult, Watcher};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    let watch_path = path.unwrap_or_else(|| PathBuf::from("."));
    let watch_patterns = if patterns.is_empty() {
        vec!["**/*.c".to_string(), "**/*.h".to_string()]
    } else {
        patterns
    };
    let globs = watch_patterns
        .iter()
        .map(|pattern| glob::Pattern::new(pattern).with_context(|| format!("Invalid watch pattern '{pattern}'")))
        .collect::<Result<Vec<_>>>()?;

    eprintln!("Watching {} ({})", watch_path.display(), watch_patterns.join(", "));
    eprintln!("Press Ctrl+C to stop watching");

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: NotifyResult<Event>| match res {
        Ok(event) => {
            if let Err(e) = tx.send(event) {
                tracing::warn!("Dropping file event: {}", e);
            }
        }
        Err(e) => tracing::warn!("Watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&watch_path, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch path '{}'", watch_path.display()))?;

    let debounce = Duration::from_millis(delay_ms);
    let mut config_path = config_path;
    run_watch_check(config_path.as_deref(), &watch_path, use_colors).await;
    let mut last_run = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if let Some(changed) = config_change(&event) {
                    eprintln!("Configuration changed: {}", changed.display());
                    config_path = Some(changed);
                } else if !should_trigger_check(&event, &globs) || last_run.elapsed() < debounce {
                    continue;
                }
                run_watch_check(config_path.as_deref(), &watch_path, use_colors).await;
                last_run = Instant::now();
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::warn!("File watcher disconnected");
                break;
            }
        }
    }

    Ok(0)
}

/// Whether an event touches a watched source file
fn should_trigger_check(event: &notify::Event, patterns: &[glob::Pattern]) -> bool {
    use notify::EventKind;

    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        let path_str = path.to_string_lossy();
        patterns.iter().any(|pattern| pattern.matches(&path_str))
    })
}

/// Configuration file touched by an event, if any
fn config_change(event: &notify::Event) -> Option<PathBuf> {
    use notify::EventKind;

    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return None;
    }
    event
        .paths
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| cstyle_guardian::config::CONFIG_FILE_NAMES.contains(&name))
        })
        .cloned()
}

/// One check in watch mode; failures are printed, never fatal
async fn run_watch_check(config_path: Option<&Path>, watch_path: &Path, use_colors: bool) {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}; using the default configuration");
            StyleConfig::default()
        }
    };

    let guard = match StyleGuard::new_with_config(config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };
    let mut guard = guard.with_report_formatter(ReportFormatter::new(ReportOptions {
        use_colors: use_colors && cfg!(feature = "colors"),
        ..Default::default()
    }));

    let options = CheckOptions { use_cache: false, output_format: OutputFormat::Human, ..Default::default() };
    match guard.check_with_options(vec![watch_path], &options).await {
        Ok(report) => match guard.format_report(&report, OutputFormat::Human) {
            Ok(formatted) => println!("{formatted}"),
            Err(e) => eprintln!("Failed to format report: {e}"),
        },
        Err(e) => eprintln!("Check failed: {e}"),
    }
}

fn run_validate_config(config_path: Option<PathBuf>) -> Result<i32> {
    let config_path = match config_path.or_else(|| StyleConfig::discover(".")) {
        Some(path) => path,
        None => bail!(
            "No configuration file found (looked for {})",
            cstyle_guardian::config::CONFIG_FILE_NAMES.join(", ")
        ),
    };

    println!("Validating configuration: {}", config_path.display());

    let result = StyleConfig::load_from_file(&config_path).and_then(|config| {
        let registry = RuleRegistry::from_config(&config)?;
        Ok((config, registry))
    });

    match result {
        Ok((config, registry)) => {
            let stats = registry.stats();
            println!("Configuration is valid");
            println!("  Rule set: {}", config.rule_set.as_str());
            println!(
                "  Rules: {} total, {} enabled, {} custom",
                stats.total_rules(),
                stats.enabled_rules,
                stats.custom_rules
            );
            println!("  Exclude patterns: {}", config.exclude_paths.len());
            println!("  Fingerprint: {}", registry.fingerprint());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(2)
        }
    }
}

fn run_explain(config_path: Option<PathBuf>, rule_id: &str) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let registry = RuleRegistry::from_config(&config)?;

    let Some(rule) = registry.get(rule_id) else {
        eprintln!("Rule '{rule_id}' not found");
        eprintln!();
        eprintln!("Available rules:");
        for rule in registry.rules() {
            eprintln!("  - {}", rule.id);
        }
        return Ok(1);
    };

    println!("Rule: {}", rule.id);
    println!("Origin: {}", rule.origin);
    println!("Target: {}", rule.target);
    println!("Matcher: {}", rule.kind());
    println!("Severity: {}", rule.severity.as_str());
    println!("Enabled: {}", rule.enabled);
    if let Some(description) = &rule.description {
        println!();
        println!("{description}");
    }
    println!();
    println!("Message template:");
    println!("  {}", rule.message);
    if let Some(spec) = &rule.spec {
        let yaml = serde_yaml::to_string(spec).map_err(|e| StyleError::config(e.to_string()))?;
        println!();
        println!("Matcher definition:");
        for line in yaml.lines() {
            println!("  {line}");
        }
    }

    Ok(0)
}

fn run_cache_command(action: CacheCommands) -> Result<i32> {
    let default_path = || PathBuf::from(DEFAULT_CACHE_PATH);
    match action {
        CacheCommands::Stats { cache_file } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            if !cache_path.exists() {
                println!("No cache file found at {}", cache_path.display());
                return Ok(1);
            }

            let mut cache = FileCache::new(&cache_path);
            cache.load()?;

            let stats = cache.statistics();
            println!("Cache Statistics");
            println!("  File: {}", cache_path.display());
            println!("  {}", stats.format_display());
            println!("  Cached violations: {}", stats.cached_violations);
            println!("  Created: {}", stats.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Updated: {}", stats.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
            Ok(0)
        }
        CacheCommands::Clear { cache_file } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            let mut cache = FileCache::new(&cache_path);
            cache.clear()?;

            println!("Cache cleared: {}", cache_path.display());
            Ok(0)
        }
        CacheCommands::Cleanup { cache_file } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            if !cache_path.exists() {
                println!("No cache file found at {}", cache_path.display());
                return Ok(1);
            }

            let mut cache = FileCache::new(&cache_path);
            cache.load()?;
            let removed = cache.cleanup()?;
            cache.save()?;

            println!("Cleaned up {removed} stale cache entries");
            Ok(0)
        }
    }
}

fn run_list_rules(config_path: Option<PathBuf>, enabled_only: bool, construct: Option<String>) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let registry = RuleRegistry::from_config(&config)?;

    let construct = match construct {
        Some(name) => match Construct::ALL.iter().find(|c| c.as_str() == name) {
            Some(construct) => Some(*construct),
            None => bail!("Unknown construct '{name}'"),
        },
        None => None,
    };

    println!("Rules ({} profile)", config.rule_set.as_str());
    for rule in registry.rules() {
        if enabled_only && !rule.enabled {
            continue;
        }
        if construct.map_or(false, |c| c != rule.target) {
            continue;
        }
        let status = if rule.enabled { "on " } else { "off" };
        println!(
            "  [{}] {:<24} {:<14} {:<8} {}",
            status,
            rule.id,
            rule.target.as_str(),
            rule.severity.as_str(),
            rule.description.as_deref().unwrap_or(&rule.message)
        );
    }

    Ok(0)
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn check_args(paths: Vec<PathBuf>) -> CheckArgs {
        CheckArgs {
            paths,
            format: Some(OutputFormatArg::Structured),
            severity: None,
            max_violations: None,
            exclude: vec![],
            no_ignore: false,
            no_parallel: false,
            fail_fast: false,
            cache: false,
            cache_file: None,
        }
    }

    #[tokio::test]
    async fn test_check_command_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        let dirty = temp_dir.path().join("device.c");
        let clean = temp_dir.path().join("clean.c");

        fs::write(&dirty, "int runningDevice;\n").unwrap();
        fs::write(&clean, "int deviceCount;\n").unwrap();

        let result = run_check(None, check_args(vec![dirty]), false).await;
        assert_eq!(result.unwrap(), 1);

        let result = run_check(None, check_args(vec![clean]), false).await;
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_with_broken_config_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cstyle.yaml");
        fs::write(&config_file, "version: \"9.9\"\n").unwrap();

        let result = run_check(Some(config_file), check_args(vec![temp_dir.path().to_path_buf()]), false).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cstyle.yaml");

        let config = StyleConfig::default();
        fs::write(&config_file, config.to_yaml().unwrap()).unwrap();
        assert_eq!(run_validate_config(Some(config_file.clone())).unwrap(), 0);

        fs::write(&config_file, "rules:\n  - id: broken\n    target: macro\n    matcher: { type: regex, pattern: \"[\" }\n    message: m\n").unwrap();
        assert_eq!(run_validate_config(Some(config_file)).unwrap(), 2);
    }

    #[test]
    fn test_format_resolution() {
        let mut config = StyleConfig::default();
        assert_eq!(resolve_format(&config, None).unwrap(), OutputFormat::Text);

        config.output_format = Some("sarif".into());
        assert_eq!(resolve_format(&config, None).unwrap(), OutputFormat::Sarif);
        assert_eq!(resolve_format(&config, Some(OutputFormatArg::Github)).unwrap(), OutputFormat::GitHub);

        config.output_format = Some("xml".into());
        assert!(resolve_format(&config, None).is_err());
    }

    #[test]
    fn test_explain_rule() {
        assert_eq!(run_explain(None, "variable.verb-led").unwrap(), 0);
        assert_eq!(run_explain(None, "nonexistent.rule").unwrap(), 1);
    }

    #[test]
    fn test_list_rules() {
        assert_eq!(run_list_rules(None, false, None).unwrap(), 0);
        assert_eq!(run_list_rules(None, true, Some("macro".to_string())).unwrap(), 0);
        assert!(run_list_rules(None, false, Some("class".to_string())).is_err());
    }
}
