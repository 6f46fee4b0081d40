//! Report generation with multiple output formats
//!
//! Architecture: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - CheckReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Every format except `github` ends with the severity summary, even for clean runs

use crate::domain::violations::{CheckReport, Severity, StyleError, StyleResult, Violation};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::PathBuf;

/// Supported output formats for check reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `path:line:col: [rule] message` line per violation
    #[default]
    Text,
    /// JSON records for programmatic consumption
    Structured,
    /// Human-readable format grouped by file, with colors and context
    Human,
    /// SARIF 2.1.0 for code scanning tools
    Sarif,
    /// JUnit XML format for CI/CD integration
    Junit,
    /// GitHub Actions workflow annotations
    GitHub,
}

impl OutputFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "structured" | "json" => Some(Self::Structured),
            "human" => Some(Self::Human),
            "sarif" => Some(Self::Sarif),
            "junit" => Some(Self::Junit),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["text", "structured", "human", "sarif", "junit", "github"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show the offending source line (for human format)
    pub show_context: bool,
    /// Whether to show suggested fixes (for human format)
    pub show_suggestions: bool,
    /// Maximum number of violations to include
    pub max_violations: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: cfg!(feature = "colors"),
            show_context: true,
            show_suggestions: true,
            max_violations: None,
            min_severity: None,
        }
    }
}

/// One violation in the structured format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecord {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
}

impl From<&Violation> for StructuredRecord {
    fn from(violation: &Violation) -> Self {
        Self {
            path: violation.file_path.clone(),
            line: violation.line,
            column: violation.column,
            rule_id: violation.rule_id.clone(),
            severity: violation.severity,
            message: violation.message.clone(),
        }
    }
}

/// Summary block of the structured format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSummary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_fingerprint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StructuredDocument {
    violations: Vec<StructuredRecord>,
    summary: StructuredSummary,
}

/// Parse a structured report back into its violation records
pub fn parse_structured(input: &str) -> StyleResult<Vec<StructuredRecord>> {
    let document: StructuredDocument = serde_json::from_str(input)
        .map_err(|e| StyleError::analysis("<report>", format!("Invalid structured report: {e}")))?;
    Ok(document.violations)
}

#[derive(Debug, Clone, Copy)]
enum Paint {
    Red,
    Yellow,
    Cyan,
    Green,
    Dim,
    Bold,
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a check report in the specified format
    pub fn format_report(&self, report: &CheckReport, format: OutputFormat) -> StyleResult<String> {
        let violations = self.filter_violations(&report.violations);

        match format {
            OutputFormat::Text => Ok(self.format_text(report, &violations)),
            OutputFormat::Structured => self.format_structured(report, &violations),
            OutputFormat::Human => Ok(self.format_human(report, &violations)),
            OutputFormat::Sarif => self.format_sarif(&violations),
            OutputFormat::Junit => Ok(self.format_junit(report, &violations)),
            OutputFormat::GitHub => Ok(self.format_github(report, &violations)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &CheckReport,
        format: OutputFormat,
        mut writer: W,
    ) -> StyleResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// The `N errors, N warnings, N info in M files` line
    pub fn summary_line(report: &CheckReport) -> String {
        let files = report.summary.total_files;
        format!(
            "{} in {} file{}",
            report.summary.violations_by_severity.describe(),
            files,
            if files == 1 { "" } else { "s" }
        )
    }

    /// Filter violations based on report options
    fn filter_violations<'a>(&self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        let mut filtered: Vec<&Violation> = violations
            .iter()
            .filter(|v| self.options.min_severity.map_or(true, |min| v.severity >= min))
            .collect();

        if let Some(max) = self.options.max_violations {
            filtered.truncate(max);
        }

        filtered
    }

    fn format_text(&self, report: &CheckReport, violations: &[&Violation]) -> String {
        let mut output = String::new();
        for violation in violations {
            output.push_str(&violation.format_display());
            output.push('\n');
        }
        output.push_str(&Self::summary_line(report));
        output.push('\n');
        output
    }

    fn format_structured(&self, report: &CheckReport, violations: &[&Violation]) -> StyleResult<String> {
        let counts = &report.summary.violations_by_severity;
        let document = StructuredDocument {
            violations: violations.iter().map(|v| StructuredRecord::from(*v)).collect(),
            summary: StructuredSummary {
                files: report.summary.total_files,
                errors: counts.error,
                warnings: counts.warning,
                info: counts.info,
                rules_fingerprint: report.config_fingerprint.clone(),
            },
        };

        let mut output = serde_json::to_string_pretty(&document)
            .map_err(|e| StyleError::analysis("<report>", format!("JSON serialization failed: {e}")))?;
        output.push('\n');
        Ok(output)
    }

    /// Format report in human-readable format
    fn format_human(&self, report: &CheckReport, violations: &[&Violation]) -> String {
        let mut output = String::new();

        if violations.is_empty() {
            output.push_str(&format!("{}\n", self.paint("No style violations found", Paint::Green)));
        } else {
            let header = if report.has_errors() {
                self.paint("Style violations found", Paint::Red)
            } else {
                self.paint("Style violations found", Paint::Yellow)
            };
            output.push_str(&format!("{header}\n\n"));

            let mut by_file: std::collections::BTreeMap<&std::path::Path, Vec<&Violation>> =
                std::collections::BTreeMap::new();
            for violation in violations {
                by_file.entry(&violation.file_path).or_default().push(violation);
            }

            for (file_path, file_violations) in by_file {
                output.push_str(&format!("{}\n", self.paint(&file_path.display().to_string(), Paint::Bold)));

                for violation in file_violations {
                    let severity_paint = match violation.severity {
                        Severity::Error => Paint::Red,
                        Severity::Warning => Paint::Yellow,
                        Severity::Info => Paint::Cyan,
                    };

                    output.push_str(&format!(
                        "  {} [{}] {}: {}\n",
                        self.paint(&format!("{}:{}", violation.line, violation.column), Paint::Dim),
                        self.paint(violation.severity.as_str(), severity_paint),
                        violation.rule_id,
                        violation.message
                    ));

                    if self.options.show_context {
                        if let Some(context) = &violation.context {
                            output.push_str(&format!("    {}\n", self.paint(&format!("| {context}"), Paint::Dim)));
                        }
                    }

                    if self.options.show_suggestions {
                        if let Some(suggestion) = &violation.suggested_fix {
                            output.push_str(&format!(
                                "    {}\n",
                                self.paint(&format!("suggestion: {suggestion}"), Paint::Green)
                            ));
                        }
                    }
                }
                output.push('\n');
            }
        }

        output.push_str(&format!("{} {}\n", self.paint("Summary:", Paint::Bold), Self::summary_line(report)));
        output
    }

    /// Format report in SARIF format
    fn format_sarif(&self, violations: &[&Violation]) -> StyleResult<String> {
        let sarif_results: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                let level = match v.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                    Severity::Info => "note",
                };

                serde_json::json!({
                    "ruleId": v.rule_id,
                    "level": level,
                    "message": {
                        "text": v.message
                    },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": {
                                "uri": v.file_path.display().to_string().replace('\\', "/")
                            },
                            "region": {
                                "startLine": v.line,
                                "startColumn": v.column
                            }
                        }
                    }]
                })
            })
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": sarif_results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| StyleError::analysis("<report>", format!("SARIF serialization failed: {e}")))
    }

    /// Format report in JUnit XML format
    fn format_junit(&self, report: &CheckReport, violations: &[&Violation]) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures = violations.iter().filter(|v| v.severity == Severity::Error).count();

        xml.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\">\n",
            env!("CARGO_PKG_NAME"),
            violations.len(),
            failures
        ));
        xml.push_str(&format!(
            "  <properties><property name=\"summary\" value=\"{}\"/></properties>\n",
            escape_xml(&Self::summary_line(report))
        ));

        for violation in violations {
            xml.push_str(&format!(
                "  <testcase classname=\"{}\" name=\"{}:{}:{}\">\n",
                escape_xml(&violation.rule_id),
                escape_xml(&violation.file_path.display().to_string()),
                violation.line,
                violation.column
            ));

            if violation.severity == Severity::Error {
                xml.push_str(&format!("    <failure message=\"{}\">\n", escape_xml(&violation.message)));
                if let Some(context) = &violation.context {
                    xml.push_str(&format!("      Context: {}\n", escape_xml(context)));
                }
                xml.push_str("    </failure>\n");
            } else {
                xml.push_str(&format!(
                    "    <system-out>{}: {}</system-out>\n",
                    violation.severity.as_str(),
                    escape_xml(&violation.message)
                ));
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Format report for GitHub Actions
    fn format_github(&self, report: &CheckReport, violations: &[&Violation]) -> String {
        let mut output = String::new();

        for violation in violations {
            let level = match violation.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            output.push_str(&format!(
                "::{} file={},line={},col={},title={}::{}\n",
                level,
                violation.file_path.display(),
                violation.line,
                violation.column,
                violation.rule_id,
                violation.message
            ));
        }

        output.push_str(&format!("::notice title=cstyle summary::{}\n", Self::summary_line(report)));
        output
    }

    #[cfg(feature = "colors")]
    fn paint(&self, text: &str, paint: Paint) -> String {
        use colored::Colorize;

        if !self.options.use_colors {
            return text.to_string();
        }
        match paint {
            Paint::Red => text.red().to_string(),
            Paint::Yellow => text.yellow().to_string(),
            Paint::Cyan => text.cyan().to_string(),
            Paint::Green => text.green().to_string(),
            Paint::Dim => text.dimmed().to_string(),
            Paint::Bold => text.bold().to_string(),
        }
    }

    #[cfg(not(feature = "colors"))]
    fn paint(&self, text: &str, _paint: Paint) -> String {
        text.to_string()
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ReportFormatter {
        ReportFormatter::new(ReportOptions { use_colors: false, ..Default::default() })
    }

    fn create_test_report() -> CheckReport {
        let mut report = CheckReport::new();

        report.add_violation(
            Violation::new(
                "variable.verb-led",
                Severity::Error,
                PathBuf::from("src/device.c"),
                "variable 'runningDevice' starts with the verb 'running'",
            )
            .with_position(3, 5)
            .with_context("int runningDevice;"),
        );
        report.add_violation(
            Violation::new(
                "variable.array-hint",
                Severity::Warning,
                PathBuf::from("src/device.c"),
                "array variable 'slots' should end with 'Arr'",
            )
            .with_position(4, 5)
            .with_suggestion("slotsArr"),
        );

        report.set_files_checked(2);
        report
    }

    #[test]
    fn test_text_format() -> StyleResult<()> {
        let output = plain().format_report(&create_test_report(), OutputFormat::Text)?;
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(
            lines,
            vec![
                "src/device.c:3:5: [variable.verb-led] variable 'runningDevice' starts with the verb 'running'",
                "src/device.c:4:5: [variable.array-hint] array variable 'slots' should end with 'Arr'",
                "1 error, 1 warning, 0 info in 2 files",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_summary_printed_for_clean_run() -> StyleResult<()> {
        let mut report = CheckReport::new();
        report.set_files_checked(1);

        let output = plain().format_report(&report, OutputFormat::Text)?;
        assert_eq!(output, "0 errors, 0 warnings, 0 info in 1 file\n");

        let human = plain().format_report(&report, OutputFormat::Human)?;
        assert!(human.contains("No style violations found"));
        assert!(human.contains("0 errors, 0 warnings, 0 info in 1 file"));
        Ok(())
    }

    #[test]
    fn test_structured_round_trip_matches_text() -> StyleResult<()> {
        let report = create_test_report();
        let formatter = plain();

        let structured = formatter.format_report(&report, OutputFormat::Structured)?;
        let records = parse_structured(&structured)?;
        let text = formatter.format_report(&report, OutputFormat::Text)?;

        // the last text line is the summary
        assert_eq!(records.len(), text.lines().count() - 1);
        assert_eq!(records[0].rule_id, "variable.verb-led");
        assert_eq!((records[0].line, records[0].column), (3, 5));
        assert_eq!(records[1].severity, Severity::Warning);

        let json: JsonValue = serde_json::from_str(&structured).unwrap();
        assert_eq!(json["violations"][0]["ruleId"], "variable.verb-led");
        assert_eq!(json["summary"]["files"], 2);
        Ok(())
    }

    #[test]
    fn test_human_format() -> StyleResult<()> {
        let output = plain().format_report(&create_test_report(), OutputFormat::Human)?;

        assert!(output.contains("Style violations found"));
        assert!(output.contains("src/device.c"));
        assert!(output.contains("| int runningDevice;"));
        assert!(output.contains("suggestion: slotsArr"));
        assert!(output.contains("Summary: 1 error, 1 warning, 0 info in 2 files"));
        Ok(())
    }

    #[test]
    fn test_junit_format() -> StyleResult<()> {
        let output = plain().format_report(&create_test_report(), OutputFormat::Junit)?;

        assert!(output.contains("<?xml version=\"1.0\""));
        assert!(output.contains("tests=\"2\" failures=\"1\""));
        assert!(output.contains("name=\"src/device.c:3:5\""));
        assert!(output.contains("<failure message=\"variable &#39;runningDevice&#39;"));
        Ok(())
    }

    #[test]
    fn test_sarif_format() -> StyleResult<()> {
        let output = plain().format_report(&create_test_report(), OutputFormat::Sarif)?;
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        let results = json["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["level"], "warning");
        assert_eq!(results[0]["locations"][0]["physicalLocation"]["region"]["startLine"], 3);
        Ok(())
    }

    #[test]
    fn test_github_format() -> StyleResult<()> {
        let output = plain().format_report(&create_test_report(), OutputFormat::GitHub)?;

        assert!(output.starts_with(
            "::error file=src/device.c,line=3,col=5,title=variable.verb-led::variable 'runningDevice'"
        ));
        assert!(output.contains("::warning file=src/device.c,line=4,col=5"));
        Ok(())
    }

    #[test]
    fn test_severity_filtering_keeps_full_summary() -> StyleResult<()> {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            min_severity: Some(Severity::Error),
            ..Default::default()
        });

        let output = formatter.format_report(&create_test_report(), OutputFormat::Text)?;
        assert_eq!(output.lines().count(), 2);
        assert!(output.ends_with("1 error, 1 warning, 0 info in 2 files\n"));
        Ok(())
    }

    #[test]
    fn test_format_names() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Structured));
        assert_eq!(OutputFormat::parse("GitHub"), Some(OutputFormat::GitHub));
        assert_eq!(OutputFormat::parse("xml"), None);
        assert!(OutputFormat::all_formats().iter().all(|name| OutputFormat::parse(name).is_some()));
    }

    #[test]
    fn test_invalid_structured_input() {
        assert!(parse_structured("not json").is_err());
    }
}
