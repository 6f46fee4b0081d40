//! C source analysis driven by the rule registry
//!
//! Architecture: Specialized Analysis Services - The C analyzer feeds scanned tokens to the evaluator
//! - Implements FileAnalyzer trait for clean polymorphism
//! - Owns no rules itself; everything it reports comes from the shared registry

use crate::analyzer::FileAnalyzer;
use crate::domain::violations::{StyleResult, Violation};
use crate::rules::{RuleEvaluator, RuleRegistry};
use std::path::Path;
use std::sync::Arc;

/// Analyzer for C sources and headers
#[derive(Debug, Clone)]
pub struct CAnalyzer {
    evaluator: RuleEvaluator,
    /// Lowercase extensions handled, without the dot
    extensions: Vec<String>,
}

impl CAnalyzer {
    /// Create an analyzer for `.c` and `.h` files
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self::with_extensions(registry, ["c", "h"])
    }

    pub fn with_extensions<I, S>(registry: Arc<RuleRegistry>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            evaluator: RuleEvaluator::new(registry),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }
}

impl FileAnalyzer for CAnalyzer {
    fn analyze(&self, file_path: &Path, content: &str) -> StyleResult<Vec<Violation>> {
        Ok(self.evaluator.evaluate_source(file_path, content))
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                self.extensions.iter().any(|wanted| *wanted == ext)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> CAnalyzer {
        CAnalyzer::new(Arc::new(RuleRegistry::with_defaults().unwrap()))
    }

    #[test]
    fn test_handles_c_files() {
        let analyzer = analyzer();

        assert!(analyzer.handles_file(Path::new("src/app_log.c")));
        assert!(analyzer.handles_file(Path::new("include/APP_LOG.H")));
        assert!(!analyzer.handles_file(Path::new("src/app_log.cpp")));
        assert!(!analyzer.handles_file(Path::new("Makefile")));
    }

    #[test]
    fn test_analyze_reports_registry_rules() -> StyleResult<()> {
        let violations = analyzer().analyze(Path::new("device.c"), "int runningDevice;\n")?;

        let verb = violations.iter().find(|v| v.rule_id == "variable.verb-led").unwrap();
        assert_eq!((verb.line, verb.column), (1, 5));
        assert_eq!(verb.context.as_deref(), Some("int runningDevice;"));
        Ok(())
    }

    #[test]
    fn test_custom_extensions() {
        let registry = Arc::new(RuleRegistry::with_defaults().unwrap());
        let analyzer = CAnalyzer::with_extensions(registry, [".inc"]);

        assert!(analyzer.handles_file(Path::new("tables.inc")));
        assert!(!analyzer.handles_file(Path::new("tables.c")));
    }
}
