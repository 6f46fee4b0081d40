//! Rule evaluation over a classified token stream
//!
//! Architecture: Domain Service - The evaluator applies registered rules to tokens
//! - Tokens are visited once, in source order, and never modified
//! - All violations for a token are produced before the next token is visited
//! - Matcher state lives in a per-file context and is discarded with it

use crate::domain::tokens::{Directive, Token, TokenKind};
use crate::domain::violations::Violation;
use crate::rules::matchers::MatcherState;
use crate::rules::registry::RuleRegistry;
use crate::scanner::Scanner;
use std::path::Path;
use std::sync::Arc;

/// Facts about the file being evaluated, updated as tokens pass
#[derive(Debug, Clone)]
pub struct FileContext {
    file_name: String,
    stem: String,
    extension: Option<String>,
    is_header: bool,
    /// Incremented at the first include after any other significant token
    include_block: u32,
    in_include_run: bool,
    first: Option<Token>,
    second: Option<Token>,
    ends_with_endif: bool,
}

impl FileContext {
    pub fn new(path: &Path) -> Self {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
        let is_header = matches!(extension.as_deref(), Some("h") | Some("hh") | Some("hpp"));

        Self {
            file_name,
            stem,
            extension,
            is_header,
            include_block: 0,
            in_include_run: false,
            first: None,
            second: None,
            ends_with_endif: false,
        }
    }

    /// Record a token before rules see it
    fn observe(&mut self, token: &Token) {
        if !token.is_significant() {
            return;
        }

        let is_include = matches!(token.kind, TokenKind::Directive(Directive::Include { .. }));
        if is_include && !self.in_include_run {
            self.include_block += 1;
        }
        self.in_include_run = is_include;

        if self.first.is_none() {
            self.first = Some(token.clone());
        } else if self.second.is_none() {
            self.second = Some(token.clone());
        }
        self.ends_with_endif = matches!(token.kind, TokenKind::Directive(Directive::Endif));
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn is_header(&self) -> bool {
        self.is_header
    }

    /// Current include block; consecutive includes share a block
    pub fn include_block(&self) -> u32 {
        self.include_block
    }

    /// Guard shape of the file so far: the `#ifndef` name and position when it
    /// is the first significant token, the `#define` name when it is the
    /// second, and whether the last significant token is `#endif`
    pub fn guard_shape(&self) -> (Option<(&str, (u32, u32))>, Option<&str>, bool) {
        let opening = match &self.first {
            Some(Token { kind: TokenKind::Directive(Directive::Ifndef { name }), line, column, .. }) => {
                Some((name.as_str(), (*line, *column)))
            }
            _ => None,
        };
        let define = match &self.second {
            Some(Token { kind: TokenKind::Directive(Directive::Define { name, .. }), .. }) => {
                Some(name.as_str())
            }
            _ => None,
        };
        (opening, define, self.ends_with_endif)
    }
}

/// Applies the rules of a registry to token streams
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    registry: Arc<RuleRegistry>,
}

impl RuleEvaluator {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Evaluate the tokens of one file
    pub fn evaluate<I>(&self, path: &Path, tokens: I) -> Vec<Violation>
    where
        I: IntoIterator<Item = Token>,
    {
        let mut file = FileContext::new(path);
        let mut states: Vec<MatcherState> =
            self.registry.rules().iter().map(|rule| rule.matcher.initial_state()).collect();
        let mut violations = Vec::new();

        for token in tokens {
            file.observe(&token);
            for &construct in token.targets() {
                for (index, rule) in self.registry.dispatch(construct) {
                    if let Some(finding) = rule.matcher.check(&token, &file, &mut states[index]) {
                        violations.push(rule.violation(path, finding));
                    }
                }
            }
        }

        tracing::debug!(path = %path.display(), violations = violations.len(), "evaluated file");
        violations
    }

    /// Scan and evaluate source text, attaching the offending source line to each violation
    pub fn evaluate_source(&self, path: &Path, source: &str) -> Vec<Violation> {
        let mut violations = self.evaluate(path, Scanner::new(source).tokens());
        let lines: Vec<&str> = source.lines().collect();
        for violation in &mut violations {
            if let Some(line) = lines.get(violation.line.saturating_sub(1) as usize) {
                if !line.trim().is_empty() {
                    violation.context = Some(line.trim_end().to_string());
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, MatcherSpec, RuleDefinition, RuleSet};
    use crate::domain::tokens::Construct;
    use crate::domain::violations::Severity;

    fn evaluator() -> RuleEvaluator {
        RuleEvaluator::new(Arc::new(RuleRegistry::with_defaults().unwrap()))
    }

    fn rule_ids(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.rule_id.as_str()).collect()
    }

    #[test]
    fn test_verb_led_variable() {
        let violations = evaluator().evaluate_source(Path::new("device.c"), "int runningDevice;\n");

        assert_eq!(rule_ids(&violations), vec!["variable.verb-led"]);
        let violation = &violations[0];
        assert_eq!((violation.line, violation.column), (1, 5));
        assert_eq!(
            violation.message,
            "variable 'runningDevice' starts with the verb 'running'; name variables after what they hold"
        );
        assert_eq!(violation.context.as_deref(), Some("int runningDevice;"));
    }

    #[test]
    fn test_missing_header_guard_reported_once() {
        let source = "#include <stdio.h>\nvoid appLogWrite(const char *strMsg);\n";
        let violations = evaluator().evaluate_source(Path::new("include/app_log.h"), source);

        let guards: Vec<_> = violations.iter().filter(|v| v.rule_id == "header.guard").collect();
        assert_eq!(guards.len(), 1);
        assert!(guards[0].message.contains("__APP_LOG_H__"));
        assert!(guards[0].message.contains("no guard"));
    }

    #[test]
    fn test_wrong_guard_name_points_at_ifndef() {
        let source = "/* log */\n#ifndef APP_LOG_H\n#define APP_LOG_H\n#endif\n";
        let violations = evaluator().evaluate_source(Path::new("app_log.h"), source);

        assert_eq!(rule_ids(&violations), vec!["header.guard"]);
        assert_eq!(violations[0].line, 2);
        assert!(violations[0].message.contains("'APP_LOG_H'"));
    }

    #[test]
    fn test_sources_need_no_guard() {
        let violations = evaluator().evaluate_source(Path::new("app_log.c"), "int deviceCount;\n");
        assert!(violations.is_empty());
    }

    #[test]
    fn test_include_order_one_violation_per_block() {
        let source = "#include <curl/curl.h>\n#include <stdio.h>\n#include <stdlib.h>\n\nint deviceCount;\n\n#include \"app_log.h\"\n#include <string.h>\n";
        let violations = evaluator().evaluate_source(Path::new("net.c"), source);

        let order: Vec<_> = violations.iter().filter(|v| v.rule_id == "include.order").collect();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].line, 2);
        assert_eq!(order[0].message, "standard include 'stdio.h' must come before third-party includes");
        assert_eq!(order[1].line, 8);
    }

    #[test]
    fn test_naming_rules_per_construct() {
        let source = "#define maxLen 8\ntypedef struct app_log { int LogLevel; } AppLog;\nenum logLevel { LogDebug };\nvoid Write_Log(void)\n{\n}\n";
        let violations = evaluator().evaluate_source(Path::new("log.c"), source);
        let ids = rule_ids(&violations);

        for expected in [
            "macro.naming-case",
            "struct.naming-case",
            "field.naming-case",
            "typedef.suffix",
            "enum.naming-case",
            "enum.constant-case",
            "function.naming-case",
        ] {
            assert!(ids.contains(&expected), "missing {expected} in {ids:?}");
        }
        let field = violations.iter().find(|v| v.rule_id == "field.naming-case").unwrap();
        assert_eq!(field.suggested_fix.as_deref(), Some("rename to 'logLevel'"));
    }

    #[test]
    fn test_type_hints() {
        let source = "char name[16];\nint values[4];\nchar strOk[8];\nint countArr[2];\n";
        let violations = evaluator().evaluate_source(Path::new("hints.c"), source);

        assert_eq!(rule_ids(&violations), vec!["variable.string-hint", "variable.array-hint"]);
        assert_eq!(violations[0].suggested_fix.as_deref(), Some("rename to 'strName'"));
        assert_eq!(violations[1].suggested_fix.as_deref(), Some("rename to 'valuesArr'"));
    }

    #[test]
    fn test_type_hints_for_pointer_arrays_and_parameters() {
        let source = "static const char *namesArr[2];\nconst char *labels[2];\n\nint main(int argc, char *argv[])\n{\n    return argc;\n}\n";
        let violations = evaluator().evaluate_source(Path::new("main.c"), source);

        assert_eq!(rule_ids(&violations), vec!["variable.array-hint"]);
        assert_eq!(violations[0].line, 2);
        assert_eq!(violations[0].suggested_fix.as_deref(), Some("rename to 'labelsArr'"));
    }

    #[test]
    fn test_declaration_after_continued_macro_is_checked() {
        let source = "#define CLAMP(x) ((x) < 0 ? 0 : \\\n    (x))\nint runningDevice;\n";
        let violations = evaluator().evaluate_source(Path::new("device.c"), source);

        assert_eq!(rule_ids(&violations), vec!["variable.verb-led"]);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_brace_placement_and_function_order() {
        let source = "int appMain(void) {\n    if (1)\n    {\n    }\n    return 0;\n}\n\nstatic void helper(void)\n{\n}\n";
        let violations = evaluator().evaluate_source(Path::new("main.c"), source);

        assert_eq!(
            rule_ids(&violations),
            vec!["layout.function-brace", "layout.block-brace", "function.order"]
        );
        assert_eq!(violations[1].line, 3);
        assert_eq!(violations[2].line, 8);
    }

    #[test]
    fn test_file_name_rule() {
        let violations = evaluator().evaluate_source(Path::new("AppLog.c"), "");
        assert_eq!(rule_ids(&violations), vec!["file.naming-case"]);
        assert_eq!(violations[0].suggested_fix.as_deref(), Some("rename the file to 'app_log.c'"));
    }

    #[test]
    fn test_malformed_input_becomes_violation() {
        let source = "char *strMsg = \"open;\nint deviceCount;\n";
        let violations = evaluator().evaluate_source(Path::new("broken.c"), source);

        assert_eq!(rule_ids(&violations), vec!["lexical-error"]);
        assert_eq!(violations[0].message, "malformed input: unterminated string literal");
    }

    #[test]
    fn test_conflicting_rules_are_additive() {
        let extra = RuleDefinition {
            id: "variable.snake".into(),
            target: Construct::Variable,
            matcher: MatcherSpec::Case {
                style: crate::config::CaseStyle::LowerSnake,
                strip_prefix: None,
                strip_suffix: None,
                allow_edge_underscores: false,
            },
            message: "variable '{name}' must be {expected}".into(),
            severity: Severity::Warning,
            enabled: true,
            description: None,
        };
        let config = ConfigBuilder::new().add_rule(extra).build().unwrap();
        let extended_evaluator =
            RuleEvaluator::new(Arc::new(RuleRegistry::from_config(&config).unwrap()));

        let base = evaluator().evaluate_source(Path::new("x.c"), "int deviceCount;\nint device_id;\n");
        let extended = extended_evaluator.evaluate_source(Path::new("x.c"), "int deviceCount;\nint device_id;\n");

        for violation in &base {
            assert!(extended.contains(violation));
        }
        assert_eq!(rule_ids(&extended), vec!["variable.snake", "variable.naming-case"]);
    }

    #[test]
    fn test_state_is_fresh_per_file() {
        let evaluator = evaluator();
        let source = "#include \"app.h\"\n#include <stdio.h>\n";
        let first = evaluator.evaluate_source(Path::new("a.c"), source);
        let second = evaluator.evaluate_source(Path::new("a.c"), source);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_layout_profile_skips_naming() {
        let config = ConfigBuilder::new().rule_set(RuleSet::Layout).build().unwrap();
        let evaluator = RuleEvaluator::new(Arc::new(RuleRegistry::from_config(&config).unwrap()));
        let violations = evaluator.evaluate_source(Path::new("x.c"), "int RunningDevice;\n");
        assert!(violations.is_empty());
    }
}
