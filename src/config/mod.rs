//! Configuration loading and management for cstyle-guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Built-in conventions live in the profiles module, not in files on disk
//! - Rules are described as data; the rules module compiles them

pub mod profiles;

use crate::domain::tokens::{BraceContext, Construct};
use crate::domain::violations::{Severity, StyleError, StyleResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file names looked up in a project root, in order
pub const CONFIG_FILE_NAMES: [&str; 3] = ["cstyle.yaml", "cstyle.yml", ".cstyle.yaml"];

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Built-in convention profile registered before custom rules
    #[serde(default, alias = "ruleSet")]
    pub rule_set: RuleSet,
    /// Severity per rule id, applied when the registry is built
    #[serde(default, alias = "severityOverrides")]
    pub severity_overrides: BTreeMap<String, Severity>,
    /// Rule ids that stay registered but are never evaluated
    #[serde(default, alias = "disabledRules")]
    pub disabled_rules: Vec<String>,
    /// Rule ids to switch on that a profile ships disabled
    #[serde(default, alias = "enabledRules")]
    pub enabled_rules: Vec<String>,
    /// Glob patterns excluded from directory walks (gitignore-style, `!` re-includes)
    #[serde(default = "default_exclude_paths", alias = "excludePaths")]
    pub exclude_paths: Vec<String>,
    /// Optional ignore file name looked up in every walked directory
    #[serde(default = "default_ignore_file", alias = "ignoreFile")]
    pub ignore_file: Option<String>,
    /// File extensions checked when walking directories
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Default output format for the command line
    #[serde(default, alias = "outputFormat")]
    pub output_format: Option<String>,
    /// Custom rules, registered after the profile in file order
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// Built-in convention profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Naming and layout conventions of the style guide
    #[default]
    Guide,
    /// Naming conventions only
    Naming,
    /// Header, include and brace layout only
    Layout,
    /// No built-in conventions; custom rules only
    None,
}

impl RuleSet {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Naming => "naming",
            Self::Layout => "layout",
            Self::None => "none",
        }
    }
}

/// A rule described as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique identifier for this rule
    pub id: String,
    /// Construct whose tokens this rule inspects
    pub target: Construct,
    /// What the rule checks
    pub matcher: MatcherSpec,
    /// Message template; `{name}`, `{expected}`, `{word}` and `{actual}` are substituted
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Longer explanation shown by `explain`
    #[serde(default)]
    pub description: Option<String>,
}

/// Identifier casing styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStyle {
    /// `MAX_BUFFER_SIZE`
    UpperSnake,
    /// `DeviceState`
    Pascal,
    /// `deviceCount`
    LowerCamel,
    /// `device_count`
    LowerSnake,
}

impl CaseStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpperSnake => "UPPER_SNAKE_CASE",
            Self::Pascal => "PascalCase",
            Self::LowerCamel => "lowerCamelCase",
            Self::LowerSnake => "lower_snake_case",
        }
    }
}

/// Declarations a type hint applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeHint {
    /// `char` arrays
    String,
    /// Arrays of anything but `char`
    Array,
    Pointer,
}

impl TypeHint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Array => "array",
            Self::Pointer => "pointer",
        }
    }
}

/// Matcher kinds, tagged by `type` in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherSpec {
    /// Name must follow a casing style
    Case {
        style: CaseStyle,
        #[serde(default, alias = "stripPrefix")]
        strip_prefix: Option<String>,
        #[serde(default, alias = "stripSuffix")]
        strip_suffix: Option<String>,
        /// Leading and trailing underscores are ignored
        #[serde(default, alias = "allowEdgeUnderscores")]
        allow_edge_underscores: bool,
    },
    Prefix { value: String },
    Suffix { value: String },
    /// Name must (or must not) match a regular expression
    Regex {
        pattern: String,
        #[serde(default = "default_true", alias = "mustMatch")]
        must_match: bool,
    },
    /// First word of the name must not be one of `words` (case insensitive)
    LeadingWord { words: Vec<String> },
    /// Declarations of the hinted kind carry a prefix and/or suffix
    TypeHint {
        hint: TypeHint,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
    },
    /// Includes ordered standard, then third-party, then project headers
    IncludeOrder {
        /// Extra system headers ranked as standard
        #[serde(default, alias = "standardHeaders")]
        standard_headers: Vec<String>,
    },
    /// Headers wrapped in an include guard; `{STEM}` is the upper-cased file stem
    HeaderGuard {
        #[serde(default = "default_guard_format")]
        format: String,
    },
    /// Opening braces of the listed contexts placed on their own line or not
    BracePlacement {
        contexts: Vec<BraceContext>,
        #[serde(alias = "ownLine")]
        own_line: bool,
    },
    /// Static function definitions precede public ones
    FunctionOrder,
    /// Public functions carry a documentation comment
    DocComment {
        #[serde(default, alias = "includeStatic")]
        include_static: bool,
    },
    /// File stem follows a casing style
    FileName { style: CaseStyle },
}

impl MatcherSpec {
    /// Matcher kind as written in YAML
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Case { .. } => "case",
            Self::Prefix { .. } => "prefix",
            Self::Suffix { .. } => "suffix",
            Self::Regex { .. } => "regex",
            Self::LeadingWord { .. } => "leading_word",
            Self::TypeHint { .. } => "type_hint",
            Self::IncludeOrder { .. } => "include_order",
            Self::HeaderGuard { .. } => "header_guard",
            Self::BracePlacement { .. } => "brace_placement",
            Self::FunctionOrder => "function_order",
            Self::DocComment { .. } => "doc_comment",
            Self::FileName { .. } => "file_name",
        }
    }

    /// Constructs this matcher can inspect
    pub fn accepts(&self, target: Construct) -> bool {
        let named = matches!(
            target,
            Construct::Variable
                | Construct::Function
                | Construct::Macro
                | Construct::Enum
                | Construct::EnumConstant
                | Construct::Struct
                | Construct::Field
                | Construct::Typedef
        );
        match self {
            Self::Case { .. }
            | Self::Prefix { .. }
            | Self::Suffix { .. }
            | Self::Regex { .. }
            | Self::LeadingWord { .. } => named,
            Self::TypeHint { .. } => matches!(target, Construct::Variable | Construct::Field),
            Self::IncludeOrder { .. } => target == Construct::IncludeOrder,
            Self::HeaderGuard { .. } => target == Construct::Header,
            Self::BracePlacement { .. } => target == Construct::Brace,
            Self::FunctionOrder | Self::DocComment { .. } => target == Construct::Function,
            Self::FileName { .. } => target == Construct::File,
        }
    }
}

impl StyleConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> StyleResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            StyleError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            StyleError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), rules = config.rules.len(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> StyleResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| StyleError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Find the first configuration file present in `root`
    pub fn discover<P: AsRef<Path>>(root: P) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.as_ref().join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Default configuration: the guide profile and no custom rules
    pub fn with_defaults() -> Self {
        Self {
            version: default_version(),
            rule_set: RuleSet::Guide,
            severity_overrides: BTreeMap::new(),
            disabled_rules: Vec::new(),
            enabled_rules: Vec::new(),
            exclude_paths: default_exclude_paths(),
            ignore_file: default_ignore_file(),
            extensions: default_extensions(),
            output_format: None,
            rules: Vec::new(),
        }
    }

    /// Validate the configuration for consistency and correctness.
    ///
    /// Rule-level problems (duplicate ids, bad regexes, matchers aimed at the
    /// wrong construct) are reported here so they surface before any file is read.
    pub fn validate(&self) -> StyleResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(StyleError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        if self.extensions.is_empty() {
            return Err(StyleError::config("At least one file extension must be configured"));
        }

        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(StyleError::config("Custom rule with an empty id"));
            }

            let duplicate_count = self.rules.iter().filter(|r| r.id == rule.id).count();
            if duplicate_count > 1 {
                return Err(StyleError::config(format!("Duplicate rule ID '{}'", rule.id)));
            }

            if !rule.matcher.accepts(rule.target) {
                return Err(StyleError::config(format!(
                    "Rule '{}': matcher '{}' cannot inspect '{}' constructs",
                    rule.id,
                    rule.matcher.kind(),
                    rule.target
                )));
            }

            if let MatcherSpec::Regex { pattern, .. } = &rule.matcher {
                regex::Regex::new(pattern).map_err(|e| {
                    StyleError::config(format!("Invalid regex pattern in rule '{}': {}", rule.id, e))
                })?;
            }
        }

        Ok(())
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> StyleResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StyleError::config(format!("Failed to serialize config: {e}")))
    }

    /// Convert to YAML, the format configuration files are written in
    pub fn to_yaml(&self) -> StyleResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| StyleError::config(format!("Failed to serialize config: {e}")))
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_severity() -> Severity {
    Severity::Error
}

fn default_exclude_paths() -> Vec<String> {
    vec![
        "**/.git/".to_string(),
        "**/build/".to_string(),
        "**/third_party/".to_string(),
        "**/*.generated.*".to_string(),
    ]
}

fn default_ignore_file() -> Option<String> {
    Some(".cstyleignore".to_string())
}

fn default_extensions() -> Vec<String> {
    vec!["c".to_string(), "h".to_string()]
}

pub(crate) fn default_guard_format() -> String {
    "__{STEM}_H__".to_string()
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: StyleConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: StyleConfig::default() }
    }

    /// Select the built-in profile
    pub fn rule_set(mut self, rule_set: RuleSet) -> Self {
        self.config.rule_set = rule_set;
        self
    }

    /// Add an exclude pattern
    pub fn exclude_path(mut self, pattern: impl Into<String>) -> Self {
        self.config.exclude_paths.push(pattern.into());
        self
    }

    /// Set the ignore file name
    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.ignore_file = Some(filename.into());
        self
    }

    /// Override the severity of a rule
    pub fn severity(mut self, rule_id: impl Into<String>, severity: Severity) -> Self {
        self.config.severity_overrides.insert(rule_id.into(), severity);
        self
    }

    pub fn disable(mut self, rule_id: impl Into<String>) -> Self {
        self.config.disabled_rules.push(rule_id.into());
        self
    }

    pub fn enable(mut self, rule_id: impl Into<String>) -> Self {
        self.config.enabled_rules.push(rule_id.into());
        self
    }

    /// Append a custom rule
    pub fn add_rule(mut self, rule: RuleDefinition) -> Self {
        self.config.rules.push(rule);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> StyleResult<StyleConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StyleConfig::default();
        assert_eq!(config.rule_set, RuleSet::Guide);
        assert_eq!(config.extensions, vec!["c", "h"]);
        assert_eq!(config.ignore_file.as_deref(), Some(".cstyleignore"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_with_aliases_and_custom_rule() {
        let yaml = r#"
version: "1.0"
ruleSet: naming
severityOverrides:
  variable.verb-led: warning
disabledRules: [typedef.suffix]
rules:
  - id: macro.module-prefix
    target: macro
    matcher: { type: prefix, value: "APP_" }
    message: "macro '{name}' must start with '{expected}'"
    severity: warning
"#;
        let config = StyleConfig::load_from_str(yaml).unwrap();

        assert_eq!(config.rule_set, RuleSet::Naming);
        assert_eq!(config.severity_overrides["variable.verb-led"], Severity::Warning);
        assert_eq!(config.disabled_rules, vec!["typedef.suffix"]);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].matcher, MatcherSpec::Prefix { value: "APP_".into() });
        assert!(config.rules[0].enabled);
        // untouched fields fall back to their defaults
        assert_eq!(config.extensions, vec!["c", "h"]);
    }

    #[test]
    fn test_duplicate_custom_rule_is_rejected() {
        let rule = RuleDefinition {
            id: "macro.prefix".into(),
            target: Construct::Macro,
            matcher: MatcherSpec::Prefix { value: "APP_".into() },
            message: "m".into(),
            severity: Severity::Error,
            enabled: true,
            description: None,
        };
        let result = ConfigBuilder::new().add_rule(rule.clone()).add_rule(rule).build();
        assert!(matches!(result, Err(StyleError::Configuration { .. })));
    }

    #[test]
    fn test_invalid_regex_and_mismatched_target_are_rejected() {
        let bad_regex = r#"
rules:
  - id: bad
    target: variable
    matcher: { type: regex, pattern: "([a-z" }
    message: m
"#;
        assert!(StyleConfig::load_from_str(bad_regex).is_err());

        let wrong_target = r#"
rules:
  - id: guard-on-variable
    target: variable
    matcher: { type: header_guard }
    message: m
"#;
        let error = StyleConfig::load_from_str(wrong_target).unwrap_err();
        assert!(error.to_string().contains("header_guard"));
    }

    #[test]
    fn test_unsupported_version() {
        assert!(StyleConfig::load_from_str("version: \"2.0\"").is_err());
    }

    #[test]
    fn test_discover_prefers_first_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".cstyle.yaml"), "version: \"1.0\"").unwrap();
        fs::write(temp_dir.path().join("cstyle.yml"), "version: \"1.0\"").unwrap();

        let found = StyleConfig::discover(temp_dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "cstyle.yml");
    }

    #[test]
    fn test_yaml_serialization_fidelity() {
        let config = ConfigBuilder::new()
            .rule_set(RuleSet::Layout)
            .severity("include.order", Severity::Info)
            .build()
            .unwrap();
        let yaml = config.to_yaml().unwrap();
        let rehydrated = StyleConfig::load_from_str(&yaml).unwrap();
        assert_eq!(config, rehydrated);
    }
}
