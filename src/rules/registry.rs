//! Immutable registry of the rules in force for a run
//!
//! Architecture: Repository Pattern - The registry is the single source of rules
//! - Built once from configuration before any file is scanned
//! - Read-only afterwards and shared between workers behind an `Arc`
//! - Lookup by construct preserves registration order

use crate::config::{profiles, MatcherSpec, RuleDefinition, RuleSet, StyleConfig};
use crate::domain::tokens::Construct;
use crate::domain::violations::{Severity, StyleError, StyleResult, Violation};
use crate::rules::matchers::{Finding, Matcher};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// Rule reporting malformed lexical input
pub const LEXICAL_ERROR: &str = "lexical-error";
/// Rule reporting source files that could not be read
pub const IO_ERROR: &str = "io-error";

/// Where a rule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    /// Always registered; reports scan and read failures
    Intrinsic,
    Profile(RuleSet),
    Custom,
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intrinsic => f.write_str("intrinsic"),
            Self::Profile(rule_set) => write!(f, "profile:{}", rule_set.as_str()),
            Self::Custom => f.write_str("custom"),
        }
    }
}

/// A registered rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub target: Construct,
    /// Data description of the matcher; `None` for intrinsic rules
    pub spec: Option<MatcherSpec>,
    pub matcher: Matcher,
    pub message: String,
    pub severity: Severity,
    pub enabled: bool,
    pub description: Option<String>,
    pub origin: RuleOrigin,
}

impl Rule {
    /// Compile a rule definition
    pub fn compile(definition: &RuleDefinition, origin: RuleOrigin) -> StyleResult<Self> {
        if definition.id.trim().is_empty() {
            return Err(StyleError::config("Rule with an empty id"));
        }
        if !definition.matcher.accepts(definition.target) {
            return Err(StyleError::config(format!(
                "Rule '{}': matcher '{}' cannot inspect '{}' constructs",
                definition.id,
                definition.matcher.kind(),
                definition.target
            )));
        }
        let matcher = Matcher::compile(&definition.matcher)
            .map_err(|e| StyleError::config(format!("Rule '{}': {}", definition.id, e)))?;

        Ok(Self {
            id: definition.id.clone(),
            target: definition.target,
            spec: Some(definition.matcher.clone()),
            matcher,
            message: definition.message.clone(),
            severity: definition.severity,
            enabled: definition.enabled,
            description: definition.description.clone(),
            origin,
        })
    }

    fn intrinsic(id: &str, target: Construct, matcher: Matcher, message: &str) -> Self {
        Self {
            id: id.to_string(),
            target,
            spec: None,
            matcher,
            message: message.to_string(),
            severity: Severity::Error,
            enabled: true,
            description: None,
            origin: RuleOrigin::Intrinsic,
        }
    }

    /// Turn a matcher finding into a violation of this rule
    pub fn violation(&self, file_path: &Path, finding: Finding) -> Violation {
        let violation = Violation::new(
            self.id.clone(),
            self.severity,
            file_path.to_path_buf(),
            finding.values.render(&self.message),
        )
        .with_position(finding.line, finding.column);

        match finding.suggestion {
            Some(suggestion) => violation.with_suggestion(suggestion),
            None => violation,
        }
    }

    /// Matcher kind for listings
    pub fn kind(&self) -> &'static str {
        self.spec.as_ref().map(|spec| spec.kind()).unwrap_or("intrinsic")
    }
}

/// Statistics about the registered rules
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub enabled_rules: usize,
    pub disabled_rules: usize,
    pub custom_rules: usize,
    pub rules_by_construct: BTreeMap<Construct, usize>,
}

impl RegistryStats {
    pub fn total_rules(&self) -> usize {
        self.enabled_rules + self.disabled_rules
    }
}

/// Rules in force for one run
#[derive(Debug)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    /// Indices of enabled rules per construct, in registration order
    by_construct: BTreeMap<Construct, Vec<usize>>,
    fingerprint: String,
}

impl RuleRegistry {
    /// Build the registry: intrinsic rules, then the profile, then custom rules
    pub fn from_config(config: &StyleConfig) -> StyleResult<Self> {
        let mut rules = vec![
            Rule::intrinsic(LEXICAL_ERROR, Construct::Lexical, Matcher::Malformed, "malformed input: {actual}"),
            Rule::intrinsic(IO_ERROR, Construct::Lexical, Matcher::Unreadable, "cannot read file: {actual}"),
        ];

        for definition in profiles::rules_for(config.rule_set) {
            rules.push(Rule::compile(&definition, RuleOrigin::Profile(config.rule_set))?);
        }
        for definition in &config.rules {
            rules.push(Rule::compile(definition, RuleOrigin::Custom)?);
        }

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(StyleError::config(format!("Duplicate rule ID '{}'", rule.id)));
            }
        }

        for (id, severity) in &config.severity_overrides {
            match rules.iter_mut().find(|rule| &rule.id == id) {
                Some(rule) => rule.severity = *severity,
                None => tracing::warn!(rule = %id, "severity override names an unknown rule"),
            }
        }

        for id in &config.enabled_rules {
            match rules.iter_mut().find(|rule| &rule.id == id) {
                Some(rule) => rule.enabled = true,
                None => tracing::warn!(rule = %id, "cannot enable unknown rule"),
            }
        }

        for id in &config.disabled_rules {
            match rules.iter_mut().find(|rule| &rule.id == id) {
                Some(rule) if rule.origin == RuleOrigin::Intrinsic => {
                    tracing::warn!(rule = %id, "intrinsic rules cannot be disabled")
                }
                Some(rule) => rule.enabled = false,
                None => tracing::warn!(rule = %id, "cannot disable unknown rule"),
            }
        }

        Ok(Self::from_rules(rules))
    }

    /// Registry of the default configuration
    pub fn with_defaults() -> StyleResult<Self> {
        Self::from_config(&StyleConfig::default())
    }

    fn from_rules(rules: Vec<Rule>) -> Self {
        let mut by_construct: BTreeMap<Construct, Vec<usize>> = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.enabled {
                by_construct.entry(rule.target).or_default().push(index);
            }
        }
        let fingerprint = fingerprint(&rules);

        tracing::debug!(rules = rules.len(), fingerprint = %fingerprint, "rule registry built");
        Self { rules, by_construct, fingerprint }
    }

    /// Enabled rules for a construct, in registration order
    pub fn rules_for(&self, construct: Construct) -> impl Iterator<Item = &Rule> {
        self.dispatch(construct).map(|(_, rule)| rule)
    }

    /// Enabled rules for a construct with their registry index
    pub(crate) fn dispatch(&self, construct: Construct) -> impl Iterator<Item = (usize, &Rule)> {
        self.by_construct
            .get(&construct)
            .into_iter()
            .flatten()
            .map(move |&index| (index, &self.rules[index]))
    }

    /// All registered rules, enabled or not
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Stable hash of the effective rule set
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for rule in &self.rules {
            if rule.enabled {
                stats.enabled_rules += 1;
                *stats.rules_by_construct.entry(rule.target).or_default() += 1;
            } else {
                stats.disabled_rules += 1;
            }
            if rule.origin == RuleOrigin::Custom {
                stats.custom_rules += 1;
            }
        }
        stats
    }

    /// Violation for a source file that could not be read
    pub fn io_violation(&self, file_path: &Path, error: &std::io::Error) -> Violation {
        let (message, severity) = match self.get(IO_ERROR) {
            Some(rule) => (rule.message.replace("{actual}", &error.to_string()), rule.severity),
            None => (format!("cannot read file: {error}"), Severity::Error),
        };
        Violation::new(IO_ERROR, severity, file_path.to_path_buf(), message)
    }
}

fn fingerprint(rules: &[Rule]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.id.as_bytes());
        hasher.update(rule.target.as_str().as_bytes());
        hasher.update(rule.message.as_bytes());
        hasher.update(rule.severity.as_str().as_bytes());
        hasher.update([rule.enabled as u8]);
        // matcher specs hash through their serialized form
        hasher.update(serde_json::to_string(&rule.spec).unwrap_or_default().as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn custom(id: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            target: Construct::Macro,
            matcher: MatcherSpec::Prefix { value: "APP_".into() },
            message: "macro '{name}' must start with '{expected}'".into(),
            severity: Severity::Warning,
            enabled: true,
            description: None,
        }
    }

    #[test]
    fn test_registration_order() {
        let config = ConfigBuilder::new().add_rule(custom("macro.module-prefix")).build().unwrap();
        let registry = RuleRegistry::from_config(&config).unwrap();

        let ids: Vec<_> = registry.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(&ids[..2], &[LEXICAL_ERROR, IO_ERROR]);
        assert_eq!(ids.last(), Some(&"macro.module-prefix"));

        let macro_rules: Vec<_> = registry.rules_for(Construct::Macro).map(|r| r.id.as_str()).collect();
        assert_eq!(macro_rules, vec!["macro.naming-case", "macro.module-prefix"]);
    }

    #[test]
    fn test_duplicate_of_profile_rule_is_fatal() {
        let config = ConfigBuilder::new().add_rule(custom("variable.verb-led")).build().unwrap();
        let error = RuleRegistry::from_config(&config).unwrap_err();
        assert!(matches!(error, StyleError::Configuration { .. }));
        assert!(error.to_string().contains("variable.verb-led"));
    }

    #[test]
    fn test_overrides_and_disables() {
        let config = ConfigBuilder::new()
            .severity("variable.verb-led", Severity::Info)
            .severity("no.such-rule", Severity::Info)
            .disable("typedef.suffix")
            .disable(LEXICAL_ERROR)
            .enable("function.doc-comment")
            .build()
            .unwrap();
        let registry = RuleRegistry::from_config(&config).unwrap();

        assert_eq!(registry.get("variable.verb-led").unwrap().severity, Severity::Info);
        assert!(registry.rules_for(Construct::Typedef).all(|r| r.id != "typedef.suffix"));
        assert!(registry.get("typedef.suffix").is_some());
        assert!(registry.get(LEXICAL_ERROR).unwrap().enabled);
        assert!(registry.rules_for(Construct::Function).any(|r| r.id == "function.doc-comment"));
    }

    #[test]
    fn test_fingerprint_tracks_rule_changes() {
        let base = RuleRegistry::with_defaults().unwrap();
        let same = RuleRegistry::with_defaults().unwrap();
        assert_eq!(base.fingerprint(), same.fingerprint());

        let config = ConfigBuilder::new().severity("include.order", Severity::Info).build().unwrap();
        let changed = RuleRegistry::from_config(&config).unwrap();
        assert_ne!(base.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_stats() {
        let registry = RuleRegistry::with_defaults().unwrap();
        let stats = registry.stats();

        assert_eq!(stats.total_rules(), registry.len());
        assert_eq!(stats.disabled_rules, 1);
        assert_eq!(stats.custom_rules, 0);
        assert_eq!(stats.rules_by_construct[&Construct::Lexical], 2);
    }

    #[test]
    fn test_io_violation_uses_intrinsic_rule() {
        let registry = RuleRegistry::with_defaults().unwrap();
        let error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let violation = registry.io_violation(Path::new("src/missing.c"), &error);

        assert_eq!(violation.rule_id, IO_ERROR);
        assert_eq!((violation.line, violation.column), (1, 1));
        assert_eq!(violation.message, "cannot read file: gone");
    }
}
