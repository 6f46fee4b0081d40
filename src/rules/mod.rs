//! Rule registry, matchers and evaluator
//!
//! Architecture: Domain Services - Rules turn classified tokens into violations
//! - The registry owns the rules in force for a run
//! - Matchers are the checking strategies rules are built from
//! - The evaluator drives matchers over one file's tokens

pub mod evaluator;
pub mod matchers;
pub mod registry;

pub use evaluator::{FileContext, RuleEvaluator};
pub use matchers::{Finding, IncludeRank, Matcher, MatcherState, Placeholders};
pub use registry::{RegistryStats, Rule, RuleOrigin, RuleRegistry, IO_ERROR, LEXICAL_ERROR};
