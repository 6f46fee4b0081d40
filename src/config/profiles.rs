//! Built-in convention profiles
//!
//! The `guide` profile encodes the naming and layout conventions of the style
//! guide; `naming` and `layout` are its two halves.

use super::{default_guard_format, CaseStyle, MatcherSpec, RuleDefinition, RuleSet, TypeHint};
use crate::domain::tokens::{BraceContext, Construct};
use crate::domain::violations::Severity;

/// Verbs that must not open a variable name
pub const VERBS: &[&str] = &[
    "get", "set", "init", "run", "running", "start", "starting", "stop", "stopping", "open",
    "opening", "close", "closing", "read", "reading", "write", "writing", "send", "sending",
    "recv", "receive", "receiving", "create", "creating", "delete", "deleting", "update",
    "updating", "calc", "calculate", "parse", "parsing", "reset", "enable", "disable", "clear",
    "print", "load", "loading", "save", "saving",
];

/// Rule definitions of a profile, in registration order
pub fn rules_for(rule_set: RuleSet) -> Vec<RuleDefinition> {
    match rule_set {
        RuleSet::Guide => {
            let mut rules = naming_rules();
            rules.extend(layout_rules());
            rules
        }
        RuleSet::Naming => naming_rules(),
        RuleSet::Layout => layout_rules(),
        RuleSet::None => Vec::new(),
    }
}

fn rule(id: &str, target: Construct, matcher: MatcherSpec, message: &str) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        target,
        matcher,
        message: message.to_string(),
        severity: Severity::Error,
        enabled: true,
        description: None,
    }
}

fn case(style: CaseStyle) -> MatcherSpec {
    MatcherSpec::Case { style, strip_prefix: None, strip_suffix: None, allow_edge_underscores: false }
}

fn naming_rules() -> Vec<RuleDefinition> {
    let mut verb_led = rule(
        "variable.verb-led",
        Construct::Variable,
        MatcherSpec::LeadingWord { words: VERBS.iter().map(|w| w.to_string()).collect() },
        "variable '{name}' starts with the verb '{word}'; name variables after what they hold",
    );
    verb_led.description = Some(
        "Variables name things, functions name actions. A variable such as `runningDevice` reads \
         like a function call; prefer `activeDevice` or `deviceState`."
            .to_string(),
    );

    let mut string_hint = rule(
        "variable.string-hint",
        Construct::Variable,
        MatcherSpec::TypeHint { hint: TypeHint::String, prefix: Some("str".into()), suffix: None },
        "character array '{name}' must start with '{expected}'",
    );
    string_hint.severity = Severity::Warning;

    let mut array_hint = rule(
        "variable.array-hint",
        Construct::Variable,
        MatcherSpec::TypeHint { hint: TypeHint::Array, prefix: None, suffix: Some("Arr".into()) },
        "array '{name}' must end with '{expected}'",
    );
    array_hint.severity = Severity::Warning;

    vec![
        rule(
            "variable.naming-case",
            Construct::Variable,
            case(CaseStyle::LowerCamel),
            "variable '{name}' must be {expected}",
        ),
        verb_led,
        string_hint,
        array_hint,
        rule(
            "function.naming-case",
            Construct::Function,
            case(CaseStyle::LowerCamel),
            "function '{name}' must be {expected}",
        ),
        rule(
            "macro.naming-case",
            Construct::Macro,
            MatcherSpec::Case {
                style: CaseStyle::UpperSnake,
                strip_prefix: None,
                strip_suffix: None,
                allow_edge_underscores: true,
            },
            "macro '{name}' must be {expected}",
        ),
        rule("enum.naming-case", Construct::Enum, case(CaseStyle::Pascal), "enum '{name}' must be {expected}"),
        rule(
            "enum.constant-case",
            Construct::EnumConstant,
            case(CaseStyle::UpperSnake),
            "enum constant '{name}' must be {expected}",
        ),
        rule(
            "struct.naming-case",
            Construct::Struct,
            case(CaseStyle::Pascal),
            "struct '{name}' must be {expected}",
        ),
        rule("field.naming-case", Construct::Field, case(CaseStyle::LowerCamel), "field '{name}' must be {expected}"),
        rule(
            "typedef.suffix",
            Construct::Typedef,
            MatcherSpec::Suffix { value: "_t".into() },
            "typedef '{name}' must end with '{expected}'",
        ),
        rule(
            "typedef.naming-case",
            Construct::Typedef,
            MatcherSpec::Case {
                style: CaseStyle::Pascal,
                strip_prefix: None,
                strip_suffix: Some("_t".into()),
                allow_edge_underscores: false,
            },
            "typedef '{name}' must be {expected} before its '_t' suffix",
        ),
    ]
}

fn layout_rules() -> Vec<RuleDefinition> {
    let mut header_guard = rule(
        "header.guard",
        Construct::Header,
        MatcherSpec::HeaderGuard { format: default_guard_format() },
        "header must be wrapped in '#ifndef {expected}' / '#define {expected}' / '#endif' (found {actual})",
    );
    header_guard.description = Some(
        "Every header starts with `#ifndef __NAME_H__` and `#define __NAME_H__` and ends with \
         `#endif`, where NAME is the upper-cased file name."
            .to_string(),
    );

    let mut include_order = rule(
        "include.order",
        Construct::IncludeOrder,
        MatcherSpec::IncludeOrder { standard_headers: Vec::new() },
        "{actual} include '{name}' must come before {expected} includes",
    );
    include_order.description = Some(
        "Within a block of includes, standard library headers come first, then third-party \
         headers, then headers of the project itself."
            .to_string(),
    );

    let mut function_order = rule(
        "function.order",
        Construct::Function,
        MatcherSpec::FunctionOrder,
        "static function '{name}' must be defined before the public functions",
    );
    function_order.severity = Severity::Warning;

    let mut doc_comment = rule(
        "function.doc-comment",
        Construct::Function,
        MatcherSpec::DocComment { include_static: false },
        "public function '{name}' has no documentation comment",
    );
    doc_comment.severity = Severity::Info;
    doc_comment.enabled = false;

    vec![
        header_guard,
        include_order,
        rule(
            "layout.function-brace",
            Construct::Brace,
            MatcherSpec::BracePlacement { contexts: vec![BraceContext::Function], own_line: true },
            "opening brace of a {actual} body must be on its own line",
        ),
        rule(
            "layout.block-brace",
            Construct::Brace,
            MatcherSpec::BracePlacement {
                contexts: vec![BraceContext::Aggregate, BraceContext::Enum, BraceContext::Control],
                own_line: false,
            },
            "opening brace of a {actual} block must end the line that opens it",
        ),
        function_order,
        rule(
            "file.naming-case",
            Construct::File,
            MatcherSpec::FileName { style: CaseStyle::LowerSnake },
            "file name '{name}' must be {expected}",
        ),
        doc_comment,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guide_is_naming_then_layout() {
        let guide: Vec<_> = rules_for(RuleSet::Guide).into_iter().map(|r| r.id).collect();
        let mut expected: Vec<_> = rules_for(RuleSet::Naming).into_iter().map(|r| r.id).collect();
        expected.extend(rules_for(RuleSet::Layout).into_iter().map(|r| r.id));

        assert_eq!(guide, expected);
        assert!(rules_for(RuleSet::None).is_empty());
    }

    #[test]
    fn test_profile_rules_target_their_constructs() {
        for definition in rules_for(RuleSet::Guide) {
            assert!(
                definition.matcher.accepts(definition.target),
                "{} aims {} at {}",
                definition.id,
                definition.matcher.kind(),
                definition.target
            );
        }
    }

    #[test]
    fn test_doc_comment_ships_disabled() {
        let doc = rules_for(RuleSet::Layout).into_iter().find(|r| r.id == "function.doc-comment").unwrap();
        assert!(!doc.enabled);
    }
}
