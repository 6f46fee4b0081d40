//! Compiled matchers applied to classified tokens
//!
//! Architecture: Strategy Pattern - Each matcher kind is one checking strategy
//! - Matchers are compiled once from their data description
//! - Stateful matchers keep their state outside themselves, one state per rule per file
//! - A matcher answers with at most one finding per token

use crate::config::{CaseStyle, MatcherSpec, TypeHint};
use crate::domain::tokens::{BraceContext, Directive, Scope, Token, TokenKind};
use crate::domain::violations::{StyleError, StyleResult};
use crate::rules::evaluator::FileContext;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref UPPER_SNAKE: Regex = Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)*$").unwrap();
    static ref PASCAL: Regex = Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap();
    static ref LOWER_CAMEL: Regex = Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap();
    static ref LOWER_SNAKE: Regex = Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").unwrap();
}

/// Headers of the C standard library and POSIX ranked as standard includes
const STANDARD_HEADERS: &[&str] = &[
    "assert.h", "complex.h", "ctype.h", "errno.h", "fenv.h", "float.h", "inttypes.h", "iso646.h",
    "limits.h", "locale.h", "math.h", "setjmp.h", "signal.h", "stdalign.h", "stdarg.h",
    "stdatomic.h", "stdbool.h", "stddef.h", "stdint.h", "stdio.h", "stdlib.h", "stdnoreturn.h",
    "string.h", "tgmath.h", "threads.h", "time.h", "uchar.h", "wchar.h", "wctype.h", "dirent.h",
    "fcntl.h", "pthread.h", "poll.h", "sched.h", "semaphore.h", "strings.h", "syslog.h",
    "termios.h", "unistd.h",
];

impl CaseStyle {
    /// Whether `name` is written in this style
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::UpperSnake => UPPER_SNAKE.is_match(name),
            Self::Pascal => PASCAL.is_match(name),
            Self::LowerCamel => LOWER_CAMEL.is_match(name),
            Self::LowerSnake => LOWER_SNAKE.is_match(name),
        }
    }

    /// Rewrite `name` in this style
    pub fn convert(self, name: &str) -> String {
        let words = split_words(name);
        match self {
            Self::UpperSnake => {
                words.iter().map(|w| w.to_ascii_uppercase()).collect::<Vec<_>>().join("_")
            }
            Self::LowerSnake => {
                words.iter().map(|w| w.to_ascii_lowercase()).collect::<Vec<_>>().join("_")
            }
            Self::Pascal => words.iter().map(|w| capitalize(w)).collect(),
            Self::LowerCamel => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_ascii_lowercase() } else { capitalize(w) })
                .collect(),
        }
    }
}

/// Split an identifier into words at underscores and case changes.
///
/// `HTTPServerPort` splits into `HTTP`, `Server`, `Port`.
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    for part in name.split('_').filter(|p| !p.is_empty()) {
        let chars: Vec<char> = part.chars().collect();
        let mut current = String::new();
        for (i, &ch) in chars.iter().enumerate() {
            let boundary = i > 0
                && ch.is_ascii_uppercase()
                && (chars[i - 1].is_ascii_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || (chars[i - 1].is_ascii_uppercase()
                        && chars.get(i + 1).map(|c| c.is_ascii_lowercase()).unwrap_or(false)));
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(ch);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Values substituted into a rule's message template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub name: String,
    pub expected: String,
    pub word: String,
    pub actual: String,
}

impl Placeholders {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Substitute `{name}`, `{expected}`, `{word}` and `{actual}`; other braces stay as written
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{name}", &self.name)
            .replace("{expected}", &self.expected)
            .replace("{word}", &self.word)
            .replace("{actual}", &self.actual)
    }
}

/// One deviation found by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: u32,
    pub column: u32,
    pub values: Placeholders,
    pub suggestion: Option<String>,
}

impl Finding {
    fn at(token: &Token, values: Placeholders) -> Self {
        Self { line: token.line, column: token.column, values, suggestion: None }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Include categories in their required order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IncludeRank {
    Standard,
    ThirdParty,
    Project,
}

impl IncludeRank {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ThirdParty => "third-party",
            Self::Project => "project",
        }
    }
}

/// Per-file state of a stateful matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherState {
    Stateless,
    IncludeOrder { block: u32, highest: Option<IncludeRank>, reported: bool },
    FunctionOrder { seen_public: bool },
}

/// A compiled matcher
#[derive(Debug, Clone)]
pub enum Matcher {
    Case {
        style: CaseStyle,
        strip_prefix: Option<String>,
        strip_suffix: Option<String>,
        allow_edge_underscores: bool,
    },
    Prefix(String),
    Suffix(String),
    Regex { regex: Regex, must_match: bool },
    /// Lower-cased forbidden leading words
    LeadingWord(HashSet<String>),
    TypeHint { hint: TypeHint, prefix: Option<String>, suffix: Option<String> },
    IncludeOrder { extra_standard: HashSet<String> },
    HeaderGuard { format: String },
    BracePlacement { contexts: Vec<BraceContext>, own_line: bool },
    FunctionOrder,
    DocComment { include_static: bool },
    FileName(CaseStyle),
    /// Reports scan errors carried in the token stream
    Malformed,
    /// Never matches tokens; the analyzer reports unreadable files directly
    Unreadable,
}

impl Matcher {
    pub fn compile(spec: &MatcherSpec) -> StyleResult<Self> {
        let matcher = match spec {
            MatcherSpec::Case { style, strip_prefix, strip_suffix, allow_edge_underscores } => {
                Self::Case {
                    style: *style,
                    strip_prefix: strip_prefix.clone(),
                    strip_suffix: strip_suffix.clone(),
                    allow_edge_underscores: *allow_edge_underscores,
                }
            }
            MatcherSpec::Prefix { value } => Self::Prefix(value.clone()),
            MatcherSpec::Suffix { value } => Self::Suffix(value.clone()),
            MatcherSpec::Regex { pattern, must_match } => Self::Regex {
                regex: Regex::new(pattern)
                    .map_err(|e| StyleError::pattern(format!("Invalid regex '{pattern}': {e}")))?,
                must_match: *must_match,
            },
            MatcherSpec::LeadingWord { words } => {
                if words.is_empty() {
                    return Err(StyleError::config("leading_word matcher needs at least one word"));
                }
                Self::LeadingWord(words.iter().map(|w| w.to_ascii_lowercase()).collect())
            }
            MatcherSpec::TypeHint { hint, prefix, suffix } => {
                if prefix.is_none() && suffix.is_none() {
                    return Err(StyleError::config("type_hint matcher needs a prefix or a suffix"));
                }
                Self::TypeHint { hint: *hint, prefix: prefix.clone(), suffix: suffix.clone() }
            }
            MatcherSpec::IncludeOrder { standard_headers } => {
                Self::IncludeOrder { extra_standard: standard_headers.iter().cloned().collect() }
            }
            MatcherSpec::HeaderGuard { format } => {
                if !format.contains("{STEM}") {
                    return Err(StyleError::config(format!(
                        "header guard format '{format}' must contain {{STEM}}"
                    )));
                }
                Self::HeaderGuard { format: format.clone() }
            }
            MatcherSpec::BracePlacement { contexts, own_line } => {
                Self::BracePlacement { contexts: contexts.clone(), own_line: *own_line }
            }
            MatcherSpec::FunctionOrder => Self::FunctionOrder,
            MatcherSpec::DocComment { include_static } => {
                Self::DocComment { include_static: *include_static }
            }
            MatcherSpec::FileName { style } => Self::FileName(*style),
        };
        Ok(matcher)
    }

    /// Fresh state for a new file
    pub fn initial_state(&self) -> MatcherState {
        match self {
            Self::IncludeOrder { .. } => {
                MatcherState::IncludeOrder { block: 0, highest: None, reported: false }
            }
            Self::FunctionOrder => MatcherState::FunctionOrder { seen_public: false },
            _ => MatcherState::Stateless,
        }
    }

    /// Check one token
    pub fn check(&self, token: &Token, file: &FileContext, state: &mut MatcherState) -> Option<Finding> {
        match self {
            Self::Case { style, strip_prefix, strip_suffix, allow_edge_underscores } => {
                let name = token.text.as_str();
                let mut start = 0;
                let mut end = name.len();
                if let Some(prefix) = strip_prefix.as_deref().filter(|p| name.starts_with(p)) {
                    start = prefix.len();
                }
                if let Some(suffix) = strip_suffix.as_deref().filter(|s| name[start..].ends_with(s)) {
                    end -= suffix.len();
                }
                if *allow_edge_underscores {
                    while start < end && name[start..end].starts_with('_') {
                        start += 1;
                    }
                    while start < end && name[start..end].ends_with('_') {
                        end -= 1;
                    }
                }
                let core = &name[start..end];
                if core.is_empty() || style.matches(core) {
                    return None;
                }
                let suggestion = format!("{}{}{}", &name[..start], style.convert(core), &name[end..]);
                Some(
                    Finding::at(
                        token,
                        Placeholders {
                            expected: style.as_str().to_string(),
                            actual: name.to_string(),
                            ..Placeholders::named(name)
                        },
                    )
                    .suggest(format!("rename to '{suggestion}'")),
                )
            }
            Self::Prefix(prefix) => (!token.text.starts_with(prefix.as_str())).then(|| {
                Finding::at(
                    token,
                    Placeholders { expected: prefix.clone(), ..Placeholders::named(&token.text) },
                )
                .suggest(format!("rename to '{}{}'", prefix, token.text))
            }),
            Self::Suffix(suffix) => (!token.text.ends_with(suffix.as_str())).then(|| {
                Finding::at(
                    token,
                    Placeholders { expected: suffix.clone(), ..Placeholders::named(&token.text) },
                )
                .suggest(format!("rename to '{}{}'", token.text, suffix))
            }),
            Self::Regex { regex, must_match } => match (regex.find(&token.text), *must_match) {
                (None, true) => Some(Finding::at(
                    token,
                    Placeholders { expected: regex.as_str().to_string(), ..Placeholders::named(&token.text) },
                )),
                (Some(found), false) => Some(Finding::at(
                    token,
                    Placeholders {
                        expected: regex.as_str().to_string(),
                        actual: found.as_str().to_string(),
                        ..Placeholders::named(&token.text)
                    },
                )),
                _ => None,
            },
            Self::LeadingWord(words) => {
                let first = split_words(&token.text).into_iter().next()?;
                if !words.contains(&first.to_ascii_lowercase()) {
                    return None;
                }
                Some(Finding::at(token, Placeholders { word: first, ..Placeholders::named(&token.text) }))
            }
            Self::TypeHint { hint, prefix, suffix } => {
                let declaration = token.declaration()?;
                // an array parameter is adjusted to a pointer
                let decays = declaration.is_array && declaration.scope == Scope::Parameter;
                let is_array = declaration.is_array && !decays;
                let is_pointer = declaration.is_pointer || decays;
                let applies = match hint {
                    TypeHint::String => is_array && declaration.is_char && !is_pointer,
                    TypeHint::Array => is_array && (!declaration.is_char || is_pointer),
                    TypeHint::Pointer => is_pointer && !is_array,
                };
                if !applies {
                    return None;
                }
                let name = token.text.as_str();
                if let Some(prefix) = prefix.as_deref().filter(|p| !name.starts_with(p)) {
                    return Some(
                        Finding::at(
                            token,
                            Placeholders {
                                expected: prefix.to_string(),
                                actual: hint.as_str().to_string(),
                                ..Placeholders::named(name)
                            },
                        )
                        .suggest(format!("rename to '{}{}'", prefix, capitalize_first(name))),
                    );
                }
                if let Some(suffix) = suffix.as_deref().filter(|s| !name.ends_with(s)) {
                    return Some(
                        Finding::at(
                            token,
                            Placeholders {
                                expected: suffix.to_string(),
                                actual: hint.as_str().to_string(),
                                ..Placeholders::named(name)
                            },
                        )
                        .suggest(format!("rename to '{name}{suffix}'")),
                    );
                }
                None
            }
            Self::IncludeOrder { extra_standard } => {
                let TokenKind::Directive(Directive::Include { path, system }) = &token.kind else {
                    return None;
                };
                let rank = include_rank(path, *system, extra_standard);
                let MatcherState::IncludeOrder { block, highest, reported } = state else {
                    return None;
                };
                if *block != file.include_block() {
                    *block = file.include_block();
                    *highest = None;
                    *reported = false;
                }
                match *highest {
                    Some(top) if rank < top => {
                        if *reported {
                            return None;
                        }
                        *reported = true;
                        Some(Finding::at(
                            token,
                            Placeholders {
                                expected: top.as_str().to_string(),
                                actual: rank.as_str().to_string(),
                                ..Placeholders::named(path.as_str())
                            },
                        ))
                    }
                    _ => {
                        *highest = Some(rank);
                        None
                    }
                }
            }
            Self::HeaderGuard { format } => {
                if token.kind != TokenKind::EndOfFile || !file.is_header() {
                    return None;
                }
                let expected = format.replace("{STEM}", &guard_stem(file.stem()));
                let (opening, define, closed) = file.guard_shape();
                let actual = match (opening, define) {
                    (Some((name, _)), Some(defined)) if name == expected && defined == expected && closed => {
                        return None;
                    }
                    (Some((name, _)), _) if name != expected => format!("'{name}'"),
                    (Some(_), _) => "an incomplete guard".to_string(),
                    (None, _) => "no guard".to_string(),
                };
                let (line, column) = opening.map(|(_, position)| position).unwrap_or((1, 1));
                Some(Finding {
                    line,
                    column,
                    values: Placeholders { expected, actual, ..Placeholders::named(file.file_name()) },
                    suggestion: None,
                })
            }
            Self::BracePlacement { contexts, own_line } => {
                let TokenKind::Brace(brace) = &token.kind else {
                    return None;
                };
                if !brace.open || !contexts.contains(&brace.context) || brace.own_line == *own_line {
                    return None;
                }
                let expected = if *own_line { "on its own line" } else { "at the end of the line" };
                Some(
                    Finding::at(
                        token,
                        Placeholders {
                            name: token.text.clone(),
                            expected: expected.to_string(),
                            actual: brace.context.as_str().to_string(),
                            ..Default::default()
                        },
                    )
                    .suggest(format!("place the brace {expected}")),
                )
            }
            Self::FunctionOrder => {
                let declaration = token.declaration()?;
                let MatcherState::FunctionOrder { seen_public } = state else {
                    return None;
                };
                if !declaration.is_definition {
                    return None;
                }
                if !declaration.is_static {
                    *seen_public = true;
                    return None;
                }
                (*seen_public).then(|| Finding::at(token, Placeholders::named(&token.text)))
            }
            Self::DocComment { include_static } => {
                let declaration = token.declaration()?;
                if declaration.is_static && !include_static {
                    return None;
                }
                // headers document prototypes, sources document definitions
                let applies = declaration.is_definition != file.is_header();
                (applies && !declaration.documented)
                    .then(|| Finding::at(token, Placeholders::named(&token.text)))
            }
            Self::FileName(style) => {
                if token.kind != TokenKind::EndOfFile || file.stem().is_empty() || style.matches(file.stem()) {
                    return None;
                }
                let renamed = match file.extension() {
                    Some(extension) => format!("{}.{}", style.convert(file.stem()), extension),
                    None => style.convert(file.stem()),
                };
                Some(Finding {
                    line: 1,
                    column: 1,
                    values: Placeholders {
                        expected: style.as_str().to_string(),
                        actual: file.stem().to_string(),
                        ..Placeholders::named(file.file_name())
                    },
                    suggestion: Some(format!("rename the file to '{renamed}'")),
                })
            }
            Self::Malformed => match &token.kind {
                TokenKind::Malformed(error) => Some(Finding {
                    line: error.line,
                    column: error.column,
                    values: Placeholders { actual: error.message.clone(), ..Placeholders::named(&token.text) },
                    suggestion: None,
                }),
                _ => None,
            },
            Self::Unreadable => None,
        }
    }
}

fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Rank an include by its spelling
pub fn include_rank(path: &str, system: bool, extra_standard: &HashSet<String>) -> IncludeRank {
    if !system {
        IncludeRank::Project
    } else if STANDARD_HEADERS.contains(&path) || path.starts_with("sys/") || extra_standard.contains(path) {
        IncludeRank::Standard
    } else {
        IncludeRank::ThirdParty
    }
}

/// Upper-cased file stem with every non-alphanumeric character replaced by `_`
pub fn guard_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
