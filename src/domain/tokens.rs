//! Lexical units produced by the source scanner
//!
//! Architecture: Value Objects - Tokens are immutable facts about source text
//! - Every token knows its position and the construct it belongs to
//! - Rules select tokens by construct, never by re-reading the source
//! - Scan failures travel in the token stream instead of aborting the scan

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source constructs that conventions apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Construct {
    Variable,
    Function,
    Macro,
    Enum,
    EnumConstant,
    /// Struct and union tags
    Struct,
    /// Struct and union members
    Field,
    Typedef,
    Header,
    IncludeOrder,
    Brace,
    File,
    /// Scan and IO failures
    Lexical,
}

impl Construct {
    pub const ALL: [Construct; 13] = [
        Construct::Variable,
        Construct::Function,
        Construct::Macro,
        Construct::Enum,
        Construct::EnumConstant,
        Construct::Struct,
        Construct::Field,
        Construct::Typedef,
        Construct::Header,
        Construct::IncludeOrder,
        Construct::Brace,
        Construct::File,
        Construct::Lexical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Function => "function",
            Self::Macro => "macro",
            Self::Enum => "enum",
            Self::EnumConstant => "enum_constant",
            Self::Struct => "struct",
            Self::Field => "field",
            Self::Typedef => "typedef",
            Self::Header => "header",
            Self::IncludeOrder => "include_order",
            Self::Brace => "brace",
            Self::File => "file",
            Self::Lexical => "lexical",
        }
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a declared name lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Global,
    Local,
    Parameter,
    Member,
}

/// Facts about a declared identifier gathered from its declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    pub scope: Scope,
    /// Declared with `[...]`
    pub is_array: bool,
    /// Base type contains `char`
    pub is_char: bool,
    pub is_pointer: bool,
    /// Declared `static`
    pub is_static: bool,
    /// Function definition (has a body) rather than a prototype
    pub is_definition: bool,
    /// A documentation comment directly precedes the declaration
    pub documented: bool,
}

/// Context a brace opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BraceContext {
    Function,
    /// struct or union body
    Aggregate,
    Enum,
    /// if/else/for/while/do/switch body
    Control,
    Initializer,
    /// `extern "C" {`
    Extern,
    /// Any other compound statement
    Block,
}

impl BraceContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Aggregate => "aggregate",
            Self::Enum => "enum",
            Self::Control => "control",
            Self::Initializer => "initializer",
            Self::Extern => "extern",
            Self::Block => "block",
        }
    }
}

/// A brace with its placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brace {
    pub open: bool,
    pub context: BraceContext,
    /// Nothing but whitespace precedes the brace on its line
    pub own_line: bool,
}

/// Preprocessor directives the checker understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `#include <path>` (system) or `#include "path"`
    Include { path: String, system: bool },
    Define { name: String, function_like: bool },
    Ifndef { name: String },
    Endif,
    /// `#if`, `#ifdef`, `#elif`, `#else`
    Conditional,
    Other { name: String },
}

/// Malformed lexical input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl From<ScanError> for crate::domain::violations::StyleError {
    fn from(error: ScanError) -> Self {
        Self::Scan { line: error.line, column: error.column, message: error.message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier; `construct` is `None` for plain references
    Identifier { construct: Option<Construct>, declaration: Declaration },
    Brace(Brace),
    Directive(Directive),
    Comment { doc: bool },
    StringLiteral,
    Malformed(ScanError),
    EndOfFile,
}

/// A classified lexical unit with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    /// Brace nesting depth at the token
    pub depth: u32,
}

impl Token {
    /// Constructs whose rules apply to this token
    pub fn targets(&self) -> &'static [Construct] {
        match &self.kind {
            TokenKind::Identifier { construct: Some(construct), .. } => match construct {
                Construct::Variable => &[Construct::Variable],
                Construct::Function => &[Construct::Function],
                Construct::Macro => &[Construct::Macro],
                Construct::Enum => &[Construct::Enum],
                Construct::EnumConstant => &[Construct::EnumConstant],
                Construct::Struct => &[Construct::Struct],
                Construct::Field => &[Construct::Field],
                Construct::Typedef => &[Construct::Typedef],
                _ => &[],
            },
            TokenKind::Directive(Directive::Include { .. }) => &[Construct::IncludeOrder],
            TokenKind::Brace(Brace { open: true, .. }) => &[Construct::Brace],
            TokenKind::Malformed(_) => &[Construct::Lexical],
            TokenKind::EndOfFile => &[Construct::File, Construct::Header],
            _ => &[],
        }
    }

    /// Declared construct of an identifier token
    pub fn construct(&self) -> Option<Construct> {
        match &self.kind {
            TokenKind::Identifier { construct, .. } => *construct,
            _ => None,
        }
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        match &self.kind {
            TokenKind::Identifier { declaration, .. } => Some(declaration),
            _ => None,
        }
    }

    /// Comments and the end marker carry no code
    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Comment { .. } | TokenKind::EndOfFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind) -> Token {
        Token { kind, text: String::new(), line: 1, column: 1, depth: 0 }
    }

    #[test]
    fn test_targets_follow_construct() {
        let ident = token(TokenKind::Identifier {
            construct: Some(Construct::Typedef),
            declaration: Declaration::default(),
        });
        assert_eq!(ident.targets(), &[Construct::Typedef]);

        let reference =
            token(TokenKind::Identifier { construct: None, declaration: Declaration::default() });
        assert!(reference.targets().is_empty());

        let include = token(TokenKind::Directive(Directive::Include {
            path: "stdio.h".into(),
            system: true,
        }));
        assert_eq!(include.targets(), &[Construct::IncludeOrder]);

        let close = token(TokenKind::Brace(Brace {
            open: false,
            context: BraceContext::Block,
            own_line: true,
        }));
        assert!(close.targets().is_empty());
    }

    #[test]
    fn test_end_of_file_reaches_file_and_header_rules() {
        let eof = token(TokenKind::EndOfFile);
        assert_eq!(eof.targets(), &[Construct::File, Construct::Header]);
        assert!(!eof.is_significant());
    }

    #[test]
    fn test_construct_serde_names() {
        let yaml = serde_yaml::to_string(&Construct::IncludeOrder).unwrap();
        assert_eq!(yaml.trim(), "include_order");
        assert_eq!(Construct::ALL.len(), 13);
    }
}
