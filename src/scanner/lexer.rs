//! Character-level lexer for C-like source text
//!
//! Produces raw lexemes lazily. Preprocessor lines are kept whole (including
//! backslash continuations) and trailing comments on a directive line are
//! lexed as separate comment lexemes.

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexemeKind {
    Ident,
    Keyword,
    Number,
    Str,
    Char,
    Punct(char),
    Comment { doc: bool },
    Directive,
    /// Unterminated comment, string or character literal
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
    pub kind: LexemeKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    /// No other lexeme precedes this one on its line
    pub first_on_line: bool,
}

impl Lexeme {
    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == LexemeKind::Punct(ch)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == LexemeKind::Keyword && self.text == word
    }

    pub fn is_ident(&self) -> bool {
        self.kind == LexemeKind::Ident
    }

    /// Comments, directives and errors do not take part in statement shape
    pub fn is_code(&self) -> bool {
        !matches!(
            self.kind,
            LexemeKind::Comment { .. } | LexemeKind::Directive | LexemeKind::Error
        )
    }
}

const KEYWORDS: &[&str] = &[
    "auto",
    "break",
    "case",
    "char",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extern",
    "float",
    "for",
    "goto",
    "if",
    "inline",
    "int",
    "long",
    "register",
    "restrict",
    "return",
    "short",
    "signed",
    "sizeof",
    "static",
    "struct",
    "switch",
    "typedef",
    "union",
    "unsigned",
    "void",
    "volatile",
    "while",
    "bool",
    "_Alignas",
    "_Alignof",
    "_Atomic",
    "_Bool",
    "_Complex",
    "_Generic",
    "_Imaginary",
    "_Noreturn",
    "_Static_assert",
    "_Thread_local",
    "__attribute__",
    "__inline",
    "__inline__",
    "__restrict",
    "__volatile__",
    "__asm__",
    "asm",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Lazy lexeme iterator over a source string
pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    column: u32,
    /// Line of the most recently produced lexeme
    last_lexeme_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            last_lexeme_line: 0,
        }
    }

    /// Current line; after exhaustion this is the last line of the input
    pub fn line(&self) -> u32 {
        self.line
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.source.len())
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '\\' && matches!(self.peek_second(), Some('\n') | Some('\r')) {
                // stray line continuation outside a directive
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_line_comment(&mut self, start: usize) -> (LexemeKind, usize) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
        let end = self.offset();
        let text = &self.source[start..end];
        let doc = text.starts_with("///") || text.starts_with("//!");
        (LexemeKind::Comment { doc }, end)
    }

    fn lex_block_comment(&mut self, start: usize) -> (LexemeKind, usize) {
        // opening "/*" already consumed
        let mut previous = '\0';
        while let Some(ch) = self.bump() {
            if previous == '*' && ch == '/' {
                let end = self.offset();
                let text = &self.source[start..end];
                let doc = (text.starts_with("/**") && text != "/**/") || text.starts_with("/*!");
                return (LexemeKind::Comment { doc }, end);
            }
            previous = ch;
        }
        (LexemeKind::Error, self.source.len())
    }

    fn lex_quoted(&mut self, quote: char) -> LexemeKind {
        // opening quote already consumed
        while let Some(ch) = self.peek() {
            match ch {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => return LexemeKind::Error,
                c if c == quote => {
                    self.bump();
                    return if quote == '"' { LexemeKind::Str } else { LexemeKind::Char };
                }
                _ => {
                    self.bump();
                }
            }
        }
        LexemeKind::Error
    }

    fn lex_directive(&mut self) {
        // only include-like directives quote their argument with <...>
        let start = self.offset();
        let word: String = self.source[start..]
            .trim_start_matches([' ', '\t'])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        let angle_quotes = matches!(word.as_str(), "include" | "include_next" | "import");

        let mut in_quote: Option<char> = None;
        while let Some(ch) = self.peek() {
            match ch {
                '\n' => break,
                '\\' if in_quote.is_some() && in_quote != Some('>') => {
                    self.bump();
                    if self.peek() != Some('\n') {
                        self.bump();
                    }
                }
                '\\' if in_quote.is_none()
                    && matches!(self.peek_second(), Some('\n') | Some('\r')) =>
                {
                    self.bump();
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    self.bump();
                }
                '"' | '\'' if in_quote.is_none() => {
                    in_quote = Some(ch);
                    self.bump();
                }
                '<' if in_quote.is_none() && angle_quotes => {
                    in_quote = Some('>');
                    self.bump();
                }
                c if Some(c) == in_quote => {
                    in_quote = None;
                    self.bump();
                }
                '/' if in_quote.is_none()
                    && matches!(self.peek_second(), Some('/') | Some('*')) =>
                {
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn lex_number(&mut self) {
        let mut previous = '\0';
        while let Some(ch) = self.peek() {
            let exponent_sign =
                (ch == '+' || ch == '-') && matches!(previous, 'e' | 'E' | 'p' | 'P');
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || exponent_sign {
                previous = ch;
                self.bump();
            } else {
                break;
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Lexeme;

    fn next(&mut self) -> Option<Lexeme> {
        self.skip_whitespace();

        let start = self.offset();
        let line = self.line;
        let column = self.column;
        let first_on_line = self.last_lexeme_line != line;
        let ch = self.bump()?;

        let kind = match ch {
            '#' if first_on_line => {
                self.lex_directive();
                LexemeKind::Directive
            }
            '/' if self.peek() == Some('/') => {
                let (kind, _) = self.lex_line_comment(start);
                kind
            }
            '/' if self.peek() == Some('*') => {
                self.bump();
                let (kind, _) = self.lex_block_comment(start);
                kind
            }
            '"' | '\'' => self.lex_quoted(ch),
            c if c.is_ascii_alphabetic() || c == '_' => {
                while let Some(next) = self.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        self.bump();
                    } else {
                        break;
                    }
                }
                let word = &self.source[start..self.offset()];
                let string_prefix = matches!(word, "L" | "u" | "U" | "u8");
                match self.peek() {
                    Some(quote @ ('"' | '\'')) if string_prefix => {
                        self.bump();
                        self.lex_quoted(quote)
                    }
                    _ if is_keyword(word) => LexemeKind::Keyword,
                    _ => LexemeKind::Ident,
                }
            }
            c if c.is_ascii_digit() => {
                self.lex_number();
                LexemeKind::Number
            }
            '.' if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) => {
                self.lex_number();
                LexemeKind::Number
            }
            c => LexemeKind::Punct(c),
        };

        let end = self.offset();
        self.last_lexeme_line = self.line;
        Some(Lexeme {
            kind,
            text: self.source[start..end].trim_end_matches(&['\r', '\n'][..]).to_string(),
            line,
            column,
            first_on_line,
        })
    }
}
