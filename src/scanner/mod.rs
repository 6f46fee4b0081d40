//! Source scanner turning C text into classified tokens
//!
//! Architecture: Pipeline Stage - Scanner is the lexical front of the checker
//! - The lexer yields raw lexemes; the classifier groups them into statements
//! - Each statement is classified by shape alone (no type resolution, no grammar)
//! - Tokens are emitted lazily, in strict source order, one statement at a time

mod lexer;

use crate::domain::tokens::{
    Brace, BraceContext, Construct, Declaration, Directive, ScanError, Scope, Token, TokenKind,
};
use lexer::{Lexeme, LexemeKind, Lexer};
use std::collections::{HashMap, HashSet, VecDeque};

/// Scanner over one source text
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    source: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Lazy token stream; every call starts again from the beginning of the text
    pub fn tokens(&self) -> TokenStream<'a> {
        TokenStream::new(self.source)
    }

    /// Collect the whole stream
    pub fn scan_all(&self) -> Vec<Token> {
        self.tokens().collect()
    }

    /// Scan errors found in the text
    pub fn errors(&self) -> Vec<ScanError> {
        self.tokens()
            .filter_map(|token| match token.kind {
                TokenKind::Malformed(error) => Some(error),
                _ => None,
            })
            .collect()
    }
}

/// An open brace on the nesting stack
#[derive(Debug, Clone, Copy)]
struct Frame {
    context: BraceContext,
    /// Set for struct/union/enum bodies; `true` when introduced by `typedef`
    type_body: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Semicolon,
    Open,
    Close,
    /// A scan error interrupted the statement
    Broken,
    EndOfInput,
}

/// Per-identifier classification of one statement
type Classes = HashMap<usize, (Construct, Declaration)>;

/// Lazy, finite token iterator produced by [`Scanner::tokens`]
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    ready: VecDeque<Token>,
    stack: Vec<Frame>,
    finished: bool,
    /// Next statement declares names for a just-closed struct/union/enum body
    after_type_body: Option<bool>,
    /// Last thing seen between statements was a documentation comment
    doc_pending: bool,
    /// Typedef names declared so far in this file
    known_types: HashSet<String>,
}

impl<'a> TokenStream<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            ready: VecDeque::new(),
            stack: Vec::new(),
            finished: false,
            after_type_body: None,
            doc_pending: false,
            known_types: HashSet::new(),
        }
    }

    fn depth(&self) -> u32 {
        self.stack.len() as u32
    }

    fn context(&self) -> Option<BraceContext> {
        self.stack.last().map(|frame| frame.context)
    }

    fn at_file_scope(&self) -> bool {
        matches!(self.context(), None | Some(BraceContext::Extern))
    }

    /// Read one statement worth of lexemes and queue its tokens
    fn fill(&mut self) {
        let mut chunk: Vec<Lexeme> = Vec::new();
        let mut documented = false;
        let mut parens = 0i32;
        let mut inner_braces = 0u32;

        let terminator = loop {
            let Some(lexeme) = self.lexer.next() else {
                break Terminator::EndOfInput;
            };

            if chunk.is_empty() {
                match lexeme.kind {
                    LexemeKind::Comment { doc } => {
                        self.doc_pending = doc;
                        self.emit_lexeme(&lexeme, None);
                        return;
                    }
                    LexemeKind::Directive | LexemeKind::Error => {
                        self.doc_pending = false;
                        self.emit_lexeme(&lexeme, None);
                        return;
                    }
                    _ => {
                        documented = self.doc_pending;
                        self.doc_pending = false;
                    }
                }
            }

            let kind = lexeme.kind;
            chunk.push(lexeme);
            match kind {
                LexemeKind::Punct('(') | LexemeKind::Punct('[') => parens += 1,
                LexemeKind::Punct(')') | LexemeKind::Punct(']') => parens -= 1,
                LexemeKind::Punct(';') if parens <= 0 => break Terminator::Semicolon,
                LexemeKind::Punct('{') if parens <= 0 => break Terminator::Open,
                // compound literal inside an argument list
                LexemeKind::Punct('{') => inner_braces += 1,
                LexemeKind::Punct('}') if inner_braces > 0 => inner_braces -= 1,
                LexemeKind::Punct('}') => break Terminator::Close,
                LexemeKind::Error => break Terminator::Broken,
                _ => {}
            }
        };

        if !chunk.is_empty() {
            self.process_statement(chunk, terminator, documented);
        }

        if terminator == Terminator::EndOfInput {
            self.finished = true;
            let line = self.lexer.line();
            self.ready.push_back(Token {
                kind: TokenKind::EndOfFile,
                text: String::new(),
                line,
                column: 1,
                depth: self.depth(),
            });
        }
    }

    fn process_statement(&mut self, chunk: Vec<Lexeme>, terminator: Terminator, documented: bool) {
        // indices of code lexemes, excluding the terminating brace or semicolon
        let mut code: Vec<usize> = (0..chunk.len()).filter(|&i| chunk[i].is_code()).collect();
        if matches!(terminator, Terminator::Semicolon | Terminator::Open | Terminator::Close) {
            code.pop();
        }

        let mut classes = Classes::new();
        let mut opened: Option<Frame> = None;

        let type_body = self.after_type_body.take();

        match terminator {
            Terminator::Open => {
                let frame = self.classify_opening(&chunk, &code, documented, &mut classes);
                opened = Some(frame);
            }
            Terminator::Close => {
                if self.context() == Some(BraceContext::Enum) {
                    classify_enum_constants(&chunk, &code, &mut classes);
                }
            }
            Terminator::Semicolon | Terminator::Broken | Terminator::EndOfInput => {
                if let Some(typedef) = type_body {
                    self.classify_type_body_names(&chunk, &code, typedef, &mut classes);
                } else {
                    self.classify_statement(&chunk, &code, documented, &mut classes);
                }
            }
        }

        for (index, lexeme) in chunk.iter().enumerate() {
            match (lexeme.kind, terminator) {
                (LexemeKind::Punct('{'), Terminator::Open) if index == chunk.len() - 1 => {
                    let frame = opened.unwrap_or(Frame {
                        context: BraceContext::Block,
                        type_body: None,
                    });
                    self.push_brace(lexeme, true, frame.context);
                    self.stack.push(frame);
                }
                (LexemeKind::Punct('}'), Terminator::Close) if index == chunk.len() - 1 => {
                    let frame = self.stack.pop();
                    let context = frame.map(|f| f.context).unwrap_or(BraceContext::Block);
                    self.push_brace(lexeme, false, context);
                    if let Some(Frame { type_body: Some(typedef), .. }) = frame {
                        self.after_type_body = Some(typedef);
                    }
                }
                _ => self.emit_lexeme(lexeme, classes.remove(&index)),
            }
        }
    }

    fn push_brace(&mut self, lexeme: &Lexeme, open: bool, context: BraceContext) {
        self.ready.push_back(Token {
            kind: TokenKind::Brace(Brace { open, context, own_line: lexeme.first_on_line }),
            text: lexeme.text.clone(),
            line: lexeme.line,
            column: lexeme.column,
            depth: self.depth(),
        });
    }

    fn emit_lexeme(&mut self, lexeme: &Lexeme, class: Option<(Construct, Declaration)>) {
        let depth = self.depth();
        let kind = match lexeme.kind {
            LexemeKind::Ident => {
                let (construct, declaration) = match class {
                    Some((construct, declaration)) => (Some(construct), declaration),
                    None => (None, Declaration::default()),
                };
                TokenKind::Identifier { construct, declaration }
            }
            LexemeKind::Str => TokenKind::StringLiteral,
            LexemeKind::Comment { doc } => TokenKind::Comment { doc },
            LexemeKind::Error => TokenKind::Malformed(ScanError {
                line: lexeme.line,
                column: lexeme.column,
                message: describe_error(&lexeme.text),
            }),
            LexemeKind::Directive => {
                self.emit_directive(lexeme);
                return;
            }
            _ => return,
        };

        self.ready.push_back(Token {
            kind,
            text: lexeme.text.clone(),
            line: lexeme.line,
            column: lexeme.column,
            depth,
        });
    }

    fn emit_directive(&mut self, lexeme: &Lexeme) {
        let (directive, name_offset) = parse_directive(&lexeme.text);
        let depth = self.depth();
        let first_line = lexeme.text.lines().next().unwrap_or_default().trim_end().to_string();

        let macro_name = match &directive {
            Directive::Define { name, .. } => Some(name.clone()),
            _ => None,
        };

        self.ready.push_back(Token {
            kind: TokenKind::Directive(directive),
            text: first_line,
            line: lexeme.line,
            column: lexeme.column,
            depth,
        });

        if let (Some(name), Some(offset)) = (macro_name, name_offset) {
            self.ready.push_back(Token {
                kind: TokenKind::Identifier {
                    construct: Some(Construct::Macro),
                    declaration: Declaration::default(),
                },
                text: name,
                line: lexeme.line,
                column: lexeme.column + offset as u32,
                depth,
            });
        }
    }

    /// Decide what a `{` opens and classify the names declared before it
    fn classify_opening(
        &mut self,
        chunk: &[Lexeme],
        code: &[usize],
        documented: bool,
        classes: &mut Classes,
    ) -> Frame {
        let block = Frame { context: BraceContext::Block, type_body: None };
        let context = self.context();

        if context == Some(BraceContext::Initializer) {
            return Frame { context: BraceContext::Initializer, type_body: None };
        }

        let Some(&first) = code.first() else {
            return block;
        };

        if has_top_level(chunk, code, |l| l.is_punct('=')) {
            self.classify_declaration(chunk, code, documented, classes);
            return Frame { context: BraceContext::Initializer, type_body: None };
        }

        // `struct Tag {` or `struct {`, but not `struct Tag *make(void) {`
        if let Some(position) = code.iter().position(|&i| {
            chunk[i].is_keyword("struct") || chunk[i].is_keyword("union") || chunk[i].is_keyword("enum")
        }).filter(|&position| position + 2 >= code.len())
        {
            let is_enum = chunk[code[position]].is_keyword("enum");
            let typedef = code[..position].iter().any(|&i| chunk[i].is_keyword("typedef"));
            if let Some(&tag) = code.get(position + 1) {
                if chunk[tag].is_ident() {
                    let construct = if is_enum { Construct::Enum } else { Construct::Struct };
                    classes.insert(tag, (construct, Declaration { documented, ..Default::default() }));
                }
            }
            let context = if is_enum { BraceContext::Enum } else { BraceContext::Aggregate };
            return Frame { context, type_body: Some(typedef) };
        }

        let lead = &chunk[first];
        if ["if", "else", "for", "while", "do", "switch"].iter().any(|k| lead.is_keyword(k)) {
            return Frame { context: BraceContext::Control, type_body: None };
        }

        if lead.is_keyword("extern") && code.len() == 2 && chunk[code[1]].kind == LexemeKind::Str {
            return Frame { context: BraceContext::Extern, type_body: None };
        }

        let ends_with_paren = code.last().map(|&i| chunk[i].is_punct(')')).unwrap_or(false);
        if ends_with_paren && self.at_file_scope() {
            if let Some(name_at) = function_name_position(chunk, code) {
                let is_static = code[..name_at].iter().any(|&i| chunk[i].is_keyword("static"));
                classes.insert(
                    code[name_at],
                    (
                        Construct::Function,
                        Declaration {
                            is_static,
                            is_definition: true,
                            documented,
                            ..Default::default()
                        },
                    ),
                );
                self.classify_parameters(chunk, &code[name_at + 1..], classes);
                return Frame { context: BraceContext::Function, type_body: None };
            }
        }

        block
    }

    /// Names following the closing brace of a struct/union/enum body
    fn classify_type_body_names(
        &mut self,
        chunk: &[Lexeme],
        code: &[usize],
        typedef: bool,
        classes: &mut Classes,
    ) {
        let scope = self.declaration_scope();
        for declarator in split_top_level(chunk, code, ',') {
            let declarator = strip_initializer(chunk, declarator);
            let Some(parsed) = parse_declarator(chunk, declarator) else {
                continue;
            };
            if typedef {
                self.known_types.insert(chunk[parsed.name].text.clone());
                classes.insert(parsed.name, (Construct::Typedef, Declaration::default()));
            } else {
                let construct = if scope == Scope::Member { Construct::Field } else { Construct::Variable };
                classes.insert(
                    parsed.name,
                    (
                        construct,
                        Declaration {
                            scope,
                            is_array: parsed.is_array,
                            is_pointer: parsed.is_pointer,
                            ..Default::default()
                        },
                    ),
                );
            }
        }
    }

    /// Classify a statement ending in `;`
    fn classify_statement(
        &mut self,
        chunk: &[Lexeme],
        code: &[usize],
        documented: bool,
        classes: &mut Classes,
    ) {
        match self.context() {
            Some(BraceContext::Initializer) | Some(BraceContext::Enum) => return,
            _ => {}
        }
        let Some(&first) = code.first() else {
            return;
        };

        if chunk[first].is_keyword("typedef") {
            if let Some(name) = typedef_name(chunk, code) {
                self.known_types.insert(chunk[name].text.clone());
                classes.insert(name, (Construct::Typedef, Declaration { documented, ..Default::default() }));
            }
            return;
        }

        if self.is_declaration(chunk, code) {
            self.classify_declaration(chunk, code, documented, classes);
        }
    }

    fn declaration_scope(&self) -> Scope {
        match self.context() {
            None | Some(BraceContext::Extern) => Scope::Global,
            Some(BraceContext::Aggregate) => Scope::Member,
            _ => Scope::Local,
        }
    }

    fn is_type_name(&self, word: &str) -> bool {
        self.known_types.contains(word) || word.ends_with("_t")
    }

    /// Whether a statement looks like a declaration rather than an expression
    fn is_declaration(&self, chunk: &[Lexeme], code: &[usize]) -> bool {
        let lead = &chunk[code[0]];
        if lead.kind == LexemeKind::Keyword {
            return is_specifier_keyword(&lead.text);
        }
        if !lead.is_ident() {
            return false;
        }
        let Some(&second) = code.get(1) else {
            return false;
        };
        let second = &chunk[second];
        if second.is_ident() || (second.kind == LexemeKind::Keyword && is_specifier_keyword(&second.text)) {
            return true;
        }
        if second.is_punct('*') {
            return self.is_type_name(&lead.text)
                || matches!(self.context(), None | Some(BraceContext::Extern) | Some(BraceContext::Aggregate));
        }
        false
    }

    /// Classify every declarator of a declaration statement
    fn classify_declaration(
        &mut self,
        chunk: &[Lexeme],
        code: &[usize],
        documented: bool,
        classes: &mut Classes,
    ) {
        let (specifiers, rest) = split_specifiers(chunk, code, |word| self.is_type_name(word));
        let is_char = specifiers.iter().any(|&i| chunk[i].is_keyword("char"));
        let is_static = specifiers.iter().any(|&i| chunk[i].is_keyword("static"));
        let scope = self.declaration_scope();
        let file_scope = self.at_file_scope();

        for declarator in split_top_level(chunk, rest, ',') {
            let declarator = strip_initializer(chunk, declarator);
            let Some(parsed) = parse_declarator(chunk, declarator) else {
                continue;
            };

            if parsed.is_function && (file_scope || scope == Scope::Local) {
                classes.insert(
                    parsed.name,
                    (
                        Construct::Function,
                        Declaration { is_static, documented, ..Default::default() },
                    ),
                );
                if let Some(params) = parsed.params {
                    self.classify_parameters(chunk, params, classes);
                }
                continue;
            }

            let construct = if scope == Scope::Member { Construct::Field } else { Construct::Variable };
            classes.insert(
                parsed.name,
                (
                    construct,
                    Declaration {
                        scope,
                        is_array: parsed.is_array,
                        is_char,
                        is_pointer: parsed.is_pointer,
                        is_static,
                        documented,
                        ..Default::default()
                    },
                ),
            );
        }
    }

    /// Classify the parameter names inside the parenthesised list at the start of `code`
    fn classify_parameters(&self, chunk: &[Lexeme], code: &[usize], classes: &mut Classes) {
        let Some(open) = code.iter().position(|&i| chunk[i].is_punct('(')) else {
            return;
        };
        let Some(close) = matching_close(chunk, code, open) else {
            return;
        };

        for param in split_top_level(chunk, &code[open + 1..close], ',') {
            let words: Vec<usize> = param
                .iter()
                .copied()
                .filter(|&i| chunk[i].is_ident() || chunk[i].kind == LexemeKind::Keyword)
                .collect();
            if words.len() < 2 && !param.iter().any(|&i| chunk[i].is_punct('(')) {
                continue;
            }
            let (specifiers, rest) = split_specifiers(chunk, param, |word| self.is_type_name(word));
            let Some(parsed) = parse_declarator(chunk, rest) else {
                continue;
            };
            let is_char = specifiers.iter().any(|&i| chunk[i].is_keyword("char"));
            classes.insert(
                parsed.name,
                (
                    Construct::Variable,
                    Declaration {
                        scope: Scope::Parameter,
                        is_array: parsed.is_array,
                        is_char,
                        is_pointer: parsed.is_pointer || parsed.is_function,
                        ..Default::default()
                    },
                ),
            );
        }
    }
}

impl Iterator for TokenStream<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.ready.pop_front() {
                return Some(token);
            }
            if self.finished {
                return None;
            }
            self.fill();
        }
    }
}

fn describe_error(text: &str) -> String {
    if text.starts_with("/*") {
        "unterminated block comment".to_string()
    } else if text.contains('\'') && !text.contains('"') {
        "unterminated character literal".to_string()
    } else {
        "unterminated string literal".to_string()
    }
}

fn is_specifier_keyword(word: &str) -> bool {
    matches!(
        word,
        "void"
            | "char"
            | "short"
            | "int"
            | "long"
            | "float"
            | "double"
            | "signed"
            | "unsigned"
            | "bool"
            | "_Bool"
            | "_Complex"
            | "const"
            | "volatile"
            | "restrict"
            | "__restrict"
            | "static"
            | "extern"
            | "register"
            | "auto"
            | "inline"
            | "__inline"
            | "__inline__"
            | "_Atomic"
            | "_Thread_local"
            | "_Noreturn"
            | "struct"
            | "union"
            | "enum"
            | "__attribute__"
    )
}

fn is_base_type_keyword(word: &str) -> bool {
    matches!(
        word,
        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed" | "unsigned"
            | "bool" | "_Bool" | "_Complex"
    )
}

/// Parse a directive line, returning the directive and, for `#define`, the
/// character offset of the macro name within the line
fn parse_directive(text: &str) -> (Directive, Option<usize>) {
    let body = text.trim_start().trim_start_matches('#');
    let hash_offset = text.len() - body.len();
    let trimmed = body.trim_start();
    let word_offset = hash_offset + (body.len() - trimmed.len());
    let word: String = trimmed.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
    let rest = &trimmed[word.len()..];
    let argument = rest.trim();

    let directive = match word.as_str() {
        "include" | "include_next" | "import" => {
            let path = argument.lines().next().unwrap_or_default().trim();
            if let Some(inner) = path.strip_prefix('<').and_then(|p| p.split('>').next()) {
                Directive::Include { path: inner.to_string(), system: true }
            } else if let Some(inner) = path.strip_prefix('"').and_then(|p| p.split('"').next()) {
                Directive::Include { path: inner.to_string(), system: false }
            } else {
                Directive::Other { name: word.clone() }
            }
        }
        "define" => {
            let rest_trimmed = rest.trim_start();
            let name: String =
                rest_trimmed.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
            if name.is_empty() {
                return (Directive::Other { name: word }, None);
            }
            let function_like = rest_trimmed[name.len()..].starts_with('(');
            let name_byte_offset = word_offset + word.len() + (rest.len() - rest_trimmed.len());
            let name_offset = text[..name_byte_offset].chars().count();
            return (Directive::Define { name, function_like }, Some(name_offset));
        }
        "ifndef" => {
            let name: String =
                argument.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
            Directive::Ifndef { name }
        }
        "endif" => Directive::Endif,
        "if" | "ifdef" | "elif" | "else" | "elifdef" | "elifndef" => Directive::Conditional,
        _ => Directive::Other { name: word },
    };
    (directive, None)
}

/// Whether any top-level (outside parentheses/brackets) code lexeme matches
fn has_top_level(chunk: &[Lexeme], code: &[usize], predicate: impl Fn(&Lexeme) -> bool) -> bool {
    let mut depth = 0i32;
    for &i in code {
        let lexeme = &chunk[i];
        if lexeme.is_punct('(') || lexeme.is_punct('[') {
            depth += 1;
        } else if lexeme.is_punct(')') || lexeme.is_punct(']') {
            depth -= 1;
        } else if depth == 0 && predicate(lexeme) {
            return true;
        }
    }
    false
}

/// Split code indices on a top-level separator
fn split_top_level<'c>(chunk: &[Lexeme], code: &'c [usize], separator: char) -> Vec<&'c [usize]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (position, &i) in code.iter().enumerate() {
        let lexeme = &chunk[i];
        if lexeme.is_punct('(') || lexeme.is_punct('[') || lexeme.is_punct('{') {
            depth += 1;
        } else if lexeme.is_punct(')') || lexeme.is_punct(']') || lexeme.is_punct('}') {
            depth -= 1;
        } else if depth == 0 && lexeme.is_punct(separator) {
            parts.push(&code[start..position]);
            start = position + 1;
        }
    }
    if start < code.len() {
        parts.push(&code[start..]);
    }
    parts
}

/// Cut a declarator at its top-level `=` or bitfield `:`
fn strip_initializer<'c>(chunk: &[Lexeme], declarator: &'c [usize]) -> &'c [usize] {
    let mut depth = 0i32;
    for (position, &i) in declarator.iter().enumerate() {
        let lexeme = &chunk[i];
        if lexeme.is_punct('(') || lexeme.is_punct('[') {
            depth += 1;
        } else if lexeme.is_punct(')') || lexeme.is_punct(']') {
            depth -= 1;
        } else if depth == 0 && (lexeme.is_punct('=') || lexeme.is_punct(':')) {
            return &declarator[..position];
        }
    }
    declarator
}

fn matching_close(chunk: &[Lexeme], code: &[usize], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (position, &i) in code.iter().enumerate().skip(open) {
        if chunk[i].is_punct('(') {
            depth += 1;
        } else if chunk[i].is_punct(')') {
            depth -= 1;
            if depth == 0 {
                return Some(position);
            }
        }
    }
    None
}

/// Split leading declaration specifiers from the declarator list.
///
/// A plain identifier counts as a type name only while no base type has been
/// seen, so `unsigned count` declares `count` while `Point origin` declares `origin`.
fn split_specifiers<'c>(
    chunk: &[Lexeme],
    code: &'c [usize],
    is_type_name: impl Fn(&str) -> bool,
) -> (&'c [usize], &'c [usize]) {
    let mut base_seen = false;
    let mut position = 0;
    while position < code.len() {
        let lexeme = &chunk[code[position]];
        match lexeme.kind {
            LexemeKind::Keyword if lexeme.text == "__attribute__" => {
                position += 1;
                if position < code.len() && chunk[code[position]].is_punct('(') {
                    match matching_close(chunk, code, position) {
                        Some(close) => position = close + 1,
                        None => break,
                    }
                }
                continue;
            }
            LexemeKind::Keyword if matches!(lexeme.text.as_str(), "struct" | "union" | "enum") => {
                base_seen = true;
                position += 1;
                if position < code.len() && chunk[code[position]].is_ident() {
                    position += 1;
                }
                continue;
            }
            LexemeKind::Keyword if is_specifier_keyword(&lexeme.text) => {
                base_seen |= is_base_type_keyword(&lexeme.text);
                position += 1;
            }
            LexemeKind::Ident if !base_seen => {
                // a following identifier or pointer means this one names a type
                let next = code.get(position + 1).map(|&i| &chunk[i]);
                let names_type = match next {
                    Some(next) => {
                        next.is_ident()
                            || next.is_punct('*')
                            || (next.kind == LexemeKind::Keyword && is_specifier_keyword(&next.text))
                            || (is_type_name(&lexeme.text) && next.is_punct('('))
                    }
                    None => false,
                };
                if !names_type {
                    break;
                }
                base_seen = true;
                position += 1;
            }
            _ => break,
        }
    }
    (&code[..position], &code[position..])
}

#[derive(Debug)]
struct ParsedDeclarator<'c> {
    /// Index into the chunk of the declared name
    name: usize,
    is_array: bool,
    is_pointer: bool,
    is_function: bool,
    /// Code indices starting at the parameter list of a function declarator
    params: Option<&'c [usize]>,
}

fn parse_declarator<'c>(chunk: &[Lexeme], declarator: &'c [usize]) -> Option<ParsedDeclarator<'c>> {
    let position = declarator.iter().position(|&i| chunk[i].is_ident())?;
    let before = &declarator[..position];
    let wrapped = before.iter().any(|&i| chunk[i].is_punct('('));
    let is_pointer = before.iter().any(|&i| chunk[i].is_punct('*'));

    // skip the closing paren of a wrapped declarator such as `(*handler)(int)`
    let mut after = position + 1;
    while after < declarator.len() && wrapped && chunk[declarator[after]].is_punct(')') {
        after += 1;
    }
    let next = declarator.get(after).map(|&i| &chunk[i]);
    let is_array = next.map(|l| l.is_punct('[')).unwrap_or(false);
    let is_function = !wrapped && next.map(|l| l.is_punct('(')).unwrap_or(false);

    Some(ParsedDeclarator {
        name: declarator[position],
        is_array,
        is_pointer: is_pointer || (wrapped && next.map(|l| l.is_punct('(')).unwrap_or(false)),
        is_function,
        params: if is_function { Some(&declarator[after..]) } else { None },
    })
}

/// Position (within `code`) of the name of a function definition header
fn function_name_position(chunk: &[Lexeme], code: &[usize]) -> Option<usize> {
    let open = code.iter().position(|&i| chunk[i].is_punct('('))?;
    let name = open.checked_sub(1)?;
    chunk[code[name]].is_ident().then_some(name)
}

/// The declared name of a `typedef` statement
fn typedef_name(chunk: &[Lexeme], code: &[usize]) -> Option<usize> {
    // function pointer: typedef void (*Handler_t)(int);
    for window in code.windows(3) {
        if chunk[window[0]].is_punct('(') && chunk[window[1]].is_punct('*') && chunk[window[2]].is_ident() {
            return Some(window[2]);
        }
    }

    let mut depth = 0i32;
    let mut name = None;
    for &i in code {
        let lexeme = &chunk[i];
        if lexeme.is_punct('(') || lexeme.is_punct('[') {
            depth += 1;
        } else if lexeme.is_punct(')') || lexeme.is_punct(']') {
            depth -= 1;
        } else if depth == 0 && lexeme.is_ident() {
            name = Some(i);
        }
    }
    name
}

fn classify_enum_constants(chunk: &[Lexeme], code: &[usize], classes: &mut Classes) {
    for member in split_top_level(chunk, code, ',') {
        if let Some(&first) = member.first() {
            if chunk[first].is_ident() {
                classes.insert(first, (Construct::EnumConstant, Declaration::default()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(source: &str) -> Vec<(String, Construct, Declaration)> {
        Scanner::new(source)
            .tokens()
            .filter_map(|token| match token.kind {
                TokenKind::Identifier { construct: Some(construct), declaration } => {
                    Some((token.text, construct, declaration))
                }
                _ => None,
            })
            .collect()
    }

    fn names_of(source: &str, construct: Construct) -> Vec<String> {
        declared(source).into_iter().filter(|(_, c, _)| *c == construct).map(|(n, _, _)| n).collect()
    }

    #[test]
    fn test_global_and_local_variables() {
        let source = "int deviceCount = 0;\nstatic char strName[16];\nvoid run(void)\n{\n    int i, *p;\n    i = 3;\n}\n";
        let decls = declared(source);

        let count = decls.iter().find(|(n, _, _)| n == "deviceCount").unwrap();
        assert_eq!(count.1, Construct::Variable);
        assert_eq!(count.2.scope, Scope::Global);

        let name = decls.iter().find(|(n, _, _)| n == "strName").unwrap();
        assert!(name.2.is_array && name.2.is_char && name.2.is_static);

        let p = decls.iter().find(|(n, _, _)| n == "p").unwrap();
        assert_eq!(p.2.scope, Scope::Local);
        assert!(p.2.is_pointer);

        // `i = 3;` is a statement, not a second declaration
        assert_eq!(decls.iter().filter(|(n, _, _)| n == "i").count(), 1);
    }

    #[test]
    fn test_functions_and_parameters() {
        let source = "static int helper(int valueArr[], const char *name);\nint appLogWrite(int level, char strMsg[])\n{\n    return level;\n}\n";
        let decls = declared(source);

        let helper = decls.iter().find(|(n, _, _)| n == "helper").unwrap();
        assert_eq!(helper.1, Construct::Function);
        assert!(helper.2.is_static && !helper.2.is_definition);

        let write = decls.iter().find(|(n, _, _)| n == "appLogWrite").unwrap();
        assert!(write.2.is_definition && !write.2.is_static);

        let params = names_of(source, Construct::Variable);
        assert_eq!(params, vec!["valueArr", "name", "level", "strMsg"]);
        let msg = decls.iter().find(|(n, _, _)| n == "strMsg").unwrap();
        assert_eq!(msg.2.scope, Scope::Parameter);
        assert!(msg.2.is_array && msg.2.is_char);
    }

    #[test]
    fn test_types_enums_and_typedefs() {
        let source = "typedef struct AppLog\n{\n    int logLevel;\n    char strPath[64];\n} AppLog_t;\n\nenum LogLevel { LOG_DEBUG, LOG_INFO = 2 };\ntypedef unsigned char Byte_t;\ntypedef void (*LogHandler_t)(int level);\n";

        assert_eq!(names_of(source, Construct::Struct), vec!["AppLog"]);
        assert_eq!(names_of(source, Construct::Field), vec!["logLevel", "strPath"]);
        assert_eq!(names_of(source, Construct::Typedef), vec!["AppLog_t", "Byte_t", "LogHandler_t"]);
        assert_eq!(names_of(source, Construct::Enum), vec!["LogLevel"]);
        assert_eq!(names_of(source, Construct::EnumConstant), vec!["LOG_DEBUG", "LOG_INFO"]);
    }

    #[test]
    fn test_typedef_names_are_recognised_as_types() {
        let source = "typedef int Count_t;\nCount_t *currentCount;\nPoint origin;\n";
        assert_eq!(names_of(source, Construct::Variable), vec!["currentCount", "origin"]);
    }

    #[test]
    fn test_directives_and_macros() {
        let source = "#ifndef __APP_LOG_H__\n#define __APP_LOG_H__\n#include <stdio.h>\n#include \"app_log.h\"\n#define MAX(a, b) ((a) > (b) ? (a) : (b))\n#endif\n";
        let tokens = Scanner::new(source).scan_all();

        let directives: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Directive(d) => Some(d.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(directives[0], Directive::Ifndef { name: "__APP_LOG_H__".into() });
        assert_eq!(directives[2], Directive::Include { path: "stdio.h".into(), system: true });
        assert_eq!(directives[3], Directive::Include { path: "app_log.h".into(), system: false });
        assert_eq!(directives[4], Directive::Define { name: "MAX".into(), function_like: true });
        assert_eq!(directives[5], Directive::Endif);

        let max = tokens.iter().find(|t| t.text == "MAX").unwrap();
        assert_eq!(max.construct(), Some(Construct::Macro));
        assert_eq!((max.line, max.column), (5, 9));
    }

    #[test]
    fn test_continued_macro_does_not_swallow_next_declaration() {
        let source = "#define CLAMP(x) ((x) < 0 ? 0 : \\\n    (x))\n#define QUOTE \"a < b\" \\\n    \"c\"\nint deviceCount;\n";
        let tokens = Scanner::new(source).scan_all();

        let macros: Vec<_> = tokens.iter().filter(|t| t.construct() == Some(Construct::Macro)).collect();
        assert_eq!(macros.len(), 2);
        assert_eq!(macros[1].line, 3);

        let count = tokens.iter().find(|t| t.text == "deviceCount").unwrap();
        assert_eq!(count.construct(), Some(Construct::Variable));
        assert_eq!(count.line, 5);
    }

    #[test]
    fn test_pointer_array_declarators() {
        let source = "static const char *namesArr[2];\nint main(int argc, char *argv[])\n{\n    return argc;\n}\n";
        let decls = declared(source);

        let names = decls.iter().find(|(n, _, _)| n == "namesArr").unwrap();
        assert_eq!(names.2.scope, Scope::Global);
        assert!(names.2.is_array && names.2.is_pointer && names.2.is_char && names.2.is_static);

        let argv = decls.iter().find(|(n, _, _)| n == "argv").unwrap();
        assert_eq!(argv.2.scope, Scope::Parameter);
        assert!(argv.2.is_array && argv.2.is_pointer);
    }

    #[test]
    fn test_brace_contexts_and_placement() {
        let source = "int main(void)\n{\n    if (1) {\n    }\n    struct Pair { int a; } pair;\n    int values[] = { 1, 2 };\n}\n";
        let braces: Vec<Brace> = Scanner::new(source)
            .tokens()
            .filter_map(|t| match t.kind {
                TokenKind::Brace(brace) if brace.open => Some(brace),
                _ => None,
            })
            .collect();

        assert_eq!(braces[0], Brace { open: true, context: BraceContext::Function, own_line: true });
        assert_eq!(braces[1], Brace { open: true, context: BraceContext::Control, own_line: false });
        assert_eq!(braces[2].context, BraceContext::Aggregate);
        assert_eq!(braces[3].context, BraceContext::Initializer);
        assert_eq!(names_of(source, Construct::Variable), vec!["pair", "values"]);
    }

    #[test]
    fn test_doc_comment_marks_declaration() {
        let source = "/** Writes a line. */\nvoid logWrite(void)\n{\n}\n\n// plain\nvoid logFlush(void)\n{\n}\n";
        let decls = declared(source);
        assert!(decls.iter().find(|(n, _, _)| n == "logWrite").unwrap().2.documented);
        assert!(!decls.iter().find(|(n, _, _)| n == "logFlush").unwrap().2.documented);
    }

    #[test]
    fn test_tokens_in_source_order_and_restartable() {
        let source = "/* a */ int first;\n#define SECOND 2\nint third = SECOND;\n\"text\";\n";
        let scanner = Scanner::new(source);
        let tokens = scanner.scan_all();

        let positions: Vec<_> = tokens.iter().map(|t| (t.line, t.column)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::EndOfFile);
        assert_eq!(scanner.scan_all(), tokens);
    }

    #[test]
    fn test_malformed_input_is_recorded_and_scanning_continues() {
        let source = "char *msg = \"broken;\nint deviceCount;\n";
        let scanner = Scanner::new(source);
        let errors = scanner.errors();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].message, "unterminated string literal");
        assert!(names_of(source, Construct::Variable).contains(&"deviceCount".to_string()));
    }

    #[test]
    fn test_extern_c_block_is_file_scope() {
        let source = "extern \"C\" {\nint exportedCount;\nvoid apiInit(void);\n}\n";
        let decls = declared(source);
        let count = decls.iter().find(|(n, _, _)| n == "exportedCount").unwrap();
        assert_eq!(count.2.scope, Scope::Global);
        assert_eq!(names_of(source, Construct::Function), vec!["apiInit"]);
    }
}
