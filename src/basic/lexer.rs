//! QBasic lexer/tokenizer
//!
//! Tokenizing never fails: unknown characters are skipped with a hint and
//! unterminated strings still produce a string token plus a warning, so
//! half-edited source can be linted on every keystroke.

use std::iter::Peekable;
use std::str::Chars;

use crate::basic::diagnostics::{Category, Diagnostic, DiagnosticCollector};

/// Token kinds. Literal-carrying variants keep the source text: numbers stay
/// text so code generation can reproduce them verbatim, identifiers keep
/// their type suffix (`$ % & ! #`) as part of the name.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Numeric literal in decimal text form (`&H` hex already converted)
    Number(String),
    /// String literal, quotes stripped
    QString(String),
    /// Identifier, original case, optional trailing type suffix
    Identifier(String),
    Keyword(Keyword),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Backslash, // Integer division
    Caret,     // Exponentiation
    Equal,
    NotEqual, // <>
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Punctuation
    LeftParen,
    RightParen,
    Comma,
    Semicolon,
    Colon,
    Hash, // File numbers
    Dot,  // TYPE member access

    // Special
    Newline,
    Eof,
}

/// QBasic/QB64 keywords. QB64 extensions carry a leading underscore in
/// source (`_DELAY`); the enum names drop it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    // Control flow
    If, Then, Else, ElseIf, EndIf,
    For, To, Step, Next,
    While, Wend,
    Do, Loop, Until,
    GoTo, GoSub, Return,
    Select, Case, Is,
    End, Exit,

    // Declarations
    Dim, Redim, As, Let,
    Const,
    Sub, Function,
    Shared, Static,
    Type,

    // Data types
    Integer, Long, Single, Double, StringType,

    // Data
    Data, Read, Restore,

    // I/O
    Print, Input, Open, Close, Write,
    Line, Get, Put,
    Append, Output, Random, Binary,

    // Screen and graphics
    Screen, Width, Cls, Color, Locate,
    Pset, Preset, Circle, Paint,
    Key,

    // Logical operators
    And, Or, Not, Xor, Eqv, Imp, Mod,

    // Other
    Rem,
    Def,
    On, Error, Resume,
    Call,
    Swap,
    Beep, Sound, Play,
    Sleep,
    Randomize,
    Stop, System,

    // QB64 extensions
    Delay,
    Limit,
    Display,
    Title,
    Fullscreen,
}

/// Canonical spelling -> keyword. One table serves keyword lookup, error
/// messages and the suggestion vocabulary.
pub static KEYWORDS: &[(&str, Keyword)] = &[
    ("IF", Keyword::If),
    ("THEN", Keyword::Then),
    ("ELSE", Keyword::Else),
    ("ELSEIF", Keyword::ElseIf),
    ("ENDIF", Keyword::EndIf),
    ("FOR", Keyword::For),
    ("TO", Keyword::To),
    ("STEP", Keyword::Step),
    ("NEXT", Keyword::Next),
    ("WHILE", Keyword::While),
    ("WEND", Keyword::Wend),
    ("DO", Keyword::Do),
    ("LOOP", Keyword::Loop),
    ("UNTIL", Keyword::Until),
    ("GOTO", Keyword::GoTo),
    ("GOSUB", Keyword::GoSub),
    ("RETURN", Keyword::Return),
    ("SELECT", Keyword::Select),
    ("CASE", Keyword::Case),
    ("IS", Keyword::Is),
    ("END", Keyword::End),
    ("EXIT", Keyword::Exit),
    ("DIM", Keyword::Dim),
    ("REDIM", Keyword::Redim),
    ("AS", Keyword::As),
    ("LET", Keyword::Let),
    ("CONST", Keyword::Const),
    ("SUB", Keyword::Sub),
    ("FUNCTION", Keyword::Function),
    ("SHARED", Keyword::Shared),
    ("STATIC", Keyword::Static),
    ("TYPE", Keyword::Type),
    ("INTEGER", Keyword::Integer),
    ("LONG", Keyword::Long),
    ("SINGLE", Keyword::Single),
    ("DOUBLE", Keyword::Double),
    ("STRING", Keyword::StringType),
    ("DATA", Keyword::Data),
    ("READ", Keyword::Read),
    ("RESTORE", Keyword::Restore),
    ("PRINT", Keyword::Print),
    ("INPUT", Keyword::Input),
    ("OPEN", Keyword::Open),
    ("CLOSE", Keyword::Close),
    ("WRITE", Keyword::Write),
    ("LINE", Keyword::Line),
    ("GET", Keyword::Get),
    ("PUT", Keyword::Put),
    ("APPEND", Keyword::Append),
    ("OUTPUT", Keyword::Output),
    ("RANDOM", Keyword::Random),
    ("BINARY", Keyword::Binary),
    ("SCREEN", Keyword::Screen),
    ("WIDTH", Keyword::Width),
    ("CLS", Keyword::Cls),
    ("COLOR", Keyword::Color),
    ("LOCATE", Keyword::Locate),
    ("PSET", Keyword::Pset),
    ("PRESET", Keyword::Preset),
    ("CIRCLE", Keyword::Circle),
    ("PAINT", Keyword::Paint),
    ("KEY", Keyword::Key),
    ("AND", Keyword::And),
    ("OR", Keyword::Or),
    ("NOT", Keyword::Not),
    ("XOR", Keyword::Xor),
    ("EQV", Keyword::Eqv),
    ("IMP", Keyword::Imp),
    ("MOD", Keyword::Mod),
    ("REM", Keyword::Rem),
    ("DEF", Keyword::Def),
    ("ON", Keyword::On),
    ("ERROR", Keyword::Error),
    ("RESUME", Keyword::Resume),
    ("CALL", Keyword::Call),
    ("SWAP", Keyword::Swap),
    ("BEEP", Keyword::Beep),
    ("SOUND", Keyword::Sound),
    ("PLAY", Keyword::Play),
    ("SLEEP", Keyword::Sleep),
    ("RANDOMIZE", Keyword::Randomize),
    ("STOP", Keyword::Stop),
    ("SYSTEM", Keyword::System),
    ("_DELAY", Keyword::Delay),
    ("_LIMIT", Keyword::Limit),
    ("_DISPLAY", Keyword::Display),
    ("_TITLE", Keyword::Title),
    ("_FULLSCREEN", Keyword::Fullscreen),
];

impl Keyword {
    /// Canonical upper-case spelling.
    pub fn as_str(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| kw == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }
}

fn get_keyword(name: &str) -> Option<Keyword> {
    KEYWORDS.iter().find(|(n, _)| *n == name).map(|(_, kw)| *kw)
}

/// A token with 1-based position info.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

/// The lexer
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            input: chars,
            line: 1,
            column: 1,
            current_char,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let prev = self.current_char;
        if let Some(c) = prev {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.current_char = self.input.next();
        prev
    }

    fn peek(&self) -> Option<char> {
        self.current_char
    }

    fn peek_next(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // At most one decimal point
        if self.peek() == Some('.') {
            if let Some(next) = self.peek_next() {
                if next.is_ascii_digit() {
                    text.push('.');
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c.is_ascii_digit() {
                            text.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        // Exponent
        if matches!(self.peek(), Some('E') | Some('e') | Some('D') | Some('d')) {
            let marker_is_exponent =
                matches!(self.peek_next(), Some(c) if c.is_ascii_digit() || c == '+' || c == '-');
            if marker_is_exponent {
                text.push('e');
                self.advance();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.advance();
                    }
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        // Trailing type suffix is consumed but not kept in the text
        if matches!(self.peek(), Some('#') | Some('!') | Some('%') | Some('&')) {
            self.advance();
        }

        TokenKind::Number(text)
    }

    /// `&H` hexadecimal literal, converted to its decimal text form.
    fn read_hex(&mut self, diagnostics: &mut DiagnosticCollector) -> TokenKind {
        let line = self.line;
        let column = self.column;
        self.advance(); // &
        self.advance(); // H
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_hexdigit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // Optional LONG suffix
        if self.peek() == Some('&') {
            self.advance();
        }
        match i64::from_str_radix(&digits, 16) {
            Ok(value) => TokenKind::Number(value.to_string()),
            Err(_) => {
                diagnostics.push(Diagnostic::warning(
                    Category::Syntax,
                    "invalid hexadecimal literal",
                    line,
                    column,
                ));
                TokenKind::Number("0".to_string())
            }
        }
    }

    fn read_string(&mut self, diagnostics: &mut DiagnosticCollector) -> TokenKind {
        let line = self.line;
        let column = self.column;
        self.advance(); // Skip opening quote
        let mut s = String::new();
        let mut terminated = false;

        while let Some(c) = self.peek() {
            if c == '"' {
                self.advance();
                terminated = true;
                break;
            } else if c == '\n' {
                break;
            } else {
                s.push(c);
                self.advance();
            }
        }

        if !terminated {
            // Still a usable token; live linting sees these constantly
            diagnostics.push(
                Diagnostic::warning(Category::Syntax, "unterminated string literal", line, column)
                    .with_length(s.chars().count() + 1),
            );
        }

        TokenKind::QString(s)
    }

    fn read_identifier(&mut self) -> TokenKind {
        let mut name = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Trailing type suffix is part of the identifier text
        if let Some(c) = self.peek() {
            if c == '$' || c == '%' || c == '!' || c == '#' || c == '&' {
                name.push(c);
                self.advance();
            }
        }

        match get_keyword(&name.to_uppercase()) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(name),
        }
    }

    fn skip_comment(&mut self) {
        // Leave the newline itself for the next token
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self, diagnostics: &mut DiagnosticCollector) -> Token {
        loop {
            self.skip_whitespace();

            let line = self.line;
            let column = self.column;

            let kind = match self.peek() {
                None => TokenKind::Eof,

                Some('\n') => {
                    self.advance();
                    TokenKind::Newline
                }

                Some('\'') => {
                    self.skip_comment();
                    continue;
                }

                Some('"') => self.read_string(diagnostics),

                Some(c) if c.is_ascii_digit() => self.read_number(),

                Some('.') => {
                    if matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
                        self.read_number()
                    } else {
                        self.advance();
                        TokenKind::Dot
                    }
                }

                Some('&') if matches!(self.peek_next(), Some('H') | Some('h')) => {
                    self.read_hex(diagnostics)
                }

                Some(c) if c.is_alphabetic() || c == '_' => {
                    let tok = self.read_identifier();
                    if tok == TokenKind::Keyword(Keyword::Rem) {
                        self.skip_comment();
                        continue;
                    }
                    tok
                }

                Some('+') => {
                    self.advance();
                    TokenKind::Plus
                }
                Some('-') => {
                    self.advance();
                    TokenKind::Minus
                }
                Some('*') => {
                    self.advance();
                    TokenKind::Star
                }
                Some('/') => {
                    self.advance();
                    TokenKind::Slash
                }
                Some('\\') => {
                    self.advance();
                    TokenKind::Backslash
                }
                Some('^') => {
                    self.advance();
                    TokenKind::Caret
                }
                Some('=') => {
                    self.advance();
                    TokenKind::Equal
                }
                Some('<') => {
                    self.advance();
                    match self.peek() {
                        Some('>') => {
                            self.advance();
                            TokenKind::NotEqual
                        }
                        Some('=') => {
                            self.advance();
                            TokenKind::LessEqual
                        }
                        _ => TokenKind::Less,
                    }
                }
                Some('>') => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    }
                }
                Some('(') => {
                    self.advance();
                    TokenKind::LeftParen
                }
                Some(')') => {
                    self.advance();
                    TokenKind::RightParen
                }
                Some(',') => {
                    self.advance();
                    TokenKind::Comma
                }
                Some(';') => {
                    self.advance();
                    TokenKind::Semicolon
                }
                Some(':') => {
                    self.advance();
                    TokenKind::Colon
                }
                Some('#') => {
                    self.advance();
                    TokenKind::Hash
                }

                Some(c) => {
                    // Unknown character: skip it rather than fail the lex
                    self.advance();
                    diagnostics.push(Diagnostic::hint(
                        Category::Syntax,
                        format!("ignoring unexpected character {:?}", c),
                        line,
                        column,
                    ));
                    continue;
                }
            };

            return Token::new(kind, line, column);
        }
    }

    /// Tokenize into a caller-owned buffer, reusing its allocation. The
    /// stream always ends with an Eof token.
    pub fn tokenize_into(&mut self, tokens: &mut Vec<Token>, diagnostics: &mut DiagnosticCollector) {
        tokens.clear();
        loop {
            let token = self.next_token(diagnostics);
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
    }

    /// Tokenize into a fresh vector.
    pub fn tokenize(&mut self, diagnostics: &mut DiagnosticCollector) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.tokenize_into(&mut tokens, diagnostics);
        tokens
    }

    /// Tokenize, discarding lexer diagnostics. Test helper.
    pub fn tokenize_unchecked(&mut self) -> Vec<Token> {
        let mut diagnostics = DiagnosticCollector::new();
        self.tokenize(&mut diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::diagnostics::Severity;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize_unchecked()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("print Print PRINT"),
            vec![
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_identifier_keeps_type_suffix() {
        assert_eq!(
            kinds("name$ count% total#"),
            vec![
                TokenKind::Identifier("name$".into()),
                TokenKind::Identifier("count%".into()),
                TokenKind::Identifier("total#".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(
            kinds("42 3.14 1e3 2.5E-2"),
            vec![
                TokenKind::Number("42".into()),
                TokenKind::Number("3.14".into()),
                TokenKind::Number("1e3".into()),
                TokenKind::Number("2.5e-2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_suffix_dropped() {
        assert_eq!(
            kinds("10% 2# 7&"),
            vec![
                TokenKind::Number("10".into()),
                TokenKind::Number("2".into()),
                TokenKind::Number("7".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_hex_literal_converted_to_decimal() {
        assert_eq!(
            kinds("&HFF &h10"),
            vec![
                TokenKind::Number("255".into()),
                TokenKind::Number("16".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators_greedy() {
        assert_eq!(
            kinds("<= >= <> < >"),
            vec![
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_preserved() {
        assert_eq!(
            kinds("CLS\nCLS"),
            vec![
                TokenKind::Keyword(Keyword::Cls),
                TokenKind::Newline,
                TokenKind::Keyword(Keyword::Cls),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_consume_to_eol() {
        assert_eq!(
            kinds("CLS ' wipe\nREM whole line\nPRINT"),
            vec![
                TokenKind::Keyword(Keyword::Cls),
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_still_tokenizes() {
        let mut diagnostics = DiagnosticCollector::new();
        let tokens = Lexer::new("PRINT \"oops").tokenize(&mut diagnostics);
        assert_eq!(tokens[1].kind, TokenKind::QString("oops".into()));
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_unknown_char_skipped_with_hint() {
        let mut diagnostics = DiagnosticCollector::new();
        let tokens = Lexer::new("PRINT @ 1").tokenize(&mut diagnostics);
        assert_eq!(tokens[1].kind, TokenKind::Number("1".into()));
        assert_eq!(diagnostics.with_severity(Severity::Hint).len(), 1);
    }

    #[test]
    fn test_qb64_underscore_keywords() {
        assert_eq!(
            kinds("_DELAY 1"),
            vec![
                TokenKind::Keyword(Keyword::Delay),
                TokenKind::Number("1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_dot() {
        assert_eq!(
            kinds("p.x"),
            vec![
                TokenKind::Identifier("p".into()),
                TokenKind::Dot,
                TokenKind::Identifier("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = Lexer::new("A = 1\nB = 2").tokenize_unchecked();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        let b = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Identifier("B".into()))
            .unwrap();
        assert_eq!((b.line, b.column), (2, 1));
    }
}
