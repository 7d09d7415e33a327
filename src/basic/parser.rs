//! QBasic parser and JavaScript code generator
//!
//! Direct emission: every statement handler validates its tokens and
//! appends generated lines to the output buffer in the same pass, tracking
//! lexical scope as it goes. No AST is built. The parse is two passes over
//! the token vector: a pre-pass that collects `DATA` literals and
//! `SUB`/`FUNCTION`/`TYPE` names (all three may be referenced before they
//! appear), then the main pass that emits the program.
//!
//! Errors inside one statement never abort the file: the statement loop
//! converts them to diagnostics and resynchronizes at the next newline or
//! keyword, so live linting always sees every problem at once.

use std::collections::{HashMap, HashSet};

use crate::basic::builtins;
use crate::basic::diagnostics::{self, Category, Diagnostic, DiagnosticCollector};
use crate::basic::emit::{self, js_string, CodeBuffer, Target};
use crate::basic::lexer::{Keyword, Token, TokenKind, KEYWORDS};

/// Result of one parse: the complete generated program and everything the
/// parser had to say about the source.
#[derive(Debug)]
pub struct ParseOutput {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// One literal collected from a `DATA` statement.
#[derive(Clone, Debug, PartialEq)]
enum DataValue {
    Num(String),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProcKind {
    Sub,
    Function,
}

/// Parse a token stream and generate a complete program for `target`.
pub fn parse(tokens: &[Token], target: Target) -> ParseOutput {
    Parser::new(tokens, target).run()
}

/// JavaScript reserved words that are legal QBasic identifiers.
const JS_RESERVED: &[&str] = &[
    "arguments", "async", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false",
    "finally", "for", "function", "if", "import", "in", "instanceof", "let", "new", "null",
    "return", "static", "super", "switch", "this", "throw", "true", "try", "typeof", "var",
    "void", "while", "with", "yield",
];

/// Default JavaScript value for a name, by its type suffix.
fn default_for(name: &str) -> &'static str {
    if name.ends_with('$') {
        "\"\""
    } else {
        "0"
    }
}

/// Mangle a QBasic identifier into a JavaScript one. `$` is a valid
/// JavaScript identifier character and is kept; the numeric suffixes are
/// not and are spelled out.
fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            '%' => out.push_str("_pct"),
            '&' => out.push_str("_amp"),
            '!' => out.push_str("_sng"),
            '#' => out.push_str("_dbl"),
            c => out.push(c),
        }
    }
    if JS_RESERVED.contains(&out.as_str()) {
        out.insert(0, '_');
    }
    out
}

/// A parsed assignment/READ/INPUT target.
struct LValue {
    /// Complete JavaScript lvalue expression
    js: String,
    /// Root variable name as written (suffix included)
    root: String,
    /// True when this is a plain scalar seen for the first time; the
    /// statement emits `var {js} = ...` to declare it.
    fresh_scalar: bool,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    target: Target,
    out: CodeBuffer,
    diagnostics: DiagnosticCollector,

    /// Declared-name sets, one per lexical scope; index 0 is the module.
    scopes: Vec<HashSet<String>>,
    /// Names made visible everywhere via DIM SHARED/REDIM SHARED.
    shared: HashSet<String>,
    /// Upper-cased name -> emitted spelling (first spelling wins).
    js_names: HashMap<String, String>,
    /// SUB/FUNCTION names, collected by the pre-pass.
    procs: HashMap<String, ProcKind>,
    /// TYPE name -> field list (JavaScript name, default literal).
    types: HashMap<String, Vec<(String, &'static str)>>,

    data: Vec<DataValue>,
    temp_counter: usize,
    loop_depth: usize,
    block_depth: usize,
    current_proc: Option<(String, ProcKind)>,
    /// Error-message context, e.g. "FOR loop" (teacher-style messages).
    context: Vec<&'static str>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], target: Target) -> Self {
        Self {
            tokens,
            pos: 0,
            target,
            out: CodeBuffer::new(),
            diagnostics: DiagnosticCollector::new(),
            scopes: vec![HashSet::new()],
            shared: HashSet::new(),
            js_names: HashMap::new(),
            procs: HashMap::new(),
            types: HashMap::new(),
            data: Vec::new(),
            temp_counter: 0,
            loop_depth: 0,
            block_depth: 0,
            current_proc: None,
            context: Vec::new(),
        }
    }

    fn run(mut self) -> ParseOutput {
        self.prepass();

        let data_literals = self.data_literals();
        self.out.emit_block(&emit::header(self.target, &data_literals));
        self.out.indent();

        loop {
            self.skip_separators();
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            self.statement_with_recovery();
        }

        // Close anything a truncated source left open so the emitted
        // program still brace-balances.
        while self.out.indent_level() > 1 {
            self.out.dedent();
            self.out.emit("}");
        }
        self.out.dedent();
        self.out.emit_block(&emit::footer(self.target));

        ParseOutput {
            code: self.out.into_code(),
            diagnostics: self.diagnostics.into_sorted(),
        }
    }

    // ----- token cursor -------------------------------------------------

    fn current(&self) -> &Token {
        // The stream is always Eof-terminated.
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream never empty"))
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn here(&self) -> (usize, usize) {
        let t = self.current();
        (t.line, t.column)
    }

    fn advance(&mut self) -> &Token {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
            &self.tokens[self.pos - 1]
        } else {
            self.current()
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if *self.peek() == TokenKind::Keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), String> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {}, found {}", kw.as_str(), describe(self.peek()))))
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), String> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {}, found {}", what, describe(self.peek()))))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        if let TokenKind::Identifier(name) = self.peek().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.err(&format!("expected a name, found {}", describe(self.peek()))))
        }
    }

    fn err(&self, msg: &str) -> String {
        match self.context.last() {
            Some(ctx) => format!("{} (in {})", msg, ctx),
            None => msg.to_string(),
        }
    }

    /// End of one statement: newline, colon separator, inline ELSE or Eof.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Colon | TokenKind::Keyword(Keyword::Else)
        )
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Colon) {
            self.advance();
        }
    }

    /// END followed by IF/SELECT/SUB/FUNCTION/TYPE (lookahead, consumes
    /// nothing).
    fn end_pair(&self) -> Option<Keyword> {
        if !matches!(self.peek(), TokenKind::Keyword(Keyword::End)) {
            return None;
        }
        match self.peek_at(1) {
            TokenKind::Keyword(kw @ (Keyword::If | Keyword::Select | Keyword::Sub | Keyword::Function | Keyword::Type)) => Some(*kw),
            _ => None,
        }
    }

    // ----- scope --------------------------------------------------------

    fn js_name(&mut self, name: &str) -> String {
        let upper = name.to_uppercase();
        self.js_names
            .entry(upper)
            .or_insert_with(|| mangle(name))
            .clone()
    }

    fn is_declared(&self, upper: &str) -> bool {
        if self.scopes.last().is_some_and(|s| s.contains(upper)) {
            return true;
        }
        self.scopes.len() > 1 && self.shared.contains(upper)
    }

    fn declare(&mut self, upper: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(upper);
        }
    }

    fn in_proc(&self) -> bool {
        self.scopes.len() > 1
    }

    /// Suggestion vocabulary for an unresolved name: keywords, builtins and
    /// every name visible from the current scope.
    fn vocabulary(&self) -> Vec<&str> {
        let mut vocab: Vec<&str> = Vec::new();
        for (n, _) in KEYWORDS {
            vocab.push(n);
        }
        for b in builtins::names() {
            vocab.push(b);
        }
        if let Some(scope) = self.scopes.last() {
            for s in scope {
                vocab.push(s.as_str());
            }
        }
        for s in &self.shared {
            vocab.push(s.as_str());
        }
        for s in self.procs.keys() {
            vocab.push(s.as_str());
        }
        vocab
    }

    /// A name read before any assignment: declare it with its default so
    /// the generated program stays runnable, and say so.
    fn implicit_declare_read(&mut self, name: &str, line: usize, column: usize) -> String {
        let suggestions = diagnostics::suggest(name, self.vocabulary());
        self.diagnostics.push(
            Diagnostic::warning(
                Category::Reference,
                format!("{} is used before it is assigned", name),
                line,
                column,
            )
            .with_length(name.chars().count())
            .with_suggestions(suggestions),
        );
        let js = self.js_name(name);
        self.declare(name.to_uppercase());
        self.out.emit(format!("var {} = {};", js, default_for(name)));
        js
    }

    fn fresh_temp(&mut self, stem: &str) -> String {
        self.temp_counter += 1;
        format!("{}{}", stem, self.temp_counter)
    }

    // ----- pre-pass -----------------------------------------------------

    /// Collect DATA literals and forward-referenced names. QBasic allows
    /// `READ` before `DATA` and calls before `SUB`, so both are gathered
    /// before any statement is parsed.
    fn prepass(&mut self) {
        let mut at_start = true;
        let mut i = 0;
        while i < self.tokens.len() {
            let kind = &self.tokens[i].kind;
            match kind {
                TokenKind::Keyword(Keyword::Data) if at_start => {
                    i = self.collect_data(i + 1);
                    at_start = true;
                    continue;
                }
                TokenKind::Keyword(kw @ (Keyword::Sub | Keyword::Function)) if at_start => {
                    if let TokenKind::Identifier(name) = &self.tokens.get(i + 1).map(|t| &t.kind).unwrap_or(&TokenKind::Eof) {
                        let kind = if *kw == Keyword::Sub { ProcKind::Sub } else { ProcKind::Function };
                        self.procs.insert(name.to_uppercase(), kind);
                    }
                }
                TokenKind::Keyword(Keyword::Type) if at_start => {
                    if let TokenKind::Identifier(name) = &self.tokens.get(i + 1).map(|t| &t.kind).unwrap_or(&TokenKind::Eof) {
                        self.types.entry(name.to_uppercase()).or_default();
                    }
                }
                _ => {}
            }
            at_start = matches!(kind, TokenKind::Newline | TokenKind::Colon);
            i += 1;
        }
    }

    /// Literals of one DATA statement, in source order. Unquoted words are
    /// string data in QBasic.
    fn collect_data(&mut self, mut i: usize) -> usize {
        loop {
            // Optional sign on numeric data
            let mut negative = false;
            while let Some(tok) = self.tokens.get(i) {
                match &tok.kind {
                    TokenKind::Minus => {
                        negative = true;
                        i += 1;
                    }
                    TokenKind::Plus => {
                        i += 1;
                    }
                    _ => break,
                }
            }
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::Number(text)) => {
                    let text = if negative { format!("-{}", text) } else { text.clone() };
                    self.data.push(DataValue::Num(text));
                    i += 1;
                }
                Some(TokenKind::QString(s)) => {
                    self.data.push(DataValue::Str(s.clone()));
                    i += 1;
                }
                Some(TokenKind::Identifier(word)) => {
                    self.data.push(DataValue::Str(word.clone()));
                    i += 1;
                }
                _ => {}
            }
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::Comma) => i += 1,
                _ => break,
            }
        }
        // Leave the newline for the caller's bookkeeping
        while let Some(tok) = self.tokens.get(i) {
            if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            i += 1;
        }
        i
    }

    fn data_literals(&self) -> String {
        let items: Vec<String> = self
            .data
            .iter()
            .map(|v| match v {
                DataValue::Num(text) => text.clone(),
                DataValue::Str(s) => js_string(s),
            })
            .collect();
        format!("[{}]", items.join(", "))
    }

    // ----- statements ---------------------------------------------------

    fn statement_with_recovery(&mut self) {
        if let Err(message) = self.statement() {
            let (line, column) = self.here();
            self.diagnostics
                .push(Diagnostic::error(Category::Syntax, message, line, column));
            self.pos = diagnostics::sync_to_statement_boundary(self.tokens, self.pos);
        }
    }

    fn statement(&mut self) -> Result<(), String> {
        match self.peek().clone() {
            TokenKind::Newline | TokenKind::Colon => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),

            // Classic line numbers are tolerated; they only matter to GOTO,
            // which is itself unsupported.
            TokenKind::Number(_) => {
                self.advance();
                if self.at_statement_end() {
                    Ok(())
                } else {
                    self.statement()
                }
            }

            TokenKind::Keyword(kw) => {
                self.advance();
                self.keyword_statement(kw)
            }

            TokenKind::Identifier(name) => {
                // Text label, bare procedure call, or assignment
                if matches!(self.peek_at(1), TokenKind::Colon)
                    && !self.procs.contains_key(&name.to_uppercase())
                {
                    self.advance();
                    self.advance();
                    self.out.emit(format!("// {}:", name));
                    return Ok(());
                }
                if self.procs.get(&name.to_uppercase()) == Some(&ProcKind::Sub)
                    && !matches!(self.peek_at(1), TokenKind::Equal)
                {
                    self.advance();
                    return self.bare_call(&name);
                }
                self.assignment()
            }

            other => Err(self.err(&format!("expected a statement, found {}", describe(&other)))),
        }
    }

    fn keyword_statement(&mut self, kw: Keyword) -> Result<(), String> {
        match kw {
            Keyword::Let => self.assignment(),
            Keyword::Print => self.print_stmt(),
            Keyword::Input => self.input_stmt(false),
            Keyword::Line => {
                if self.eat_keyword(Keyword::Input) {
                    self.input_stmt(true)
                } else {
                    self.line_stmt()
                }
            }
            Keyword::If => self.if_stmt(),
            Keyword::For => self.for_stmt(),
            Keyword::While => self.while_stmt(),
            Keyword::Do => self.do_stmt(),
            Keyword::Select => self.select_stmt(),
            Keyword::Exit => self.exit_stmt(),
            Keyword::Dim => self.dim_stmt(false),
            Keyword::Redim => self.dim_stmt(true),
            Keyword::Const => self.const_stmt(),
            Keyword::Swap => self.swap_stmt(),
            Keyword::Type => self.type_stmt(),
            Keyword::Sub => self.proc_stmt(ProcKind::Sub),
            Keyword::Function => self.proc_stmt(ProcKind::Function),
            Keyword::Call => {
                let name = self.expect_identifier()?;
                self.bare_call(&name)
            }
            Keyword::Shared => self.shared_stmt(),
            Keyword::Static => self.static_stmt(),

            Keyword::Data => {
                // Values were captured by the pre-pass
                self.skip_to_eol();
                Ok(())
            }
            Keyword::Read => self.read_stmt(),
            Keyword::Restore => {
                if !self.at_statement_end() {
                    let (line, column) = self.here();
                    self.skip_to_eol();
                    self.diagnostics.push(Diagnostic::warning(
                        Category::Semantic,
                        "RESTORE to a label is not supported; the data cursor resets to the start",
                        line,
                        column,
                    ));
                }
                self.out.emit("_restore();");
                Ok(())
            }

            Keyword::Cls => {
                self.out.emit("_cls();");
                Ok(())
            }
            Keyword::Locate => {
                let row = self.expression()?;
                self.expect(TokenKind::Comma, "\",\"")?;
                let col = self.expression()?;
                self.out.emit(format!("_locate({}, {});", row, col));
                Ok(())
            }
            Keyword::Color => {
                let fg = self.expression()?;
                if self.eat(&TokenKind::Comma) {
                    let bg = self.expression()?;
                    self.out.emit(format!("_color({}, {});", fg, bg));
                } else {
                    self.out.emit(format!("_color({});", fg));
                }
                Ok(())
            }
            Keyword::Screen => {
                let mode = self.expression()?;
                self.out.emit(format!("_screen({});", mode));
                Ok(())
            }
            Keyword::Width => {
                let cols = self.expression()?;
                if self.eat(&TokenKind::Comma) {
                    let rows = self.expression()?;
                    self.out.emit(format!("_width({}, {});", cols, rows));
                } else {
                    self.out.emit(format!("_width({});", cols));
                }
                Ok(())
            }
            Keyword::Key => self.key_stmt(),

            Keyword::Beep => {
                self.out.emit("await _beep();");
                Ok(())
            }
            Keyword::Sound => {
                let freq = self.expression()?;
                self.expect(TokenKind::Comma, "\",\"")?;
                let duration = self.expression()?;
                self.out.emit(format!("await _sound({}, {});", freq, duration));
                Ok(())
            }
            Keyword::Play => {
                let tune = self.expression()?;
                self.out.emit(format!("await _play({});", tune));
                Ok(())
            }
            Keyword::Sleep => {
                if self.at_statement_end() {
                    self.out.emit("await _sleep();");
                } else {
                    let seconds = self.expression()?;
                    self.out.emit(format!("await _sleep(({}) * 1000);", seconds));
                }
                Ok(())
            }
            Keyword::Randomize => {
                if self.at_statement_end() {
                    self.out.emit("_randomize();");
                } else {
                    let seed = self.expression()?;
                    self.out.emit(format!("_randomize({});", seed));
                }
                Ok(())
            }

            Keyword::Pset => self.point_stmt("_pset"),
            Keyword::Preset => self.point_stmt("_preset"),
            Keyword::Circle => self.circle_stmt(),
            Keyword::Paint => self.paint_stmt(),
            Keyword::Get => self.get_stmt(),
            Keyword::Put => self.put_stmt(),

            Keyword::Open => self.open_stmt(),
            Keyword::Close => self.close_stmt(),
            Keyword::Write => self.write_stmt(),

            Keyword::GoTo => self.unsupported_jump("GOTO"),
            Keyword::GoSub => self.gosub_stmt(),
            Keyword::Return => {
                let (line, column) = self.here();
                self.out.emit("// RETURN (no matching GOSUB)");
                self.diagnostics.push(Diagnostic::warning(
                    Category::Semantic,
                    "RETURN outside a translatable GOSUB is ignored",
                    line,
                    column,
                ));
                Ok(())
            }
            Keyword::On => self.unsupported_jump("ON"),
            Keyword::Error => self.unsupported_jump("ERROR"),
            Keyword::Resume => self.unsupported_jump("RESUME"),
            Keyword::Def => self.unsupported_jump("DEF"),

            Keyword::End => match self.peek().clone() {
                TokenKind::Keyword(other @ (Keyword::If | Keyword::Select | Keyword::Sub | Keyword::Function | Keyword::Type)) => {
                    Err(self.err(&format!("END {} without a matching {}", other.as_str(), other.as_str())))
                }
                _ => {
                    self.out.emit("_end();");
                    Ok(())
                }
            },
            Keyword::Stop | Keyword::System => {
                self.out.emit("_end();");
                Ok(())
            }

            // QB64 extensions
            Keyword::Delay => {
                let seconds = self.expression()?;
                self.out.emit(format!("await _sleep(({}) * 1000);", seconds));
                Ok(())
            }
            Keyword::Limit => {
                let fps = self.expression()?;
                self.out.emit(format!("await _limit({});", fps));
                Ok(())
            }
            Keyword::Display => {
                self.out.emit("_display();");
                Ok(())
            }
            Keyword::Title => {
                let title = self.expression()?;
                self.out.emit(format!("_title({});", title));
                Ok(())
            }
            Keyword::Fullscreen => {
                self.out.emit("_fullscreen();");
                Ok(())
            }

            other => Err(self.err(&format!("{} is not valid at the start of a statement", other.as_str()))),
        }
    }

    // ----- assignment and lvalues --------------------------------------

    /// Parse `name`, `name(indices)`, and `.member` chains into a
    /// JavaScript lvalue. Unseen array/record roots are declared on the
    /// spot; unseen scalars are flagged so the caller declares with `var`.
    fn lvalue(&mut self) -> Result<LValue, String> {
        let root = self.expect_identifier()?;
        let upper = root.to_uppercase();
        let mut js = self.js_name(&root);
        let mut fresh_scalar = false;

        let mut indices = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            loop {
                indices.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightParen, "\")\"")?;
        }

        if !self.is_declared(&upper) {
            if indices.is_empty() && !matches!(self.peek(), TokenKind::Dot) {
                fresh_scalar = true;
                self.declare(upper);
            } else if !indices.is_empty() {
                // Undimensioned arrays default to 10 elements per subscript
                let dims = vec!["10"; indices.len()].join(", ");
                self.declare(upper);
                self.out
                    .emit(format!("var {} = _arr([{}], {});", js, dims, default_for(&root)));
            } else {
                self.declare(upper);
                self.out.emit(format!("var {} = {{}};", js));
            }
        }

        for index in &indices {
            js.push_str(&format!("[{}]", index));
        }

        while self.eat(&TokenKind::Dot) {
            let field = self.expect_identifier()?;
            js.push_str(&format!(".{}", mangle(&field)));
        }

        Ok(LValue { js, root, fresh_scalar })
    }

    fn assignment(&mut self) -> Result<(), String> {
        if let TokenKind::Identifier(name) = self.peek() {
            let upper = name.to_uppercase();
            let is_own_function = self
                .current_proc
                .as_ref()
                .is_some_and(|(n, k)| *k == ProcKind::Function && *n == upper);
            if self.procs.contains_key(&upper) && !is_own_function {
                return Err(self.err(&format!("cannot assign to {}; it names a procedure", name)));
            }
        }
        let target = self.lvalue()?;
        self.expect(TokenKind::Equal, "\"=\"")?;
        let value = self.expression()?;
        if target.fresh_scalar {
            self.out.emit(format!("var {} = {};", target.js, value));
        } else {
            self.out.emit(format!("{} = {};", target.js, value));
        }
        Ok(())
    }

    /// A SUB invocation, with or without CALL/parentheses.
    fn bare_call(&mut self, name: &str) -> Result<(), String> {
        let js = self.js_name(name);
        let mut args = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            if !matches!(self.peek(), TokenKind::RightParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "\")\"")?;
        } else if !self.at_statement_end() {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.out.emit(format!("await {}({});", js, args.join(", ")));
        Ok(())
    }

    // ----- I/O ----------------------------------------------------------

    fn print_stmt(&mut self) -> Result<(), String> {
        // PRINT #n, ... writes to an open file instead of the screen
        if self.eat(&TokenKind::Hash) {
            let file = self.expression()?;
            self.expect(TokenKind::Comma, "\",\"")?;
            let (parts, newline) = self.print_items()?;
            let mut text = join_parts(&parts);
            if newline {
                text = format!("{} + \"\\n\"", text);
            }
            self.out.emit(format!("_fwrite({}, {});", file, text));
            return Ok(());
        }

        let (parts, newline) = self.print_items()?;
        self.out
            .emit(format!("_print({}, {});", join_parts(&parts), newline));
        Ok(())
    }

    /// The item list of a PRINT: expressions mixed with `,` (tab zone) and
    /// `;` (no separator). A trailing separator suppresses the newline.
    fn print_items(&mut self) -> Result<(Vec<String>, bool), String> {
        let mut parts = Vec::new();
        let mut trailing_separator = false;
        while !self.at_statement_end() {
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                    parts.push("\"\\t\"".to_string());
                    trailing_separator = true;
                }
                TokenKind::Semicolon => {
                    self.advance();
                    trailing_separator = true;
                }
                _ => {
                    let expr = self.expression()?;
                    parts.push(format!("String({})", expr));
                    trailing_separator = false;
                }
            }
        }
        Ok((parts, !trailing_separator))
    }

    fn input_stmt(&mut self, line_input: bool) -> Result<(), String> {
        // Optional leading `;` keeps the cursor on the prompt line
        self.eat(&TokenKind::Semicolon);

        let prompt = if let TokenKind::QString(text) = self.peek().clone() {
            self.advance();
            // `;` appends the "? " marker, `,` does not
            let marker = self.eat(&TokenKind::Semicolon);
            if !marker {
                self.eat(&TokenKind::Comma);
            }
            if marker {
                js_string(&format!("{}? ", text))
            } else {
                js_string(&text)
            }
        } else if self.eat(&TokenKind::Hash) {
            // INPUT #n, vars: read from an open file
            let file = self.expression()?;
            self.expect(TokenKind::Comma, "\",\"")?;
            loop {
                let target = self.lvalue()?;
                let coerced = coerce_read(&target.root, &format!("_fread({})", file));
                if target.fresh_scalar {
                    self.out.emit(format!("var {} = {};", target.js, coerced));
                } else {
                    self.out.emit(format!("{} = {};", target.js, coerced));
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            return Ok(());
        } else {
            js_string("? ")
        };

        let mut first = true;
        loop {
            let target = self.lvalue()?;
            let this_prompt = if first { prompt.clone() } else { js_string("? ") };
            first = false;
            let raw = format!("await _input({})", this_prompt);
            let coerced = if line_input {
                format!("String({})", raw)
            } else {
                coerce_read(&target.root, &raw)
            };
            if target.fresh_scalar {
                self.out.emit(format!("var {} = {};", target.js, coerced));
            } else {
                self.out.emit(format!("{} = {};", target.js, coerced));
            }
            if line_input || !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn read_stmt(&mut self) -> Result<(), String> {
        loop {
            let target = self.lvalue()?;
            let coerced = coerce_read(&target.root, "_read()");
            if target.fresh_scalar {
                self.out.emit(format!("var {} = {};", target.js, coerced));
            } else {
                self.out.emit(format!("{} = {};", target.js, coerced));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    // ----- control flow -------------------------------------------------

    /// Keep the message-context stack balanced across error returns.
    fn with_context<F>(&mut self, ctx: &'static str, body: F) -> Result<(), String>
    where
        F: FnOnce(&mut Self) -> Result<(), String>,
    {
        self.context.push(ctx);
        let result = body(self);
        self.context.pop();
        result
    }

    fn if_stmt(&mut self) -> Result<(), String> {
        self.with_context("IF statement", Self::if_stmt_inner)
    }

    fn if_stmt_inner(&mut self) -> Result<(), String> {
        let condition = self.expression()?;
        self.expect_keyword(Keyword::Then)?;

        if !matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
            // Single-line IF: exactly one inline statement per branch
            self.out.emit(format!("if ({}) {{", condition));
            self.out.indent();
            self.block_depth += 1;
            self.inline_branch();
            if self.eat_keyword(Keyword::Else) {
                self.out.dedent();
                self.out.emit("} else {");
                self.out.indent();
                self.inline_branch();
            }
            self.out.dedent();
            self.out.emit("}");
            self.block_depth -= 1;
            return Ok(());
        }

        // Block IF
        self.out.emit(format!("if ({}) {{", condition));
        self.out.indent();
        self.block_depth += 1;
        loop {
            self.skip_separators();
            match self.peek().clone() {
                TokenKind::Keyword(Keyword::ElseIf) => {
                    self.advance();
                    let next_condition = self.expression()?;
                    self.expect_keyword(Keyword::Then)?;
                    self.out.dedent();
                    self.out.emit(format!("}} else if ({}) {{", next_condition));
                    self.out.indent();
                }
                TokenKind::Keyword(Keyword::Else) => {
                    self.advance();
                    self.out.dedent();
                    self.out.emit("} else {");
                    self.out.indent();
                }
                TokenKind::Keyword(Keyword::EndIf) => {
                    self.advance();
                    break;
                }
                TokenKind::Keyword(Keyword::End) if self.end_pair() == Some(Keyword::If) => {
                    self.advance();
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "IF without END IF",
                        line,
                        column,
                    ));
                    break;
                }
                _ => self.statement_with_recovery(),
            }
        }
        self.out.dedent();
        self.out.emit("}");
        self.block_depth -= 1;
        Ok(())
    }

    /// One branch of a single-line IF. A bare line number after THEN/ELSE
    /// is the classic `IF x THEN 100` jump, which does not translate.
    fn inline_branch(&mut self) {
        if let TokenKind::Number(text) = self.peek().clone() {
            let (line, column) = self.here();
            self.advance();
            self.out.emit(format!("// GOTO {} (unsupported)", text));
            self.diagnostics.push(Diagnostic::warning(
                Category::Semantic,
                "jump targets after THEN are not supported",
                line,
                column,
            ));
            return;
        }
        self.statement_with_recovery();
    }

    fn for_stmt(&mut self) -> Result<(), String> {
        self.with_context("FOR loop", Self::for_stmt_inner)
    }

    fn for_stmt_inner(&mut self) -> Result<(), String> {
        let var = self.expect_identifier()?;
        let upper = var.to_uppercase();
        let js = self.js_name(&var);
        self.expect(TokenKind::Equal, "\"=\"")?;
        let start = self.expression()?;
        self.expect_keyword(Keyword::To)?;
        let end = self.expression()?;
        let step = if self.eat_keyword(Keyword::Step) {
            self.expression()?
        } else {
            "1".to_string()
        };

        if self.is_declared(&upper) {
            self.out.emit(format!("{} = {};", js, start));
        } else {
            self.declare(upper);
            self.out.emit(format!("var {} = {};", js, start));
        }
        // STEP may be a runtime expression; test both directions each pass
        self.out.emit(format!(
            "for (; (({step}) >= 0) ? ({v} <= ({end})) : ({v} >= ({end})); {v} = {v} + ({step})) {{",
            step = step,
            v = js,
            end = end,
        ));
        self.out.indent();
        self.block_depth += 1;
        self.loop_depth += 1;

        loop {
            self.skip_separators();
            match self.peek() {
                TokenKind::Keyword(Keyword::Next) => break,
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "FOR without NEXT",
                        line,
                        column,
                    ));
                    break;
                }
                _ => self.statement_with_recovery(),
            }
        }
        if self.eat_keyword(Keyword::Next) {
            if let TokenKind::Identifier(counter) = self.peek().clone() {
                self.advance();
                if counter.to_uppercase() != var.to_uppercase() {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::warning(
                        Category::Semantic,
                        format!("NEXT {} closes FOR {}", counter, var),
                        line,
                        column,
                    ));
                }
            }
        }

        self.loop_depth -= 1;
        self.out.dedent();
        self.out.emit("}");
        self.block_depth -= 1;
        Ok(())
    }

    fn while_stmt(&mut self) -> Result<(), String> {
        self.with_context("WHILE loop", Self::while_stmt_inner)
    }

    fn while_stmt_inner(&mut self) -> Result<(), String> {
        let condition = self.expression()?;
        self.out.emit(format!("while ({}) {{", condition));
        self.out.indent();
        self.block_depth += 1;
        self.loop_depth += 1;
        loop {
            self.skip_separators();
            match self.peek() {
                TokenKind::Keyword(Keyword::Wend) => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "WHILE without WEND",
                        line,
                        column,
                    ));
                    break;
                }
                _ => self.statement_with_recovery(),
            }
        }
        self.loop_depth -= 1;
        self.out.dedent();
        self.out.emit("}");
        self.block_depth -= 1;
        Ok(())
    }

    fn do_stmt(&mut self) -> Result<(), String> {
        self.with_context("DO loop", Self::do_stmt_inner)
    }

    fn do_stmt_inner(&mut self) -> Result<(), String> {
        let pre_test = if self.eat_keyword(Keyword::While) {
            Some(self.expression()?)
        } else if self.eat_keyword(Keyword::Until) {
            Some(format!("!({})", self.expression()?))
        } else {
            None
        };

        match &pre_test {
            Some(condition) => self.out.emit(format!("while ({}) {{", condition)),
            None => self.out.emit("do {"),
        }
        self.out.indent();
        self.block_depth += 1;
        self.loop_depth += 1;

        loop {
            self.skip_separators();
            match self.peek() {
                TokenKind::Keyword(Keyword::Loop) => break,
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "DO without LOOP",
                        line,
                        column,
                    ));
                    break;
                }
                _ => self.statement_with_recovery(),
            }
        }
        self.eat_keyword(Keyword::Loop);

        self.loop_depth -= 1;
        self.out.dedent();
        if pre_test.is_some() {
            self.out.emit("}");
        } else if self.eat_keyword(Keyword::While) {
            let condition = self.expression()?;
            self.out.emit(format!("}} while ({});", condition));
        } else if self.eat_keyword(Keyword::Until) {
            let condition = self.expression()?;
            self.out.emit(format!("}} while (!({}));", condition));
        } else {
            self.out.emit("} while (true);");
        }
        self.block_depth -= 1;
        Ok(())
    }

    fn select_stmt(&mut self) -> Result<(), String> {
        self.with_context("SELECT CASE", Self::select_stmt_inner)
    }

    fn select_stmt_inner(&mut self) -> Result<(), String> {
        self.expect_keyword(Keyword::Case)?;
        let selector = self.expression()?;
        // Evaluate the selector exactly once
        let temp = self.fresh_temp("_sel");
        self.out.emit(format!("const {} = {};", temp, selector));

        let mut open = false;
        loop {
            self.skip_separators();
            match self.peek().clone() {
                TokenKind::Keyword(Keyword::Case) => {
                    self.advance();
                    if self.eat_keyword(Keyword::Else) {
                        if open {
                            self.out.dedent();
                            self.out.emit("} else {");
                        } else {
                            self.out.emit("if (true) {");
                        }
                    } else {
                        let condition = self.case_conditions(&temp)?;
                        if open {
                            self.out.dedent();
                            self.out.emit(format!("}} else if ({}) {{", condition));
                        } else {
                            self.out.emit(format!("if ({}) {{", condition));
                        }
                    }
                    if !open {
                        self.block_depth += 1;
                        open = true;
                    }
                    self.out.indent();
                }
                TokenKind::Keyword(Keyword::End) if self.end_pair() == Some(Keyword::Select) => {
                    self.advance();
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "SELECT CASE without END SELECT",
                        line,
                        column,
                    ));
                    break;
                }
                _ if !open => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "expected CASE",
                        line,
                        column,
                    ));
                    self.pos = diagnostics::sync_to_statement_boundary(self.tokens, self.pos);
                }
                _ => self.statement_with_recovery(),
            }
        }
        if open {
            self.out.dedent();
            self.out.emit("}");
            self.block_depth -= 1;
        }
        Ok(())
    }

    /// One CASE list: values, `lo TO hi` ranges and `IS <op>` relations,
    /// OR-combined against the selector temporary.
    fn case_conditions(&mut self, temp: &str) -> Result<String, String> {
        let mut tests = Vec::new();
        loop {
            if self.eat_keyword(Keyword::Is) {
                let op = match self.peek() {
                    TokenKind::Equal => "===",
                    TokenKind::NotEqual => "!==",
                    TokenKind::Less => "<",
                    TokenKind::LessEqual => "<=",
                    TokenKind::Greater => ">",
                    TokenKind::GreaterEqual => ">=",
                    other => return Err(self.err(&format!("expected a comparison after IS, found {}", describe(other)))),
                };
                self.advance();
                let rhs = self.expression()?;
                tests.push(format!("{} {} {}", temp, op, rhs));
            } else {
                let value = self.expression()?;
                if self.eat_keyword(Keyword::To) {
                    let high = self.expression()?;
                    tests.push(format!("({t} >= {lo} && {t} <= {hi})", t = temp, lo = value, hi = high));
                } else {
                    tests.push(format!("{} === {}", temp, value));
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(tests.join(" || "))
    }

    fn exit_stmt(&mut self) -> Result<(), String> {
        match self.peek().clone() {
            TokenKind::Keyword(Keyword::For) | TokenKind::Keyword(Keyword::Do) | TokenKind::Keyword(Keyword::While) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(self.err("EXIT outside a loop"));
                }
                self.out.emit("break;");
                Ok(())
            }
            TokenKind::Keyword(Keyword::Sub) => {
                self.advance();
                match &self.current_proc {
                    Some((_, ProcKind::Sub)) => {
                        self.out.emit("return;");
                        Ok(())
                    }
                    _ => Err(self.err("EXIT SUB outside a SUB")),
                }
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                match self.current_proc.clone() {
                    Some((name, ProcKind::Function)) => {
                        let js = self.js_name(&name);
                        self.out.emit(format!("return {};", js));
                        Ok(())
                    }
                    _ => Err(self.err("EXIT FUNCTION outside a FUNCTION")),
                }
            }
            other => Err(self.err(&format!("expected FOR, DO, WHILE, SUB or FUNCTION after EXIT, found {}", describe(&other)))),
        }
    }

    // ----- declarations -------------------------------------------------

    fn dim_stmt(&mut self, redim: bool) -> Result<(), String> {
        let shared = self.eat_keyword(Keyword::Shared);
        loop {
            let name = self.expect_identifier()?;
            let upper = name.to_uppercase();
            let js = self.js_name(&name);

            let mut dims = Vec::new();
            if self.eat(&TokenKind::LeftParen) {
                loop {
                    let low = self.expression()?;
                    // `DIM a(1 TO 10)`: only the upper bound sizes the array
                    if self.eat_keyword(Keyword::To) {
                        dims.push(self.expression()?);
                    } else {
                        dims.push(low);
                    }
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightParen, "\")\"")?;
            }

            let init = if self.eat_keyword(Keyword::As) {
                self.as_type_init(&name)?
            } else {
                default_for(&name).to_string()
            };

            let already = self.is_declared(&upper) || (shared && self.shared.contains(&upper));
            if shared {
                self.shared.insert(upper.clone());
                if let Some(global) = self.scopes.first_mut() {
                    global.insert(upper.clone());
                }
            } else {
                self.declare(upper.clone());
            }

            let value = if dims.is_empty() {
                init
            } else {
                format!("_arr([{}], {})", dims.join(", "), init)
            };
            if already && redim {
                self.out.emit(format!("{} = {};", js, value));
            } else if already {
                // DIM of a known name re-initializes in place
                self.out.emit(format!("{} = {};", js, value));
            } else {
                self.out.emit(format!("var {} = {};", js, value));
            }

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    /// The initializer for an `AS <type>` clause: scalar default or a
    /// record literal for user-defined TYPEs.
    fn as_type_init(&mut self, name: &str) -> Result<String, String> {
        match self.peek().clone() {
            TokenKind::Keyword(Keyword::Integer)
            | TokenKind::Keyword(Keyword::Long)
            | TokenKind::Keyword(Keyword::Single)
            | TokenKind::Keyword(Keyword::Double) => {
                self.advance();
                Ok("0".to_string())
            }
            TokenKind::Keyword(Keyword::StringType) => {
                self.advance();
                // Fixed-length form: STRING * n
                if self.eat(&TokenKind::Star) {
                    self.expression()?;
                }
                Ok("\"\"".to_string())
            }
            TokenKind::Identifier(type_name) => {
                self.advance();
                let upper = type_name.to_uppercase();
                match self.types.get(&upper) {
                    Some(fields) => {
                        let body: Vec<String> = fields
                            .iter()
                            .map(|(field, default)| format!("{}: {}", field, default))
                            .collect();
                        Ok(format!("{{ {} }}", body.join(", ")))
                    }
                    None => {
                        let (line, column) = self.here();
                        self.diagnostics.push(Diagnostic::error(
                            Category::Type,
                            format!("{} is not a TYPE", type_name),
                            line,
                            column,
                        ));
                        Ok(default_for(name).to_string())
                    }
                }
            }
            other => Err(self.err(&format!("expected a type after AS, found {}", describe(&other)))),
        }
    }

    fn const_stmt(&mut self) -> Result<(), String> {
        loop {
            let name = self.expect_identifier()?;
            let js = self.js_name(&name);
            self.declare(name.to_uppercase());
            self.expect(TokenKind::Equal, "\"=\"")?;
            let value = self.expression()?;
            self.out.emit(format!("const {} = {};", js, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn swap_stmt(&mut self) -> Result<(), String> {
        let a = self.lvalue()?;
        self.expect(TokenKind::Comma, "\",\"")?;
        let b = self.lvalue()?;
        if a.fresh_scalar {
            self.out.emit(format!("var {} = {};", a.js, default_for(&a.root)));
        }
        if b.fresh_scalar {
            self.out.emit(format!("var {} = {};", b.js, default_for(&b.root)));
        }
        self.out.emit(format!("[{a}, {b}] = [{b}, {a}];", a = a.js, b = b.js));
        Ok(())
    }

    fn type_stmt(&mut self) -> Result<(), String> {
        self.with_context("TYPE block", Self::type_stmt_inner)
    }

    fn type_stmt_inner(&mut self) -> Result<(), String> {
        let name = self.expect_identifier()?;
        let upper = name.to_uppercase();
        let mut fields = Vec::new();

        loop {
            self.skip_separators();
            match self.peek().clone() {
                TokenKind::Keyword(Keyword::End) if self.end_pair() == Some(Keyword::Type) => {
                    self.advance();
                    self.advance();
                    break;
                }
                TokenKind::Identifier(field) => {
                    self.advance();
                    self.expect_keyword(Keyword::As)?;
                    let default = match self.peek().clone() {
                        TokenKind::Keyword(Keyword::Integer)
                        | TokenKind::Keyword(Keyword::Long)
                        | TokenKind::Keyword(Keyword::Single)
                        | TokenKind::Keyword(Keyword::Double) => {
                            self.advance();
                            "0"
                        }
                        TokenKind::Keyword(Keyword::StringType) => {
                            self.advance();
                            if self.eat(&TokenKind::Star) {
                                self.expression()?;
                            }
                            "\"\""
                        }
                        other => {
                            return Err(self.err(&format!("expected a field type, found {}", describe(&other))));
                        }
                    };
                    fields.push((mangle(&field), default));
                }
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        "TYPE without END TYPE",
                        line,
                        column,
                    ));
                    break;
                }
                other => {
                    return Err(self.err(&format!("expected a field name, found {}", describe(&other))));
                }
            }
        }

        self.types.insert(upper, fields);
        Ok(())
    }

    fn shared_stmt(&mut self) -> Result<(), String> {
        // SHARED inside a procedure pulls module-level names into scope
        if !self.in_proc() {
            return Err(self.err("SHARED is only valid inside a SUB or FUNCTION"));
        }
        loop {
            let name = self.expect_identifier()?;
            self.declare(name.to_uppercase());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn static_stmt(&mut self) -> Result<(), String> {
        let (line, column) = self.here();
        self.diagnostics.push(Diagnostic::warning(
            Category::Semantic,
            "STATIC variables are reinitialized on every call",
            line,
            column,
        ));
        loop {
            let name = self.expect_identifier()?;
            let js = self.js_name(&name);
            self.declare(name.to_uppercase());
            if self.eat_keyword(Keyword::As) {
                let init = self.as_type_init(&name)?;
                self.out.emit(format!("var {} = {};", js, init));
            } else {
                self.out.emit(format!("var {} = {};", js, default_for(&name)));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    // ----- procedures ---------------------------------------------------

    fn proc_stmt(&mut self, kind: ProcKind) -> Result<(), String> {
        let label = if kind == ProcKind::Sub { "SUB" } else { "FUNCTION" };
        if self.in_proc() {
            return Err(self.err(&format!("{} cannot be nested", label)));
        }
        if self.block_depth > 0 {
            return Err(self.err(&format!("{} must start at module level", label)));
        }
        let name = self.expect_identifier()?;

        self.context.push(if kind == ProcKind::Sub { "SUB body" } else { "FUNCTION body" });
        self.scopes.push(HashSet::new());
        self.current_proc = Some((name.to_uppercase(), kind));
        let result = self.proc_body(kind, label, &name);
        self.scopes.pop();
        self.current_proc = None;
        self.context.pop();
        result
    }

    fn proc_body(&mut self, kind: ProcKind, label: &str, name: &str) -> Result<(), String> {
        let upper = name.to_uppercase();
        let js = self.js_name(name);
        self.procs.insert(upper, kind);

        let mut params = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            if !matches!(self.peek(), TokenKind::RightParen) {
                loop {
                    let param = self.expect_identifier()?;
                    // Array parameter marker `name()` and AS clauses only
                    // matter to the checker, not to the emitted JS.
                    if self.eat(&TokenKind::LeftParen) {
                        self.expect(TokenKind::RightParen, "\")\"")?;
                    }
                    if self.eat_keyword(Keyword::As) {
                        self.as_type_init(&param)?;
                    }
                    self.declare(param.to_uppercase());
                    params.push(self.js_name(&param));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "\")\"")?;
        }
        // `SUB Foo (x) STATIC` marker
        self.eat_keyword(Keyword::Static);

        self.out.emit(format!("async function {}({}) {{", js, params.join(", ")));
        self.out.indent();
        if kind == ProcKind::Function {
            // The function name doubles as its return variable
            self.declare(name.to_uppercase());
            self.out.emit(format!("var {} = {};", js, default_for(name)));
        }

        let closer = if kind == ProcKind::Sub { Keyword::Sub } else { Keyword::Function };
        loop {
            self.skip_separators();
            match self.peek() {
                TokenKind::Keyword(Keyword::End) if self.end_pair() == Some(closer) => {
                    self.advance();
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let (line, column) = self.here();
                    self.diagnostics.push(Diagnostic::error(
                        Category::Syntax,
                        format!("{} without END {}", label, label),
                        line,
                        column,
                    ));
                    break;
                }
                _ => self.statement_with_recovery(),
            }
        }

        if kind == ProcKind::Function {
            // Injected exactly once, at the close of the body
            self.out.emit(format!("return {};", js));
        }
        self.out.dedent();
        self.out.emit("}");
        Ok(())
    }

    // ----- graphics -----------------------------------------------------

    /// `(x, y)` coordinate pair.
    fn coordinates(&mut self) -> Result<(String, String), String> {
        self.expect(TokenKind::LeftParen, "\"(\"")?;
        let x = self.expression()?;
        self.expect(TokenKind::Comma, "\",\"")?;
        let y = self.expression()?;
        self.expect(TokenKind::RightParen, "\")\"")?;
        Ok((x, y))
    }

    fn point_stmt(&mut self, host_fn: &str) -> Result<(), String> {
        let (x, y) = self.coordinates()?;
        if self.eat(&TokenKind::Comma) {
            let color = self.expression()?;
            self.out.emit(format!("{}({}, {}, {});", host_fn, x, y, color));
        } else {
            self.out.emit(format!("{}({}, {});", host_fn, x, y));
        }
        Ok(())
    }

    fn line_stmt(&mut self) -> Result<(), String> {
        let (x1, y1) = self.coordinates()?;
        self.expect(TokenKind::Minus, "\"-\"")?;
        let (x2, y2) = self.coordinates()?;

        let mut args = vec![x1, y1, x2, y2];
        if self.eat(&TokenKind::Comma) {
            if matches!(self.peek(), TokenKind::Comma) {
                args.push("undefined".to_string());
            } else {
                args.push(self.expression()?);
            }
            if self.eat(&TokenKind::Comma) {
                if let TokenKind::Identifier(style) = self.peek().clone() {
                    match style.to_uppercase().as_str() {
                        "B" | "BF" => {
                            self.advance();
                            args.push(js_string(&style.to_uppercase()));
                        }
                        _ => return Err(self.err("expected B or BF after LINE color")),
                    }
                }
            }
        }
        self.out.emit(format!("_line({});", args.join(", ")));
        Ok(())
    }

    fn circle_stmt(&mut self) -> Result<(), String> {
        let (x, y) = self.coordinates()?;
        self.expect(TokenKind::Comma, "\",\"")?;
        let radius = self.expression()?;
        let mut args = vec![x, y, radius];
        while self.eat(&TokenKind::Comma) {
            if matches!(self.peek(), TokenKind::Comma) {
                args.push("undefined".to_string());
            } else {
                args.push(self.expression()?);
            }
        }
        self.out.emit(format!("_circle({});", args.join(", ")));
        Ok(())
    }

    fn paint_stmt(&mut self) -> Result<(), String> {
        let (x, y) = self.coordinates()?;
        let mut args = vec![x, y];
        while self.eat(&TokenKind::Comma) {
            args.push(self.expression()?);
        }
        self.out.emit(format!("_paint({});", args.join(", ")));
        Ok(())
    }

    /// Graphics GET: capture a screen rectangle into an array variable.
    fn get_stmt(&mut self) -> Result<(), String> {
        if matches!(self.peek(), TokenKind::Hash) {
            return self.unsupported_jump("GET #");
        }
        let (x1, y1) = self.coordinates()?;
        self.expect(TokenKind::Minus, "\"-\"")?;
        let (x2, y2) = self.coordinates()?;
        self.expect(TokenKind::Comma, "\",\"")?;
        let name = self.expect_identifier()?;
        let js = self.js_name(&name);
        self.declare(name.to_uppercase());
        self.out.emit(format!("var {} = _gget({}, {}, {}, {});", js, x1, y1, x2, y2));
        Ok(())
    }

    /// Graphics PUT: blit a captured array to the screen.
    fn put_stmt(&mut self) -> Result<(), String> {
        if matches!(self.peek(), TokenKind::Hash) {
            return self.unsupported_jump("PUT #");
        }
        let (x, y) = self.coordinates()?;
        self.expect(TokenKind::Comma, "\",\"")?;
        let name = self.expect_identifier()?;
        let js = self.js_name(&name);
        // Optional action verb (PSET, XOR, ...) is accepted and ignored
        if self.eat(&TokenKind::Comma) {
            self.advance();
        }
        self.out.emit(format!("_gput({}, {}, {});", x, y, js));
        Ok(())
    }

    fn key_stmt(&mut self) -> Result<(), String> {
        match self.peek().clone() {
            TokenKind::Keyword(Keyword::On) => {
                self.advance();
                self.out.emit("_key(\"on\");");
                Ok(())
            }
            TokenKind::Identifier(word) if word.to_uppercase() == "OFF" => {
                self.advance();
                self.out.emit("_key(\"off\");");
                Ok(())
            }
            _ => {
                let n = self.expression()?;
                self.expect(TokenKind::Comma, "\",\"")?;
                let text = self.expression()?;
                self.out.emit(format!("_key({}, {});", n, text));
                Ok(())
            }
        }
    }

    // ----- files --------------------------------------------------------

    fn open_stmt(&mut self) -> Result<(), String> {
        let file_name = self.expression()?;
        self.expect_keyword(Keyword::For)?;
        let mode = match self.peek().clone() {
            TokenKind::Keyword(Keyword::Input) => "input",
            TokenKind::Keyword(Keyword::Output) => "output",
            TokenKind::Keyword(Keyword::Append) => "append",
            TokenKind::Keyword(Keyword::Random) => "random",
            TokenKind::Keyword(Keyword::Binary) => "binary",
            other => return Err(self.err(&format!("expected a file mode, found {}", describe(&other)))),
        };
        self.advance();
        self.expect_keyword(Keyword::As)?;
        self.eat(&TokenKind::Hash);
        let file_number = self.expression()?;
        // Optional record-length clause
        let mut record_len = None;
        if let TokenKind::Identifier(word) = self.peek().clone() {
            if word.to_uppercase() == "LEN" {
                self.advance();
                self.expect(TokenKind::Equal, "\"=\"")?;
                record_len = Some(self.expression()?);
            }
        }
        match record_len {
            Some(len) => self.out.emit(format!(
                "_fopen({}, {}, {}, {});",
                file_number,
                file_name,
                js_string(mode),
                len
            )),
            None => self.out.emit(format!(
                "_fopen({}, {}, {});",
                file_number,
                file_name,
                js_string(mode)
            )),
        }
        Ok(())
    }

    fn close_stmt(&mut self) -> Result<(), String> {
        if self.at_statement_end() {
            self.out.emit("_fclose();");
            return Ok(());
        }
        loop {
            self.eat(&TokenKind::Hash);
            let file_number = self.expression()?;
            self.out.emit(format!("_fclose({});", file_number));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn write_stmt(&mut self) -> Result<(), String> {
        let file = if self.eat(&TokenKind::Hash) {
            let n = self.expression()?;
            self.expect(TokenKind::Comma, "\",\"")?;
            Some(n)
        } else {
            None
        };
        let mut items = Vec::new();
        while !self.at_statement_end() {
            items.push(format!("JSON.stringify({})", self.expression()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let text = if items.is_empty() {
            "\"\"".to_string()
        } else {
            format!("[{}].join(\",\")", items.join(", "))
        };
        match file {
            Some(n) => self.out.emit(format!("_fwrite({}, {} + \"\\n\");", n, text)),
            None => self.out.emit(format!("_print({}, true);", text)),
        }
        Ok(())
    }

    // ----- tolerated jumps ----------------------------------------------

    /// GOTO and friends do not translate to structured code. Emit a marker
    /// comment, keep a warning, keep compiling.
    fn unsupported_jump(&mut self, what: &str) -> Result<(), String> {
        let (line, column) = self.here();
        let rest = self.skip_to_eol();
        let detail = if rest.is_empty() {
            what.to_string()
        } else {
            format!("{} {}", what, rest)
        };
        self.out.emit(format!("// {} (unsupported)", detail));
        self.diagnostics.push(Diagnostic::warning(
            Category::Semantic,
            format!("{} is not supported by the JavaScript translation; statement skipped", what),
            line,
            column,
        ));
        Ok(())
    }

    /// GOSUB gets a best-effort direct call; label subroutines that RETURN
    /// at their end behave the same when called.
    fn gosub_stmt(&mut self) -> Result<(), String> {
        let (line, column) = self.here();
        match self.peek().clone() {
            TokenKind::Identifier(label) => {
                self.advance();
                let js = self.js_name(&label);
                self.out.emit(format!("await {}();", js));
                self.diagnostics.push(Diagnostic::warning(
                    Category::Semantic,
                    format!("GOSUB {} is translated as a direct call", label),
                    line,
                    column,
                ));
                Ok(())
            }
            TokenKind::Number(n) => {
                self.advance();
                self.out.emit(format!("// GOSUB {} (unsupported)", n));
                self.diagnostics.push(Diagnostic::warning(
                    Category::Semantic,
                    "GOSUB to a line number is not supported",
                    line,
                    column,
                ));
                Ok(())
            }
            other => Err(self.err(&format!("expected a label after GOSUB, found {}", describe(&other)))),
        }
    }

    /// Consume the rest of the line, returning it as display text.
    fn skip_to_eol(&mut self) -> String {
        let mut parts = Vec::new();
        while !matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
            parts.push(display_token(self.peek()));
            self.advance();
        }
        parts.join(" ")
    }

    // ----- expressions --------------------------------------------------

    /// Precedence climbing, lowest first. Relational and logical results
    /// are QBasic integers (-1 true, 0 false) so they compose bitwise.
    fn expression(&mut self) -> Result<String, String> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<String, String> {
        let mut left = self.and_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Keyword(Keyword::Or) => "|",
                TokenKind::Keyword(Keyword::Xor) => "^",
                TokenKind::Keyword(Keyword::Eqv) => "eqv",
                TokenKind::Keyword(Keyword::Imp) => "imp",
                _ => break,
            };
            self.advance();
            let right = self.and_expr()?;
            left = match op {
                "eqv" => format!("(~({} ^ {}))", left, right),
                "imp" => format!("((~{}) | {})", left, right),
                op => format!("({} {} {})", left, op, right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<String, String> {
        let mut left = self.not_expr()?;
        while matches!(self.peek(), TokenKind::Keyword(Keyword::And)) {
            self.advance();
            let right = self.not_expr()?;
            left = format!("({} & {})", left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<String, String> {
        if self.eat_keyword(Keyword::Not) {
            let operand = self.not_expr()?;
            Ok(format!("(~({}))", operand))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<String, String> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Equal => "===",
                TokenKind::NotEqual => "!==",
                TokenKind::Less => "<",
                TokenKind::LessEqual => "<=",
                TokenKind::Greater => ">",
                TokenKind::GreaterEqual => ">=",
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = format!("(({} {} {}) ? -1 : 0)", left, op, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<String, String> {
        let mut left = self.mod_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => break,
            };
            self.advance();
            let right = self.mod_expr()?;
            left = format!("({} {} {})", left, op, right);
        }
        Ok(left)
    }

    fn mod_expr(&mut self) -> Result<String, String> {
        let mut left = self.int_div()?;
        while matches!(self.peek(), TokenKind::Keyword(Keyword::Mod)) {
            self.advance();
            let right = self.int_div()?;
            left = format!("(Math.trunc({}) % Math.trunc({}))", left, right);
        }
        Ok(left)
    }

    fn int_div(&mut self) -> Result<String, String> {
        let mut left = self.multiplicative()?;
        while matches!(self.peek(), TokenKind::Backslash) {
            self.advance();
            let right = self.multiplicative()?;
            left = format!("Math.trunc({} / {})", left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<String, String> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                _ => break,
            };
            self.advance();
            let right = self.power()?;
            left = format!("({} {} {})", left, op, right);
        }
        Ok(left)
    }

    fn power(&mut self) -> Result<String, String> {
        let base = self.unary()?;
        if self.eat(&TokenKind::Caret) {
            // Right associative
            let exponent = self.power()?;
            Ok(format!("Math.pow({}, {})", base, exponent))
        } else {
            Ok(base)
        }
    }

    fn unary(&mut self) -> Result<String, String> {
        match self.peek() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.unary()?;
                Ok(format!("(-{})", operand))
            }
            TokenKind::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<String, String> {
        match self.peek().clone() {
            TokenKind::Number(text) => {
                self.advance();
                Ok(text)
            }
            TokenKind::QString(s) => {
                self.advance();
                Ok(js_string(&s))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RightParen, "\")\"")?;
                Ok(format!("({})", inner))
            }
            TokenKind::Identifier(name) => {
                let (line, column) = self.here();
                self.advance();
                self.name_expr(&name, line, column)
            }
            other => Err(self.err(&format!("unexpected {} in expression", describe(&other)))),
        }
    }

    /// An identifier in expression position: variable, array element,
    /// builtin call, user FUNCTION call or member chain.
    fn name_expr(&mut self, name: &str, line: usize, column: usize) -> Result<String, String> {
        let upper = name.to_uppercase();

        if self.eat(&TokenKind::LeftParen) {
            let mut args = Vec::new();
            if !matches!(self.peek(), TokenKind::RightParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "\")\"")?;

            // A declared variable takes priority: LEN% the array beats
            // LEN the builtin only when the program actually DIMmed it.
            if self.is_declared(&upper) {
                let js = self.js_name(name);
                let mut out = js;
                for arg in &args {
                    out.push_str(&format!("[{}]", arg));
                }
                return self.member_chain(out);
            }
            if let Some(builtin) = builtins::lookup(name) {
                if args.len() < builtin.min_args || args.len() > builtin.max_args {
                    return Err(self.err(&format!(
                        "{} takes {} to {} arguments, found {}",
                        builtin.name, builtin.min_args, builtin.max_args, args.len()
                    )));
                }
                return Ok(builtins::expand(builtin, &args));
            }
            if self.procs.get(&upper) == Some(&ProcKind::Function) {
                let js = self.js_name(name);
                return Ok(format!("(await {}({}))", js, args.join(", ")));
            }
            if self.procs.get(&upper) == Some(&ProcKind::Sub) {
                return Err(self.err(&format!("{} is a SUB and returns no value", name)));
            }
            // Unknown name with subscripts: treat as an undimensioned array
            let js = self.implicit_declare_array(name, args.len(), line, column);
            let mut out = js;
            for arg in &args {
                out.push_str(&format!("[{}]", arg));
            }
            return self.member_chain(out);
        }

        if self.is_declared(&upper) {
            let js = self.js_name(name);
            return self.member_chain(js);
        }
        if let Some(builtin) = builtins::lookup(name) {
            if builtin.bare {
                return Ok(builtins::expand(builtin, &[]));
            }
        }
        if self.procs.get(&upper) == Some(&ProcKind::Function) {
            let js = self.js_name(name);
            return Ok(format!("(await {}())", js));
        }

        let js = self.implicit_declare_read(name, line, column);
        self.member_chain(js)
    }

    fn member_chain(&mut self, mut js: String) -> Result<String, String> {
        while self.eat(&TokenKind::Dot) {
            let field = self.expect_identifier()?;
            js.push_str(&format!(".{}", mangle(&field)));
        }
        Ok(js)
    }

    fn implicit_declare_array(&mut self, name: &str, rank: usize, line: usize, column: usize) -> String {
        let suggestions = diagnostics::suggest(name, self.vocabulary());
        self.diagnostics.push(
            Diagnostic::warning(
                Category::Reference,
                format!("{} is used before it is dimensioned", name),
                line,
                column,
            )
            .with_length(name.chars().count())
            .with_suggestions(suggestions),
        );
        let js = self.js_name(name);
        self.declare(name.to_uppercase());
        let dims = vec!["10"; rank.max(1)].join(", ");
        self.out
            .emit(format!("var {} = _arr([{}], {});", js, dims, default_for(name)));
        js
    }
}

/// `x$` targets read strings, everything else reads numbers.
fn coerce_read(name: &str, source: &str) -> String {
    if name.ends_with('$') {
        format!("String({})", source)
    } else {
        format!("Number({})", source)
    }
}

fn join_parts(parts: &[String]) -> String {
    if parts.is_empty() {
        "\"\"".to_string()
    } else {
        parts.join(" + ")
    }
}

/// Token description for error messages.
fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(text) => format!("number {}", text),
        TokenKind::QString(_) => "a string".to_string(),
        TokenKind::Identifier(name) => name.clone(),
        TokenKind::Keyword(kw) => kw.as_str().to_string(),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of file".to_string(),
        TokenKind::Plus => "\"+\"".to_string(),
        TokenKind::Minus => "\"-\"".to_string(),
        TokenKind::Star => "\"*\"".to_string(),
        TokenKind::Slash => "\"/\"".to_string(),
        TokenKind::Backslash => "\"\\\"".to_string(),
        TokenKind::Caret => "\"^\"".to_string(),
        TokenKind::Equal => "\"=\"".to_string(),
        TokenKind::NotEqual => "\"<>\"".to_string(),
        TokenKind::Less => "\"<\"".to_string(),
        TokenKind::LessEqual => "\"<=\"".to_string(),
        TokenKind::Greater => "\">\"".to_string(),
        TokenKind::GreaterEqual => "\">=\"".to_string(),
        TokenKind::LeftParen => "\"(\"".to_string(),
        TokenKind::RightParen => "\")\"".to_string(),
        TokenKind::Comma => "\",\"".to_string(),
        TokenKind::Semicolon => "\";\"".to_string(),
        TokenKind::Colon => "\":\"".to_string(),
        TokenKind::Hash => "\"#\"".to_string(),
        TokenKind::Dot => "\".\"".to_string(),
    }
}

/// Raw-ish token text for tolerated-statement comments.
fn display_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(text) => text.clone(),
        TokenKind::QString(s) => format!("\"{}\"", s),
        TokenKind::Identifier(name) => name.clone(),
        TokenKind::Keyword(kw) => kw.as_str().to_string(),
        other => describe(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::lexer::Lexer;

    fn compile(source: &str) -> ParseOutput {
        let tokens = Lexer::new(source).tokenize_unchecked();
        parse(&tokens, Target::Node)
    }

    fn errors(output: &ParseOutput) -> usize {
        output
            .diagnostics
            .iter()
            .filter(|d| d.severity == crate::basic::Severity::Error)
            .count()
    }

    #[test]
    fn test_print_string() {
        let out = compile("PRINT \"Hi\"");
        assert!(out.code.contains("_print(String(\"Hi\"), true);"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_print_trailing_semicolon_suppresses_newline() {
        let out = compile("PRINT \"Hi\";");
        assert!(out.code.contains("_print(String(\"Hi\"), false);"));
    }

    #[test]
    fn test_print_empty_line() {
        let out = compile("PRINT");
        assert!(out.code.contains("_print(\"\", true);"));
    }

    #[test]
    fn test_assignment_declares_once() {
        let out = compile("x = 1\nx = 2");
        assert!(out.code.contains("var x = 1;"));
        assert!(out.code.contains("x = 2;"));
        assert!(!out.code.contains("var x = 2;"));
    }

    #[test]
    fn test_identifier_suffix_mangling() {
        let out = compile("count% = 3\nname$ = \"a\"");
        assert!(out.code.contains("var count_pct = 3;"));
        assert!(out.code.contains("var name$ = \"a\";"));
    }

    #[test]
    fn test_reserved_word_identifiers_prefixed() {
        let out = compile("new = 1");
        assert!(out.code.contains("var _new = 1;"));
    }

    #[test]
    fn test_for_loop_tests_both_directions() {
        let out = compile("FOR i = 10 TO 1 STEP -1\nPRINT i\nNEXT i");
        assert!(out.code.contains("var i = 10;"));
        assert!(out
            .code
            .contains("for (; (((-1)) >= 0) ? (i <= (1)) : (i >= (1)); i = i + ((-1))) {"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_for_loop_default_step() {
        let out = compile("FOR i = 1 TO 3\nNEXT");
        assert!(out.code.contains("for (; ((1) >= 0) ? (i <= (3)) : (i >= (3)); i = i + (1)) {"));
    }

    #[test]
    fn test_if_block_with_elseif() {
        let out = compile("IF x > 1 THEN\nPRINT 1\nELSEIF x > 0 THEN\nPRINT 2\nELSE\nPRINT 3\nEND IF");
        assert!(out.code.contains("} else if ("));
        assert!(out.code.contains("} else {"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_single_line_if_else() {
        let out = compile("IF x = 1 THEN PRINT \"y\" ELSE PRINT \"n\"");
        assert!(out.code.contains("if (((x === 1) ? -1 : 0)) {"));
        assert!(out.code.contains("} else {"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_select_case_emits_conditional_chain() {
        let out = compile("SELECT CASE x\nCASE 1, 2\nPRINT \"a\"\nCASE ELSE\nPRINT \"b\"\nEND SELECT");
        assert!(out.code.contains("const _sel1 ="));
        assert!(out.code.contains("if (_sel1 === 1 || _sel1 === 2) {"));
        assert!(out.code.contains("} else {"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_select_case_is_and_range() {
        let out = compile("SELECT CASE n\nCASE IS > 5\nPRINT 1\nCASE 1 TO 3\nPRINT 2\nEND SELECT");
        assert!(out.code.contains("if (_sel1 > 5) {"));
        assert!(out.code.contains("} else if ((_sel1 >= 1 && _sel1 <= 3)) {"));
    }

    #[test]
    fn test_data_collected_in_source_order() {
        let out = compile("READ a\nDATA 1, 2, 3\nREAD b, c");
        assert!(out.code.contains("const _data = [1, 2, 3];"));
        assert!(out.code.contains("var a = Number(_read());"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_data_strings_and_negatives() {
        let out = compile("DATA \"apple\", -4, pear");
        assert!(out.code.contains("const _data = [\"apple\", -4, \"pear\"];"));
    }

    #[test]
    fn test_read_string_suffix_coerces_to_string() {
        let out = compile("DATA hello\nREAD w$");
        assert!(out.code.contains("var w$ = String(_read());"));
    }

    #[test]
    fn test_restore_resets_cursor() {
        let out = compile("DATA 1\nREAD a\nRESTORE\nREAD b");
        assert!(out.code.contains("_restore();"));
    }

    #[test]
    fn test_sub_scope_is_isolated() {
        let out = compile("SUB One\nx = 1\nEND SUB\nSUB Two\nPRINT x\nEND SUB");
        // Reading x inside Two warns and declares a fresh local
        let warned = out
            .diagnostics
            .iter()
            .any(|d| d.category == Category::Reference && d.message.contains('x'));
        assert!(warned);
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_dim_shared_visible_in_procs() {
        let out = compile("DIM SHARED total\nSUB Bump\ntotal = total + 1\nEND SUB");
        let warned = out.diagnostics.iter().any(|d| d.category == Category::Reference);
        assert!(!warned, "shared name should resolve: {:?}", out.diagnostics);
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_function_returns_its_name_variable() {
        let out = compile("FUNCTION Add(a, b)\nAdd = a + b\nEND FUNCTION\nPRINT Add(1, 2)");
        assert!(out.code.contains("async function Add(a, b) {"));
        assert!(out.code.contains("var Add = 0;"));
        assert!(out.code.contains("return Add;"));
        assert!(out.code.contains("(await Add(1, 2))"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_sub_bare_call_with_arguments() {
        let out = compile("SUB Greet (who$)\nPRINT who$\nEND SUB\nGreet \"world\"");
        assert!(out.code.contains("await Greet(\"world\");"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_call_before_definition_resolves() {
        let out = compile("Greet\nSUB Greet\nPRINT \"hi\"\nEND SUB");
        assert!(out.code.contains("await Greet();"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_builtin_zero_arg_without_parens() {
        let out = compile("x = RND");
        assert!(out.code.contains("var x = Math.random();"));
    }

    #[test]
    fn test_declared_variable_shadows_builtin_name() {
        let out = compile("DIM timer\ntimer = 5\nPRINT timer");
        assert!(out.code.contains("timer = 5;"));
        assert!(!out.code.contains("_timer()"));
    }

    #[test]
    fn test_builtin_arity_checked() {
        let out = compile("x = ABS(1, 2)");
        assert_eq!(errors(&out), 1);
    }

    #[test]
    fn test_string_builtins() {
        let out = compile("a$ = LEFT$(\"hello\", 2)\nn = LEN(a$)");
        assert!(out.code.contains("_left(\"hello\", 2)"));
        assert!(out.code.contains("String(a$).length"));
    }

    #[test]
    fn test_integer_division_and_mod() {
        let out = compile("x = 7 \\ 2 + 7 MOD 2");
        assert!(out.code.contains("Math.trunc(7 / 2)"));
        assert!(out.code.contains("(Math.trunc(7) % Math.trunc(2))"));
    }

    #[test]
    fn test_power_is_right_associative() {
        let out = compile("x = 2 ^ 3 ^ 2");
        assert!(out.code.contains("Math.pow(2, Math.pow(3, 2))"));
    }

    #[test]
    fn test_relational_produces_qbasic_booleans() {
        let out = compile("x = 1 < 2");
        assert!(out.code.contains("var x = ((1 < 2) ? -1 : 0);"));
    }

    #[test]
    fn test_not_is_bitwise() {
        let out = compile("x = NOT 0");
        assert!(out.code.contains("var x = (~(0));"));
    }

    #[test]
    fn test_while_wend() {
        let out = compile("WHILE x < 3\nx = x + 1\nWEND");
        assert!(out.code.contains("while (((x < 3) ? -1 : 0)) {"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_do_loop_until_post_test() {
        let out = compile("DO\nx = x + 1\nLOOP UNTIL x > 3");
        assert!(out.code.contains("do {"));
        assert!(out.code.contains("} while (!(((x > 3) ? -1 : 0)));"));
    }

    #[test]
    fn test_goto_emits_comment_and_warning() {
        let out = compile("GOTO 100");
        assert!(out.code.contains("// GOTO 100 (unsupported)"));
        let warned = out
            .diagnostics
            .iter()
            .any(|d| d.severity == crate::basic::Severity::Warning && d.message.contains("GOTO"));
        assert!(warned);
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_gosub_label_emits_direct_call() {
        let out = compile("GOSUB Cleanup");
        assert!(out.code.contains("await Cleanup();"));
    }

    #[test]
    fn test_type_block_and_member_access() {
        let out = compile("TYPE Point\nx AS INTEGER\ny AS INTEGER\nEND TYPE\nDIM p AS Point\np.x = 3\nPRINT p.x");
        assert!(out.code.contains("var p = { x: 0, y: 0 };"));
        assert!(out.code.contains("p.x = 3;"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_dim_array_with_bounds() {
        let out = compile("DIM grid(10, 20)\ngrid(1, 2) = 5");
        assert!(out.code.contains("var grid = _arr([10, 20], 0);"));
        assert!(out.code.contains("grid[1][2] = 5;"));
    }

    #[test]
    fn test_dim_one_to_bounds() {
        let out = compile("DIM a(1 TO 5)");
        assert!(out.code.contains("var a = _arr([5], 0);"));
    }

    #[test]
    fn test_const_emits_const() {
        let out = compile("CONST Max = 10\nPRINT Max");
        assert!(out.code.contains("const Max = 10;"));
    }

    #[test]
    fn test_swap() {
        let out = compile("a = 1\nb = 2\nSWAP a, b");
        assert!(out.code.contains("[a, b] = [b, a];"));
    }

    #[test]
    fn test_error_recovery_continues_after_bad_line() {
        let out = compile("IF x 5\nPRINT \"still here\"");
        assert!(errors(&out) >= 1);
        assert!(out.code.contains("_print(String(\"still here\"), true);"));
    }

    #[test]
    fn test_undefined_name_gets_suggestions() {
        let out = compile("PRINT PRNT");
        let diag = out
            .diagnostics
            .iter()
            .find(|d| d.category == Category::Reference)
            .expect("reference warning");
        assert!(diag.suggestions.contains(&"PRINT".to_string()));
    }

    #[test]
    fn test_unclosed_block_reports_and_balances() {
        let out = compile("FOR i = 1 TO 3\nPRINT i");
        assert!(errors(&out) >= 1);
        let opens = out.code.matches('{').count();
        let closes = out.code.matches('}').count();
        assert_eq!(opens, closes);
    }

    #[test]
    fn test_colon_separates_statements() {
        let out = compile("a = 1: b = 2");
        assert!(out.code.contains("var a = 1;"));
        assert!(out.code.contains("var b = 2;"));
    }

    #[test]
    fn test_line_numbers_tolerated() {
        let out = compile("10 PRINT \"x\"\n20 PRINT \"y\"");
        assert_eq!(errors(&out), 0);
        assert!(out.code.contains("_print(String(\"x\"), true);"));
    }

    #[test]
    fn test_input_coerces_by_suffix() {
        let out = compile("INPUT \"Name\"; n$\nINPUT age");
        assert!(out.code.contains("var n$ = String(await _input(\"Name? \"));"));
        assert!(out.code.contains("var age = Number(await _input(\"? \"));"));
    }

    #[test]
    fn test_graphics_statements() {
        let out = compile("PSET (1, 2), 4\nLINE (0, 0)-(10, 10), 3, BF\nCIRCLE (5, 5), 3");
        assert!(out.code.contains("_pset(1, 2, 4);"));
        assert!(out.code.contains("_line(0, 0, 10, 10, 3, \"BF\");"));
        assert!(out.code.contains("_circle(5, 5, 3);"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_file_statements() {
        let out = compile("OPEN \"f.txt\" FOR OUTPUT AS #1\nPRINT #1, \"x\"\nCLOSE #1");
        assert!(out.code.contains("_fopen(1, \"f.txt\", \"output\");"));
        assert!(out.code.contains("_fwrite(1, String(\"x\") + \"\\n\");"));
        assert!(out.code.contains("_fclose(1);"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_qb64_statements() {
        let out = compile("_TITLE \"demo\"\n_DELAY 0.5\n_LIMIT 60\n_DISPLAY");
        assert!(out.code.contains("_title(\"demo\");"));
        assert!(out.code.contains("await _sleep((0.5) * 1000);"));
        assert!(out.code.contains("await _limit(60);"));
        assert!(out.code.contains("_display();"));
        assert_eq!(errors(&out), 0);
    }

    #[test]
    fn test_end_emits_end_marker() {
        let out = compile("PRINT 1\nEND");
        assert!(out.code.contains("_end();"));
    }

    #[test]
    fn test_sleep_and_beep_await() {
        let out = compile("SLEEP 1\nBEEP");
        assert!(out.code.contains("await _sleep((1) * 1000);"));
        assert!(out.code.contains("await _beep();"));
    }

    #[test]
    fn test_assignment_to_sub_name_is_error() {
        let out = compile("SUB Foo\nEND SUB\nFoo = 3");
        assert_eq!(errors(&out), 1);
    }

    #[test]
    fn test_header_and_footer_present() {
        let out = compile("PRINT 1");
        assert!(out.code.starts_with("\"use strict\";"));
        assert!(out.code.contains("async function _main() {"));
        assert!(out.code.contains("_main()"));
    }
}
