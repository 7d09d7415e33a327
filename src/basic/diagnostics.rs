//! Diagnostics, error recovery and typo suggestions
//!
//! Compilation never stops at the first error: every stage pushes records
//! into a [`DiagnosticCollector`] and the parser resynchronizes at statement
//! boundaries, so one malformed line still yields diagnostics for the rest
//! of the file.

use crate::basic::lexer::{Token, TokenKind};

/// Diagnostic severity, ordered from most to least severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

/// What kind of problem a diagnostic describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Malformed statement or expression
    Syntax,
    /// Legal syntax used in an illegal way
    Semantic,
    /// Type suffix or type declaration conflicts
    Type,
    /// Unresolved symbol; carries "did you mean" suggestions
    Reference,
    /// Internal transpiler failure, reported instead of propagated
    Runtime,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Semantic => "semantic",
            Category::Type => "type",
            Category::Reference => "reference",
            Category::Runtime => "runtime",
        }
    }
}

/// A single diagnostic record with 1-based source position.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Length in characters of the offending source range (0 = point)
    pub length: usize,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Error, category, message, line, column)
    }

    pub fn warning(category: Category, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Warning, category, message, line, column)
    }

    pub fn info(category: Category, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Info, category, message, line, column)
    }

    pub fn hint(category: Category, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Hint, category, message, line, column)
    }

    fn new(severity: Severity, category: Category, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            line,
            column,
            length: 0,
            suggestions: Vec::new(),
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}[{}]: {}",
            self.line,
            self.column,
            self.severity.as_str(),
            self.category.as_str(),
            self.message
        )?;
        if !self.suggestions.is_empty() {
            write!(f, " (did you mean {}?)", self.suggestions.join(", "))?;
        }
        Ok(())
    }
}

/// Accumulates diagnostics for one compilation with running counts.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// All diagnostics at the given severity, in push order.
    pub fn with_severity(&self, severity: Severity) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == severity).collect()
    }

    /// Consume the collector, returning diagnostics sorted by position.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by_key(|d| (d.line, d.column));
        self.diagnostics
    }

    /// Human-readable multi-line report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out.push_str(&format!("{} error(s), {} warning(s)\n", self.errors, self.warnings));
        out
    }
}

/// Levenshtein edit distance, used for "did you mean" suggestions.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    // Two-row DP over the classic matrix.
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut cur = vec![0usize; n + 1];

    for i in 1..=m {
        cur[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[n]
}

/// Maximum edit distance for a candidate to count as "close".
const SUGGESTION_DISTANCE: usize = 2;

/// Maximum number of suggestions attached to one diagnostic.
const SUGGESTION_LIMIT: usize = 3;

/// Up to three vocabulary entries within edit distance 2 of `name`,
/// closest first. Comparison is case-insensitive.
pub fn suggest<'a, I>(name: &str, vocabulary: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let upper = name.to_uppercase();
    let mut ranked: Vec<(usize, &str)> = vocabulary
        .into_iter()
        .filter_map(|candidate| {
            let d = edit_distance(&upper, &candidate.to_uppercase());
            (d > 0 && d <= SUGGESTION_DISTANCE).then_some((d, candidate))
        })
        .collect();
    ranked.sort_by_key(|&(d, c)| (d, c.to_string()));
    ranked.truncate(SUGGESTION_LIMIT);
    ranked.into_iter().map(|(_, c)| c.to_string()).collect()
}

/// Advance past the current statement: stop at the next newline or keyword
/// token. Returns the new position, never past the terminating Eof.
pub fn sync_to_statement_boundary(tokens: &[Token], mut pos: usize) -> usize {
    // Step off the offending token first so recovery always makes progress.
    if pos < tokens.len() && !matches!(tokens[pos].kind, TokenKind::Eof) {
        pos += 1;
    }
    while pos < tokens.len() {
        match tokens[pos].kind {
            TokenKind::Eof => break,
            TokenKind::Newline | TokenKind::Colon => {
                pos += 1;
                break;
            }
            TokenKind::Keyword(_) => break,
            _ => pos += 1,
        }
    }
    pos.min(tokens.len().saturating_sub(1))
}

/// Skip to just past the parenthesis matching the one at `pos`
/// (depth-counted). If the input runs out, stops at Eof.
pub fn sync_past_closing_paren(tokens: &[Token], mut pos: usize) -> usize {
    let mut depth = 0usize;
    while pos < tokens.len() {
        match tokens[pos].kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return pos + 1;
                }
            }
            TokenKind::Eof | TokenKind::Newline => return pos,
            _ => {}
        }
        pos += 1;
    }
    tokens.len().saturating_sub(1)
}

/// Skip to the next operator, comma, closing paren or end of statement.
pub fn sync_to_operator_or_terminator(tokens: &[Token], mut pos: usize) -> usize {
    while pos < tokens.len() {
        match tokens[pos].kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Backslash
            | TokenKind::Caret
            | TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Comma
            | TokenKind::RightParen
            | TokenKind::Colon
            | TokenKind::Newline
            | TokenKind::Eof => return pos,
            _ => pos += 1,
        }
    }
    tokens.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::lexer::Lexer;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("PRINT", "PRINT"), 0);
        assert_eq!(edit_distance("PRNT", "PRINT"), 1);
        assert_eq!(edit_distance("PRIMT", "PRINT"), 1);
        assert_eq!(edit_distance("LOCAT", "LOCATE"), 1);
        assert_eq!(edit_distance("abc", "xyz"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_suggest_ranks_by_distance() {
        let vocab = ["PRINT", "POINT", "PSET", "INPUT"];
        let got = suggest("PRNT", vocab);
        assert_eq!(got[0], "PRINT");
        assert!(got.len() <= 3);
    }

    #[test]
    fn test_suggest_rejects_distant_names() {
        let vocab = ["CIRCLE", "LOCATE"];
        assert!(suggest("X", vocab).is_empty());
    }

    #[test]
    fn test_suggest_is_case_insensitive() {
        let vocab = ["PRINT"];
        assert_eq!(suggest("prnt", vocab), vec!["PRINT".to_string()]);
    }

    #[test]
    fn test_collector_counts() {
        let mut collector = DiagnosticCollector::new();
        collector.push(Diagnostic::error(Category::Syntax, "bad", 1, 1));
        collector.push(Diagnostic::warning(Category::Reference, "odd", 2, 1));
        collector.push(Diagnostic::hint(Category::Syntax, "meh", 3, 1));
        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.has_errors());
        assert_eq!(collector.with_severity(Severity::Hint).len(), 1);
    }

    #[test]
    fn test_into_sorted_orders_by_position() {
        let mut collector = DiagnosticCollector::new();
        collector.push(Diagnostic::error(Category::Syntax, "b", 5, 2));
        collector.push(Diagnostic::error(Category::Syntax, "a", 1, 9));
        let sorted = collector.into_sorted();
        assert_eq!(sorted[0].message, "a");
        assert_eq!(sorted[1].message, "b");
    }

    #[test]
    fn test_display_includes_suggestions() {
        let d = Diagnostic::error(Category::Reference, "undefined name PRNT", 3, 5)
            .with_suggestions(vec!["PRINT".into()]);
        let text = d.to_string();
        assert!(text.contains("3:5"));
        assert!(text.contains("did you mean PRINT?"));
    }

    #[test]
    fn test_sync_to_statement_boundary_stops_at_newline() {
        let tokens = Lexer::new("a b c\nPRINT").tokenize_unchecked();
        let pos = sync_to_statement_boundary(&tokens, 0);
        // Lands just past the newline, on the PRINT keyword.
        assert!(matches!(tokens[pos].kind, TokenKind::Keyword(_)));
    }

    #[test]
    fn test_sync_to_statement_boundary_stops_at_keyword() {
        let tokens = Lexer::new("a b PRINT 1").tokenize_unchecked();
        let pos = sync_to_statement_boundary(&tokens, 0);
        assert!(matches!(tokens[pos].kind, TokenKind::Keyword(_)));
    }

    #[test]
    fn test_sync_past_closing_paren_counts_depth() {
        let tokens = Lexer::new("((1 + 2) * 3) + 4").tokenize_unchecked();
        let pos = sync_past_closing_paren(&tokens, 0);
        assert!(matches!(tokens[pos].kind, TokenKind::Plus));
    }
}
