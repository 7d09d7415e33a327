//! Compiler facade
//!
//! Orchestrates lexer, parser, diagnostics and the compile cache behind two
//! entry points: [`Compiler::compile`] and [`Compiler::lint`]. Internal
//! panics anywhere in the pipeline are caught here and surfaced as a single
//! Runtime-category diagnostic; the facade never takes the caller down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::debug;

use crate::basic::cache::{CacheStats, CompileCache, DEFAULT_CAPACITY};
use crate::basic::diagnostics::{Category, Diagnostic, DiagnosticCollector, Severity};
use crate::basic::emit::Target;
use crate::basic::lexer::{Lexer, Token};
use crate::basic::parser;

/// Host-facing failures that are not source diagnostics.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The host named an emission target this build does not know.
    #[error("unknown target {0:?}; expected \"node\" or \"web\"")]
    UnknownTarget(String),
}

/// The result of one compilation.
#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
    /// True when no Error-severity diagnostic was produced. Warnings do
    /// not fail a compile.
    pub success: bool,
}

/// The transpiler facade. Owns the compile cache and the reusable token
/// buffer; create one per host and thread it where it is needed.
pub struct Compiler {
    cache: CompileCache,
    token_buf: Vec<Token>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            cache: CompileCache::new(capacity),
            token_buf: Vec::new(),
        }
    }

    /// Resolve a target name from a host-supplied string.
    pub fn target_from_name(name: &str) -> Result<Target, CompileError> {
        Target::from_name(name).ok_or_else(|| CompileError::UnknownTarget(name.to_string()))
    }

    /// Compile `source` for `target`. Identical inputs are served from the
    /// cache when the previous compile had zero errors.
    pub fn compile(&mut self, source: &str, target: Target) -> CompileOutput {
        if let Some(entry) = self.cache.get(source, target) {
            return CompileOutput {
                code: entry.code.clone(),
                diagnostics: entry.diagnostics.clone(),
                success: true,
            };
        }

        let output = self.compile_uncached(source, target);
        if output.success {
            self.cache
                .set(source, target, output.code.clone(), output.diagnostics.clone());
        }
        output
    }

    /// Diagnostics only; shares the compile cache with [`Self::compile`].
    pub fn lint(&mut self, source: &str) -> Vec<Diagnostic> {
        self.compile(source, Target::Node).diagnostics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop all cached results. Never affects correctness, only speed.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn compile_uncached(&mut self, source: &str, target: Target) -> CompileOutput {
        let mut lex_diagnostics = DiagnosticCollector::new();
        let mut tokens = std::mem::take(&mut self.token_buf);

        let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
            Lexer::new(source).tokenize_into(&mut tokens, &mut lex_diagnostics);
            parser::parse(&tokens, target)
        }));

        // Keep the token allocation for the next keystroke
        tokens.clear();
        self.token_buf = tokens;

        match parsed {
            Ok(output) => {
                let mut diagnostics = lex_diagnostics.into_sorted();
                diagnostics.extend(output.diagnostics);
                diagnostics.sort_by_key(|d| (d.line, d.column));
                let success = diagnostics.iter().all(|d| d.severity != Severity::Error);
                debug!(
                    emit_target = %target,
                    diagnostics = diagnostics.len(),
                    success,
                    "compiled"
                );
                CompileOutput {
                    code: output.code,
                    diagnostics,
                    success,
                }
            }
            Err(payload) => {
                // A bug in the transpiler, not in the program being
                // compiled; report it like any other diagnostic.
                let diagnostic = Diagnostic::error(
                    Category::Runtime,
                    format!("internal compiler error: {}", panic_message(payload.as_ref())),
                    1,
                    1,
                );
                CompileOutput {
                    code: String::new(),
                    diagnostics: vec![diagnostic],
                    success: false,
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected failure".to_string()
    }
}
