//! End-to-end transpiler tests through the public facade.

use qbjs::{Category, Compiler, Severity, Target};

fn compile(source: &str) -> qbjs::CompileOutput {
    Compiler::new().compile(source, Target::Node)
}

fn error_count(out: &qbjs::CompileOutput) -> usize {
    out.diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

#[test]
fn clean_program_lints_empty() {
    let mut compiler = Compiler::new();
    let program = "CLS\nPRINT \"Hello\"\nFOR i = 1 TO 3\nPRINT i\nNEXT i";
    assert_eq!(compiler.lint(program), Vec::new());
}

#[test]
fn sample_program_emits_prints_in_order() {
    let out = compile("CLS\nPRINT \"Hi\"\nFOR i=1 TO 3\nPRINT i\nNEXT i");
    assert!(out.success);
    let cls = out.code.find("_cls();").expect("cls emitted");
    let hi = out.code.find("_print(String(\"Hi\"), true);").expect("hi emitted");
    let loop_start = out.code.find("for (;").expect("loop emitted");
    let loop_print = out.code.find("_print(String(i), true);").expect("loop print emitted");
    assert!(cls < hi && hi < loop_start && loop_start < loop_print);
}

#[test]
fn identical_compiles_hit_the_cache_with_identical_code() {
    let mut compiler = Compiler::new();
    let program = "PRINT \"cached\"";
    let first = compiler.compile(program, Target::Node);
    assert!(first.success);
    let second = compiler.compile(program, Target::Node);
    assert_eq!(first.code, second.code);
    assert_eq!(compiler.cache_stats().hits, 1);
    assert_eq!(compiler.cache_stats().misses, 1);
}

#[test]
fn data_is_collected_regardless_of_position() {
    // READ appears before DATA; the table must still be [1, 2, 3]
    let before = compile("READ a\nREAD b\nREAD c\nDATA 1, 2, 3");
    let after = compile("DATA 1, 2, 3\nREAD a\nREAD b\nREAD c");
    assert!(before.code.contains("const _data = [1, 2, 3];"));
    assert!(after.code.contains("const _data = [1, 2, 3];"));
    assert!(before.success && after.success);
}

#[test]
fn data_from_multiple_statements_keeps_source_order() {
    let out = compile("DATA 1\nPRINT \"x\"\nDATA 2\nDATA 3");
    assert!(out.code.contains("const _data = [1, 2, 3];"));
}

#[test]
fn sub_locals_are_invisible_across_subs() {
    let out = compile(
        "SUB First\nsecret = 42\nEND SUB\nSUB Second\nPRINT secret\nEND SUB",
    );
    assert!(out.success);
    let warning = out
        .diagnostics
        .iter()
        .find(|d| d.category == Category::Reference)
        .expect("reading another SUB's local warns");
    assert!(warning.message.contains("secret"));
}

#[test]
fn dim_shared_is_visible_in_every_procedure() {
    let out = compile(
        "DIM SHARED score\nSUB Add\nscore = score + 1\nEND SUB\nSUB Show\nPRINT score\nEND SUB",
    );
    assert!(out.success);
    assert!(
        !out.diagnostics.iter().any(|d| d.category == Category::Reference),
        "shared names resolve everywhere: {:?}",
        out.diagnostics
    );
}

#[test]
fn descending_for_loop_tests_both_step_directions() {
    let out = compile("FOR i = 10 TO 1 STEP -1\nPRINT i\nNEXT i");
    assert!(out.success);
    // The generated condition must work for either step sign
    assert!(out.code.contains(">= 0) ? (i <= (1)) : (i >= (1))"));
}

#[test]
fn select_case_evaluates_selector_once() {
    let out = compile(
        "x = 2\nSELECT CASE x\nCASE 1, 2\nPRINT \"first\"\nCASE 3\nPRINT \"second\"\nCASE ELSE\nPRINT \"other\"\nEND SELECT",
    );
    assert!(out.success);
    assert_eq!(out.code.matches("const _sel1 =").count(), 1);
    assert!(out.code.contains("if (_sel1 === 1 || _sel1 === 2) {"));
    assert!(out.code.contains("} else if (_sel1 === 3) {"));
    assert!(out.code.contains("} else {"));
}

#[test]
fn one_malformed_line_does_not_stop_the_rest() {
    let out = compile("PRINT \"a\"\nIF x 5\nPRINT \"b\"\nPRINT \"c\"");
    assert!(!out.success);
    assert_eq!(error_count(&out), 1);
    for text in ["\"a\"", "\"b\"", "\"c\""] {
        assert!(
            out.code.contains(&format!("_print(String({}), true);", text)),
            "statement {} survived recovery",
            text
        );
    }
}

#[test]
fn targets_differ_only_in_binding() {
    let mut compiler = Compiler::new();
    let node = compiler.compile("PRINT 1", Target::Node);
    let web = compiler.compile("PRINT 1", Target::Web);
    assert!(node.code.contains("require("));
    assert!(web.code.contains("globalThis.__qbhost"));
    // The statement body is byte-identical across targets
    assert!(node.code.contains("_print(String(1), true);"));
    assert!(web.code.contains("_print(String(1), true);"));
}

#[test]
fn unterminated_string_is_a_warning_not_an_error() {
    let out = compile("PRINT \"unfinished");
    assert!(out.success);
    assert!(out
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("unterminated")));
}

#[test]
fn typo_in_identifier_suggests_the_builtin() {
    let out = compile("PRINT LEFX$(\"abc\", 1)");
    let diag = out
        .diagnostics
        .iter()
        .find(|d| !d.suggestions.is_empty())
        .expect("a suggestion-bearing diagnostic");
    assert!(diag.suggestions.iter().any(|s| s == "LEFT$"));
}

#[test]
fn goto_degrades_to_comment_plus_warning() {
    let out = compile("GOTO 100\nPRINT \"after\"");
    assert!(out.success, "GOTO must not fail the compile");
    assert!(out.code.contains("// GOTO 100 (unsupported)"));
    assert!(out.code.contains("_print(String(\"after\"), true);"));
    assert!(out
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("GOTO")));
}

#[test]
fn function_value_flows_through_expression() {
    let out = compile(
        "FUNCTION Double(n)\nDouble = n * 2\nEND FUNCTION\nPRINT Double(21)",
    );
    assert!(out.success);
    assert!(out.code.contains("async function Double(n) {"));
    assert!(out.code.contains("return Double;"));
    assert!(out.code.contains("_print(String((await Double(21))), true);"));
}

#[test]
fn read_coerces_by_type_suffix() {
    let out = compile("DATA 7, word\nREAD n, w$");
    assert!(out.success);
    assert!(out.code.contains("var n = Number(_read());"));
    assert!(out.code.contains("var w$ = String(_read());"));
}

#[test]
fn restore_rewinds_the_data_cursor() {
    let out = compile("DATA 5\nREAD a\nRESTORE\nREAD b");
    assert!(out.success);
    assert!(out.code.contains("_restore();"));
    assert!(out.code.contains("function _restore() { _dataPtr = 0; }"));
}

#[test]
fn generated_program_is_brace_balanced() {
    // Deliberately truncated source: blocks left open at end of file
    let out = compile("SUB Broken\nFOR i = 1 TO 3\nIF i > 1 THEN\nPRINT i");
    assert!(!out.success);
    assert_eq!(out.code.matches('{').count(), out.code.matches('}').count());
}

#[test]
fn input_awaits_the_host() {
    let out = compile("INPUT \"Your name\"; name$\nPRINT name$");
    assert!(out.success);
    assert!(out
        .code
        .contains("var name$ = String(await _input(\"Your name? \"));"));
}

#[test]
fn qb64_extensions_compile() {
    let out = compile("_TITLE \"game\"\nSCREEN 13\n_LIMIT 30\nPSET (10, 10), 14\n_DISPLAY");
    assert!(out.success);
    assert!(out.code.contains("_title(\"game\");"));
    assert!(out.code.contains("_screen(13);"));
    assert!(out.code.contains("await _limit(30);"));
    assert!(out.code.contains("_pset(10, 10, 14);"));
}
