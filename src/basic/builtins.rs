//! Built-in BASIC functions
//!
//! Each entry maps an upper-cased QBasic name to a typed emission strategy:
//! a plain JavaScript call target, a positional text template, or an awaited
//! host call. The parser consults this table from expression position; an
//! identifier found here with no declared variable of the same name is a
//! call even without parentheses (`RND`, `TIMER`, `INKEY$`).

/// How a builtin expands into JavaScript.
#[derive(Clone, Copy, Debug)]
pub enum Emit {
    /// `target(arg0, arg1, ...)`
    Call(&'static str),
    /// `(await target(arg0, ...))`
    Await(&'static str),
    /// Literal template with positional `{0}`, `{1}` slots
    Template(&'static str),
}

/// One builtin function.
#[derive(Clone, Copy, Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    /// Callable with no parentheses when the name is not a declared variable
    pub bare: bool,
    pub emit: Emit,
}

const fn fixed(name: &'static str, args: usize, emit: Emit) -> Builtin {
    Builtin { name, min_args: args, max_args: args, bare: false, emit }
}

const fn bare(name: &'static str, emit: Emit) -> Builtin {
    Builtin { name, min_args: 0, max_args: 0, bare: true, emit }
}

/// The builtin vocabulary. `_left`, `_right`, `_mid`, `_instr`, `_string`,
/// `_str`, `_val` and `_tab` are helpers defined in the generated header so
/// each argument is evaluated exactly once; `Math.*` calls go straight to
/// the JavaScript natives.
pub static BUILTINS: &[Builtin] = &[
    // Math
    fixed("ABS", 1, Emit::Call("Math.abs")),
    fixed("INT", 1, Emit::Call("Math.floor")),
    fixed("FIX", 1, Emit::Call("Math.trunc")),
    fixed("SGN", 1, Emit::Call("Math.sign")),
    fixed("SQR", 1, Emit::Call("Math.sqrt")),
    fixed("SIN", 1, Emit::Call("Math.sin")),
    fixed("COS", 1, Emit::Call("Math.cos")),
    fixed("TAN", 1, Emit::Call("Math.tan")),
    fixed("ATN", 1, Emit::Call("Math.atan")),
    fixed("LOG", 1, Emit::Call("Math.log")),
    fixed("EXP", 1, Emit::Call("Math.exp")),
    Builtin { name: "RND", min_args: 0, max_args: 1, bare: true, emit: Emit::Template("Math.random()") },

    // Strings
    fixed("LEN", 1, Emit::Template("String({0}).length")),
    fixed("LEFT$", 2, Emit::Call("_left")),
    fixed("RIGHT$", 2, Emit::Call("_right")),
    Builtin { name: "MID$", min_args: 2, max_args: 3, bare: false, emit: Emit::Call("_mid") },
    fixed("STR$", 1, Emit::Call("_str")),
    fixed("VAL", 1, Emit::Call("_val")),
    fixed("CHR$", 1, Emit::Call("String.fromCharCode")),
    fixed("ASC", 1, Emit::Template("String({0}).charCodeAt(0)")),
    Builtin { name: "INSTR", min_args: 2, max_args: 3, bare: false, emit: Emit::Call("_instr") },
    fixed("SPACE$", 1, Emit::Template("\" \".repeat(Math.max(0, {0}))")),
    fixed("STRING$", 2, Emit::Call("_string")),
    fixed("UCASE$", 1, Emit::Template("String({0}).toUpperCase()")),
    fixed("LCASE$", 1, Emit::Template("String({0}).toLowerCase()")),
    fixed("LTRIM$", 1, Emit::Template("String({0}).trimStart()")),
    fixed("RTRIM$", 1, Emit::Template("String({0}).trimEnd()")),

    // Conversions
    fixed("CINT", 1, Emit::Call("Math.round")),
    fixed("CLNG", 1, Emit::Call("Math.round")),
    fixed("CSNG", 1, Emit::Call("Number")),
    fixed("CDBL", 1, Emit::Call("Number")),

    // Host environment
    bare("TIMER", Emit::Call("_timer")),
    bare("DATE$", Emit::Call("_date")),
    bare("TIME$", Emit::Call("_time")),
    bare("INKEY$", Emit::Call("_inkey")),
    bare("CSRLIN", Emit::Call("_csrlin")),
    Builtin { name: "POS", min_args: 0, max_args: 1, bare: false, emit: Emit::Template("_pos()") },
    fixed("POINT", 2, Emit::Call("_point")),
    fixed("EOF", 1, Emit::Call("_feof")),
    Builtin { name: "INPUT$", min_args: 1, max_args: 2, bare: false, emit: Emit::Await("_inputchars") },

    // PRINT column control; approximated as padding text
    fixed("TAB", 1, Emit::Call("_tab")),
    fixed("SPC", 1, Emit::Template("\" \".repeat(Math.max(0, {0}))")),

    // QB64 extensions
    bare("_MOUSEX", Emit::Call("_mousex")),
    bare("_MOUSEY", Emit::Call("_mousey")),
    Builtin { name: "_MOUSEBUTTON", min_args: 1, max_args: 1, bare: false, emit: Emit::Call("_mousebutton") },
    fixed("_KEYDOWN", 1, Emit::Call("_keydown")),
    bare("_KEYHIT", Emit::Call("_keyhit")),
    fixed("_RGB", 3, Emit::Call("_rgb")),
    fixed("_RGB32", 3, Emit::Call("_rgb")),
    bare("_WIDTH", Emit::Call("_screenwidth")),
    bare("_HEIGHT", Emit::Call("_screenheight")),
];

/// Look up a builtin by (case-insensitive) name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    let upper = name.to_uppercase();
    BUILTINS.iter().find(|b| b.name == upper)
}

/// True when `name` is a builtin callable with zero arguments and no parens.
pub fn is_bare_callable(name: &str) -> bool {
    lookup(name).is_some_and(|b| b.bare)
}

/// All builtin names, for the suggestion vocabulary.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

/// Expand a builtin call with already-generated argument expressions.
pub fn expand(builtin: &Builtin, args: &[String]) -> String {
    match builtin.emit {
        Emit::Call(target) => format!("{}({})", target, args.join(", ")),
        Emit::Await(target) => format!("(await {}({}))", target, args.join(", ")),
        Emit::Template(template) => {
            let mut out = template.to_string();
            for (i, arg) in args.iter().enumerate() {
                out = out.replace(&format!("{{{}}}", i), arg);
            }
            out
        }
    }
}
