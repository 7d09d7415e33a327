//! JavaScript emission: line buffer, targets and program templates
//!
//! The parser appends generated lines to a [`CodeBuffer`] as it walks the
//! token stream; indentation is a single counter moved at block boundaries.
//! Target selection swaps the header/footer templates only, the body is
//! identical for both runtimes.

/// Emission target. Selects how the generated program binds its host
/// runtime; the statement-level code generation never looks at this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// Console host: binds a required Node module (readline-style I/O)
    Node,
    /// Sandboxed host: binds `globalThis.__qbhost` supplied by the embedder
    Web,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Node => "node",
            Target::Web => "web",
        }
    }

    pub fn from_name(name: &str) -> Option<Target> {
        match name {
            "node" => Some(Target::Node),
            "web" => Some(Target::Web),
            _ => None,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const INDENT: &str = "  ";

/// Line-oriented output buffer with an indent counter.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    lines: Vec<String>,
    indent: usize,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at the current indent level.
    pub fn emit(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if line.is_empty() {
            self.lines.push(String::new());
            return;
        }
        let mut out = String::with_capacity(self.indent * INDENT.len() + line.len());
        for _ in 0..self.indent {
            out.push_str(INDENT);
        }
        out.push_str(line);
        self.lines.push(out);
    }

    /// Append preformatted text (headers/footers), one line per entry.
    pub fn emit_block(&mut self, block: &str) {
        for line in block.lines() {
            self.lines.push(line.to_string());
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub fn into_code(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Escape a string for inclusion in generated JavaScript source.
pub fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Host functions the generated body may call. Both headers bind exactly
/// this list so a program runs unmodified against either runtime.
const HOST_SURFACE: &str = "_print, _input, _inputchars, _cls, _locate, _color, _screen, _width, \
_sound, _beep, _sleep, _play, _pset, _preset, _line, _circle, _paint, _point, _gget, _gput, \
_inkey, _timer, _date, _time, _pos, _csrlin, _randomize, _limit, _display, _title, _fullscreen, \
_mousex, _mousey, _mousebutton, _keydown, _keyhit, _rgb, _screenwidth, _screenheight, _fopen, \
_fclose, _fread, _fwrite, _feof, _key";

/// Helpers shared by both targets: the DATA cursor, array builder and the
/// string builtins that need single-evaluation of their arguments.
fn common_helpers(data_literals: &str) -> String {
    format!(
        r#"const _data = {data};
let _dataPtr = 0;
function _read() {{ return _dataPtr < _data.length ? _data[_dataPtr++] : 0; }}
function _restore() {{ _dataPtr = 0; }}
function _end() {{ const e = new Error("program end"); e._qbEnd = true; throw e; }}
function _arr(dims, init) {{
  if (dims.length === 0) return init;
  const n = Math.trunc(dims[0]) + 1;
  return Array.from({{ length: n }}, () => _arr(dims.slice(1), init));
}}
function _str(n) {{ return n >= 0 ? " " + n : String(n); }}
function _val(s) {{ const n = parseFloat(s); return Number.isNaN(n) ? 0 : n; }}
function _left(s, n) {{ return String(s).slice(0, Math.max(0, n)); }}
function _right(s, n) {{ const t = String(s); return n <= 0 ? "" : t.slice(Math.max(0, t.length - n)); }}
function _mid(s, start, len) {{ const t = String(s); return len === undefined ? t.slice(start - 1) : t.substr(start - 1, len); }}
function _instr(a, b, c) {{ return c === undefined ? String(a).indexOf(String(b)) + 1 : String(b).indexOf(String(c), a - 1) + 1; }}
function _string(n, c) {{ const ch = typeof c === "number" ? String.fromCharCode(c) : String(c).charAt(0); return ch.repeat(Math.max(0, n)); }}
function _tab(n) {{ return " ".repeat(Math.max(0, Math.trunc(n))); }}"#,
        data = data_literals
    )
}

/// Program header for the chosen target, with the DATA table embedded as a
/// literal array.
pub fn header(target: Target, data_literals: &str) -> String {
    let binding = match target {
        Target::Node => {
            "const _host = require(process.env.QB_RUNTIME || \"./qb_host_node.js\");".to_string()
        }
        Target::Web => "const _host = globalThis.__qbhost;".to_string(),
    };
    format!(
        "\"use strict\";\n{binding}\nconst {{ {surface} }} = _host;\n{helpers}\nasync function _main() {{",
        binding = binding,
        surface = HOST_SURFACE,
        helpers = common_helpers(data_literals),
    )
}

/// Program footer for the chosen target.
pub fn footer(target: Target) -> String {
    match target {
        Target::Node => "}\n_main()\n  .then(() => { if (_host._halt) _host._halt(); })\n  .catch((e) => { if (!e || !e._qbEnd) throw e; });".to_string(),
        Target::Web => "}\nglobalThis.__qbmain = _main;\n_main().catch((e) => { if (!e || !e._qbEnd) throw e; });".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_buffer_indents() {
        let mut buf = CodeBuffer::new();
        buf.emit("if (x) {");
        buf.indent();
        buf.emit("y = 1;");
        buf.dedent();
        buf.emit("}");
        assert_eq!(buf.into_code(), "if (x) {\n  y = 1;\n}\n");
    }

    #[test]
    fn test_dedent_saturates() {
        let mut buf = CodeBuffer::new();
        buf.dedent();
        buf.emit("x;");
        assert_eq!(buf.into_code(), "x;\n");
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("hi"), "\"hi\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(js_string("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn test_headers_bind_same_surface() {
        let node = header(Target::Node, "[]");
        let web = header(Target::Web, "[]");
        for name in ["_print", "_input", "_sleep", "_pset", "_fopen"] {
            assert!(node.contains(name), "node header missing {}", name);
            assert!(web.contains(name), "web header missing {}", name);
        }
        assert!(node.contains("require("));
        assert!(web.contains("globalThis.__qbhost"));
    }

    #[test]
    fn test_header_embeds_data() {
        let h = header(Target::Node, "[1, 2, 3]");
        assert!(h.contains("const _data = [1, 2, 3];"));
    }

    #[test]
    fn test_footer_swallows_end_marker() {
        for t in [Target::Node, Target::Web] {
            assert!(footer(t).contains("_qbEnd"));
        }
    }

    #[test]
    fn test_target_names_round_trip() {
        assert_eq!(Target::from_name("node"), Some(Target::Node));
        assert_eq!(Target::from_name("web"), Some(Target::Web));
        assert_eq!(Target::from_name("wasm"), None);
        assert_eq!(Target::Node.as_str(), "node");
    }
}
