//! qbjs command-line interface
//!
//! `qbjs build` transpiles a QBasic/QB64 source file to JavaScript;
//! `qbjs lint` prints diagnostics without emitting code. Diagnostics go to
//! stderr, generated code to stdout or `--output`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use qbjs::{Compiler, Diagnostic, Severity, Target};

#[derive(Debug, Parser)]
#[command(name = "qbjs")]
#[command(version, about = "QBasic/QB64 to JavaScript transpiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg {
    /// Console host bound via require()
    Node,
    /// Sandboxed host bound via globalThis.__qbhost
    Web,
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Node => Target::Node,
            TargetArg::Web => Target::Web,
        }
    }
}

impl std::fmt::Display for TargetArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Target::from(*self).as_str())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transpile a source file to JavaScript
    Build {
        /// Source file (.bas)
        file: PathBuf,

        /// Emission target
        #[arg(long, value_enum, default_value_t = TargetArg::Node)]
        target: TargetArg,

        /// Write generated code here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a source file and print diagnostics only
    Lint {
        /// Source file (.bas)
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build { file, target, output } => build(&file, target.into(), output.as_deref()),
        Command::Lint { file } => lint(&file),
    }
}

fn build(file: &Path, target: Target, output: Option<&Path>) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("qbjs: cannot read {}: {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut compiler = Compiler::new();
    let result = compiler.compile(&source, target);
    report(file, &result.diagnostics);

    if !result.success {
        return ExitCode::FAILURE;
    }

    match output {
        Some(path) => {
            if let Err(err) = fs::write(path, &result.code) {
                eprintln!("qbjs: cannot write {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", result.code),
    }
    ExitCode::SUCCESS
}

fn lint(file: &Path) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("qbjs: cannot read {}: {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut compiler = Compiler::new();
    let diagnostics = compiler.lint(&source);
    report(file, &diagnostics);

    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report(file: &Path, diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!(
            "{}:{}:{}: {}: {}",
            file.display(),
            d.line,
            d.column,
            d.severity.as_str(),
            d.message
        );
        if !d.suggestions.is_empty() {
            eprintln!("    did you mean {}?", d.suggestions.join(", "));
        }
    }
}
