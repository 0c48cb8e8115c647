//! TypeScript-compatible host layer for the build orchestrator.
//!
//! This crate plays the part of the compiler toolchain: it owns the syntax
//! tree and its child-rewrite primitive, a small parser/printer pair, program
//! emit with custom transformer hooks, `tsconfig.json` parsing, the system
//! abstraction (files and watches) and the incremental solution builder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

pub mod checker;
pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod node;
pub mod parser;
pub mod path;
pub mod printer;
pub mod program;
pub mod scanner;
pub mod solution_builder;
pub mod sys;
pub mod testing;
pub mod transformer;
pub mod visitor;

pub use config::*;
pub use diagnostics::{format_diagnostics, FormatDiagnosticsHost};
pub use error::{Error, Result};
pub use node::*;
pub use program::*;
pub use solution_builder::*;
pub use sys::*;
pub use transformer::*;
pub use visitor::*;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ScriptTarget {
    ES3,
    ES5,
    ES2015,
    ES2016,
    ES2017,
    ES2018,
    ES2019,
    ES2020,
    ES2021,
    ES2022,
    ESNext,
    JSON,
    Latest,
}

impl FromStr for ScriptTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let target = match s.to_ascii_lowercase().as_str() {
            "es3" => ScriptTarget::ES3,
            "es5" => ScriptTarget::ES5,
            "es6" | "es2015" => ScriptTarget::ES2015,
            "es2016" => ScriptTarget::ES2016,
            "es2017" => ScriptTarget::ES2017,
            "es2018" => ScriptTarget::ES2018,
            "es2019" => ScriptTarget::ES2019,
            "es2020" => ScriptTarget::ES2020,
            "es2021" => ScriptTarget::ES2021,
            "es2022" => ScriptTarget::ES2022,
            "esnext" => ScriptTarget::ESNext,
            "json" => ScriptTarget::JSON,
            "latest" => ScriptTarget::Latest,
            other => return Err(format!("Argument for '--target' option must be a known target, got '{}'", other)),
        };
        Ok(target)
    }
}

impl TryFrom<String> for ScriptTarget {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ModuleKind {
    None,
    CommonJS,
    AMD,
    UMD,
    System,
    ES2015,
    ES2020,
    ES2022,
    ESNext,
    Node16,
    NodeNext,
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "none" => ModuleKind::None,
            "commonjs" => ModuleKind::CommonJS,
            "amd" => ModuleKind::AMD,
            "umd" => ModuleKind::UMD,
            "system" => ModuleKind::System,
            "es6" | "es2015" => ModuleKind::ES2015,
            "es2020" => ModuleKind::ES2020,
            "es2022" => ModuleKind::ES2022,
            "esnext" => ModuleKind::ESNext,
            "node16" => ModuleKind::Node16,
            "nodenext" => ModuleKind::NodeNext,
            other => return Err(format!("Argument for '--module' option must be a known module kind, got '{}'", other)),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ModuleKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

impl DiagnosticCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        }
    }
}

// --- Diagnostic Structures ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticMessageChain {
    String(String),
    Chain {
        message_text: String,
        category: DiagnosticCategory,
        code: i32,
        next: Option<Vec<DiagnosticMessageChain>>,
    },
}

impl DiagnosticMessageChain {
    pub fn new(message: impl Into<String>) -> Self {
        Self::String(message.into())
    }

    /// Flattens the chain into indented lines, the way the pretty printer shows it.
    pub fn flatten(&self, new_line: &str) -> String {
        let mut out = String::new();
        self.flatten_into(&mut out, new_line, 0);
        out
    }

    fn flatten_into(&self, out: &mut String, new_line: &str, depth: usize) {
        if depth > 0 {
            out.push_str(new_line);
            out.push_str(&"  ".repeat(depth));
        }
        match self {
            DiagnosticMessageChain::String(s) => out.push_str(s),
            DiagnosticMessageChain::Chain {
                message_text, next, ..
            } => {
                out.push_str(message_text);
                for chain in next.iter().flatten() {
                    chain.flatten_into(out, new_line, depth + 1);
                }
            }
        }
    }
}

impl From<String> for DiagnosticMessageChain {
    fn from(s: String) -> Self {
        DiagnosticMessageChain::String(s)
    }
}

impl From<&str> for DiagnosticMessageChain {
    fn from(s: &str) -> Self {
        DiagnosticMessageChain::String(s.to_string())
    }
}

impl fmt::Display for DiagnosticMessageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticMessageChain::String(s) => write!(f, "{}", s),
            DiagnosticMessageChain::Chain { message_text, .. } => write!(f, "{}", message_text),
        }
    }
}

/// Zero-based line and column of a diagnostic start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAndCharacter {
    pub line: usize,
    pub character: usize,
}

impl LineAndCharacter {
    pub fn of_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        LineAndCharacter {
            line,
            character: before[line_start..].chars().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: i32,
    pub file: Option<PathBuf>,
    pub start: Option<usize>,
    pub length: Option<usize>,
    pub position: Option<LineAndCharacter>,
    pub message_text: DiagnosticMessageChain,
}

impl Diagnostic {
    pub fn new(
        category: DiagnosticCategory,
        code: i32,
        message_text: impl Into<DiagnosticMessageChain>,
    ) -> Self {
        Self {
            category,
            code,
            file: None,
            start: None,
            length: None,
            position: None,
            message_text: message_text.into(),
        }
    }

    /// Attach a file without a location.
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Attach a file span; the line/column is derived from `text`.
    pub fn with_span(mut self, file: impl AsRef<Path>, text: &str, start: usize, length: usize) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self.start = Some(start);
        self.length = Some(length);
        self.position = Some(LineAndCharacter::of_offset(text, start));
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

// --- Utilities ---

pub fn make_diagnostic_chain(
    message_text: String,
    next: Option<Vec<DiagnosticMessageChain>>,
) -> DiagnosticMessageChain {
    DiagnosticMessageChain::Chain {
        category: DiagnosticCategory::Message,
        code: 0,
        message_text,
        next,
    }
}

pub fn add_diagnostic_chain(
    message_text: DiagnosticMessageChain,
    add: Vec<DiagnosticMessageChain>,
) -> DiagnosticMessageChain {
    match message_text {
        DiagnosticMessageChain::String(s) => make_diagnostic_chain(s, Some(add)),
        DiagnosticMessageChain::Chain {
            message_text,
            category,
            code,
            next,
        } => {
            let mut next_vec = next.unwrap_or_default();
            next_vec.extend(add);
            DiagnosticMessageChain::Chain {
                message_text,
                category,
                code,
                next: Some(next_vec),
            }
        }
    }
}

/// True when any diagnostic in the slice is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
