// Program
//
// A set of parsed source files plus the compiler options they were built
// with. Owns checking and drives emit through the custom transformer hooks.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::checker::{Checker, Symbol, Type};
use crate::diagnostics::{self, create_compiler_diagnostic};
use crate::emitter::{self, OutputPaths};
use crate::error::{Error, Result};
use crate::node::{Node, SyntaxKind};
use crate::parser::parse_source_file;
use crate::path::extension_of;
use crate::printer::print_node;
use crate::sys::System;
use crate::transformer::{CustomTransformers, TransformationContext, TransformerFactory};
use crate::{has_errors, Diagnostic, ModuleKind, ScriptTarget};

/// Compiler options as they appear under `compilerOptions`.
///
/// Every field is optional so that project options can be layered over an
/// explicit default value with [`CompilerOptions::with_defaults`]. Path
/// options are absolute once a configuration file has been parsed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub allow_js: Option<bool>,
    pub composite: Option<bool>,
    pub declaration: Option<bool>,
    pub declaration_dir: Option<String>,
    pub emit_declaration_only: Option<bool>,
    pub module: Option<ModuleKind>,
    pub new_line: Option<NewLineKind>,
    pub no_emit: Option<bool>,
    pub no_emit_on_error: Option<bool>,
    pub out_dir: Option<String>,
    pub out_file: Option<String>,
    pub resolve_json_module: Option<bool>,
    pub root_dir: Option<String>,
    pub strict: Option<bool>,
    pub target: Option<ScriptTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NewLineKind {
    #[serde(alias = "crlf", alias = "CRLF")]
    CarriageReturnLineFeed,
    #[serde(alias = "lf", alias = "LF")]
    LineFeed,
}

impl NewLineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NewLineKind::CarriageReturnLineFeed => "\r\n",
            NewLineKind::LineFeed => "\n",
        }
    }
}

impl CompilerOptions {
    /// Fill every unset option from `defaults`.
    pub fn with_defaults(&self, defaults: &CompilerOptions) -> CompilerOptions {
        CompilerOptions {
            allow_js: self.allow_js.or(defaults.allow_js),
            composite: self.composite.or(defaults.composite),
            declaration: self.declaration.or(defaults.declaration),
            declaration_dir: self.declaration_dir.clone().or_else(|| defaults.declaration_dir.clone()),
            emit_declaration_only: self.emit_declaration_only.or(defaults.emit_declaration_only),
            module: self.module.or(defaults.module),
            new_line: self.new_line.or(defaults.new_line),
            no_emit: self.no_emit.or(defaults.no_emit),
            no_emit_on_error: self.no_emit_on_error.or(defaults.no_emit_on_error),
            out_dir: self.out_dir.clone().or_else(|| defaults.out_dir.clone()),
            out_file: self.out_file.clone().or_else(|| defaults.out_file.clone()),
            resolve_json_module: self.resolve_json_module.or(defaults.resolve_json_module),
            root_dir: self.root_dir.clone().or_else(|| defaults.root_dir.clone()),
            strict: self.strict.or(defaults.strict),
            target: self.target.or(defaults.target),
        }
    }

    /// Declarations are emitted for `declaration` and for `composite` projects.
    pub fn emits_declarations(&self) -> bool {
        self.declaration.unwrap_or(false) || self.composite.unwrap_or(false)
    }

    pub fn emits_javascript(&self) -> bool {
        !self.emit_declaration_only.unwrap_or(false)
    }

    /// The configured line ending, or `fallback` when unset.
    pub fn new_line_or<'a>(&self, fallback: &'a str) -> &'a str {
        match self.new_line {
            Some(kind) => kind.as_str(),
            None => fallback,
        }
    }
}

/// Callback receiving every emitted file.
pub type WriteFileCallback<'a> = dyn FnMut(&Path, &str) -> io::Result<()> + 'a;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: PathBuf,
    pub text: String,
    pub node: Node,
    pub parse_diagnostics: Vec<Diagnostic>,
}

impl SourceFile {
    pub fn parse(file_name: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let text = text.into();
        let (node, parse_diagnostics) = parse_source_file(&file_name, &text);
        Self {
            file_name,
            text,
            node,
            parse_diagnostics,
        }
    }

    pub fn is_declaration_file(&self) -> bool {
        extension_of(&self.file_name).as_deref() == Some(".d.ts")
    }

    pub fn is_json_file(&self) -> bool {
        extension_of(&self.file_name).as_deref() == Some(".json")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitResult {
    pub emit_skipped: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub emitted_files: Vec<PathBuf>,
}

pub struct Program {
    root_names: Vec<PathBuf>,
    options: CompilerOptions,
    files: Vec<SourceFile>,
    global_diagnostics: Vec<Diagnostic>,
    semantic_diagnostics: Vec<Diagnostic>,
    checker: Checker,
    new_line: String,
}

impl Program {
    /// Read, parse and check every root file.
    pub fn create(root_names: &[PathBuf], options: &CompilerOptions, sys: &dyn System) -> Program {
        let mut files = Vec::new();
        let mut global_diagnostics = Vec::new();

        for name in root_names {
            match sys.read_file(name) {
                Some(text) if extension_of(name).as_deref() == Some(".json") => {
                    // JSON modules are inputs but carry no syntax of their own.
                    files.push(SourceFile {
                        file_name: name.clone(),
                        node: Node::new(SyntaxKind::SourceFile).with_text(name.to_string_lossy()),
                        text,
                        parse_diagnostics: Vec::new(),
                    });
                }
                Some(text) => files.push(SourceFile::parse(name.clone(), text)),
                None => global_diagnostics.push(create_compiler_diagnostic(
                    diagnostics::FILE_NOT_FOUND,
                    &[&name.to_string_lossy()],
                )),
            }
        }

        let (checker, semantic_diagnostics) = Checker::new(&files, options);
        let new_line = options.new_line_or(sys.new_line()).to_string();

        Program {
            root_names: root_names.to_vec(),
            options: options.clone(),
            files,
            global_diagnostics,
            semantic_diagnostics,
            checker,
            new_line,
        }
    }

    pub fn root_file_names(&self) -> &[PathBuf] {
        &self.root_names
    }

    pub fn source_files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn source_file(&self, file_name: &Path) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.file_name == file_name)
    }

    pub fn compiler_options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn global_diagnostics(&self) -> &[Diagnostic] {
        &self.global_diagnostics
    }

    pub fn syntactic_diagnostics(&self) -> Vec<Diagnostic> {
        self.files
            .iter()
            .flat_map(|f| f.parse_diagnostics.iter().cloned())
            .collect()
    }

    pub fn semantic_diagnostics(&self) -> &[Diagnostic] {
        &self.semantic_diagnostics
    }

    /// Global, syntactic and semantic diagnostics in that order.
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        let mut all = self.global_diagnostics.clone();
        all.extend(self.syntactic_diagnostics());
        all.extend(self.semantic_diagnostics.iter().cloned());
        all
    }

    // ========================================================================
    // Symbols and types
    // ========================================================================

    /// Look up a top-level declaration, preferring `file` when given.
    pub fn resolve_symbol(&self, name: &str, file: Option<&Path>) -> Option<&Symbol> {
        self.checker.resolve(name, file)
    }

    /// Declared type of a symbol, or the type inferred from its initializer.
    pub fn type_of_symbol(&self, symbol: &Symbol) -> Type {
        self.checker.type_of_symbol(symbol)
    }

    /// Widened type of an expression in the scope of `file`.
    pub fn type_of_expression(&self, expression: &Node, file: &Path) -> Type {
        self.checker.type_of_expression(expression, file)
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    // ========================================================================
    // Emit
    // ========================================================================

    /// Output paths of every emitting source file.
    pub fn output_paths(&self) -> Vec<(PathBuf, OutputPaths)> {
        let inputs: Vec<PathBuf> = self.files.iter().map(|f| f.file_name.clone()).collect();
        self.files
            .iter()
            .filter(|f| !f.is_declaration_file() && !f.is_json_file())
            .map(|f| (f.file_name.clone(), emitter::output_paths(&f.file_name, &self.options, &inputs)))
            .collect()
    }

    /// Emit every source file through `writer`.
    ///
    /// Transformer failures abort the emit and are returned as errors; write
    /// failures become diagnostics.
    pub fn emit(
        &self,
        writer: &mut WriteFileCallback<'_>,
        custom_transformers: Option<&CustomTransformers>,
    ) -> Result<EmitResult> {
        if self.options.no_emit.unwrap_or(false) {
            return Ok(EmitResult {
                emit_skipped: true,
                ..EmitResult::default()
            });
        }
        if self.options.no_emit_on_error.unwrap_or(false) && has_errors(&self.all_diagnostics()) {
            return Ok(EmitResult {
                emit_skipped: true,
                ..EmitResult::default()
            });
        }

        let empty = CustomTransformers::default();
        let custom = custom_transformers.unwrap_or(&empty);
        let context = TransformationContext {
            compiler_options: &self.options,
            program: Some(self),
        };
        let mut before = instantiate(&custom.before, &context);
        let mut after = instantiate(&custom.after, &context);
        let mut after_declarations = instantiate(&custom.after_declarations, &context);

        let mut result = EmitResult::default();
        let mut bundle_js = String::new();
        let mut bundle_dts = String::new();

        for (file_name, paths) in self.output_paths() {
            let Some(file) = self.source_file(&file_name) else {
                continue;
            };

            if self.options.emits_javascript() {
                let mut tree = apply(&mut before, file.node.clone())?;
                tree = emitter::to_javascript(tree)?;
                tree = apply(&mut after, tree)?;
                let text = print_node(&tree, &self.new_line);
                match &paths.js {
                    Some(_) if self.options.out_file.is_some() => bundle_js.push_str(&text),
                    Some(js) if js != &file.file_name => self.write(writer, js, &text, &mut result),
                    _ => {}
                }
            }

            if self.options.emits_declarations() {
                let tree = emitter::to_declarations(&file.node, &self.checker)?;
                let tree = apply(&mut after_declarations, tree)?;
                let text = print_node(&tree, &self.new_line);
                match &paths.declaration {
                    Some(_) if self.options.out_file.is_some() => bundle_dts.push_str(&text),
                    Some(dts) => self.write(writer, dts, &text, &mut result),
                    None => {}
                }
            }
        }

        if let Some(out_file) = &self.options.out_file {
            let out_file = PathBuf::from(out_file);
            if self.options.emits_javascript() {
                self.write(writer, &out_file, &bundle_js, &mut result);
            }
            if self.options.emits_declarations() {
                let dts = crate::path::change_extension(&out_file, ".d.ts");
                self.write(writer, &dts, &bundle_dts, &mut result);
            }
        }

        Ok(result)
    }

    fn write(&self, writer: &mut WriteFileCallback<'_>, path: &Path, text: &str, result: &mut EmitResult) {
        match writer(path, text) {
            Ok(()) => result.emitted_files.push(path.to_path_buf()),
            Err(err) => result.diagnostics.push(create_compiler_diagnostic(
                diagnostics::COULD_NOT_WRITE_FILE,
                &[&path.to_string_lossy(), &err.to_string()],
            )),
        }
    }
}

type Transformer<'a> = Box<dyn FnMut(Node) -> Result<Node> + 'a>;

fn instantiate<'a>(
    factories: &'a [Box<dyn TransformerFactory>],
    context: &'a TransformationContext<'a>,
) -> Vec<Transformer<'a>> {
    factories.iter().map(|factory| factory.create(context)).collect()
}

/// Run `transformers` in order; each must hand back a source file.
fn apply(transformers: &mut [Transformer<'_>], mut tree: Node) -> Result<Node> {
    for transformer in transformers.iter_mut() {
        tree = transformer(tree)?;
        if tree.kind != SyntaxKind::SourceFile {
            return Err(Error::InvalidNode {
                parent: SyntaxKind::SourceFile,
                found: tree.kind,
            });
        }
    }
    Ok(tree)
}
