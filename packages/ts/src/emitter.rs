// Emitter
//
// Lowers a source tree to its JavaScript and declaration trees, and computes
// where those outputs are written.

use std::path::{Path, PathBuf};

use crate::checker::Checker;
use crate::error::Result;
use crate::node::{Node, NodeFlags, SyntaxKind};
use crate::path::{change_extension, common_source_directory, extension_of, is_within, relative_to};
use crate::program::CompilerOptions;
use crate::visitor::{visit_each_child, VisitResult};

// ============================================================================
// JavaScript
// ============================================================================

/// Strip types: interfaces and ambient statements disappear, annotations and
/// optional markers are dropped.
pub fn to_javascript(source: Node) -> Result<Node> {
    let mut strip = strip_types;
    let mut file = visit_each_child(source, &mut strip, None, None)?;
    file.flags.remove(NodeFlags::DECLARATION_FILE);
    Ok(file)
}

fn strip_types(node: Node) -> Result<VisitResult> {
    if node.kind.is_type_node()
        || node.kind == SyntaxKind::InterfaceDeclaration
        || (node.kind.is_statement() && node.has_flag(NodeFlags::DECLARE))
    {
        return Ok(VisitResult::Absent);
    }
    let mut strip = strip_types;
    let mut node = visit_each_child(node, &mut strip, None, None)?;
    node.flags.remove(NodeFlags::OPTIONAL);
    Ok(node.into())
}

// ============================================================================
// Declarations
// ============================================================================

/// Build the declaration tree for `source`.
///
/// Files with at least one export keep only exported statements. Variables
/// without an annotation get the widened type of their initializer.
pub fn to_declarations(source: &Node, checker: &Checker) -> Result<Node> {
    let file = Path::new(source.text());
    let is_module = source.children.iter().any(|s| s.has_flag(NodeFlags::EXPORT));

    let mut statements = Vec::new();
    for statement in &source.children {
        if is_module && !statement.has_flag(NodeFlags::EXPORT) {
            continue;
        }
        let declaration = match statement.kind {
            SyntaxKind::VariableStatement => {
                let declarations = statement
                    .children
                    .iter()
                    .map(|d| declare_typed(d, file, checker))
                    .collect();
                Some(ambient(statement).with_children(declarations))
            }
            SyntaxKind::ClassDeclaration => {
                let mut children: Vec<Node> = statement.children.first().cloned().into_iter().collect();
                children.extend(statement.elements().iter().map(|m| declare_typed(m, file, checker)));
                Some(ambient(statement).with_children(children))
            }
            SyntaxKind::InterfaceDeclaration => Some(statement.clone()),
            _ => None,
        };
        statements.extend(declaration);
    }

    Ok(Node {
        kind: SyntaxKind::SourceFile,
        flags: source.flags | NodeFlags::DECLARATION_FILE,
        text: source.text.clone(),
        children: statements,
        pos: source.pos,
        end: source.end,
    })
}

/// Copy of `statement` without children, marked `declare`.
fn ambient(statement: &Node) -> Node {
    Node {
        kind: statement.kind,
        flags: statement.flags | NodeFlags::DECLARE,
        text: statement.text.clone(),
        children: Vec::new(),
        pos: statement.pos,
        end: statement.end,
    }
}

/// A variable or property declaration reduced to `name: Type`.
fn declare_typed(declaration: &Node, file: &Path, checker: &Checker) -> Node {
    let ty = match (declaration.type_node(), declaration.initializer()) {
        (Some(annotation), _) => annotation.clone(),
        (None, Some(initializer)) => checker.type_of_expression(initializer, file).to_type_node(),
        (None, None) => crate::node::factory::type_reference("any"),
    };
    let mut children = Vec::with_capacity(2);
    children.extend(declaration.children.first().cloned());
    children.push(ty);
    Node {
        kind: declaration.kind,
        flags: declaration.flags,
        text: declaration.text.clone(),
        children,
        pos: declaration.pos,
        end: declaration.end,
    }
}

// ============================================================================
// Output paths
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    pub js: Option<PathBuf>,
    pub declaration: Option<PathBuf>,
}

/// Directory that `outDir` and `declarationDir` mirror.
pub fn source_root(options: &CompilerOptions, inputs: &[PathBuf]) -> Option<PathBuf> {
    if let Some(root_dir) = &options.root_dir {
        return Some(PathBuf::from(root_dir));
    }
    let emitting: Vec<PathBuf> = inputs
        .iter()
        .filter(|p| !matches!(extension_of(p).as_deref(), Some(".d.ts") | Some(".json")))
        .cloned()
        .collect();
    common_source_directory(&emitting)
}

/// Output locations of `file` given the project's inputs.
pub fn output_paths(file: &Path, options: &CompilerOptions, inputs: &[PathBuf]) -> OutputPaths {
    if let Some(out_file) = &options.out_file {
        let out_file = PathBuf::from(out_file);
        return OutputPaths {
            js: options.emits_javascript().then(|| out_file.clone()),
            declaration: options
                .emits_declarations()
                .then(|| change_extension(&out_file, ".d.ts")),
        };
    }

    let root = source_root(options, inputs);
    let relocate = |dir: &Option<String>| -> PathBuf {
        match (dir, &root) {
            (Some(dir), Some(root)) => Path::new(dir).join(relative_to(root, file)),
            (Some(dir), None) => Path::new(dir).join(file.file_name().unwrap_or_default()),
            (None, _) => file.to_path_buf(),
        }
    };

    let js_extension = match extension_of(file).as_deref() {
        Some(".jsx") => ".jsx",
        _ => ".js",
    };
    let js = relocate(&options.out_dir);
    let declaration_base = if options.declaration_dir.is_some() {
        relocate(&options.declaration_dir)
    } else {
        js.clone()
    };

    OutputPaths {
        js: options
            .emits_javascript()
            .then(|| change_extension(&js, js_extension)),
        declaration: options
            .emits_declarations()
            .then(|| change_extension(&declaration_base, ".d.ts")),
    }
}

/// Every output file a project would write.
pub fn all_output_paths(options: &CompilerOptions, inputs: &[PathBuf]) -> Vec<PathBuf> {
    if options.no_emit.unwrap_or(false) {
        return Vec::new();
    }
    let mut outputs = Vec::new();
    for input in inputs {
        if matches!(extension_of(input).as_deref(), Some(".d.ts") | Some(".json")) {
            continue;
        }
        let paths = output_paths(input, options, inputs);
        for path in paths.js.into_iter().chain(paths.declaration) {
            if &path != input && !outputs.contains(&path) {
                outputs.push(path);
            }
        }
    }
    outputs
}

/// Whether `path` is something the compiler writes rather than reads.
///
/// Checks `outFile`, `outDir` and `declarationDir`; without an `outDir`,
/// `.js` and `.d.ts` siblings of listed sources count as outputs too.
pub fn is_output_path(path: &Path, options: &CompilerOptions, inputs: &[PathBuf]) -> bool {
    if let Some(out_file) = &options.out_file {
        let out_file = PathBuf::from(out_file);
        if path == out_file || path == change_extension(&out_file, ".d.ts") {
            return true;
        }
    }
    let in_dir = |dir: &Option<String>| dir.as_deref().map_or(false, |dir| is_within(Path::new(dir), path));
    if in_dir(&options.out_dir) || in_dir(&options.declaration_dir) {
        return true;
    }
    if options.out_dir.is_some() || inputs.iter().any(|input| input == path) {
        return false;
    }
    inputs.iter().any(|input| {
        let is_source = matches!(extension_of(input).as_deref(), Some(".ts") | Some(".tsx"));
        is_source
            && (change_extension(input, ".js") == path || change_extension(input, ".d.ts") == path)
    })
}
