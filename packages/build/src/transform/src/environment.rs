// Transform Environment
//
// Read-only view a pass gets for one tree: the phase it runs in, the host
// transformation context and the project that is being built.

use std::fmt;
use std::path::{Path, PathBuf};

use ts::checker::{Symbol, Type};
use ts::{CompilerOptions, Node, Program, TransformationContext};

/// Emit phase a pass runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformPhase {
    /// The source tree, before types are stripped.
    Before,
    /// The generated JavaScript tree.
    After,
    /// The generated declaration tree.
    AfterDeclarations,
}

impl TransformPhase {
    pub const ALL: [TransformPhase; 3] = [
        TransformPhase::Before,
        TransformPhase::After,
        TransformPhase::AfterDeclarations,
    ];
}

impl fmt::Display for TransformPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformPhase::Before => "before",
            TransformPhase::After => "after",
            TransformPhase::AfterDeclarations => "afterDeclarations",
        };
        f.write_str(name)
    }
}

/// The build unit a registry is materialized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformUnit {
    pub config_path: PathBuf,
    pub current_directory: PathBuf,
}

impl TransformUnit {
    pub fn new(config_path: impl Into<PathBuf>, current_directory: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            current_directory: current_directory.into(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct TransformEnvironment<'a> {
    phase: TransformPhase,
    context: TransformationContext<'a>,
    unit: &'a TransformUnit,
}

impl<'a> TransformEnvironment<'a> {
    pub fn new(phase: TransformPhase, context: TransformationContext<'a>, unit: &'a TransformUnit) -> Self {
        Self {
            phase,
            context,
            unit,
        }
    }

    pub fn phase(&self) -> TransformPhase {
        self.phase
    }

    pub fn context(&self) -> &TransformationContext<'a> {
        &self.context
    }

    pub fn compiler_options(&self) -> &'a CompilerOptions {
        self.context.get_compiler_options()
    }

    pub fn current_directory(&self) -> &'a Path {
        &self.unit.current_directory
    }

    /// Config file of the project being built.
    pub fn config_path(&self) -> &'a Path {
        &self.unit.config_path
    }

    /// The program being emitted, when the host provides one.
    pub fn program(&self) -> Option<&'a Program> {
        self.context.program
    }

    /// Look a name up in `file`, then among exported declarations.
    pub fn resolve_symbol(&self, name: &str, file: Option<&Path>) -> Option<&'a Symbol> {
        self.program()?.resolve_symbol(name, file)
    }

    /// Declared type of a symbol, or the type inferred from its initializer.
    pub fn type_of_symbol(&self, symbol: &Symbol) -> Option<Type> {
        Some(self.program()?.type_of_symbol(symbol))
    }

    pub fn type_of_expression(&self, expression: &Node, file: &Path) -> Option<Type> {
        Some(self.program()?.type_of_expression(expression, file))
    }
}

impl fmt::Debug for TransformEnvironment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEnvironment")
            .field("phase", &self.phase)
            .field("unit", self.unit)
            .field("has_program", &self.context.program.is_some())
            .finish()
    }
}
