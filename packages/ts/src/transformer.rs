// Custom Transformers
//
// Emit-time hooks. A factory is instantiated once per emit with the
// transformation context and returns a transformer applied to each source
// file tree of its phase.

use crate::error::Result;
use crate::node::Node;
use crate::program::{CompilerOptions, Program};

/// Read-only state handed to transformer factories.
#[derive(Clone, Copy)]
pub struct TransformationContext<'a> {
    pub compiler_options: &'a CompilerOptions,
    /// The program being emitted, for symbol and type queries.
    pub program: Option<&'a Program>,
}

impl<'a> TransformationContext<'a> {
    pub fn new(compiler_options: &'a CompilerOptions) -> Self {
        Self {
            compiler_options,
            program: None,
        }
    }

    pub fn get_compiler_options(&self) -> &'a CompilerOptions {
        self.compiler_options
    }
}

pub trait TransformerFactory {
    fn create<'a>(&'a self, context: &'a TransformationContext<'a>) -> Box<dyn FnMut(Node) -> Result<Node> + 'a>;
}

/// Plain functions are factories for transformers that ignore the context.
impl<F> TransformerFactory for F
where
    F: Fn(Node) -> Result<Node>,
{
    fn create<'a>(&'a self, _context: &'a TransformationContext<'a>) -> Box<dyn FnMut(Node) -> Result<Node> + 'a> {
        Box::new(move |node| self(node))
    }
}

/// Transformers to run before type stripping, after it, and on declarations.
#[derive(Default)]
pub struct CustomTransformers {
    pub before: Vec<Box<dyn TransformerFactory>>,
    pub after: Vec<Box<dyn TransformerFactory>>,
    pub after_declarations: Vec<Box<dyn TransformerFactory>>,
}

impl CustomTransformers {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.after_declarations.is_empty()
    }
}

impl std::fmt::Debug for CustomTransformers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTransformers")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("after_declarations", &self.after_declarations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{factory, SyntaxKind};
    use crate::printer::print_node;
    use crate::program::SourceFile;
    use crate::testing::InMemorySystem;
    use std::path::{Path, PathBuf};

    fn append_marker(mut file: Node) -> Result<Node> {
        file.children.push(factory::expression_statement(factory::identifier("marker")));
        Ok(file)
    }

    #[test]
    fn should_run_function_factories_in_their_phase() {
        let sys = InMemorySystem::new("/p");
        sys.write("/p/a.ts", "interface I { a: number }");
        let program = crate::program::Program::create(
            &[PathBuf::from("/p/a.ts")],
            &CompilerOptions::default(),
            &sys,
        );

        let transformers = CustomTransformers {
            before: vec![Box::new(append_marker)],
            ..Default::default()
        };
        let mut output = String::new();
        let mut writer = |_: &Path, text: &str| -> std::io::Result<()> {
            output = text.to_string();
            Ok(())
        };
        program.emit(&mut writer, Some(&transformers)).unwrap();
        assert_eq!(output, "marker;\n");
    }

    #[test]
    fn should_expose_options_through_the_context() {
        let options = CompilerOptions {
            strict: Some(true),
            ..Default::default()
        };
        let context = TransformationContext::new(&options);
        let file = SourceFile::parse("/p/a.ts", "let a = 1;");
        let factory = |node: Node| -> Result<Node> { Ok(node) };
        let mut transformer = factory.create(&context);
        let out = transformer(file.node).unwrap();
        assert_eq!(out.kind, SyntaxKind::SourceFile);
        assert_eq!(print_node(&out, "\n"), "let a = 1;\n");
        assert_eq!(context.get_compiler_options().strict, Some(true));
    }
}
