// Checker
//
// Top-level symbol tables per file, declared and inferred types, and the two
// semantic checks the host performs: literal/annotation assignability and
// block-scoped redeclaration.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::diagnostics::{self, create_file_diagnostic};
use crate::node::{factory, Node, NodeFlags, SyntaxKind};
use crate::program::{CompilerOptions, SourceFile};
use crate::Diagnostic;

/// Depth at which inference through identifiers gives up.
const MAX_INFERENCE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Number,
    String,
    Boolean,
    Null,
    /// A named type that is not a primitive.
    Reference(String),
    Array(Box<Type>),
    /// Object type with ordered members.
    Object(Vec<(String, Type)>),
}

impl Type {
    pub fn from_type_node(node: &Node) -> Type {
        match node.kind {
            SyntaxKind::TypeReference => match node.text() {
                "number" => Type::Number,
                "string" => Type::String,
                "boolean" => Type::Boolean,
                "null" => Type::Null,
                "any" | "unknown" => Type::Any,
                other => Type::Reference(other.to_string()),
            },
            SyntaxKind::ArrayType => Type::Array(Box::new(
                node.type_node().map(Type::from_type_node).unwrap_or(Type::Any),
            )),
            SyntaxKind::TypeLiteral => Type::Object(
                node.children
                    .iter()
                    .map(|member| {
                        let ty = member.type_node().map(Type::from_type_node).unwrap_or(Type::Any);
                        (member.name_text().unwrap_or("").to_string(), ty)
                    })
                    .collect(),
            ),
            _ => Type::Any,
        }
    }

    /// Synthesize the type annotation that spells this type.
    pub fn to_type_node(&self) -> Node {
        match self {
            Type::Object(members) => factory::type_literal(
                members
                    .iter()
                    .map(|(name, ty)| {
                        factory::property_signature(factory::identifier(name.clone()), Some(ty.to_type_node()))
                    })
                    .collect(),
            ),
            Type::Array(element) => factory::array_type(element.to_type_node()),
            other => factory::type_reference(other.to_string()),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Number | Type::String | Type::Boolean | Type::Null)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "boolean"),
            Type::Null => write!(f, "null"),
            Type::Reference(name) => write!(f, "{}", name),
            Type::Array(element) => write!(f, "{}[]", element),
            Type::Object(members) => {
                write!(f, "{{")?;
                for (name, ty) in members {
                    write!(f, " {}: {};", name, ty)?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Interface,
    Class,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file: PathBuf,
    pub exported: bool,
    /// The declaring `VariableDeclaration`, `InterfaceDeclaration` or `ClassDeclaration`.
    pub declaration: Node,
}

pub struct Checker {
    strict: bool,
    symbols: IndexMap<PathBuf, IndexMap<String, Symbol>>,
}

impl Checker {
    pub fn new(files: &[SourceFile], options: &CompilerOptions) -> (Checker, Vec<Diagnostic>) {
        let mut checker = Checker {
            strict: options.strict.unwrap_or(false),
            symbols: IndexMap::new(),
        };
        let mut diagnostics = Vec::new();
        for file in files {
            checker.bind(file, &mut diagnostics);
        }
        for file in files {
            checker.check(file, &mut diagnostics);
        }
        (checker, diagnostics)
    }

    fn bind(&mut self, file: &SourceFile, diagnostics: &mut Vec<Diagnostic>) {
        let table = self.symbols.entry(file.file_name.clone()).or_default();
        for statement in &file.node.children {
            let exported = statement.has_flag(NodeFlags::EXPORT);
            let declarations: Vec<(&Node, SymbolKind)> = match statement.kind {
                SyntaxKind::VariableStatement => statement
                    .children
                    .iter()
                    .map(|d| (d, SymbolKind::Variable))
                    .collect(),
                SyntaxKind::InterfaceDeclaration => vec![(statement, SymbolKind::Interface)],
                SyntaxKind::ClassDeclaration => vec![(statement, SymbolKind::Class)],
                _ => Vec::new(),
            };

            for (declaration, kind) in declarations {
                let Some(name) = declaration.name() else {
                    continue;
                };
                let block_scoped = kind != SymbolKind::Interface
                    && (statement.has_flag(NodeFlags::CONST) || statement.has_flag(NodeFlags::LET) || kind == SymbolKind::Class);
                match table.get(name.text()) {
                    Some(existing) if block_scoped || existing.kind != kind => {
                        diagnostics.push(create_file_diagnostic(
                            diagnostics::CANNOT_REDECLARE_BLOCK_SCOPED_VARIABLE,
                            &file.file_name,
                            &file.text,
                            name.pos,
                            name.end - name.pos,
                            &[name.text()],
                        ));
                    }
                    Some(_) => {}
                    None => {
                        table.insert(
                            name.text().to_string(),
                            Symbol {
                                name: name.text().to_string(),
                                kind,
                                file: file.file_name.clone(),
                                exported,
                                declaration: declaration.clone(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn check(&self, file: &SourceFile, diagnostics: &mut Vec<Diagnostic>) {
        for node in file.node.descendants() {
            if !matches!(node.kind, SyntaxKind::VariableDeclaration | SyntaxKind::PropertyDeclaration) {
                continue;
            }
            let (Some(annotation), Some(initializer)) = (node.type_node(), node.initializer()) else {
                continue;
            };
            let target = Type::from_type_node(annotation);
            let source = self.type_of_expression(initializer, &file.file_name);
            if !self.is_assignable(&source, &target) {
                diagnostics.push(create_file_diagnostic(
                    diagnostics::TYPE_NOT_ASSIGNABLE,
                    &file.file_name,
                    &file.text,
                    initializer.pos,
                    initializer.end - initializer.pos,
                    &[&source.to_string(), &target.to_string()],
                ));
            }
        }
    }

    /// Only primitive mismatches are reported; everything else is assignable.
    fn is_assignable(&self, source: &Type, target: &Type) -> bool {
        match (source, target) {
            (Type::Null, _) if !self.strict => true,
            (Type::Array(s), Type::Array(t)) => self.is_assignable(s, t),
            (s, t) if s.is_primitive() && t.is_primitive() => s == t,
            _ => true,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Find a symbol by name, in `file` first and then in any exported scope.
    pub fn resolve(&self, name: &str, file: Option<&Path>) -> Option<&Symbol> {
        if let Some(symbol) = file.and_then(|f| self.symbols.get(f)).and_then(|t| t.get(name)) {
            return Some(symbol);
        }
        self.symbols
            .values()
            .filter_map(|table| table.get(name))
            .find(|symbol| symbol.exported)
    }

    pub fn symbols_of(&self, file: &Path) -> impl Iterator<Item = &Symbol> {
        self.symbols.get(file).into_iter().flat_map(|table| table.values())
    }

    pub fn type_of_symbol(&self, symbol: &Symbol) -> Type {
        self.type_of_symbol_at(symbol, 0)
    }

    pub fn type_of_expression(&self, expression: &Node, file: &Path) -> Type {
        self.type_of_expression_at(expression, file, 0)
    }

    fn type_of_symbol_at(&self, symbol: &Symbol, depth: usize) -> Type {
        match symbol.kind {
            SymbolKind::Interface | SymbolKind::Class => Type::Reference(symbol.name.clone()),
            SymbolKind::Variable => {
                if let Some(annotation) = symbol.declaration.type_node() {
                    Type::from_type_node(annotation)
                } else if let Some(initializer) = symbol.declaration.initializer() {
                    self.type_of_expression_at(initializer, &symbol.file, depth + 1)
                } else {
                    Type::Any
                }
            }
        }
    }

    fn type_of_expression_at(&self, expression: &Node, file: &Path, depth: usize) -> Type {
        if depth > MAX_INFERENCE_DEPTH {
            return Type::Any;
        }
        match expression.kind {
            SyntaxKind::NumericLiteral => Type::Number,
            SyntaxKind::StringLiteral => Type::String,
            SyntaxKind::TrueKeyword | SyntaxKind::FalseKeyword => Type::Boolean,
            SyntaxKind::NullKeyword => Type::Null,
            SyntaxKind::ParenthesizedExpression => expression
                .children
                .first()
                .map(|inner| self.type_of_expression_at(inner, file, depth + 1))
                .unwrap_or(Type::Any),
            SyntaxKind::CommaListExpression => expression
                .children
                .last()
                .map(|last| self.type_of_expression_at(last, file, depth + 1))
                .unwrap_or(Type::Any),
            SyntaxKind::ObjectLiteralExpression => Type::Object(
                expression
                    .children
                    .iter()
                    .map(|property| {
                        let ty = property
                            .initializer()
                            .map(|value| self.type_of_expression_at(value, file, depth + 1))
                            .unwrap_or(Type::Any);
                        (property.name_text().unwrap_or("").to_string(), ty)
                    })
                    .collect(),
            ),
            SyntaxKind::ArrayLiteralExpression => {
                let mut element_types = expression
                    .children
                    .iter()
                    .map(|element| self.type_of_expression_at(element, file, depth + 1));
                let first = element_types.next().unwrap_or(Type::Any);
                let element = if element_types.all(|ty| ty == first) {
                    first
                } else {
                    Type::Any
                };
                Type::Array(Box::new(element))
            }
            SyntaxKind::Identifier => match self.resolve(expression.text(), Some(file)) {
                Some(symbol) if symbol.kind == SymbolKind::Variable => self.type_of_symbol_at(symbol, depth + 1),
                _ => Type::Any,
            },
            SyntaxKind::PropertyAccessExpression => {
                let object = expression
                    .children
                    .first()
                    .map(|object| self.type_of_expression_at(object, file, depth + 1));
                match (object, expression.name_text()) {
                    (Some(Type::Object(members)), Some(name)) => members
                        .into_iter()
                        .find(|(member, _)| member == name)
                        .map(|(_, ty)| ty)
                        .unwrap_or(Type::Any),
                    _ => Type::Any,
                }
            }
            _ => Type::Any,
        }
    }
}
