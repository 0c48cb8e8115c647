// Syntax Tree
//
// Owned, kind-tagged syntax nodes shared by the parser, the emitters, the
// printer and every transform pass.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    SourceFile,

    // Statements
    VariableStatement,
    VariableDeclaration,
    InterfaceDeclaration,
    ClassDeclaration,
    ExpressionStatement,
    Block,
    EmptyStatement,

    // Members
    PropertySignature,
    PropertyDeclaration,

    // Expressions
    Identifier,
    StringLiteral,
    NumericLiteral,
    TrueKeyword,
    FalseKeyword,
    NullKeyword,
    ObjectLiteralExpression,
    PropertyAssignment,
    ArrayLiteralExpression,
    CallExpression,
    PropertyAccessExpression,
    ParenthesizedExpression,
    CommaListExpression,

    // Types
    TypeReference,
    ArrayType,
    TypeLiteral,
}

/// Coarse grouping used to keep rewritten trees structurally valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    SourceFile,
    Statement,
    Declaration,
    Member,
    Property,
    Expression,
    Type,
    Name,
}

impl SyntaxKind {
    pub fn category(self) -> NodeCategory {
        use SyntaxKind::*;
        match self {
            SourceFile => NodeCategory::SourceFile,
            VariableStatement | InterfaceDeclaration | ClassDeclaration | ExpressionStatement
            | Block | EmptyStatement => NodeCategory::Statement,
            VariableDeclaration => NodeCategory::Declaration,
            PropertySignature | PropertyDeclaration => NodeCategory::Member,
            PropertyAssignment => NodeCategory::Property,
            TypeReference | ArrayType | TypeLiteral => NodeCategory::Type,
            Identifier | StringLiteral | NumericLiteral | TrueKeyword | FalseKeyword
            | NullKeyword | ObjectLiteralExpression | ArrayLiteralExpression | CallExpression
            | PropertyAccessExpression | ParenthesizedExpression | CommaListExpression => {
                NodeCategory::Expression
            }
        }
    }

    /// Index of the first child that belongs to a node list, if the kind has one.
    ///
    /// Children before that index are single-node slots.
    pub fn list_start(self) -> Option<usize> {
        use SyntaxKind::*;
        match self {
            SourceFile | VariableStatement | Block | ObjectLiteralExpression
            | ArrayLiteralExpression | CommaListExpression | TypeLiteral => Some(0),
            InterfaceDeclaration | ClassDeclaration | CallExpression => Some(1),
            _ => None,
        }
    }

    /// Whether the single-node slot at `index` may be left empty.
    pub fn is_optional_slot(self, index: usize) -> bool {
        use SyntaxKind::*;
        matches!(self, VariableDeclaration | PropertyDeclaration | PropertySignature) && index > 0
    }

    /// Whether the slot at `index` holds a declaration name.
    pub fn is_name_slot(self, index: usize) -> bool {
        use SyntaxKind::*;
        match self {
            VariableDeclaration | InterfaceDeclaration | ClassDeclaration | PropertySignature
            | PropertyDeclaration | PropertyAssignment => index == 0,
            PropertyAccessExpression => index == 1,
            _ => false,
        }
    }

    pub fn is_type_node(self) -> bool {
        self.category() == NodeCategory::Type
    }

    pub fn is_expression(self) -> bool {
        self.category() == NodeCategory::Expression
    }

    pub fn is_statement(self) -> bool {
        self.category() == NodeCategory::Statement
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            SyntaxKind::StringLiteral
                | SyntaxKind::NumericLiteral
                | SyntaxKind::TrueKeyword
                | SyntaxKind::FalseKeyword
                | SyntaxKind::NullKeyword
        )
    }
}

impl NodeCategory {
    /// Whether a node of `kind` may take the place of a node in this category.
    pub fn accepts(self, kind: SyntaxKind) -> bool {
        match self {
            NodeCategory::Name => matches!(
                kind,
                SyntaxKind::Identifier | SyntaxKind::StringLiteral | SyntaxKind::NumericLiteral
            ),
            other => kind.category() == other,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        const NONE = 0;
        const EXPORT = 1 << 0;
        const DECLARE = 1 << 1;
        const CONST = 1 << 2;
        const LET = 1 << 3;
        const OPTIONAL = 1 << 4;
        /// Created by a transform rather than the parser.
        const SYNTHESIZED = 1 << 5;
        /// `.d.ts` source file.
        const DECLARATION_FILE = 1 << 6;
        /// JavaScript source file.
        const JAVASCRIPT_FILE = 1 << 7;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: SyntaxKind,
    pub flags: NodeFlags,
    /// Identifier name, literal value, type name, or the file name of a source file.
    pub text: Option<String>,
    pub children: Vec<Node>,
    pub pos: usize,
    pub end: usize,
}

impl Node {
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            flags: NodeFlags::SYNTHESIZED,
            text: None,
            children: Vec::new(),
            pos: 0,
            end: 0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_span(mut self, pos: usize, end: usize) -> Self {
        self.pos = pos;
        self.end = end;
        self.flags.remove(NodeFlags::SYNTHESIZED);
        self
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn is(&self, kind: SyntaxKind) -> bool {
        self.kind == kind
    }

    pub fn has_flag(&self, flag: NodeFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Declaration or property name, when the kind has one.
    pub fn name(&self) -> Option<&Node> {
        if self.kind.is_name_slot(0) {
            self.children.first()
        } else if self.kind == SyntaxKind::PropertyAccessExpression {
            self.children.get(1)
        } else {
            None
        }
    }

    pub fn name_text(&self) -> Option<&str> {
        self.name().map(Node::text)
    }

    /// Type annotation of a declaration or member.
    pub fn type_node(&self) -> Option<&Node> {
        match self.kind {
            SyntaxKind::VariableDeclaration
            | SyntaxKind::PropertyDeclaration
            | SyntaxKind::PropertySignature => {
                self.children.iter().skip(1).find(|c| c.kind.is_type_node())
            }
            SyntaxKind::ArrayType => self.children.first(),
            _ => None,
        }
    }

    /// Initializer of a declaration, member or property assignment.
    pub fn initializer(&self) -> Option<&Node> {
        match self.kind {
            SyntaxKind::VariableDeclaration | SyntaxKind::PropertyDeclaration => {
                self.children.iter().skip(1).find(|c| c.kind.is_expression())
            }
            SyntaxKind::PropertyAssignment => self.children.get(1),
            _ => None,
        }
    }

    /// Node-list children (statements, members, elements, arguments).
    pub fn elements(&self) -> &[Node] {
        match self.kind.list_start() {
            Some(start) if start <= self.children.len() => &self.children[start..],
            _ => &[],
        }
    }

    /// Depth-first iteration over this node and every descendant.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Expected category for the child at `index`.
    pub fn slot_category(&self, index: usize) -> Option<NodeCategory> {
        let child = self.children.get(index)?;
        if self.kind.list_start().map_or(true, |start| index < start) && self.kind.is_name_slot(index) {
            return Some(NodeCategory::Name);
        }
        Some(child.kind.category())
    }
}

/// Constructors for synthesized nodes.
pub mod factory {
    use super::{Node, NodeFlags, SyntaxKind};

    pub fn identifier(name: impl Into<String>) -> Node {
        Node::new(SyntaxKind::Identifier).with_text(name)
    }

    pub fn string_literal(value: impl Into<String>) -> Node {
        Node::new(SyntaxKind::StringLiteral).with_text(value)
    }

    pub fn numeric_literal(value: impl Into<String>) -> Node {
        Node::new(SyntaxKind::NumericLiteral).with_text(value)
    }

    pub fn boolean_literal(value: bool) -> Node {
        Node::new(if value {
            SyntaxKind::TrueKeyword
        } else {
            SyntaxKind::FalseKeyword
        })
    }

    pub fn null_literal() -> Node {
        Node::new(SyntaxKind::NullKeyword)
    }

    pub fn type_reference(name: impl Into<String>) -> Node {
        Node::new(SyntaxKind::TypeReference).with_text(name)
    }

    pub fn array_type(element: Node) -> Node {
        Node::new(SyntaxKind::ArrayType).with_children(vec![element])
    }

    pub fn type_literal(members: Vec<Node>) -> Node {
        Node::new(SyntaxKind::TypeLiteral).with_children(members)
    }

    pub fn property_signature(name: Node, ty: Option<Node>) -> Node {
        let mut children = vec![name];
        children.extend(ty);
        Node::new(SyntaxKind::PropertySignature).with_children(children)
    }

    pub fn property_declaration(name: Node, ty: Option<Node>, initializer: Option<Node>) -> Node {
        let mut children = vec![name];
        children.extend(ty);
        children.extend(initializer);
        Node::new(SyntaxKind::PropertyDeclaration).with_children(children)
    }

    pub fn property_assignment(name: Node, initializer: Node) -> Node {
        Node::new(SyntaxKind::PropertyAssignment).with_children(vec![name, initializer])
    }

    pub fn object_literal(properties: Vec<Node>) -> Node {
        Node::new(SyntaxKind::ObjectLiteralExpression).with_children(properties)
    }

    pub fn array_literal(elements: Vec<Node>) -> Node {
        Node::new(SyntaxKind::ArrayLiteralExpression).with_children(elements)
    }

    pub fn call(callee: Node, arguments: Vec<Node>) -> Node {
        let mut children = vec![callee];
        children.extend(arguments);
        Node::new(SyntaxKind::CallExpression).with_children(children)
    }

    pub fn property_access(expression: Node, name: impl Into<String>) -> Node {
        Node::new(SyntaxKind::PropertyAccessExpression)
            .with_children(vec![expression, identifier(name)])
    }

    pub fn parenthesized(expression: Node) -> Node {
        Node::new(SyntaxKind::ParenthesizedExpression).with_children(vec![expression])
    }

    /// Lifts several expressions into one `a, b, c` expression.
    pub fn comma_list(expressions: Vec<Node>) -> Node {
        Node::new(SyntaxKind::CommaListExpression).with_children(expressions)
    }

    pub fn expression_statement(expression: Node) -> Node {
        Node::new(SyntaxKind::ExpressionStatement).with_children(vec![expression])
    }

    /// Lifts several statements into one `{ ... }` block.
    pub fn block(statements: Vec<Node>) -> Node {
        Node::new(SyntaxKind::Block).with_children(statements)
    }

    pub fn variable_declaration(name: impl Into<String>, ty: Option<Node>, initializer: Option<Node>) -> Node {
        let mut children = vec![identifier(name)];
        children.extend(ty);
        children.extend(initializer);
        Node::new(SyntaxKind::VariableDeclaration).with_children(children)
    }

    pub fn variable_statement(flags: NodeFlags, declarations: Vec<Node>) -> Node {
        Node::new(SyntaxKind::VariableStatement)
            .with_flags(flags)
            .with_children(declarations)
    }

    pub fn interface_declaration(flags: NodeFlags, name: impl Into<String>, members: Vec<Node>) -> Node {
        let mut children = vec![identifier(name)];
        children.extend(members);
        Node::new(SyntaxKind::InterfaceDeclaration)
            .with_flags(flags)
            .with_children(children)
    }

    pub fn class_declaration(flags: NodeFlags, name: impl Into<String>, members: Vec<Node>) -> Node {
        let mut children = vec![identifier(name)];
        children.extend(members);
        Node::new(SyntaxKind::ClassDeclaration)
            .with_flags(flags)
            .with_children(children)
    }
}
