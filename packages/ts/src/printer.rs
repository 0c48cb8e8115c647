// Printer
//
// Renders a syntax tree back to source text. Every statement ends with the
// configured line ending; nested blocks and type literals indent by four spaces.

use crate::node::{Node, NodeFlags, SyntaxKind};

const INDENT: &str = "    ";

pub struct Printer {
    new_line: String,
    indent: usize,
    out: String,
}

impl Printer {
    pub fn new(new_line: impl Into<String>) -> Self {
        Self {
            new_line: new_line.into(),
            indent: 0,
            out: String::new(),
        }
    }

    /// Print a whole file, or any statement or expression node.
    pub fn print(mut self, node: &Node) -> String {
        match node.kind {
            SyntaxKind::SourceFile => {
                for statement in &node.children {
                    self.write_statement(statement);
                }
            }
            kind if kind.is_statement() => self.write_statement(node),
            kind if kind.is_type_node() => self.write_type(node),
            _ => self.write_expression(node),
        }
        self.out
    }

    fn write_line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push_str(&self.new_line);
    }

    /// Print a nested construct into its own buffer at the current indent.
    fn nested(&self, f: impl FnOnce(&mut Printer)) -> String {
        let mut printer = Printer {
            new_line: self.new_line.clone(),
            indent: self.indent,
            out: String::new(),
        };
        f(&mut printer);
        printer.out
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn write_statement(&mut self, node: &Node) {
        match node.kind {
            SyntaxKind::VariableStatement => {
                let declarations: Vec<String> = node
                    .children
                    .iter()
                    .map(|d| self.variable_declaration(d))
                    .collect();
                let keyword = if node.has_flag(NodeFlags::CONST) {
                    "const"
                } else if node.has_flag(NodeFlags::LET) {
                    "let"
                } else {
                    "var"
                };
                let line = format!("{}{} {};", modifiers(node), keyword, declarations.join(", "));
                self.write_line(&line);
            }
            SyntaxKind::InterfaceDeclaration | SyntaxKind::ClassDeclaration => {
                let keyword = if node.kind == SyntaxKind::InterfaceDeclaration {
                    "interface"
                } else {
                    "class"
                };
                let header = format!("{}{} {}", modifiers(node), keyword, node.name_text().unwrap_or(""));
                if node.elements().is_empty() {
                    self.write_line(&format!("{} {{ }}", header));
                    return;
                }
                self.write_line(&format!("{} {{", header));
                self.indent += 1;
                for member in node.elements() {
                    let member = self.member(member);
                    self.write_line(&member);
                }
                self.indent -= 1;
                self.write_line("}");
            }
            SyntaxKind::ExpressionStatement => {
                let expression = node
                    .children
                    .first()
                    .map(|e| self.expression(e))
                    .unwrap_or_default();
                self.write_line(&format!("{};", expression));
            }
            SyntaxKind::Block => {
                if node.children.is_empty() {
                    self.write_line("{ }");
                    return;
                }
                self.write_line("{");
                self.indent += 1;
                for statement in &node.children {
                    self.write_statement(statement);
                }
                self.indent -= 1;
                self.write_line("}");
            }
            SyntaxKind::EmptyStatement => self.write_line(";"),
            _ => {
                let expression = self.expression(node);
                self.write_line(&expression);
            }
        }
    }

    fn variable_declaration(&self, node: &Node) -> String {
        let mut text = node.name().map(|n| self.expression(n)).unwrap_or_default();
        if let Some(ty) = node.type_node() {
            text.push_str(": ");
            text.push_str(&self.type_text(ty));
        }
        if let Some(initializer) = node.initializer() {
            text.push_str(" = ");
            text.push_str(&self.expression(initializer));
        }
        text
    }

    fn member(&self, node: &Node) -> String {
        let mut text = node.name().map(|n| self.expression(n)).unwrap_or_default();
        if node.has_flag(NodeFlags::OPTIONAL) {
            text.push('?');
        }
        if let Some(ty) = node.type_node() {
            text.push_str(": ");
            text.push_str(&self.type_text(ty));
        }
        if let Some(initializer) = node.initializer() {
            text.push_str(" = ");
            text.push_str(&self.expression(initializer));
        }
        text.push(';');
        text
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn write_expression(&mut self, node: &Node) {
        let text = self.expression(node);
        self.out.push_str(&text);
    }

    fn expression(&self, node: &Node) -> String {
        match node.kind {
            SyntaxKind::Identifier | SyntaxKind::NumericLiteral => node.text().to_string(),
            SyntaxKind::StringLiteral => quote(node.text()),
            SyntaxKind::TrueKeyword => "true".to_string(),
            SyntaxKind::FalseKeyword => "false".to_string(),
            SyntaxKind::NullKeyword => "null".to_string(),
            SyntaxKind::ObjectLiteralExpression => {
                if node.children.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", self.expression_list(&node.children))
                }
            }
            SyntaxKind::PropertyAssignment => {
                let name = node.name().map(|n| self.expression(n)).unwrap_or_default();
                match node.initializer() {
                    Some(value) if value.is(SyntaxKind::Identifier) && value.text() == name => name,
                    Some(value) => format!("{}: {}", name, self.expression(value)),
                    None => name,
                }
            }
            SyntaxKind::ArrayLiteralExpression => {
                format!("[{}]", self.expression_list(&node.children))
            }
            SyntaxKind::CallExpression => {
                let callee = node.children.first().map(|c| self.expression(c)).unwrap_or_default();
                format!("{}({})", callee, self.expression_list(node.elements()))
            }
            SyntaxKind::PropertyAccessExpression => {
                let object = node.children.first().map(|c| self.expression(c)).unwrap_or_default();
                format!("{}.{}", object, node.name_text().unwrap_or(""))
            }
            SyntaxKind::ParenthesizedExpression => {
                let inner = node.children.first().map(|c| self.expression(c)).unwrap_or_default();
                format!("({})", inner)
            }
            SyntaxKind::CommaListExpression => self.expression_list(&node.children),
            kind if kind.is_type_node() => self.type_text(node),
            _ => self.nested(|printer| printer.write_statement(node)).trim_end().to_string(),
        }
    }

    fn expression_list(&self, nodes: &[Node]) -> String {
        nodes
            .iter()
            .map(|n| self.expression(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn write_type(&mut self, node: &Node) {
        let text = self.type_text(node);
        self.out.push_str(&text);
    }

    fn type_text(&self, node: &Node) -> String {
        match node.kind {
            SyntaxKind::TypeReference => node.text().to_string(),
            SyntaxKind::ArrayType => {
                let element = node.type_node().map(|t| self.type_text(t)).unwrap_or_default();
                format!("{}[]", element)
            }
            SyntaxKind::TypeLiteral => {
                if node.children.is_empty() {
                    return "{}".to_string();
                }
                let mut inner = String::from("{");
                inner.push_str(&self.new_line);
                let members = self.nested(|printer| {
                    printer.indent += 1;
                    for member in &node.children {
                        let line = printer.member(member);
                        printer.write_line(&line);
                    }
                });
                inner.push_str(&members);
                for _ in 0..self.indent {
                    inner.push_str(INDENT);
                }
                inner.push('}');
                inner
            }
            _ => self.expression(node),
        }
    }
}

fn modifiers(node: &Node) -> String {
    let mut text = String::new();
    if node.has_flag(NodeFlags::EXPORT) {
        text.push_str("export ");
    }
    if node.has_flag(NodeFlags::DECLARE) {
        text.push_str("declare ");
    }
    text
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Print `node` with `new_line` line endings.
pub fn print_node(node: &Node, new_line: &str) -> String {
    Printer::new(new_line).print(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::factory::*;
    use crate::parser::parse_source_file;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn reprint(text: &str) -> String {
        let (file, diagnostics) = parse_source_file(Path::new("/p/a.ts"), text);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        print_node(&file, "\n")
    }

    #[test]
    fn should_reprint_statements() {
        assert_eq!(
            reprint("export const obj = { property: 1, 'a b': \"x\" };\nlet  list:string[]=[1,2]"),
            "export const obj = { property: 1, \"a b\": \"x\" };\nlet list: string[] = [1, 2];\n"
        );
    }

    #[test]
    fn should_indent_type_literals_and_members() {
        let statement = variable_statement(
            NodeFlags::EXPORT | NodeFlags::DECLARE | NodeFlags::CONST,
            vec![variable_declaration(
                "obj",
                Some(type_literal(vec![property_signature(
                    identifier("property"),
                    Some(type_reference("number")),
                )])),
                None,
            )],
        );
        assert_eq!(
            print_node(&statement, "\n"),
            "export declare const obj: {\n    property: number;\n};\n"
        );

        assert_eq!(
            reprint("interface A { b?: { c: number } }"),
            "interface A {\n    b?: {\n        c: number;\n    };\n}\n"
        );
    }

    #[test]
    fn should_use_the_requested_line_ending() {
        let block = block(vec![expression_statement(call(identifier("f"), vec![]))]);
        assert_eq!(print_node(&block, "\r\n"), "{\r\n    f();\r\n}\r\n");
    }
}
