// Parser
//
// Recursive-descent parser for the supported TypeScript subset. Syntax errors
// are reported as diagnostics; the parser resynchronizes at the next statement
// boundary and keeps going.

use std::path::Path;

use crate::diagnostics::{self, create_file_diagnostic, DiagnosticMessage};
use crate::node::{factory, Node, NodeFlags, SyntaxKind};
use crate::path::extension_of;
use crate::scanner::{Scanner, Token, TokenKind};
use crate::Diagnostic;

/// Parse `text` into a `SourceFile` node whose text is the file name.
pub fn parse_source_file(file_name: &Path, text: &str) -> (Node, Vec<Diagnostic>) {
    let mut parser = Parser::new(file_name, text);
    let statements = parser.parse_statements();

    let mut flags = NodeFlags::NONE;
    match extension_of(file_name).as_deref() {
        Some(".d.ts") => flags |= NodeFlags::DECLARATION_FILE,
        Some(".js") | Some(".jsx") => flags |= NodeFlags::JAVASCRIPT_FILE,
        _ => {}
    }

    let source = Node::new(SyntaxKind::SourceFile)
        .with_text(file_name.to_string_lossy())
        .with_children(statements)
        .with_span(0, text.len())
        .with_flags(flags);
    (source, parser.diagnostics)
}

/// Marker for a syntax error that has already been reported.
struct Reported;

type ParseResult<T> = std::result::Result<T, Reported>;

struct Parser<'a> {
    file_name: &'a Path,
    text: &'a str,
    tokens: Vec<Token>,
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(file_name: &'a Path, text: &'a str) -> Self {
        Self {
            file_name,
            text,
            tokens: Scanner::new(text).scan_all(),
            index: 0,
            diagnostics: Vec::new(),
        }
    }

    // ========================================================================
    // Token cursor
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.index + offset).min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.current().is_keyword(keyword)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::EndOfFile {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(diagnostics::TOKEN_EXPECTED, &[kind.describe()]))
        }
    }

    fn last_end(&self) -> usize {
        if self.index == 0 {
            0
        } else {
            self.tokens[self.index - 1].end
        }
    }

    fn error_at_current(&mut self, message: DiagnosticMessage, args: &[&str]) -> Reported {
        let token = self.current().clone();
        let (start, length) = if token.kind == TokenKind::EndOfFile {
            (self.text.len(), 0)
        } else {
            (token.pos, token.end - token.pos)
        };
        self.diagnostics.push(create_file_diagnostic(
            message,
            self.file_name,
            self.text,
            start,
            length,
            args,
        ));
        Reported
    }

    /// Skip to just past the next `;`, or up to a token that can start a statement.
    fn resynchronize(&mut self) {
        let start = self.index;
        while !self.at(TokenKind::EndOfFile) {
            if self.eat(TokenKind::Semicolon) {
                return;
            }
            if self.index > start && (self.at(TokenKind::CloseBrace) || self.starts_declaration()) {
                return;
            }
            self.advance();
        }
    }

    fn starts_declaration(&self) -> bool {
        ["export", "declare", "const", "let", "var", "interface", "class"]
            .iter()
            .any(|k| self.at_keyword(k))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statements(&mut self) -> Vec<Node> {
        let mut statements = Vec::new();
        while !self.at(TokenKind::EndOfFile) {
            if self.at(TokenKind::CloseBrace) {
                self.error_at_current(diagnostics::DECLARATION_OR_STATEMENT_EXPECTED, &[]);
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(Reported) => self.resynchronize(),
            }
        }
        statements
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        if self.at(TokenKind::Unknown) {
            let reported = self.error_at_current(diagnostics::INVALID_CHARACTER, &[]);
            self.advance();
            return Err(reported);
        }
        if self.eat(TokenKind::Semicolon) {
            return Ok(Node::new(SyntaxKind::EmptyStatement).with_span(pos, self.last_end()));
        }
        if self.at(TokenKind::OpenBrace) {
            return self.parse_block();
        }

        let mut flags = NodeFlags::NONE;
        loop {
            if self.at_keyword("export") && self.peek(1).kind == TokenKind::Identifier {
                self.advance();
                flags |= NodeFlags::EXPORT;
            } else if self.at_keyword("declare") && self.peek(1).kind == TokenKind::Identifier {
                self.advance();
                flags |= NodeFlags::DECLARE;
            } else {
                break;
            }
        }

        let statement = if self.at_keyword("const") || self.at_keyword("let") || self.at_keyword("var") {
            self.parse_variable_statement(flags)?
        } else if self.at_keyword("interface") {
            self.parse_interface(flags)?
        } else if self.at_keyword("class") {
            self.parse_class(flags)?
        } else if !flags.is_empty() {
            return Err(self.error_at_current(diagnostics::DECLARATION_OR_STATEMENT_EXPECTED, &[]));
        } else {
            let expression = self.parse_expression()?;
            self.parse_semicolon()?;
            factory::expression_statement(expression)
        };
        Ok(statement.with_span(pos, self.last_end()))
    }

    /// A `;` or an implied one before `}`, end of file or a line break.
    fn parse_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(TokenKind::Semicolon) || self.at(TokenKind::CloseBrace) || self.at(TokenKind::EndOfFile) {
            return Ok(());
        }
        let gap = &self.text[self.last_end()..self.current().pos];
        if gap.contains('\n') {
            Ok(())
        } else {
            self.expect(TokenKind::Semicolon).map(|_| ())
        }
    }

    fn parse_block(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        self.expect(TokenKind::OpenBrace)?;
        let mut statements = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::EndOfFile) {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(Reported) => self.resynchronize(),
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(factory::block(statements).with_span(pos, self.last_end()))
    }

    fn parse_variable_statement(&mut self, mut flags: NodeFlags) -> ParseResult<Node> {
        let keyword = self.advance();
        match keyword.value.as_str() {
            "const" => flags |= NodeFlags::CONST,
            "let" => flags |= NodeFlags::LET,
            _ => {}
        }

        let mut declarations = vec![self.parse_variable_declaration()?];
        while self.eat(TokenKind::Comma) {
            declarations.push(self.parse_variable_declaration()?);
        }
        self.parse_semicolon()?;
        Ok(factory::variable_statement(flags, declarations))
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        let name = self.parse_identifier()?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.eat(TokenKind::Equals) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut children = vec![name];
        children.extend(ty);
        children.extend(initializer);
        Ok(Node::new(SyntaxKind::VariableDeclaration)
            .with_children(children)
            .with_span(pos, self.last_end()))
    }

    fn parse_interface(&mut self, flags: NodeFlags) -> ParseResult<Node> {
        self.advance();
        let name = self.parse_identifier()?;
        let members = self.parse_type_members()?;
        let mut children = vec![name];
        children.extend(members);
        Ok(Node::new(SyntaxKind::InterfaceDeclaration)
            .with_flags(flags)
            .with_children(children))
    }

    fn parse_class(&mut self, flags: NodeFlags) -> ParseResult<Node> {
        self.advance();
        let name = self.parse_identifier()?;
        self.expect(TokenKind::OpenBrace)?;
        let mut children = vec![name];
        while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::EndOfFile) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            children.push(self.parse_property_declaration()?);
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Node::new(SyntaxKind::ClassDeclaration)
            .with_flags(flags)
            .with_children(children))
    }

    fn parse_property_declaration(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        let name = self.parse_property_name()?;
        let mut flags = NodeFlags::NONE;
        if self.eat(TokenKind::Question) {
            flags |= NodeFlags::OPTIONAL;
        }
        let mut children = vec![name];
        if self.eat(TokenKind::Colon) {
            children.push(self.parse_type()?);
        }
        if self.eat(TokenKind::Equals) {
            children.push(self.parse_expression()?);
        }
        self.parse_semicolon()?;
        Ok(Node::new(SyntaxKind::PropertyDeclaration)
            .with_flags(flags)
            .with_children(children)
            .with_span(pos, self.last_end()))
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn parse_type(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        let mut ty = if self.at(TokenKind::OpenBrace) {
            factory::type_literal(self.parse_type_members()?)
        } else if self.at(TokenKind::Identifier) {
            let mut name = self.advance().value;
            while self.at(TokenKind::Dot) && self.peek(1).kind == TokenKind::Identifier {
                self.advance();
                name.push('.');
                name.push_str(&self.advance().value);
            }
            factory::type_reference(name)
        } else {
            return Err(self.error_at_current(diagnostics::TOKEN_EXPECTED, &["type"]));
        };
        ty = ty.with_span(pos, self.last_end());

        while self.at(TokenKind::OpenBracket) && self.peek(1).kind == TokenKind::CloseBracket {
            self.advance();
            self.advance();
            ty = factory::array_type(ty).with_span(pos, self.last_end());
        }
        Ok(ty)
    }

    /// `{ name?: Type; ... }` members of an interface or type literal.
    fn parse_type_members(&mut self) -> ParseResult<Vec<Node>> {
        self.expect(TokenKind::OpenBrace)?;
        let mut members = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::EndOfFile) {
            let pos = self.current().pos;
            let name = self.parse_property_name()?;
            let mut flags = NodeFlags::NONE;
            if self.eat(TokenKind::Question) {
                flags |= NodeFlags::OPTIONAL;
            }
            let mut children = vec![name];
            if self.eat(TokenKind::Colon) {
                children.push(self.parse_type()?);
            }
            members.push(
                Node::new(SyntaxKind::PropertySignature)
                    .with_flags(flags)
                    .with_children(children)
                    .with_span(pos, self.last_end()),
            );
            if !self.eat(TokenKind::Semicolon) && !self.eat(TokenKind::Comma) {
                let gap = &self.text[self.last_end()..self.current().pos];
                if !self.at(TokenKind::CloseBrace) && !gap.contains('\n') {
                    return Err(self.error_at_current(diagnostics::TOKEN_EXPECTED, &[";"]));
                }
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(members)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        let mut expression = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let name = self.parse_identifier()?;
                expression = Node::new(SyntaxKind::PropertyAccessExpression)
                    .with_children(vec![expression, name])
                    .with_span(pos, self.last_end());
            } else if self.eat(TokenKind::OpenParen) {
                let mut children = vec![expression];
                children.extend(self.parse_list(TokenKind::CloseParen, Self::parse_expression)?);
                expression = Node::new(SyntaxKind::CallExpression)
                    .with_children(children)
                    .with_span(pos, self.last_end());
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let token = self.current().clone();
        let node = match token.kind {
            TokenKind::Identifier => {
                self.advance();
                match token.value.as_str() {
                    "true" => Node::new(SyntaxKind::TrueKeyword),
                    "false" => Node::new(SyntaxKind::FalseKeyword),
                    "null" => Node::new(SyntaxKind::NullKeyword),
                    _ => factory::identifier(token.value),
                }
            }
            TokenKind::StringLiteral => {
                self.advance();
                factory::string_literal(token.value)
            }
            TokenKind::UnterminatedString => {
                return Err(self.error_at_current(diagnostics::UNTERMINATED_STRING_LITERAL, &[]));
            }
            TokenKind::NumericLiteral => {
                self.advance();
                factory::numeric_literal(token.value)
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;
                factory::parenthesized(inner)
            }
            TokenKind::OpenBracket => {
                self.advance();
                factory::array_literal(self.parse_list(TokenKind::CloseBracket, Self::parse_expression)?)
            }
            TokenKind::OpenBrace => {
                self.advance();
                factory::object_literal(self.parse_list(TokenKind::CloseBrace, Self::parse_property_assignment)?)
            }
            _ => return Err(self.error_at_current(diagnostics::EXPRESSION_EXPECTED, &[])),
        };
        Ok(node.with_span(token.pos, self.last_end()))
    }

    fn parse_property_assignment(&mut self) -> ParseResult<Node> {
        let pos = self.current().pos;
        let name = self.parse_property_name()?;
        let initializer = if self.eat(TokenKind::Colon) {
            self.parse_expression()?
        } else {
            // Shorthand `{ a }`.
            factory::identifier(name.text()).with_span(name.pos, name.end)
        };
        Ok(factory::property_assignment(name, initializer).with_span(pos, self.last_end()))
    }

    /// Comma-separated items up to `close`, with an optional trailing comma.
    fn parse_list(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> ParseResult<Node>,
    ) -> ParseResult<Vec<Node>> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(item(self)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_identifier(&mut self) -> ParseResult<Node> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(factory::identifier(token.value).with_span(token.pos, token.end))
    }

    fn parse_property_name(&mut self) -> ParseResult<Node> {
        let token = self.current().clone();
        let node = match token.kind {
            TokenKind::Identifier => factory::identifier(token.value),
            TokenKind::StringLiteral => factory::string_literal(token.value),
            TokenKind::NumericLiteral => factory::numeric_literal(token.value),
            _ => return Err(self.error_at_current(diagnostics::TOKEN_EXPECTED, &["identifier"])),
        };
        self.advance();
        Ok(node.with_span(token.pos, token.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (Node, Vec<Diagnostic>) {
        parse_source_file(Path::new("/p/index.ts"), text)
    }

    #[test]
    fn should_parse_exported_object_constant() {
        let (file, diagnostics) = parse("export const obj = { property: 1 };");
        assert!(diagnostics.is_empty());
        let statement = &file.children[0];
        assert_eq!(statement.kind, SyntaxKind::VariableStatement);
        assert!(statement.has_flag(NodeFlags::EXPORT | NodeFlags::CONST));
        assert!(!statement.has_flag(NodeFlags::SYNTHESIZED));

        let declaration = &statement.children[0];
        assert_eq!(declaration.name_text(), Some("obj"));
        let object = declaration.initializer().unwrap();
        assert_eq!(object.kind, SyntaxKind::ObjectLiteralExpression);
        assert_eq!(object.children[0].name_text(), Some("property"));
    }

    #[test]
    fn should_parse_types_interfaces_and_classes() {
        let text = "interface Shape { name: string; tags?: string[] }\n\
                    declare class Box { size: number = 1; }\n\
                    let s: { a: Shape }[] = [];";
        let (file, diagnostics) = parse(text);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(file.children.len(), 3);
        assert_eq!(file.children[0].elements().len(), 2);
        assert!(file.children[0].elements()[1].has_flag(NodeFlags::OPTIONAL));
        assert!(file.children[1].has_flag(NodeFlags::DECLARE));
        let ty = file.children[2].children[0].type_node().unwrap();
        assert_eq!(ty.kind, SyntaxKind::ArrayType);
        assert_eq!(ty.children[0].kind, SyntaxKind::TypeLiteral);
    }

    #[test]
    fn should_parse_calls_and_property_access() {
        let (file, diagnostics) = parse("console.log(\"hi\", [1, 2],)\nfoo()");
        assert!(diagnostics.is_empty());
        let call = &file.children[0].children[0];
        assert_eq!(call.kind, SyntaxKind::CallExpression);
        assert_eq!(call.children[0].kind, SyntaxKind::PropertyAccessExpression);
        assert_eq!(call.elements().len(), 2);
        assert_eq!(file.children.len(), 2);
    }

    #[test]
    fn should_report_missing_tokens_and_recover() {
        let (file, diagnostics) = parse("const a = ;\nconst b = 2;");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, 1109);
        assert_eq!(file.children.len(), 1);
        assert_eq!(file.children[0].children[0].name_text(), Some("b"));

        let (_, diagnostics) = parse("const a = 1 const b = 2;");
        assert_eq!(diagnostics[0].code, 1005);
        assert_eq!(diagnostics[0].message_text.to_string(), "';' expected.");

        let (_, diagnostics) = parse("}");
        assert_eq!(diagnostics[0].code, 1128);
    }
}
