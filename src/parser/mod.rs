/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

mod expression;
pub mod node;

use crate::diagnostics::{DiagnosticKind, DiagnosticRegistry};
use crate::lexer::{INDENT_WIDTH, Token, TokenKind};
use node::{Node, NodeKind};

/// Control-flow signal that unwinds parsing to the top level. Raised only
/// when continuing would require speculative assumptions about the token
/// stream; every ordinary problem is registered and recovered from instead.
pub(crate) struct Halt;

pub(crate) type ParseResult<T> = Result<T, Halt>;

/// A statement production yields either one node or, for multi-target
/// assignments, several sibling statements.
enum Parsed {
    One(Node),
    Many(Vec<Node>),
}

/// Recursive-descent parser over statements with precedence climbing for
/// expressions (see `expression.rs`). Keeps only the token cursor and a
/// parenthesis-depth counter; everything it learns about problems goes to
/// the diagnostic registry.
pub struct Parser<'r> {
    tokens: Vec<Token>,
    cursor: usize,
    pub(crate) parens: i32,
    pub(crate) registry: &'r mut DiagnosticRegistry,
    eof: Token,
}

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, registry: &'r mut DiagnosticRegistry) -> Self {
        let eof = tokens.last().cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: 1,
            column: 1,
            content: None,
        });
        Parser {
            tokens,
            cursor: 0,
            parens: 0,
            registry,
            eof,
        }
    }

    pub fn parse(mut self) -> Node {
        let mut prog = Node::new(NodeKind::Prog);
        // Halt only ends the traversal; whatever was built stays usable
        let _ = self.traverse(&mut prog);
        prog
    }

    fn traverse(&mut self, prog: &mut Node) -> ParseResult<()> {
        while !self.at_eof() {
            if self.peek(0).kind == TokenKind::Newline {
                self.consume();
                continue;
            }
            let scope = self.parse_scope(0)?;
            prog.children.push(scope);
        }
        Ok(())
    }

    fn parse_scope(&mut self, depth: usize) -> ParseResult<Node> {
        let mut scope = Node::new(NodeKind::Scope);
        let mut if_started = false;
        while !self.at_eof() {
            match self.peek(0).kind {
                TokenKind::Newline => {
                    self.consume();
                    continue;
                }
                TokenKind::Indent => {
                    let level = self.count_indentation();
                    if level > depth {
                        let token = self.peek(0).clone();
                        self.registry.register(
                            token.line,
                            token.column,
                            DiagnosticKind::MismatchingIndent {
                                required: depth * INDENT_WIDTH,
                                got: level * INDENT_WIDTH,
                            },
                        );
                    }
                    if level < depth {
                        return Ok(scope);
                    }
                    self.skip(level);
                }
                _ if depth > 0 => return Ok(scope),
                _ => {}
            }

            match self.parse_stmts()? {
                Parsed::Many(nodes) => scope.children.extend(nodes),
                Parsed::One(node) => match node.kind {
                    NodeKind::If => {
                        let node = self.parse_if_scope(node, depth)?;
                        scope.children.push(node);
                        if_started = true;
                    }
                    NodeKind::Elif => {
                        if !if_started {
                            self.report_orphan_branch(&node, "elif statement declared without if");
                        }
                        let node = self.parse_if_scope(node, depth)?;
                        match scope.children.last_mut() {
                            Some(last) if last.kind == NodeKind::If => last.children.push(node),
                            _ if if_started => {
                                self.report_orphan_branch(
                                    &node,
                                    "elif statement declared without if",
                                );
                            }
                            _ => {}
                        }
                    }
                    NodeKind::Else => {
                        let subscope = self.parse_scope(depth + 1)?;
                        if subscope.children.is_empty() {
                            self.report_empty_scope(&node, "else");
                        }
                        match scope.children.last_mut() {
                            Some(last) if last.kind == NodeKind::If => {
                                last.children.push(subscope)
                            }
                            _ => {
                                self.report_orphan_branch(
                                    &node,
                                    "else statement declared without if",
                                );
                            }
                        }
                        if_started = false;
                    }
                    NodeKind::While => {
                        let mut node = node;
                        let subscope = self.parse_scope(depth + 1)?;
                        if subscope.children.is_empty() {
                            self.report_empty_scope(&node, "while");
                        }
                        node.children.push(subscope);
                        scope.children.push(node);
                    }
                    NodeKind::Class => {
                        let mut node = node;
                        let subscope = self.parse_scope(depth + 1)?;
                        if subscope.children.is_empty() {
                            self.report_empty_scope(&node, "class");
                        }
                        node.children.push(subscope);
                        scope.children.push(node);
                    }
                    _ => scope.children.push(node),
                },
            }
        }
        Ok(scope)
    }

    fn parse_if_scope(&mut self, mut statement: Node, depth: usize) -> ParseResult<Node> {
        let subscope = self.parse_scope(depth + 1)?;
        if subscope.children.is_empty() {
            let stmt_type = if statement.kind == NodeKind::If {
                "if"
            } else {
                "elif"
            };
            self.report_empty_scope(&statement, stmt_type);
        }
        statement.children.push(subscope);
        Ok(statement)
    }

    fn parse_stmts(&mut self) -> ParseResult<Parsed> {
        match self.peek(0).kind {
            TokenKind::If => self.parse_branch_stmt(NodeKind::If, "if").map(Parsed::One),
            TokenKind::Elif => self
                .parse_branch_stmt(NodeKind::Elif, "elif")
                .map(Parsed::One),
            TokenKind::Else => self.parse_else_stmt().map(Parsed::One),
            TokenKind::While => self
                .parse_branch_stmt(NodeKind::While, "while")
                .map(Parsed::One),
            TokenKind::Class => self.parse_class().map(Parsed::One),
            TokenKind::Break => Ok(Parsed::One(self.parse_constant(NodeKind::Break))),
            TokenKind::Continue => Ok(Parsed::One(self.parse_constant(NodeKind::Continue))),
            _ => self.parse_expressions(),
        }
    }

    fn parse_expressions(&mut self) -> ParseResult<Parsed> {
        let Some(expr) = self.parse_expression()? else {
            let token = self.peek(0).clone();
            self.registry.register(
                token.line,
                token.column,
                DiagnosticKind::UnknownToken {
                    token: format!("{:?}", token.kind),
                },
            );
            self.recover_to_newline();
            return Ok(Parsed::One(Node::new(NodeKind::Term)));
        };

        if self.peek(0).kind == TokenKind::Comma {
            if expr.kind != NodeKind::Term {
                let token = self.peek(0).clone();
                self.registry.register(
                    token.line,
                    token.column,
                    DiagnosticKind::IllegalDeclaration {
                        reason: "cannot declare multiline definitions with already full statements"
                            .to_string(),
                    },
                );
                return Ok(Parsed::One(expr));
            }
            return self.parse_multi_target(expr);
        }

        match self.peek(0).kind {
            TokenKind::Newline | TokenKind::Eof => {}
            TokenKind::ClosedParen => {
                let token = self.peek(0).clone();
                self.registry
                    .register(token.line, token.column, DiagnosticKind::MismatchParensMore);
                self.recover_to_newline();
            }
            _ => {
                let token = self.peek(0).clone();
                self.registry.register(
                    token.line,
                    token.column,
                    DiagnosticKind::IllegalDeclaration {
                        reason: "cannot have two statements on the same line".to_string(),
                    },
                );
                self.recover_to_newline();
            }
        }
        Ok(Parsed::One(expr))
    }

    // `a, b = e1, e2` — a comma-separated target list, a plain `=`, then a
    // comma-separated expression list of the same arity
    fn parse_multi_target(&mut self, first: Node) -> ParseResult<Parsed> {
        let mut idents = vec![first];
        loop {
            if self.is_assignment(self.peek(0).kind) {
                break;
            }
            if self.peek(0).kind != TokenKind::Comma {
                break;
            }
            self.consume();
            match self.parse_leaf() {
                Some(node) => idents.push(node),
                None => {
                    let token = self.peek(0).clone();
                    self.registry.register(
                        token.line,
                        token.column,
                        DiagnosticKind::IllegalDeclaration {
                            reason: "expected a target name after ','".to_string(),
                        },
                    );
                    break;
                }
            }
        }

        let assign = self.consume().clone();
        if assign.kind != TokenKind::Eq {
            self.registry.register(
                assign.line,
                assign.column,
                DiagnosticKind::IllegalDeclaration {
                    reason: "cannot use assignment operator with multiple definitions".to_string(),
                },
            );
            self.recover_to_newline();
            return Ok(Parsed::Many(Vec::new()));
        }

        let mut exprs = Vec::new();
        loop {
            let Some(expr) = self.parse_expression()? else {
                break;
            };
            if self.peek(0).kind == TokenKind::Comma {
                self.consume();
            }
            exprs.push(expr);
        }
        if idents.len() != exprs.len() {
            self.registry.register(
                assign.line,
                assign.column,
                DiagnosticKind::IllegalDeclaration {
                    reason: "cannot assign less expressions than values declared".to_string(),
                },
            );
        }
        let stmts = idents
            .into_iter()
            .zip(exprs)
            .map(|(ident, expr)| Node::with_children(NodeKind::Stmt, vec![ident, expr]))
            .collect();
        Ok(Parsed::Many(stmts))
    }

    // if/elif/while share the `<keyword> <condition> :` head
    fn parse_branch_stmt(&mut self, kind: NodeKind, stmt_type: &str) -> ParseResult<Node> {
        let token = self.consume().clone();
        let condition = self.parse_expr(&[TokenKind::Colon])?;
        self.expect_colon(&token, stmt_type);
        let mut node = Node::with_token(kind, token);
        node.children.push(condition);
        Ok(node)
    }

    fn parse_else_stmt(&mut self) -> ParseResult<Node> {
        let token = self.consume().clone();
        self.expect_colon(&token, "else");
        Ok(Node::with_token(NodeKind::Else, token))
    }

    fn parse_class(&mut self) -> ParseResult<Node> {
        let token = self.consume().clone();
        let class_name = self.consume().clone();
        if class_name.kind != TokenKind::Ident {
            self.registry.register(
                class_name.line,
                class_name.column,
                DiagnosticKind::MismatchToken {
                    expected: "ident".to_string(),
                    got: format!("{:?}", class_name.kind),
                },
            );
        }
        let name_node = Node::with_children(
            NodeKind::Term,
            vec![Node::leaf(
                NodeKind::Ident,
                class_name.content.clone().unwrap_or_default(),
                class_name,
            )],
        );
        self.expect_colon(&token, "class definition");
        let mut node = Node::with_token(NodeKind::Class, token);
        node.children.push(name_node);
        Ok(node)
    }

    fn parse_constant(&mut self, kind: NodeKind) -> Node {
        let token = self.consume().clone();
        Node::with_token(kind, token)
    }

    fn expect_colon(&mut self, at: &Token, stmt_type: &str) {
        if self.peek(0).kind == TokenKind::Colon {
            self.consume();
        } else {
            self.registry.register(
                at.line,
                at.column,
                DiagnosticKind::MissingToken {
                    missing: ":".to_string(),
                    stmt_type: stmt_type.to_string(),
                },
            );
        }
    }

    fn report_empty_scope(&mut self, node: &Node, stmt_type: &str) {
        let (line, column) = self.node_position(node);
        self.registry.register(
            line,
            column,
            DiagnosticKind::EmptyScope {
                stmt_type: stmt_type.to_string(),
            },
        );
    }

    fn report_orphan_branch(&mut self, node: &Node, reason: &str) {
        let (line, column) = self.node_position(node);
        self.registry.register(
            line,
            column,
            DiagnosticKind::IllegalIfConstruct {
                reason: reason.to_string(),
            },
        );
    }

    fn node_position(&self, node: &Node) -> (usize, usize) {
        node.token
            .as_ref()
            .map(|t| (t.line, t.column))
            .unwrap_or((self.eof.line, self.eof.column))
    }

    fn count_indentation(&self) -> usize {
        let mut count = 0;
        while self.peek(count).kind == TokenKind::Indent {
            count += 1;
        }
        count
    }

    fn recover_to_newline(&mut self) {
        while !self.at_eof() && self.peek(0).kind != TokenKind::Newline {
            self.consume();
        }
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek(0).kind == TokenKind::Eof
    }

    pub(crate) fn peek(&self, distance: usize) -> &Token {
        self.tokens.get(self.cursor + distance).unwrap_or(&self.eof)
    }

    pub(crate) fn consume(&mut self) -> &Token {
        let token = self.tokens.get(self.cursor).unwrap_or(&self.eof);
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    pub(crate) fn skip(&mut self, distance: usize) {
        for _ in 0..distance {
            self.consume();
        }
    }
}
