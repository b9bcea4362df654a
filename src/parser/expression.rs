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

use super::node::{Node, NodeKind};
use super::{Halt, ParseResult, Parser};
use crate::diagnostics::DiagnosticKind;
use crate::lexer::{Token, TokenKind};

// tokens that legally end an expression statement
const STMT_FINAL: &[TokenKind] = &[TokenKind::Newline, TokenKind::Comma];

/// Outcome of one climbing step: either no operator bound at this precedence
/// (the operand comes back unchanged) or a new, larger expression was built.
enum Climb {
    Done(Option<Node>),
    Grew(Node),
}

impl<'r> Parser<'r> {
    /// Parses one expression-or-statement starting at the cursor. Returns
    /// `None` when the current token cannot start an expression at all.
    pub(super) fn parse_expression(&mut self) -> ParseResult<Option<Node>> {
        let current = self.peek(0).clone();
        if current.kind == TokenKind::Ident {
            let next_kind = self.peek(1).kind;
            if self.is_assignment(next_kind) {
                let Some(term) = self.parse_leaf() else {
                    return Err(Halt);
                };
                let eq = self.consume().clone();
                let expr = self.parse_expr(STMT_FINAL)?;
                let expr = self.desugar_assignment(&term, eq, expr);
                return Ok(Some(Node::with_children(NodeKind::Stmt, vec![term, expr])));
            }
            if next_kind == TokenKind::Colon {
                let Some(mut term) = self.parse_leaf() else {
                    return Err(Halt);
                };
                self.consume();
                let typedef = self.parse_type_definition();
                term.children.push(typedef);
                if self.is_assignment(self.peek(0).kind) {
                    let eq = self.consume().clone();
                    let expr = self.parse_expr(STMT_FINAL)?;
                    let expr = self.desugar_assignment(&term, eq, expr);
                    return Ok(Some(Node::with_children(NodeKind::Stmt, vec![term, expr])));
                }
                return Ok(Some(Node::with_children(NodeKind::Stmt, vec![term])));
            }
            if matches!(
                next_kind,
                TokenKind::Newline | TokenKind::Comma | TokenKind::ClosedParen | TokenKind::Eof
            ) {
                self.consume();
                return Ok(Some(Node::with_children(
                    NodeKind::Term,
                    vec![Node::leaf(
                        NodeKind::Ident,
                        current.content.clone().unwrap_or_default(),
                        current,
                    )],
                )));
            }
            if self.is_binop(next_kind) {
                return self.parse_expr(STMT_FINAL).map(Some);
            }
            return Ok(None);
        }

        if matches!(current.kind, TokenKind::Number | TokenKind::OpenParen)
            || matches!(current.kind, TokenKind::Not | TokenKind::BitNot)
        {
            return self.parse_expr(STMT_FINAL).map(Some);
        }

        Ok(None)
    }

    // compound assignments expand to `target = target op rhs`
    fn desugar_assignment(&mut self, term: &Node, eq: Token, expr: Node) -> Node {
        if eq.kind == TokenKind::Eq {
            return expr;
        }
        let operator = Node::with_token(self.compound_operator(eq.kind), eq);
        Node::make_binary(term.clone(), operator, expr)
    }

    /// Parses a full expression, then settles the parenthesis account.
    pub(super) fn parse_expr(&mut self, expected_final: &[TokenKind]) -> ParseResult<Node> {
        if expected_final.contains(&self.peek(1).kind) {
            if let Some(node) = self.parse_leaf() {
                return Ok(node);
            }
        }
        let result = self.parse_bin_expr(-1)?;
        if self.parens > 0 {
            let token = self.peek(0).clone();
            self.registry
                .register(token.line, token.column, DiagnosticKind::MismatchParensLess);
            self.parens = 0;
        }
        match result {
            Some(node) => Ok(node),
            None => {
                let token = self.peek(0).clone();
                self.registry.register(
                    token.line,
                    token.column,
                    DiagnosticKind::MismatchToken {
                        expected: "expression".to_string(),
                        got: format!("{:?}", token.kind),
                    },
                );
                Err(Halt)
            }
        }
    }

    fn parse_bin_expr(&mut self, min_prec: i32) -> ParseResult<Option<Node>> {
        let mut left = if self.peek(0).kind == TokenKind::OpenParen {
            self.parens += 1;
            self.consume();
            let inner = self.parse_bin_expr(-1)?;
            if self.peek(0).kind == TokenKind::ClosedParen {
                self.consume();
                self.parens -= 1;
            }
            inner
        } else {
            self.parse_leaf()
        };

        loop {
            match self.parse_increasing_precedence(left, min_prec)? {
                Climb::Done(node) => return Ok(node),
                Climb::Grew(node) => left = Some(node),
            }
        }
    }

    fn parse_increasing_precedence(
        &mut self,
        left: Option<Node>,
        min_prec: i32,
    ) -> ParseResult<Climb> {
        let next = self.peek(0).clone();
        if !self.is_binop(next.kind) {
            return Ok(Climb::Done(left));
        }

        if next.kind == TokenKind::OpenParen {
            // a call: `term(params...)`
            self.consume();
            let params = self.parse_call_parameters()?;
            if self.peek(0).kind == TokenKind::ClosedParen {
                self.consume();
            } else {
                let token = self.peek(0).clone();
                self.registry
                    .register(token.line, token.column, DiagnosticKind::MismatchParensLess);
            }
            let Some(left) = left else {
                return Err(Halt);
            };
            let operator = Node::with_token(NodeKind::Call, next);
            return Ok(Climb::Grew(Node::make_binary(left, operator, params)));
        }

        let next_prec = self.precedence(next.kind);
        if next_prec <= min_prec {
            return Ok(Climb::Done(left));
        }
        self.consume();
        let right = self.parse_bin_expr(next_prec)?;
        let Some(right) = right else {
            self.registry.register(
                next.line,
                next.column,
                DiagnosticKind::MismatchToken {
                    expected: "expression".to_string(),
                    got: format!("{:?}", self.peek(0).kind),
                },
            );
            return Err(Halt);
        };
        let operator = Node::with_token(self.operator_kind(next.kind), next);
        match left {
            None => Ok(Climb::Grew(Node::make_unary(operator, right))),
            Some(left) => Ok(Climb::Grew(Node::make_binary(left, operator, right))),
        }
    }

    /// An identifier or a number, wrapped in a term node.
    pub(super) fn parse_leaf(&mut self) -> Option<Node> {
        let token = self.peek(0).clone();
        if !matches!(token.kind, TokenKind::Ident | TokenKind::Number) {
            return None;
        }
        self.consume();
        let kind = if token.kind == TokenKind::Number {
            NodeKind::Value
        } else {
            NodeKind::Ident
        };
        Some(Node::with_children(
            NodeKind::Term,
            vec![Node::leaf(
                kind,
                token.content.clone().unwrap_or_default(),
                token,
            )],
        ))
    }

    // comma-separated call arguments; keyword arguments (`name = expr`) must
    // follow every positional one
    fn parse_call_parameters(&mut self) -> ParseResult<Node> {
        let mut params = Node::new(NodeKind::Params);
        let mut seen_keyword = false;
        loop {
            let Some(next_node) = self.parse_expression()? else {
                break;
            };
            if next_node.kind == NodeKind::Stmt {
                if next_node
                    .children
                    .first()
                    .is_some_and(|t| t.children.len() > 1)
                {
                    let token = self.peek(0).clone();
                    self.registry.register(
                        token.line,
                        token.column,
                        DiagnosticKind::IllegalDeclaration {
                            reason: "cannot use type definitions when reciting arguments"
                                .to_string(),
                        },
                    );
                }
                seen_keyword = true;
            } else if seen_keyword {
                let token = self.peek(0).clone();
                self.registry.register(
                    token.line,
                    token.column,
                    DiagnosticKind::CallableArgumentError,
                );
            }
            params.children.push(next_node);
            if self.peek(0).kind == TokenKind::Comma {
                self.consume();
            }
        }
        Ok(params)
    }

    // optional `: TypeName` on a declaration target
    fn parse_type_definition(&mut self) -> Node {
        let token = self.peek(0).clone();
        if token.kind != TokenKind::Ident {
            self.registry.register(
                token.line,
                token.column,
                DiagnosticKind::MissingToken {
                    missing: "ident".to_string(),
                    stmt_type: "type definition".to_string(),
                },
            );
            return Node::new(NodeKind::Term);
        }
        self.consume();
        Node::with_children(
            NodeKind::Term,
            vec![Node::leaf(
                NodeKind::Ident,
                token.content.clone().unwrap_or_default(),
                token,
            )],
        )
    }

    pub(super) fn is_assignment(&self, kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Eq
                | TokenKind::EqPlus
                | TokenKind::EqMinus
                | TokenKind::EqMul
                | TokenKind::EqPov
                | TokenKind::EqDiv
                | TokenKind::EqDivFloor
                | TokenKind::EqRemain
                | TokenKind::EqBitAnd
                | TokenKind::EqBitOr
                | TokenKind::EqBitXor
                | TokenKind::EqShl
                | TokenKind::EqShr
        )
    }

    fn is_binop(&self, kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Mul
                | TokenKind::Pov
                | TokenKind::Div
                | TokenKind::DivFloor
                | TokenKind::Remain
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Equals
                | TokenKind::NotEquals
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Gt
                | TokenKind::Gte
                | TokenKind::BitAnd
                | TokenKind::BitOr
                | TokenKind::BitXor
                | TokenKind::BitNot
                | TokenKind::Shl
                | TokenKind::Shr
                | TokenKind::OpenParen
        )
    }

    fn precedence(&self, kind: TokenKind) -> i32 {
        match kind {
            TokenKind::Or => 1,
            TokenKind::And => 2,
            TokenKind::Not => 3,
            TokenKind::Equals
            | TokenKind::NotEquals
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::Lt
            | TokenKind::Lte => 4,
            TokenKind::BitOr => 5,
            TokenKind::BitXor => 6,
            TokenKind::BitAnd => 7,
            TokenKind::Shl | TokenKind::Shr => 8,
            TokenKind::Plus | TokenKind::Minus => 9,
            TokenKind::Mul | TokenKind::Div | TokenKind::DivFloor | TokenKind::Remain => 10,
            TokenKind::BitNot => 11,
            TokenKind::Pov => 12,
            TokenKind::OpenParen => 13,
            _ => -1,
        }
    }

    fn operator_kind(&self, kind: TokenKind) -> NodeKind {
        match kind {
            TokenKind::Plus => NodeKind::Plus,
            TokenKind::Minus => NodeKind::Minus,
            TokenKind::Mul => NodeKind::Multi,
            TokenKind::Pov => NodeKind::Pov,
            TokenKind::Div => NodeKind::Div,
            TokenKind::DivFloor => NodeKind::DivFloor,
            TokenKind::Remain => NodeKind::Remain,
            TokenKind::And => NodeKind::And,
            TokenKind::Or => NodeKind::Or,
            TokenKind::Not => NodeKind::Not,
            TokenKind::Equals => NodeKind::Eq,
            TokenKind::NotEquals => NodeKind::Neq,
            TokenKind::Lt => NodeKind::Lt,
            TokenKind::Lte => NodeKind::Lte,
            TokenKind::Gt => NodeKind::Gt,
            TokenKind::Gte => NodeKind::Gte,
            TokenKind::BitAnd => NodeKind::BitAnd,
            TokenKind::BitOr => NodeKind::BitOr,
            TokenKind::BitXor => NodeKind::BitXor,
            TokenKind::BitNot => NodeKind::BitNot,
            TokenKind::Shl => NodeKind::BitShl,
            TokenKind::Shr => NodeKind::BitShr,
            TokenKind::OpenParen => NodeKind::Call,
            // only reachable through is_binop, which excludes everything else
            _ => NodeKind::Term,
        }
    }

    fn compound_operator(&self, kind: TokenKind) -> NodeKind {
        match kind {
            TokenKind::EqPlus => NodeKind::Plus,
            TokenKind::EqMinus => NodeKind::Minus,
            TokenKind::EqMul => NodeKind::Multi,
            TokenKind::EqPov => NodeKind::Pov,
            TokenKind::EqDiv => NodeKind::Div,
            TokenKind::EqDivFloor => NodeKind::DivFloor,
            TokenKind::EqRemain => NodeKind::Remain,
            TokenKind::EqBitAnd => NodeKind::BitAnd,
            TokenKind::EqBitOr => NodeKind::BitOr,
            TokenKind::EqBitXor => NodeKind::BitXor,
            TokenKind::EqShl => NodeKind::BitShl,
            TokenKind::EqShr => NodeKind::BitShr,
            _ => NodeKind::Term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticRegistry;
    use crate::lexer;

    fn parse_statement(code: &str) -> (Node, DiagnosticRegistry) {
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        let ast = Parser::new(tokens, &mut registry).parse();
        let stmt = ast.children[0].children[0].clone();
        (stmt, registry)
    }

    fn rhs(code: &str) -> Node {
        let (stmt, registry) = parse_statement(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        stmt.children[1].clone()
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        let expr = rhs("x = 1 + 2 * 3\n");
        // (1 + (2 * 3))
        assert_eq!(expr.kind, NodeKind::BinExpr);
        assert_eq!(expr.children[1].kind, NodeKind::Plus);
        let right = &expr.children[2];
        assert_eq!(right.kind, NodeKind::BinExpr);
        assert_eq!(right.children[1].kind, NodeKind::Multi);
    }

    #[test]
    fn test_same_precedence_is_left_associative() {
        let expr = rhs("x = 1 - 2 - 3\n");
        // ((1 - 2) - 3)
        let left = &expr.children[0];
        assert_eq!(left.kind, NodeKind::BinExpr);
        assert_eq!(left.children[1].kind, NodeKind::Minus);
        assert_eq!(expr.children[2].children[0].value.as_deref(), Some("3"));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = rhs("x = 2 * (3 + 4)\n");
        assert_eq!(expr.children[1].kind, NodeKind::Multi);
        let grouped = &expr.children[2];
        assert_eq!(grouped.kind, NodeKind::BinExpr);
        assert_eq!(grouped.children[1].kind, NodeKind::Plus);
    }

    #[test]
    fn test_operator_after_group_binds_at_group_level() {
        let expr = rhs("x = 2 * (3 + 4) + 5\n");
        // ((2 * (3 + 4)) + 5)
        assert_eq!(expr.children[1].kind, NodeKind::Plus);
        let left = &expr.children[0];
        assert_eq!(left.children[1].kind, NodeKind::Multi);
    }

    #[test]
    fn test_comparison_below_arithmetic() {
        let expr = rhs("x = 1 + 2 == 3\n");
        assert_eq!(expr.children[1].kind, NodeKind::Eq);
        assert_eq!(expr.children[0].children[1].kind, NodeKind::Plus);
    }

    #[test]
    fn test_logical_operators_bind_loosest() {
        let expr = rhs("x = 1 == 1 and 2 == 2\n");
        assert_eq!(expr.children[1].kind, NodeKind::And);
        assert_eq!(expr.children[0].children[1].kind, NodeKind::Eq);
        assert_eq!(expr.children[2].children[1].kind, NodeKind::Eq);
    }

    #[test]
    fn test_unary_not() {
        let expr = rhs("x = not 1\n");
        assert_eq!(expr.kind, NodeKind::BinExpr);
        assert_eq!(expr.children.len(), 2);
        assert_eq!(expr.children[0].kind, NodeKind::Not);
        assert_eq!(expr.children[1].kind, NodeKind::Term);
    }

    #[test]
    fn test_unary_bitwise_not() {
        let expr = rhs("x = ~5\n");
        assert_eq!(expr.children.len(), 2);
        assert_eq!(expr.children[0].kind, NodeKind::BitNot);
    }

    #[test]
    fn test_power_binds_tightest() {
        let expr = rhs("x = 2 * 3 ** 4\n");
        assert_eq!(expr.children[1].kind, NodeKind::Multi);
        assert_eq!(expr.children[2].children[1].kind, NodeKind::Pov);
    }

    #[test]
    fn test_call_with_positional_arguments() {
        let expr = rhs("p = Point(3, 4)\n");
        assert_eq!(expr.kind, NodeKind::BinExpr);
        assert_eq!(expr.children[1].kind, NodeKind::Call);
        let params = &expr.children[2];
        assert_eq!(params.kind, NodeKind::Params);
        assert_eq!(params.children.len(), 2);
        assert_eq!(params.children[0].kind, NodeKind::Term);
    }

    #[test]
    fn test_call_with_keyword_arguments() {
        let expr = rhs("p = Point(x = 3, y = 4)\n");
        let params = &expr.children[2];
        assert_eq!(params.children.len(), 2);
        assert_eq!(params.children[0].kind, NodeKind::Stmt);
        assert_eq!(params.children[1].kind, NodeKind::Stmt);
    }

    #[test]
    fn test_positional_after_keyword_is_reported() {
        let code = "p = Point(x = 3, 4)\n";
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        Parser::new(tokens, &mut registry).parse();
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("Cannot mix positional and keyword arguments")
        );
    }

    #[test]
    fn test_unclosed_paren_is_reported() {
        let code = "x = (1 + 2\n";
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        Parser::new(tokens, &mut registry).parse();
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("Some parentheses are not closed")
        );
    }

    #[test]
    fn test_extra_paren_is_reported() {
        let code = "x = 1 + 2)\n";
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        Parser::new(tokens, &mut registry).parse();
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("Closing non-existing parentheses")
        );
    }

    #[test]
    fn test_typed_declaration() {
        let (stmt, registry) = parse_statement("x: Foo = Foo(1)\n");
        assert!(!registry.is_blocking(), "{}", registry.display());
        assert_eq!(stmt.kind, NodeKind::Stmt);
        let term = &stmt.children[0];
        // ident leaf plus the type annotation term
        assert_eq!(term.children.len(), 2);
        assert_eq!(term.children[1].children[0].value.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_nested_parens() {
        let expr = rhs("x = ((1 + 2))\n");
        assert_eq!(expr.kind, NodeKind::BinExpr);
        assert_eq!(expr.children[1].kind, NodeKind::Plus);
    }
}
