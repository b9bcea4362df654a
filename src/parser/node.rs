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

use crate::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Prog,
    Scope,
    Params,
    Stmt,
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Class,
    Expr,
    BinExpr,
    Term,
    Ident,
    Value,
    // operator leaves
    Plus,
    Minus,
    Multi,
    Pov,
    Div,
    DivFloor,
    Remain,
    And,
    Or,
    Not,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    BitShl,
    BitShr,
    Call,
}

/// AST node. Built bottom-up by the parser, consumed by the IR builder.
///
/// Shape invariants:
/// - a `BinExpr` holds `[operand, operator, operand]` or `[operator, operand]`
/// - a `Stmt` holds `[target_term, expression]` (or `[target_term]` for a
///   bare typed declaration)
/// - an `If` holds the condition, the body scope, then any elif/else nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
    pub value: Option<String>,
    pub token: Option<Token>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            children: Vec::new(),
            value: None,
            token: None,
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Node {
            kind,
            children,
            value: None,
            token: None,
        }
    }

    pub fn with_token(kind: NodeKind, token: Token) -> Self {
        Node {
            kind,
            children: Vec::new(),
            value: None,
            token: Some(token),
        }
    }

    pub fn leaf(kind: NodeKind, value: String, token: Token) -> Self {
        Node {
            kind,
            children: Vec::new(),
            value: Some(value),
            token: Some(token),
        }
    }

    pub fn make_binary(left: Node, operator: Node, right: Node) -> Self {
        Node::with_children(NodeKind::BinExpr, vec![left, operator, right])
    }

    pub fn make_unary(operator: Node, operand: Node) -> Self {
        Node::with_children(NodeKind::BinExpr, vec![operator, operand])
    }

    /// Indented tree dump, used by the tests and `--emit-ir` style debugging.
    pub fn pprint(&self, depth: usize) -> String {
        let pad = " ".repeat(depth * 4);
        let mut data = match &self.value {
            Some(value) => format!("{}{:?}: {} {{", pad, self.kind, value),
            None => format!("{}{:?} {{", pad, self.kind),
        };
        if self.children.is_empty() {
            data.push_str("}\n");
            return data;
        }
        data.push('\n');
        for child in &self.children {
            data.push_str(&child.pprint(depth + 1));
        }
        data.push_str(&pad);
        data.push_str("}\n");
        data
    }
}
