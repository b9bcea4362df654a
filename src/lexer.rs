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

use std::fmt;

use crate::diagnostics::{DiagnosticKind, DiagnosticRegistry};

pub const INDENT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    // assignment family
    Eq,
    EqPlus,
    EqMinus,
    EqMul,
    EqPov,
    EqDiv,
    EqDivFloor,
    EqRemain,
    EqBitAnd,
    EqBitOr,
    EqBitXor,
    EqShl,
    EqShr,
    // arithmetic
    Plus,
    Minus,
    Mul,
    Pov,
    Div,
    DivFloor,
    Remain,
    // bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    // comparison
    Equals,
    NotEquals,
    Lt,
    Lte,
    Gt,
    Gte,
    // logical keywords
    And,
    Or,
    Not,
    // punctuation
    Comma,
    Colon,
    OpenParen,
    ClosedParen,
    // control keywords
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Class,
    // structural
    Indent,
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub content: Option<String>,
}

impl Token {
    fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Token {
            kind,
            line,
            column,
            content: None,
        }
    }

    fn with_content(kind: TokenKind, line: usize, column: usize, content: String) -> Self {
        Token {
            kind,
            line,
            column,
            content: Some(content),
        }
    }

    /// The source lexeme this token stands for; identifiers and numbers
    /// carry their own text.
    pub fn spelling(&self) -> &str {
        match self.kind {
            TokenKind::Ident | TokenKind::Number => self.content.as_deref().unwrap_or(""),
            TokenKind::Eq => "=",
            TokenKind::EqPlus => "+=",
            TokenKind::EqMinus => "-=",
            TokenKind::EqMul => "*=",
            TokenKind::EqPov => "**=",
            TokenKind::EqDiv => "/=",
            TokenKind::EqDivFloor => "//=",
            TokenKind::EqRemain => "%=",
            TokenKind::EqBitAnd => "&=",
            TokenKind::EqBitOr => "|=",
            TokenKind::EqBitXor => "^=",
            TokenKind::EqShl => "<<=",
            TokenKind::EqShr => ">>=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Mul => "*",
            TokenKind::Pov => "**",
            TokenKind::Div => "/",
            TokenKind::DivFloor => "//",
            TokenKind::Remain => "%",
            TokenKind::BitAnd => "&",
            TokenKind::BitOr => "|",
            TokenKind::BitXor => "^",
            TokenKind::BitNot => "~",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Equals => "==",
            TokenKind::NotEquals => "!=",
            TokenKind::Lt => "<",
            TokenKind::Lte => "<=",
            TokenKind::Gt => ">",
            TokenKind::Gte => ">=",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::OpenParen => "(",
            TokenKind::ClosedParen => ")",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Class => "class",
            TokenKind::Indent => "    ",
            TokenKind::Newline => "\n",
            TokenKind::Eof => "",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}:{} [{}]",
            self.kind,
            self.line,
            self.column,
            self.content.as_deref().unwrap_or("")
        )
    }
}

/// Character-level scanner. Dispatches on the lead character of every lexeme
/// and uses one-character lookahead for the compound operator forms. Leading
/// runs of spaces after a newline become one INDENT token per full block of
/// four; end of input always yields a final NEWLINE followed by EOF.
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(code: &str) -> Self {
        Lexer {
            chars: code.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self, registry: &mut DiagnosticRegistry) -> Vec<Token> {
        loop {
            self.trim_whitespace();
            let Some(current) = self.peek(0) else { break };
            match current {
                c if c.is_alphabetic() || c == '_' => self.lex_word(),
                c if c.is_ascii_digit() => self.lex_number(registry),
                '=' => self.lex_compound('=', TokenKind::Eq, TokenKind::Equals),
                '+' => self.lex_compound('=', TokenKind::Plus, TokenKind::EqPlus),
                '-' => self.lex_compound('=', TokenKind::Minus, TokenKind::EqMinus),
                '*' => self.lex_star(),
                '/' => self.lex_slash(),
                '%' => self.lex_compound('=', TokenKind::Remain, TokenKind::EqRemain),
                '&' => self.lex_compound('=', TokenKind::BitAnd, TokenKind::EqBitAnd),
                '|' => self.lex_compound('=', TokenKind::BitOr, TokenKind::EqBitOr),
                '^' => self.lex_compound('=', TokenKind::BitXor, TokenKind::EqBitXor),
                '~' => self.lex_single(TokenKind::BitNot),
                '<' => self.lex_angle('<', TokenKind::Lt, TokenKind::Lte, TokenKind::Shl, TokenKind::EqShl),
                '>' => self.lex_angle('>', TokenKind::Gt, TokenKind::Gte, TokenKind::Shr, TokenKind::EqShr),
                '!' => self.lex_bang(registry),
                ',' => self.lex_single(TokenKind::Comma),
                ':' => self.lex_single(TokenKind::Colon),
                '(' => self.lex_single(TokenKind::OpenParen),
                ')' => self.lex_single(TokenKind::ClosedParen),
                other => {
                    registry.register(
                        self.line,
                        self.column,
                        DiagnosticKind::UnknownToken {
                            token: other.to_string(),
                        },
                    );
                    self.advance();
                }
            }
        }
        self.tokens
            .push(Token::new(TokenKind::Newline, self.line, self.column));
        self.tokens
            .push(Token::new(TokenKind::Eof, self.line, self.column));
        self.tokens
    }

    fn lex_word(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut buffer = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_alphanumeric() || c == '_' {
                buffer.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match buffer.as_str() {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "class" => TokenKind::Class,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => {
                self.tokens
                    .push(Token::with_content(TokenKind::Ident, line, column, buffer));
                return;
            }
        };
        self.tokens.push(Token::new(kind, line, column));
    }

    fn lex_number(&mut self, registry: &mut DiagnosticRegistry) {
        let (line, column) = (self.line, self.column);
        let mut buffer = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() {
                buffer.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if let Some(c) = self.peek(0) {
            if c.is_alphabetic() || c == '_' {
                registry.register(line, column, DiagnosticKind::IllegalVariableName);
            }
        }
        self.tokens
            .push(Token::with_content(TokenKind::Number, line, column, buffer));
    }

    fn lex_single(&mut self, kind: TokenKind) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.tokens.push(Token::new(kind, line, column));
    }

    fn lex_compound(&mut self, follow: char, plain: TokenKind, combined: TokenKind) {
        let (line, column) = (self.line, self.column);
        self.advance();
        if self.peek(0) == Some(follow) {
            self.advance();
            self.tokens.push(Token::new(combined, line, column));
        } else {
            self.tokens.push(Token::new(plain, line, column));
        }
    }

    // `*`, `**`, `*=`, `**=`
    fn lex_star(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let is_pov = self.peek(0) == Some('*');
        if is_pov {
            self.advance();
        }
        let kind = if self.peek(0) == Some('=') {
            self.advance();
            if is_pov { TokenKind::EqPov } else { TokenKind::EqMul }
        } else if is_pov {
            TokenKind::Pov
        } else {
            TokenKind::Mul
        };
        self.tokens.push(Token::new(kind, line, column));
    }

    // `/`, `//`, `/=`, `//=`
    fn lex_slash(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let is_floor = self.peek(0) == Some('/');
        if is_floor {
            self.advance();
        }
        let kind = if self.peek(0) == Some('=') {
            self.advance();
            if is_floor { TokenKind::EqDivFloor } else { TokenKind::EqDiv }
        } else if is_floor {
            TokenKind::DivFloor
        } else {
            TokenKind::Div
        };
        self.tokens.push(Token::new(kind, line, column));
    }

    // `<` resolves to `<`, `<=`, `<<` or `<<=` by maximal munch (and the
    // mirrored set for `>`)
    fn lex_angle(
        &mut self,
        repeat: char,
        plain: TokenKind,
        or_equal: TokenKind,
        shift: TokenKind,
        shift_assign: TokenKind,
    ) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let kind = match self.peek(0) {
            Some(c) if c == repeat => {
                self.advance();
                if self.peek(0) == Some('=') {
                    self.advance();
                    shift_assign
                } else {
                    shift
                }
            }
            Some('=') => {
                self.advance();
                or_equal
            }
            _ => plain,
        };
        self.tokens.push(Token::new(kind, line, column));
    }

    fn lex_bang(&mut self, registry: &mut DiagnosticRegistry) {
        let (line, column) = (self.line, self.column);
        self.advance();
        if self.peek(0) == Some('=') {
            self.advance();
            self.tokens
                .push(Token::new(TokenKind::NotEquals, line, column));
        } else {
            registry.register(
                line,
                column,
                DiagnosticKind::UnknownToken {
                    token: "!".to_string(),
                },
            );
        }
    }

    fn trim_whitespace(&mut self) {
        loop {
            if self.at_line_start {
                let (line, start_column) = (self.line, self.column);
                let mut spaces = 0;
                while self.peek(0) == Some(' ') {
                    self.advance();
                    spaces += 1;
                }
                self.at_line_start = false;
                // indentation on blank lines carries no scope information
                if !matches!(self.peek(0), Some('\n') | None) {
                    for block in 0..spaces / INDENT_WIDTH {
                        self.tokens.push(Token::new(
                            TokenKind::Indent,
                            line,
                            start_column + block * INDENT_WIDTH,
                        ));
                    }
                }
                continue;
            }
            match self.peek(0) {
                Some('\n') => {
                    self.tokens
                        .push(Token::new(TokenKind::Newline, self.line, self.column));
                    self.index += 1;
                    self.line += 1;
                    self.column = 1;
                    self.at_line_start = true;
                }
                Some(' ') | Some('\t') | Some('\r') => self.advance(),
                _ => break,
            }
        }
    }

    fn peek(&self, distance: usize) -> Option<char> {
        self.chars.get(self.index + distance).copied()
    }

    fn advance(&mut self) {
        self.index += 1;
        self.column += 1;
    }
}

/// Convenience entry point used by the pipeline and the tests.
pub fn tokenize(code: &str, registry: &mut DiagnosticRegistry) -> Vec<Token> {
    Lexer::new(code).tokenize(registry)
}
