/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

//! Ember Source Parser — Recursive Descent
//!
//! Turns module source text into the `Program` AST from `ast.rs`. Statements
//! are not newline-terminated; an optional `;` may separate them.

use crate::ast::{BinaryOp, Expression, FunctionDef, Program, Statement, StatementKind, UnaryOp};
use thiserror::Error;

// ─── Error Types ─────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Syntax Error at {file}:{line}:{col}: {message}")]
    Syntax {
        message: String,
        line: u32,
        col: u32,
        file: String,
    },
    #[error("Unexpected token: expected {expected}, found {found} at {file}:{line}:{col}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: u32,
        col: u32,
        file: String,
    },
    #[error("Unexpected end of file in {file}")]
    UnexpectedEof { file: String },
}

impl ParseError {
    fn syntax(msg: impl Into<String>, tok: &Token, file: &str) -> Self {
        ParseError::Syntax {
            message: msg.into(),
            line: tok.line,
            col: tok.col,
            file: file.to_string(),
        }
    }

    fn unexpected(expected: impl Into<String>, tok: &Token, file: &str) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: format!("{:?}", tok.kind),
            line: tok.line,
            col: tok.col,
            file: file.to_string(),
        }
    }
}

// ─── Token Types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    StringLit(String),
    Identifier(String),

    // Keywords
    Let,
    Func,
    If,
    Else,
    While,
    Return,
    Import,
    As,
    Raise,
    True,
    False,
    Nil,
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign, // :=
    Eq,     // ==
    Neq,    // !=
    Lt,
    Gt,
    Le,     // <=
    Ge,     // >=
    AndAnd, // &&
    OrOr,   // ||

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semicolon,

    // Special
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

impl Token {
    fn new(kind: TokenKind, line: u32, col: u32) -> Self {
        Token { kind, line, col }
    }
}

// ─── Lexer ───────────────────────────────────────────────────────────────────

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    file: String,
}

impl Lexer {
    pub fn new(source: &str, file: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            file: file.to_string(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.pos >= self.source.len() {
                tokens.push(Token::new(TokenKind::Eof, self.line, self.col));
                break;
            }
            let tok = self.next_token()?;
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn eof(&self) -> ParseError {
        ParseError::UnexpectedEof {
            file: self.file.clone(),
        }
    }

    fn error_at(&self, message: impl Into<String>, line: u32, col: u32) -> ParseError {
        ParseError::Syntax {
            message: message.into(),
            line,
            col,
            file: self.file.clone(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            while let Some(ch) = self.peek() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            // Line comments
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('/') {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            // Block comments /* ... */ (nesting)
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('*') {
                self.advance();
                self.advance();
                let mut depth = 1;
                while depth > 0 {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            depth -= 1;
                        }
                        Some('/') if self.peek() == Some('*') => {
                            self.advance();
                            depth += 1;
                        }
                        None => return Err(self.eof()),
                        _ => {}
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let start_line = self.line;
        let start_col = self.col;

        let ch = self.peek().ok_or_else(|| self.eof())?;

        if ch == '"' {
            self.advance(); // opening "
            let mut s = String::new();
            loop {
                match self.advance() {
                    Some('\\') => match self.advance() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('\\') => s.push('\\'),
                        Some('"') => s.push('"'),
                        Some(c) => {
                            s.push('\\');
                            s.push(c);
                        }
                        None => return Err(self.eof()),
                    },
                    Some('"') => break,
                    Some(c) => s.push(c),
                    None => return Err(self.eof()),
                }
            }
            return Ok(Token::new(TokenKind::StringLit(s), start_line, start_col));
        }

        if ch.is_ascii_digit() {
            let mut num = String::new();
            let mut is_float = false;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    num.push(c);
                    self.advance();
                } else if c == '.' && self.peek_ahead(1).is_some_and(|n| n.is_ascii_digit()) {
                    is_float = true;
                    num.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            let kind = if is_float {
                num.parse::<f64>().map(TokenKind::Float).map_err(|_| {
                    self.error_at(format!("Invalid float literal '{}'", num), start_line, start_col)
                })?
            } else {
                num.parse::<i64>().map(TokenKind::Integer).map_err(|_| {
                    self.error_at(
                        format!("Integer literal '{}' out of range", num),
                        start_line,
                        start_col,
                    )
                })?
            };
            return Ok(Token::new(kind, start_line, start_col));
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            let kind = match ident.as_str() {
                "let" => TokenKind::Let,
                "func" => TokenKind::Func,
                "if" => TokenKind::If,
                "else" => TokenKind::Else,
                "while" => TokenKind::While,
                "return" => TokenKind::Return,
                "import" => TokenKind::Import,
                "as" => TokenKind::As,
                "raise" => TokenKind::Raise,
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "nil" => TokenKind::Nil,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                _ => TokenKind::Identifier(ident),
            };
            return Ok(Token::new(kind, start_line, start_col));
        }

        // Operators and delimiters
        self.advance();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Neq
                } else {
                    TokenKind::Bang
                }
            }
            ':' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Assign
                } else {
                    return Err(self.error_at("Unexpected ':'. Did you mean ':='?", start_line, start_col));
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    return Err(self.error_at(
                        "Unexpected '='. Did you mean ':=' for assignment or '==' for comparison?",
                        start_line,
                        start_col,
                    ));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::AndAnd
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::OrOr
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            _ => {
                return Err(self.error_at(
                    format!("Unexpected character: '{}'", ch),
                    start_line,
                    start_col,
                ));
            }
        };

        Ok(Token::new(kind, start_line, start_col))
    }
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Deepest expression recursion (parentheses, call arguments, unary
/// operators) accepted before the source is rejected.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Deepest nesting of blocks, `else if` arms included.
pub const MAX_BLOCK_DEPTH: usize = 100;

/// Deepest expression tree accepted, including left-associative chains.
pub const MAX_EXPRESSION_DEPTH: usize = 1000;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
    depth: usize,
    blocks: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            file: file.to_string(),
            depth: 0,
            blocks: 0,
        }
    }

    fn peek(&self) -> Token {
        self.tokens
            .get(self.pos)
            .cloned()
            .unwrap_or(Token::new(TokenKind::Eof, 0, 0))
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<Token, ParseError> {
        let tok = self.peek();
        if std::mem::discriminant(&tok.kind) == std::mem::discriminant(expected) {
            self.advance();
            Ok(tok)
        } else if tok.kind == TokenKind::Eof {
            Err(ParseError::UnexpectedEof {
                file: self.file.clone(),
            })
        } else {
            Err(ParseError::unexpected(
                format!("{:?}", expected),
                &tok,
                &self.file,
            ))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_tok(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn too_deep(&self, message: &str) -> ParseError {
        ParseError::syntax(message, &self.peek(), &self.file)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.too_deep("Expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn enter_block(&mut self) -> Result<(), ParseError> {
        if self.blocks >= MAX_BLOCK_DEPTH {
            return Err(self.too_deep("Blocks nested too deeply"));
        }
        self.blocks += 1;
        Ok(())
    }

    fn leave_block(&mut self) {
        self.blocks = self.blocks.saturating_sub(1);
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        let tok = self.peek();
        match &tok.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected(what, &tok, &self.file)),
        }
    }

    // ─── Top-Level ───────────────────────────────────────────────────────

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.at_end() {
            if self.match_tok(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    // ─── Statements ──────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        let kind = match self.peek().kind {
            TokenKind::Let => self.parse_let()?,
            TokenKind::Func => StatementKind::Function(self.parse_function_def()?),
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Import => self.parse_import()?,
            TokenKind::Raise => {
                self.advance();
                StatementKind::Raise(self.parse_expression()?)
            }
            _ => self.parse_expr_or_assign()?,
        };
        self.match_tok(&TokenKind::Semicolon);
        Ok(Statement { line, kind })
    }

    fn parse_let(&mut self) -> Result<StatementKind, ParseError> {
        self.expect(&TokenKind::Let)?;
        let name = self.expect_identifier("variable name")?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        Ok(StatementKind::Let { name, value })
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, ParseError> {
        self.expect(&TokenKind::Func)?;
        let name = self.expect_identifier("function name")?;

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let tok = self.peek();
                let param = self.expect_identifier("parameter name")?;
                if params.contains(&param) {
                    return Err(ParseError::syntax(
                        format!("Duplicate parameter '{}'", param),
                        &tok,
                        &self.file,
                    ));
                }
                params.push(param);
                if !self.match_tok(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(FunctionDef { name, params, body })
    }

    fn parse_if(&mut self) -> Result<StatementKind, ParseError> {
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let else_block = if self.match_tok(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                // else if → nested if as single-element block
                let line = self.peek().line;
                self.enter_block()?;
                let nested = self.parse_if()?;
                self.leave_block();
                Some(vec![Statement { line, kind: nested }])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(StatementKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_while(&mut self) -> Result<StatementKind, ParseError> {
        self.expect(&TokenKind::While)?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(StatementKind::While { condition, body })
    }

    fn parse_return(&mut self) -> Result<StatementKind, ParseError> {
        let ret = self.expect(&TokenKind::Return)?;
        // Bare `return` when the value would start on a later line
        let next = self.peek();
        if matches!(
            next.kind,
            TokenKind::RBrace | TokenKind::Eof | TokenKind::Semicolon
        ) || next.line != ret.line
        {
            return Ok(StatementKind::Return(None));
        }
        Ok(StatementKind::Return(Some(self.parse_expression()?)))
    }

    fn parse_import(&mut self) -> Result<StatementKind, ParseError> {
        self.expect(&TokenKind::Import)?;
        let mut parts = vec![self.expect_identifier("module name")?];
        while self.match_tok(&TokenKind::Dot) {
            parts.push(self.expect_identifier("module name")?);
        }
        let alias = if self.match_tok(&TokenKind::As) {
            Some(self.expect_identifier("alias")?)
        } else {
            None
        };
        Ok(StatementKind::Import {
            name: parts.join("."),
            alias,
        })
    }

    fn parse_expr_or_assign(&mut self) -> Result<StatementKind, ParseError> {
        let start = self.peek();
        let expr = self.parse_expression()?;

        if !self.match_tok(&TokenKind::Assign) {
            return Ok(StatementKind::Expression(expr));
        }
        let value = self.parse_expression()?;
        match expr {
            Expression::Variable(name) => Ok(StatementKind::Let { name, value }),
            Expression::GetAttr { object, attr } => Ok(StatementKind::SetAttr {
                object: *object,
                attr,
                value,
            }),
            _ => Err(ParseError::syntax(
                "Invalid assignment target",
                &start,
                &self.file,
            )),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.enter_block()?;
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.match_tok(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        self.leave_block();
        Ok(stmts)
    }

    // ─── Expressions (Precedence Climbing) ───────────────────────────────
    //
    // Each rule returns the expression together with its tree depth so that
    // left-associative chains are bounded as well as parenthesised nesting.

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        Ok(self.parse_nested()?.0)
    }

    fn parse_nested(&mut self) -> Result<(Expression, usize), ParseError> {
        self.enter()?;
        let parsed = self.parse_logical_or()?;
        self.leave();
        Ok(parsed)
    }

    /// Depth of a node whose deepest child has depth `child`.
    fn deeper(&self, child: usize) -> Result<usize, ParseError> {
        if child >= MAX_EXPRESSION_DEPTH {
            return Err(self.too_deep("Expression nested too deeply"));
        }
        Ok(child + 1)
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: (Expression, usize),
        right: (Expression, usize),
    ) -> Result<(Expression, usize), ParseError> {
        let depth = self.deeper(left.1.max(right.1))?;
        let expr = Expression::Binary {
            op,
            left: Box::new(left.0),
            right: Box::new(right.0),
        };
        Ok((expr, depth))
    }

    // logical_or: logical_and (("||" | "or") logical_and)*
    fn parse_logical_or(&mut self) -> Result<(Expression, usize), ParseError> {
        let mut left = self.parse_logical_and()?;
        while matches!(self.peek().kind, TokenKind::OrOr | TokenKind::Or) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    // logical_and: comparison (("&&" | "and") comparison)*
    fn parse_logical_and(&mut self) -> Result<(Expression, usize), ParseError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek().kind, TokenKind::AndAnd | TokenKind::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    // comparison: sum (("<" | ">" | "<=" | ">=" | "==" | "!=") sum)*
    fn parse_comparison(&mut self) -> Result<(Expression, usize), ParseError> {
        let mut left = self.parse_sum()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_sum()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    // sum: product (("+" | "-") product)*
    fn parse_sum(&mut self) -> Result<(Expression, usize), ParseError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_product()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    // product: unary (("*" | "/" | "%") unary)*
    fn parse_product(&mut self) -> Result<(Expression, usize), ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    // unary: ("!" | "not" | "-") unary | postfix
    fn parse_unary(&mut self) -> Result<(Expression, usize), ParseError> {
        let op = match self.peek().kind {
            TokenKind::Bang | TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let (operand, depth) = self.parse_unary()?;
        self.leave();
        let expr = Expression::Unary {
            op,
            operand: Box::new(operand),
        };
        Ok((expr, self.deeper(depth)?))
    }

    // postfix: primary ("." IDENT | "(" args ")")*
    fn parse_postfix(&mut self) -> Result<(Expression, usize), ParseError> {
        let (mut expr, mut depth) = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect_identifier("attribute name")?;
                    depth = self.deeper(depth)?;
                    expr = Expression::GetAttr {
                        object: Box::new(expr),
                        attr,
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    let mut deepest = depth;
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            let (arg, arg_depth) = self.parse_nested()?;
                            deepest = deepest.max(arg_depth);
                            args.push(arg);
                            if !self.match_tok(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                    depth = self.deeper(deepest)?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok((expr, depth))
    }

    // primary: NUMBER | STRING | IDENTIFIER | true | false | nil | "(" expr ")"
    fn parse_primary(&mut self) -> Result<(Expression, usize), ParseError> {
        let tok = self.advance();
        let leaf = match tok.kind.clone() {
            TokenKind::Integer(n) => Expression::Integer(n),
            TokenKind::Float(f) => Expression::Float(f),
            TokenKind::StringLit(s) => Expression::Literal(s),
            TokenKind::Identifier(name) => Expression::Variable(name),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::Nil => Expression::Nil,
            TokenKind::LParen => {
                let inner = self.parse_nested()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Eof => {
                return Err(ParseError::UnexpectedEof {
                    file: self.file.clone(),
                })
            }
            other => {
                return Err(ParseError::syntax(
                    format!("Expected expression, found {:?}", other),
                    &tok,
                    &self.file,
                ))
            }
        };
        Ok((leaf, 1))
    }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse module source into a `Program`. `file` is only used in error messages.
pub fn parse_source(source: &str, file: &str) -> Result<Program, ParseError> {
    let mut lexer = Lexer::new(source, file);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens, file);
    parser.parse_program()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
