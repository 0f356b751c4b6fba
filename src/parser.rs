use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ast::{Block, Expression, Infix, Prefix, Program, Statement};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenKind, TokenStream};

pub type ParseResult<T> = Result<T, ParseError>;
pub type PrefixParseFn<T> = fn(&mut Parser<T>) -> ParseResult<Expression>;
pub type InfixParseFn<T> = fn(&mut Parser<T>, Expression) -> ParseResult<Expression>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Equals,      // ==
    LessGreater, // > or <
    Sum,         // +
    Product,     // *
    Prefix,      // -X or !X
    Call,        // myFunction(X)
}

const PRECEDENCES: &[(TokenKind, Precedence)] = &[
    (TokenKind::Eq, Precedence::Equals),
    (TokenKind::NotEq, Precedence::Equals),
    (TokenKind::Lt, Precedence::LessGreater),
    (TokenKind::Gt, Precedence::LessGreater),
    (TokenKind::Plus, Precedence::Sum),
    (TokenKind::Minus, Precedence::Sum),
    (TokenKind::Slash, Precedence::Product),
    (TokenKind::Asterisk, Precedence::Product),
    (TokenKind::LParen, Precedence::Call),
];

/// Deepest expression nesting the parser accepts. Keeps every tree shallow
/// enough to evaluate, render and drop recursively.
pub const MAX_NESTING_DEPTH: usize = 1024;

fn precedence_of(kind: TokenKind) -> Precedence {
    PRECEDENCES
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(Precedence::Lowest, |(_, p)| *p)
}

pub struct Parser<T: TokenStream = Lexer> {
    lexer: T,
    curr_token: Token,
    peek_token: Token,
    errors: Vec<ParseError>,
    depth: usize,
    // `{` tokens opened and not yet closed, counted up to `curr_token`.
    brace_depth: usize,

    prefix_parse_fns: HashMap<TokenKind, PrefixParseFn<T>>,
    infix_parse_fns: HashMap<TokenKind, InfixParseFn<T>>,
}

impl<T: TokenStream> Parser<T> {
    pub fn new(mut lexer: T) -> Self {
        let curr_token = lexer.next_token();
        let peek_token = lexer.next_token();

        let mut parser = Parser {
            lexer,
            curr_token,
            peek_token,
            errors: vec![],
            depth: 0,
            brace_depth: 0,
            prefix_parse_fns: HashMap::new(),
            infix_parse_fns: HashMap::new(),
        };
        parser.track_braces();

        parser.register_prefix(TokenKind::Ident, Self::parse_identifier);
        parser.register_prefix(TokenKind::Int, Self::parse_integer_literal);
        parser.register_prefix(TokenKind::True, Self::parse_boolean);
        parser.register_prefix(TokenKind::False, Self::parse_boolean);
        parser.register_prefix(TokenKind::Bang, |p| p.parse_prefix_expression(Prefix::Bang));
        parser.register_prefix(TokenKind::Minus, |p| p.parse_prefix_expression(Prefix::Minus));
        parser.register_prefix(TokenKind::LParen, Self::parse_grouped_expression);
        parser.register_prefix(TokenKind::If, Self::parse_if_expression);
        parser.register_prefix(TokenKind::Function, Self::parse_function_literal);

        parser.register_infix(TokenKind::Eq, |p, left| p.parse_infix_expression(Infix::Eq, left));
        parser.register_infix(TokenKind::NotEq, |p, left| {
            p.parse_infix_expression(Infix::NotEq, left)
        });
        parser.register_infix(TokenKind::Lt, |p, left| p.parse_infix_expression(Infix::Lt, left));
        parser.register_infix(TokenKind::Gt, |p, left| p.parse_infix_expression(Infix::Gt, left));
        parser.register_infix(TokenKind::Plus, |p, left| {
            p.parse_infix_expression(Infix::Plus, left)
        });
        parser.register_infix(TokenKind::Minus, |p, left| {
            p.parse_infix_expression(Infix::Minus, left)
        });
        parser.register_infix(TokenKind::Slash, |p, left| {
            p.parse_infix_expression(Infix::Slash, left)
        });
        parser.register_infix(TokenKind::Asterisk, |p, left| {
            p.parse_infix_expression(Infix::Asterisk, left)
        });
        parser.register_infix(TokenKind::LParen, Self::parse_call_expression);

        parser
    }

    pub fn register_prefix(&mut self, kind: TokenKind, func: PrefixParseFn<T>) {
        self.prefix_parse_fns.insert(kind, func);
    }

    pub fn register_infix(&mut self, kind: TokenKind, func: InfixParseFn<T>) {
        self.infix_parse_fns.insert(kind, func);
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.curr_token = std::mem::replace(&mut self.peek_token, next);
        self.track_braces();
    }

    fn track_braces(&mut self) {
        match self.curr_token.kind {
            TokenKind::LBrace => self.brace_depth += 1,
            TokenKind::RBrace => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
    }

    fn curr_token_is(&self, kind: TokenKind) -> bool {
        self.curr_token.is(kind)
    }

    fn peek_token_is(&self, kind: TokenKind) -> bool {
        self.peek_token.is(kind)
    }

    /// Advances only when the next token has the expected kind.
    fn expect_peek(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.peek_token_is(kind) {
            self.next_token();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: kind,
                found: self.peek_token.kind,
                literal: self.peek_token.literal.clone(),
                position: self.peek_token.position,
            })
        }
    }

    fn peek_precedence(&self) -> Precedence {
        precedence_of(self.peek_token.kind)
    }

    fn curr_precedence(&self) -> Precedence {
        precedence_of(self.curr_token.kind)
    }

    /// Parses the whole stream. Statements that fail to parse are left out of
    /// the program and their errors are available from [`Parser::errors`].
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.curr_token_is(TokenKind::Eof) {
            let brace_depth = self.brace_depth;

            match self.parse_statement() {
                Ok(statement) => program.statements.push(statement),
                Err(error) => {
                    debug!(position = %error.position(), %error, "skipping statement");
                    self.errors.push(error);
                    self.synchronize(brace_depth);
                }
            }

            self.next_token();
        }

        program
    }

    // Drop tokens up to the `;` or `}` that ends the broken statement at the
    // brace depth it started at, so nested block bodies go with it.
    fn synchronize(&mut self, brace_depth: usize) {
        while !self.curr_token_is(TokenKind::Eof) {
            if self.brace_depth <= brace_depth {
                if self.curr_token_is(TokenKind::Semicolon) {
                    return;
                }
                if self.curr_token_is(TokenKind::RBrace) && !self.expression_continues() {
                    if self.peek_token_is(TokenKind::Semicolon) {
                        self.next_token();
                    }
                    return;
                }
            }
            self.next_token();
        }
    }

    // After a closing `}`, an `else` or an operator means the statement goes on.
    fn expression_continues(&self) -> bool {
        self.peek_token_is(TokenKind::Else)
            || self.infix_parse_fns.contains_key(&self.peek_token.kind)
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        trace!(
            kind = %self.curr_token.kind,
            position = %self.curr_token.position,
            "parse_statement"
        );
        ensure_sufficient_stack(|| match self.curr_token.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        })
    }

    fn parse_let_statement(&mut self) -> ParseResult<Statement> {
        self.expect_peek(TokenKind::Ident)?;
        let name = self.curr_token.literal.clone();

        self.expect_peek(TokenKind::Assign)?;
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Ok(Statement::Let(name, value))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        if self.peek_token_is(TokenKind::Semicolon) {
            self.next_token();
            return Ok(Statement::Return(None));
        }
        if self.peek_token_is(TokenKind::RBrace) || self.peek_token_is(TokenKind::Eof) {
            return Ok(Statement::Return(None));
        }

        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Ok(Statement::Return(Some(value)))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Ok(Statement::ExpressionStmt(expr))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expression> {
        let depth = self.depth;
        let result = ensure_sufficient_stack(|| self.parse_nested_expression(precedence));
        self.depth = depth;
        result
    }

    // Every prefix and infix step nests the tree one level deeper.
    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.curr_token.position,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_nested_expression(&mut self, precedence: Precedence) -> ParseResult<Expression> {
        self.descend()?;

        let prefix = self
            .prefix_parse_fns
            .get(&self.curr_token.kind)
            .copied()
            .ok_or_else(|| ParseError::NoPrefixParseFn {
                kind: self.curr_token.kind,
                literal: self.curr_token.literal.clone(),
                position: self.curr_token.position,
            })?;

        let mut left = prefix(self)?;

        while !self.peek_token_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            let Some(infix) = self.infix_parse_fns.get(&self.peek_token.kind).copied() else {
                return Ok(left);
            };

            self.next_token();
            trace!(operator = %self.curr_token.kind, "infix");
            self.descend()?;
            left = infix(self, left)?;
        }

        Ok(left)
    }

    fn parse_identifier(&mut self) -> ParseResult<Expression> {
        Ok(Expression::Ident(self.curr_token.literal.clone()))
    }

    fn parse_integer_literal(&mut self) -> ParseResult<Expression> {
        self.curr_token
            .literal
            .parse::<i64>()
            .map(|value| Expression::IntLiteral(value, self.curr_token.literal.clone()))
            .map_err(|_| ParseError::InvalidInteger {
                literal: self.curr_token.literal.clone(),
                position: self.curr_token.position,
            })
    }

    fn parse_boolean(&mut self) -> ParseResult<Expression> {
        Ok(Expression::Boolean(self.curr_token_is(TokenKind::True)))
    }

    fn parse_prefix_expression(&mut self, op: Prefix) -> ParseResult<Expression> {
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Ok(Expression::PrefixExpr(op, Box::new(right)))
    }

    fn parse_infix_expression(&mut self, op: Infix, left: Expression) -> ParseResult<Expression> {
        let precedence = self.curr_precedence();

        self.next_token();
        let right = self.parse_expression(precedence)?;

        Ok(Expression::InfixExpr(op, Box::new(left), Box::new(right)))
    }

    fn parse_grouped_expression(&mut self) -> ParseResult<Expression> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;

        Ok(expr)
    }

    fn parse_if_expression(&mut self) -> ParseResult<Expression> {
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;

        self.expect_peek(TokenKind::LBrace)?;
        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_token_is(TokenKind::Else) {
            self.next_token();
            self.expect_peek(TokenKind::LBrace)?;
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        Ok(Expression::IfExpr(
            Box::new(condition),
            consequence,
            alternative,
        ))
    }

    fn parse_block_statement(&mut self) -> ParseResult<Block> {
        let mut block = Block::default();
        self.next_token();

        while !self.curr_token_is(TokenKind::RBrace) {
            if self.curr_token_is(TokenKind::Eof) {
                return Err(ParseError::UnexpectedToken {
                    expected: TokenKind::RBrace,
                    found: TokenKind::Eof,
                    literal: self.curr_token.literal.clone(),
                    position: self.curr_token.position,
                });
            }

            block.statements.push(self.parse_statement()?);
            self.next_token();
        }

        Ok(block)
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expression> {
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.parse_function_parameters()?;

        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;

        Ok(Expression::FnLiteral(parameters, body))
    }

    fn parse_function_parameters(&mut self) -> ParseResult<Vec<String>> {
        let mut identifiers = vec![];

        if self.peek_token_is(TokenKind::RParen) {
            self.next_token();
            return Ok(identifiers);
        }

        self.expect_peek(TokenKind::Ident)?;
        identifiers.push(self.curr_token.literal.clone());

        while self.peek_token_is(TokenKind::Comma) {
            self.next_token();
            self.expect_peek(TokenKind::Ident)?;
            identifiers.push(self.curr_token.literal.clone());
        }

        self.expect_peek(TokenKind::RParen)?;

        Ok(identifiers)
    }

    fn parse_call_expression(&mut self, function: Expression) -> ParseResult<Expression> {
        let arguments = self.parse_call_arguments()?;
        Ok(Expression::Call(Box::new(function), arguments))
    }

    fn parse_call_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = vec![];

        if self.peek_token_is(TokenKind::RParen) {
            self.next_token();
            return Ok(args);
        }

        self.next_token();
        args.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_token_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            args.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect_peek(TokenKind::RParen)?;

        Ok(args)
    }
}
