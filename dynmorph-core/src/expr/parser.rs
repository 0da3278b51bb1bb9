//! Recursive-descent parser producing the expression tree.

use super::lexer::{Token, TokenKind};
use super::{
    BinaryOp, CONSTANTS, CompileError, CompileErrorKind, Function, Node, Statement, SymbolTable,
    UnaryOp,
};
use crate::symbol::Symbol;

/// Deepest expression tree the parser will build.
pub(crate) const MAX_DEPTH: usize = 256;

pub(crate) struct Program {
    pub statements: Vec<Statement>,
    pub variables: Vec<Symbol>,
    pub locals: Vec<String>,
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    table: &'a SymbolTable,
    pos: usize,
    end: usize,
    variables: Vec<Symbol>,
    locals: Vec<String>,
    depth: usize,
}

type ParseResult<T> = Result<T, CompileError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], table: &'a SymbolTable, end: usize) -> Self {
        Self {
            tokens,
            table,
            pos: 0,
            end,
            variables: Vec::new(),
            locals: Vec::new(),
            depth: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_statement()?);
            match self.peek() {
                None => break,
                Some(TokenKind::Semicolon) => self.pos += 1,
                Some(_) => return Err(self.unexpected()),
            }
        }
        if statements.is_empty() {
            return Err(CompileError {
                kind: CompileErrorKind::Empty,
                position: 0,
            });
        }
        Ok(Program {
            statements,
            variables: self.variables,
            locals: self.locals,
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        if !matches!(self.peek(), Some(TokenKind::Ident(name)) if name == "var") {
            return Ok(Statement::Expr(self.parse_expr()?));
        }
        self.pos += 1;

        let position = self.position();
        let name = match self.next() {
            Some(TokenKind::Ident(name)) => name.clone(),
            Some(_) => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
            None => return Err(self.end_of_input()),
        };
        if !SymbolTable::is_legal_name(&name)
            || self.table.contains(&name)
            || self.locals.contains(&name)
        {
            return Err(CompileError {
                kind: CompileErrorKind::Redefinition(name),
                position,
            });
        }

        // The initializer cannot see the local it defines.
        let init = if self.eat(&TokenKind::Assign) {
            self.parse_expr()?
        } else {
            Node::Number(0.0)
        };
        self.locals.push(name);
        Ok(Statement::Declare(self.locals.len() - 1, init))
    }

    fn parse_expr(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        self.descend()?;
        let node = self.parse_conditional();
        self.depth = depth;
        node
    }

    fn parse_conditional(&mut self) -> ParseResult<Node> {
        let cond = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let depth = self.depth;
        self.descend()?;
        let then = self.parse_conditional()?;
        self.expect(&TokenKind::Colon)?;
        let otherwise = self.parse_conditional()?;
        self.depth = depth;
        Ok(Node::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_or(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) || self.eat_word("or") {
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Node::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) || self.eat_word("and") {
            self.descend()?;
            let rhs = self.parse_equality()?;
            lhs = Node::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_relational()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_additive()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        self.descend()?;
        let node = self.parse_prefixed();
        self.depth = depth;
        node
    }

    fn parse_prefixed(&mut self) -> ParseResult<Node> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Node::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.parse_unary();
        }
        if self.eat(&TokenKind::Bang) || self.eat_word("not") {
            return Ok(Node::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Node> {
        let base = self.parse_primary()?;
        if self.eat(&TokenKind::Caret) {
            // Right associative; the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let position = self.position();
        let Some(kind) = self.next() else {
            return Err(self.end_of_input());
        };
        match kind {
            TokenKind::Number(value) => Ok(Node::Number(*value)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.parse_identifier(name, position)
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn parse_identifier(&mut self, name: String, position: usize) -> ParseResult<Node> {
        if matches!(self.peek(), Some(TokenKind::LParen)) {
            self.pos += 1;
            let args = self.parse_arguments()?;
            if name == "if" {
                return Self::lower_if(args, position);
            }
            let Some(function) = Function::from_name(&name) else {
                return Err(CompileError {
                    kind: CompileErrorKind::UnknownFunction(name),
                    position,
                });
            };
            function
                .check_arity(args.len())
                .map_err(|kind| CompileError { kind, position })?;
            return Ok(Node::Call(function, args));
        }

        if let Some((_, value)) = CONSTANTS.iter().find(|(c, _)| *c == name) {
            return Ok(Node::Number(*value));
        }
        if let Some(index) = self.locals.iter().position(|l| *l == name) {
            return Ok(Node::Local(index));
        }
        if let Some((symbol, slot)) = self.table.variable(&name) {
            if !self.variables.contains(&symbol) {
                self.variables.push(symbol);
            }
            return Ok(Node::Variable(slot));
        }
        Err(CompileError {
            kind: CompileErrorKind::UndefinedSymbol(name),
            position,
        })
    }

    fn lower_if(mut args: Vec<Node>, position: usize) -> ParseResult<Node> {
        if args.len() != 3 {
            return Err(CompileError {
                kind: CompileErrorKind::Arity {
                    name: "if".to_string(),
                    expected: "3".to_string(),
                    found: args.len(),
                },
                position,
            });
        }
        let otherwise = args.pop().unwrap_or(Node::Number(0.0));
        let then = args.pop().unwrap_or(Node::Number(0.0));
        let cond = args.pop().unwrap_or(Node::Number(0.0));
        Ok(Node::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    /// Parse `a, b, c)` after the opening parenthesis.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen)?;
            return Ok(args);
        }
    }

    // -- token helpers ------------------------------------------------------

    fn descend(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CompileError {
                kind: CompileErrorKind::TooDeep(MAX_DEPTH),
                position: self.position(),
            });
        }
        Ok(())
    }

    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&'a TokenKind> {
        let kind = self.tokens.get(self.pos).map(|t| &t.kind);
        if kind.is_some() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(TokenKind::Ident(name)) if name == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else if self.peek().is_none() {
            Err(self.end_of_input())
        } else {
            Err(self.unexpected())
        }
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.position)
    }

    fn unexpected(&self) -> CompileError {
        match self.peek() {
            Some(kind) => CompileError {
                kind: CompileErrorKind::UnexpectedToken(kind.describe()),
                position: self.position(),
            },
            None => self.end_of_input(),
        }
    }

    fn end_of_input(&self) -> CompileError {
        CompileError {
            kind: CompileErrorKind::UnexpectedEnd,
            position: self.end,
        }
    }
}
