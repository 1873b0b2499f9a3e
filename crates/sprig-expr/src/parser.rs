//! Expression Parser
//!
//! Recursive-descent parser producing an arena [`Program`]. Two entry
//! points: [`Parser::parse_program`] for statement lists (event handlers,
//! initializers, effects) and [`Parser::parse_single`] for one expression
//! (bindings, data initializers).

use sprig_reactive::format_number;

use crate::ast::{
    AssignOp, Ast, AstNode, AstNodeKind, BinaryOp, Declarator, ExprId, FunctionBody, LiteralValue,
    LogicalOp, MemberProperty, Program, Property, PropertyKey, TemplatePart, UnaryOp, UpdateOp,
    VarKind,
};
use crate::lexer::Lexer;
use crate::token::{Span, TemplateChunk, Token, TokenKind};

/// Parser error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Expression Parser
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    ast: Ast,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_offset(source, 0)
    }

    fn with_offset(source: &'src str, offset: u32) -> Self {
        let mut lexer = Lexer::with_offset(source, offset);
        let current = lexer.next_token();
        Self {
            lexer,
            current: current.clone(),
            previous: current,
            ast: Ast::new(),
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("Expected {kind:?}")))
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        let message = match &self.current.kind {
            TokenKind::Error(e) => e.to_string(),
            other => format!("{context}, got {other:?}"),
        };
        ParseError { message, span: self.current.span }
    }

    fn node(&mut self, kind: AstNodeKind, span: Span) -> ExprId {
        self.ast.add_node(AstNode::new(kind, span))
    }

    fn span_from(&self, start: Span) -> Span {
        start.merge(self.previous.span)
    }

    /// Parse a statement list
    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { ast: self.ast, body })
    }

    /// Parse exactly one expression (an optional trailing `;` is allowed)
    pub fn parse_single(mut self) -> Result<Program, ParseError> {
        let start = self.current.span;
        let expr = self.parse_expression()?;
        self.eat(&TokenKind::Semicolon);
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected("Expected end of expression"));
        }
        let span = self.span_from(start);
        let stmt = self.node(AstNodeKind::ExpressionStatement { expr }, span);
        Ok(Program { ast: self.ast, body: vec![stmt] })
    }

    fn parse_statement(&mut self) -> Result<ExprId, ParseError> {
        match &self.current.kind {
            TokenKind::LBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(self.node(AstNodeKind::EmptyStatement, span))
            }
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Let | TokenKind::Const | TokenKind::Var => self.parse_variable_declaration(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block_statement(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        let body = self.parse_block_body()?;
        Ok(self.node(AstNodeKind::BlockStatement { body }, self.span_from(start)))
    }

    fn parse_block_body(&mut self) -> Result<Vec<ExprId>, ParseError> {
        self.consume(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("Unterminated block"));
            }
            body.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_return_statement(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        self.advance(); // return
        let argument = if matches!(
            self.current.kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.eat(&TokenKind::Semicolon);
        Ok(self.node(AstNodeKind::ReturnStatement { argument }, self.span_from(start)))
    }

    fn parse_if_statement(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        self.advance(); // if
        self.consume(TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.consume(TokenKind::RParen)?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat(&TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.node(
            AstNodeKind::IfStatement { test, consequent, alternate },
            self.span_from(start),
        ))
    }

    fn parse_variable_declaration(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Var,
        };
        self.advance();

        let mut declarations = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarations.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::Semicolon);
        Ok(self.node(
            AstNodeKind::VariableDeclaration { kind, declarations },
            self.span_from(start),
        ))
    }

    fn parse_expression_statement(&mut self) -> Result<ExprId, ParseError> {
        let expr = self.parse_expression()?;
        self.eat(&TokenKind::Semicolon);
        let span = self.ast.span(expr);
        Ok(self.node(AstNodeKind::ExpressionStatement { expr }, span))
    }

    fn parse_expression(&mut self) -> Result<ExprId, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<ExprId, ParseError> {
        if self.arrow_ahead() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional()?;

        let operator = match self.current.kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            TokenKind::StarEq => AssignOp::MulAssign,
            TokenKind::SlashEq => AssignOp::DivAssign,
            TokenKind::PercentEq => AssignOp::ModAssign,
            _ => return Ok(target),
        };
        self.check_target(target)?;
        self.advance();
        let value = self.parse_assignment()?;
        let span = self.ast.span(target).merge(self.ast.span(value));
        Ok(self.node(AstNodeKind::AssignmentExpression { operator, target, value }, span))
    }

    fn check_target(&self, target: ExprId) -> Result<(), ParseError> {
        match self.ast[target].kind {
            AstNodeKind::Identifier { .. } | AstNodeKind::MemberExpression { optional: false, .. } => Ok(()),
            _ => Err(ParseError {
                message: "Invalid assignment target".into(),
                span: self.ast.span(target),
            }),
        }
    }

    /// Whether the upcoming tokens start an arrow function
    fn arrow_ahead(&self) -> bool {
        match &self.current.kind {
            TokenKind::Identifier(_) => {
                let mut lookahead = self.lexer.clone();
                lookahead.next_token().kind == TokenKind::Arrow
            }
            TokenKind::LParen => {
                let mut lookahead = self.lexer.clone();
                let mut depth = 1usize;
                while depth > 0 {
                    match lookahead.next_token().kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => depth -= 1,
                        TokenKind::Eof | TokenKind::Error(_) => return false,
                        _ => {}
                    }
                }
                lookahead.next_token().kind == TokenKind::Arrow
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        let params = if self.check(&TokenKind::LParen) {
            self.advance();
            let params = self.parse_parameters()?;
            self.consume(TokenKind::RParen)?;
            params
        } else {
            vec![self.expect_identifier()?]
        };
        self.consume(TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block_body()?)
        } else {
            FunctionBody::Expression(self.parse_assignment()?)
        };
        Ok(self.node(
            AstNodeKind::FunctionExpression { name: None, params, body, is_arrow: true },
            self.span_from(start),
        ))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Box<str>>, ParseError> {
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            while self.eat(&TokenKind::Comma) {
                params.push(self.expect_identifier()?);
            }
        }
        Ok(params)
    }

    fn parse_conditional(&mut self) -> Result<ExprId, ParseError> {
        let test = self.parse_nullish()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.consume(TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = self.ast.span(test).merge(self.ast.span(alternate));
        Ok(self.node(
            AstNodeKind::ConditionalExpression { test, consequent, alternate },
            span,
        ))
    }

    fn parse_nullish(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_logical_or()?;
        while self.eat(&TokenKind::QuestionQuestion) {
            let right = self.parse_logical_or()?;
            left = self.logical(LogicalOp::NullishCoalescing, left, right);
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_logical_and()?;
            left = self.logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AmpersandAmpersand) {
            let right = self.parse_equality()?;
            left = self.logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn logical(&mut self, operator: LogicalOp, left: ExprId, right: ExprId) -> ExprId {
        let span = self.ast.span(left).merge(self.ast.span(right));
        self.node(AstNodeKind::LogicalExpression { operator, left, right }, span)
    }

    fn binary(&mut self, operator: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        let span = self.ast.span(left).merge(self.ast.span(right));
        self.node(AstNodeKind::BinaryExpression { operator, left, right }, span)
    }

    fn parse_equality(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                TokenKind::EqEqEq => BinaryOp::StrictEqual,
                TokenKind::NotEqEq => BinaryOp::StrictNotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::LessThan => BinaryOp::LessThan,
                TokenKind::LessThanEq => BinaryOp::LessThanEq,
                TokenKind::GreaterThan => BinaryOp::GreaterThan,
                TokenKind::GreaterThanEq => BinaryOp::GreaterThanEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = if self.check(&TokenKind::PlusPlus) {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.advance();
                let argument = self.parse_unary()?;
                self.check_target(argument)?;
                return Ok(self.node(
                    AstNodeKind::UpdateExpression { operator, argument, prefix: true },
                    start.merge(self.ast.span(argument)),
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let argument = self.parse_unary()?;
        Ok(self.node(
            AstNodeKind::UnaryExpression { operator, argument },
            start.merge(self.ast.span(argument)),
        ))
    }

    fn parse_postfix(&mut self) -> Result<ExprId, ParseError> {
        let argument = self.parse_call_member()?;
        let operator = match self.current.kind {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(argument),
        };
        self.check_target(argument)?;
        self.advance();
        let span = self.span_from(self.ast.span(argument));
        Ok(self.node(
            AstNodeKind::UpdateExpression { operator, argument, prefix: false },
            span,
        ))
    }

    fn parse_call_member(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let start = self.ast.span(expr);
            if self.eat(&TokenKind::Dot) {
                let name = self.expect_property_name()?;
                expr = self.node(
                    AstNodeKind::MemberExpression {
                        object: expr,
                        property: MemberProperty::Named(name),
                        optional: false,
                    },
                    self.span_from(start),
                );
            } else if self.eat(&TokenKind::QuestionDot) {
                // Optional chaining: ?.name, ?.[expr], ?.(args)
                if self.eat(&TokenKind::LParen) {
                    let arguments = self.parse_arguments()?;
                    expr = self.node(
                        AstNodeKind::CallExpression { callee: expr, arguments, optional: true },
                        self.span_from(start),
                    );
                } else if self.eat(&TokenKind::LBracket) {
                    let property = self.parse_expression()?;
                    self.consume(TokenKind::RBracket)?;
                    expr = self.node(
                        AstNodeKind::MemberExpression {
                            object: expr,
                            property: MemberProperty::Computed(property),
                            optional: true,
                        },
                        self.span_from(start),
                    );
                } else {
                    let name = self.expect_property_name()?;
                    expr = self.node(
                        AstNodeKind::MemberExpression {
                            object: expr,
                            property: MemberProperty::Named(name),
                            optional: true,
                        },
                        self.span_from(start),
                    );
                }
            } else if self.eat(&TokenKind::LBracket) {
                let property = self.parse_expression()?;
                self.consume(TokenKind::RBracket)?;
                expr = self.node(
                    AstNodeKind::MemberExpression {
                        object: expr,
                        property: MemberProperty::Computed(property),
                        optional: false,
                    },
                    self.span_from(start),
                );
            } else if self.eat(&TokenKind::LParen) {
                let arguments = self.parse_arguments()?;
                expr = self.node(
                    AstNodeKind::CallExpression { callee: expr, arguments, optional: false },
                    self.span_from(start),
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Arguments after an opening `(`, including the closing `)`
    fn parse_arguments(&mut self) -> Result<Vec<ExprId>, ParseError> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let span = self.current.span;
        let literal = match &self.current.kind {
            TokenKind::Number(n) => LiteralValue::Number(*n),
            TokenKind::String(s) => LiteralValue::String(s.clone()),
            TokenKind::Boolean(b) => LiteralValue::Bool(*b),
            TokenKind::Null => LiteralValue::Null,
            TokenKind::Undefined => LiteralValue::Undefined,
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                return Ok(self.node(AstNodeKind::Identifier { name }, span));
            }
            TokenKind::This => {
                self.advance();
                return Ok(self.node(AstNodeKind::ThisExpression, span));
            }
            TokenKind::Template(chunks) => {
                let chunks = chunks.clone();
                self.advance();
                return self.parse_template(&chunks, span);
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => return self.parse_function_expression(),
            _ => return Err(self.unexpected("Unexpected token")),
        };
        self.advance();
        Ok(self.node(AstNodeKind::Literal { value: literal }, span))
    }

    fn parse_template(&mut self, chunks: &[TemplateChunk], span: Span) -> Result<ExprId, ParseError> {
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => parts.push(TemplatePart::Text(text.clone())),
                TemplateChunk::Substitution { source, offset } => {
                    parts.push(TemplatePart::Expr(self.parse_substitution(source, *offset)?));
                }
            }
        }
        Ok(self.node(AstNodeKind::TemplateLiteral { parts }, span))
    }

    /// Parse a `${...}` body into this parser's arena
    fn parse_substitution(&mut self, source: &str, offset: u32) -> Result<ExprId, ParseError> {
        let mut sub = Parser::with_offset(source, offset);
        sub.ast = std::mem::take(&mut self.ast);
        let result = sub.parse_expression().and_then(|expr| {
            if sub.check(&TokenKind::Eof) {
                Ok(expr)
            } else {
                Err(sub.unexpected("Expected end of substitution"))
            }
        });
        self.ast = sub.ast;
        result
    }

    fn parse_array_literal(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        self.advance(); // [
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBracket)?;
        Ok(self.node(AstNodeKind::ArrayExpression { elements }, self.span_from(start)))
    }

    fn parse_object_literal(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        self.advance(); // {
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            let key_span = self.current.span;
            let key = match &self.current.kind {
                TokenKind::Identifier(name) => PropertyKey::Named(name.clone()),
                TokenKind::String(s) => PropertyKey::Named(s.clone()),
                TokenKind::Number(n) => PropertyKey::Named(format_number(*n).into()),
                TokenKind::LBracket => {
                    self.advance();
                    let expr = self.parse_assignment()?;
                    if !self.check(&TokenKind::RBracket) {
                        return Err(self.unexpected("Expected ]"));
                    }
                    PropertyKey::Computed(expr)
                }
                other => match other.keyword_text() {
                    Some(text) => PropertyKey::Named(text.into()),
                    None => return Err(self.unexpected("Expected property name")),
                },
            };
            let is_identifier = matches!(self.current.kind, TokenKind::Identifier(_));
            self.advance();

            let property = if self.eat(&TokenKind::Colon) {
                Property { key, value: self.parse_assignment()?, shorthand: false }
            } else if self.eat(&TokenKind::LParen) {
                // Method shorthand: name(params) { body }
                let name = match &key {
                    PropertyKey::Named(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let params = self.parse_parameters()?;
                self.consume(TokenKind::RParen)?;
                let body = FunctionBody::Block(self.parse_block_body()?);
                let value = self.node(
                    AstNodeKind::FunctionExpression { name, params, body, is_arrow: false },
                    self.span_from(key_span),
                );
                Property { key, value, shorthand: false }
            } else {
                let PropertyKey::Named(name) = &key else {
                    return Err(self.unexpected("Expected :"));
                };
                if !is_identifier {
                    return Err(self.unexpected("Expected :"));
                }
                let value = self.node(AstNodeKind::Identifier { name: name.clone() }, key_span);
                Property { key, value, shorthand: true }
            };
            properties.push(property);

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;

        Ok(self.node(AstNodeKind::ObjectExpression { properties }, self.span_from(start)))
    }

    fn parse_function_expression(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        self.advance(); // function

        let name = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        self.consume(TokenKind::LParen)?;
        let params = self.parse_parameters()?;
        self.consume(TokenKind::RParen)?;
        let body = FunctionBody::Block(self.parse_block_body()?);

        Ok(self.node(
            AstNodeKind::FunctionExpression { name, params, body, is_arrow: false },
            self.span_from(start),
        ))
    }

    fn expect_identifier(&mut self) -> Result<Box<str>, ParseError> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("Expected identifier"))
        }
    }

    /// Identifier or keyword after `.`
    fn expect_property_name(&mut self) -> Result<Box<str>, ParseError> {
        let name: Box<str> = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            other => match other.keyword_text() {
                Some(text) => text.into(),
                None => return Err(self.unexpected("Expected property name")),
            },
        };
        self.advance();
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Program {
        Parser::new(source).parse_single().unwrap()
    }

    fn root_kind(program: &Program) -> &AstNodeKind {
        let AstNodeKind::ExpressionStatement { expr } = program.ast[program.body[0]].kind else {
            panic!("expected an expression statement");
        };
        &program.ast[expr].kind
    }

    #[test]
    fn test_precedence() {
        let program = single("a + b * c");
        let AstNodeKind::BinaryExpression { operator, right, .. } = root_kind(&program) else {
            panic!("expected binary expression");
        };
        assert_eq!(*operator, BinaryOp::Add);
        assert!(matches!(
            program.ast[*right].kind,
            AstNodeKind::BinaryExpression { operator: BinaryOp::Mul, .. }
        ));
    }

    #[test]
    fn test_arrow_functions() {
        for source in ["x => x * 2", "(a, b) => a + b", "() => { return 1 }"] {
            let program = single(source);
            assert!(
                matches!(root_kind(&program), AstNodeKind::FunctionExpression { is_arrow: true, .. }),
                "{source}"
            );
        }
        // A parenthesized expression is not an arrow
        assert!(matches!(root_kind(&single("(a + b)")), AstNodeKind::BinaryExpression { .. }));
    }

    #[test]
    fn test_object_literal_forms() {
        let program = single("{ open: false, 'quoted key': 1, count, toggle() { this.open = !this.open } }");
        let AstNodeKind::ObjectExpression { properties } = root_kind(&program) else {
            panic!("expected object literal");
        };
        assert_eq!(properties.len(), 4);
        assert!(properties[2].shorthand);
        assert!(matches!(
            program.ast[properties[3].value].kind,
            AstNodeKind::FunctionExpression { is_arrow: false, .. }
        ));
    }

    #[test]
    fn test_optional_chain_and_call() {
        let program = single("user?.profile?.name ?? fallback()");
        assert!(matches!(
            root_kind(&program),
            AstNodeKind::LogicalExpression { operator: LogicalOp::NullishCoalescing, .. }
        ));
        assert!(matches!(
            root_kind(&single("handler?.()")),
            AstNodeKind::CallExpression { optional: true, .. }
        ));
    }

    #[test]
    fn test_statement_list() {
        let program = Parser::new("let total = 0; if (items.length) { total = 1 } else total = 2; total")
            .parse_program()
            .unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.ast[program.body[1]].kind, AstNodeKind::IfStatement { .. }));
    }

    #[test]
    fn test_template_substitutions_share_arena() {
        let program = single("`${a} and ${b + 1}`");
        let AstNodeKind::TemplateLiteral { parts } = root_kind(&program) else {
            panic!("expected template literal");
        };
        assert_eq!(parts.len(), 3);
        let TemplatePart::Expr(last) = parts[2] else {
            panic!("expected substitution");
        };
        assert!(matches!(program.ast[last].kind, AstNodeKind::BinaryExpression { .. }));
    }

    #[test]
    fn test_errors() {
        assert!(Parser::new("a +").parse_single().is_err());
        assert!(Parser::new("1 = 2").parse_single().is_err());
        assert!(Parser::new("a b").parse_single().is_err());
        let err = Parser::new("'open").parse_single().unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }
}
